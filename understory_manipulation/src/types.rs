// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value types shared by the coordinator, the engine seam and the compositor bridge.

use bitflags::bitflags;
use kurbo::Affine;

/// Status of a manipulation viewport as presented to the owning control.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ViewportStatus {
    /// The viewport is being configured and has never been enabled.
    Building,
    /// The viewport accepts input but no manipulation is in progress.
    Enabled,
    /// The viewport ignores input.
    Disabled,
    /// A manipulation completed and the viewport is idle.
    Ready,
    /// A contact is driving the viewport.
    Running,
    /// The viewport is coasting after the contact was lifted.
    Inertia,
    /// The manipulation was handed to a parent viewport.
    Suspended,
    /// The viewport is coasting because of an auto-scroll request.
    AutoRunning,
}

impl ViewportStatus {
    /// Returns `true` while a manipulation or auto-scroll is moving the content.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Inertia | Self::AutoRunning)
    }

    /// Returns `true` for the transitions a well-behaved engine produces.
    ///
    /// [`AutoRunning`](Self::AutoRunning) is treated like
    /// [`Inertia`](Self::Inertia). Unexpected transitions are still delivered
    /// to the listener; this is only used for diagnostics.
    #[must_use]
    pub fn is_expected_transition(old: Self, new: Self) -> bool {
        let fold = |s: Self| if s == Self::AutoRunning { Self::Inertia } else { s };
        matches!(
            (fold(old), fold(new)),
            (Self::Building, Self::Enabled | Self::Disabled)
                | (Self::Enabled, Self::Disabled)
                | (Self::Disabled, Self::Enabled)
                | (Self::Enabled | Self::Ready, Self::Running)
                | (Self::Running, Self::Inertia)
                | (Self::Inertia, Self::Ready)
        )
    }
}

/// Kind of interaction reported while a viewport is being manipulated.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum InteractionType {
    /// An interaction started.
    Begin,
    /// The engine refined its guess about the interaction kind.
    TypeUpdate,
    /// The interaction ended.
    End,
    /// The interaction is a free-form manipulation.
    Manipulation,
    /// The interaction is a tap.
    GestureTap,
    /// The interaction is a press and hold.
    GestureHold,
    /// The interaction is a cross-slide swipe.
    GestureCrossSlide,
    /// The interaction is a pinch-zoom.
    GesturePinchZoom,
}

/// Drag-drop status of the viewport carrying the drag-drop behavior.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DragDropStatus {
    /// Waiting for a hold.
    Ready,
    /// A hold was detected and the drag is being previewed.
    Preview,
    /// The content is being dragged.
    Dragging,
    /// The drag was abandoned.
    Cancelled,
    /// The drag was committed.
    Committed,
}

/// A pan axis.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    /// Horizontal axis.
    Horizontal,
    /// Vertical axis.
    Vertical,
}

/// How a viewport renders translation beyond its content bounds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum OverpanMode {
    /// The engine's own rubber-band effect.
    #[default]
    Default,
    /// No overpan at all; translation stops at the content edge.
    Suppress,
    /// Translation stops at the content edge and overpan shrinks the content instead.
    Compress,
}

impl OverpanMode {
    /// Returns `true` if this mode replaces the engine's own overpan.
    #[must_use]
    pub fn is_custom(self) -> bool {
        self != Self::Default
    }
}

/// Role of a content object inside its viewport.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// The viewport's primary content.
    #[default]
    Primary,
    /// A header that scrolls horizontally with the primary content.
    TopHeader,
    /// A header that scrolls vertically with the primary content.
    LeftHeader,
    /// A corner header that never scrolls.
    TopLeftHeader,
    /// Content nested inside the primary content that follows it exactly.
    Descendant,
    /// Content driven by caller-supplied curves.
    Custom,
}

bitflags! {
    /// Motion kinds, used for chaining and snap-point configuration.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct MotionTypes: u8 {
        /// Horizontal translation.
        const TRANSLATE_X = 0x01;
        /// Vertical translation.
        const TRANSLATE_Y = 0x02;
        /// Zoom.
        const ZOOM = 0x04;
        /// Horizontal center of zoom.
        const CENTER_X = 0x10;
        /// Vertical center of zoom.
        const CENTER_Y = 0x20;
    }
}

impl MotionTypes {
    /// The translation motion along `axis`.
    #[must_use]
    pub fn translation(axis: Axis) -> Self {
        match axis {
            Axis::Horizontal => Self::TRANSLATE_X,
            Axis::Vertical => Self::TRANSLATE_Y,
        }
    }
}

bitflags! {
    /// Content alignment along one axis.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Alignment: u8 {
        /// Align to the leading edge.
        const NEAR = 0x01;
        /// Center the content.
        const CENTER = 0x02;
        /// Align to the trailing edge.
        const FAR = 0x04;
        /// Let the content move away from the alignment while manipulated.
        const UNLOCKED = 0x08;
    }
}

/// How snap points along an axis are honored.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SnapPointsType {
    /// No snapping.
    #[default]
    None,
    /// Snap near snap points only.
    Optional,
    /// Always snap.
    Mandatory,
    /// Snap near snap points, at most one per manipulation.
    OptionalSingle,
    /// Always snap, at most one per manipulation.
    MandatorySingle,
}

/// Reference frame of snap point offsets.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SnapCoordinate {
    /// Relative to the content boundary.
    #[default]
    Boundary,
    /// Relative to a given origin.
    Origin,
    /// Relative to the far boundary, used for right-to-left flow.
    Mirrored,
}

/// Transform of a content object as consumed by a renderer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ContentTransform {
    /// Horizontal translation.
    pub translation_x: f64,
    /// Vertical translation.
    pub translation_y: f64,
    /// Zoom factor before any overpan compression.
    pub uncompressed_zoom: f64,
    /// Horizontal zoom factor.
    pub zoom_x: f64,
    /// Vertical zoom factor.
    pub zoom_y: f64,
}

impl ContentTransform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        translation_x: 0.0,
        translation_y: 0.0,
        uncompressed_zoom: 1.0,
        zoom_x: 1.0,
        zoom_y: 1.0,
    };

    /// Reads translation and per-axis zoom from an axis-aligned affine.
    #[must_use]
    pub fn from_affine(affine: Affine, uncompressed_zoom: f64) -> Self {
        let [zoom_x, _, _, zoom_y, translation_x, translation_y] = affine.as_coeffs();
        Self {
            translation_x,
            translation_y,
            uncompressed_zoom,
            zoom_x,
            zoom_y,
        }
    }

    /// The axis-aligned affine described by this transform.
    #[must_use]
    pub fn to_affine(&self) -> Affine {
        Affine::new([
            self.zoom_x,
            0.0,
            0.0,
            self.zoom_y,
            self.translation_x,
            self.translation_y,
        ])
    }
}

impl Default for ContentTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
