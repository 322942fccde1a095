// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The seam between the coordinator and a manipulation engine.
//!
//! A manipulation engine owns gesture recognition and inertia physics. The
//! coordinator never reimplements either; it drives an implementation of
//! [`Engine`] through opaque handles and listens to it through
//! [`ViewportEventHandler`].
//!
//! Every method takes `&self`: engines are documented as safe for concurrent
//! access, and the compositor bridge calls into the same engine from the
//! render thread while the owning control configures it from the UI thread.

use std::sync::Arc;
use std::time::Duration;

use bitflags::bitflags;
use kurbo::{Affine, Rect, Vec2};
use thiserror::Error;

use crate::configuration::EngineConfiguration;
use crate::curve::CurveSet;
use crate::input::InputMessage;
use crate::types::{
    Alignment, Axis, DragDropStatus, InteractionType, MotionTypes, OverpanMode, SnapCoordinate,
    SnapPointsType,
};

/// Engine-side handle of a manipulation viewport.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineViewport(pub u64);

/// Engine-side handle of a content object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineContent(pub u64);

/// Engine-side handle of a behavior object, before it is attached to a viewport.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BehaviorId(pub u64);

/// Cookie identifying a behavior attached to a viewport.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BehaviorCookie(pub u64);

/// Cookie identifying an event handler subscribed to a viewport.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HandlerCookie(pub u64);

/// Identifier of an input contact.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContactId(pub u32);

impl ContactId {
    /// Pseudo contact used to route keyboard input.
    pub const KEYBOARD: Self = Self(0xFFFF_FFFE);
    /// Pseudo contact used to route mouse wheel input.
    pub const MOUSE: Self = Self(0xFFFF_FFFD);
}

/// Status reported by the engine for a viewport.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EngineStatus {
    /// Being configured.
    Building,
    /// Enabled and idle.
    Enabled,
    /// Disabled.
    Disabled,
    /// Idle after a manipulation.
    Ready,
    /// Driven by a contact.
    Running,
    /// Coasting.
    Inertia,
    /// Handed over to a parent viewport.
    Suspended,
}

bitflags! {
    /// Gestures a viewport recognizes when it is configured manually.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct GestureConfiguration: u8 {
        /// The engine's default gestures.
        const DEFAULT = 0x00;
        /// Vertical cross-slide.
        const CROSS_SLIDE_VERTICAL = 0x08;
        /// Horizontal cross-slide.
        const CROSS_SLIDE_HORIZONTAL = 0x10;
        /// Pinch-zoom.
        const PINCH_ZOOM = 0x20;
    }
}

bitflags! {
    /// Configuration of a drag-drop behavior.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct DragDropConfiguration: u8 {
        /// Recognize vertical drags.
        const VERTICAL = 0x01;
        /// Recognize horizontal drags.
        const HORIZONTAL = 0x02;
        /// Only select, never drag.
        const SELECT_ONLY = 0x10;
        /// Select, then drag.
        const SELECT_DRAG = 0x20;
        /// Drag after a hold.
        const HOLD_DRAG = 0x40;
    }
}

/// Kinds of behavior an engine can create.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BehaviorKind {
    /// Continuous programmatic scrolling.
    AutoScroll,
    /// Hold-to-drag recognition.
    DragDrop(DragDropConfiguration),
    /// Replaces the engine's own overpan on the axes whose mode is custom.
    Overpan {
        /// Horizontal overpan mode.
        horizontal: OverpanMode,
        /// Vertical overpan mode.
        vertical: OverpanMode,
    },
}

/// Direction requested from an auto-scroll behavior.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AutoScrollMotion {
    /// Stop scrolling.
    Stop,
    /// Scroll toward the content end.
    Forward,
    /// Scroll toward the content start.
    Reverse,
}

/// How the engine honored a behavior configuration change.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigureResponse {
    /// The change takes effect once the viewport settles.
    Pending,
    /// The change already took effect.
    Immediate,
}

/// Errors reported by an [`Engine`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The viewport was promoted to an active state and no longer accepts configuration.
    #[error("viewport is sealed")]
    Sealed,
    /// The contact is already tracked by the viewport.
    #[error("contact already exists")]
    ContactAlreadyExists,
    /// The contact is no longer tracked by the viewport.
    #[error("contact no longer exists")]
    ContactNoLongerExists,
    /// The handle does not refer to a live engine object.
    #[error("invalid engine object state")]
    InvalidState,
    /// An inertia-only query was made outside of inertia.
    #[error("viewport is not in inertia")]
    NotInInertia,
    /// The engine cannot be reached.
    #[error("manipulation engine unavailable")]
    Unavailable,
    /// Any other engine failure.
    #[error("engine call failed: {0}")]
    Failed(&'static str),
}

/// Timing of the current render frame, supplied by the renderer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameInfo {
    /// Composition time elapsed since the previous frame.
    pub elapsed: Duration,
    /// Number of frames ticked so far.
    pub frame: u64,
}

/// Timing callback the engine invokes while it updates.
pub trait FrameInfoProvider {
    /// Returns timing of the frame being composed.
    fn next_frame_info(&self) -> FrameInfo;
}

/// Receives engine notifications for one viewport.
pub trait ViewportEventHandler: Send + Sync {
    /// The viewport status changed.
    fn status_changed(&self, viewport: EngineViewport, current: EngineStatus, previous: EngineStatus);
    /// The interaction kind changed.
    fn interaction_changed(&self, viewport: EngineViewport, interaction: InteractionType);
    /// The drag-drop status changed.
    fn drag_drop_status_changed(
        &self,
        viewport: EngineViewport,
        current: DragDropStatus,
        previous: DragDropStatus,
    );
}

/// Operations the coordinator needs from a manipulation engine.
pub trait Engine: Send + Sync {
    /// Creates a viewport with its primary content.
    fn create_viewport(&self) -> Result<EngineViewport, EngineError>;
    /// Destroys a viewport, whatever its status.
    fn abandon_viewport(&self, viewport: EngineViewport) -> Result<(), EngineError>;
    /// Enables a viewport.
    fn enable_viewport(&self, viewport: EngineViewport) -> Result<(), EngineError>;
    /// Disables a viewport.
    fn disable_viewport(&self, viewport: EngineViewport) -> Result<(), EngineError>;
    /// Interrupts the current manipulation.
    fn stop_viewport(&self, viewport: EngineViewport) -> Result<(), EngineError>;
    /// Returns the viewport status.
    fn viewport_status(&self, viewport: EngineViewport) -> Result<EngineStatus, EngineError>;

    /// Adds a configuration the viewport may use later.
    fn add_configuration(
        &self,
        viewport: EngineViewport,
        configuration: EngineConfiguration,
    ) -> Result<(), EngineError>;
    /// Removes a configuration.
    fn remove_configuration(
        &self,
        viewport: EngineViewport,
        configuration: EngineConfiguration,
    ) -> Result<(), EngineError>;
    /// Makes a configuration current.
    fn activate_configuration(
        &self,
        viewport: EngineViewport,
        configuration: EngineConfiguration,
    ) -> Result<(), EngineError>;
    /// Sets the motions chained to the parent viewport.
    fn set_chaining(&self, viewport: EngineViewport, motion: MotionTypes)
    -> Result<(), EngineError>;
    /// Sets the gestures recognized by the viewport.
    fn set_manual_gestures(
        &self,
        viewport: EngineViewport,
        gestures: GestureConfiguration,
    ) -> Result<(), EngineError>;
    /// Switches the viewport between automatic and manual input.
    fn set_manual_input(&self, viewport: EngineViewport, manual: bool) -> Result<(), EngineError>;

    /// Sets the viewport rectangle.
    fn set_viewport_rect(&self, viewport: EngineViewport, rect: Rect) -> Result<(), EngineError>;
    /// Returns the viewport rectangle.
    fn viewport_rect(&self, viewport: EngineViewport) -> Result<Rect, EngineError>;
    /// Returns the primary content of a viewport.
    fn primary_content(&self, viewport: EngineViewport) -> Result<EngineContent, EngineError>;
    /// Sets the content rectangle.
    fn set_content_rect(&self, content: EngineContent, rect: Rect) -> Result<(), EngineError>;
    /// Returns the content rectangle.
    fn content_rect(&self, content: EngineContent) -> Result<Rect, EngineError>;
    /// Sets the zoom range of the primary content.
    fn set_zoom_boundaries(
        &self,
        viewport: EngineViewport,
        min_zoom: f64,
        max_zoom: f64,
    ) -> Result<(), EngineError>;
    /// Sets the primary content alignment.
    fn set_alignment(
        &self,
        viewport: EngineViewport,
        horizontal: Alignment,
        vertical: Alignment,
    ) -> Result<(), EngineError>;
    /// Sets regularly spaced snap points.
    fn set_snap_interval(
        &self,
        viewport: EngineViewport,
        motion: MotionTypes,
        interval: f64,
        offset: f64,
    ) -> Result<(), EngineError>;
    /// Sets irregular snap points.
    fn set_snap_points(
        &self,
        viewport: EngineViewport,
        motion: MotionTypes,
        points: &[f64],
    ) -> Result<(), EngineError>;
    /// Sets how snap points are honored.
    fn set_snap_type(
        &self,
        viewport: EngineViewport,
        motion: MotionTypes,
        kind: SnapPointsType,
    ) -> Result<(), EngineError>;
    /// Sets the reference frame of snap points.
    fn set_snap_coordinate(
        &self,
        viewport: EngineViewport,
        motion: MotionTypes,
        coordinate: SnapCoordinate,
        origin: f64,
    ) -> Result<(), EngineError>;
    /// Moves the primary content so that `rect` fills the viewport.
    fn zoom_to_rect(
        &self,
        viewport: EngineViewport,
        rect: Rect,
        animate: bool,
    ) -> Result<(), EngineError>;
    /// Overwrites the primary content transform.
    fn sync_content_transform(
        &self,
        viewport: EngineViewport,
        transform: Affine,
    ) -> Result<(), EngineError>;

    /// Creates a content object driven by parametric curves.
    fn create_content(&self) -> Result<EngineContent, EngineError>;
    /// Attaches a content object to a viewport.
    fn add_content(&self, viewport: EngineViewport, content: EngineContent)
    -> Result<(), EngineError>;
    /// Detaches a content object from its viewport.
    fn remove_content(
        &self,
        viewport: EngineViewport,
        content: EngineContent,
    ) -> Result<(), EngineError>;
    /// Releases a detached content object.
    fn release_content(&self, content: EngineContent) -> Result<(), EngineError>;
    /// Replaces the curves driving a content object.
    fn set_curves(
        &self,
        content: EngineContent,
        curves: &CurveSet,
        origin: Vec2,
    ) -> Result<(), EngineError>;
    /// Returns the content transform before overpan effects.
    fn content_transform(&self, content: EngineContent) -> Result<Affine, EngineError>;
    /// Returns the transform the content is rendered with.
    fn output_transform(&self, content: EngineContent) -> Result<Affine, EngineError>;
    /// Returns where inertia will leave the primary content.
    ///
    /// Fails with [`EngineError::NotInInertia`] outside of inertia.
    fn inertia_end_transform(&self, viewport: EngineViewport) -> Result<Affine, EngineError>;
    /// Returns the viewport a content object is attached to.
    ///
    /// Fails with [`EngineError::InvalidState`] once the viewport is gone.
    fn content_viewport(&self, content: EngineContent) -> Result<EngineViewport, EngineError>;

    /// Creates a behavior.
    fn create_behavior(&self, kind: BehaviorKind) -> Result<BehaviorId, EngineError>;
    /// Attaches a behavior to a viewport.
    fn add_behavior(
        &self,
        viewport: EngineViewport,
        behavior: BehaviorId,
    ) -> Result<BehaviorCookie, EngineError>;
    /// Detaches a behavior from a viewport.
    fn remove_behavior(
        &self,
        viewport: EngineViewport,
        cookie: BehaviorCookie,
    ) -> Result<(), EngineError>;
    /// Configures an auto-scroll behavior.
    fn configure_auto_scroll(
        &self,
        behavior: BehaviorId,
        axis: Axis,
        motion: AutoScrollMotion,
    ) -> Result<ConfigureResponse, EngineError>;

    /// Starts tracking a contact.
    fn set_contact(&self, viewport: EngineViewport, contact: ContactId) -> Result<(), EngineError>;
    /// Stops tracking a contact.
    fn release_contact(
        &self,
        viewport: EngineViewport,
        contact: ContactId,
    ) -> Result<(), EngineError>;
    /// Stops tracking every contact.
    fn release_all_contacts(&self, viewport: EngineViewport) -> Result<(), EngineError>;
    /// Feeds a keyboard or wheel message to the engine. Returns whether it was consumed.
    fn process_input(
        &self,
        viewport: EngineViewport,
        message: &InputMessage,
    ) -> Result<bool, EngineError>;

    /// Advances every viewport to the frame described by `frame`.
    fn update(&self, frame: &dyn FrameInfoProvider) -> Result<(), EngineError>;

    /// Subscribes to a viewport's notifications.
    fn add_event_handler(
        &self,
        viewport: EngineViewport,
        handler: Arc<dyn ViewportEventHandler>,
    ) -> Result<HandlerCookie, EngineError>;
    /// Unsubscribes from a viewport's notifications.
    fn remove_event_handler(
        &self,
        viewport: EngineViewport,
        cookie: HandlerCookie,
    ) -> Result<(), EngineError>;
}
