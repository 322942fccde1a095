// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Overpan reflexes: curve pairs that replace the engine's rubber-band effect.
//!
//! When a viewport asks for a custom [`OverpanMode`] on either axis, the
//! coordinator attaches an overpan behavior that switches the engine's own
//! overpan off for those axes and creates two reflex contents per content
//! category:
//!
//! - The **secondary reflex** clamps translation to the pannable range, so the
//!   content stops at its edges. Axes left on [`OverpanMode::Default`] pass
//!   through.
//! - The **primary reflex** renders overpan beyond the range. It is the
//!   identity for [`OverpanMode::Suppress`]. For [`OverpanMode::Compress`] it
//!   scales the content down about a centerpoint placed beyond the overpanned
//!   edge.
//!
//! The rendered transform is the secondary reflex followed by the primary
//! reflex. See [`compose_reflex`].

use kurbo::{Affine, Rect, Vec2};
use tracing::{debug, trace};

use crate::curve::{CurveSegment, CurveSet, Property};
use crate::engine::{
    BehaviorCookie, BehaviorKind, Engine, EngineContent, EngineError, EngineViewport,
};
use crate::options::OverpanTuning;
use crate::types::{Axis, ContentType, OverpanMode};

/// Bounds and display information the reflex curves are computed from.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReflexGeometry {
    /// Viewport rectangle.
    pub viewport: Rect,
    /// Primary content rectangle.
    pub content: Rect,
    /// Distance from the overpanned edge to the compression centerpoint.
    ///
    /// `None` when the display geometry could not be obtained.
    pub centerpoint_offset: Option<f64>,
}

impl ReflexGeometry {
    /// Range of primary translations along `axis` that keep the content inside the viewport.
    #[must_use]
    pub fn translation_range(&self, axis: Axis) -> (f64, f64) {
        let (view, offset, extent) = match axis {
            Axis::Horizontal => (self.viewport.width(), self.content.x0, self.content.width()),
            Axis::Vertical => (self.viewport.height(), self.content.y0, self.content.height()),
        };
        let max = -offset;
        (max + (view - extent).min(0.0), max)
    }

    fn viewport_extent(&self, axis: Axis) -> f64 {
        match axis {
            Axis::Horizontal => self.viewport.width(),
            Axis::Vertical => self.viewport.height(),
        }
    }
}

/// Distance from an overpanned edge to the compression centerpoint.
///
/// This is the logical display height scaled by
/// [`OverpanTuning::centerpoint_scale_factor`]. Returns `None` when the
/// display height or the zoom scale is not positive.
#[must_use]
pub fn centerpoint_offset(
    display_height: Option<f64>,
    zoom_scale: f64,
    tuning: &OverpanTuning,
) -> Option<f64> {
    let height = display_height.filter(|h| *h > 0.0)?;
    (zoom_scale > 0.0).then(|| height / zoom_scale * tuning.centerpoint_scale_factor)
}

/// Combines a primary and a secondary reflex transform.
///
/// The secondary reflex is applied first. The product is not commutative.
#[must_use]
pub fn compose_reflex(primary: Affine, secondary: Affine) -> Affine {
    primary * secondary
}

fn translation(axis: Axis) -> Property {
    match axis {
        Axis::Horizontal => Property::TranslationX,
        Axis::Vertical => Property::TranslationY,
    }
}

/// Whether content of `category` ignores primary motion along `axis`.
fn is_pinned(category: ContentType, axis: Axis) -> bool {
    matches!(
        (category, axis),
        (ContentType::TopHeader, Axis::Vertical) | (ContentType::LeftHeader, Axis::Horizontal)
    )
}

/// Curves clamping translation to the pannable range.
#[must_use]
pub fn secondary_reflex_curves(
    category: ContentType,
    horizontal: OverpanMode,
    vertical: OverpanMode,
    geometry: &ReflexGeometry,
    tuning: &OverpanTuning,
) -> CurveSet {
    let mut set = CurveSet::new();
    for (axis, mode) in [(Axis::Horizontal, horizontal), (Axis::Vertical, vertical)] {
        let property = translation(axis);
        if is_pinned(category, axis) {
            set.push(CurveSegment::constant(property, 0.0, 0.0));
        } else if mode.is_custom() && geometry.centerpoint_offset.is_some() {
            let (min, max) = geometry.translation_range(axis);
            set.push(CurveSegment::constant(
                property,
                min - tuning.min_overpan_distance,
                min,
            ));
            set.push(CurveSegment::linear(property, min, min, 1.0));
            set.push(CurveSegment::constant(property, max, max));
        } else {
            set.push(CurveSegment::linear(property, 0.0, 0.0, 1.0));
        }
    }
    set.push(CurveSegment::linear(Property::Zoom, 0.0, 0.0, 1.0));
    set
}

/// Curves rendering overpan beyond the pannable range.
///
/// When both axes compress, the horizontal axis drives the compression.
#[must_use]
pub fn primary_reflex_curves(
    category: ContentType,
    horizontal: OverpanMode,
    vertical: OverpanMode,
    geometry: &ReflexGeometry,
    tuning: &OverpanTuning,
) -> CurveSet {
    let driver = if horizontal == OverpanMode::Compress {
        Some(Axis::Horizontal)
    } else if vertical == OverpanMode::Compress {
        Some(Axis::Vertical)
    } else {
        None
    };
    let (Some(axis), Some(offset)) = (driver, geometry.centerpoint_offset) else {
        return identity_reflex();
    };
    let other = match axis {
        Axis::Horizontal => Axis::Vertical,
        Axis::Vertical => Axis::Horizontal,
    };

    let source = translation(axis);
    let (min, max) = geometry.translation_range(axis);
    let distance = tuning.max_overpan_distance;
    let full = tuning.scale_overpan_value;
    let slope = (1.0 - full) / distance;
    // (begin, zoom at begin, zoom slope, centerpoint along the driving axis)
    let leading = -offset;
    let trailing = geometry.viewport_extent(axis) + offset;
    let pieces = [
        (min - distance - tuning.min_overpan_distance, full, 0.0, leading),
        (min - distance, full, slope, leading),
        (min, 1.0, 0.0, leading),
        (max, 1.0, -slope, trailing),
        (max + distance, full, 0.0, trailing),
    ];
    let across = geometry.viewport_extent(other) / 2.0;

    let mut set = CurveSet::new();
    for (begin, zoom, zoom_slope, _) in pieces {
        set.push(CurveSegment::linear(Property::Zoom, begin, zoom, zoom_slope).with_source(source));
    }
    // Scaling by z about c translates by c * (1 - z).
    let mut push_translation = |target: Axis, center: Option<f64>| {
        let property = translation(target);
        if is_pinned(category, target) {
            set.push(CurveSegment::constant(property, 0.0, 0.0));
            return;
        }
        for (begin, zoom, zoom_slope, edge) in pieces {
            let c = center.unwrap_or(edge);
            set.push(
                CurveSegment::linear(property, begin, c * (1.0 - zoom), -c * zoom_slope)
                    .with_source(source),
            );
        }
    };
    push_translation(axis, None);
    push_translation(other, Some(across));
    set
}

/// Reflex curves that leave the secondary reflex output unchanged.
fn identity_reflex() -> CurveSet {
    CurveSet::new()
        .with(CurveSegment::constant(Property::TranslationX, 0.0, 0.0))
        .with(CurveSegment::constant(Property::TranslationY, 0.0, 0.0))
        .with(CurveSegment::constant(Property::Zoom, 0.0, 1.0))
}

/// The two reflex contents of one content category.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct ReflexPair {
    pub(crate) primary: EngineContent,
    pub(crate) secondary: EngineContent,
}

/// Overpan reflex state of one viewport.
///
/// Lives in the coordinator's shared reflex table; the compositor bridge
/// reads it from the render thread.
#[derive(Debug)]
pub(crate) struct OverpanReflexState {
    pub(crate) horizontal: OverpanMode,
    pub(crate) vertical: OverpanMode,
    pub(crate) zoom_scale: f64,
    pub(crate) behavior: Option<BehaviorCookie>,
    pub(crate) content: ReflexPair,
    pub(crate) top_header: ReflexPair,
    pub(crate) left_header: ReflexPair,
    pub(crate) dirty: bool,
}

/// Snapshot of a viewport's overpan reflex state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OverpanDebugInfo {
    /// Horizontal mode last requested.
    pub horizontal: OverpanMode,
    /// Vertical mode last requested.
    pub vertical: OverpanMode,
    /// Zoom scale the centerpoint offset is computed with.
    pub zoom_scale: f64,
    /// Whether an overpan behavior is attached.
    pub has_behavior: bool,
    /// Whether the behavior must be rebuilt when the next manipulation starts.
    pub dirty: bool,
}

impl OverpanReflexState {
    /// Creates the six reflex contents and attaches them to `viewport`.
    pub(crate) fn create<E: Engine + ?Sized>(
        engine: &E,
        viewport: EngineViewport,
        horizontal: OverpanMode,
        vertical: OverpanMode,
        zoom_scale: f64,
    ) -> Result<Self, EngineError> {
        let pair = || -> Result<ReflexPair, EngineError> {
            let primary = engine.create_content()?;
            engine.add_content(viewport, primary)?;
            let secondary = engine.create_content()?;
            engine.add_content(viewport, secondary)?;
            Ok(ReflexPair { primary, secondary })
        };
        Ok(Self {
            horizontal,
            vertical,
            zoom_scale,
            behavior: None,
            content: pair()?,
            top_header: pair()?,
            left_header: pair()?,
            dirty: false,
        })
    }

    pub(crate) fn has_custom_mode(&self) -> bool {
        self.horizontal.is_custom() || self.vertical.is_custom()
    }

    /// The reflex pair rendering content of `category`, if it has one.
    pub(crate) fn pair(&self, category: ContentType) -> Option<ReflexPair> {
        match category {
            ContentType::Primary | ContentType::Custom => Some(self.content),
            ContentType::TopHeader => Some(self.top_header),
            ContentType::LeftHeader => Some(self.left_header),
            ContentType::TopLeftHeader | ContentType::Descendant => None,
        }
    }

    fn categories(&self) -> [(ContentType, ReflexPair); 3] {
        [
            (ContentType::Primary, self.content),
            (ContentType::TopHeader, self.top_header),
            (ContentType::LeftHeader, self.left_header),
        ]
    }

    pub(crate) fn debug_info(&self) -> OverpanDebugInfo {
        OverpanDebugInfo {
            horizontal: self.horizontal,
            vertical: self.vertical,
            zoom_scale: self.zoom_scale,
            has_behavior: self.behavior.is_some(),
            dirty: self.dirty,
        }
    }

    /// Attaches an overpan behavior for the current modes.
    pub(crate) fn attach_behavior<E: Engine + ?Sized>(
        &mut self,
        engine: &E,
        viewport: EngineViewport,
    ) -> Result<(), EngineError> {
        debug_assert!(self.has_custom_mode(), "overpan behavior needs a custom mode");
        debug_assert!(self.behavior.is_none(), "overpan behavior already attached");
        let behavior = engine.create_behavior(BehaviorKind::Overpan {
            horizontal: self.horizontal,
            vertical: self.vertical,
        })?;
        self.behavior = Some(engine.add_behavior(viewport, behavior)?);
        Ok(())
    }

    /// Detaches the overpan behavior, if any.
    pub(crate) fn detach_behavior<E: Engine + ?Sized>(
        &mut self,
        engine: &E,
        viewport: EngineViewport,
    ) -> Result<(), EngineError> {
        if let Some(cookie) = self.behavior.take() {
            engine.remove_behavior(viewport, cookie)?;
        }
        Ok(())
    }

    /// Recomputes every reflex curve from the current viewport and content bounds.
    pub(crate) fn refresh_curves<E: Engine + ?Sized>(
        &self,
        engine: &E,
        viewport: EngineViewport,
        display_height: Option<f64>,
        tuning: &OverpanTuning,
    ) -> Result<(), EngineError> {
        let viewport_rect = engine.viewport_rect(viewport)?;
        let content_rect = engine.content_rect(engine.primary_content(viewport)?)?;
        if viewport_rect.area() == 0.0 {
            debug!(?viewport, "skipping overpan curves for an empty viewport");
            return Ok(());
        }
        let geometry = ReflexGeometry {
            viewport: viewport_rect,
            content: content_rect,
            centerpoint_offset: centerpoint_offset(display_height, self.zoom_scale, tuning),
        };
        trace!(?viewport, ?geometry, "refreshing overpan curves");
        for (category, pair) in self.categories() {
            let primary =
                primary_reflex_curves(category, self.horizontal, self.vertical, &geometry, tuning);
            engine.set_curves(pair.primary, &primary, Vec2::ZERO)?;
            let secondary =
                secondary_reflex_curves(category, self.horizontal, self.vertical, &geometry, tuning);
            engine.set_curves(pair.secondary, &secondary, Vec2::ZERO)?;
        }
        Ok(())
    }

    /// Detaches the behavior and releases every reflex content.
    ///
    /// Every content is released even when an earlier step fails; the first
    /// failure is returned.
    pub(crate) fn release<E: Engine + ?Sized>(
        mut self,
        engine: &E,
        viewport: EngineViewport,
    ) -> Result<(), EngineError> {
        let mut result = self.detach_behavior(engine, viewport);
        for (_, pair) in self.categories() {
            for content in [pair.primary, pair.secondary] {
                let removed = engine
                    .remove_content(viewport, content)
                    .and_then(|()| engine.release_content(content));
                if let Err(err) = removed {
                    debug!(?viewport, ?content, %err, "reflex content release failed");
                    result = result.and(Err(err));
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry(offset: Option<f64>) -> ReflexGeometry {
        ReflexGeometry {
            viewport: Rect::new(0.0, 0.0, 100.0, 200.0),
            content: Rect::new(0.0, 0.0, 400.0, 1000.0),
            centerpoint_offset: offset,
        }
    }

    fn at(x: f64, y: f64) -> impl Fn(Property) -> f64 {
        move |p| match p {
            Property::TranslationX => x,
            Property::TranslationY => y,
            Property::Zoom => 1.0,
        }
    }

    #[test]
    fn translation_range_covers_scrollable_extent() {
        let g = geometry(Some(1.0));
        assert_eq!(g.translation_range(Axis::Horizontal), (-300.0, 0.0));
        assert_eq!(g.translation_range(Axis::Vertical), (-800.0, 0.0));

        let small = ReflexGeometry {
            content: Rect::new(10.0, 0.0, 60.0, 50.0),
            ..g
        };
        assert_eq!(small.translation_range(Axis::Horizontal), (-10.0, -10.0));
    }

    #[test]
    fn centerpoint_offset_is_positive_with_a_display() {
        let tuning = OverpanTuning::default();
        let offset = centerpoint_offset(Some(1080.0), 2.0, &tuning).unwrap();
        assert!(offset > 0.0);
        assert!((offset - 540.0 * 1.94).abs() < 1e-9);
        assert_eq!(centerpoint_offset(None, 1.0, &tuning), None);
        assert_eq!(centerpoint_offset(Some(1080.0), 0.0, &tuning), None);
    }

    #[test]
    fn suppress_clamps_secondary_translation() {
        let tuning = OverpanTuning::default();
        let set = secondary_reflex_curves(
            ContentType::Primary,
            OverpanMode::Suppress,
            OverpanMode::Default,
            &geometry(Some(500.0)),
            &tuning,
        );
        assert_eq!(set.evaluate(Property::TranslationX, at(40.0, 0.0)), Some(0.0));
        assert_eq!(set.evaluate(Property::TranslationX, at(-150.0, 0.0)), Some(-150.0));
        assert_eq!(set.evaluate(Property::TranslationX, at(-900.0, 0.0)), Some(-300.0));
        // Vertical stays on the engine's overpan.
        assert_eq!(set.evaluate(Property::TranslationY, at(0.0, 75.0)), Some(75.0));
    }

    #[test]
    fn headers_are_pinned_across_their_axis() {
        let tuning = OverpanTuning::default();
        let g = geometry(Some(500.0));
        let top = secondary_reflex_curves(
            ContentType::TopHeader,
            OverpanMode::Suppress,
            OverpanMode::Suppress,
            &g,
            &tuning,
        );
        assert_eq!(top.evaluate(Property::TranslationY, at(0.0, -300.0)), Some(0.0));
        assert_eq!(top.evaluate(Property::TranslationX, at(-20.0, 0.0)), Some(-20.0));
        let left = secondary_reflex_curves(
            ContentType::LeftHeader,
            OverpanMode::Suppress,
            OverpanMode::Suppress,
            &g,
            &tuning,
        );
        assert_eq!(left.evaluate(Property::TranslationX, at(-20.0, 0.0)), Some(0.0));
    }

    #[test]
    fn suppress_has_identity_primary_reflex() {
        let tuning = OverpanTuning::default();
        let set = primary_reflex_curves(
            ContentType::Primary,
            OverpanMode::Suppress,
            OverpanMode::Suppress,
            &geometry(Some(500.0)),
            &tuning,
        );
        let source = at(90.0, -950.0);
        assert_eq!(set.evaluate(Property::Zoom, &source), Some(1.0));
        assert_eq!(set.evaluate(Property::TranslationX, &source), Some(0.0));
        assert_eq!(set.evaluate(Property::TranslationY, &source), Some(0.0));
    }

    #[test]
    fn compress_scales_down_with_overpan() {
        let tuning = OverpanTuning::default();
        let g = geometry(Some(500.0));
        let set = primary_reflex_curves(
            ContentType::Primary,
            OverpanMode::Default,
            OverpanMode::Compress,
            &g,
            &tuning,
        );
        let zoom = |y: f64| set.evaluate(Property::Zoom, at(0.0, y)).unwrap();
        assert_eq!(zoom(-400.0), 1.0);
        assert!((zoom(100.0) - 0.955).abs() < 1e-9, "halfway to full compression");
        assert!((zoom(250.0) - 0.91).abs() < 1e-9);
        assert!((zoom(-1200.0) - 0.91).abs() < 1e-9);

        // Pulling down scales about a point below the viewport.
        let ty = set.evaluate(Property::TranslationY, at(0.0, 100.0)).unwrap();
        assert!((ty - 700.0 * 0.045).abs() < 1e-9);
        // The other axis scales about the viewport center.
        let tx = set.evaluate(Property::TranslationX, at(0.0, 100.0)).unwrap();
        assert!((tx - 50.0 * 0.045).abs() < 1e-9);
    }

    #[test]
    fn curves_degrade_without_display_geometry() {
        let tuning = OverpanTuning::default();
        let g = geometry(None);
        let secondary = secondary_reflex_curves(
            ContentType::Primary,
            OverpanMode::Compress,
            OverpanMode::Suppress,
            &g,
            &tuning,
        );
        assert_eq!(secondary.evaluate(Property::TranslationX, at(55.0, 0.0)), Some(55.0));
        assert_eq!(secondary.evaluate(Property::TranslationY, at(0.0, -999.0)), Some(-999.0));
        let primary = primary_reflex_curves(
            ContentType::Primary,
            OverpanMode::Compress,
            OverpanMode::Suppress,
            &g,
            &tuning,
        );
        assert_eq!(primary.evaluate(Property::Zoom, at(55.0, 0.0)), Some(1.0));
    }

    #[test]
    fn composition_order_matters() {
        let a = Affine::scale(0.5);
        let b = Affine::translate((10.0, 0.0));
        assert_ne!(compose_reflex(a, b), compose_reflex(b, a));
        // The secondary reflex is applied first.
        let p = compose_reflex(a, b) * kurbo::Point::new(0.0, 0.0);
        assert_eq!(p, kurbo::Point::new(5.0, 0.0));
    }
}
