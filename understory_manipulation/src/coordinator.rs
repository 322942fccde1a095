// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The coordinator facade used by the owning control.

use core::fmt::{self, Debug};
use core::hash::Hash;
use std::sync::Arc;

use kurbo::{Affine, Rect, Vec2};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::behavior::{AutoScrollState, AutoScrollStatus, DragDropState};
use crate::compositor::{
    CompositorBridge, CompositorContent, CompositorViewport, Shared, resolve_transform,
};
use crate::configuration::{
    Configuration, ConfigurationOutcome, CrossSlideKind, EngineConfiguration,
    accepts_configuration, outcome_of,
};
use crate::curve::CurveSet;
use crate::engine::{
    ContactId, Engine, EngineError, EngineStatus, EngineViewport, GestureConfiguration,
    ViewportEventHandler,
};
use crate::error::{Error, Result};
use crate::input::{ContactOutcome, InputMessage, route};
use crate::listener::ViewportListener;
use crate::options::CoordinatorOptions;
use crate::overpan::{OverpanDebugInfo, OverpanReflexState};
use crate::registry::{Registry, Viewport};
use crate::secondary::{DeferredRelease, SecondaryContent};
use crate::status::{present_polled, present_transition};
use crate::types::{
    Alignment, Axis, ContentTransform, ContentType, DragDropStatus, InteractionType, MotionTypes,
    OverpanMode, SnapCoordinate, SnapPointsType, ViewportStatus,
};

#[derive(Copy, Clone, Debug)]
enum EngineEvent {
    Status {
        viewport: EngineViewport,
        current: EngineStatus,
        previous: EngineStatus,
    },
    Interaction {
        viewport: EngineViewport,
        interaction: InteractionType,
    },
    DragDrop {
        viewport: EngineViewport,
        current: DragDropStatus,
        previous: DragDropStatus,
    },
    /// Everything queued before this was caused by what ran before the activation.
    AutoScrollArmed { generation: u64 },
}

/// Queues engine notifications until the owning thread pumps them.
#[derive(Debug, Default)]
struct EventQueue {
    events: Mutex<Vec<EngineEvent>>,
}

impl EventQueue {
    fn push(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }

    fn drain(&self) -> Vec<EngineEvent> {
        core::mem::take(&mut *self.events.lock())
    }
}

impl ViewportEventHandler for EventQueue {
    fn status_changed(&self, viewport: EngineViewport, current: EngineStatus, previous: EngineStatus) {
        self.push(EngineEvent::Status {
            viewport,
            current,
            previous,
        });
    }

    fn interaction_changed(&self, viewport: EngineViewport, interaction: InteractionType) {
        self.push(EngineEvent::Interaction {
            viewport,
            interaction,
        });
    }

    fn drag_drop_status_changed(
        &self,
        viewport: EngineViewport,
        current: DragDropStatus,
        previous: DragDropStatus,
    ) {
        self.push(EngineEvent::DragDrop {
            viewport,
            current,
            previous,
        });
    }
}

/// Coordinates manipulation viewports between an owning control, an [`Engine`]
/// and a renderer.
///
/// `K` is the owning control's handle type, used for both viewports and
/// secondary content. All methods are meant to be called from the thread that
/// owns the control; the renderer uses a [`CompositorBridge`] instead.
pub struct Coordinator<K, E: Engine + ?Sized> {
    engine: Arc<E>,
    options: CoordinatorOptions,
    registry: Registry<K>,
    shared: Arc<Shared>,
    events: Arc<EventQueue>,
    auto_scroll: AutoScrollState,
    drag_drop: DragDropState,
}

/// Runs teardown steps to completion, keeping the first failure.
#[derive(Debug, Default)]
struct Teardown {
    first_error: Option<EngineError>,
}

impl Teardown {
    fn step(&mut self, step: &'static str, result: core::result::Result<(), EngineError>) {
        if let Err(err) = result {
            warn!(step, %err, "teardown step failed");
            self.first_error.get_or_insert(err);
        }
    }

    fn finish(self) -> Result<()> {
        match self.first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}

impl<K, E: Engine + ?Sized> Debug for Coordinator<K, E>
where
    K: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("options", &self.options)
            .field("registry", &self.registry)
            .field("auto_scroll", &self.auto_scroll)
            .field("drag_drop", &self.drag_drop)
            .finish_non_exhaustive()
    }
}

impl<K, E> Coordinator<K, E>
where
    K: Copy + Eq + Hash + Debug,
    E: Engine + ?Sized,
{
    /// Creates a coordinator with default options.
    #[must_use]
    pub fn new(engine: Arc<E>) -> Self {
        Self::with_options(engine, CoordinatorOptions::default())
    }

    /// Creates a coordinator.
    #[must_use]
    pub fn with_options(engine: Arc<E>, options: CoordinatorOptions) -> Self {
        Self {
            engine,
            options,
            registry: Registry::default(),
            shared: Arc::default(),
            events: Arc::default(),
            auto_scroll: AutoScrollState::default(),
            drag_drop: DragDropState::default(),
        }
    }

    /// The engine this coordinator drives.
    #[must_use]
    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    /// The coordinator options.
    #[must_use]
    pub fn options(&self) -> &CoordinatorOptions {
        &self.options
    }

    // --- Registry ---

    /// Registers a viewport, creating its engine viewport.
    ///
    /// Registering a handle twice returns the existing engine viewport.
    pub fn register_viewport(&mut self, handle: K) -> Result<EngineViewport> {
        if let Some(viewport) = self.registry.get(handle) {
            return Ok(viewport.engine);
        }
        let engine_viewport = self.engine.create_viewport()?;
        let sink: Arc<dyn ViewportEventHandler> = self.events.clone();
        let cookie = match self.engine.add_event_handler(engine_viewport, sink) {
            Ok(cookie) => cookie,
            Err(err) => {
                let _ = self.engine.abandon_viewport(engine_viewport);
                return Err(err.into());
            }
        };
        self.registry
            .insert(handle, Viewport::new(engine_viewport, cookie));
        debug!(?handle, ?engine_viewport, "viewport registered");
        Ok(engine_viewport)
    }

    /// Unregisters a viewport.
    ///
    /// Detaches every behavior, releases every owned content and abandons the
    /// engine viewport, even in the middle of a manipulation. Teardown runs to
    /// the end when a step fails; the first failure is returned afterwards.
    pub fn unregister_viewport(&mut self, handle: K) -> Result<()> {
        let viewport = self
            .registry
            .remove(handle)
            .ok_or(Error::ViewportNotRegistered)?;
        let engine = &*self.engine;
        let engine_viewport = viewport.engine;
        debug!(?handle, ?engine_viewport, "unregistering viewport");

        let mut teardown = Teardown::default();
        teardown.step(
            "remove event handler",
            engine.remove_event_handler(engine_viewport, viewport.handler),
        );
        {
            let mut reflexes = self.shared.reflexes.lock();
            if let Some(state) = reflexes.remove(&engine_viewport) {
                teardown.step("release overpan reflexes", state.release(engine, engine_viewport));
            }
        }
        teardown.step(
            "detach auto-scroll",
            self.auto_scroll.detach_from(engine, engine_viewport),
        );
        teardown.step(
            "detach drag-drop",
            self.drag_drop.detach_from(engine, engine_viewport).map(drop),
        );
        for record in viewport.secondary.values().chain(viewport.clip.values()) {
            teardown.step(
                "remove secondary content",
                engine.remove_content(engine_viewport, record.content),
            );
            teardown.step(
                "release secondary content",
                engine.release_content(record.content),
            );
        }
        teardown.step("abandon viewport", engine.abandon_viewport(engine_viewport));
        teardown.finish()
    }

    /// Returns `true` if `handle` is registered.
    #[must_use]
    pub fn is_registered(&self, handle: K) -> bool {
        self.registry.get(handle).is_some()
    }

    /// The engine viewport of a registered handle.
    #[must_use]
    pub fn engine_viewport(&self, handle: K) -> Option<EngineViewport> {
        self.registry.get(handle).map(|v| v.engine)
    }

    /// The caller handle of an engine viewport.
    #[must_use]
    pub fn viewport_handle(&self, viewport: EngineViewport) -> Option<K> {
        self.registry.handle_of(viewport)
    }

    /// Number of registered viewports.
    #[must_use]
    pub fn viewport_count(&self) -> usize {
        self.registry.len()
    }

    /// Registered viewport handles, in no particular order.
    pub fn viewport_handles(&self) -> impl Iterator<Item = K> + '_ {
        self.registry.handles()
    }

    fn viewport(&self, handle: K) -> Result<&Viewport<K>> {
        self.registry.get(handle).ok_or(Error::ViewportNotRegistered)
    }

    fn engine_viewport_of(&self, handle: K) -> Result<EngineViewport> {
        self.viewport(handle).map(|v| v.engine)
    }

    // --- Configuration ---

    /// Adds a configuration the viewport may use, registering the viewport if needed.
    pub fn add_viewport_configuration(
        &mut self,
        handle: K,
        configuration: Configuration,
    ) -> Result<ConfigurationOutcome> {
        let viewport = self.register_viewport(handle)?;
        self.configure(viewport, configuration, |engine, vp, c| {
            engine.add_configuration(vp, c)
        })
    }

    /// Removes a configuration.
    pub fn remove_viewport_configuration(
        &mut self,
        handle: K,
        configuration: Configuration,
    ) -> Result<ConfigurationOutcome> {
        let viewport = self.engine_viewport_of(handle)?;
        self.configure(viewport, configuration, |engine, vp, c| {
            engine.remove_configuration(vp, c)
        })
    }

    /// Makes a configuration current.
    pub fn activate_viewport_configuration(
        &mut self,
        handle: K,
        configuration: Configuration,
    ) -> Result<ConfigurationOutcome> {
        let viewport = self.engine_viewport_of(handle)?;
        let outcome = self.configure(viewport, configuration, |engine, vp, c| {
            engine.activate_configuration(vp, c)
        })?;
        if outcome == ConfigurationOutcome::Applied
            && let Some(record) = self.registry.get_mut(handle)
        {
            record.active = configuration;
        }
        Ok(outcome)
    }

    fn configure(
        &self,
        viewport: EngineViewport,
        configuration: Configuration,
        apply: impl FnOnce(&E, EngineViewport, EngineConfiguration) -> core::result::Result<(), EngineError>,
    ) -> Result<ConfigurationOutcome> {
        let status = self.engine.viewport_status(viewport)?;
        if !accepts_configuration(status) {
            debug!(?viewport, ?status, "configuration not applicable while active");
            return Ok(ConfigurationOutcome::NotApplicable);
        }
        let outcome = outcome_of(apply(&*self.engine, viewport, configuration.into()))?;
        if outcome == ConfigurationOutcome::NotApplicable {
            debug!(?viewport, ?configuration, "viewport sealed during configuration");
        }
        Ok(outcome)
    }

    /// Registers a zero-sized cross-slide viewport.
    pub fn add_cross_slide_configuration(&mut self, handle: K, kind: CrossSlideKind) -> Result<()> {
        let viewport = self.register_viewport(handle)?;
        let engine = &*self.engine;
        match kind {
            CrossSlideKind::PanX | CrossSlideKind::PanY => {
                let (configuration, motion, perpendicular) = if kind == CrossSlideKind::PanX {
                    (
                        EngineConfiguration::TRANSLATION_X,
                        MotionTypes::TRANSLATE_X,
                        GestureConfiguration::CROSS_SLIDE_VERTICAL,
                    )
                } else {
                    (
                        EngineConfiguration::TRANSLATION_Y,
                        MotionTypes::TRANSLATE_Y,
                        GestureConfiguration::CROSS_SLIDE_HORIZONTAL,
                    )
                };
                engine.activate_configuration(viewport, configuration)?;
                engine.set_chaining(viewport, motion)?;
                engine.set_manual_gestures(viewport, GestureConfiguration::DEFAULT | perpendicular)?;
            }
            CrossSlideKind::PanXY => {
                engine.set_manual_input(viewport, true)?;
                engine.activate_configuration(viewport, EngineConfiguration::empty())?;
            }
            CrossSlideKind::Zoom => {
                engine.activate_configuration(viewport, EngineConfiguration::empty())?;
                engine.set_manual_gestures(
                    viewport,
                    GestureConfiguration::DEFAULT | GestureConfiguration::PINCH_ZOOM,
                )?;
            }
            CrossSlideKind::DragDrop => self.drag_drop.attach(engine, viewport)?,
        }
        if kind != CrossSlideKind::DragDrop {
            engine.set_viewport_rect(viewport, Rect::ZERO)?;
            engine.set_content_rect(engine.primary_content(viewport)?, Rect::ZERO)?;
        }
        if let Some(record) = self.registry.get_mut(handle) {
            record.cross_slide = Some(kind);
        }
        debug!(?handle, ?kind, "cross-slide viewport configured");
        Ok(())
    }

    /// The cross-slide kind `handle` was configured with, if any.
    #[must_use]
    pub fn cross_slide_kind(&self, handle: K) -> Option<CrossSlideKind> {
        self.registry.get(handle)?.cross_slide
    }

    /// Sets whether the viewport's content flows right to left.
    pub fn set_right_to_left(&mut self, handle: K, right_to_left: bool) -> Result<()> {
        let record = self
            .registry
            .get_mut(handle)
            .ok_or(Error::ViewportNotRegistered)?;
        record.right_to_left = right_to_left;
        Ok(())
    }

    /// Sets the motions chained to the parent viewport.
    pub fn set_viewport_chaining(&mut self, handle: K, motion: MotionTypes) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        Ok(self.engine.set_chaining(viewport, motion)?)
    }

    /// Sets the primary content alignment.
    pub fn set_content_alignment(
        &mut self,
        handle: K,
        horizontal: Alignment,
        vertical: Alignment,
    ) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        Ok(self.engine.set_alignment(viewport, horizontal, vertical)?)
    }

    /// Sets regularly spaced snap points along `axis`.
    pub fn set_snap_points_interval(
        &mut self,
        handle: K,
        axis: Axis,
        interval: f64,
        offset: f64,
    ) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        Ok(self
            .engine
            .set_snap_interval(viewport, MotionTypes::translation(axis), interval, offset)?)
    }

    /// Sets irregular snap points along `axis`.
    pub fn set_snap_points(&mut self, handle: K, axis: Axis, points: &[f64]) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        Ok(self
            .engine
            .set_snap_points(viewport, MotionTypes::translation(axis), points)?)
    }

    /// Sets how snap points along `axis` are honored.
    pub fn set_snap_points_type(
        &mut self,
        handle: K,
        axis: Axis,
        kind: SnapPointsType,
    ) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        Ok(self
            .engine
            .set_snap_type(viewport, MotionTypes::translation(axis), kind)?)
    }

    /// Sets the reference frame of snap points along `axis`.
    pub fn set_snap_points_coordinate(
        &mut self,
        handle: K,
        axis: Axis,
        coordinate: SnapCoordinate,
        origin: f64,
    ) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        Ok(self.engine.set_snap_coordinate(
            viewport,
            MotionTypes::translation(axis),
            coordinate,
            origin,
        )?)
    }

    /// Sets the zoom range.
    pub fn set_zoom_boundaries(&mut self, handle: K, min_zoom: f64, max_zoom: f64) -> Result<()> {
        debug_assert!(min_zoom > 0.0 && min_zoom <= max_zoom, "invalid zoom range");
        let viewport = self.engine_viewport_of(handle)?;
        Ok(self
            .engine
            .set_zoom_boundaries(viewport, min_zoom, max_zoom)?)
    }

    /// Moves the primary content to the given translation and zoom.
    pub fn set_primary_content_transform(
        &mut self,
        handle: K,
        translation: Vec2,
        zoom: f64,
    ) -> Result<()> {
        debug_assert!(zoom > 0.0, "zoom must be positive");
        let viewport = self.engine_viewport_of(handle)?;
        let transform = Affine::new([zoom, 0.0, 0.0, zoom, translation.x, translation.y]);
        Ok(self.engine.sync_content_transform(viewport, transform)?)
    }

    /// Scrolls and zooms so that `bounds` fills the viewport.
    pub fn bring_into_viewport(&mut self, handle: K, bounds: Rect, animate: bool) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        Ok(self.engine.zoom_to_rect(viewport, bounds, animate)?)
    }

    // --- Bounds ---

    /// Sets the viewport rectangle.
    ///
    /// The origin is rounded to the nearest pixel and the size down to whole
    /// pixels, keeping at least one pixel for any positive size.
    pub fn set_viewport_bounds(&mut self, handle: K, bounds: Rect) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        let floor_size = |size: f64| {
            if size > 0.0 && size < 1.0 {
                1.0
            } else {
                size.floor()
            }
        };
        let x0 = bounds.x0.round();
        let y0 = bounds.y0.round();
        let rect = Rect::new(
            x0,
            y0,
            x0 + floor_size(bounds.width()),
            y0 + floor_size(bounds.height()),
        );
        trace!(?handle, ?rect, "viewport bounds");
        Ok(self.engine.set_viewport_rect(viewport, rect)?)
    }

    /// The viewport rectangle.
    pub fn viewport_bounds(&self, handle: K) -> Result<Rect> {
        let viewport = self.engine_viewport_of(handle)?;
        Ok(self.engine.viewport_rect(viewport)?)
    }

    /// Sets the primary content rectangle and refreshes overpan curves.
    ///
    /// The origin is rounded to the nearest pixel and the size up to whole pixels.
    pub fn set_content_bounds(&mut self, handle: K, bounds: Rect) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        let x0 = bounds.x0.round();
        let y0 = bounds.y0.round();
        let rect = Rect::new(
            x0,
            y0,
            x0 + bounds.width().ceil(),
            y0 + bounds.height().ceil(),
        );
        trace!(?handle, ?rect, "content bounds");
        self.engine
            .set_content_rect(self.engine.primary_content(viewport)?, rect)?;
        self.refresh_overpan_curves(handle)
    }

    /// The primary content rectangle.
    pub fn content_bounds(&self, handle: K) -> Result<Rect> {
        let viewport = self.engine_viewport_of(handle)?;
        Ok(self
            .engine
            .content_rect(self.engine.primary_content(viewport)?)?)
    }

    // --- Enable, disable, status ---

    /// Enables a Building or Disabled viewport.
    ///
    /// Returns `true` if enabling went through a transient Running status; the
    /// viewport is then re-enabled so that it lands on Enabled.
    pub fn enable_viewport(&mut self, handle: K) -> Result<bool> {
        let viewport = self.engine_viewport_of(handle)?;
        let engine = &*self.engine;
        let status = engine.viewport_status(viewport)?;
        if !matches!(status, EngineStatus::Building | EngineStatus::Disabled) {
            return Ok(false);
        }
        engine.enable_viewport(viewport)?;
        if engine.viewport_status(viewport)? == EngineStatus::Ready {
            engine.disable_viewport(viewport)?;
            engine.enable_viewport(viewport)?;
            debug!(?handle, "enable caused a running status");
            return Ok(true);
        }
        Ok(false)
    }

    /// Disables a viewport unless it is Building or already Disabled.
    pub fn disable_viewport(&mut self, handle: K) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        let status = self.engine.viewport_status(viewport)?;
        if !matches!(status, EngineStatus::Building | EngineStatus::Disabled) {
            self.engine.disable_viewport(viewport)?;
        }
        Ok(())
    }

    /// Interrupts the current manipulation.
    pub fn stop_viewport(&mut self, handle: K) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        Ok(self.engine.stop_viewport(viewport)?)
    }

    /// The viewport status, presenting auto-scroll inertia as
    /// [`ViewportStatus::AutoRunning`].
    pub fn viewport_status(&self, handle: K) -> Result<ViewportStatus> {
        let viewport = self.engine_viewport_of(handle)?;
        let status = self.engine.viewport_status(viewport)?;
        if self.auto_scroll.is_attached_to(viewport) {
            Ok(present_polled(&self.auto_scroll, status))
        } else {
            Ok(status.into())
        }
    }

    /// The transform the primary content is rendered with.
    pub fn primary_content_transform(&self, handle: K) -> Result<ContentTransform> {
        let viewport = self.engine_viewport_of(handle)?;
        let content = self.engine.primary_content(viewport)?;
        Ok(resolve_transform(
            &*self.engine,
            &self.shared,
            viewport,
            content,
            ContentType::Primary,
        )?)
    }

    /// The transform a secondary or clip content is rendered with.
    pub fn secondary_content_transform(
        &self,
        handle: K,
        content: K,
        clip: bool,
    ) -> Result<ContentTransform> {
        let viewport = self.viewport(handle)?;
        let record = viewport
            .contents(clip)
            .get(&content)
            .ok_or(Error::ContentNotRegistered)?;
        Ok(resolve_transform(
            &*self.engine,
            &self.shared,
            viewport.engine,
            record.content,
            record.content_type,
        )?)
    }

    /// Where inertia will leave the primary content, if the viewport is in inertia.
    pub fn inertia_end_transform(&self, handle: K) -> Result<Option<ContentTransform>> {
        let viewport = self.engine_viewport_of(handle)?;
        if self.engine.viewport_status(viewport)? != EngineStatus::Inertia {
            return Ok(None);
        }
        match self.engine.inertia_end_transform(viewport) {
            Ok(affine) => Ok(Some(ContentTransform::from_affine(
                affine,
                affine.as_coeffs()[0],
            ))),
            // The engine may leave inertia between the status check and this call.
            Err(EngineError::NotInInertia) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    // --- Input ---

    /// Routes a keyboard or wheel message to the viewport.
    ///
    /// Returns whether the engine consumed it. Pan keys along an axis the
    /// viewport cannot pan are dropped and reported as not consumed.
    pub fn process_input(&mut self, handle: K, message: InputMessage) -> Result<bool> {
        let viewport = self.viewport(handle)?;
        let engine_viewport = viewport.engine;
        let Some(message) = route(message, viewport.active, viewport.right_to_left) else {
            trace!(?handle, ?message, "pan message dropped");
            return Ok(false);
        };
        let contact = message.contact();
        let engine = &*self.engine;
        engine.set_contact(engine_viewport, contact)?;
        let handled = engine.process_input(engine_viewport, &message);
        engine.release_contact(engine_viewport, contact)?;
        Ok(handled?)
    }

    /// Starts tracking a pointer contact.
    ///
    /// A contact that is already tracked, or that vanished before the engine
    /// saw it, is reported as [`ContactOutcome::Failed`].
    pub fn set_contact(&mut self, handle: K, contact: ContactId) -> Result<ContactOutcome> {
        let viewport = self.engine_viewport_of(handle)?;
        match self.engine.set_contact(viewport, contact) {
            Ok(()) => Ok(ContactOutcome::Tracked),
            Err(err @ (EngineError::ContactAlreadyExists | EngineError::ContactNoLongerExists)) => {
                warn!(?handle, ?contact, %err, "contact not tracked");
                Ok(ContactOutcome::Failed)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Stops tracking a pointer contact.
    pub fn release_contact(&mut self, handle: K, contact: ContactId) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        Ok(self.engine.release_contact(viewport, contact)?)
    }

    /// Stops tracking every contact.
    pub fn release_all_contacts(&mut self, handle: K) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        Ok(self.engine.release_all_contacts(viewport)?)
    }

    // --- Overpan ---

    /// Applies overpan modes to a viewport.
    ///
    /// Switching a viewport to a custom mode creates its reflexes right away.
    /// Later mode changes only take effect when `starting_new_manipulation`
    /// is set, since the engine cannot rebuild behaviors mid-gesture.
    ///
    /// Returns `true` when reflexes were created, so that renderer transforms
    /// must be recreated.
    pub fn apply_overpan_modes(
        &mut self,
        handle: K,
        horizontal: OverpanMode,
        vertical: OverpanMode,
        zoom_scale: f64,
        starting_new_manipulation: bool,
    ) -> Result<bool> {
        debug_assert!(zoom_scale > 0.0, "zoom scale must be positive");
        let viewport = self.engine_viewport_of(handle)?;
        let engine = &*self.engine;
        let display = self.options.display.primary_display_height();
        let tuning = self.options.overpan;

        let mut reflexes = self.shared.reflexes.lock();
        let Some(state) = reflexes.get_mut(&viewport) else {
            if !horizontal.is_custom() && !vertical.is_custom() {
                return Ok(false);
            }
            let mut state =
                OverpanReflexState::create(engine, viewport, horizontal, vertical, zoom_scale)?;
            if let Err(err) = state.attach_behavior(engine, viewport) {
                if let Err(release) = state.release(engine, viewport) {
                    warn!(?handle, %release, "releasing unattached overpan reflexes failed");
                }
                return Err(err.into());
            }
            if starting_new_manipulation {
                state.refresh_curves(engine, viewport, display, &tuning)?;
            } else {
                state.dirty = true;
            }
            reflexes.insert(viewport, state);
            debug!(?handle, ?horizontal, ?vertical, "overpan reflexes created");
            return Ok(true);
        };

        if state.horizontal != horizontal || state.vertical != vertical {
            state.horizontal = horizontal;
            state.vertical = vertical;
            state.dirty = true;
        }
        if starting_new_manipulation && state.dirty {
            state.detach_behavior(engine, viewport)?;
            if state.has_custom_mode() {
                state.attach_behavior(engine, viewport)?;
            }
            state.dirty = false;
            state.refresh_curves(engine, viewport, display, &tuning)?;
            debug!(?handle, ?horizontal, ?vertical, "overpan behavior rebuilt");
        }
        Ok(false)
    }

    /// Recomputes the viewport's overpan curves from its current bounds.
    ///
    /// Does nothing for viewports without overpan reflexes.
    pub fn refresh_overpan_curves(&mut self, handle: K) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        let reflexes = self.shared.reflexes.lock();
        if let Some(state) = reflexes.get(&viewport) {
            state.refresh_curves(
                &*self.engine,
                viewport,
                self.options.display.primary_display_height(),
                &self.options.overpan,
            )?;
        }
        Ok(())
    }

    /// Snapshot of the viewport's overpan reflex state.
    #[must_use]
    pub fn overpan_debug_info(&self, handle: K) -> Option<OverpanDebugInfo> {
        let viewport = self.registry.get(handle)?.engine;
        self.shared
            .reflexes
            .lock()
            .get(&viewport)
            .map(OverpanReflexState::debug_info)
    }

    // --- Auto-scroll and drag-drop ---

    /// Starts or continues auto-scrolling a viewport.
    pub fn activate_auto_scroll(&mut self, handle: K, axis: Axis, forward: bool) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        let generation = self
            .auto_scroll
            .activate(&*self.engine, viewport, axis, forward)?;
        self.events.push(EngineEvent::AutoScrollArmed { generation });
        Ok(())
    }

    /// Requests auto-scroll to stop.
    pub fn stop_auto_scroll(&mut self, handle: K, axis: Axis) -> Result<()> {
        let viewport = self.engine_viewport_of(handle)?;
        trace!(?handle, ?viewport, ?axis, "stop auto-scroll");
        Ok(self.auto_scroll.stop(&*self.engine, axis)?)
    }

    /// Progress of the auto-scroll behavior.
    #[must_use]
    pub fn auto_scroll_status(&self) -> AutoScrollStatus {
        self.auto_scroll.status
    }

    /// Auto-scroll activations whose inertia has not settled yet.
    #[must_use]
    pub fn auto_scroll_activations(&self) -> u32 {
        self.auto_scroll.activations
    }

    /// The viewport auto-scroll is attached to.
    #[must_use]
    pub fn auto_scroll_viewport(&self) -> Option<K> {
        let attached = self.auto_scroll.attached?;
        self.registry.handle_of(attached.viewport)
    }

    /// The viewport carrying the drag-drop behavior.
    #[must_use]
    pub fn drag_drop_viewport(&self) -> Option<K> {
        self.registry.handle_of(self.drag_drop.viewport()?)
    }

    /// Detaches the drag-drop behavior from `handle`. Returns whether it was attached.
    pub fn detach_drag_drop(&mut self, handle: K) -> Result<bool> {
        let viewport = self.engine_viewport_of(handle)?;
        Ok(self.drag_drop.detach_from(&*self.engine, viewport)?)
    }

    // --- Secondary content ---

    /// Chains custom content to the viewport's primary content through `curves`.
    pub fn add_secondary_content(
        &mut self,
        handle: K,
        content: K,
        curves: CurveSet,
        origin: Vec2,
    ) -> Result<()> {
        self.add_content(handle, content, ContentType::Custom, curves, origin, false)
    }

    /// Chains content of a standard type, using that type's default curves.
    pub fn add_secondary_content_for_type(
        &mut self,
        handle: K,
        content: K,
        content_type: ContentType,
    ) -> Result<()> {
        let curves = CurveSet::for_content_type(content_type)
            .ok_or(Error::InvalidContentType(content_type))?;
        self.add_content(handle, content, content_type, curves, Vec2::ZERO, false)
    }

    /// Chains clip content to the viewport's primary content through `curves`.
    pub fn add_secondary_clip_content(
        &mut self,
        handle: K,
        content: K,
        content_type: ContentType,
        curves: CurveSet,
    ) -> Result<()> {
        if content_type == ContentType::Primary {
            return Err(Error::InvalidContentType(content_type));
        }
        self.add_content(handle, content, content_type, curves, Vec2::ZERO, true)
    }

    fn add_content(
        &mut self,
        handle: K,
        content: K,
        content_type: ContentType,
        curves: CurveSet,
        origin: Vec2,
        clip: bool,
    ) -> Result<()> {
        let engine = &*self.engine;
        let viewport = self
            .registry
            .get_mut(handle)
            .ok_or(Error::ViewportNotRegistered)?;
        let engine_viewport = viewport.engine;
        let contents = viewport.contents_mut(clip);
        let engine_content = match contents.get(&content) {
            Some(existing) => existing.content,
            None => {
                let created = engine.create_content()?;
                engine.add_content(engine_viewport, created)?;
                created
            }
        };
        engine.set_curves(engine_content, &curves, origin)?;
        contents.insert(
            content,
            SecondaryContent {
                content: engine_content,
                content_type,
                curves,
            },
        );
        debug!(?handle, ?content, ?content_type, clip, "secondary content added");
        Ok(())
    }

    /// Removes secondary content.
    ///
    /// The content is detached from the viewport immediately. With a
    /// `deferred` token its release waits for
    /// [`DeferredRelease::finalize`]; otherwise it is released now.
    pub fn remove_secondary_content(
        &mut self,
        handle: K,
        content: K,
        deferred: Option<&mut DeferredRelease<E>>,
    ) -> Result<()> {
        self.remove_content(handle, content, deferred, false)
    }

    /// Removes secondary clip content. See [`Self::remove_secondary_content`].
    pub fn remove_secondary_clip_content(
        &mut self,
        handle: K,
        content: K,
        deferred: Option<&mut DeferredRelease<E>>,
    ) -> Result<()> {
        self.remove_content(handle, content, deferred, true)
    }

    fn remove_content(
        &mut self,
        handle: K,
        content: K,
        deferred: Option<&mut DeferredRelease<E>>,
        clip: bool,
    ) -> Result<()> {
        let viewport = self
            .registry
            .get_mut(handle)
            .ok_or(Error::ViewportNotRegistered)?;
        let record = viewport
            .contents_mut(clip)
            .remove(&content)
            .ok_or(Error::ContentNotRegistered)?;
        self.engine.remove_content(viewport.engine, record.content)?;
        let is_deferred = deferred.is_some();
        match deferred {
            Some(token) => token.adopt(&self.engine, record.content),
            None => self.engine.release_content(record.content)?,
        }
        debug!(?handle, ?content, clip, deferred = is_deferred, "secondary content removed");
        Ok(())
    }

    /// The curves driving secondary or clip content.
    #[must_use]
    pub fn secondary_content_curves(&self, handle: K, content: K, clip: bool) -> Option<&CurveSet> {
        self.registry
            .get(handle)?
            .contents(clip)
            .get(&content)
            .map(|record| &record.curves)
    }

    // --- Compositor ---

    /// A bridge for the render thread.
    #[must_use]
    pub fn compositor(&self) -> CompositorBridge<E> {
        CompositorBridge::new(Arc::clone(&self.engine), Arc::clone(&self.shared))
    }

    /// Renderer handle of a viewport.
    pub fn compositor_viewport(&self, handle: K) -> Result<CompositorViewport> {
        Ok(CompositorViewport {
            viewport: self.engine_viewport_of(handle)?,
        })
    }

    /// Renderer handle of a viewport's primary content.
    pub fn compositor_primary_content(&self, handle: K) -> Result<CompositorContent> {
        let viewport = self.engine_viewport_of(handle)?;
        Ok(CompositorContent {
            content: self.engine.primary_content(viewport)?,
            content_type: ContentType::Primary,
        })
    }

    /// Renderer handle of a secondary or clip content.
    pub fn compositor_secondary_content(
        &self,
        handle: K,
        content: K,
        clip: bool,
    ) -> Result<CompositorContent> {
        let record = self
            .viewport(handle)?
            .contents(clip)
            .get(&content)
            .ok_or(Error::ContentNotRegistered)?;
        Ok(CompositorContent {
            content: record.content,
            content_type: record.content_type,
        })
    }

    // --- Notifications ---

    /// Delivers queued engine notifications to `listener`.
    ///
    /// Notifications for viewports that were unregistered in the meantime are
    /// dropped, and status changes that do not change the presented status are
    /// suppressed. Returns the number of notifications delivered.
    pub fn pump_events(&mut self, listener: &mut impl ViewportListener<K>) -> usize {
        let mut delivered = 0;
        for event in self.events.drain() {
            match event {
                EngineEvent::Status {
                    viewport,
                    current,
                    previous,
                } => {
                    let Some(handle) = self.registry.handle_of(viewport) else {
                        debug!(?viewport, ?current, "status for unregistered viewport dropped");
                        continue;
                    };
                    let new = if self.auto_scroll.is_attached_to(viewport) {
                        present_transition(&mut self.auto_scroll, previous, current)
                    } else {
                        current.into()
                    };
                    let Some(record) = self.registry.get_mut(handle) else {
                        continue;
                    };
                    let old = record.presented;
                    if old == new {
                        continue;
                    }
                    if !ViewportStatus::is_expected_transition(old, new) {
                        debug!(?handle, ?old, ?new, "unexpected status transition");
                    }
                    record.presented = new;
                    listener.status_changed(handle, old, new);
                    delivered += 1;
                }
                EngineEvent::Interaction {
                    viewport,
                    interaction,
                } => {
                    let Some(handle) = self.registry.handle_of(viewport) else {
                        continue;
                    };
                    listener.interaction_changed(handle, interaction);
                    delivered += 1;
                }
                EngineEvent::DragDrop {
                    viewport,
                    current,
                    previous,
                } => {
                    let Some(handle) = self.registry.handle_of(viewport) else {
                        continue;
                    };
                    listener.drag_drop_status_changed(handle, current, previous);
                    delivered += 1;
                }
                EngineEvent::AutoScrollArmed { generation } => self.auto_scroll.arm(generation),
            }
        }
        delivered
    }
}
