// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Manipulation Reference Engine.
//!
//! This crate provides a small, stateful implementation of
//! [`Engine`] for **tests and experimentation**.
//!
//! It is intentionally *not* a gesture recognizer:
//! - It does **not** recognize gestures or run inertia physics.
//! - Statuses only change when the coordinator enables, disables or stops a
//!   viewport, or when a test calls [`RefEngine::set_status`].
//! - Content driven by curves is evaluated against the primary transform,
//!   which tests move with [`RefEngine::set_primary_transform`]. Properties
//!   the curves do not drive follow the primary content; content without
//!   curves stays at the identity.
//!
//! Every configuration call is recorded so tests can assert on what the
//! coordinator asked for, through [`RefEngine::snapshot`] and
//! [`RefEngine::content`].

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use kurbo::{Affine, Rect, Vec2};
use parking_lot::Mutex;
use tracing::trace;
use understory_manipulation::curve::{CurveSet, Property};
use understory_manipulation::engine::{
    AutoScrollMotion, BehaviorCookie, BehaviorId, BehaviorKind, ConfigureResponse, ContactId,
    Engine, EngineContent, EngineError, EngineStatus, EngineViewport, FrameInfo,
    FrameInfoProvider, GestureConfiguration, HandlerCookie, ViewportEventHandler,
};
use understory_manipulation::{
    Alignment, Axis, DragDropStatus, EngineConfiguration, InputMessage, InteractionType,
    MotionTypes, SnapCoordinate, SnapPointsType,
};

/// A snap point change recorded by the reference engine.
#[derive(Clone, Debug, PartialEq)]
pub enum SnapSetting {
    /// Regularly spaced snap points.
    Interval {
        /// Motion the snap points apply to.
        motion: MotionTypes,
        /// Spacing.
        interval: f64,
        /// Offset of the first snap point.
        offset: f64,
    },
    /// Irregular snap points.
    Points {
        /// Motion the snap points apply to.
        motion: MotionTypes,
        /// Snap point offsets.
        points: Vec<f64>,
    },
    /// How snap points are honored.
    Type {
        /// Motion the setting applies to.
        motion: MotionTypes,
        /// Snap type.
        kind: SnapPointsType,
    },
    /// Reference frame of snap points.
    Coordinate {
        /// Motion the setting applies to.
        motion: MotionTypes,
        /// Coordinate kind.
        coordinate: SnapCoordinate,
        /// Origin for [`SnapCoordinate::Origin`].
        origin: f64,
    },
}

/// Snapshot of a viewport inside the reference engine.
#[derive(Clone, Debug)]
pub struct ViewportSnapshot {
    /// Current status.
    pub status: EngineStatus,
    /// Union of added configurations.
    pub configurations: EngineConfiguration,
    /// Configuration last activated.
    pub active_configuration: Option<EngineConfiguration>,
    /// Motions chained to the parent viewport.
    pub chaining: MotionTypes,
    /// Gestures set for manual recognition.
    pub manual_gestures: Option<GestureConfiguration>,
    /// Whether input is processed manually.
    pub manual_input: bool,
    /// Viewport rectangle.
    pub rect: Rect,
    /// Primary content handle.
    pub primary_content: EngineContent,
    /// Primary content transform.
    pub primary_transform: Affine,
    /// Zoom range, if set.
    pub zoom_boundaries: Option<(f64, f64)>,
    /// Horizontal and vertical alignment, if set.
    pub alignment: Option<(Alignment, Alignment)>,
    /// Snap point changes, in order.
    pub snap: Vec<SnapSetting>,
    /// Last zoom-to-rect request and whether it was animated.
    pub zoom_to_rect: Option<(Rect, bool)>,
    /// Contacts currently tracked.
    pub contacts: Vec<ContactId>,
    /// Messages fed to the viewport, in order.
    pub inputs: Vec<InputMessage>,
    /// Kinds of the behaviors currently attached.
    pub behaviors: Vec<BehaviorKind>,
    /// Number of subscribed event handlers.
    pub handlers: usize,
    /// Secondary contents currently attached.
    pub contents: Vec<EngineContent>,
}

/// Snapshot of a content object inside the reference engine.
#[derive(Clone, Debug)]
pub struct ContentSnapshot {
    /// Viewport the content is attached to.
    pub viewport: Option<EngineViewport>,
    /// Content rectangle.
    pub rect: Rect,
    /// Curves driving the content.
    pub curves: Option<CurveSet>,
    /// Origin the curves are evaluated about.
    pub origin: Vec2,
    /// Whether the content was released.
    pub released: bool,
}

#[derive(Debug)]
struct ViewportState {
    status: EngineStatus,
    sealed: bool,
    ready_on_enable: bool,
    configurations: EngineConfiguration,
    active_configuration: Option<EngineConfiguration>,
    chaining: MotionTypes,
    manual_gestures: Option<GestureConfiguration>,
    manual_input: bool,
    rect: Rect,
    primary: EngineContent,
    transform: Affine,
    inertia_end: Option<Affine>,
    zoom_boundaries: Option<(f64, f64)>,
    alignment: Option<(Alignment, Alignment)>,
    snap: Vec<SnapSetting>,
    zoom_to_rect: Option<(Rect, bool)>,
    contacts: HashSet<ContactId>,
    inputs: Vec<InputMessage>,
}

#[derive(Debug)]
struct ContentState {
    viewport: Option<EngineViewport>,
    rect: Rect,
    curves: Option<CurveSet>,
    origin: Vec2,
    released: bool,
}

#[derive(Default)]
struct State {
    next_id: u64,
    viewports: HashMap<EngineViewport, ViewportState>,
    abandoned: HashSet<EngineViewport>,
    contents: HashMap<EngineContent, ContentState>,
    behaviors: HashMap<BehaviorId, BehaviorKind>,
    attached: HashMap<BehaviorCookie, (EngineViewport, BehaviorId)>,
    handlers: HashMap<HandlerCookie, (EngineViewport, Arc<dyn ViewportEventHandler>)>,
    auto_scroll_requests: Vec<(Axis, AutoScrollMotion)>,
    auto_scroll_response: Option<ConfigureResponse>,
    contact_failure: Option<EngineError>,
    behavior_failure: Option<EngineError>,
    handler_removal_failure: Option<EngineError>,
    inertia_failure: Option<EngineError>,
    frame_count: usize,
    last_frame: Option<FrameInfo>,
}

impl State {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn viewport(&self, viewport: EngineViewport) -> Result<&ViewportState, EngineError> {
        self.viewports.get(&viewport).ok_or(EngineError::InvalidState)
    }

    fn viewport_mut(&mut self, viewport: EngineViewport) -> Result<&mut ViewportState, EngineError> {
        self.viewports
            .get_mut(&viewport)
            .ok_or(EngineError::InvalidState)
    }

    /// Viewport that accepts configuration.
    fn configurable(&mut self, viewport: EngineViewport) -> Result<&mut ViewportState, EngineError> {
        let state = self.viewport_mut(viewport)?;
        let active = matches!(
            state.status,
            EngineStatus::Running | EngineStatus::Inertia | EngineStatus::Suspended
        );
        if state.sealed || active {
            return Err(EngineError::Sealed);
        }
        Ok(state)
    }

    fn content(&self, content: EngineContent) -> Result<&ContentState, EngineError> {
        self.contents
            .get(&content)
            .filter(|c| !c.released)
            .ok_or(EngineError::InvalidState)
    }

    fn content_mut(&mut self, content: EngineContent) -> Result<&mut ContentState, EngineError> {
        self.contents
            .get_mut(&content)
            .filter(|c| !c.released)
            .ok_or(EngineError::InvalidState)
    }

    fn handlers_of(&self, viewport: EngineViewport) -> Vec<Arc<dyn ViewportEventHandler>> {
        self.handlers
            .values()
            .filter(|(vp, _)| *vp == viewport)
            .map(|(_, handler)| Arc::clone(handler))
            .collect()
    }

    /// Moves `viewport` to `status`, returning the handlers to notify.
    fn transition(
        &mut self,
        viewport: EngineViewport,
        status: EngineStatus,
    ) -> Result<Option<StatusChange>, EngineError> {
        let state = self.viewport_mut(viewport)?;
        let previous = state.status;
        if previous == status {
            return Ok(None);
        }
        state.status = status;
        trace!(?viewport, ?previous, current = ?status, "status");
        Ok(Some(StatusChange {
            viewport,
            current: status,
            previous,
            handlers: self.handlers_of(viewport),
        }))
    }

    fn output(&self, content: EngineContent) -> Result<Affine, EngineError> {
        let record = self.content(content)?;
        let viewport = record.viewport.ok_or(EngineError::InvalidState)?;
        let primary = self.viewport(viewport)?;
        if primary.primary == content {
            return Ok(primary.transform);
        }
        let [zoom, _, _, _, tx, ty] = primary.transform.as_coeffs();
        let Some(curves) = &record.curves else {
            return Ok(Affine::IDENTITY);
        };
        let source = |p: Property| match p {
            Property::TranslationX => tx,
            Property::TranslationY => ty,
            Property::Zoom => zoom,
        };
        let value = |p: Property| curves.evaluate(p, source).unwrap_or_else(|| source(p));
        let z = value(Property::Zoom);
        let origin = record.origin;
        Ok(Affine::new([
            z,
            0.0,
            0.0,
            z,
            value(Property::TranslationX) + origin.x * (1.0 - z),
            value(Property::TranslationY) + origin.y * (1.0 - z),
        ]))
    }
}

struct StatusChange {
    viewport: EngineViewport,
    current: EngineStatus,
    previous: EngineStatus,
    handlers: Vec<Arc<dyn ViewportEventHandler>>,
}

impl StatusChange {
    fn notify(self) {
        for handler in self.handlers {
            handler.status_changed(self.viewport, self.current, self.previous);
        }
    }
}

/// Reference manipulation engine.
///
/// Handlers are always notified after the engine's internal lock is released,
/// so they may call back into the engine.
#[derive(Default)]
pub struct RefEngine {
    state: Mutex<State>,
}

impl core::fmt::Debug for RefEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RefEngine")
            .field("viewports", &state.viewports.len())
            .field("contents", &state.contents.len())
            .field("handlers", &state.handlers.len())
            .finish_non_exhaustive()
    }
}

impl RefEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn change_status(&self, viewport: EngineViewport, status: EngineStatus) -> Result<(), EngineError> {
        let change = self.state.lock().transition(viewport, status)?;
        if let Some(change) = change {
            change.notify();
        }
        Ok(())
    }

    /// Moves a viewport to `status` and notifies its handlers, as the engine
    /// would when a manipulation progresses.
    pub fn set_status(&self, viewport: EngineViewport, status: EngineStatus) {
        if self.change_status(viewport, status).is_err() {
            trace!(?viewport, "status change for unknown viewport ignored");
        }
    }

    /// Notifies handlers of an interaction change.
    pub fn fire_interaction(&self, viewport: EngineViewport, interaction: InteractionType) {
        let handlers = self.state.lock().handlers_of(viewport);
        for handler in handlers {
            handler.interaction_changed(viewport, interaction);
        }
    }

    /// Notifies handlers of a drag-drop status change.
    pub fn fire_drag_drop(
        &self,
        viewport: EngineViewport,
        current: DragDropStatus,
        previous: DragDropStatus,
    ) {
        let handlers = self.state.lock().handlers_of(viewport);
        for handler in handlers {
            handler.drag_drop_status_changed(viewport, current, previous);
        }
    }

    /// Moves the primary content of `viewport`.
    pub fn set_primary_transform(&self, viewport: EngineViewport, transform: Affine) {
        if let Some(state) = self.state.lock().viewports.get_mut(&viewport) {
            state.transform = transform;
        }
    }

    /// Makes configuration calls on `viewport` fail with [`EngineError::Sealed`].
    pub fn seal(&self, viewport: EngineViewport, sealed: bool) {
        if let Some(state) = self.state.lock().viewports.get_mut(&viewport) {
            state.sealed = sealed;
        }
    }

    /// Makes the next enable of `viewport` land on [`EngineStatus::Ready`],
    /// as if enabling started a manipulation that completed immediately.
    pub fn land_on_ready_on_next_enable(&self, viewport: EngineViewport) {
        if let Some(state) = self.state.lock().viewports.get_mut(&viewport) {
            state.ready_on_enable = true;
        }
    }

    /// Sets where inertia of `viewport` ends.
    pub fn set_inertia_end(&self, viewport: EngineViewport, transform: Affine) {
        if let Some(state) = self.state.lock().viewports.get_mut(&viewport) {
            state.inertia_end = Some(transform);
        }
    }

    /// Makes the next `set_contact` fail with `error`.
    pub fn fail_next_contact(&self, error: EngineError) {
        self.state.lock().contact_failure = Some(error);
    }

    /// Makes the next `add_behavior` fail with `error`.
    pub fn fail_next_behavior(&self, error: EngineError) {
        self.state.lock().behavior_failure = Some(error);
    }

    /// Makes the next `remove_event_handler` fail with `error`. The handler
    /// stays registered.
    pub fn fail_next_handler_removal(&self, error: EngineError) {
        self.state.lock().handler_removal_failure = Some(error);
    }

    /// Makes the next inertia end query fail with `error`.
    pub fn fail_next_inertia_query(&self, error: EngineError) {
        self.state.lock().inertia_failure = Some(error);
    }

    /// Sets how auto-scroll stop requests are answered. Defaults to
    /// [`ConfigureResponse::Pending`].
    pub fn set_auto_scroll_response(&self, response: ConfigureResponse) {
        self.state.lock().auto_scroll_response = Some(response);
    }

    /// Snapshot of a live viewport.
    #[must_use]
    pub fn snapshot(&self, viewport: EngineViewport) -> Option<ViewportSnapshot> {
        let state = self.state.lock();
        let vp = state.viewports.get(&viewport)?;
        let behaviors = state
            .attached
            .values()
            .filter(|(v, _)| *v == viewport)
            .filter_map(|(_, id)| state.behaviors.get(id).copied())
            .collect();
        let mut contents: Vec<_> = state
            .contents
            .iter()
            .filter(|(id, c)| c.viewport == Some(viewport) && **id != vp.primary)
            .map(|(id, _)| *id)
            .collect();
        contents.sort();
        Some(ViewportSnapshot {
            status: vp.status,
            configurations: vp.configurations,
            active_configuration: vp.active_configuration,
            chaining: vp.chaining,
            manual_gestures: vp.manual_gestures,
            manual_input: vp.manual_input,
            rect: vp.rect,
            primary_content: vp.primary,
            primary_transform: vp.transform,
            zoom_boundaries: vp.zoom_boundaries,
            alignment: vp.alignment,
            snap: vp.snap.clone(),
            zoom_to_rect: vp.zoom_to_rect,
            contacts: vp.contacts.iter().copied().collect(),
            inputs: vp.inputs.clone(),
            behaviors,
            handlers: state.handlers_of(viewport).len(),
            contents,
        })
    }

    /// Snapshot of a content object, including released ones.
    #[must_use]
    pub fn content(&self, content: EngineContent) -> Option<ContentSnapshot> {
        let state = self.state.lock();
        let c = state.contents.get(&content)?;
        Some(ContentSnapshot {
            viewport: c.viewport,
            rect: c.rect,
            curves: c.curves.clone(),
            origin: c.origin,
            released: c.released,
        })
    }

    /// Returns `true` if `viewport` was abandoned.
    #[must_use]
    pub fn is_abandoned(&self, viewport: EngineViewport) -> bool {
        self.state.lock().abandoned.contains(&viewport)
    }

    /// Number of content objects created and not yet released, primary contents included.
    #[must_use]
    pub fn live_contents(&self) -> usize {
        self.state
            .lock()
            .contents
            .values()
            .filter(|c| !c.released)
            .count()
    }

    /// Number of subscribed event handlers across all viewports.
    #[must_use]
    pub fn live_handlers(&self) -> usize {
        self.state.lock().handlers.len()
    }

    /// Auto-scroll requests, in order.
    #[must_use]
    pub fn auto_scroll_requests(&self) -> Vec<(Axis, AutoScrollMotion)> {
        self.state.lock().auto_scroll_requests.clone()
    }

    /// Number of times the engine was updated.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.state.lock().frame_count
    }

    /// The frame the engine was last updated to.
    #[must_use]
    pub fn last_frame(&self) -> Option<FrameInfo> {
        self.state.lock().last_frame
    }
}

impl Engine for RefEngine {
    fn create_viewport(&self) -> Result<EngineViewport, EngineError> {
        let mut state = self.state.lock();
        let viewport = EngineViewport(state.next());
        let primary = EngineContent(state.next());
        state.contents.insert(
            primary,
            ContentState {
                viewport: Some(viewport),
                rect: Rect::ZERO,
                curves: None,
                origin: Vec2::ZERO,
                released: false,
            },
        );
        state.viewports.insert(
            viewport,
            ViewportState {
                status: EngineStatus::Building,
                sealed: false,
                ready_on_enable: false,
                configurations: EngineConfiguration::empty(),
                active_configuration: None,
                chaining: MotionTypes::empty(),
                manual_gestures: None,
                manual_input: false,
                rect: Rect::ZERO,
                primary,
                transform: Affine::IDENTITY,
                inertia_end: None,
                zoom_boundaries: None,
                alignment: None,
                snap: Vec::new(),
                zoom_to_rect: None,
                contacts: HashSet::new(),
                inputs: Vec::new(),
            },
        );
        trace!(?viewport, ?primary, "create viewport");
        Ok(viewport)
    }

    fn abandon_viewport(&self, viewport: EngineViewport) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let removed = state
            .viewports
            .remove(&viewport)
            .ok_or(EngineError::InvalidState)?;
        for content in state.contents.values_mut() {
            if content.viewport == Some(viewport) {
                content.viewport = None;
            }
        }
        if let Some(primary) = state.contents.get_mut(&removed.primary) {
            primary.released = true;
        }
        state.attached.retain(|_, (vp, _)| *vp != viewport);
        state.handlers.retain(|_, (vp, _)| *vp != viewport);
        state.abandoned.insert(viewport);
        trace!(?viewport, "abandon viewport");
        Ok(())
    }

    fn enable_viewport(&self, viewport: EngineViewport) -> Result<(), EngineError> {
        let change = {
            let mut state = self.state.lock();
            let vp = state.viewport_mut(viewport)?;
            let target = if core::mem::take(&mut vp.ready_on_enable) {
                EngineStatus::Ready
            } else {
                EngineStatus::Enabled
            };
            state.transition(viewport, target)?
        };
        if let Some(change) = change {
            change.notify();
        }
        Ok(())
    }

    fn disable_viewport(&self, viewport: EngineViewport) -> Result<(), EngineError> {
        self.change_status(viewport, EngineStatus::Disabled)
    }

    fn stop_viewport(&self, viewport: EngineViewport) -> Result<(), EngineError> {
        let status = self.state.lock().viewport(viewport)?.status;
        if matches!(status, EngineStatus::Running | EngineStatus::Inertia) {
            self.change_status(viewport, EngineStatus::Ready)?;
        }
        Ok(())
    }

    fn viewport_status(&self, viewport: EngineViewport) -> Result<EngineStatus, EngineError> {
        Ok(self.state.lock().viewport(viewport)?.status)
    }

    fn add_configuration(
        &self,
        viewport: EngineViewport,
        configuration: EngineConfiguration,
    ) -> Result<(), EngineError> {
        self.state.lock().configurable(viewport)?.configurations |= configuration;
        Ok(())
    }

    fn remove_configuration(
        &self,
        viewport: EngineViewport,
        configuration: EngineConfiguration,
    ) -> Result<(), EngineError> {
        self.state.lock().configurable(viewport)?.configurations &= !configuration;
        Ok(())
    }

    fn activate_configuration(
        &self,
        viewport: EngineViewport,
        configuration: EngineConfiguration,
    ) -> Result<(), EngineError> {
        self.state.lock().configurable(viewport)?.active_configuration = Some(configuration);
        Ok(())
    }

    fn set_chaining(&self, viewport: EngineViewport, motion: MotionTypes) -> Result<(), EngineError> {
        self.state.lock().viewport_mut(viewport)?.chaining = motion;
        Ok(())
    }

    fn set_manual_gestures(
        &self,
        viewport: EngineViewport,
        gestures: GestureConfiguration,
    ) -> Result<(), EngineError> {
        self.state.lock().viewport_mut(viewport)?.manual_gestures = Some(gestures);
        Ok(())
    }

    fn set_manual_input(&self, viewport: EngineViewport, manual: bool) -> Result<(), EngineError> {
        self.state.lock().viewport_mut(viewport)?.manual_input = manual;
        Ok(())
    }

    fn set_viewport_rect(&self, viewport: EngineViewport, rect: Rect) -> Result<(), EngineError> {
        self.state.lock().viewport_mut(viewport)?.rect = rect;
        Ok(())
    }

    fn viewport_rect(&self, viewport: EngineViewport) -> Result<Rect, EngineError> {
        Ok(self.state.lock().viewport(viewport)?.rect)
    }

    fn primary_content(&self, viewport: EngineViewport) -> Result<EngineContent, EngineError> {
        Ok(self.state.lock().viewport(viewport)?.primary)
    }

    fn set_content_rect(&self, content: EngineContent, rect: Rect) -> Result<(), EngineError> {
        self.state.lock().content_mut(content)?.rect = rect;
        Ok(())
    }

    fn content_rect(&self, content: EngineContent) -> Result<Rect, EngineError> {
        Ok(self.state.lock().content(content)?.rect)
    }

    fn set_zoom_boundaries(
        &self,
        viewport: EngineViewport,
        min_zoom: f64,
        max_zoom: f64,
    ) -> Result<(), EngineError> {
        self.state.lock().viewport_mut(viewport)?.zoom_boundaries = Some((min_zoom, max_zoom));
        Ok(())
    }

    fn set_alignment(
        &self,
        viewport: EngineViewport,
        horizontal: Alignment,
        vertical: Alignment,
    ) -> Result<(), EngineError> {
        self.state.lock().viewport_mut(viewport)?.alignment = Some((horizontal, vertical));
        Ok(())
    }

    fn set_snap_interval(
        &self,
        viewport: EngineViewport,
        motion: MotionTypes,
        interval: f64,
        offset: f64,
    ) -> Result<(), EngineError> {
        self.state
            .lock()
            .viewport_mut(viewport)?
            .snap
            .push(SnapSetting::Interval {
                motion,
                interval,
                offset,
            });
        Ok(())
    }

    fn set_snap_points(
        &self,
        viewport: EngineViewport,
        motion: MotionTypes,
        points: &[f64],
    ) -> Result<(), EngineError> {
        self.state
            .lock()
            .viewport_mut(viewport)?
            .snap
            .push(SnapSetting::Points {
                motion,
                points: points.to_vec(),
            });
        Ok(())
    }

    fn set_snap_type(
        &self,
        viewport: EngineViewport,
        motion: MotionTypes,
        kind: SnapPointsType,
    ) -> Result<(), EngineError> {
        self.state
            .lock()
            .viewport_mut(viewport)?
            .snap
            .push(SnapSetting::Type { motion, kind });
        Ok(())
    }

    fn set_snap_coordinate(
        &self,
        viewport: EngineViewport,
        motion: MotionTypes,
        coordinate: SnapCoordinate,
        origin: f64,
    ) -> Result<(), EngineError> {
        self.state
            .lock()
            .viewport_mut(viewport)?
            .snap
            .push(SnapSetting::Coordinate {
                motion,
                coordinate,
                origin,
            });
        Ok(())
    }

    fn zoom_to_rect(
        &self,
        viewport: EngineViewport,
        rect: Rect,
        animate: bool,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let vp = state.viewport_mut(viewport)?;
        vp.zoom_to_rect = Some((rect, animate));
        if rect.area() > 0.0 && vp.rect.area() > 0.0 {
            let zoom = (vp.rect.width() / rect.width()).min(vp.rect.height() / rect.height());
            vp.transform = Affine::new([zoom, 0.0, 0.0, zoom, -rect.x0 * zoom, -rect.y0 * zoom]);
        }
        Ok(())
    }

    fn sync_content_transform(
        &self,
        viewport: EngineViewport,
        transform: Affine,
    ) -> Result<(), EngineError> {
        self.state.lock().viewport_mut(viewport)?.transform = transform;
        Ok(())
    }

    fn create_content(&self) -> Result<EngineContent, EngineError> {
        let mut state = self.state.lock();
        let content = EngineContent(state.next());
        state.contents.insert(
            content,
            ContentState {
                viewport: None,
                rect: Rect::ZERO,
                curves: None,
                origin: Vec2::ZERO,
                released: false,
            },
        );
        Ok(content)
    }

    fn add_content(&self, viewport: EngineViewport, content: EngineContent) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.viewport(viewport)?;
        let record = state.content_mut(content)?;
        if record.viewport.is_some() {
            return Err(EngineError::Failed("content already attached"));
        }
        record.viewport = Some(viewport);
        Ok(())
    }

    fn remove_content(
        &self,
        viewport: EngineViewport,
        content: EngineContent,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let record = state.content_mut(content)?;
        if record.viewport != Some(viewport) {
            return Err(EngineError::InvalidState);
        }
        record.viewport = None;
        Ok(())
    }

    fn release_content(&self, content: EngineContent) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let record = state.content_mut(content)?;
        if record.viewport.is_some() {
            return Err(EngineError::Failed("content still attached"));
        }
        record.released = true;
        trace!(?content, "release content");
        Ok(())
    }

    fn set_curves(
        &self,
        content: EngineContent,
        curves: &CurveSet,
        origin: Vec2,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let record = state.content_mut(content)?;
        record.curves = Some(curves.clone());
        record.origin = origin;
        Ok(())
    }

    fn content_transform(&self, content: EngineContent) -> Result<Affine, EngineError> {
        self.state.lock().output(content)
    }

    fn output_transform(&self, content: EngineContent) -> Result<Affine, EngineError> {
        self.state.lock().output(content)
    }

    fn inertia_end_transform(&self, viewport: EngineViewport) -> Result<Affine, EngineError> {
        let mut state = self.state.lock();
        if let Some(err) = state.inertia_failure.take() {
            return Err(err);
        }
        let vp = state.viewport(viewport)?;
        if vp.status != EngineStatus::Inertia {
            return Err(EngineError::NotInInertia);
        }
        Ok(vp.inertia_end.unwrap_or(vp.transform))
    }

    fn content_viewport(&self, content: EngineContent) -> Result<EngineViewport, EngineError> {
        self.state
            .lock()
            .content(content)?
            .viewport
            .ok_or(EngineError::InvalidState)
    }

    fn create_behavior(&self, kind: BehaviorKind) -> Result<BehaviorId, EngineError> {
        let mut state = self.state.lock();
        let id = BehaviorId(state.next());
        state.behaviors.insert(id, kind);
        Ok(id)
    }

    fn add_behavior(
        &self,
        viewport: EngineViewport,
        behavior: BehaviorId,
    ) -> Result<BehaviorCookie, EngineError> {
        let mut state = self.state.lock();
        state.viewport(viewport)?;
        if let Some(err) = state.behavior_failure.take() {
            return Err(err);
        }
        if !state.behaviors.contains_key(&behavior) {
            return Err(EngineError::InvalidState);
        }
        if state.attached.values().any(|(_, id)| *id == behavior) {
            return Err(EngineError::Failed("behavior already attached"));
        }
        let cookie = BehaviorCookie(state.next());
        state.attached.insert(cookie, (viewport, behavior));
        Ok(cookie)
    }

    fn remove_behavior(
        &self,
        viewport: EngineViewport,
        cookie: BehaviorCookie,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        match state.attached.get(&cookie) {
            Some((vp, _)) if *vp == viewport => {
                state.attached.remove(&cookie);
                Ok(())
            }
            _ => Err(EngineError::InvalidState),
        }
    }

    fn configure_auto_scroll(
        &self,
        behavior: BehaviorId,
        axis: Axis,
        motion: AutoScrollMotion,
    ) -> Result<ConfigureResponse, EngineError> {
        let mut state = self.state.lock();
        match state.behaviors.get(&behavior) {
            Some(BehaviorKind::AutoScroll) => {}
            _ => return Err(EngineError::InvalidState),
        }
        state.auto_scroll_requests.push((axis, motion));
        Ok(match motion {
            AutoScrollMotion::Stop => state
                .auto_scroll_response
                .unwrap_or(ConfigureResponse::Pending),
            AutoScrollMotion::Forward | AutoScrollMotion::Reverse => ConfigureResponse::Immediate,
        })
    }

    fn set_contact(&self, viewport: EngineViewport, contact: ContactId) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        state.viewport(viewport)?;
        if let Some(err) = state.contact_failure.take() {
            return Err(err);
        }
        let vp = state.viewport_mut(viewport)?;
        if !vp.contacts.insert(contact) {
            return Err(EngineError::ContactAlreadyExists);
        }
        Ok(())
    }

    fn release_contact(
        &self,
        viewport: EngineViewport,
        contact: ContactId,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let vp = state.viewport_mut(viewport)?;
        if !vp.contacts.remove(&contact) {
            return Err(EngineError::ContactNoLongerExists);
        }
        Ok(())
    }

    fn release_all_contacts(&self, viewport: EngineViewport) -> Result<(), EngineError> {
        self.state.lock().viewport_mut(viewport)?.contacts.clear();
        Ok(())
    }

    fn process_input(
        &self,
        viewport: EngineViewport,
        message: &InputMessage,
    ) -> Result<bool, EngineError> {
        let mut state = self.state.lock();
        let vp = state.viewport_mut(viewport)?;
        if !vp.contacts.contains(&message.contact()) {
            return Err(EngineError::ContactNoLongerExists);
        }
        vp.inputs.push(*message);
        Ok(!matches!(
            vp.status,
            EngineStatus::Building | EngineStatus::Disabled
        ))
    }

    fn update(&self, frame: &dyn FrameInfoProvider) -> Result<(), EngineError> {
        let info = frame.next_frame_info();
        let mut state = self.state.lock();
        state.frame_count += 1;
        state.last_frame = Some(info);
        Ok(())
    }

    fn add_event_handler(
        &self,
        viewport: EngineViewport,
        handler: Arc<dyn ViewportEventHandler>,
    ) -> Result<HandlerCookie, EngineError> {
        let mut state = self.state.lock();
        state.viewport(viewport)?;
        let cookie = HandlerCookie(state.next());
        state.handlers.insert(cookie, (viewport, handler));
        Ok(cookie)
    }

    fn remove_event_handler(
        &self,
        viewport: EngineViewport,
        cookie: HandlerCookie,
    ) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if let Some(err) = state.handler_removal_failure.take() {
            return Err(err);
        }
        match state.handlers.get(&cookie) {
            Some((vp, _)) if *vp == viewport => {
                state.handlers.remove(&cookie);
                Ok(())
            }
            _ => Err(EngineError::InvalidState),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enable_and_disable_follow_the_status_machine() {
        let engine = RefEngine::new();
        let vp = engine.create_viewport().unwrap();
        assert_eq!(engine.viewport_status(vp), Ok(EngineStatus::Building));
        engine.enable_viewport(vp).unwrap();
        assert_eq!(engine.viewport_status(vp), Ok(EngineStatus::Enabled));
        engine.land_on_ready_on_next_enable(vp);
        engine.disable_viewport(vp).unwrap();
        engine.enable_viewport(vp).unwrap();
        assert_eq!(engine.viewport_status(vp), Ok(EngineStatus::Ready));
    }

    #[test]
    fn active_viewports_refuse_configuration() {
        let engine = RefEngine::new();
        let vp = engine.create_viewport().unwrap();
        engine.set_status(vp, EngineStatus::Running);
        assert_eq!(
            engine.add_configuration(vp, EngineConfiguration::TRANSLATION_X),
            Err(EngineError::Sealed)
        );
        engine.set_status(vp, EngineStatus::Ready);
        engine.seal(vp, true);
        assert_eq!(
            engine.activate_configuration(vp, EngineConfiguration::TRANSLATION_X),
            Err(EngineError::Sealed)
        );
    }

    #[test]
    fn curves_follow_the_primary_transform() {
        let engine = RefEngine::new();
        let vp = engine.create_viewport().unwrap();
        let content = engine.create_content().unwrap();
        engine.add_content(vp, content).unwrap();
        let curves = CurveSet::for_content_type(understory_manipulation::ContentType::TopHeader)
            .unwrap();
        engine.set_curves(content, &curves, Vec2::ZERO).unwrap();
        engine.set_primary_transform(vp, Affine::translate((-30.0, -40.0)));
        let out = engine.output_transform(content).unwrap();
        assert_eq!(out.translation(), Vec2::new(-30.0, 0.0));
    }

    #[test]
    fn abandoned_viewports_invalidate_their_contents() {
        let engine = RefEngine::new();
        let vp = engine.create_viewport().unwrap();
        let primary = engine.primary_content(vp).unwrap();
        assert_eq!(engine.content_viewport(primary), Ok(vp));
        engine.abandon_viewport(vp).unwrap();
        assert_eq!(engine.content_viewport(primary), Err(EngineError::InvalidState));
        assert!(engine.is_abandoned(vp));
        assert_eq!(engine.viewport_status(vp), Err(EngineError::InvalidState));
    }

    #[test]
    fn inertia_end_is_only_available_in_inertia() {
        let engine = RefEngine::new();
        let vp = engine.create_viewport().unwrap();
        assert_eq!(engine.inertia_end_transform(vp), Err(EngineError::NotInInertia));
        engine.set_status(vp, EngineStatus::Inertia);
        engine.set_inertia_end(vp, Affine::translate((0.0, -500.0)));
        assert_eq!(
            engine.inertia_end_transform(vp),
            Ok(Affine::translate((0.0, -500.0)))
        );
    }
}
