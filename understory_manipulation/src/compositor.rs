// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Read-only access to manipulation state for the render thread.
//!
//! A [`CompositorBridge`] is obtained from
//! [`Coordinator::compositor`](crate::Coordinator::compositor) and can be
//! cloned and moved to the render thread. Each frame the renderer calls
//! [`CompositorBridge::tick`] for every manipulated content, then reads
//! [`CompositorBridge::transform`].
//!
//! ```rust,ignore
//! let bridge = coordinator.compositor();
//! let content = coordinator.compositor_primary_content(viewport)?;
//! std::thread::spawn(move || loop {
//!     if !bridge.tick(&content, frame_delta()) {
//!         break; // the viewport was unregistered
//!     }
//!     if let Some(t) = bridge.transform(&content) {
//!         draw(t.translation_x, t.translation_y, t.zoom_x, t.zoom_y);
//!     }
//! });
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::engine::{
    Engine, EngineContent, EngineError, EngineViewport, FrameInfo, FrameInfoProvider,
};
use crate::overpan::{OverpanReflexState, compose_reflex};
use crate::types::{ContentType, ContentTransform, ViewportStatus};

/// Renderer-safe handle of a manipulation viewport.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompositorViewport {
    pub(crate) viewport: EngineViewport,
}

impl CompositorViewport {
    /// Engine handle of the viewport.
    #[must_use]
    pub fn engine_viewport(&self) -> EngineViewport {
        self.viewport
    }
}

/// Renderer-safe handle of a primary, secondary or clip content.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompositorContent {
    pub(crate) content: EngineContent,
    pub(crate) content_type: ContentType,
}

impl CompositorContent {
    /// Engine handle of the content.
    #[must_use]
    pub fn engine_content(&self) -> EngineContent {
        self.content
    }

    /// Role of the content in its viewport.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }
}

/// Composition timing recorded by the renderer and read back by the engine.
#[derive(Debug, Default)]
pub(crate) struct FrameClock {
    elapsed_micros: AtomicU64,
    frame: AtomicU64,
}

impl FrameClock {
    pub(crate) fn record(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.elapsed_micros.store(micros, Ordering::Relaxed);
        self.frame.fetch_add(1, Ordering::Relaxed);
    }
}

impl FrameInfoProvider for FrameClock {
    fn next_frame_info(&self) -> FrameInfo {
        FrameInfo {
            elapsed: Duration::from_micros(self.elapsed_micros.load(Ordering::Relaxed)),
            frame: self.frame.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the coordinator and its bridges.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    /// Overpan reflexes by viewport. Written on the UI thread, read per frame.
    pub(crate) reflexes: Mutex<HashMap<EngineViewport, OverpanReflexState>>,
    pub(crate) clock: FrameClock,
}

/// Computes the transform a content is rendered with.
///
/// Viewports with overpan reflexes render the composed reflex transform,
/// except for content that never moves with overpan.
pub(crate) fn resolve_transform<E: Engine + ?Sized>(
    engine: &E,
    shared: &Shared,
    viewport: EngineViewport,
    content: EngineContent,
    content_type: ContentType,
) -> Result<ContentTransform, EngineError> {
    let uncompressed_zoom = engine.content_transform(content)?.as_coeffs()[0];

    let reflexed = {
        let reflexes = shared.reflexes.lock();
        match reflexes.get(&viewport).and_then(|state| state.pair(content_type)) {
            Some(pair) => {
                let primary = engine.output_transform(pair.primary)?;
                let secondary = if content_type == ContentType::Custom {
                    engine.output_transform(content)?
                } else {
                    engine.output_transform(pair.secondary)?
                };
                Some(compose_reflex(primary, secondary))
            }
            None => None,
        }
    };
    let affine = match reflexed {
        Some(affine) => affine,
        None => engine.output_transform(content)?,
    };
    Ok(ContentTransform::from_affine(affine, uncompressed_zoom))
}

/// Per-frame view of the coordinator's viewports, usable from the render thread.
pub struct CompositorBridge<E: Engine + ?Sized> {
    engine: Arc<E>,
    shared: Arc<Shared>,
}

impl<E: Engine + ?Sized> CompositorBridge<E> {
    pub(crate) fn new(engine: Arc<E>, shared: Arc<Shared>) -> Self {
        Self { engine, shared }
    }

    /// Returns the transform `content` should be rendered with.
    ///
    /// Returns `None` if the content's viewport was unregistered concurrently.
    #[must_use]
    pub fn transform(&self, content: &CompositorContent) -> Option<ContentTransform> {
        let viewport = self.viewport_of(content)?;
        match resolve_transform(
            &*self.engine,
            &self.shared,
            viewport,
            content.content,
            content.content_type,
        ) {
            Ok(transform) => Some(transform),
            Err(EngineError::InvalidState) => None,
            Err(err) => {
                warn!(%err, content = ?content.content, "content transform unavailable");
                None
            }
        }
    }

    /// Advances the engine by one frame.
    ///
    /// Call this every frame for every manipulated content, including content
    /// without a visible node, so that inertia keeps running. Returns `false`
    /// if the content's viewport was unregistered.
    pub fn tick(&self, content: &CompositorContent, elapsed: Duration) -> bool {
        if self.viewport_of(content).is_none() {
            return false;
        }
        self.shared.clock.record(elapsed);
        trace!(content = ?content.content, ?elapsed, "tick");
        match self.engine.update(&self.shared.clock) {
            Ok(()) => true,
            Err(err) => {
                warn!(%err, "engine update failed");
                false
            }
        }
    }

    /// Returns the engine status of `viewport`, without the auto-scroll overlay.
    #[must_use]
    pub fn viewport_status(&self, viewport: &CompositorViewport) -> Option<ViewportStatus> {
        self.engine
            .viewport_status(viewport.viewport)
            .ok()
            .map(ViewportStatus::from)
    }

    /// A stable key for renderer-side maps.
    #[must_use]
    pub fn viewport_key(&self, viewport: &CompositorViewport) -> u64 {
        viewport.viewport.0
    }

    /// Timing of the last ticked frame.
    #[must_use]
    pub fn frame_info(&self) -> FrameInfo {
        self.shared.clock.next_frame_info()
    }

    fn viewport_of(&self, content: &CompositorContent) -> Option<EngineViewport> {
        match self.engine.content_viewport(content.content) {
            Ok(viewport) => Some(viewport),
            Err(EngineError::InvalidState) => {
                trace!(content = ?content.content, "content viewport is gone");
                None
            }
            Err(err) => {
                warn!(%err, content = ?content.content, "content viewport unavailable");
                None
            }
        }
    }
}

impl<E: Engine + ?Sized> Clone for CompositorBridge<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Engine + ?Sized> fmt::Debug for CompositorBridge<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositorBridge")
            .field("reflexes", &self.shared.reflexes.lock().len())
            .field("frame", &self.frame_info().frame)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Affine;

    #[test]
    fn clock_reports_last_elapsed_and_counts_frames() {
        let clock = FrameClock::default();
        assert_eq!(clock.next_frame_info(), FrameInfo::default());
        clock.record(Duration::from_millis(16));
        clock.record(Duration::from_micros(16_667));
        let info = clock.next_frame_info();
        assert_eq!(info.elapsed, Duration::from_micros(16_667));
        assert_eq!(info.frame, 2);
    }

    #[test]
    fn affine_maps_to_content_transform() {
        let t = ContentTransform::from_affine(
            Affine::new([2.0, 0.0, 0.0, 3.0, -10.0, 4.0]),
            2.5,
        );
        assert_eq!(t.zoom_x, 2.0);
        assert_eq!(t.zoom_y, 3.0);
        assert_eq!(t.translation_x, -10.0);
        assert_eq!(t.translation_y, 4.0);
        assert_eq!(t.uncompressed_zoom, 2.5);
    }
}
