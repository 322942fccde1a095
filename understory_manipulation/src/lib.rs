// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Manipulation: viewport coordination between a control, a gesture engine and a compositor.
//!
//! A scrolling or zooming control owns one or more *viewports*. A gesture
//! engine (anything implementing [`Engine`](engine::Engine)) turns touch,
//! pen, wheel and keyboard input into content transforms for those
//! viewports, and a compositor renders the content with those transforms.
//! This crate sits between the three:
//!
//! - **Registry**: [`Coordinator::register_viewport`] maps the control's own
//!   handles to engine viewports and tears everything down again on
//!   [`Coordinator::unregister_viewport`].
//! - **Configuration**: [`Configuration`] flags are translated to the engine's
//!   bitmask. Changes are skipped, not failed, while a manipulation is in
//!   progress; see [`ConfigurationOutcome`].
//! - **Input**: keyboard and wheel messages are routed through pseudo
//!   contacts, with pan keys resolved to an axis and mirrored for
//!   right-to-left flow. See [`input`].
//! - **Status**: engine notifications are queued and delivered from
//!   [`Coordinator::pump_events`] to a [`ViewportListener`]. Inertia caused by
//!   auto-scroll is presented as [`ViewportStatus::AutoRunning`].
//! - **Secondary content**: headers and custom content follow the primary
//!   content through piecewise cubic curves. See [`curve`].
//! - **Overpan**: [`OverpanMode::Suppress`] and [`OverpanMode::Compress`]
//!   replace the engine's rubber band with synthesized reflex curves. See
//!   [`overpan`].
//! - **Compositor**: a [`CompositorBridge`] drives the engine once per frame
//!   and reads rendered transforms from the render thread.
//!
//! ## Threading
//!
//! The [`Coordinator`] is owned by the control's thread and takes `&mut self`
//! for anything that changes state. Engine notifications may arrive on any
//! thread; they are queued and only reach the listener from
//! [`Coordinator::pump_events`]. [`CompositorBridge`] is `Clone` and shares the
//! overpan reflex table with the coordinator behind a lock.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use understory_manipulation::{
//!     Configuration, ConfigurationOutcome, Coordinator, RecordingListener, ViewportStatus,
//! };
//! use understory_manipulation_ref::RefEngine;
//!
//! let engine = Arc::new(RefEngine::new());
//! let mut coordinator = Coordinator::new(Arc::clone(&engine));
//!
//! coordinator.register_viewport(1_u32)?;
//! let outcome = coordinator.add_viewport_configuration(1, Configuration::PAN_Y)?;
//! assert_eq!(outcome, ConfigurationOutcome::Applied);
//! coordinator.enable_viewport(1)?;
//!
//! let mut listener = RecordingListener::default();
//! coordinator.pump_events(&mut listener);
//! assert_eq!(
//!     listener.statuses(),
//!     [(1, ViewportStatus::Building, ViewportStatus::Enabled)]
//! );
//! # Ok::<(), understory_manipulation::Error>(())
//! ```
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `debug` for lifecycle changes and
//! expected races, `trace` for per-message and per-frame detail, and `warn`
//! for engine failures that are swallowed on the render thread.

mod behavior;
mod compositor;
mod configuration;
mod coordinator;
mod error;
mod listener;
mod options;
mod registry;
mod secondary;
mod status;
mod types;

pub mod curve;
pub mod engine;
pub mod input;
pub mod overpan;

pub use behavior::AutoScrollStatus;
pub use compositor::{CompositorBridge, CompositorContent, CompositorViewport};
pub use configuration::{Configuration, ConfigurationOutcome, CrossSlideKind, EngineConfiguration};
pub use coordinator::Coordinator;
pub use error::{Error, Result};
pub use input::{ContactOutcome, InputMessage};
pub use listener::{Notification, RecordingListener, ViewportListener};
pub use options::{CoordinatorOptions, DisplayGeometry, FixedDisplay, NoDisplay, OverpanTuning};
pub use secondary::DeferredRelease;
pub use types::{
    Alignment, Axis, ContentTransform, ContentType, DragDropStatus, InteractionType, MotionTypes,
    OverpanMode, SnapCoordinate, SnapPointsType, ViewportStatus,
};
