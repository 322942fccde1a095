// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Auto-scroll and drag-drop behaviors.
//!
//! Each coordinator owns at most one behavior of each kind. Both are created
//! on first use and moved between viewports as needed.

use tracing::debug;

use crate::engine::{
    AutoScrollMotion, BehaviorCookie, BehaviorId, BehaviorKind, ConfigureResponse,
    DragDropConfiguration, Engine, EngineError, EngineViewport,
};
use crate::types::Axis;

/// Progress of the coordinator's auto-scroll behavior.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum AutoScrollStatus {
    /// No auto-scroll in progress.
    #[default]
    Stopped,
    /// Auto-scroll requested and not yet stopped.
    Active,
    /// Stop requested; waiting for the current inertia to settle.
    Stopping,
}

/// A behavior attached to a viewport.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Attachment {
    pub(crate) viewport: EngineViewport,
    pub(crate) cookie: BehaviorCookie,
}

#[derive(Debug, Default)]
pub(crate) struct AutoScrollState {
    pub(crate) behavior: Option<BehaviorId>,
    pub(crate) attached: Option<Attachment>,
    pub(crate) status: AutoScrollStatus,
    pub(crate) activations: u32,
    /// Sequence number of the latest activation.
    pub(crate) generation: u64,
    /// Latest activation whose marker has been pumped. Status changes queued
    /// before that marker belong to whatever was running before it.
    pub(crate) armed_through: u64,
}

impl AutoScrollState {
    /// Attaches and starts auto-scroll. Returns the activation's generation,
    /// which must be passed to [`Self::arm`] once the events queued so far
    /// have been translated.
    pub(crate) fn activate<E: Engine + ?Sized>(
        &mut self,
        engine: &E,
        viewport: EngineViewport,
        axis: Axis,
        forward: bool,
    ) -> Result<u64, EngineError> {
        let behavior = match self.behavior {
            Some(behavior) => behavior,
            None => {
                let behavior = engine.create_behavior(BehaviorKind::AutoScroll)?;
                self.behavior = Some(behavior);
                behavior
            }
        };
        self.attached = Some(attach(engine, self.attached, viewport, behavior)?);

        // A touch contact may still be pending on the viewport.
        engine.stop_viewport(viewport)?;
        let motion = if forward {
            AutoScrollMotion::Forward
        } else {
            AutoScrollMotion::Reverse
        };
        engine.configure_auto_scroll(behavior, axis, motion)?;
        self.status = AutoScrollStatus::Active;
        self.activations += 1;
        self.generation += 1;
        debug!(?viewport, ?axis, forward, activations = self.activations, "auto-scroll activated");
        Ok(self.generation)
    }

    /// Marks every activation up to `generation` as live.
    pub(crate) fn arm(&mut self, generation: u64) {
        self.armed_through = self.armed_through.max(generation.min(self.generation));
    }

    /// Activations whose marker has been pumped and that have not settled yet.
    pub(crate) fn armed(&self) -> u32 {
        let unarmed = u32::try_from(self.generation - self.armed_through).unwrap_or(u32::MAX);
        self.activations.saturating_sub(unarmed)
    }

    pub(crate) fn stop<E: Engine + ?Sized>(
        &mut self,
        engine: &E,
        axis: Axis,
    ) -> Result<(), EngineError> {
        if self.status != AutoScrollStatus::Active {
            return Ok(());
        }
        debug_assert!(self.behavior.is_some(), "active auto-scroll without a behavior");
        let Some(behavior) = self.behavior else {
            return Ok(());
        };
        self.status = match engine.configure_auto_scroll(behavior, axis, AutoScrollMotion::Stop)? {
            ConfigureResponse::Pending => AutoScrollStatus::Stopping,
            ConfigureResponse::Immediate => AutoScrollStatus::Stopped,
        };
        debug!(?axis, status = ?self.status, "auto-scroll stop requested");
        Ok(())
    }

    pub(crate) fn is_attached_to(&self, viewport: EngineViewport) -> bool {
        self.attached.is_some_and(|a| a.viewport == viewport)
    }

    /// Detaches the behavior if it is attached to `viewport`.
    pub(crate) fn detach_from<E: Engine + ?Sized>(
        &mut self,
        engine: &E,
        viewport: EngineViewport,
    ) -> Result<(), EngineError> {
        match self.attached {
            Some(attachment) if attachment.viewport == viewport => {
                self.attached = None;
                self.status = AutoScrollStatus::Stopped;
                self.activations = 0;
                self.armed_through = self.generation;
                engine.remove_behavior(viewport, attachment.cookie)
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct DragDropState {
    pub(crate) behavior: Option<BehaviorId>,
    pub(crate) attached: Option<Attachment>,
}

impl DragDropState {
    pub(crate) fn attach<E: Engine + ?Sized>(
        &mut self,
        engine: &E,
        viewport: EngineViewport,
    ) -> Result<(), EngineError> {
        let behavior = match self.behavior {
            Some(behavior) => behavior,
            None => {
                let behavior = engine.create_behavior(BehaviorKind::DragDrop(
                    DragDropConfiguration::VERTICAL
                        | DragDropConfiguration::HORIZONTAL
                        | DragDropConfiguration::HOLD_DRAG,
                ))?;
                self.behavior = Some(behavior);
                behavior
            }
        };
        self.attached = Some(attach(engine, self.attached, viewport, behavior)?);
        debug!(?viewport, "drag-drop behavior attached");
        Ok(())
    }

    pub(crate) fn viewport(&self) -> Option<EngineViewport> {
        self.attached.map(|a| a.viewport)
    }

    /// Detaches the behavior if it is attached to `viewport`. Returns whether it was.
    pub(crate) fn detach_from<E: Engine + ?Sized>(
        &mut self,
        engine: &E,
        viewport: EngineViewport,
    ) -> Result<bool, EngineError> {
        match self.attached {
            Some(attachment) if attachment.viewport == viewport => {
                self.attached = None;
                engine.remove_behavior(viewport, attachment.cookie)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Attaches `behavior` to `viewport`, moving it off its current viewport first.
fn attach<E: Engine + ?Sized>(
    engine: &E,
    current: Option<Attachment>,
    viewport: EngineViewport,
    behavior: BehaviorId,
) -> Result<Attachment, EngineError> {
    match current {
        Some(attachment) if attachment.viewport == viewport => return Ok(attachment),
        Some(attachment) => engine.remove_behavior(attachment.viewport, attachment.cookie)?,
        None => {}
    }
    let cookie = engine.add_behavior(viewport, behavior)?;
    Ok(Attachment { viewport, cookie })
}
