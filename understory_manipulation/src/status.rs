// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Translation of engine statuses into presented viewport statuses.
//!
//! Engine statuses map one to one onto [`ViewportStatus`], except that
//! inertia caused by an auto-scroll request is presented as
//! [`ViewportStatus::AutoRunning`]. The bookkeeping lives in
//! [`AutoScrollState`]: every activation adds one expected inertia phase, and
//! every inertia phase that settles consumes one. An activation only starts
//! counting once the coordinator has pumped the events queued before it, so
//! a user fling stopped by the activation does not consume it.

use tracing::trace;

use crate::behavior::{AutoScrollState, AutoScrollStatus};
use crate::engine::EngineStatus;
use crate::types::ViewportStatus;

impl From<EngineStatus> for ViewportStatus {
    fn from(status: EngineStatus) -> Self {
        match status {
            EngineStatus::Building => Self::Building,
            EngineStatus::Enabled => Self::Enabled,
            EngineStatus::Disabled => Self::Disabled,
            EngineStatus::Ready => Self::Ready,
            EngineStatus::Running => Self::Running,
            EngineStatus::Inertia => Self::Inertia,
            EngineStatus::Suspended => Self::Suspended,
        }
    }
}

/// Translates a status change notification and updates auto-scroll bookkeeping.
///
/// Returns the status to present as the new status.
pub(crate) fn present_transition(
    auto: &mut AutoScrollState,
    old: EngineStatus,
    new: EngineStatus,
) -> ViewportStatus {
    let mut presented = ViewportStatus::from(new);
    if auto.status == AutoScrollStatus::Stopped {
        return presented;
    }

    if old == EngineStatus::Inertia && auto.armed() > 0 {
        auto.activations = auto.activations.saturating_sub(1);
        if auto.status == AutoScrollStatus::Stopping {
            auto.status = if auto.activations == 0 {
                AutoScrollStatus::Stopped
            } else {
                AutoScrollStatus::Active
            };
        }
        // Another activation is still queued, keep presenting auto-scroll.
        if auto.activations > 0 && new == EngineStatus::Ready {
            presented = ViewportStatus::AutoRunning;
        }
    }

    if new == EngineStatus::Inertia && auto.status != AutoScrollStatus::Stopped && auto.armed() > 0 {
        presented = ViewportStatus::AutoRunning;
    }

    trace!(
        ?old,
        ?new,
        ?presented,
        auto_scroll = ?auto.status,
        activations = auto.activations,
        "translated status"
    );
    presented
}

/// Presents a polled engine status.
///
/// Unlike [`present_transition`] this does not touch the bookkeeping.
pub(crate) fn present_polled(auto: &AutoScrollState, status: EngineStatus) -> ViewportStatus {
    if status == EngineStatus::Inertia
        && auto.status != AutoScrollStatus::Stopped
        && auto.activations > 0
    {
        ViewportStatus::AutoRunning
    } else {
        status.into()
    }
}
