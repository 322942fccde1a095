// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Notifications delivered to the owning control.

use crate::types::{DragDropStatus, InteractionType, ViewportStatus};

/// Receives translated viewport notifications.
///
/// `K` is the owning control's viewport handle. Notifications are delivered
/// from [`Coordinator::pump_events`](crate::Coordinator::pump_events), on the
/// thread that owns the coordinator.
pub trait ViewportListener<K> {
    /// The presented status of `viewport` changed.
    fn status_changed(&mut self, viewport: K, old: ViewportStatus, new: ViewportStatus);

    /// The interaction kind of `viewport` changed.
    fn interaction_changed(&mut self, viewport: K, interaction: InteractionType) {
        let _ = (viewport, interaction);
    }

    /// The drag-drop status of `viewport` changed.
    fn drag_drop_status_changed(
        &mut self,
        viewport: K,
        current: DragDropStatus,
        previous: DragDropStatus,
    ) {
        let _ = (viewport, current, previous);
    }
}

/// A notification as recorded by [`RecordingListener`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Notification<K> {
    /// See [`ViewportListener::status_changed`].
    Status {
        /// Viewport handle.
        viewport: K,
        /// Previously presented status.
        old: ViewportStatus,
        /// Newly presented status.
        new: ViewportStatus,
    },
    /// See [`ViewportListener::interaction_changed`].
    Interaction {
        /// Viewport handle.
        viewport: K,
        /// New interaction kind.
        interaction: InteractionType,
    },
    /// See [`ViewportListener::drag_drop_status_changed`].
    DragDrop {
        /// Viewport handle.
        viewport: K,
        /// New drag-drop status.
        current: DragDropStatus,
        /// Previous drag-drop status.
        previous: DragDropStatus,
    },
}

/// Listener that records every notification in order.
#[derive(Clone, Debug)]
pub struct RecordingListener<K> {
    /// Recorded notifications.
    pub notifications: Vec<Notification<K>>,
}

impl<K> Default for RecordingListener<K> {
    fn default() -> Self {
        Self {
            notifications: Vec::new(),
        }
    }
}

impl<K: Copy> RecordingListener<K> {
    /// Presented status transitions, in order.
    #[must_use]
    pub fn statuses(&self) -> Vec<(K, ViewportStatus, ViewportStatus)> {
        self.notifications
            .iter()
            .filter_map(|n| match *n {
                Notification::Status { viewport, old, new } => Some((viewport, old, new)),
                _ => None,
            })
            .collect()
    }
}

impl<K> ViewportListener<K> for RecordingListener<K> {
    fn status_changed(&mut self, viewport: K, old: ViewportStatus, new: ViewportStatus) {
        self.notifications
            .push(Notification::Status { viewport, old, new });
    }

    fn interaction_changed(&mut self, viewport: K, interaction: InteractionType) {
        self.notifications.push(Notification::Interaction {
            viewport,
            interaction,
        });
    }

    fn drag_drop_status_changed(
        &mut self,
        viewport: K,
        current: DragDropStatus,
        previous: DragDropStatus,
    ) {
        self.notifications.push(Notification::DragDrop {
            viewport,
            current,
            previous,
        });
    }
}
