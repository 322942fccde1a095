// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coordinator options.

use std::fmt;
use std::sync::Arc;

/// Tuning of the synthesized overpan effects.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OverpanTuning {
    /// Overpan distance, in pixels, over which compression reaches its full effect.
    pub max_overpan_distance: f64,
    /// Zoom factor reached at full compression.
    pub scale_overpan_value: f64,
    /// Gap, in pixels, between a clamping segment and the segment it precedes.
    pub min_overpan_distance: f64,
    /// Factor applied to the logical display height to place the compression centerpoint.
    pub centerpoint_scale_factor: f64,
}

impl Default for OverpanTuning {
    fn default() -> Self {
        Self {
            max_overpan_distance: 200.0,
            scale_overpan_value: 0.91,
            min_overpan_distance: 1.0,
            centerpoint_scale_factor: 1.94,
        }
    }
}

/// Source of the display geometry used to place overpan centerpoints.
pub trait DisplayGeometry: Send + Sync {
    /// Height of the primary display in physical pixels, if it can be queried.
    fn primary_display_height(&self) -> Option<f64>;
}

/// A display of fixed size.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FixedDisplay {
    /// Height in physical pixels.
    pub height: f64,
}

impl DisplayGeometry for FixedDisplay {
    fn primary_display_height(&self) -> Option<f64> {
        Some(self.height)
    }
}

/// No display information; overpan curves degrade to pass-through.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoDisplay;

impl DisplayGeometry for NoDisplay {
    fn primary_display_height(&self) -> Option<f64> {
        None
    }
}

/// Options for a [`Coordinator`](crate::Coordinator).
#[derive(Clone)]
pub struct CoordinatorOptions {
    /// Overpan tuning.
    pub overpan: OverpanTuning,
    /// Display geometry provider.
    pub display: Arc<dyn DisplayGeometry>,
}

impl CoordinatorOptions {
    /// Options with the default tuning and the given display.
    #[must_use]
    pub fn with_display(display: impl DisplayGeometry + 'static) -> Self {
        Self {
            overpan: OverpanTuning::default(),
            display: Arc::new(display),
        }
    }
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self::with_display(NoDisplay)
    }
}

impl fmt::Debug for CoordinatorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinatorOptions")
            .field("overpan", &self.overpan)
            .field("display_height", &self.display.primary_display_height())
            .finish()
    }
}
