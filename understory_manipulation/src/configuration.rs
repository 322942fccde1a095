// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Viewport configurations and their translation to engine bitmasks.

use bitflags::bitflags;

use crate::engine::{EngineError, EngineStatus};

bitflags! {
    /// Motions a viewport responds to, as requested by the owning control.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Configuration: u8 {
        /// Horizontal panning.
        const PAN_X = 0x01;
        /// Vertical panning.
        const PAN_Y = 0x02;
        /// Zooming.
        const ZOOM = 0x04;
        /// Inertia after a pan.
        const PAN_INERTIA = 0x08;
        /// Inertia after a zoom.
        const ZOOM_INERTIA = 0x10;
        /// Horizontal rails: a mostly horizontal pan is locked to the horizontal axis.
        const RAILS_X = 0x20;
        /// Vertical rails.
        const RAILS_Y = 0x40;
    }
}

bitflags! {
    /// Configuration bitmask understood by the engine.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EngineConfiguration: u16 {
        /// The viewport participates in interactions at all.
        const INTERACTION = 0x0001;
        /// Horizontal translation.
        const TRANSLATION_X = 0x0002;
        /// Vertical translation.
        const TRANSLATION_Y = 0x0004;
        /// Scaling.
        const SCALING = 0x0010;
        /// Translation inertia.
        const TRANSLATION_INERTIA = 0x0020;
        /// Scaling inertia.
        const SCALING_INERTIA = 0x0080;
        /// Horizontal rails.
        const RAILS_X = 0x0100;
        /// Vertical rails.
        const RAILS_Y = 0x0200;
    }
}

impl From<Configuration> for EngineConfiguration {
    fn from(configuration: Configuration) -> Self {
        const PAIRS: [(Configuration, EngineConfiguration); 7] = [
            (Configuration::PAN_X, EngineConfiguration::TRANSLATION_X),
            (Configuration::PAN_Y, EngineConfiguration::TRANSLATION_Y),
            (Configuration::ZOOM, EngineConfiguration::SCALING),
            (
                Configuration::PAN_INERTIA,
                EngineConfiguration::TRANSLATION_INERTIA,
            ),
            (Configuration::ZOOM_INERTIA, EngineConfiguration::SCALING_INERTIA),
            (Configuration::RAILS_X, EngineConfiguration::RAILS_X),
            (Configuration::RAILS_Y, EngineConfiguration::RAILS_Y),
        ];

        let mut out = Self::empty();
        for (abstract_flag, engine_flag) in PAIRS {
            if configuration.contains(abstract_flag) {
                out |= engine_flag;
            }
        }
        if !out.is_empty() {
            out |= Self::INTERACTION;
        }
        out
    }
}

/// Result of a configuration change that did not fail outright.
///
/// [`NotApplicable`](Self::NotApplicable) is expected while the viewport is
/// being manipulated. Callers reapply the configuration when the next
/// manipulation starts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[must_use]
pub enum ConfigurationOutcome {
    /// The engine accepted the change.
    Applied,
    /// The viewport is active or sealed and the change was skipped.
    NotApplicable,
}

/// Kind of cross-slide viewport to register.
///
/// Cross-slide viewports are zero-sized. They recognize a swipe or pinch that
/// the parent viewport should not handle and chain everything else to it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CrossSlideKind {
    /// Pans horizontally, recognizes vertical cross-slides.
    PanX,
    /// Pans vertically, recognizes horizontal cross-slides.
    PanY,
    /// Blocks the engine until a second contact reaches the parent.
    PanXY,
    /// Blocks manipulations once a pinch-zoom is recognized.
    Zoom,
    /// Carries the drag-drop behavior.
    DragDrop,
}

/// Returns `true` if a configuration change may be attempted in `status`.
pub(crate) fn accepts_configuration(status: EngineStatus) -> bool {
    matches!(
        status,
        EngineStatus::Building | EngineStatus::Disabled | EngineStatus::Enabled | EngineStatus::Ready
    )
}

/// Folds the engine's sealed-viewport race into [`ConfigurationOutcome::NotApplicable`].
pub(crate) fn outcome_of(result: Result<(), EngineError>) -> Result<ConfigurationOutcome, EngineError> {
    match result {
        Ok(()) => Ok(ConfigurationOutcome::Applied),
        Err(EngineError::Sealed) => Ok(ConfigurationOutcome::NotApplicable),
        Err(err) => Err(err),
    }
}
