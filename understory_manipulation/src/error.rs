// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use thiserror::Error;

use crate::engine::EngineError;
use crate::types::ContentType;

/// Errors returned by the [`Coordinator`](crate::Coordinator).
///
/// Expected races never surface here; they are reported through
/// [`ConfigurationOutcome`](crate::ConfigurationOutcome),
/// [`ContactOutcome`](crate::ContactOutcome) or `None`.
#[derive(Debug, Error)]
pub enum Error {
    /// The viewport handle was never registered, or was unregistered.
    #[error("viewport is not registered")]
    ViewportNotRegistered,
    /// The content handle is not registered with the viewport.
    #[error("content is not registered with the viewport")]
    ContentNotRegistered,
    /// The content type cannot be used for secondary content.
    #[error("{0:?} cannot be used as secondary content")]
    InvalidContentType(ContentType),
    /// The engine failed. The coordinator should be considered unusable.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Result alias for coordinator operations.
pub type Result<T> = core::result::Result<T, Error>;
