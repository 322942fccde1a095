// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Secondary content records and deferred release.

use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::curve::CurveSet;
use crate::engine::{Engine, EngineContent, EngineError};
use crate::types::ContentType;

/// A content object chained to a viewport's primary content.
#[derive(Clone, Debug)]
pub(crate) struct SecondaryContent {
    pub(crate) content: EngineContent,
    pub(crate) content_type: ContentType,
    pub(crate) curves: CurveSet,
}

/// Holds removed secondary content until the caller is done with it.
///
/// Pass a token to
/// [`Coordinator::remove_secondary_content`](crate::Coordinator::remove_secondary_content)
/// while a renderer may still be synchronizing with the content. The content
/// is detached from its viewport right away but only released by
/// [`finalize`](Self::finalize), or when the token is dropped.
pub struct DeferredRelease<E: Engine + ?Sized> {
    engine: Option<Arc<E>>,
    contents: SmallVec<[EngineContent; 2]>,
}

impl<E: Engine + ?Sized> DeferredRelease<E> {
    /// Creates an empty token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            engine: None,
            contents: SmallVec::new(),
        }
    }

    pub(crate) fn adopt(&mut self, engine: &Arc<E>, content: EngineContent) {
        debug_assert!(
            self.engine.as_ref().is_none_or(|held| Arc::ptr_eq(held, engine)),
            "a token must not mix engines"
        );
        self.engine.get_or_insert_with(|| Arc::clone(engine));
        self.contents.push(content);
    }

    /// Contents still waiting for release.
    #[must_use]
    pub fn pending(&self) -> &[EngineContent] {
        &self.contents
    }

    /// Returns `true` if the token still holds content.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.contents.is_empty()
    }

    /// Releases every held content.
    ///
    /// Stops at the first engine error; the remaining content stays pending.
    pub fn finalize(&mut self) -> Result<(), EngineError> {
        let Some(engine) = self.engine.as_ref() else {
            return Ok(());
        };
        while let Some(content) = self.contents.last().copied() {
            trace!(?content, "releasing deferred content");
            engine.release_content(content)?;
            self.contents.pop();
        }
        Ok(())
    }
}

impl<E: Engine + ?Sized> Default for DeferredRelease<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Engine + ?Sized> Drop for DeferredRelease<E> {
    fn drop(&mut self) {
        if let Err(err) = self.finalize() {
            warn!(%err, pending = self.contents.len(), "deferred content release failed");
        }
    }
}

impl<E: Engine + ?Sized> fmt::Debug for DeferredRelease<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredRelease")
            .field("engine", &self.engine.is_some())
            .field("contents", &self.contents)
            .finish()
    }
}
