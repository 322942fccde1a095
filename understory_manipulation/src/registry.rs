// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Registered viewports, keyed both by caller handle and by engine handle.

use core::hash::Hash;

use hashbrown::HashMap;

use crate::configuration::{Configuration, CrossSlideKind};
use crate::engine::{EngineViewport, HandlerCookie};
use crate::secondary::SecondaryContent;
use crate::types::ViewportStatus;

/// Everything the coordinator owns for one viewport, except its overpan reflexes.
#[derive(Debug)]
pub(crate) struct Viewport<K> {
    pub(crate) engine: EngineViewport,
    pub(crate) handler: HandlerCookie,
    /// Configuration last activated.
    pub(crate) active: Configuration,
    /// Status last presented to the listener.
    pub(crate) presented: ViewportStatus,
    pub(crate) cross_slide: Option<CrossSlideKind>,
    pub(crate) right_to_left: bool,
    pub(crate) secondary: HashMap<K, SecondaryContent>,
    pub(crate) clip: HashMap<K, SecondaryContent>,
}

impl<K> Viewport<K> {
    pub(crate) fn new(engine: EngineViewport, handler: HandlerCookie) -> Self {
        Self {
            engine,
            handler,
            active: Configuration::empty(),
            presented: ViewportStatus::Building,
            cross_slide: None,
            right_to_left: false,
            secondary: HashMap::new(),
            clip: HashMap::new(),
        }
    }

    pub(crate) fn contents(&self, clip: bool) -> &HashMap<K, SecondaryContent> {
        if clip { &self.clip } else { &self.secondary }
    }

    pub(crate) fn contents_mut(&mut self, clip: bool) -> &mut HashMap<K, SecondaryContent> {
        if clip {
            &mut self.clip
        } else {
            &mut self.secondary
        }
    }
}

/// Bidirectional map between caller handles and engine viewports.
#[derive(Debug)]
pub(crate) struct Registry<K> {
    viewports: HashMap<K, Viewport<K>>,
    by_engine: HashMap<EngineViewport, K>,
}

impl<K> Default for Registry<K> {
    fn default() -> Self {
        Self {
            viewports: HashMap::new(),
            by_engine: HashMap::new(),
        }
    }
}

impl<K: Copy + Eq + Hash> Registry<K> {
    pub(crate) fn get(&self, handle: K) -> Option<&Viewport<K>> {
        self.viewports.get(&handle)
    }

    pub(crate) fn get_mut(&mut self, handle: K) -> Option<&mut Viewport<K>> {
        self.viewports.get_mut(&handle)
    }

    pub(crate) fn handle_of(&self, engine: EngineViewport) -> Option<K> {
        self.by_engine.get(&engine).copied()
    }

    pub(crate) fn insert(&mut self, handle: K, viewport: Viewport<K>) {
        debug_assert!(
            !self.viewports.contains_key(&handle),
            "a handle maps to at most one engine viewport"
        );
        self.by_engine.insert(viewport.engine, handle);
        self.viewports.insert(handle, viewport);
    }

    pub(crate) fn remove(&mut self, handle: K) -> Option<Viewport<K>> {
        let viewport = self.viewports.remove(&handle)?;
        self.by_engine.remove(&viewport.engine);
        Some(viewport)
    }

    pub(crate) fn len(&self) -> usize {
        self.viewports.len()
    }

    pub(crate) fn handles(&self) -> impl Iterator<Item = K> + '_ {
        self.viewports.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_directions_stay_consistent() {
        let mut registry = Registry::<u32>::default();
        registry.insert(7, Viewport::new(EngineViewport(70), HandlerCookie(1)));
        registry.insert(8, Viewport::new(EngineViewport(80), HandlerCookie(2)));
        assert_eq!(registry.handle_of(EngineViewport(70)), Some(7));
        assert_eq!(registry.get(8).map(|v| v.engine), Some(EngineViewport(80)));

        let removed = registry.remove(7).unwrap();
        assert_eq!(removed.engine, EngineViewport(70));
        assert_eq!(registry.handle_of(EngineViewport(70)), None);
        assert!(registry.remove(7).is_none());
        assert_eq!(registry.len(), 1);
    }
}
