//! Per-project memo of structural facts.
//!
//! A cache instance belongs to exactly one project. Facts are immutable, so
//! entries are never updated in place: the first fact stored for a name is
//! the one every later reader sees. A project whose output changed gets a
//! brand new cache through `TypeHierarchyEngine::clear_cache`.

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::element::{TypeHierarchyElement, TypeName};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
pub struct TypeHierarchyElementCache {
    elements: DashMap<TypeName, Arc<TypeHierarchyElement>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl TypeHierarchyElementCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &TypeName) -> Option<Arc<TypeHierarchyElement>> {
        let element = self.elements.get(name).map(|e| Arc::clone(e.value()));
        let counter = if element.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        element
    }

    /// Stores `element` unless a fact for `name` is already present and
    /// returns whichever fact ends up cached.
    pub fn put(&self, name: TypeName, element: TypeHierarchyElement) -> Arc<TypeHierarchyElement> {
        let entry = self
            .elements
            .entry(name)
            .or_insert_with(|| Arc::new(element));
        Arc::clone(entry.value())
    }

    pub fn contains_computed(&self, name: &TypeName) -> bool {
        self.elements.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Lookups are counted by `get` only.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.elements.len() as u64,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
