//! In-memory fact reader with instrumentation.
//!
//! Every reader created by one factory shares the same fact table and the
//! same counters, so tests can assert how often the engine built readers,
//! released them and read each name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::element::{TypeHierarchyElement, TypeName};
use crate::reader::{TypeHierarchyClassReader, TypeHierarchyClassReaderFactory};

#[derive(Debug, Default)]
struct Counters {
    readers_created: AtomicUsize,
    releases: AtomicUsize,
    reads_after_release: AtomicUsize,
    reads: Mutex<HashMap<TypeName, usize>>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryClassReaderFactory {
    facts: Arc<HashMap<TypeName, TypeHierarchyElement>>,
    counters: Arc<Counters>,
    latency: Option<Duration>,
}

impl InMemoryClassReaderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, name: &str, superclass: Option<&str>, interfaces: &[&str]) -> Self {
        let qualified_name = TypeName::parse(name);
        let element = TypeHierarchyElement::new(
            qualified_name.clone(),
            superclass.map(TypeName::parse),
            interfaces.iter().map(|i| TypeName::parse(i)).collect(),
        );
        Arc::make_mut(&mut self.facts).insert(qualified_name, element);
        self
    }

    /// Makes every read sleep, which widens race windows in tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn readers_created(&self) -> usize {
        self.counters.readers_created.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }

    pub fn reads_after_release(&self) -> usize {
        self.counters.reads_after_release.load(Ordering::SeqCst)
    }

    pub fn reads_of(&self, name: &str) -> usize {
        let reads = self.counters.reads.lock().unwrap_or_else(PoisonError::into_inner);
        reads.get(&TypeName::parse(name)).copied().unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        let reads = self.counters.reads.lock().unwrap_or_else(PoisonError::into_inner);
        reads.values().sum()
    }
}

impl<P> TypeHierarchyClassReaderFactory<P> for InMemoryClassReaderFactory {
    fn create_class_reader(&self, _project: &P) -> Box<dyn TypeHierarchyClassReader> {
        self.counters.readers_created.fetch_add(1, Ordering::SeqCst);
        Box::new(InMemoryClassReader {
            facts: Arc::clone(&self.facts),
            counters: Arc::clone(&self.counters),
            latency: self.latency,
            released: false,
        })
    }
}

#[derive(Debug)]
pub struct InMemoryClassReader {
    facts: Arc<HashMap<TypeName, TypeHierarchyElement>>,
    counters: Arc<Counters>,
    latency: Option<Duration>,
    released: bool,
}

impl TypeHierarchyClassReader for InMemoryClassReader {
    fn read_type_hierarchy(&mut self, name: &TypeName) -> Option<TypeHierarchyElement> {
        if self.released {
            self.counters.reads_after_release.fetch_add(1, Ordering::SeqCst);
        }
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
        {
            let mut reads = self.counters.reads.lock().unwrap_or_else(PoisonError::into_inner);
            *reads.entry(name.clone()).or_default() += 1;
        }
        self.facts.get(name).cloned()
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.counters.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readers_share_facts_and_counters() {
        let factory = InMemoryClassReaderFactory::new().with_type("a.B", Some("a.A"), &["a.I"]);

        let mut first = TypeHierarchyClassReaderFactory::<()>::create_class_reader(&factory, &());
        let mut second = TypeHierarchyClassReaderFactory::<()>::create_class_reader(&factory, &());

        let element = first.read_type_hierarchy(&TypeName::parse("a.B")).unwrap();
        assert_eq!(element.superclass_name, Some(TypeName::parse("a.A")));
        assert!(second.read_type_hierarchy(&TypeName::parse("a.Missing")).is_none());

        first.release();
        first.release();

        assert_eq!(factory.readers_created(), 2);
        assert_eq!(factory.releases(), 1);
        assert_eq!(factory.reads_of("a.B"), 1);
        assert_eq!(factory.reads_of("a.Missing"), 1);
        assert_eq!(factory.total_reads(), 2);
        assert_eq!(factory.reads_after_release(), 0);
    }
}
