//! Superclass and interface queries over lazily read, per-project facts.
//!
//! Each project gets one [`ProjectContext`]: a fact cache plus a slot for
//! the project's reader behind a mutex. The mutex serializes reads (readers
//! are not assumed to be thread-safe) and orders them against releases;
//! cache hits never touch it.
//!
//! `does_implement` runs twice at most. The first pass only looks at cached
//! facts and answers quickly when they settle the question; the second pass
//! may read anything still missing.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::cache::{CacheStats, TypeHierarchyElementCache};
use crate::element::{TypeHierarchyElement, TypeName};
use crate::reader::{TypeHierarchyClassReader, TypeHierarchyClassReaderFactory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    CachedOnly,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    Found,
    /// Every fact on the way was available and none matched.
    Absent,
    /// A fact was missing from the cache, so the pass could not decide.
    Inconclusive,
}

#[derive(Default)]
struct ReaderSlot {
    reader: Option<Box<dyn TypeHierarchyClassReader>>,
    /// Set once the context has been dropped from the registry.
    retired: bool,
}

struct ProjectContext {
    cache: TypeHierarchyElementCache,
    reader: Mutex<ReaderSlot>,
}

impl ProjectContext {
    fn new() -> Self {
        Self {
            cache: TypeHierarchyElementCache::new(),
            reader: Mutex::new(ReaderSlot::default()),
        }
    }

    fn lock_reader(&self) -> MutexGuard<'_, ReaderSlot> {
        self.reader.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectStats {
    pub cached_elements: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub reader_active: bool,
}

impl ProjectStats {
    fn new(cache: CacheStats, reader_active: bool) -> Self {
        Self {
            cached_elements: cache.entries,
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            reader_active,
        }
    }
}

pub struct TypeHierarchyEngine<P> {
    factory: Box<dyn TypeHierarchyClassReaderFactory<P>>,
    projects: DashMap<P, Arc<ProjectContext>>,
}

impl<P> TypeHierarchyEngine<P>
where
    P: Eq + Hash + Clone + Send + Sync,
{
    pub fn new(factory: impl TypeHierarchyClassReaderFactory<P> + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            projects: DashMap::new(),
        }
    }

    pub fn get_supertype(&self, project: &P, type_name: &str, cleanup: bool) -> Option<TypeName> {
        let name = TypeName::parse(type_name);
        let result = self
            .type_element(project, &name, Lookup::Full)
            .and_then(|e| e.superclass_name.clone());
        self.finish(project, cleanup);
        result
    }

    /// Directly declared interfaces only, in declaration order.
    pub fn get_interfaces(
        &self,
        project: &P,
        type_name: &str,
        cleanup: bool,
    ) -> Option<Vec<TypeName>> {
        let name = TypeName::parse(type_name);
        let result = self
            .type_element(project, &name, Lookup::Full)
            .map(|e| e.interface_names.clone());
        self.finish(project, cleanup);
        result
    }

    pub fn does_extend(&self, project: &P, type_name: &str, super_name: &str, cleanup: bool) -> bool {
        let target = TypeName::parse(super_name);
        let mut current = Some(TypeName::parse(type_name));
        let mut visited = HashSet::new();
        let mut result = false;

        while let Some(name) = current {
            if name == target {
                result = true;
                break;
            }
            if !visited.insert(name.clone()) {
                break;
            }
            current = self
                .type_element(project, &name, Lookup::Full)
                .and_then(|e| e.superclass_name.clone());
        }

        self.finish(project, cleanup);
        result
    }

    pub fn does_implement(
        &self,
        project: &P,
        type_name: &str,
        interface_name: &str,
        cleanup: bool,
    ) -> bool {
        let class_name = TypeName::parse(type_name);
        let interface = TypeName::parse(interface_name);

        let result = match self.search_interfaces(project, &class_name, &interface, Lookup::CachedOnly) {
            Membership::Found => true,
            Membership::Absent => false,
            Membership::Inconclusive => {
                self.search_interfaces(project, &class_name, &interface, Lookup::Full)
                    == Membership::Found
            }
        };

        self.finish(project, cleanup);
        result
    }

    /// Releases the project's reader. Cached facts stay; the next miss
    /// creates a fresh reader.
    pub fn cleanup(&self, project: &P) {
        let Some(context) = self.context(project) else {
            return;
        };
        let mut slot = context.lock_reader();
        if let Some(mut reader) = slot.reader.take() {
            reader.release();
            debug!("released type hierarchy reader");
        }
    }

    /// Drops every known project through [`clear_cache`](Self::clear_cache),
    /// facts included.
    pub fn cleanup_all(&self) {
        for project in self.known_projects() {
            self.clear_cache(&project);
        }
    }

    pub fn clear_cache(&self, project: &P) {
        let Some(context) = self.context(project) else {
            return;
        };
        let mut slot = context.lock_reader();
        if let Some(mut reader) = slot.reader.take() {
            reader.release();
        }
        slot.retired = true;
        self.projects
            .remove_if(project, |_, current| Arc::ptr_eq(current, &context));
        debug!(
            cached_elements = context.cache.len(),
            "cleared type hierarchy cache"
        );
    }

    pub fn known_projects(&self) -> Vec<P> {
        self.projects.iter().map(|e| e.key().clone()).collect()
    }

    pub fn stats(&self, project: &P) -> Option<ProjectStats> {
        let context = self.context(project)?;
        let reader_active = context.lock_reader().reader.is_some();
        Some(ProjectStats::new(context.cache.stats(), reader_active))
    }

    fn finish(&self, project: &P, cleanup: bool) {
        if cleanup {
            self.cleanup(project);
        }
    }

    fn context(&self, project: &P) -> Option<Arc<ProjectContext>> {
        self.projects.get(project).map(|e| Arc::clone(e.value()))
    }

    fn context_or_create(&self, project: &P) -> Arc<ProjectContext> {
        if let Some(context) = self.context(project) {
            return context;
        }
        let entry = self
            .projects
            .entry(project.clone())
            .or_insert_with(|| Arc::new(ProjectContext::new()));
        Arc::clone(entry.value())
    }

    fn search_interfaces(
        &self,
        project: &P,
        class_name: &TypeName,
        interface: &TypeName,
        lookup: Lookup,
    ) -> Membership {
        let mut complete = true;
        let mut visited_classes = HashSet::new();
        let mut visited_interfaces: HashSet<TypeName> = HashSet::new();
        let mut current = Some(class_name.clone());

        while let Some(name) = current {
            if !visited_classes.insert(name.clone()) {
                break;
            }
            let Some(class_element) = self.type_element(project, &name, lookup) else {
                complete &= lookup == Lookup::Full;
                break;
            };

            let mut stack = vec![Arc::clone(&class_element)];
            while let Some(element) = stack.pop() {
                if element.declares_interface(interface) {
                    return Membership::Found;
                }
                for candidate in &element.interface_names {
                    if !visited_interfaces.insert(candidate.clone()) {
                        continue;
                    }
                    match self.type_element(project, candidate, lookup) {
                        Some(super_interfaces) if !super_interfaces.interface_names.is_empty() => {
                            stack.push(super_interfaces);
                        }
                        Some(_) => {}
                        None => complete &= lookup == Lookup::Full,
                    }
                }
            }

            current = class_element.superclass_name.clone();
        }

        if complete {
            Membership::Absent
        } else {
            Membership::Inconclusive
        }
    }

    fn type_element(
        &self,
        project: &P,
        name: &TypeName,
        lookup: Lookup,
    ) -> Option<Arc<TypeHierarchyElement>> {
        match lookup {
            Lookup::CachedOnly => self.context(project)?.cache.get(name),
            Lookup::Full => {
                let context = self.context_or_create(project);
                if let Some(element) = context.cache.get(name) {
                    return Some(element);
                }
                self.read_element(project, context, name)
            }
        }
    }

    fn read_element(
        &self,
        project: &P,
        mut context: Arc<ProjectContext>,
        name: &TypeName,
    ) -> Option<Arc<TypeHierarchyElement>> {
        loop {
            let mut slot = context.lock_reader();
            // Another thread may have read it while we waited for the lock.
            if let Some(element) = context.cache.get(name) {
                return Some(element);
            }

            if slot.retired {
                // Cleared while we waited; continue on the project's live context.
                drop(slot);
                context = self.context_or_create(project);
                continue;
            }

            let reader = slot.reader.get_or_insert_with(|| {
                debug!("creating type hierarchy reader");
                self.factory.create_class_reader(project)
            });
            let element = reader.read_type_hierarchy(name)?;
            return Some(context.cache.put(name.clone(), element));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryClassReaderFactory;
    use std::time::{Duration, Instant};

    const PROJECT: &str = "demo";

    fn diamond() -> InMemoryClassReaderFactory {
        InMemoryClassReaderFactory::new()
            .with_type("java.lang.Object", None, &[])
            .with_type("a.T", Some("a.A"), &["a.I1"])
            .with_type("a.A", Some("java.lang.Object"), &["a.I2"])
            .with_type("a.I1", Some("java.lang.Object"), &["a.I3"])
            .with_type("a.I2", Some("java.lang.Object"), &[])
            .with_type("a.I3", Some("java.lang.Object"), &["a.I1"])
            .with_type("a.Unrelated", Some("java.lang.Object"), &[])
    }

    fn engine(factory: &InMemoryClassReaderFactory) -> TypeHierarchyEngine<&'static str> {
        TypeHierarchyEngine::new(factory.clone())
    }

    #[test]
    fn does_extend_is_reflexive_without_reading() {
        let factory = diamond();
        let engine = engine(&factory);

        assert!(engine.does_extend(&PROJECT, "a.T", "a.T", false));
        assert!(engine.does_extend(&PROJECT, "x.Unknown", "x/Unknown", false));
        assert_eq!(factory.total_reads(), 0);
    }

    #[test]
    fn does_extend_walks_the_superclass_chain() {
        let factory = diamond();
        let engine = engine(&factory);

        assert!(engine.does_extend(&PROJECT, "a.T", "a.A", false));
        assert!(engine.does_extend(&PROJECT, "a.T", "java.lang.Object", false));
        assert!(!engine.does_extend(&PROJECT, "a.T", "a.Unrelated", false));
        assert!(!engine.does_extend(&PROJECT, "a.A", "a.T", false));
    }

    #[test]
    fn get_supertype_is_memoized() {
        let factory = diamond();
        let engine = engine(&factory);

        let first = engine.get_supertype(&PROJECT, "a.T", false);
        let second = engine.get_supertype(&PROJECT, "a.T", false);

        assert_eq!(first, Some(TypeName::parse("a.A")));
        assert_eq!(first, second);
        assert_eq!(factory.reads_of("a.T"), 1);
        assert_eq!(factory.readers_created(), 1);
    }

    #[test]
    fn get_interfaces_returns_declared_interfaces_in_order() {
        let factory = InMemoryClassReaderFactory::new()
            .with_type("a.T", Some("java.lang.Object"), &["a.I1", "a.I2"])
            .with_type("a.I1", Some("java.lang.Object"), &[])
            .with_type("a.I2", Some("java.lang.Object"), &[]);
        let engine = engine(&factory);

        assert_eq!(
            engine.get_interfaces(&PROJECT, "a.T", false),
            Some(vec![TypeName::parse("a.I1"), TypeName::parse("a.I2")])
        );
        assert!(engine.does_implement(&PROJECT, "a.T", "a.I1", false));
        assert!(engine.does_implement(&PROJECT, "a.T", "a.I2", false));
    }

    #[test]
    fn unresolvable_types_answer_without_errors() {
        let factory = diamond();
        let engine = engine(&factory);

        assert_eq!(engine.get_supertype(&PROJECT, "x.Unknown", false), None);
        assert_eq!(engine.get_interfaces(&PROJECT, "x.Unknown", false), None);
        assert!(!engine.does_extend(&PROJECT, "x.Unknown", "java.lang.Object", false));
        assert!(!engine.does_implement(&PROJECT, "x.Unknown", "a.I1", false));
    }

    #[test]
    fn unresolved_types_are_not_cached() {
        let factory = diamond();
        let engine = engine(&factory);

        assert_eq!(engine.get_supertype(&PROJECT, "x.Unknown", false), None);
        assert_eq!(engine.get_supertype(&PROJECT, "x.Unknown", false), None);
        assert_eq!(factory.reads_of("x.Unknown"), 2);
        assert_eq!(engine.stats(&PROJECT).unwrap().cached_elements, 0);
    }

    #[test]
    fn does_implement_follows_diamonds_and_terminates_on_cycles() {
        let factory = diamond();
        let engine = engine(&factory);

        assert!(engine.does_implement(&PROJECT, "a.T", "a.I2", false));
        assert!(engine.does_implement(&PROJECT, "a.T", "a.I3", false));
        assert!(engine.does_implement(&PROJECT, "a.T", "a.I1", false));
        assert!(!engine.does_implement(&PROJECT, "a.T", "a.Missing", false));
        assert!(!engine.does_implement(&PROJECT, "a.T", "a.T", false));
    }

    #[test]
    fn self_referential_superclass_terminates() {
        let factory = InMemoryClassReaderFactory::new()
            .with_type("a.Loop", Some("a.Back"), &[])
            .with_type("a.Back", Some("a.Loop"), &[]);
        let engine = engine(&factory);

        assert!(!engine.does_extend(&PROJECT, "a.Loop", "a.Other", false));
        assert!(!engine.does_implement(&PROJECT, "a.Loop", "a.I", false));
    }

    #[test]
    fn warm_does_implement_does_not_read() {
        let factory = diamond();
        let engine = engine(&factory);

        assert!(engine.does_implement(&PROJECT, "a.T", "a.I3", false));
        assert!(!engine.does_implement(&PROJECT, "a.T", "a.Missing", false));
        let reads = factory.total_reads();

        assert!(engine.does_implement(&PROJECT, "a.T", "a.I3", false));
        assert!(engine.does_implement(&PROJECT, "a.T", "a.I2", false));
        assert!(!engine.does_implement(&PROJECT, "a.T", "a.Missing", false));
        assert_eq!(factory.total_reads(), reads);
    }

    #[test]
    fn cached_pass_answers_from_cached_facts_before_reading() {
        let factory = diamond();
        let engine = engine(&factory);

        // Only the facts for a.T and a.I1 are known so far.
        engine.get_supertype(&PROJECT, "a.T", false);
        engine.get_supertype(&PROJECT, "a.I1", false);
        let reads = factory.total_reads();

        assert!(engine.does_implement(&PROJECT, "a.T", "a.I1", false));
        assert!(engine.does_implement(&PROJECT, "a.T", "a.I3", false));
        assert_eq!(factory.total_reads(), reads);

        // a.I2 sits behind the uncached superclass, so the full pass reads it.
        assert!(engine.does_implement(&PROJECT, "a.T", "a.I2", false));
        assert!(factory.reads_of("a.A") >= 1);
    }

    #[test]
    fn cleanup_releases_reader_and_keeps_cache() {
        let factory = diamond();
        let engine = engine(&factory);

        engine.get_supertype(&PROJECT, "a.T", true);
        assert_eq!(factory.releases(), 1);
        let stats = engine.stats(&PROJECT).unwrap();
        assert_eq!(stats.cached_elements, 1);
        assert!(!stats.reader_active);

        assert_eq!(
            engine.get_supertype(&PROJECT, "a.T", false),
            Some(TypeName::parse("a.A"))
        );
        assert_eq!(factory.readers_created(), 1);

        engine.get_supertype(&PROJECT, "a.A", false);
        assert_eq!(factory.readers_created(), 2);
        assert_eq!(factory.reads_after_release(), 0);
    }

    #[test]
    fn clear_cache_returns_project_to_cold_state() {
        let factory = diamond();
        let engine = engine(&factory);

        assert!(engine.does_implement(&PROJECT, "a.T", "a.I3", false));
        let cold_reads = factory.total_reads();

        engine.clear_cache(&PROJECT);
        assert!(engine.stats(&PROJECT).is_none());
        assert_eq!(factory.releases(), 1);

        assert!(engine.does_implement(&PROJECT, "a.T", "a.I3", false));
        assert_eq!(factory.total_reads(), cold_reads * 2);
        assert_eq!(factory.readers_created(), 2);
    }

    #[test]
    fn cleanup_all_clears_every_project() {
        let factory = diamond();
        let engine = engine(&factory);

        engine.get_supertype(&"first", "a.T", false);
        engine.get_supertype(&"second", "a.T", false);
        assert_eq!(engine.known_projects().len(), 2);

        engine.cleanup_all();

        assert!(engine.known_projects().is_empty());
        assert_eq!(factory.releases(), 2);
        engine.get_supertype(&"first", "a.T", false);
        assert_eq!(factory.reads_of("a.T"), 3);
    }

    #[test]
    fn projects_do_not_share_facts() {
        let factory = diamond();
        let engine = engine(&factory);

        engine.get_supertype(&"first", "a.T", false);
        engine.get_supertype(&"second", "a.T", false);

        assert_eq!(factory.reads_of("a.T"), 2);
        assert_eq!(factory.readers_created(), 2);
    }

    #[test]
    fn concurrent_first_queries_create_one_reader() {
        let factory = diamond().with_latency(Duration::from_millis(5));
        let engine = Arc::new(engine(&factory));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || engine.does_implement(&PROJECT, "a.T", "a.I2", false))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }

        assert_eq!(factory.readers_created(), 1);
        assert_eq!(factory.reads_of("a.T"), 1);
        assert_eq!(factory.reads_of("a.A"), 1);
        assert_eq!(engine.known_projects(), vec![PROJECT]);
    }

    #[test]
    fn clear_cache_racing_with_queries_never_reads_released_readers() {
        let factory = diamond().with_latency(Duration::from_millis(1));
        let engine = Arc::new(engine(&factory));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        if i == 0 {
                            engine.clear_cache(&PROJECT);
                        } else {
                            assert!(engine.does_extend(&PROJECT, "a.T", "java.lang.Object", false));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(factory.reads_after_release(), 0);
        engine.cleanup_all();
        assert_eq!(factory.releases(), factory.readers_created());
    }

    #[test]
    fn cache_hits_do_not_wait_behind_a_slow_read() {
        let latency = Duration::from_millis(400);
        let factory = diamond().with_latency(latency);
        let engine = Arc::new(engine(&factory));
        assert!(engine.get_supertype(&PROJECT, "a.T", false).is_some());

        let slow = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.get_supertype(&PROJECT, "a.Slow", false))
        };
        std::thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        assert_eq!(
            engine.get_supertype(&PROJECT, "a.T", false),
            Some(TypeName::parse("a.A"))
        );
        assert!(start.elapsed() < latency / 2);

        assert_eq!(slow.join().unwrap(), None);
        assert_eq!(factory.reads_of("a.T"), 1);
        assert_eq!(factory.reads_of("a.Slow"), 1);
    }

    #[test]
    fn read_on_a_cleared_context_moves_to_the_live_one() {
        let factory = diamond();
        let engine = engine(&factory);
        engine.get_supertype(&PROJECT, "a.T", false);
        let stale = engine.context(&PROJECT).unwrap();

        engine.clear_cache(&PROJECT);
        let element = engine.read_element(&PROJECT, stale, &TypeName::parse("a.A"));

        assert_eq!(
            element.unwrap().superclass_name,
            Some(TypeName::parse("java.lang.Object"))
        );
        let stats = engine.stats(&PROJECT).unwrap();
        assert_eq!(stats.cached_elements, 1);
        assert!(stats.reader_active);
        assert_eq!(factory.readers_created(), 2);
        assert_eq!(factory.releases(), 1);

        engine.get_supertype(&PROJECT, "a.A", false);
        assert_eq!(factory.reads_of("a.A"), 1);
    }

    #[test]
    fn stats_report_cache_lookups() {
        let factory = diamond();
        let engine = engine(&factory);
        assert!(engine.stats(&PROJECT).is_none());

        engine.get_supertype(&PROJECT, "a.T", false);
        engine.get_supertype(&PROJECT, "a.T", false);

        let stats = engine.stats(&PROJECT).unwrap();
        assert_eq!(stats.cached_elements, 1);
        assert!(stats.cache_hits >= 1);
        assert!(stats.cache_misses >= 1);
        assert!(stats.reader_active);
    }
}
