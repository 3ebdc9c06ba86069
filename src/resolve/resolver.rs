//! Comparison resolution: keep an index-aligned `{unit, loading, error}` view over a
//! changing list of refs.
//!
//! Each distinct cache key is tracked as a task state (`Idle -> Pending -> Settled`).
//! Fetch tasks report back through a completion channel; the resolver applies those
//! messages in [ComparisonResolver::next_completion]. Every dispatch gets a fresh
//! generation, and a completion only settles the dispatch that produced it. Results are always reported in ref
//! order, never completion order. Dropping a ref discards its tracked state, while the
//! fetch itself keeps running and fills the shared cache.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::compare::aggregate::GroupMember;
use crate::data::refs::{CacheKey, ComparisonRef};
use crate::data::unit::Unit;
use crate::error::{ResolveError, Result};
use crate::resolve::cache::UnitCache;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskState {
    /// Tracked but no fetch dispatched yet.
    Idle,
    /// Waiting on the fetch dispatched with this generation.
    Pending(u64),
    Settled(Result<Arc<Unit>>),
}

#[derive(Debug)]
struct Completion {
    key: CacheKey,
    generation: u64,
    result: Result<Arc<Unit>>,
}

/// Index-aligned resolution state for the current refs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionSnapshot {
    pub units: Vec<Option<Arc<Unit>>>,
    pub loading: Vec<bool>,
    pub errors: Vec<Option<ResolveError>>,
    pub any_loading: bool,
}

impl ResolutionSnapshot {
    /// Pairs resolved units with group-mode quantities (index aligned). Unresolved slots
    /// are skipped so aggregation covers whatever did resolve.
    pub fn group_members<'a>(&'a self, quantities: &[u32]) -> Vec<GroupMember<'a>> {
        self.units
            .iter()
            .zip(quantities)
            .filter_map(|(unit, &quantity)| {
                unit.as_deref().map(|unit| GroupMember::new(unit, quantity))
            })
            .collect()
    }

    pub fn resolved(&self) -> impl Iterator<Item = &Arc<Unit>> {
        self.units.iter().flatten()
    }
}

pub struct ComparisonResolver {
    cache: Arc<UnitCache>,
    refs: Vec<ComparisonRef>,
    states: HashMap<CacheKey, TaskState>,
    next_generation: u64,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

impl ComparisonResolver {
    pub fn new(cache: Arc<UnitCache>) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            cache,
            refs: Vec::new(),
            states: HashMap::new(),
            next_generation: 0,
            completion_tx,
            completion_rx,
        }
    }

    pub fn refs(&self) -> &[ComparisonRef] {
        &self.refs
    }

    pub fn state(&self, key: &CacheKey) -> Option<&TaskState> {
        self.states.get(key)
    }

    /// Replaces the requested refs. Keys no longer requested are forgotten; new keys
    /// resolve synchronously from the cache or get a fetch dispatched. Must be called
    /// from within a tokio runtime.
    pub fn set_refs(&mut self, refs: Vec<ComparisonRef>) {
        let wanted: HashSet<CacheKey> = refs.iter().filter_map(ComparisonRef::cache_key).collect();

        self.states.retain(|key, state| {
            let keep = wanted.contains(key);
            if !keep {
                debug!("dropping tracked state for {key} ({state:?})");
            }
            keep
        });
        for key in wanted {
            self.states.entry(key).or_insert(TaskState::Idle);
        }
        self.refs = refs;
        self.dispatch_idle();
    }

    /// Moves errored keys back to pending and fetches them again.
    pub fn retry_failed(&mut self) {
        for state in self.states.values_mut() {
            if matches!(state, TaskState::Settled(Err(_))) {
                *state = TaskState::Idle;
            }
        }
        self.dispatch_idle();
    }

    fn dispatch_idle(&mut self) {
        for (key, state) in self.states.iter_mut() {
            if *state != TaskState::Idle {
                continue;
            }
            if let Some(unit) = self.cache.get(key) {
                *state = TaskState::Settled(Ok(unit));
                continue;
            }
            let generation = self.next_generation;
            self.next_generation += 1;
            *state = TaskState::Pending(generation);
            let fetch = self.cache.fetch(key);
            let tx = self.completion_tx.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let result = fetch.await;
                // The resolver may be gone; the cache already holds the result.
                let _ = tx.send(Completion {
                    key,
                    generation,
                    result,
                });
            });
        }
    }

    fn apply(&mut self, completion: Completion) {
        match self.states.get_mut(&completion.key) {
            Some(state) if *state == TaskState::Pending(completion.generation) => {
                *state = TaskState::Settled(completion.result);
            }
            _ => debug!("ignoring stale completion for {}", completion.key),
        }
    }

    pub fn has_pending(&self) -> bool {
        self.states
            .values()
            .any(|state| matches!(state, TaskState::Idle | TaskState::Pending(_)))
    }

    /// Applies completions that have already arrived without waiting. Returns how many.
    pub fn poll_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Waits for and applies one completion. Returns false when nothing is pending.
    pub async fn next_completion(&mut self) -> bool {
        if !self.has_pending() {
            return false;
        }
        match self.completion_rx.recv().await {
            Some(completion) => {
                self.apply(completion);
                true
            }
            None => false,
        }
    }

    /// Drives completions until no requested ref is loading.
    pub async fn settle(&mut self) -> ResolutionSnapshot {
        while self.next_completion().await {}
        self.snapshot()
    }

    pub fn snapshot(&self) -> ResolutionSnapshot {
        let mut snapshot = ResolutionSnapshot {
            units: Vec::with_capacity(self.refs.len()),
            loading: Vec::with_capacity(self.refs.len()),
            errors: Vec::with_capacity(self.refs.len()),
            any_loading: false,
        };
        for r in &self.refs {
            let state = r.cache_key().and_then(|key| self.states.get(&key));
            let (unit, loading, error) = match state {
                None => (None, false, None),
                Some(TaskState::Idle | TaskState::Pending(_)) => (None, true, None),
                Some(TaskState::Settled(Ok(unit))) => (Some(Arc::clone(unit)), false, None),
                Some(TaskState::Settled(Err(err))) => (None, false, Some(err.clone())),
            };
            snapshot.any_loading |= loading;
            snapshot.units.push(unit);
            snapshot.loading.push(loading);
            snapshot.errors.push(error);
        }
        snapshot
    }
}

/// Resolves `refs` once and waits for every fetch to settle.
pub async fn resolve_comparison(
    cache: Arc<UnitCache>,
    refs: Vec<ComparisonRef>,
) -> ResolutionSnapshot {
    let mut resolver = ComparisonResolver::new(cache);
    resolver.set_refs(refs);
    resolver.settle().await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::data::source::MemoryFactionSource;

    fn unit(faction_id: &str, unit_id: &str) -> Unit {
        serde_json::from_value(serde_json::json!({
            "unit_id": unit_id,
            "faction_id": faction_id,
            "name": unit_id,
            "combat": { "health": 100.0 }
        }))
        .expect("fixture unit")
    }

    #[tokio::test]
    async fn pending_selection_never_loads() {
        let source = Arc::new(MemoryFactionSource::new());
        let mut resolver = ComparisonResolver::new(UnitCache::new(source.clone()));
        resolver.set_refs(vec![ComparisonRef::pending("arm")]);

        let snapshot = resolver.snapshot();
        assert_eq!(snapshot.loading, vec![false]);
        assert_eq!(snapshot.units, vec![None]);
        assert_eq!(snapshot.errors, vec![None]);
        assert!(!snapshot.any_loading);
        assert!(!resolver.next_completion().await);
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn cached_refs_resolve_without_loading() {
        let source = Arc::new(MemoryFactionSource::new());
        let cache = UnitCache::new(source.clone());
        cache.insert(CacheKey::new("arm", "armcom"), unit("arm", "armcom"));

        let mut resolver = ComparisonResolver::new(cache);
        resolver.set_refs(vec![ComparisonRef::new("arm", "armcom")]);

        let snapshot = resolver.snapshot();
        assert!(!snapshot.any_loading);
        assert_eq!(snapshot.loading, vec![false]);
        assert!(snapshot.units[0].is_some());
        assert_eq!(source.fetch_count(), 0);
    }

    #[tokio::test]
    async fn removed_ref_state_is_discarded_but_fetch_fills_cache() {
        let key = CacheKey::new("cor", "corcom");
        let source = Arc::new(
            MemoryFactionSource::new()
                .with_unit(unit("cor", "corcom"))
                .with_delay(key.clone(), Duration::from_millis(20)),
        );
        let cache = UnitCache::new(source.clone());
        let mut resolver = ComparisonResolver::new(Arc::clone(&cache));

        resolver.set_refs(vec![ComparisonRef::new("cor", "corcom")]);
        assert!(resolver.snapshot().any_loading);

        resolver.set_refs(vec![]);
        assert!(resolver.state(&key).is_none());
        assert!(!resolver.next_completion().await);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(resolver.poll_completions(), 1);
        assert!(resolver.state(&key).is_none());
        assert!(cache.get(&key).is_some());

        resolver.set_refs(vec![ComparisonRef::new("cor", "corcom")]);
        assert!(!resolver.snapshot().any_loading);
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn retry_refetches_failed_keys() {
        let key = CacheKey::new("leg", "legcom");
        let source = Arc::new(
            MemoryFactionSource::new()
                .with_failure(key.clone(), ResolveError::transient("leg:legcom", "offline")),
        );
        let mut resolver = ComparisonResolver::new(UnitCache::new(source.clone()));
        resolver.set_refs(vec![ComparisonRef::new("leg", "legcom")]);

        let snapshot = resolver.settle().await;
        assert!(snapshot.errors[0].as_ref().is_some_and(ResolveError::is_retryable));

        resolver.retry_failed();
        assert!(resolver.snapshot().any_loading);
        let snapshot = resolver.settle().await;
        assert!(snapshot.errors[0].is_some());
        assert_eq!(source.fetch_count(), 2);
    }

    #[tokio::test]
    async fn stale_failure_does_not_settle_a_readded_ref() {
        let key = CacheKey::new("arm", "armcom");
        let source = Arc::new(
            MemoryFactionSource::new()
                .with_unit(unit("arm", "armcom"))
                .with_failures(key.clone(), ResolveError::transient("arm:armcom", "blip"), 1),
        );
        let cache = UnitCache::new(source.clone());
        let mut resolver = ComparisonResolver::new(Arc::clone(&cache));

        resolver.set_refs(vec![ComparisonRef::new("arm", "armcom")]);
        // Let the first fetch fail; its completion stays queued.
        tokio::time::sleep(Duration::from_millis(10)).await;
        resolver.set_refs(vec![]);
        resolver.set_refs(vec![ComparisonRef::new("arm", "armcom")]);
        assert!(matches!(resolver.state(&key), Some(TaskState::Pending(_))));

        let snapshot = resolver.settle().await;
        assert_eq!(source.fetch_count(), 2);
        assert!(cache.get(&key).is_some());
        assert_eq!(snapshot.errors, vec![None]);
        assert_eq!(
            snapshot.units[0].as_ref().map(|u| u.unit_id.as_str()),
            Some("armcom")
        );
    }

    #[tokio::test]
    async fn group_members_pair_quantities_with_resolved_units() {
        let source = Arc::new(MemoryFactionSource::new().with_unit(unit("arm", "armpw")));
        let snapshot = resolve_comparison(
            UnitCache::new(source),
            vec![
                ComparisonRef::new("arm", "armpw"),
                ComparisonRef::new("arm", "nope"),
            ],
        )
        .await;

        let members = snapshot.group_members(&[4, 2]);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].quantity, 4);
        assert!(matches!(snapshot.errors[1], Some(ResolveError::NotFound { .. })));
    }
}
