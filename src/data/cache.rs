//! In-memory relationship cache
//!
//! Volatile: populated from the store when a screen mounts and dropped with
//! the session. Not a source of truth.
//!
//! Store reads race with toggles, so results are merged against a
//! [`SyncPoint`] taken before the read: targets toggled or still in flight
//! since then keep the membership the toggles produced.

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use super::models::{RelationshipFilter, RelationshipKind};
use crate::store::RelationshipStore;

/// Ticket handed out when a toggle starts
///
/// Completions are ordered by `generation`; an older completion never
/// overrides a newer one for the same target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleTicket {
    pub generation: u64,
    /// Believed membership when the toggle was issued
    pub was_active: bool,
}

impl ToggleTicket {
    /// Membership this toggle is trying to reach
    pub fn intent(&self) -> bool {
        !self.was_active
    }
}

/// Position in the cache's toggle history, taken before a store read
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SyncPoint(u64);

#[derive(Debug)]
struct InFlight {
    latest_intent: bool,
    applied_generation: u64,
    outstanding: usize,
}

#[derive(Debug, Default)]
struct CacheState {
    members: HashSet<String>,
    in_flight: HashMap<String, InFlight>,
    /// Bumped when a toggle starts and when one completes
    clock: u64,
    /// Clock value of the last toggle event per target
    touched: HashMap<String, u64>,
}

impl CacheState {
    fn apply(&mut self, target_id: &str, active: bool) {
        if active {
            self.members.insert(target_id.to_string());
        } else {
            self.members.remove(target_id);
        }
    }

    fn tick(&mut self, target_id: &str) -> u64 {
        self.clock += 1;
        self.touched.insert(target_id.to_string(), self.clock);
        self.clock
    }

    /// Whether a read taken at `since` is stale for `target_id`
    fn toggled_since(&self, target_id: &str, since: SyncPoint) -> bool {
        self.in_flight.contains_key(target_id)
            || self
                .touched
                .get(target_id)
                .is_some_and(|touched| *touched > since.0)
    }
}

/// Targets the current actor has an active relationship with, for one kind
pub struct RelationshipCache {
    actor_id: Option<String>,
    kind: RelationshipKind,
    state: RwLock<CacheState>,
}

impl RelationshipCache {
    /// Create an empty cache
    ///
    /// # Arguments
    /// * `actor_id` - Signed-in actor, `None` when anonymous
    /// * `kind` - Relationship kind this cache tracks
    pub fn new(actor_id: Option<String>, kind: RelationshipKind) -> Self {
        Self {
            actor_id,
            kind,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn actor_id(&self) -> Option<&str> {
        self.actor_id.as_deref()
    }

    pub fn kind(&self) -> RelationshipKind {
        self.kind
    }

    pub async fn contains(&self, target_id: &str) -> bool {
        self.state.read().await.members.contains(target_id)
    }

    pub async fn add(&self, target_id: &str) {
        let mut state = self.state.write().await;
        let before = state.members.len();
        state.members.insert(target_id.to_string());
        self.resize(before, state.members.len());
    }

    pub async fn remove(&self, target_id: &str) {
        let mut state = self.state.write().await;
        let before = state.members.len();
        state.members.remove(target_id);
        self.resize(before, state.members.len());
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.members.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.members.is_empty()
    }

    /// Copy of the current membership set
    pub async fn snapshot(&self) -> HashSet<String> {
        self.state.read().await.members.clone()
    }

    /// Take a sync point before reading from the store
    pub async fn sync_point(&self) -> SyncPoint {
        SyncPoint(self.state.read().await.clock)
    }

    /// Bulk-load membership from the store
    ///
    /// Replaces the current contents with every target the actor has a
    /// relationship of this kind with, except targets toggled while the
    /// query ran. On store failure the error is logged and the cache is left
    /// as it was, so callers degrade to "nothing followed/liked" on a fresh
    /// cache. Anonymous caches skip the store.
    pub async fn hydrate(&self, store: &dyn RelationshipStore) -> HashSet<String> {
        use crate::metrics::RELATIONSHIP_HYDRATIONS_TOTAL;

        let Some(actor_id) = self.actor_id.as_deref() else {
            RELATIONSHIP_HYDRATIONS_TOTAL
                .with_label_values(&[self.kind.as_str(), "skipped"])
                .inc();
            return HashSet::new();
        };

        let filter = RelationshipFilter::new().actor(actor_id).kind(self.kind);
        let since = self.sync_point().await;
        match store.query(&filter).await {
            Ok(relationships) => {
                let targets: HashSet<String> = relationships
                    .into_iter()
                    .filter(|relationship| filter.matches(relationship))
                    .map(|relationship| relationship.target_id)
                    .collect();
                let loaded = targets.len();
                let members = self.replace_since(since, targets).await;

                RELATIONSHIP_HYDRATIONS_TOTAL
                    .with_label_values(&[self.kind.as_str(), "success"])
                    .inc();
                tracing::debug!(
                    actor_id = %actor_id,
                    kind = %self.kind,
                    loaded,
                    count = members.len(),
                    "Relationship cache hydrated"
                );
                members
            }
            Err(error) => {
                error.record("hydrate");
                RELATIONSHIP_HYDRATIONS_TOTAL
                    .with_label_values(&[self.kind.as_str(), "error"])
                    .inc();
                tracing::warn!(
                    actor_id = %actor_id,
                    kind = %self.kind,
                    %error,
                    "Failed to hydrate relationship cache"
                );
                self.snapshot().await
            }
        }
    }

    /// Replace membership with `targets`, read at `since`
    ///
    /// Targets toggled or in flight since `since` keep their current
    /// membership.
    ///
    /// # Returns
    /// Membership after the merge
    pub async fn replace_since(
        &self,
        since: SyncPoint,
        targets: HashSet<String>,
    ) -> HashSet<String> {
        let mut state = self.state.write().await;
        let before = state.members.len();

        let mut members: HashSet<String> = targets
            .into_iter()
            .filter(|target_id| !state.toggled_since(target_id, since))
            .collect();
        members.extend(
            state
                .members
                .iter()
                .filter(|target_id| state.toggled_since(target_id, since))
                .cloned(),
        );

        state.members = members;
        self.resize(before, state.members.len());
        state.members.clone()
    }

    /// Merge a store read covering `scope`, taken at `since`
    ///
    /// Targets in `present` are added unless toggled since `since`. Nothing
    /// is removed.
    ///
    /// # Returns
    /// Membership per scope target: the store's answer, or the cache's for
    /// targets toggled since the read started
    pub async fn merge_since(
        &self,
        since: SyncPoint,
        scope: &HashSet<String>,
        present: &HashSet<String>,
    ) -> HashMap<String, bool> {
        let mut state = self.state.write().await;
        let before = state.members.len();

        let mut membership = HashMap::with_capacity(scope.len());
        for target_id in scope {
            let active = if state.toggled_since(target_id, since) {
                state.members.contains(target_id)
            } else if present.contains(target_id) {
                state.members.insert(target_id.clone());
                true
            } else {
                false
            };
            membership.insert(target_id.clone(), active);
        }

        self.resize(before, state.members.len());
        membership
    }

    /// Start a toggle for `target_id`
    ///
    /// The believed membership is the intent of the newest toggle still in
    /// flight for this target, or the confirmed membership when none is.
    pub async fn begin_toggle(&self, target_id: &str) -> ToggleTicket {
        let mut state = self.state.write().await;
        let generation = state.tick(target_id);
        let confirmed = state.members.contains(target_id);

        let entry = state
            .in_flight
            .entry(target_id.to_string())
            .or_insert(InFlight {
                latest_intent: confirmed,
                applied_generation: 0,
                outstanding: 0,
            });
        let was_active = entry.latest_intent;
        entry.latest_intent = !was_active;
        entry.outstanding += 1;

        ToggleTicket {
            generation,
            was_active,
        }
    }

    /// Finish a toggle
    ///
    /// `confirmed` is true when the store confirmed the ticket's intent.
    /// Membership only changes for confirmed tickets newer than the last one
    /// applied to this target.
    ///
    /// # Returns
    /// Whether the ticket's intent was applied
    pub async fn complete_toggle(
        &self,
        target_id: &str,
        ticket: ToggleTicket,
        confirmed: bool,
    ) -> bool {
        let mut state = self.state.write().await;
        state.tick(target_id);

        let (apply, finished) = match state.in_flight.get_mut(target_id) {
            Some(entry) => {
                let apply = confirmed && ticket.generation > entry.applied_generation;
                if apply {
                    entry.applied_generation = ticket.generation;
                }
                entry.outstanding = entry.outstanding.saturating_sub(1);
                (apply, entry.outstanding == 0)
            }
            None => (confirmed, false),
        };

        if finished {
            state.in_flight.remove(target_id);
        }
        if apply {
            let before = state.members.len();
            state.apply(target_id, ticket.intent());
            self.resize(before, state.members.len());
        }

        apply
    }

    /// Track membership changes in the per-kind gauge
    ///
    /// Deltas, so the gauge sums every live cache of a kind.
    fn resize(&self, before: usize, after: usize) {
        use crate::metrics::CACHE_SIZE;
        if before != after {
            CACHE_SIZE
                .with_label_values(&[self.kind.as_str()])
                .add(after as i64 - before as i64);
        }
    }
}

impl Drop for RelationshipCache {
    fn drop(&mut self) {
        let size = self.state.get_mut().members.len();
        self.resize(size, 0);
    }
}
