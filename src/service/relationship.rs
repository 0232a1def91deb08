//! Relationship service
//!
//! Follow/like toggling for one (actor, kind): keeps the local cache in step
//! with the remote store and refreshes aggregate counts for the target shown
//! in the detail view.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::data::{
    Relationship, RelationshipCache, RelationshipFilter, RelationshipKey, RelationshipKind,
};
use crate::error::AppError;
use crate::metrics::RELATIONSHIP_TOGGLES_TOTAL;
use crate::session::Session;
use crate::store::RelationshipStore;

/// What a toggle did remotely
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Created,
    Removed,
    /// Insert collided with an existing relationship
    AlreadyExisted,
}

impl ToggleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToggleAction::Created => "created",
            ToggleAction::Removed => "removed",
            ToggleAction::AlreadyExisted => "already_existed",
        }
    }
}

/// Result of a successful toggle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub target_id: String,
    pub kind: RelationshipKind,
    pub action: ToggleAction,
    /// Cache membership after the toggle resolved
    pub active: bool,
    /// Fresh aggregate count, when the target is open in the detail view
    pub refreshed_count: Option<u64>,
}

/// Per-target aggregate for a page of targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetSummary {
    pub count: u64,
    /// Whether the session actor has a relationship with the target
    pub active: bool,
}

#[derive(Debug)]
struct DetailView {
    target_id: String,
    count: Option<u64>,
}

/// Relationship service
pub struct RelationshipService {
    store: Arc<dyn RelationshipStore>,
    session: Session,
    cache: RelationshipCache,
    detail: RwLock<Option<DetailView>>,
}

impl RelationshipService {
    /// Create new relationship service
    ///
    /// # Arguments
    /// * `store` - Remote relationship store
    /// * `session` - Session whose actor owns the relationships
    /// * `kind` - Relationship kind managed by this service
    pub fn new(
        store: Arc<dyn RelationshipStore>,
        session: &Session,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            store,
            session: session.clone(),
            cache: RelationshipCache::new(session.actor_id().map(str::to_string), kind),
            detail: RwLock::new(None),
        }
    }

    pub fn kind(&self) -> RelationshipKind {
        self.cache.kind()
    }

    pub fn cache(&self) -> &RelationshipCache {
        &self.cache
    }

    /// Load the actor's relationships into the cache
    pub async fn hydrate(&self) -> HashSet<String> {
        self.cache.hydrate(self.store.as_ref()).await
    }

    /// Whether the actor is believed to have a relationship with `target_id`
    pub async fn is_active(&self, target_id: &str) -> bool {
        self.cache.contains(target_id).await
    }

    // =========================================================================
    // Toggle
    // =========================================================================

    /// Flip the relationship with `target_id`
    ///
    /// Deletes when the relationship is believed present, inserts otherwise.
    /// The cache only changes once the store confirms. An insert that hits an
    /// existing relationship counts as confirmation.
    ///
    /// # Errors
    /// - `NotAuthenticated` without a signed-in actor (no remote call)
    /// - `Validation` for a blank target id or ids containing `_` (no remote call)
    /// - Store errors other than a uniqueness violation; the cache is left unchanged
    pub async fn toggle(&self, target_id: &str) -> Result<ToggleOutcome, AppError> {
        let kind = self.kind();

        let actor_id = match self.session.require_actor() {
            Ok(actor_id) => actor_id,
            Err(error) => {
                self.record_toggle("none", error.error_type());
                return Err(error);
            }
        };
        let key = RelationshipKey::new(actor_id, target_id, kind);
        if let Err(error) = key.validate() {
            self.record_toggle("none", error.error_type());
            return Err(error);
        }

        let ticket = self.cache.begin_toggle(target_id).await;

        let result = if ticket.was_active {
            self.store.delete(&key).await.map(|()| ToggleAction::Removed)
        } else {
            match self.store.insert(&Relationship::new(key)).await {
                Ok(_) => Ok(ToggleAction::Created),
                Err(AppError::UniquenessViolation) => {
                    tracing::debug!(
                        actor_id = %actor_id,
                        target_id = %target_id,
                        %kind,
                        "Relationship already existed"
                    );
                    Ok(ToggleAction::AlreadyExisted)
                }
                Err(error) => Err(error),
            }
        };

        match result {
            Ok(action) => {
                let applied = self.cache.complete_toggle(target_id, ticket, true).await;
                let active = self.cache.contains(target_id).await;
                let refreshed_count = self.refresh_detail_if_focused(target_id).await;

                self.record_toggle(action.as_str(), "success");
                tracing::info!(
                    actor_id = %actor_id,
                    target_id = %target_id,
                    %kind,
                    action = action.as_str(),
                    active,
                    applied,
                    "Relationship toggled"
                );

                Ok(ToggleOutcome {
                    target_id: target_id.to_string(),
                    kind,
                    action,
                    active,
                    refreshed_count,
                })
            }
            Err(error) => {
                self.cache.complete_toggle(target_id, ticket, false).await;

                let action = if ticket.was_active { "remove" } else { "create" };
                error.record("toggle");
                if error.is_remote_unavailable() {
                    self.record_toggle(action, "unavailable");
                    tracing::warn!(
                        actor_id = %actor_id,
                        target_id = %target_id,
                        %kind,
                        action,
                        %error,
                        "Relationship store unavailable, toggle not applied"
                    );
                } else {
                    self.record_toggle(action, "error");
                    tracing::error!(
                        actor_id = %actor_id,
                        target_id = %target_id,
                        %kind,
                        action,
                        %error,
                        "Relationship toggle rejected"
                    );
                }
                Err(error)
            }
        }
    }

    fn record_toggle(&self, action: &str, outcome: &str) {
        RELATIONSHIP_TOGGLES_TOTAL
            .with_label_values(&[self.kind().as_str(), action, outcome])
            .inc();
    }

    // =========================================================================
    // Counts
    // =========================================================================

    /// Number of relationships of this kind pointing at `target_id`
    ///
    /// Store errors are logged and reported as zero.
    pub async fn refresh_count(&self, target_id: &str) -> u64 {
        let filter = RelationshipFilter::new()
            .kind(self.kind())
            .target(target_id);

        match self.store.count(&filter).await {
            Ok(count) => count,
            Err(AppError::NotFound) => 0,
            Err(error) => {
                error.record("refresh_count");
                tracing::warn!(
                    target_id = %target_id,
                    kind = %self.kind(),
                    remote_unavailable = error.is_remote_unavailable(),
                    %error,
                    "Failed to refresh relationship count"
                );
                0
            }
        }
    }

    /// Focus the detail view on `target_id` and load its count
    pub async fn open_detail(&self, target_id: &str) -> u64 {
        *self.detail.write().await = Some(DetailView {
            target_id: target_id.to_string(),
            count: None,
        });

        self.refresh_detail_if_focused(target_id)
            .await
            .unwrap_or_default()
    }

    pub async fn close_detail(&self) {
        *self.detail.write().await = None;
    }

    /// Count shown in the detail view, `None` until loaded
    pub async fn detail_count(&self) -> Option<u64> {
        self.detail.read().await.as_ref().and_then(|view| view.count)
    }

    /// Target currently open in the detail view
    pub async fn detail_target(&self) -> Option<String> {
        self.detail
            .read()
            .await
            .as_ref()
            .map(|view| view.target_id.clone())
    }

    async fn refresh_detail_if_focused(&self, target_id: &str) -> Option<u64> {
        if self.detail_target().await.as_deref() != Some(target_id) {
            return None;
        }

        let count = self.refresh_count(target_id).await;

        // The view may have moved on while the count was loading.
        let mut detail = self.detail.write().await;
        if let Some(view) = detail.as_mut().filter(|view| view.target_id == target_id) {
            view.count = Some(count);
        }
        Some(count)
    }

    // =========================================================================
    // Page summaries
    // =========================================================================

    /// Counts and actor membership for a page of targets, in one store query
    ///
    /// Relationships by the session actor are added to the cache, except for
    /// targets toggled while the query ran; those report the cache's
    /// membership. On store failure every target reports zero and inactive.
    pub async fn summarize<I, S>(&self, target_ids: I) -> HashMap<String, TargetSummary>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut summaries: HashMap<String, TargetSummary> = target_ids
            .into_iter()
            .map(|target_id| (target_id.into(), TargetSummary::default()))
            .filter(|(target_id, _)| !target_id.trim().is_empty())
            .collect();
        if summaries.is_empty() {
            return summaries;
        }

        let filter = RelationshipFilter::new()
            .kind(self.kind())
            .targets(summaries.keys().cloned());

        let since = self.cache.sync_point().await;
        let relationships = match self.store.query(&filter).await {
            Ok(relationships) => relationships,
            Err(error) => {
                error.record("summarize");
                tracing::warn!(
                    kind = %self.kind(),
                    targets = summaries.len(),
                    %error,
                    "Failed to load relationship summaries"
                );
                return summaries;
            }
        };

        let actor_id = self.session.actor_id();
        let mut owned = HashSet::new();
        for relationship in relationships {
            if !filter.matches(&relationship) {
                continue;
            }
            let Some(summary) = summaries.get_mut(&relationship.target_id) else {
                continue;
            };
            summary.count += 1;
            if Some(relationship.actor_id.as_str()) == actor_id {
                owned.insert(relationship.target_id);
            }
        }

        if actor_id.is_some() {
            let scope: HashSet<String> = summaries.keys().cloned().collect();
            let membership = self.cache.merge_since(since, &scope, &owned).await;
            for (target_id, active) in membership {
                if let Some(summary) = summaries.get_mut(&target_id) {
                    summary.active = active;
                }
            }
        }

        summaries
    }
}
