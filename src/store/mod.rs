//! Remote store boundary
//!
//! The relationship table and the artist directory live in a hosted
//! backend. Services only see these traits:
//! - `RestStore`: the hosted BaaS over its PostgREST endpoint
//! - `Database`: embedded SQLite with the same semantics

mod rest;
mod sqlite;

pub use rest::RestStore;

use async_trait::async_trait;

use crate::data::{Artist, Relationship, RelationshipFilter, RelationshipKey};
use crate::error::Result;

/// Query/insert/delete/count over relationships keyed by (actor, target, kind)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Relationships matching `filter`
    async fn query(&self, filter: &RelationshipFilter) -> Result<Vec<Relationship>>;

    /// Insert a relationship
    ///
    /// # Errors
    /// `UniquenessViolation` when a relationship with the same id exists
    async fn insert(&self, relationship: &Relationship) -> Result<Relationship>;

    /// Delete the relationship identified by `key`
    ///
    /// Succeeds when no matching row exists.
    async fn delete(&self, key: &RelationshipKey) -> Result<()>;

    /// Number of relationships matching `filter`
    async fn count(&self, filter: &RelationshipFilter) -> Result<u64>;
}

/// Artist directory lookups
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtistCatalog: Send + Sync {
    /// Artists whose name contains `term` (case-insensitive), newest first
    ///
    /// A blank term lists every artist.
    async fn search_artists(&self, term: &str) -> Result<Vec<Artist>>;
}

/// Time a store call and record it under `backend`/`operation`
pub(crate) async fn observe<T, F>(
    backend: &'static str,
    operation: &'static str,
    call: F,
) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    let started = std::time::Instant::now();
    let result = call.await;
    let status = match &result {
        Ok(_) => "success",
        Err(error) => error.error_type(),
    };
    crate::metrics::observe_store_request(backend, operation, status, started.elapsed());
    result
}
