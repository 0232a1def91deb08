//! SQLite-backed store

use async_trait::async_trait;

use super::{ArtistCatalog, RelationshipStore, observe};
use crate::data::{Artist, Database, Relationship, RelationshipFilter, RelationshipKey};
use crate::error::Result;

const BACKEND: &str = "sqlite";

#[async_trait]
impl RelationshipStore for Database {
    async fn query(&self, filter: &RelationshipFilter) -> Result<Vec<Relationship>> {
        observe(BACKEND, "query", self.get_relationships(filter)).await
    }

    async fn insert(&self, relationship: &Relationship) -> Result<Relationship> {
        observe(BACKEND, "insert", self.insert_relationship(relationship)).await?;
        Ok(relationship.clone())
    }

    async fn delete(&self, key: &RelationshipKey) -> Result<()> {
        let removed = observe(BACKEND, "delete", self.delete_relationship(key)).await?;
        if !removed {
            tracing::debug!(
                actor_id = %key.actor_id,
                target_id = %key.target_id,
                kind = %key.kind,
                "Delete matched no relationship"
            );
        }
        Ok(())
    }

    async fn count(&self, filter: &RelationshipFilter) -> Result<u64> {
        observe(BACKEND, "count", self.count_relationships(filter)).await
    }
}

#[async_trait]
impl ArtistCatalog for Database {
    async fn search_artists(&self, term: &str) -> Result<Vec<Artist>> {
        observe(BACKEND, "search_artists", Database::search_artists(self, term)).await
    }
}
