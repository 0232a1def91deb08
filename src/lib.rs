//! Jaipp - follow/like relationship sync for the Jaipp fan/artist client
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Toggle synchronizer / count refresher per kind           │
//! │  - Artist directory search (debounced)                      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Data Layer                              │
//! │  - Relationship records                                     │
//! │  - Volatile relationship cache                              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Store Boundary                           │
//! │  - Hosted BaaS (PostgREST over reqwest)                     │
//! │  - Embedded SQLite (sqlx)                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `service`: Relationship toggling, counts, artist search
//! - `data`: Records, relationship cache, SQLite backend
//! - `store`: Store traits and the REST backend
//! - `session`: Signed-in actor context
//! - `config`: Configuration management
//! - `telemetry`: Tracing subscriber setup
//! - `metrics`: Prometheus instruments
//! - `error`: Error types

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;
pub mod session;
pub mod store;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use data::RelationshipKind;
use service::{ArtistDirectory, RelationshipService};
use session::Session;
use store::{ArtistCatalog, RelationshipStore};

/// Shared context for one signed-in (or anonymous) session
///
/// Owns the backend handles and hands out services bound to the session.
/// Each screen creates its own service so its cache lives and dies with it.
#[derive(Clone)]
pub struct AppContext {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Current session
    pub session: Session,

    /// Relationship store backend
    pub relationships: Arc<dyn RelationshipStore>,

    /// Artist catalog backend
    pub artists: Arc<dyn ArtistCatalog>,
}

impl AppContext {
    /// Initialize the context from configuration
    ///
    /// # Steps
    /// 1. Validate configuration
    /// 2. Connect the configured backend (REST client or SQLite file)
    ///
    /// # Errors
    /// Returns error if configuration is invalid or the backend cannot be reached
    pub async fn new(config: config::AppConfig, session: Session) -> Result<Self, error::AppError> {
        config.validate()?;

        let relationships: Arc<dyn RelationshipStore>;
        let artists: Arc<dyn ArtistCatalog>;
        match config.backend.mode {
            config::BackendMode::Rest => {
                let rest = Arc::new(store::RestStore::new(&config.backend.rest, &session)?);
                tracing::info!(
                    table = %config.backend.rest.relationships_table,
                    "REST backend initialized"
                );
                relationships = rest.clone();
                artists = rest;
            }
            config::BackendMode::Sqlite => {
                let db = Arc::new(data::Database::connect(&config.backend.sqlite.path).await?);
                relationships = db.clone();
                artists = db;
            }
        }

        tracing::info!(
            signed_in = session.actor_id().is_some(),
            mode = ?config.backend.mode,
            "Application context initialized"
        );

        Ok(Self::with_stores(config, session, relationships, artists))
    }

    /// Build a context around existing backend handles
    pub fn with_stores(
        config: config::AppConfig,
        session: Session,
        relationships: Arc<dyn RelationshipStore>,
        artists: Arc<dyn ArtistCatalog>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            session,
            relationships,
            artists,
        }
    }

    /// Relationship service for `kind`, with an empty cache
    pub fn relationship_service(&self, kind: RelationshipKind) -> RelationshipService {
        RelationshipService::new(self.relationships.clone(), &self.session, kind)
    }

    pub fn follow_artists(&self) -> RelationshipService {
        self.relationship_service(RelationshipKind::FollowArtist)
    }

    pub fn follow_users(&self) -> RelationshipService {
        self.relationship_service(RelationshipKind::FollowUser)
    }

    pub fn like_videos(&self) -> RelationshipService {
        self.relationship_service(RelationshipKind::LikeVideo)
    }

    /// Artist directory using the configured debounce
    pub fn artist_directory(&self) -> ArtistDirectory {
        ArtistDirectory::new(
            self.artists.clone(),
            Duration::from_millis(self.config.search.debounce_ms),
        )
    }
}
