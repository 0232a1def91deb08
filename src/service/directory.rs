//! Artist directory
//!
//! Name search over the artist catalog. Search-as-you-type callers go
//! through `search_debounced`, which only queries for the most recent term.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::data::Artist;
use crate::error::AppError;
use crate::store::ArtistCatalog;

/// Artist directory service
pub struct ArtistDirectory {
    catalog: Arc<dyn ArtistCatalog>,
    debounce: Duration,
    latest_term: AtomicU64,
}

impl ArtistDirectory {
    /// Create new artist directory
    ///
    /// # Arguments
    /// * `catalog` - Artist catalog backend
    /// * `debounce` - Quiet period before a typed term is queried
    pub fn new(catalog: Arc<dyn ArtistCatalog>, debounce: Duration) -> Self {
        Self {
            catalog,
            debounce,
            latest_term: AtomicU64::new(0),
        }
    }

    /// Artists whose name contains `term`, newest first
    ///
    /// A blank term lists every artist.
    pub async fn search(&self, term: &str) -> Result<Vec<Artist>, AppError> {
        let term = term.trim();
        match self.catalog.search_artists(term).await {
            Ok(artists) => {
                tracing::debug!(term, results = artists.len(), "Artist search completed");
                Ok(artists)
            }
            Err(error) => {
                error.record("search_artists");
                tracing::warn!(term, %error, "Artist search failed");
                Err(error)
            }
        }
    }

    /// Search after the quiet period
    ///
    /// # Returns
    /// `None` when a newer term was submitted during the quiet period; the
    /// catalog is not queried for superseded terms.
    pub async fn search_debounced(&self, term: &str) -> Result<Option<Vec<Artist>>, AppError> {
        let ticket = self.latest_term.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::time::sleep(self.debounce).await;

        if self.latest_term.load(Ordering::SeqCst) != ticket {
            tracing::trace!(term, "Search term superseded");
            return Ok(None);
        }

        self.search(term).await.map(Some)
    }
}
