//! SQLite database operations
//!
//! Embedded backend with the same relationship semantics as the hosted
//! BaaS. Used for local runs and tests.

use sqlx::{Pool, QueryBuilder, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use crate::error::AppError;

const RELATIONSHIP_COLUMNS: &str = "id, actor_id, kind, artist_id, user_id, video_id, created_at";
const ANY_TARGET_COLUMN: &str = "COALESCE(artist_id, user_id, video_id)";

/// Append `WHERE` clauses for a relationship filter
fn push_relationship_filter(builder: &mut QueryBuilder<'_, Sqlite>, filter: &RelationshipFilter) {
    builder.push(" WHERE 1 = 1");

    if let Some(actor_id) = &filter.actor_id {
        builder.push(" AND actor_id = ").push_bind(actor_id.clone());
    }
    if let Some(kind) = filter.kind {
        builder.push(" AND kind = ").push_bind(kind.as_str());
    }
    if !filter.target_ids.is_empty() {
        let column = filter
            .kind
            .map(|kind| kind.target_column())
            .unwrap_or(ANY_TARGET_COLUMN);
        builder.push(format_args!(" AND {column} IN ("));
        {
            let mut separated = builder.separated(", ");
            for target_id in &filter.target_ids {
                separated.push_bind(target_id.clone());
            }
        }
        builder.push(")");
    }
}

/// Escape `%`, `_` and `\` for a LIKE pattern using `\` as escape character
pub(crate) fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn map_insert_error(error: sqlx::Error) -> AppError {
    match &error {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
            AppError::UniquenessViolation
        }
        _ => AppError::Database(error),
    }
}

/// Database connection pool wrapper
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    // =========================================================================
    // Connection
    // =========================================================================

    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Arguments
    /// * `path` - Path to SQLite database file
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    // =========================================================================
    // Relationships
    // =========================================================================

    /// Get relationships matching a filter, newest first
    pub async fn get_relationships(
        &self,
        filter: &RelationshipFilter,
    ) -> Result<Vec<Relationship>, AppError> {
        let mut query_builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM relationships"
        ));
        push_relationship_filter(&mut query_builder, filter);
        query_builder.push(" ORDER BY created_at DESC");

        let rows = query_builder
            .build_query_as::<RelationshipRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Relationship::try_from).collect()
    }

    /// Insert relationship
    ///
    /// # Errors
    /// `UniquenessViolation` if a relationship with the same id exists
    pub async fn insert_relationship(&self, relationship: &Relationship) -> Result<(), AppError> {
        let row = RelationshipRow::from(relationship);

        sqlx::query(
            r#"
            INSERT INTO relationships (id, actor_id, kind, artist_id, user_id, video_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.id)
        .bind(&row.actor_id)
        .bind(&row.kind)
        .bind(&row.artist_id)
        .bind(&row.user_id)
        .bind(&row.video_id)
        .bind(row.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_insert_error)?;

        Ok(())
    }

    /// Delete relationship by (actor, target, kind)
    ///
    /// # Returns
    /// true if a row was removed
    pub async fn delete_relationship(&self, key: &RelationshipKey) -> Result<bool, AppError> {
        let query = format!(
            "DELETE FROM relationships WHERE actor_id = ? AND kind = ? AND {} = ?",
            key.kind.target_column()
        );
        let result = sqlx::query(&query)
            .bind(&key.actor_id)
            .bind(key.kind.as_str())
            .bind(&key.target_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count relationships matching a filter
    pub async fn count_relationships(&self, filter: &RelationshipFilter) -> Result<u64, AppError> {
        let mut query_builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM relationships");
        push_relationship_filter(&mut query_builder, filter);

        let count = query_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    // =========================================================================
    // Artists
    // =========================================================================

    /// Insert or replace an artist
    pub async fn upsert_artist(&self, artist: &Artist) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO artists (
                id, name, avatar_url, cover_url, bio, verified, instagram, youtube,
                tiktok, spotify, apple_music, x_twitter, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                avatar_url = excluded.avatar_url,
                cover_url = excluded.cover_url,
                bio = excluded.bio,
                verified = excluded.verified,
                instagram = excluded.instagram,
                youtube = excluded.youtube,
                tiktok = excluded.tiktok,
                spotify = excluded.spotify,
                apple_music = excluded.apple_music,
                x_twitter = excluded.x_twitter
            "#,
        )
        .bind(&artist.id)
        .bind(&artist.name)
        .bind(&artist.avatar_url)
        .bind(&artist.cover_url)
        .bind(&artist.bio)
        .bind(artist.verified)
        .bind(&artist.instagram)
        .bind(&artist.youtube)
        .bind(&artist.tiktok)
        .bind(&artist.spotify)
        .bind(&artist.apple_music)
        .bind(&artist.x_twitter)
        .bind(artist.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Search artists by name, newest first
    ///
    /// Blank terms list every artist.
    pub async fn search_artists(&self, term: &str) -> Result<Vec<Artist>, AppError> {
        let term = term.trim();

        let artists = if term.is_empty() {
            sqlx::query_as::<_, Artist>("SELECT * FROM artists ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?
        } else {
            let pattern = format!("%{}%", escape_like(term));
            sqlx::query_as::<_, Artist>(
                "SELECT * FROM artists WHERE name LIKE ? ESCAPE '\\' ORDER BY created_at DESC",
            )
            .bind(pattern)
            .fetch_all(&self.pool)
            .await?
        };

        Ok(artists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    async fn create_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::connect(&db_path).await.unwrap();
        (db, temp_dir)
    }

    fn artist(id: &str, name: &str, age_minutes: i64) -> Artist {
        Artist {
            id: id.to_string(),
            name: name.to_string(),
            avatar_url: None,
            cover_url: None,
            bio: None,
            verified: Some(false),
            instagram: None,
            youtube: None,
            tiktok: None,
            spotify: None,
            apple_music: None,
            x_twitter: None,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[tokio::test]
    async fn test_relationship_insert_query_delete() {
        let (db, _temp_dir) = create_test_db().await;

        let relationship = Relationship::new(RelationshipKey::new(
            "u1",
            "a1",
            RelationshipKind::FollowArtist,
        ));
        db.insert_relationship(&relationship).await.unwrap();

        let found = db
            .get_relationships(&RelationshipFilter::new().actor("u1"))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "u1_a_a1");
        assert_eq!(found[0].target_id, "a1");

        let removed = db.delete_relationship(&relationship.key()).await.unwrap();
        assert!(removed);
        let removed_again = db.delete_relationship(&relationship.key()).await.unwrap();
        assert!(!removed_again);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_uniqueness_violation() {
        let (db, _temp_dir) = create_test_db().await;

        let key = RelationshipKey::new("u1", "v1", RelationshipKind::LikeVideo);
        db.insert_relationship(&Relationship::new(key.clone()))
            .await
            .unwrap();

        let error = db
            .insert_relationship(&Relationship::new(key))
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::UniquenessViolation));
    }

    #[tokio::test]
    async fn test_count_and_filters_by_kind_and_targets() {
        let (db, _temp_dir) = create_test_db().await;

        for (actor, target, kind) in [
            ("u1", "a1", RelationshipKind::FollowArtist),
            ("u2", "a1", RelationshipKind::FollowArtist),
            ("u1", "a2", RelationshipKind::FollowArtist),
            ("u1", "a1", RelationshipKind::FollowUser),
        ] {
            db.insert_relationship(&Relationship::new(RelationshipKey::new(actor, target, kind)))
                .await
                .unwrap();
        }

        let followers = db
            .count_relationships(
                &RelationshipFilter::new()
                    .kind(RelationshipKind::FollowArtist)
                    .target("a1"),
            )
            .await
            .unwrap();
        assert_eq!(followers, 2);

        let any_kind = db
            .count_relationships(&RelationshipFilter::new().target("a1"))
            .await
            .unwrap();
        assert_eq!(any_kind, 3);

        let page = db
            .get_relationships(
                &RelationshipFilter::new()
                    .kind(RelationshipKind::FollowArtist)
                    .targets(["a1", "a2"]),
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 3);

        let missing = db
            .count_relationships(&RelationshipFilter::new().target("nobody"))
            .await
            .unwrap();
        assert_eq!(missing, 0);
    }

    #[tokio::test]
    async fn test_search_artists_is_case_insensitive_and_newest_first() {
        let (db, _temp_dir) = create_test_db().await;

        db.upsert_artist(&artist("a1", "Mon Laferte", 30)).await.unwrap();
        db.upsert_artist(&artist("a2", "Los Bunkers", 20)).await.unwrap();
        db.upsert_artist(&artist("a3", "Monsieur Periné", 10)).await.unwrap();

        let all = db.search_artists("  ").await.unwrap();
        let ids: Vec<_> = all.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a3", "a2", "a1"]);

        let matches = db.search_artists("MON").await.unwrap();
        let ids: Vec<_> = matches.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a3", "a1"]);

        let literal = db.search_artists("100%").await.unwrap();
        assert!(literal.is_empty());
    }
}
