//! Data models
//!
//! Typed records for relationships and artists. Rows coming back from a
//! backend are parsed into these types before any service sees them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

// =============================================================================
// Relationship kind
// =============================================================================

/// Which relationship a row represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Actor follows an artist
    FollowArtist,
    /// Actor follows another user
    FollowUser,
    /// Actor likes a video
    LikeVideo,
}

impl RelationshipKind {
    pub const ALL: [RelationshipKind; 3] = [Self::FollowArtist, Self::FollowUser, Self::LikeVideo];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FollowArtist => "follow_artist",
            Self::FollowUser => "follow_user",
            Self::LikeVideo => "like_video",
        }
    }

    /// Segment placed between actor and target in relationship ids
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::FollowArtist => "a",
            Self::FollowUser => "u",
            Self::LikeVideo => "v",
        }
    }

    /// Storage column holding the target id for this kind
    pub fn target_column(&self) -> &'static str {
        match self {
            Self::FollowArtist => "artist_id",
            Self::FollowUser => "user_id",
            Self::LikeVideo => "video_id",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "follow_artist" => Ok(Self::FollowArtist),
            "follow_user" => Ok(Self::FollowUser),
            "like_video" => Ok(Self::LikeVideo),
            other => Err(AppError::InvalidData(format!(
                "unknown relationship kind: {other}"
            ))),
        }
    }
}

// =============================================================================
// Relationship
// =============================================================================

/// Identity of a relationship: (actor, target, kind)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationshipKey {
    pub actor_id: String,
    pub target_id: String,
    pub kind: RelationshipKind,
}

impl RelationshipKey {
    pub fn new(
        actor_id: impl Into<String>,
        target_id: impl Into<String>,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            target_id: target_id.into(),
            kind,
        }
    }

    /// Deterministic relationship id
    ///
    /// Example: actor "u1" following artist "a1" is "u1_a_a1".
    pub fn relationship_id(&self) -> String {
        format!(
            "{}_{}_{}",
            self.actor_id,
            self.kind.id_prefix(),
            self.target_id
        )
    }

    /// Check that both ids are usable in a relationship id
    ///
    /// `_` separates the id parts, so ids containing it would collide
    /// (actor "u1_u" + artist "b" and actor "u1" + user "a_b").
    ///
    /// # Errors
    /// `Validation` for blank ids or ids containing `_`
    pub fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [("actor id", &self.actor_id), ("target id", &self.target_id)] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{field} is required")));
            }
            if value.contains('_') {
                return Err(AppError::Validation(format!(
                    "{field} must not contain '_': {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Directed edge "actor follows/likes target"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub actor_id: String,
    pub target_id: String,
    pub kind: RelationshipKind,
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    /// Build a new relationship with its id derived from the key
    pub fn new(key: RelationshipKey) -> Self {
        Self {
            id: key.relationship_id(),
            actor_id: key.actor_id,
            target_id: key.target_id,
            kind: key.kind,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> RelationshipKey {
        RelationshipKey::new(self.actor_id.clone(), self.target_id.clone(), self.kind)
    }
}

/// Storage row for the split-column `relationships` table
///
/// Exactly one of `artist_id`, `user_id`, `video_id` is set, matching `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RelationshipRow {
    pub id: String,
    pub actor_id: String,
    pub kind: String,
    pub artist_id: Option<String>,
    pub user_id: Option<String>,
    pub video_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Relationship> for RelationshipRow {
    fn from(relationship: &Relationship) -> Self {
        let target = Some(relationship.target_id.clone());
        let (artist_id, user_id, video_id) = match relationship.kind {
            RelationshipKind::FollowArtist => (target, None, None),
            RelationshipKind::FollowUser => (None, target, None),
            RelationshipKind::LikeVideo => (None, None, target),
        };

        Self {
            id: relationship.id.clone(),
            actor_id: relationship.actor_id.clone(),
            kind: relationship.kind.as_str().to_string(),
            artist_id,
            user_id,
            video_id,
            created_at: relationship.created_at,
        }
    }
}

impl TryFrom<RelationshipRow> for Relationship {
    type Error = AppError;

    fn try_from(row: RelationshipRow) -> Result<Self, Self::Error> {
        let kind: RelationshipKind = row.kind.parse()?;

        let target_id = match (kind, row.artist_id, row.user_id, row.video_id) {
            (RelationshipKind::FollowArtist, Some(target), None, None)
            | (RelationshipKind::FollowUser, None, Some(target), None)
            | (RelationshipKind::LikeVideo, None, None, Some(target)) => target,
            _ => {
                return Err(AppError::InvalidData(format!(
                    "relationship {} has target columns that do not match kind {}",
                    row.id, kind
                )));
            }
        };

        if row.actor_id.is_empty() || target_id.is_empty() {
            return Err(AppError::InvalidData(format!(
                "relationship {} has an empty actor or target",
                row.id
            )));
        }

        Ok(Self {
            id: row.id,
            actor_id: row.actor_id,
            target_id,
            kind,
            created_at: row.created_at,
        })
    }
}

/// Query filter over relationships
///
/// `target_ids` empty means any target; one id is an equality match; several
/// ids match any of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipFilter {
    pub actor_id: Option<String>,
    pub kind: Option<RelationshipKind>,
    pub target_ids: Vec<String>,
}

impl RelationshipFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    pub fn kind(mut self, kind: RelationshipKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn target(mut self, target_id: impl Into<String>) -> Self {
        self.target_ids = vec![target_id.into()];
        self
    }

    pub fn targets<I, S>(mut self, target_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_ids = target_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Whether a relationship satisfies this filter
    pub fn matches(&self, relationship: &Relationship) -> bool {
        self.actor_id
            .as_deref()
            .is_none_or(|actor| actor == relationship.actor_id)
            && self.kind.is_none_or(|kind| kind == relationship.kind)
            && (self.target_ids.is_empty()
                || self
                    .target_ids
                    .iter()
                    .any(|target| *target == relationship.target_id))
    }
}

// =============================================================================
// Artist
// =============================================================================

/// Artist listed in the directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub cover_url: Option<String>,
    pub bio: Option<String>,
    pub verified: Option<bool>,
    pub instagram: Option<String>,
    pub youtube: Option<String>,
    pub tiktok: Option<String>,
    pub spotify: Option<String>,
    pub apple_music: Option<String>,
    pub x_twitter: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Artist {
    /// Unverified artist with no profile links, created now
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            avatar_url: None,
            cover_url: None,
            bio: None,
            verified: None,
            instagram: None,
            youtube: None,
            tiktok: None,
            spotify: None,
            apple_music: None,
            x_twitter: None,
            created_at: Utc::now(),
        }
    }
}
