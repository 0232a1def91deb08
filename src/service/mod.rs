//! Service layer
//!
//! Relationship synchronization and artist directory search on top of the
//! store traits.

mod directory;
mod relationship;

pub use directory::ArtistDirectory;
pub use relationship::{RelationshipService, TargetSummary, ToggleAction, ToggleOutcome};
