//! Data layer module
//!
//! Relationship records, the volatile per-screen relationship cache and the
//! embedded SQLite backend.

mod cache;
mod database;
mod models;

pub use cache::{RelationshipCache, ToggleTicket};
pub use database::Database;
pub(crate) use database::escape_like;
pub use models::*;
