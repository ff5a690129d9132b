//! Time-ordered ids for users and admins.
//!
//! Postgres cannot generate UUIDv7 itself, so ids are minted app-side. List
//! endpoints order by creation time and v7 keeps the primary key in the same
//! order.

use uuid::Uuid;

/// Generate a new UUIDv7.
pub fn uuidv7() -> Uuid {
    Uuid::now_v7()
}
