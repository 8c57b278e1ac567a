//! Zoho Campaigns synchronization engine.
//!
//! Pulls campaign metadata, performance metrics and per-recipient engagement
//! events from the Zoho Campaigns API into a local SQLite records database.

pub mod db;
pub mod sync;
