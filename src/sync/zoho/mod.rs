//! Zoho Campaigns integration module
//!
//! This module provides OAuth 2.0 authentication against the Zoho accounts
//! service and synchronization of campaigns, analytics, recipient engagement
//! and contacts into the local records database.

mod client;
mod contacts;
mod sync;
mod types;

pub use client::ZohoClient;
pub use contacts::ContactResolver;
pub use sync::{CampaignSyncError, RecipientStats, SyncOutcome, ZohoSyncService};
pub use types::{
    CampaignReport, RecentCampaign, RecentCampaignsPage, RecipientPage, ZohoError,
};
