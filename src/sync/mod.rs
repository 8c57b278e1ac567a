//! Data synchronization module

pub mod oauth;
pub mod zoho;

// Re-export commonly used types
pub use oauth::TokenManager;
pub use zoho::{
    CampaignReport, CampaignSyncError, ContactResolver, RecentCampaign, RecentCampaignsPage,
    RecipientPage, RecipientStats, SyncOutcome, ZohoClient, ZohoError, ZohoSyncService,
};
