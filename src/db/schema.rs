use serde::{Deserialize, Serialize};

/// The single credential-state record for the Zoho integration.
///
/// Created by `configure` + `connect`, mutated on every token refresh and
/// never deleted, only deactivated via `is_active`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ZohoSettings {
    pub id: i64,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub api_domain: Option<String>,
    pub token_expiry: i64,
    pub is_active: i64,
}

/// Local campaign record, keyed by the Zoho campaign id.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Campaign {
    pub id: String,
    pub zoho_campaign_id: String,
    pub zoho_campaign_key: Option<String>,
    pub campaign_name: String,
    pub subject: Option<String>,
    pub from_email: Option<String>,
    pub reply_to: Option<String>,
    pub status: Option<String>,
    pub campaign_type: Option<String>,
    pub sent_time: Option<i64>,
    pub preview_url: Option<String>,
    pub last_synced: i64,
}

/// One analytics metric row attached to a campaign. The full set is
/// replaced on every sync pass.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnalyticsRow {
    pub id: i64,
    pub campaign_id: String,
    pub metric: String,
    pub value: String,
    pub percentage: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    pub id: String,
    pub zoho_contact_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub designation: Option<String>,
    pub zoho_status: Option<String>,
    pub last_synced: Option<i64>,
}

/// One (campaign, email, action-type) engagement fact.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CampaignRecipient {
    pub id: String,
    pub campaign_id: String,
    pub email: String,
    pub action_type: String,
    pub contact_id: Option<String>,
    pub zoho_contact_id: Option<String>,
    pub sent_time: Option<i64>,
    pub action_date: Option<i64>,
    pub click_count: Option<i64>,
    pub clicked_links: Option<String>,
    pub click_reports: Option<String>,
    pub url_clicks: Option<String>,
    pub open_reports: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub is_rtbf: i64,
    pub contact_status: Option<String>,
    pub full_name: Option<String>,
    pub company_name: Option<String>,
    pub job_title: Option<String>,
}
