//! Campaign reconciliation: maps Zoho campaigns, analytics and recipient
//! engagement onto the local records database.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::client::ZohoClient;
use super::contacts::ContactResolver;
use super::types::{decode_report_blob, str_field, RecentCampaign, ReportBlob, ZohoError};
use crate::db::Database;

const CAMPAIGN_FETCH_LIMIT: u32 = 50;
const RECIPIENT_PAGE_SIZE: u32 = 100;

/// Zoho renders recipient dates like "05 Dec 2025, 04:21 PM".
const RECIPIENT_DATE_FORMAT: &str = "%d %b %Y, %I:%M %p";

/// Zoho report field -> display label for the analytics rows.
const METRIC_LABELS: &[(&str, &str)] = &[
    ("emails_sent_count", "Emails Sent"),
    ("delivered_count", "Delivered"),
    ("delivered_percent", "Delivered %"),
    ("opens_count", "Opens"),
    ("open_percent", "Open Rate %"),
    ("unique_clicks_count", "Unique Clicks"),
    ("unique_clicked_percent", "Click Rate %"),
    ("bounces_count", "Bounces"),
    ("bounce_percent", "Bounce Rate %"),
    ("hardbounce_count", "Hard Bounces"),
    ("softbounce_count", "Soft Bounces"),
    ("unsub_count", "Unsubscribes"),
    ("unsubscribe_percent", "Unsubscribe Rate %"),
    ("complaints_count", "Spam Complaints"),
    ("complaints_percent", "Spam Rate %"),
    ("unopened", "Unopened"),
    ("unopened_percent", "Unopened %"),
    ("clicksperopenrate", "Click-to-Open Rate"),
    ("forwards_count", "Forwards"),
];

/// Recipient action categories: Zoho action key -> local action type.
const ACTION_TYPES: &[(&str, &str)] = &[
    ("openedcontacts", "Opened"),
    ("clickedcontacts", "Clicked"),
    ("senthardbounce", "Hard Bounced"),
    ("sentsoftbounce", "Soft Bounced"),
    ("optoutcontacts", "Unsubscribed"),
    ("spamcontacts", "Complaint"),
];

#[derive(Debug, Clone, Serialize)]
pub struct CampaignSyncError {
    pub campaign: String,
    pub error: String,
}

/// Result of one full sync pass.
#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub synced_count: usize,
    pub total_campaigns: usize,
    pub recipients_synced: usize,
    pub recipient_errors: usize,
    pub errors: Vec<CampaignSyncError>,
}

/// Aggregated recipient counters for one campaign.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RecipientStats {
    pub synced: usize,
    pub failed: usize,
    pub categories_failed: usize,
}

pub struct ZohoSyncService {
    client: ZohoClient,
    db: Arc<Database>,
    contacts: ContactResolver,
    campaign_limit: u32,
}

impl ZohoSyncService {
    pub fn new(client: ZohoClient, db: Arc<Database>) -> Self {
        Self {
            client,
            contacts: ContactResolver::new(db.clone()),
            db,
            campaign_limit: CAMPAIGN_FETCH_LIMIT,
        }
    }

    pub fn with_campaign_limit(mut self, limit: u32) -> Self {
        self.campaign_limit = limit;
        self
    }

    /// Run one full sync pass over the recent campaigns.
    ///
    /// Only the initial campaign-list fetch is fatal; a failing campaign is
    /// recorded under its display name and the pass moves on.
    pub async fn sync_all_campaigns(&self) -> Result<SyncOutcome, ZohoError> {
        let page = self.client.list_recent_campaigns(self.campaign_limit).await?;

        let mut outcome = SyncOutcome {
            success: true,
            synced_count: 0,
            total_campaigns: page.fetched_count,
            recipients_synced: 0,
            recipient_errors: 0,
            errors: Vec::new(),
        };

        for campaign in &page.campaigns {
            // Only sent campaigns are reconciled.
            if campaign.campaign_status.as_deref() != Some("Sent") {
                continue;
            }

            let display_name = campaign
                .campaign_name
                .clone()
                .unwrap_or_else(|| "Unknown Campaign".to_string());

            match self.sync_single_campaign(campaign).await {
                Ok(Some(stats)) => {
                    outcome.synced_count += 1;
                    outcome.recipients_synced += stats.synced;
                    outcome.recipient_errors += stats.failed;
                }
                Ok(None) => {
                    tracing::debug!(campaign = %display_name, "campaign has no Zoho key, skipped");
                }
                Err(e) => {
                    tracing::error!(campaign = %display_name, error = %e, "campaign sync failed");
                    outcome.errors.push(CampaignSyncError {
                        campaign: display_name,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            synced = outcome.synced_count,
            total = outcome.total_campaigns,
            recipients = outcome.recipients_synced,
            errors = outcome.errors.len(),
            "campaign sync pass finished"
        );

        Ok(outcome)
    }

    /// Upsert the local campaign record and reconcile its analytics and
    /// recipients. Returns `None` when the campaign carries no Zoho key.
    async fn sync_single_campaign(
        &self,
        campaign: &RecentCampaign,
    ) -> Result<Option<RecipientStats>, ZohoError> {
        let (Some(zoho_id), Some(campaign_key)) = (
            campaign.campaign_id.as_deref(),
            campaign.campaign_key.as_deref(),
        ) else {
            return Ok(None);
        };

        let now = chrono::Utc::now().timestamp();

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT id FROM campaigns WHERE zoho_campaign_id = ?")
                .bind(zoho_id)
                .fetch_optional(self.db.pool())
                .await?;

        let local_id = match existing {
            Some((id,)) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                let name = campaign
                    .campaign_name
                    .as_deref()
                    .unwrap_or("Unknown Campaign");
                sqlx::query(
                    "INSERT INTO campaigns (id, zoho_campaign_id, campaign_name, last_synced)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(&id)
                .bind(zoho_id)
                .bind(name)
                .bind(now)
                .execute(self.db.pool())
                .await?;
                id
            }
        };

        let sent_time = campaign.sent_time.as_ref().and_then(parse_sent_time);
        if campaign.sent_time.is_some() && sent_time.is_none() {
            tracing::warn!(
                campaign = zoho_id,
                raw = ?campaign.sent_time,
                "ignoring malformed sent_time"
            );
        }

        let preview_url = campaign
            .campaign_preview
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(normalize_preview_url);

        sqlx::query(
            "UPDATE campaigns SET
                zoho_campaign_key = ?,
                subject = ?,
                from_email = ?,
                reply_to = ?,
                status = ?,
                campaign_type = ?,
                sent_time = COALESCE(?, sent_time),
                preview_url = ?,
                last_synced = ?
             WHERE id = ?",
        )
        .bind(campaign_key)
        .bind(&campaign.subject)
        .bind(&campaign.from_email)
        .bind(&campaign.reply_to)
        .bind(&campaign.campaign_status)
        .bind(&campaign.campaign_type)
        .bind(sent_time)
        .bind(&preview_url)
        .bind(now)
        .bind(&local_id)
        .execute(self.db.pool())
        .await?;

        let stats = self.sync_campaign_analytics(&local_id, campaign_key).await?;
        Ok(Some(stats))
    }

    /// Rebuild the analytics rows from the campaign report, then reconcile
    /// the recipient categories. Analytics are replaced, never merged.
    async fn sync_campaign_analytics(
        &self,
        local_id: &str,
        campaign_key: &str,
    ) -> Result<RecipientStats, ZohoError> {
        let report = self.client.get_campaign_report(campaign_key).await?;

        if report.reports.is_empty() {
            tracing::debug!(campaign = local_id, "report has no metrics section");
            return Ok(RecipientStats::default());
        }

        sqlx::query("DELETE FROM campaign_analytics WHERE campaign_id = ?")
            .bind(local_id)
            .execute(self.db.pool())
            .await?;

        for (key, label) in METRIC_LABELS {
            let Some(value) = report.reports.get(*key) else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            let rendered = render_metric_value(value);
            let percentage = if is_rate_metric(key) {
                let parsed = rendered.parse::<f64>().ok();
                if parsed.is_none() {
                    tracing::warn!(metric = key, value = %rendered, "rate value is not numeric");
                }
                parsed
            } else {
                None
            };

            sqlx::query(
                "INSERT INTO campaign_analytics (campaign_id, metric, value, percentage)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(local_id)
            .bind(label)
            .bind(&rendered)
            .bind(percentage)
            .execute(self.db.pool())
            .await?;
        }

        self.sync_campaign_recipients(local_id, campaign_key).await
    }

    /// Fan out across the recipient action categories. Failures are
    /// isolated per category and per row; counters aggregate upward.
    async fn sync_campaign_recipients(
        &self,
        local_id: &str,
        campaign_key: &str,
    ) -> Result<RecipientStats, ZohoError> {
        let mut stats = RecipientStats::default();

        for (action_key, action_type) in ACTION_TYPES {
            let page = match self
                .client
                .get_campaign_recipients(campaign_key, action_key, 1, RECIPIENT_PAGE_SIZE)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(action = action_type, error = %e, "recipient fetch failed");
                    stats.categories_failed += 1;
                    continue;
                }
            };

            let mut synced = 0usize;
            for record in &page.recipients {
                match self.sync_recipient(local_id, record, action_type).await {
                    Ok(true) => synced += 1,
                    Ok(false) => {}
                    Err(e) => {
                        stats.failed += 1;
                        tracing::error!(action = action_type, error = %e, "recipient row failed");
                    }
                }
            }

            stats.synced += synced;
            tracing::debug!(
                action = action_type,
                rows = page.fetched_count,
                synced,
                "recipient category processed"
            );
        }

        Ok(stats)
    }

    /// Upsert one (campaign, email, action-type) engagement fact. Returns
    /// false when the record has no email and was skipped.
    async fn sync_recipient(
        &self,
        campaign_id: &str,
        record: &Map<String, Value>,
        action_type: &str,
    ) -> Result<bool, ZohoError> {
        let Some(email) = str_field(record, "contactemailaddress") else {
            tracing::warn!(action = action_type, "recipient record has no email, skipped");
            return Ok(false);
        };

        let contact_id = self.contacts.find_or_create(record).await?;
        let zoho_contact_id = str_field(record, "contactid");

        let timestamp = match str_field(record, "sentdate") {
            Some(raw) => {
                let parsed = parse_recipient_date(raw);
                if parsed.is_none() {
                    tracing::warn!(sentdate = raw, "invalid recipient date, leaving unset");
                }
                parsed
            }
            None => None,
        };

        let mut click_count: Option<i64> = None;
        let mut clicked_links: Option<String> = None;
        let mut click_reports: Option<String> = None;
        let mut url_clicks: Option<String> = None;
        let mut open_reports: Option<String> = None;

        if action_type == "Clicked" {
            click_count = record.get("clickcount").and_then(parse_click_count);
            clicked_links = str_field(record, "clickedurls")
                .map(|s| s.trim_matches(|c| c == '[' || c == ']').to_string());
            click_reports = record
                .get("clickreports")
                .and_then(decode_report_blob)
                .map(ReportBlob::into_stored);
            url_clicks = record
                .get("urlclicks")
                .and_then(decode_report_blob)
                .map(ReportBlob::into_stored);
        } else if action_type == "Opened" {
            open_reports = record
                .get("openreports")
                .and_then(decode_report_blob)
                .map(ReportBlob::into_stored);
        }

        let is_rtbf = str_field(record, "rtbf") == Some("1");

        let full_name = {
            let first = str_field(record, "contactfn").unwrap_or("");
            let last = str_field(record, "contactln").unwrap_or("");
            let joined = format!("{} {}", first, last).trim().to_string();
            (!joined.is_empty()).then_some(joined)
        };

        sqlx::query(
            "INSERT INTO campaign_recipients (
                id, campaign_id, email, action_type, contact_id, zoho_contact_id,
                sent_time, action_date, click_count, clicked_links, click_reports,
                url_clicks, open_reports, country, city, state, is_rtbf,
                contact_status, full_name, company_name, job_title)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(campaign_id, email, action_type) DO UPDATE SET
                contact_id = excluded.contact_id,
                zoho_contact_id = excluded.zoho_contact_id,
                sent_time = COALESCE(excluded.sent_time, sent_time),
                action_date = COALESCE(excluded.action_date, action_date),
                click_count = COALESCE(excluded.click_count, click_count),
                clicked_links = COALESCE(excluded.clicked_links, clicked_links),
                click_reports = COALESCE(excluded.click_reports, click_reports),
                url_clicks = COALESCE(excluded.url_clicks, url_clicks),
                open_reports = COALESCE(excluded.open_reports, open_reports),
                country = excluded.country,
                city = excluded.city,
                state = excluded.state,
                is_rtbf = excluded.is_rtbf,
                contact_status = excluded.contact_status,
                full_name = excluded.full_name,
                company_name = excluded.company_name,
                job_title = excluded.job_title",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(campaign_id)
        .bind(email)
        .bind(action_type)
        .bind(&contact_id)
        .bind(zoho_contact_id)
        .bind(timestamp)
        .bind(timestamp)
        .bind(click_count)
        .bind(&clicked_links)
        .bind(&click_reports)
        .bind(&url_clicks)
        .bind(&open_reports)
        .bind(str_field(record, "country"))
        .bind(str_field(record, "city"))
        .bind(str_field(record, "state"))
        .bind(is_rtbf)
        .bind(str_field(record, "contactstatus"))
        .bind(&full_name)
        .bind(str_field(record, "companyname"))
        .bind(str_field(record, "jobtitle"))
        .execute(self.db.pool())
        .await?;

        Ok(true)
    }

    /// Re-sync analytics and recipients for one local campaign by name.
    pub async fn sync_campaign_by_name(&self, name: &str) -> Result<RecipientStats, ZohoError> {
        let rows: Vec<(String, Option<String>)> =
            sqlx::query_as("SELECT id, zoho_campaign_key FROM campaigns WHERE campaign_name = ?")
                .bind(name)
                .fetch_all(self.db.pool())
                .await?;

        // Campaign names are not unique locally; refuse to guess.
        if rows.len() > 1 {
            return Err(ZohoError::Config(format!(
                "Campaign name {:?} is ambiguous: {} local campaigns share it",
                name,
                rows.len()
            )));
        }

        let Some((local_id, campaign_key)) = rows.into_iter().next() else {
            return Err(ZohoError::Config(format!("Campaign {:?} not found", name)));
        };

        let Some(campaign_key) = campaign_key.filter(|k| !k.is_empty()) else {
            return Err(ZohoError::Config(
                "This campaign is not linked to Zoho".to_string(),
            ));
        };

        self.sync_campaign_analytics(&local_id, &campaign_key).await
    }
}

/// Parse Zoho's millisecond-epoch sent time, encoded as string or number,
/// into epoch seconds.
fn parse_sent_time(raw: &Value) -> Option<i64> {
    let millis = match raw {
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    Some(millis / 1000)
}

/// Prepend a scheme when the preview URL arrives without one.
fn normalize_preview_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

fn parse_recipient_date(raw: &str) -> Option<i64> {
    NaiveDateTime::parse_from_str(raw.trim(), RECIPIENT_DATE_FORMAT)
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// Empty or null counts stay unset; anything else unparsable counts as one
/// click.
fn parse_click_count(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => Some(n.as_i64().unwrap_or(1)),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().parse().unwrap_or(1)),
        Value::Null => None,
        _ => Some(1),
    }
}

/// A metric whose key denotes a rate carries a percentage column.
fn is_rate_metric(key: &str) -> bool {
    key.contains("percent") || key.contains("rate")
}

fn render_metric_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{AnalyticsRow, Campaign, CampaignRecipient};
    use crate::sync::oauth::TokenManager;
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_sent_time_millisecond_epoch() {
        assert_eq!(parse_sent_time(&json!("1732800000000")), Some(1_732_800_000));
        assert_eq!(parse_sent_time(&json!(1_732_800_000_000_i64)), Some(1_732_800_000));
        assert_eq!(parse_sent_time(&json!("not-a-number")), None);
        assert_eq!(parse_sent_time(&json!(null)), None);
    }

    #[test]
    fn test_normalize_preview_url() {
        assert_eq!(normalize_preview_url("example.com/x"), "https://example.com/x");
        assert_eq!(normalize_preview_url("https://example.com/x"), "https://example.com/x");
        assert_eq!(normalize_preview_url("http://example.com/x"), "http://example.com/x");
    }

    #[test]
    fn test_parse_recipient_date_fixed_format() {
        let expected = NaiveDate::from_ymd_opt(2025, 12, 5)
            .unwrap()
            .and_hms_opt(16, 21, 0)
            .unwrap()
            .and_utc()
            .timestamp();
        assert_eq!(parse_recipient_date("05 Dec 2025, 04:21 PM"), Some(expected));
        assert_eq!(parse_recipient_date("2025-12-05 16:21"), None);
        assert_eq!(parse_recipient_date(""), None);
    }

    #[test]
    fn test_is_rate_metric() {
        assert!(is_rate_metric("delivered_percent"));
        assert!(is_rate_metric("clicksperopenrate"));
        assert!(!is_rate_metric("emails_sent_count"));
        assert!(!is_rate_metric("forwards_count"));
    }

    #[test]
    fn test_parse_click_count_fallback() {
        assert_eq!(parse_click_count(&json!("3")), Some(3));
        assert_eq!(parse_click_count(&json!(5)), Some(5));
        assert_eq!(parse_click_count(&json!("junk")), Some(1));
        assert_eq!(parse_click_count(&json!("")), None);
        assert_eq!(parse_click_count(&json!("  ")), None);
        assert_eq!(parse_click_count(&json!(null)), None);
    }

    // ---- integration: full pass against mocked Zoho + in-memory SQLite ----

    async fn service(server: &MockServer) -> (ZohoSyncService, Arc<Database>) {
        let db = Arc::new(Database::new_in_memory().await.unwrap());
        db.save_client_config("client-1", "secret-1", "https://example.com/cb")
            .await
            .unwrap();
        let expiry = chrono::Utc::now().timestamp() + 3600;
        sqlx::query(
            "UPDATE zoho_settings SET access_token = 'tok-1', refresh_token = 'refresh-1',
                token_expiry = ?, is_active = 1
             WHERE id = 1",
        )
        .bind(expiry)
        .execute(db.pool())
        .await
        .unwrap();

        let tokens = TokenManager::new(db.clone()).with_accounts_url(server.uri());
        let client = ZohoClient::new(tokens).with_api_base(format!("{}/api/v1.1", server.uri()));
        (ZohoSyncService::new(client, db.clone()), db)
    }

    async fn mount_campaign_list(server: &MockServer, campaigns: Value) {
        Mock::given(method("GET"))
            .and(path("/api/v1.1/recentcampaigns"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "total_record_count": "2",
                "recent_campaigns": campaigns
            })))
            .mount(server)
            .await;
    }

    async fn mount_report(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/v1.1/campaignreports"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "campaign-reports": [{
                    "emails_sent_count": "120",
                    "delivered_percent": "97.5",
                    "open_percent": "41.5"
                }]
            })))
            .mount(server)
            .await;
    }

    async fn mount_recipients(server: &MockServer, recipient: Value) {
        Mock::given(method("POST"))
            .and(path("/api/v1.1/getcampaignrecipientsdata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "list_of_details": [recipient]
            })))
            .mount(server)
            .await;
    }

    fn sent_campaign() -> Value {
        json!({
            "campaignId": "101",
            "campaign_key": "key-101",
            "campaign_name": "Product Launch",
            "campaign_status": "Sent",
            "subject": "Big news",
            "from_email": "news@example.com",
            "sent_time": "1732800000000",
            "campaign_preview": "example.com/preview/101"
        })
    }

    fn opened_recipient() -> Value {
        json!({
            "contactemailaddress": "jane@example.com",
            "contactid": "z-1",
            "contactfn": "Jane",
            "contactln": "Doe",
            "sentdate": "05 Dec 2025, 04:21 PM",
            "country": "India",
            "city": "Pune",
            "contactstatus": "Active",
            "companyname": "Acme"
        })
    }

    #[tokio::test]
    async fn test_full_pass_is_idempotent() {
        let server = MockServer::start().await;
        mount_campaign_list(
            &server,
            json!([
                sent_campaign(),
                {"campaignId": "102", "campaign_key": "key-102",
                 "campaign_name": "Draft one", "campaign_status": "Draft"}
            ]),
        )
        .await;
        mount_report(&server).await;
        mount_recipients(&server, opened_recipient()).await;

        let (service, db) = service(&server).await;

        let first = service.sync_all_campaigns().await.unwrap();
        assert!(first.success);
        assert_eq!(first.synced_count, 1);
        assert_eq!(first.total_campaigns, 2);
        assert!(first.errors.is_empty());
        // One recipient row per action category.
        assert_eq!(first.recipients_synced, 6);

        let second = service.sync_all_campaigns().await.unwrap();
        assert_eq!(second.synced_count, 1);

        let (campaigns,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM campaigns")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(campaigns, 1);

        let (contacts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contacts")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(contacts, 1);

        let (recipients,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM campaign_recipients")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(recipients, 6);

        // Analytics are replaced each pass, never appended.
        let (analytics,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM campaign_analytics")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(analytics, 3);
    }

    #[tokio::test]
    async fn test_campaign_fields_are_mapped() {
        let server = MockServer::start().await;
        mount_campaign_list(&server, json!([sent_campaign()])).await;
        mount_report(&server).await;
        mount_recipients(&server, opened_recipient()).await;

        let (service, db) = service(&server).await;
        service.sync_all_campaigns().await.unwrap();

        let campaign: Campaign =
            sqlx::query_as("SELECT * FROM campaigns WHERE zoho_campaign_id = '101'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(campaign.zoho_campaign_key.as_deref(), Some("key-101"));
        assert_eq!(campaign.campaign_name, "Product Launch");
        assert_eq!(campaign.sent_time, Some(1_732_800_000));
        assert_eq!(
            campaign.preview_url.as_deref(),
            Some("https://example.com/preview/101")
        );
        assert_eq!(campaign.status.as_deref(), Some("Sent"));

        let rate: AnalyticsRow =
            sqlx::query_as("SELECT * FROM campaign_analytics WHERE metric = 'Open Rate %'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(rate.campaign_id, campaign.id);
        assert_eq!(rate.value, "41.5");
        assert_eq!(rate.percentage, Some(41.5));

        let count: AnalyticsRow =
            sqlx::query_as("SELECT * FROM campaign_analytics WHERE metric = 'Emails Sent'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(count.value, "120");
        assert_eq!(count.percentage, None);
    }

    #[tokio::test]
    async fn test_malformed_sent_time_leaves_field_unset() {
        let server = MockServer::start().await;
        let mut campaign = sent_campaign();
        campaign["sent_time"] = json!("garbage");
        mount_campaign_list(&server, json!([campaign])).await;
        mount_report(&server).await;
        mount_recipients(&server, opened_recipient()).await;

        let (service, db) = service(&server).await;
        let outcome = service.sync_all_campaigns().await.unwrap();
        assert_eq!(outcome.synced_count, 1);

        let (sent_time,): (Option<i64>,) =
            sqlx::query_as("SELECT sent_time FROM campaigns WHERE zoho_campaign_id = '101'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(sent_time, None);
    }

    #[tokio::test]
    async fn test_malformed_recipient_date_still_saves_row() {
        let server = MockServer::start().await;
        mount_campaign_list(&server, json!([sent_campaign()])).await;
        mount_report(&server).await;
        let mut recipient = opened_recipient();
        recipient["sentdate"] = json!("sometime last week");
        mount_recipients(&server, recipient).await;

        let (service, db) = service(&server).await;
        let outcome = service.sync_all_campaigns().await.unwrap();
        assert_eq!(outcome.recipient_errors, 0);

        let (sent_time, action_date): (Option<i64>, Option<i64>) = sqlx::query_as(
            "SELECT sent_time, action_date FROM campaign_recipients
             WHERE email = 'jane@example.com' AND action_type = 'Opened'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(sent_time, None);
        assert_eq!(action_date, None);
    }

    #[tokio::test]
    async fn test_clicked_recipient_payload_is_stored() {
        let server = MockServer::start().await;
        mount_campaign_list(&server, json!([sent_campaign()])).await;
        mount_report(&server).await;

        // Click-specific response for the clicked category, generic for
        // the rest. More specific mock mounted first wins.
        Mock::given(method("POST"))
            .and(path("/api/v1.1/getcampaignrecipientsdata"))
            .and(query_param("action", "clickedcontacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "list_of_details": [{
                    "contactemailaddress": "jane@example.com",
                    "contactid": "z-1",
                    "clickcount": "3",
                    "clickedurls": "[https://example.com/a, https://example.com/b]",
                    "clickreports": "{\"https://example.com/a\": 2}"
                }]
            })))
            .mount(&server)
            .await;
        mount_recipients(&server, opened_recipient()).await;

        let (service, db) = service(&server).await;
        service.sync_all_campaigns().await.unwrap();

        let row: CampaignRecipient =
            sqlx::query_as("SELECT * FROM campaign_recipients WHERE action_type = 'Clicked'")
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(row.email, "jane@example.com");
        assert_eq!(row.click_count, Some(3));
        assert_eq!(
            row.clicked_links.as_deref(),
            Some("https://example.com/a, https://example.com/b")
        );
        assert_eq!(
            row.click_reports.as_deref(),
            Some("{\"https://example.com/a\":2}")
        );
        assert!(row.open_reports.is_none());
    }

    #[tokio::test]
    async fn test_failing_campaign_is_isolated() {
        let server = MockServer::start().await;
        let mut other = sent_campaign();
        other["campaignId"] = json!("102");
        other["campaign_key"] = json!("key-bad");
        other["campaign_name"] = json!("Broken Campaign");
        mount_campaign_list(&server, json!([sent_campaign(), other])).await;

        Mock::given(method("GET"))
            .and(path("/api/v1.1/campaignreports"))
            .and(query_param("campaignkey", "key-bad"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_report(&server).await;
        mount_recipients(&server, opened_recipient()).await;

        let (service, _db) = service(&server).await;
        let outcome = service.sync_all_campaigns().await.unwrap();

        assert_eq!(outcome.synced_count, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].campaign, "Broken Campaign");
        assert!(outcome.errors[0].error.contains("500"));
    }

    #[tokio::test]
    async fn test_failing_category_is_isolated() {
        let server = MockServer::start().await;
        mount_campaign_list(&server, json!([sent_campaign()])).await;
        mount_report(&server).await;

        // Hard-bounce fetch fails; the other five categories still sync.
        Mock::given(method("POST"))
            .and(path("/api/v1.1/getcampaignrecipientsdata"))
            .and(query_param("action", "senthardbounce"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_recipients(&server, opened_recipient()).await;

        let (service, db) = service(&server).await;
        let outcome = service.sync_all_campaigns().await.unwrap();

        assert_eq!(outcome.synced_count, 1);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.recipients_synced, 5);

        let stats = service.sync_campaign_by_name("Product Launch").await.unwrap();
        assert_eq!(stats.categories_failed, 1);
        assert_eq!(stats.synced, 5);
        assert_eq!(stats.failed, 0);

        let (bounced,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM campaign_recipients WHERE action_type = 'Hard Bounced'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(bounced, 0);
    }

    #[tokio::test]
    async fn test_fatal_list_failure_aborts_pass() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1.1/recentcampaigns"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error",
                "message": "Internal error occurred"
            })))
            .mount(&server)
            .await;

        let (service, _db) = service(&server).await;
        let err = service.sync_all_campaigns().await.unwrap_err();
        assert!(matches!(err, ZohoError::Api(_)));
    }

    #[tokio::test]
    async fn test_sync_campaign_by_name_requires_link() {
        let server = MockServer::start().await;
        let (service, db) = service(&server).await;

        sqlx::query(
            "INSERT INTO campaigns (id, zoho_campaign_id, campaign_name, last_synced)
             VALUES ('c1', 'z1', 'Unlinked', 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = service.sync_campaign_by_name("Unlinked").await.unwrap_err();
        match err {
            ZohoError::Config(msg) => assert!(msg.contains("not linked")),
            other => panic!("expected Config error, got {:?}", other),
        }

        let err = service.sync_campaign_by_name("Missing").await.unwrap_err();
        assert!(matches!(err, ZohoError::Config(_)));
    }

    #[tokio::test]
    async fn test_sync_campaign_by_name_rejects_ambiguous_names() {
        let server = MockServer::start().await;
        let (service, db) = service(&server).await;

        sqlx::query(
            "INSERT INTO campaigns (id, zoho_campaign_id, campaign_name, last_synced)
             VALUES ('c1', 'z1', 'Launch', 0), ('c2', 'z2', 'Launch', 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = service.sync_campaign_by_name("Launch").await.unwrap_err();
        match err {
            ZohoError::Config(msg) => assert!(msg.contains("ambiguous")),
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sync_campaign_by_name_rebuilds_analytics() {
        let server = MockServer::start().await;
        mount_campaign_list(&server, json!([sent_campaign()])).await;
        mount_report(&server).await;
        mount_recipients(&server, opened_recipient()).await;

        let (service, db) = service(&server).await;
        service.sync_all_campaigns().await.unwrap();

        let stats = service.sync_campaign_by_name("Product Launch").await.unwrap();
        assert_eq!(stats.synced, 6);
        assert_eq!(stats.failed, 0);

        let (analytics,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM campaign_analytics")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(analytics, 3);
    }
}
