//! Zoho Campaigns data types and error definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZohoError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("Zoho API error: {0}")]
    Api(String),

    #[error("Zoho API request failed with HTTP {0}")]
    Status(u16),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A parsed Zoho response envelope.
///
/// Zoho signals "there are no contacts" through an error envelope; callers
/// treat that as an empty result rather than a failure, so it gets its own
/// success variant.
#[derive(Debug, Clone)]
pub enum ApiResponse {
    Success(Value),
    NoData(Value),
}

impl ApiResponse {
    pub fn into_value(self) -> Value {
        match self {
            ApiResponse::Success(v) | ApiResponse::NoData(v) => v,
        }
    }
}

/// One campaign as returned by the `recentcampaigns` endpoint. Every field
/// is optional; Zoho omits whatever does not apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecentCampaign {
    #[serde(rename = "campaignId")]
    pub campaign_id: Option<String>,
    pub campaign_key: Option<String>,
    pub campaign_name: Option<String>,
    pub campaign_status: Option<String>,
    pub subject: Option<String>,
    pub from_email: Option<String>,
    pub reply_to: Option<String>,
    #[serde(rename = "campaigntype")]
    pub campaign_type: Option<String>,
    /// Millisecond epoch, usually encoded as a string.
    pub sent_time: Option<Value>,
    pub campaign_preview: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentCampaignsPage {
    pub campaigns: Vec<RecentCampaign>,
    pub total_count: u64,
    pub fetched_count: usize,
}

/// The four report sections of the `campaignreports` endpoint. Sections
/// absent from the payload default to empty maps.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CampaignReport {
    pub details: Map<String, Value>,
    pub reports: Map<String, Value>,
    pub reach: Map<String, Value>,
    pub by_location: Map<String, Value>,
}

/// One page of recipient rows for a single action category.
#[derive(Debug, Clone, Serialize)]
pub struct RecipientPage {
    pub recipients: Vec<Map<String, Value>>,
    pub action: String,
    pub fetched_count: usize,
}

/// Locate the recipient list inside a `getcampaignrecipientsdata` response
/// body. The list appears under `list_of_details` or `recipients`, or, for
/// some action categories, under an arbitrary key; in that case the first
/// list-valued field wins. `urlclicks` is a click-detail array, never the
/// recipient list, and is excluded from the search.
pub fn find_recipient_list(body: &Map<String, Value>) -> Option<(String, Vec<Map<String, Value>>)> {
    fn rows_of(value: &Value) -> Option<Vec<Map<String, Value>>> {
        value
            .as_array()
            .map(|items| items.iter().filter_map(|i| i.as_object().cloned()).collect())
    }

    for key in ["list_of_details", "recipients"] {
        if let Some(rows) = body.get(key).and_then(rows_of) {
            return Some((key.to_string(), rows));
        }
    }

    // Map iteration follows payload order (serde_json preserve_order).
    body.iter()
        .filter(|(key, _)| key.as_str() != "urlclicks")
        .find_map(|(key, value)| rows_of(value).map(|rows| (key.clone(), rows)))
}

/// A report sub-field that sometimes arrives as a textual rendering of a
/// map instead of structured JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportBlob {
    Structured(Value),
    Raw(String),
}

impl ReportBlob {
    /// Canonical storage form: structured blobs as JSON text, raw blobs
    /// as received.
    pub fn into_stored(self) -> String {
        match self {
            ReportBlob::Structured(v) => v.to_string(),
            ReportBlob::Raw(s) => s,
        }
    }
}

/// Decode a report blob, falling back to the original text when it is not
/// valid JSON.
pub fn decode_report_blob(raw: &Value) -> Option<ReportBlob> {
    match raw {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => {
                Some(ReportBlob::Structured(parsed))
            }
            _ => Some(ReportBlob::Raw(s.clone())),
        },
        other => Some(ReportBlob::Structured(other.clone())),
    }
}

/// Read a count that Zoho encodes either as a number or a numeric string.
pub fn count_field(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Non-empty string field of a dynamic record.
pub fn str_field<'a>(record: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    record
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
