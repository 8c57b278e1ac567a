//! Zoho Campaigns API client with one-shot re-authentication

use reqwest::{Client, Method, StatusCode};
use serde_json::{Map, Value};

use super::types::{
    count_field, find_recipient_list, ApiResponse, CampaignReport, RecentCampaign,
    RecentCampaignsPage, RecipientPage, ZohoError,
};
use crate::sync::oauth::TokenManager;

const ZOHO_CAMPAIGNS_API_BASE: &str = "https://campaigns.zoho.in/api/v1.1";

pub struct ZohoClient {
    http: Client,
    tokens: TokenManager,
    api_base: String,
}

impl ZohoClient {
    pub fn new(tokens: TokenManager) -> Self {
        Self {
            http: Client::new(),
            tokens,
            api_base: ZOHO_CAMPAIGNS_API_BASE.to_string(),
        }
    }

    /// Override the API base URL (tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Issue an authenticated call and parse the Zoho response envelope.
    ///
    /// An HTTP 401 triggers exactly one token refresh and retry; any further
    /// failure propagates. An error envelope carrying a "no contacts"
    /// message is returned as [`ApiResponse::NoData`].
    pub async fn call(
        &self,
        endpoint: &str,
        method: Method,
        params: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ApiResponse, ZohoError> {
        let token = self.tokens.get_valid_token().await?;
        let mut response = self
            .send(endpoint, method.clone(), params, body, &token)
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::info!(endpoint, "Zoho rejected the access token, retrying once");
            let token = self.tokens.refresh_access_token().await?;
            response = self.send(endpoint, method, params, body, &token).await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(ZohoError::Status(status.as_u16()));
        }

        let value: Value = response.json().await?;

        match value.get("status").and_then(Value::as_str) {
            Some("success") => Ok(ApiResponse::Success(value)),
            _ => {
                let message = value
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                if message.to_lowercase().contains("no contacts") {
                    tracing::debug!(endpoint, %message, "treating response as an empty result");
                    Ok(ApiResponse::NoData(value))
                } else {
                    Err(ZohoError::Api(message))
                }
            }
        }
    }

    async fn send(
        &self,
        endpoint: &str,
        method: Method,
        params: &[(&str, String)],
        body: Option<&Value>,
        token: &str,
    ) -> Result<reqwest::Response, ZohoError> {
        let url = format!("{}/{}", self.api_base, endpoint);
        let mut request = self
            .http
            .request(method, &url)
            .header("Authorization", format!("Zoho-oauthtoken {}", token))
            .query(params);

        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }

    /// Fetch the most recent campaigns, newest first.
    pub async fn list_recent_campaigns(
        &self,
        limit: u32,
    ) -> Result<RecentCampaignsPage, ZohoError> {
        let params = [
            ("resfmt", "JSON".to_string()),
            ("range", limit.to_string()),
        ];
        let value = self
            .call("recentcampaigns", Method::GET, &params, None)
            .await?
            .into_value();

        let campaigns: Vec<RecentCampaign> = value
            .get("recent_campaigns")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();

        let total_count = count_field(value.get("total_record_count"));
        let fetched_count = campaigns.len();

        tracing::debug!(fetched = fetched_count, total = total_count, "fetched recent campaigns");

        Ok(RecentCampaignsPage {
            campaigns,
            total_count,
            fetched_count,
        })
    }

    /// Fetch the full report for one campaign. Missing sections come back
    /// as empty maps.
    pub async fn get_campaign_report(
        &self,
        campaign_key: &str,
    ) -> Result<CampaignReport, ZohoError> {
        let params = [
            ("resfmt", "JSON".to_string()),
            ("campaignkey", campaign_key.to_string()),
        ];
        let value = self
            .call("campaignreports", Method::GET, &params, None)
            .await?
            .into_value();

        Ok(CampaignReport {
            details: first_section(&value, "campaign-details"),
            reports: first_section(&value, "campaign-reports"),
            reach: first_section(&value, "campaign-reach"),
            // Zoho misspells this key; read it as-is.
            by_location: value
                .get("campaign-by-loaction")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        })
    }

    /// Fetch one page of recipient rows for a single action category
    /// (`openedcontacts`, `clickedcontacts`, `senthardbounce`, ...).
    pub async fn get_campaign_recipients(
        &self,
        campaign_key: &str,
        action: &str,
        from_index: u32,
        range: u32,
    ) -> Result<RecipientPage, ZohoError> {
        let params = [
            ("resfmt", "JSON".to_string()),
            ("campaignkey", campaign_key.to_string()),
            ("action", action.to_string()),
            ("fromindex", from_index.to_string()),
            ("range", range.to_string()),
        ];

        let response = self
            .call("getcampaignrecipientsdata", Method::POST, &params, None)
            .await?;

        let recipients = match response {
            ApiResponse::NoData(_) => Vec::new(),
            ApiResponse::Success(value) => match value.as_object().and_then(find_recipient_list) {
                Some((key, rows)) => {
                    tracing::debug!(action, key = %key, rows = rows.len(), "found recipient list");
                    rows
                }
                None => {
                    tracing::warn!(action, "no recipient list found in Zoho response");
                    Vec::new()
                }
            },
        };

        let fetched_count = recipients.len();
        Ok(RecipientPage {
            recipients,
            action: action.to_string(),
            fetched_count,
        })
    }
}

fn first_section(value: &Value, key: &str) -> Map<String, Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .and_then(|rows| rows.first())
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}
