//! Zoho OAuth 2.0 token lifecycle management

use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;

use crate::db::schema::ZohoSettings;
use crate::db::Database;
use crate::sync::zoho::ZohoError;

const ZOHO_ACCOUNTS_URL: &str = "https://accounts.zoho.in";
const DEFAULT_API_DOMAIN: &str = "https://www.zohoapis.in";
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Refresh when the token is within 5 minutes of its expiry.
const REFRESH_BUFFER_SECS: i64 = 300;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    api_domain: Option<String>,
    expires_in: Option<i64>,
    error: Option<String>,
}

/// Manages the stored Zoho access token against an expiry-with-buffer policy.
///
/// Credential state lives in the single `zoho_settings` record of the
/// injected database; this type is the only writer of its token fields.
pub struct TokenManager {
    http: Client,
    db: Arc<Database>,
    accounts_url: String,
}

impl TokenManager {
    pub fn new(db: Arc<Database>) -> Self {
        Self {
            http: Client::new(),
            db,
            accounts_url: ZOHO_ACCOUNTS_URL.to_string(),
        }
    }

    /// Override the Zoho accounts base URL (tests).
    pub fn with_accounts_url(mut self, url: impl Into<String>) -> Self {
        self.accounts_url = url.into();
        self
    }

    /// Return a valid access token, refreshing it first when expired or
    /// about to expire.
    pub async fn get_valid_token(&self) -> Result<String, ZohoError> {
        let settings = self.load_settings().await?;

        if settings.is_active == 0 {
            return Err(ZohoError::Config(
                "Zoho integration is not active".to_string(),
            ));
        }

        let now = chrono::Utc::now().timestamp();
        if token_expired(settings.token_expiry, now) {
            return self.refresh_access_token().await;
        }

        settings.access_token.filter(|t| !t.is_empty()).ok_or_else(|| {
            ZohoError::Config("No access token stored. Re-authorize the integration.".to_string())
        })
    }

    /// Exchange the stored refresh token for a new access token and persist
    /// it. The refresh token itself is never rotated by this path.
    pub async fn refresh_access_token(&self) -> Result<String, ZohoError> {
        let settings = self.load_settings().await?;

        let refresh_token = settings
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                ZohoError::OAuth(
                    "No refresh token available. Re-authorize the integration.".to_string(),
                )
            })?;

        let data = self
            .token_request(&[
                ("client_id", settings.client_id.as_str()),
                ("client_secret", settings.client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await
            .map_err(|e| ZohoError::OAuth(format!("Failed to refresh access token: {}", e)))?;

        if let Some(error) = data.error {
            return Err(ZohoError::OAuth(format!("Token Refresh Error: {}", error)));
        }

        let access_token = data.access_token.ok_or_else(|| {
            ZohoError::OAuth("Token refresh response contained no access token".to_string())
        })?;

        let api_domain = data.api_domain.or(settings.api_domain);
        let expiry =
            chrono::Utc::now().timestamp() + data.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);

        sqlx::query(
            "UPDATE zoho_settings SET access_token = ?, api_domain = ?, token_expiry = ?
             WHERE id = 1",
        )
        .bind(&access_token)
        .bind(&api_domain)
        .bind(expiry)
        .execute(self.db.pool())
        .await?;

        tracing::info!("Refreshed Zoho access token");
        Ok(access_token)
    }

    /// Exchange an authorization code for tokens and activate the
    /// integration. This is the only path that stores a refresh token.
    pub async fn exchange_code(&self, code: &str) -> Result<(), ZohoError> {
        let settings = self.load_settings().await?;

        if settings.client_id.is_empty() || settings.redirect_uri.is_empty() {
            return Err(ZohoError::Config(
                "Configure the Client ID and Redirect URI first".to_string(),
            ));
        }

        let data = self
            .token_request(&[
                ("client_id", settings.client_id.as_str()),
                ("client_secret", settings.client_secret.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", settings.redirect_uri.as_str()),
                ("code", code),
            ])
            .await
            .map_err(|e| ZohoError::OAuth(format!("Failed to obtain access token: {}", e)))?;

        if let Some(error) = data.error {
            return Err(ZohoError::OAuth(format!("OAuth Error: {}", error)));
        }

        let access_token = data.access_token.ok_or_else(|| {
            ZohoError::OAuth("Token exchange response contained no access token".to_string())
        })?;

        let api_domain = data
            .api_domain
            .unwrap_or_else(|| DEFAULT_API_DOMAIN.to_string());
        let expiry =
            chrono::Utc::now().timestamp() + data.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);

        sqlx::query(
            "UPDATE zoho_settings SET access_token = ?, refresh_token = ?, api_domain = ?,
                token_expiry = ?, is_active = 1
             WHERE id = 1",
        )
        .bind(&access_token)
        .bind(&data.refresh_token)
        .bind(&api_domain)
        .bind(expiry)
        .execute(self.db.pool())
        .await?;

        tracing::info!("Connected to Zoho Campaigns");
        Ok(())
    }

    async fn token_request(
        &self,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, reqwest::Error> {
        let response = self
            .http
            .post(format!("{}/oauth/v2/token", self.accounts_url))
            .form(form)
            .send()
            .await?
            .error_for_status()?;

        response.json().await
    }

    async fn load_settings(&self) -> Result<ZohoSettings, ZohoError> {
        sqlx::query_as::<_, ZohoSettings>("SELECT * FROM zoho_settings WHERE id = 1")
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| {
                ZohoError::Config("Zoho Campaigns settings are not configured".to_string())
            })
    }
}

/// True when `now` has reached the refresh window before `expiry`.
pub(crate) fn token_expired(expiry: i64, now: i64) -> bool {
    now >= expiry - REFRESH_BUFFER_SECS
}
