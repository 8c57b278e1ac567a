pub mod schema;

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let db_url = format!("sqlite:{}?mode=rwc", path);

        tracing::info!("Opening database at: {}", path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        init_schema(&pool).await?;

        tracing::info!("Database initialized successfully");

        Ok(Self { pool })
    }

    /// In-memory database for tests. A single connection keeps every query
    /// on the same SQLite memory instance.
    #[cfg(test)]
    pub(crate) async fn new_in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        init_schema(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Store the OAuth client configuration in the single settings record.
    /// Tokens and the active flag are left untouched.
    pub async fn save_client_config(
        &self,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO zoho_settings (id, client_id, client_secret, redirect_uri)
             VALUES (1, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                client_id = excluded.client_id,
                client_secret = excluded.client_secret,
                redirect_uri = excluded.redirect_uri",
        )
        .bind(client_id)
        .bind(client_secret)
        .bind(redirect_uri)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS zoho_settings (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            client_id TEXT NOT NULL DEFAULT '',
            client_secret TEXT NOT NULL DEFAULT '',
            redirect_uri TEXT NOT NULL DEFAULT '',
            access_token TEXT,
            refresh_token TEXT,
            api_domain TEXT,
            token_expiry INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS campaigns (
            id TEXT PRIMARY KEY,
            zoho_campaign_id TEXT NOT NULL UNIQUE,
            zoho_campaign_key TEXT,
            campaign_name TEXT NOT NULL,
            subject TEXT,
            from_email TEXT,
            reply_to TEXT,
            status TEXT,
            campaign_type TEXT,
            sent_time INTEGER,
            preview_url TEXT,
            last_synced INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS campaign_analytics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            campaign_id TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
            metric TEXT NOT NULL,
            value TEXT NOT NULL,
            percentage REAL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS contacts (
            id TEXT PRIMARY KEY,
            zoho_contact_id TEXT UNIQUE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            company_name TEXT,
            designation TEXT,
            zoho_status TEXT,
            last_synced INTEGER
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS campaign_recipients (
            id TEXT PRIMARY KEY,
            campaign_id TEXT NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
            email TEXT NOT NULL,
            action_type TEXT NOT NULL,
            contact_id TEXT REFERENCES contacts(id),
            zoho_contact_id TEXT,
            sent_time INTEGER,
            action_date INTEGER,
            click_count INTEGER,
            clicked_links TEXT,
            click_reports TEXT,
            url_clicks TEXT,
            open_reports TEXT,
            country TEXT,
            city TEXT,
            state TEXT,
            is_rtbf INTEGER NOT NULL DEFAULT 0,
            contact_status TEXT,
            full_name TEXT,
            company_name TEXT,
            job_title TEXT,
            UNIQUE (campaign_id, email, action_type)
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}
