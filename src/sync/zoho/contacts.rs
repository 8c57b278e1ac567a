//! Contact resolution against the local records database

use std::sync::Arc;

use serde_json::{Map, Value};
use uuid::Uuid;

use super::types::{str_field, ZohoError};
use crate::db::Database;

/// Finds or creates a local Contact for an upstream recipient record.
///
/// Resolution order: Zoho contact id, then email, then create-new. Every
/// path applies a merge-update that refreshes the Zoho status and sync
/// stamp but never overwrites a non-empty company or designation.
pub struct ContactResolver {
    db: Arc<Database>,
}

impl ContactResolver {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Returns the local contact id, or `None` when the record carries no
    /// email address.
    pub async fn find_or_create(
        &self,
        record: &Map<String, Value>,
    ) -> Result<Option<String>, ZohoError> {
        let Some(email) = str_field(record, "contactemailaddress") else {
            return Ok(None);
        };

        if let Some(zoho_id) = str_field(record, "contactid") {
            let existing: Option<(String,)> =
                sqlx::query_as("SELECT id FROM contacts WHERE zoho_contact_id = ?")
                    .bind(zoho_id)
                    .fetch_optional(self.db.pool())
                    .await?;
            if let Some((id,)) = existing {
                self.merge_update(&id, record).await?;
                return Ok(Some(id));
            }
        }

        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM contacts WHERE email = ?")
            .bind(email)
            .fetch_optional(self.db.pool())
            .await?;
        if let Some((id,)) = existing {
            self.merge_update(&id, record).await?;
            return Ok(Some(id));
        }

        let id = Uuid::new_v4().to_string();
        let first_name = str_field(record, "contactfn").unwrap_or("Unknown");
        let last_name = str_field(record, "contactln").unwrap_or("");
        let phone = str_field(record, "phone").or_else(|| str_field(record, "mobile"));

        sqlx::query(
            "INSERT INTO contacts (id, first_name, last_name, email, phone)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(phone)
        .execute(self.db.pool())
        .await?;

        self.merge_update(&id, record).await?;
        tracing::debug!(email, "created new contact");

        Ok(Some(id))
    }

    /// Always refresh status and sync stamp; keep the stored Zoho contact id
    /// when the record has none; only backfill empty company/designation.
    async fn merge_update(
        &self,
        id: &str,
        record: &Map<String, Value>,
    ) -> Result<(), ZohoError> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            "UPDATE contacts SET
                zoho_contact_id = COALESCE(?, zoho_contact_id),
                zoho_status = ?,
                last_synced = ?,
                company_name = CASE
                    WHEN company_name IS NULL OR company_name = '' THEN ?
                    ELSE company_name END,
                designation = CASE
                    WHEN designation IS NULL OR designation = '' THEN ?
                    ELSE designation END
             WHERE id = ?",
        )
        .bind(str_field(record, "contactid"))
        .bind(str_field(record, "contactstatus"))
        .bind(now)
        .bind(str_field(record, "companyname"))
        .bind(str_field(record, "jobtitle"))
        .bind(id)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }
}
