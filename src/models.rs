use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider::Provider;

/// Local user record. Exactly one provider id is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub github_id: Option<String>,
    pub facebook_id: Option<String>,
    pub google_id: Option<String>,
    pub display_name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, sqlx::sqlite::SqliteRow> for User {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;

        let created_at_str: String = row.try_get("created_at")?;
        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "created_at".to_string(),
                source: Box::new(e),
            })?
            .with_timezone(&Utc);

        Ok(User {
            id: row.try_get("id")?,
            github_id: row.try_get("github_id")?,
            facebook_id: row.try_get("facebook_id")?,
            google_id: row.try_get("google_id")?,
            display_name: row.try_get("display_name")?,
            email: row.try_get("email")?,
            created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub provider: Provider,
    pub external_id: String,
    pub display_name: String,
    pub email: Option<String>,
}

/// Normalised result of a provider callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub provider: Provider,
    pub external_id: String,
    pub display_name: String,
    /// Addresses in the order the provider supplied them.
    pub emails: Vec<String>,
}

impl ProviderIdentity {
    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }

    pub fn to_new_user(&self) -> NewUser {
        NewUser {
            provider: self.provider,
            external_id: self.external_id.clone(),
            display_name: self.display_name.clone(),
            email: self.primary_email().map(str::to_string),
        }
    }
}
