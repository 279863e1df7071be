//! Employee directory: profile lookup by contact address.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::profile::Profile;

/// Row type returned by SQLite queries for employees.
type EmployeeRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS employees (\
    contact TEXT PRIMARY KEY COLLATE NOCASE, \
    name TEXT NOT NULL, \
    role TEXT NOT NULL DEFAULT '', \
    department TEXT NOT NULL DEFAULT '', \
    location TEXT NOT NULL DEFAULT '', \
    cultural_heritage TEXT NOT NULL DEFAULT '[]', \
    age_range TEXT, \
    gender_identity TEXT, \
    updated_at TEXT NOT NULL DEFAULT (datetime('now')))";

/// Directory errors.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// SQLite failure.
    #[error("directory database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Heritage column could not be (de)serialized.
    #[error("directory serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A profile without a contact address cannot be stored.
    #[error("profile '{0}' has no contact address")]
    MissingContact(String),
}

/// Profile lookup by contact address.
#[async_trait]
pub trait Directory: Send + Sync {
    /// The stored profile for `contact`, if any.
    async fn profile_by_contact(&self, contact: &str) -> Result<Option<Profile>, DirectoryError>;
}

/// SQLite-backed directory over an `employees` table.
#[derive(Debug, Clone)]
pub struct SqliteDirectory {
    db: SqlitePool,
}

impl SqliteDirectory {
    /// Wrap a pool, creating the table if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Database`] if the schema cannot be created.
    pub async fn new(db: SqlitePool) -> Result<Self, DirectoryError> {
        sqlx::query(SCHEMA).execute(&db).await?;
        Ok(Self { db })
    }

    /// Insert or replace a profile keyed by its contact address.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::MissingContact`] for profiles without a
    /// contact, or a database error.
    pub async fn upsert(&self, profile: &Profile) -> Result<(), DirectoryError> {
        let contact = profile
            .contact
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| DirectoryError::MissingContact(profile.name.clone()))?;
        let heritage = serde_json::to_string(&profile.cultural_heritage)?;

        sqlx::query(
            "INSERT INTO employees \
             (contact, name, role, department, location, cultural_heritage, age_range, gender_identity) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(contact) DO UPDATE SET \
             name = excluded.name, role = excluded.role, department = excluded.department, \
             location = excluded.location, cultural_heritage = excluded.cultural_heritage, \
             age_range = excluded.age_range, gender_identity = excluded.gender_identity, \
             updated_at = datetime('now')",
        )
        .bind(contact)
        .bind(&profile.name)
        .bind(&profile.role)
        .bind(&profile.department)
        .bind(&profile.location)
        .bind(&heritage)
        .bind(&profile.age_range)
        .bind(&profile.gender_identity)
        .execute(&self.db)
        .await?;

        debug!(contact, "directory profile upserted");
        Ok(())
    }

    /// Upsert many profiles. Returns how many were stored.
    ///
    /// # Errors
    ///
    /// Stops at the first failing profile.
    pub async fn import(&self, profiles: &[Profile]) -> Result<usize, DirectoryError> {
        for profile in profiles {
            self.upsert(profile).await?;
        }
        info!(count = profiles.len(), "directory import complete");
        Ok(profiles.len())
    }
}

#[async_trait]
impl Directory for SqliteDirectory {
    async fn profile_by_contact(&self, contact: &str) -> Result<Option<Profile>, DirectoryError> {
        let row: Option<EmployeeRow> = sqlx::query_as(
            "SELECT contact, name, role, department, location, cultural_heritage, \
                    age_range, gender_identity \
             FROM employees WHERE contact = ?1",
        )
        .bind(contact.trim())
        .fetch_optional(&self.db)
        .await?;

        let Some((contact, name, role, department, location, heritage, age_range, gender)) = row
        else {
            return Ok(None);
        };
        Ok(Some(Profile {
            name,
            contact: Some(contact),
            role,
            department,
            location,
            cultural_heritage: serde_json::from_str(&heritage)?,
            age_range,
            gender_identity: gender,
        }))
    }
}
