//! Credential store
//!
//! Username -> {password, level} map loaded once at startup. Every successful
//! registration rewrites the whole file; there is no incremental append.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;
use crate::types::AccessLevel;

/// Stored credentials of one registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Level", default)]
    pub level: AccessLevel,
}

/// In-memory credential map backed by a snapshot file
#[derive(Debug)]
pub struct CredentialStore {
    records: HashMap<String, CredentialRecord>,
    path: PathBuf,
    max_records: usize,
}

impl CredentialStore {
    /// Create an empty store that persists to `path`
    pub fn new(path: impl Into<PathBuf>, max_records: usize) -> Self {
        Self {
            records: HashMap::new(),
            path: path.into(),
            max_records,
        }
    }

    /// Load the store from `path`
    ///
    /// A missing file yields an empty store. An empty or unreadable snapshot
    /// also yields an empty store, with a warning.
    pub async fn load(path: impl Into<PathBuf>, max_records: usize) -> Result<Self, AppError> {
        let mut store = Self::new(path, max_records);

        let data = match tokio::fs::read(&store.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No credential file at {}, starting empty", store.path.display());
                return Ok(store);
            }
            Err(e) => return Err(e.into()),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(store);
        }

        match serde_json::from_slice(&data) {
            Ok(records) => store.records = records,
            Err(e) => warn!(
                "Ignoring unreadable credential file {}: {}",
                store.path.display(),
                e
            ),
        }

        info!("Loaded {} registered users", store.records.len());
        Ok(store)
    }

    /// Look up a user's record
    pub fn lookup(&self, username: &str) -> Option<&CredentialRecord> {
        self.records.get(username)
    }

    /// Register a new user with the default access level
    ///
    /// On success the whole map is written back to disk before returning.
    /// If the write fails the record is dropped again, so the user is
    /// neither stored nor reported as taken.
    pub async fn insert(&mut self, username: &str, password: &str) -> Result<(), AppError> {
        if self.records.len() >= self.max_records {
            return Err(AppError::RegistrationFull);
        }
        if self.records.contains_key(username) {
            return Err(AppError::UsernameTaken(username.to_string()));
        }

        self.records.insert(
            username.to_string(),
            CredentialRecord {
                password: password.to_string(),
                level: AccessLevel::USER,
            },
        );

        if let Err(e) = self.save().await {
            warn!("Failed to save credentials to {}: {}", self.path.display(), e);
            self.records.remove(username);
            return Err(e);
        }
        Ok(())
    }

    /// Number of registered users
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialize the full map and overwrite the snapshot file
    async fn save(&self) -> Result<(), AppError> {
        let data = serde_json::to_string_pretty(&self.records)?;
        tokio::fs::write(&self.path, data).await?;
        Ok(())
    }
}
