use std::sync::Arc;

use tracing::warn;

use assess_core::model::Profile;
use storage::repository::KeyValueRepository;

use crate::error::PersistenceError;

/// Client-store key holding the last submitted start-form profile.
pub const PROFILE_KEY: &str = "last_profile";

/// Remembers the respondent profile so the start form can be prefilled.
#[derive(Clone)]
pub struct ProfileMemory {
    store: Arc<dyn KeyValueRepository>,
}

impl ProfileMemory {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueRepository>) -> Self {
        Self { store }
    }

    /// # Errors
    ///
    /// Returns `PersistenceError` if encoding or the write fails.
    pub async fn remember(&self, profile: &Profile) -> Result<(), PersistenceError> {
        let encoded = serde_json::to_string(profile)?;
        self.store.put(PROFILE_KEY, &encoded).await?;
        Ok(())
    }

    /// Unreadable entries are treated as absent.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the store cannot be read.
    pub async fn recall(&self) -> Result<Option<Profile>, PersistenceError> {
        let Some(raw) = self.store.get(PROFILE_KEY).await? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(profile) => Ok(Some(profile)),
            Err(err) => {
                warn!(error = %err, "ignoring unreadable remembered profile");
                Ok(None)
            }
        }
    }

    /// # Errors
    ///
    /// Returns `PersistenceError` if the store cannot be written.
    pub async fn forget(&self) -> Result<(), PersistenceError> {
        self.store.remove(PROFILE_KEY).await?;
        Ok(())
    }
}
