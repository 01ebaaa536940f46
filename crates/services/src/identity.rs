use std::sync::Arc;

use tracing::{info, warn};

use assess_core::model::ClientId;
use storage::repository::KeyValueRepository;

use crate::error::PersistenceError;

/// Client-store key holding the identifier.
pub const CLIENT_ID_KEY: &str = "client_uuid";

/// Get-or-create access to the durable client identifier.
#[derive(Clone)]
pub struct IdentityProvider {
    store: Arc<dyn KeyValueRepository>,
}

impl IdentityProvider {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueRepository>) -> Self {
        Self { store }
    }

    /// Returns the stored identifier, generating and storing a new v4 UUID
    /// when none exists. Stable across calls once stored.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the client store cannot be read or written.
    pub async fn client_id(&self) -> Result<ClientId, PersistenceError> {
        if let Some(raw) = self.store.get(CLIENT_ID_KEY).await? {
            match raw.parse::<ClientId>() {
                Ok(id) => return Ok(id),
                Err(_) => warn!("stored client identifier is blank; generating a new one"),
            }
        }

        let id = ClientId::generate();
        self.store.put(CLIENT_ID_KEY, id.as_str()).await?;
        info!(client_id = %id, "generated client identifier");
        Ok(id)
    }

    /// Drops the stored identifier; the next `client_id` call mints a new one.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the client store cannot be written.
    pub async fn forget(&self) -> Result<(), PersistenceError> {
        self.store.remove(CLIENT_ID_KEY).await?;
        info!("client identifier cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::repository::InMemoryRepository;

    #[tokio::test]
    async fn identifier_is_stable_once_created() {
        let store = Arc::new(InMemoryRepository::new());
        let provider = IdentityProvider::new(store.clone());

        let first = provider.client_id().await.unwrap();
        let second = provider.client_id().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            store.get(CLIENT_ID_KEY).await.unwrap().as_deref(),
            Some(first.as_str())
        );
    }

    #[tokio::test]
    async fn stored_identifier_is_reused() {
        let store = Arc::new(InMemoryRepository::new());
        store.put(CLIENT_ID_KEY, "existing-client").await.unwrap();
        let provider = IdentityProvider::new(store);

        assert_eq!(provider.client_id().await.unwrap().as_str(), "existing-client");
    }

    #[tokio::test]
    async fn blank_identifier_is_replaced() {
        let store = Arc::new(InMemoryRepository::new());
        store.put(CLIENT_ID_KEY, "   ").await.unwrap();
        let provider = IdentityProvider::new(store.clone());

        let id = provider.client_id().await.unwrap();
        assert!(!id.as_str().trim().is_empty());
        assert_eq!(store.get(CLIENT_ID_KEY).await.unwrap().as_deref(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn forget_mints_a_new_identifier() {
        let provider = IdentityProvider::new(Arc::new(InMemoryRepository::new()));
        let first = provider.client_id().await.unwrap();
        provider.forget().await.unwrap();
        let second = provider.client_id().await.unwrap();
        assert_ne!(first, second);
    }
}
