use std::sync::Arc;

use assess_core::model::{ClientId, QuestionCatalog};
use storage::repository::Storage;
use tracing::info;

use crate::Clock;
use crate::api::{ApiClient, HistorySource, QuestionSource, ScoringBackend};
use crate::catalog::CatalogLoader;
use crate::config::{ApiConfig, SessionSettings};
use crate::error::{AppServicesError, CatalogLoadError, PersistenceError, SessionError};
use crate::identity::IdentityProvider;
use crate::persistence::SnapshotStore;
use crate::profile_store::ProfileMemory;
use crate::sessions::SessionController;

/// Assembles app-facing services around one client store and one API client.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    settings: SessionSettings,
    client_id: ClientId,
    snapshots: SnapshotStore,
    profiles: ProfileMemory,
    api: Arc<ApiClient>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization, identity setup or
    /// HTTP client construction fails.
    pub async fn new_sqlite(
        db_url: &str,
        api: &ApiConfig,
        clock: Clock,
        settings: SessionSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(&storage, api, clock, settings).await
    }

    /// # Errors
    ///
    /// Returns `AppServicesError` if identity setup or HTTP client
    /// construction fails.
    pub async fn from_storage(
        storage: &Storage,
        api: &ApiConfig,
        clock: Clock,
        settings: SessionSettings,
    ) -> Result<Self, AppServicesError> {
        let identity = IdentityProvider::new(Arc::clone(&storage.client_store));
        let client_id = identity.client_id().await?;
        let api = Arc::new(ApiClient::new(api, client_id.clone())?);
        let snapshots = SnapshotStore::new(Arc::clone(&storage.client_store), clock)
            .with_ttl(settings.snapshot_ttl);
        let profiles = ProfileMemory::new(Arc::clone(&storage.client_store));

        Ok(Self {
            clock,
            settings,
            client_id,
            snapshots,
            profiles,
            api,
        })
    }

    /// Wipes everything kept in the client store without resolving an
    /// identifier first. The next run mints a fresh one.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if any entry cannot be removed.
    pub async fn clear_local_data(storage: &Storage) -> Result<(), PersistenceError> {
        let store = &storage.client_store;
        SnapshotStore::new(Arc::clone(store), Clock::default_clock())
            .clear()
            .await?;
        ProfileMemory::new(Arc::clone(store)).forget().await?;
        IdentityProvider::new(Arc::clone(store)).forget().await?;
        info!("local client data cleared");
        Ok(())
    }

    /// [`AppServices::clear_local_data`] on a `SQLite` store.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the store cannot be opened or cleared.
    pub async fn clear_sqlite(db_url: &str) -> Result<(), AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::clear_local_data(&storage).await?;
        Ok(())
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    #[must_use]
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    #[must_use]
    pub fn profiles(&self) -> &ProfileMemory {
        &self.profiles
    }

    #[must_use]
    pub fn history(&self) -> Arc<dyn HistorySource> {
        self.api.clone()
    }

    /// # Errors
    ///
    /// Returns `CatalogLoadError` if the catalog cannot be fetched or is invalid.
    pub async fn load_catalog(&self) -> Result<QuestionCatalog, CatalogLoadError> {
        let source: Arc<dyn QuestionSource> = self.api.clone();
        CatalogLoader::new(source).load().await
    }

    /// # Errors
    ///
    /// Returns `SessionError::Validation` if the catalog is empty.
    pub fn session_controller(
        &self,
        catalog: QuestionCatalog,
    ) -> Result<SessionController, SessionError> {
        let scoring: Arc<dyn ScoringBackend> = self.api.clone();
        SessionController::new(
            catalog,
            self.client_id.clone(),
            self.snapshots.clone(),
            scoring,
            self.clock,
            self.settings,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::CLIENT_ID_KEY;
    use crate::persistence::SNAPSHOT_KEY;
    use crate::profile_store::PROFILE_KEY;
    use storage::repository::KeyValueRepository;

    #[tokio::test]
    async fn clearing_local_data_drops_saved_session() {
        let storage = Storage::in_memory();
        let store = &storage.client_store;
        let services = AppServices::from_storage(
            &storage,
            &ApiConfig::new("http://localhost:5000").unwrap(),
            Clock::default_clock(),
            SessionSettings::default(),
        )
        .await
        .unwrap();
        store.put(SNAPSHOT_KEY, r#"{"schemaVersion":1}"#).await.unwrap();
        store.put(PROFILE_KEY, r#"{"nickname":"Robin"}"#).await.unwrap();
        assert!(store.get(CLIENT_ID_KEY).await.unwrap().is_some());

        AppServices::clear_local_data(&storage).await.unwrap();

        for key in [SNAPSHOT_KEY, PROFILE_KEY, CLIENT_ID_KEY] {
            assert!(store.get(key).await.unwrap().is_none(), "{key} survived");
        }
        let fresh = IdentityProvider::new(Arc::clone(store)).client_id().await.unwrap();
        assert_ne!(&fresh, services.client_id());
    }

    #[tokio::test]
    async fn clearing_a_fresh_store_does_not_mint_an_identifier() {
        let storage = Storage::in_memory();
        AppServices::clear_local_data(&storage).await.unwrap();
        assert!(storage.client_store.get(CLIENT_ID_KEY).await.unwrap().is_none());
    }
}
