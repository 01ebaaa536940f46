use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use assess_core::Clock;
use assess_core::model::{SessionSnapshot, default_snapshot_ttl};
use storage::repository::KeyValueRepository;

use crate::error::PersistenceError;

/// Client-store key holding the in-progress session.
pub const SNAPSHOT_KEY: &str = "assessment_state";

/// Single-slot store for the in-progress session snapshot.
///
/// Entries that are unreadable, from another schema version, malformed or
/// older than the time-to-live are removed on load and reported as absent.
#[derive(Clone)]
pub struct SnapshotStore {
    store: Arc<dyn KeyValueRepository>,
    clock: Clock,
    ttl: Duration,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueRepository>, clock: Clock) -> Self {
        Self {
            store,
            clock,
            ttl: default_snapshot_ttl(),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Overwrites the slot with `snapshot`.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if encoding or the write fails.
    pub async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        let encoded = serde_json::to_string(snapshot)?;
        self.store.put(SNAPSHOT_KEY, &encoded).await?;
        debug!(current_index = snapshot.current_index, "session snapshot saved");
        Ok(())
    }

    /// Returns the stored snapshot if it is fresh and well-formed.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the store cannot be read, or a rejected
    /// entry cannot be removed.
    pub async fn load(&self) -> Result<Option<SessionSnapshot>, PersistenceError> {
        let Some(raw) = self.store.get(SNAPSHOT_KEY).await? else {
            return Ok(None);
        };

        let snapshot = match serde_json::from_str::<SessionSnapshot>(&raw) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "discarding unreadable session snapshot");
                self.clear().await?;
                return Ok(None);
            }
        };

        let checked = snapshot
            .validate()
            .and_then(|()| snapshot.check_fresh(self.clock.now(), self.ttl));
        if let Err(reason) = checked {
            info!(%reason, "discarding session snapshot");
            self.clear().await?;
            return Ok(None);
        }

        Ok(Some(snapshot))
    }

    /// Removes the slot. Clearing an empty slot is not an error.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError` if the store cannot be written.
    pub async fn clear(&self) -> Result<(), PersistenceError> {
        self.store.remove(SNAPSHOT_KEY).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::{AnswerValue, Gender, Profile, SNAPSHOT_SCHEMA_VERSION};
    use assess_core::time::{fixed_clock, fixed_now, to_epoch_millis};
    use chrono::NaiveDate;
    use storage::repository::InMemoryRepository;

    fn snapshot(started_minutes_ago: i64) -> SessionSnapshot {
        let today = fixed_now().date_naive();
        let profile = Profile::new(
            "Robin",
            NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            Gender::Other,
            today,
        )
        .unwrap();
        SessionSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            profile,
            answers: vec![Some(AnswerValue::from_u8(2).unwrap()), None, None],
            current_index: 1,
            started_at_epoch_millis: to_epoch_millis(
                fixed_now() - Duration::minutes(started_minutes_ago),
            ),
        }
    }

    fn store() -> (Arc<InMemoryRepository>, SnapshotStore) {
        let repo = Arc::new(InMemoryRepository::new());
        let store = SnapshotStore::new(repo.clone(), fixed_clock());
        (repo, store)
    }

    #[tokio::test]
    async fn save_then_load_returns_equal_snapshot() {
        let (_, store) = store();
        let saved = snapshot(30);
        store.save(&saved).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(saved));
    }

    #[tokio::test]
    async fn load_on_empty_slot_is_absent() {
        let (_, store) = store();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_snapshot_is_removed() {
        let (repo, store) = store();
        store.save(&snapshot(25 * 60)).await.unwrap();

        assert!(store.load().await.unwrap().is_none());
        assert!(repo.get(SNAPSHOT_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snapshot_exactly_at_ttl_is_still_fresh() {
        let (_, store) = store();
        store.save(&snapshot(24 * 60)).await.unwrap();

        assert!(store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unreadable_entry_is_removed() {
        let (repo, store) = store();
        repo.put(SNAPSHOT_KEY, "{not json").await.unwrap();

        assert!(store.load().await.unwrap().is_none());
        assert!(repo.get(SNAPSHOT_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_schema_version_is_removed() {
        let (repo, store) = store();
        let mut future = snapshot(5);
        future.schema_version = SNAPSHOT_SCHEMA_VERSION + 1;
        store.save(&future).await.unwrap();

        assert!(store.load().await.unwrap().is_none());
        assert!(repo.get(SNAPSHOT_KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let (_, store) = store();
        store.save(&snapshot(1)).await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();

        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn custom_ttl_applies() {
        let (_, store) = store();
        let store = store.with_ttl(Duration::minutes(10));
        store.save(&snapshot(11)).await.unwrap();

        assert!(store.load().await.unwrap().is_none());
    }
}
