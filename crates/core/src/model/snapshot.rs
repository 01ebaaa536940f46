use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::answer::AnswerValue;
use crate::model::profile::Profile;
use crate::time::from_epoch_millis;

/// Current on-disk shape of [`SessionSnapshot`].
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Snapshots older than this are treated as absent.
#[must_use]
pub fn default_snapshot_ttl() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SnapshotError {
    #[error("unsupported snapshot schema version {found} (expected {SNAPSHOT_SCHEMA_VERSION})")]
    UnsupportedVersion { found: u32 },

    #[error("snapshot current index {index} exceeds answer count {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("snapshot start time {0} is not a valid timestamp")]
    InvalidTimestamp(i64),

    #[error("snapshot is {age_minutes} minutes old, past its time-to-live")]
    Expired { age_minutes: i64 },

    #[error("snapshot has {found} answers but the catalog has {expected} questions")]
    LengthMismatch { expected: usize, found: usize },
}

/// Persisted projection of an in-progress session.
///
/// Carries no phase: a loaded snapshot always resumes as in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub schema_version: u32,
    pub profile: Profile,
    pub answers: Vec<Option<AnswerValue>>,
    pub current_index: usize,
    pub started_at_epoch_millis: i64,
}

impl SessionSnapshot {
    /// Start time as a UTC timestamp.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::InvalidTimestamp` if the stored millis are out of range.
    pub fn started_at(&self) -> Result<DateTime<Utc>, SnapshotError> {
        from_epoch_millis(self.started_at_epoch_millis)
            .ok_or(SnapshotError::InvalidTimestamp(self.started_at_epoch_millis))
    }

    /// Structural checks that do not depend on the catalog or the clock.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError` for an unknown schema version, an index past the
    /// answer list, or an unrepresentable start time.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: self.schema_version,
            });
        }
        if self.current_index > self.answers.len() {
            return Err(SnapshotError::IndexOutOfRange {
                index: self.current_index,
                len: self.answers.len(),
            });
        }
        self.started_at().map(|_| ())
    }

    /// Checks the time-to-live against `now`. Future start times count as fresh.
    ///
    /// # Errors
    ///
    /// Returns `SnapshotError::Expired` once `now - started_at` exceeds `ttl`.
    pub fn check_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> Result<(), SnapshotError> {
        let age = now - self.started_at()?;
        if age > ttl {
            return Err(SnapshotError::Expired {
                age_minutes: age.num_minutes(),
            });
        }
        Ok(())
    }

    /// Everything required before a session may adopt this snapshot.
    ///
    /// # Errors
    ///
    /// Returns the first failing `SnapshotError`.
    pub fn check_resumable(
        &self,
        question_count: usize,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(), SnapshotError> {
        self.validate()?;
        self.check_fresh(now, ttl)?;
        if self.answers.len() != question_count {
            return Err(SnapshotError::LengthMismatch {
                expected: question_count,
                found: self.answers.len(),
            });
        }
        Ok(())
    }
}
