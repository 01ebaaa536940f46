use chrono::{DateTime, Duration, Utc};
use std::fmt;
use thiserror::Error;

use crate::model::answer::{AnswerError, AnswerValue};
use crate::model::ids::ClientId;
use crate::model::profile::Profile;
use crate::model::question::QuestionCatalog;
use crate::model::sheet::AnswerSheet;
use crate::model::snapshot::{SNAPSHOT_SCHEMA_VERSION, SessionSnapshot, SnapshotError};
use crate::time::to_epoch_millis;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Locally handled rule violations. These block an action; they never end a session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("a session needs at least one question")]
    EmptyCatalog,

    #[error("session is {actual}, expected {expected}")]
    WrongPhase {
        expected: SessionPhase,
        actual: SessionPhase,
    },

    #[error("question index {index} is out of range for {len} questions")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("question {} must be answered before moving on", .index + 1)]
    Unanswered { index: usize },

    #[error("session expects {expected} questions, catalog has {found}")]
    CatalogMismatch { expected: usize, found: usize },

    #[error(transparent)]
    Answer(#[from] AnswerError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

//
// ─── PHASE ────────────────────────────────────────────────────────────────────
//

/// Lifecycle position of a session.
///
/// `Idle → InProgress → Submitting → Completed`, with `Submitting → InProgress`
/// after a failed submission. `reset` returns any phase to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    Idle,
    InProgress,
    Submitting,
    Completed,
}

impl SessionPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::InProgress => "in progress",
            SessionPhase::Submitting => "submitting",
            SessionPhase::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a forward navigation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved to the question at `index`.
    Moved { index: usize },
    /// The last question was passed; the session should be finalized.
    ReadyToFinalize,
}

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub current: usize,
    pub remaining: usize,
}

//
// ─── SESSION ──────────────────────────────────────────────────────────────────
//

/// One attempt at the questionnaire for one client identity.
///
/// Holds pure state and transition rules only; persistence, timing and
/// submission are driven from the services layer.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    identifier: ClientId,
    profile: Option<Profile>,
    answers: Vec<Option<AnswerValue>>,
    current_index: usize,
    started_at: Option<DateTime<Utc>>,
    phase: SessionPhase,
}

impl Session {
    /// Create an idle session sized for a catalog of `question_count` questions.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::EmptyCatalog` if `question_count` is zero.
    pub fn new(identifier: ClientId, question_count: usize) -> Result<Self, ValidationError> {
        if question_count == 0 {
            return Err(ValidationError::EmptyCatalog);
        }
        Ok(Self {
            identifier,
            profile: None,
            answers: vec![None; question_count],
            current_index: 0,
            started_at: None,
            phase: SessionPhase::Idle,
        })
    }

    #[must_use]
    pub fn identifier(&self) -> &ClientId {
        &self.identifier
    }

    #[must_use]
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub fn answers(&self) -> &[Option<AnswerValue>] {
        &self.answers
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Total number of questions (N).
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    /// Answer recorded for the current question, if any.
    #[must_use]
    pub fn current_answer(&self) -> Option<AnswerValue> {
        self.answers.get(self.current_index).copied().flatten()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let total = self.question_count();
        SessionProgress {
            total,
            answered: self.answered_count(),
            current: self.current_index,
            remaining: total.saturating_sub(self.current_index + 1),
        }
    }

    /// Time spent since the session started, if it has.
    #[must_use]
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.started_at.map(|started| now - started)
    }

    fn require_phase(&self, expected: SessionPhase) -> Result<(), ValidationError> {
        if self.phase != expected {
            return Err(ValidationError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    /// Begin a fresh attempt: all answers absent, first question current.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::WrongPhase` unless the session is idle.
    pub fn start(
        &mut self,
        profile: Profile,
        started_at: DateTime<Utc>,
    ) -> Result<(), ValidationError> {
        self.require_phase(SessionPhase::Idle)?;
        self.answers.fill(None);
        self.profile = Some(profile);
        self.current_index = 0;
        self.started_at = Some(started_at);
        self.phase = SessionPhase::InProgress;
        Ok(())
    }

    /// Adopt a persisted snapshot verbatim.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::WrongPhase` unless idle, or
    /// `ValidationError::Snapshot` if the snapshot is stale, malformed or sized
    /// for a different catalog. The session is unchanged on error.
    pub fn resume(
        &mut self,
        snapshot: SessionSnapshot,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(), ValidationError> {
        self.require_phase(SessionPhase::Idle)?;
        snapshot.check_resumable(self.question_count(), now, ttl)?;
        let started_at = snapshot.started_at()?;

        self.profile = Some(snapshot.profile);
        self.answers = snapshot.answers;
        self.current_index = snapshot.current_index;
        self.started_at = Some(started_at);
        self.phase = SessionPhase::InProgress;
        Ok(())
    }

    /// Record `value` for the question at `index`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if not in progress or `index` is out of range.
    pub fn record_answer(
        &mut self,
        index: usize,
        value: AnswerValue,
    ) -> Result<(), ValidationError> {
        self.require_phase(SessionPhase::InProgress)?;
        let len = self.answers.len();
        let slot = self
            .answers
            .get_mut(index)
            .ok_or(ValidationError::IndexOutOfRange { index, len })?;
        *slot = Some(value);
        Ok(())
    }

    /// Move forward one question, or signal that the last one was passed.
    ///
    /// The current question must already carry an answer, whether it was just
    /// recorded or kept from an earlier visit.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Unanswered` if the current question has no answer,
    /// or `ValidationError::WrongPhase` if not in progress.
    pub fn advance(&mut self) -> Result<Advance, ValidationError> {
        self.require_phase(SessionPhase::InProgress)?;
        let last = self.question_count() - 1;
        if self.current_index > last {
            return Ok(Advance::ReadyToFinalize);
        }
        if self.current_answer().is_none() {
            return Err(ValidationError::Unanswered {
                index: self.current_index,
            });
        }
        if self.current_index == last {
            return Ok(Advance::ReadyToFinalize);
        }
        self.current_index += 1;
        Ok(Advance::Moved {
            index: self.current_index,
        })
    }

    /// Move back one question. Returns `false` (no-op) on the first question.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::WrongPhase` if not in progress.
    pub fn retreat(&mut self) -> Result<bool, ValidationError> {
        self.require_phase(SessionPhase::InProgress)?;
        if self.current_index == 0 {
            return Ok(false);
        }
        self.current_index -= 1;
        Ok(true)
    }

    /// Seal answer collection and build the submission map.
    ///
    /// Per-question completeness is not checked; only the catalog length must match.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::WrongPhase` unless in progress (this also rejects
    /// a second finalize while one is outstanding), or
    /// `ValidationError::CatalogMismatch` if the catalog size differs.
    pub fn begin_submission(
        &mut self,
        catalog: &QuestionCatalog,
    ) -> Result<AnswerSheet, ValidationError> {
        self.require_phase(SessionPhase::InProgress)?;
        let sheet = AnswerSheet::from_catalog(catalog, &self.answers)?;
        self.phase = SessionPhase::Submitting;
        Ok(sheet)
    }

    /// # Errors
    ///
    /// Returns `ValidationError::WrongPhase` unless submitting.
    pub fn complete_submission(&mut self) -> Result<(), ValidationError> {
        self.require_phase(SessionPhase::Submitting)?;
        self.phase = SessionPhase::Completed;
        Ok(())
    }

    /// Reopen the session after a failed submission. Answers are untouched.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::WrongPhase` unless submitting.
    pub fn fail_submission(&mut self) -> Result<(), ValidationError> {
        self.require_phase(SessionPhase::Submitting)?;
        self.phase = SessionPhase::InProgress;
        Ok(())
    }

    /// Drop all progress and return to idle, keeping the identity and size.
    pub fn reset(&mut self) {
        self.profile = None;
        self.answers.fill(None);
        self.current_index = 0;
        self.started_at = None;
        self.phase = SessionPhase::Idle;
    }

    /// Persistable projection, available once the session has been started.
    #[must_use]
    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        let profile = self.profile.clone()?;
        let started_at = self.started_at?;
        Some(SessionSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            profile,
            answers: self.answers.clone(),
            current_index: self.current_index,
            started_at_epoch_millis: to_epoch_millis(started_at),
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identifier", &self.identifier)
            .field("phase", &self.phase)
            .field("question_count", &self.answers.len())
            .field("answered", &self.answered_count())
            .field("current_index", &self.current_index)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::QuestionId;
    use crate::model::profile::Gender;
    use crate::model::question::Question;
    use crate::model::snapshot::default_snapshot_ttl;
    use crate::time::fixed_now;
    use chrono::NaiveDate;

    fn profile() -> Profile {
        Profile::new(
            "Ada",
            NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
            Gender::Female,
            fixed_now().date_naive(),
        )
        .unwrap()
    }

    fn catalog(n: u64) -> QuestionCatalog {
        QuestionCatalog::new(
            (1..=n)
                .map(|id| Question::new(QuestionId::from(id), u32::try_from(id).unwrap(), "q"))
                .collect(),
        )
        .unwrap()
    }

    fn started(n: usize) -> Session {
        let mut session = Session::new(ClientId::generate(), n).unwrap();
        session.start(profile(), fixed_now()).unwrap();
        session
    }

    fn value(v: u8) -> AnswerValue {
        AnswerValue::from_u8(v).unwrap()
    }

    #[test]
    fn fresh_session_has_all_answers_absent() {
        for n in [1, 2, 90] {
            let session = started(n);
            assert_eq!(session.answers().len(), n);
            assert!(session.answers().iter().all(Option::is_none));
            assert_eq!(session.current_index(), 0);
            assert_eq!(session.phase(), SessionPhase::InProgress);
        }
    }

    #[test]
    fn empty_catalog_cannot_create_a_session() {
        let err = Session::new(ClientId::generate(), 0).unwrap_err();
        assert_eq!(err, ValidationError::EmptyCatalog);
    }

    #[test]
    fn advance_requires_an_answer_but_accepts_a_previous_one() {
        let mut session = started(3);
        assert_eq!(
            session.advance(),
            Err(ValidationError::Unanswered { index: 0 })
        );

        session.record_answer(0, value(1)).unwrap();
        assert_eq!(session.advance(), Ok(Advance::Moved { index: 1 }));

        assert!(session.retreat().unwrap());
        // Re-entering an answered question needs no new answer.
        assert_eq!(session.advance(), Ok(Advance::Moved { index: 1 }));
    }

    #[test]
    fn advance_on_last_question_never_moves_past_it() {
        let mut session = started(2);
        session.record_answer(0, value(0)).unwrap();
        session.advance().unwrap();
        session.record_answer(1, value(4)).unwrap();

        assert_eq!(session.advance(), Ok(Advance::ReadyToFinalize));
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn retreat_at_first_question_is_a_noop() {
        let mut session = started(2);
        assert_eq!(session.retreat(), Ok(false));
        assert_eq!(session.current_index(), 0);
    }

    #[test]
    fn retreat_does_not_require_an_answer_or_touch_answers() {
        let mut session = started(3);
        session.record_answer(0, value(2)).unwrap();
        session.advance().unwrap();

        assert_eq!(session.retreat(), Ok(true));
        assert_eq!(session.answers()[0], Some(value(2)));
    }

    #[test]
    fn record_answer_checks_phase_and_range() {
        let mut idle = Session::new(ClientId::generate(), 2).unwrap();
        assert!(matches!(
            idle.record_answer(0, value(1)),
            Err(ValidationError::WrongPhase { .. })
        ));

        let mut session = started(2);
        assert_eq!(
            session.record_answer(2, value(1)),
            Err(ValidationError::IndexOutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn submission_blocks_reentry_and_can_be_reopened() {
        let mut session = started(2);
        session.record_answer(0, value(3)).unwrap();

        let sheet = session.begin_submission(&catalog(2)).unwrap();
        assert_eq!(sheet.len(), 2);
        assert_eq!(session.phase(), SessionPhase::Submitting);
        assert!(matches!(
            session.begin_submission(&catalog(2)),
            Err(ValidationError::WrongPhase { .. })
        ));

        session.fail_submission().unwrap();
        assert_eq!(session.phase(), SessionPhase::InProgress);
        assert_eq!(session.answers()[0], Some(value(3)));

        session.begin_submission(&catalog(2)).unwrap();
        session.complete_submission().unwrap();
        assert_eq!(session.phase(), SessionPhase::Completed);
    }

    #[test]
    fn resume_adopts_snapshot_verbatim() {
        let mut original = started(3);
        original.record_answer(0, value(2)).unwrap();
        original.advance().unwrap();
        let snapshot = original.snapshot().unwrap();

        let mut reloaded = Session::new(ClientId::generate(), 3).unwrap();
        reloaded
            .resume(
                snapshot,
                fixed_now() + Duration::minutes(30),
                default_snapshot_ttl(),
            )
            .unwrap();

        assert_eq!(reloaded.phase(), SessionPhase::InProgress);
        assert_eq!(reloaded.answers(), original.answers());
        assert_eq!(reloaded.current_index(), 1);
        assert_eq!(reloaded.started_at(), Some(fixed_now()));
    }

    #[test]
    fn resume_rejects_stale_or_mismatched_snapshots_without_changes() {
        let snapshot = started(3).snapshot().unwrap();

        let mut session = Session::new(ClientId::generate(), 3).unwrap();
        let err = session
            .resume(
                snapshot.clone(),
                fixed_now() + Duration::hours(25),
                default_snapshot_ttl(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Snapshot(SnapshotError::Expired { .. })
        ));
        assert_eq!(session.phase(), SessionPhase::Idle);

        let mut other = Session::new(ClientId::generate(), 4).unwrap();
        assert!(
            other
                .resume(snapshot, fixed_now(), default_snapshot_ttl())
                .is_err()
        );
        assert_eq!(other.phase(), SessionPhase::Idle);
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut session = started(2);
        session.record_answer(1, value(1)).unwrap();
        session.reset();

        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(session.snapshot().is_none());
        assert_eq!(session.answered_count(), 0);
        assert_eq!(session.question_count(), 2);
    }

    #[test]
    fn progress_reports_remaining_after_current() {
        let mut session = started(5);
        session.record_answer(0, value(1)).unwrap();
        session.advance().unwrap();

        let progress = session.progress();
        assert_eq!(progress.total, 5);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.current, 1);
        assert_eq!(progress.remaining, 3);
    }
}
