use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use assess_core::Clock;
use assess_core::model::{
    Advance, AnswerValue, ClientId, Profile, Question, QuestionCatalog, Session, SessionPhase,
    SessionProgress, SessionSnapshot, ValidationError,
};

use super::confirm::{ConfirmPrompt, Confirmation};
use super::events::SessionEvent;
use crate::api::{ScoringBackend, SubmissionResult};
use crate::config::{SessionSettings, TimerPolicy};
use crate::error::SessionError;
use crate::persistence::SnapshotStore;
use crate::timer::{CountdownTimer, TimerEvent, TimerEventKind};

const EVENT_CAPACITY: usize = 64;

/// Result of moving forward from the current question.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    Moved { index: usize },
    /// The last question was answered and the sheet was scored.
    Completed(SubmissionResult),
}

/// What happened to a stored snapshot when the controller was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeOutcome {
    NoSnapshot,
    Resumed,
    /// The respondent chose not to continue; the snapshot was removed.
    Declined,
    /// The snapshot did not fit the current catalog and was removed.
    Discarded,
}

/// Drives one questionnaire session.
///
/// Owns the session state, persists a snapshot after every mutation while in
/// progress, runs the countdown and submits the answer sheet. Presentation
/// layers observe it through [`SessionController::subscribe`] and feed timer
/// events back through [`SessionController::handle_timer_event`].
pub struct SessionController {
    clock: Clock,
    settings: SessionSettings,
    catalog: QuestionCatalog,
    session: Session,
    snapshots: SnapshotStore,
    scoring: Arc<dyn ScoringBackend>,
    events: broadcast::Sender<SessionEvent>,
    timer: Option<CountdownTimer>,
    timer_runs: u64,
    timer_tx: mpsc::UnboundedSender<TimerEvent>,
    timer_rx: Option<mpsc::UnboundedReceiver<TimerEvent>>,
    result: Option<SubmissionResult>,
}

impl SessionController {
    /// # Errors
    ///
    /// Returns `SessionError::Validation` if the catalog is empty.
    pub fn new(
        catalog: QuestionCatalog,
        identifier: ClientId,
        snapshots: SnapshotStore,
        scoring: Arc<dyn ScoringBackend>,
        clock: Clock,
        settings: SessionSettings,
    ) -> Result<Self, SessionError> {
        let session = Session::new(identifier, catalog.len())?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        Ok(Self {
            clock,
            settings,
            catalog,
            session,
            snapshots,
            scoring,
            events,
            timer: None,
            timer_runs: 0,
            timer_tx,
            timer_rx: Some(timer_rx),
            result: None,
        })
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Hands the timer event stream to the caller. Available once.
    pub fn take_timer_events(&mut self) -> Option<mpsc::UnboundedReceiver<TimerEvent>> {
        self.timer_rx.take()
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn catalog(&self) -> &QuestionCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.session.phase()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        self.session.progress()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.catalog.get(self.session.current_index())
    }

    /// Budget the running countdown was started with.
    #[must_use]
    pub fn timer_budget(&self) -> Option<Duration> {
        self.timer.as_ref().map(CountdownTimer::total)
    }

    #[must_use]
    pub fn last_result(&self) -> Option<&SubmissionResult> {
        self.result.as_ref()
    }

    /// Looks for a stored snapshot and, if the respondent agrees, resumes it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError` if the session is not idle or storage fails.
    pub async fn offer_resume(
        &mut self,
        confirm: &dyn Confirmation,
    ) -> Result<ResumeOutcome, SessionError> {
        let Some(snapshot) = self.snapshots.load().await? else {
            return Ok(ResumeOutcome::NoSnapshot);
        };

        let now = self.clock.now();
        let checked = snapshot
            .check_resumable(self.catalog.len(), now, self.snapshots.ttl())
            .and_then(|()| snapshot.started_at());
        let started_at = match checked {
            Ok(started_at) => started_at,
            Err(reason) => {
                warn!(%reason, "discarding session snapshot that does not fit the catalog");
                self.snapshots.clear().await?;
                return Ok(ResumeOutcome::Discarded);
            }
        };

        let prompt = ConfirmPrompt::ResumeSession {
            answered: snapshot.answers.iter().flatten().count(),
            total: snapshot.answers.len(),
            started_at,
        };
        if !confirm.confirm(&prompt).await {
            info!("respondent declined to resume; discarding snapshot");
            self.snapshots.clear().await?;
            return Ok(ResumeOutcome::Declined);
        }

        if self.resume(snapshot).await? {
            Ok(ResumeOutcome::Resumed)
        } else {
            Ok(ResumeOutcome::Discarded)
        }
    }

    /// Adopts `snapshot` verbatim and restarts the countdown.
    ///
    /// Returns `false` (and removes the stored snapshot) when the snapshot is
    /// stale or sized for another catalog.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Validation` unless idle, or a storage failure.
    pub async fn resume(&mut self, snapshot: SessionSnapshot) -> Result<bool, SessionError> {
        let now = self.clock.now();
        match self.session.resume(snapshot, now, self.snapshots.ttl()) {
            Ok(()) => {}
            Err(ValidationError::Snapshot(reason)) => {
                warn!(%reason, "discarding incompatible session snapshot");
                self.snapshots.clear().await?;
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        }

        let progress = self.session.progress();
        info!(
            current_index = progress.current,
            answered = progress.answered,
            "assessment session resumed"
        );
        self.emit(SessionEvent::PhaseChanged {
            from: SessionPhase::Idle,
            to: SessionPhase::InProgress,
        });
        self.emit(SessionEvent::Resumed {
            current_index: progress.current,
            answered: progress.answered,
        });
        self.emit(SessionEvent::QuestionChanged {
            index: progress.current,
        });
        let budget = self.resume_budget(now);
        self.start_timer(budget);
        Ok(true)
    }

    /// Begins a fresh attempt with the full time limit.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Validation` unless idle.
    pub async fn start(&mut self, profile: Profile) -> Result<(), SessionError> {
        let now = self.clock.now();
        self.session.start(profile, now)?;
        self.result = None;

        info!(questions = self.catalog.len(), "assessment session started");
        self.emit(SessionEvent::PhaseChanged {
            from: SessionPhase::Idle,
            to: SessionPhase::InProgress,
        });
        self.emit(SessionEvent::Started {
            question_count: self.catalog.len(),
        });
        self.emit(SessionEvent::QuestionChanged { index: 0 });
        self.persist().await;
        self.start_timer(self.settings.time_limit);
        Ok(())
    }

    /// Records `value` for the question at `index`; re-answering overwrites.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Validation` if not in progress, the index is out
    /// of range, or the value is outside `0..=4`.
    pub async fn record_answer(&mut self, index: usize, value: u8) -> Result<(), SessionError> {
        let value = AnswerValue::from_u8(value).map_err(ValidationError::from)?;
        self.session.record_answer(index, value)?;
        debug!(index, value = value.value(), "answer recorded");
        self.emit(SessionEvent::AnswerRecorded { index, value });
        self.persist().await;
        Ok(())
    }

    /// [`SessionController::record_answer`] for the current question.
    ///
    /// # Errors
    ///
    /// Same as [`SessionController::record_answer`].
    pub async fn answer_current(&mut self, value: u8) -> Result<(), SessionError> {
        self.record_answer(self.session.current_index(), value).await
    }

    /// Moves to the next question, or finalizes after the last one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Validation` if the current question is
    /// unanswered, and submission errors when finalizing.
    pub async fn advance(&mut self) -> Result<AdvanceOutcome, SessionError> {
        match self.session.advance()? {
            Advance::Moved { index } => {
                self.emit(SessionEvent::QuestionChanged { index });
                self.persist().await;
                Ok(AdvanceOutcome::Moved { index })
            }
            Advance::ReadyToFinalize => self.finalize().await.map(AdvanceOutcome::Completed),
        }
    }

    /// Steps back one question. Returns `false` at the first question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Validation` if not in progress.
    pub async fn retreat(&mut self) -> Result<bool, SessionError> {
        let moved = self.session.retreat()?;
        if moved {
            self.emit(SessionEvent::QuestionChanged {
                index: self.session.current_index(),
            });
            self.persist().await;
        }
        Ok(moved)
    }

    /// Stops the countdown and submits every question, unanswered ones as null.
    ///
    /// On success the stored snapshot is removed and the session completes.
    /// On failure the session returns to in-progress with answers and snapshot
    /// untouched; calling again retries.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Validation` unless in progress (a second call
    /// while a submission is outstanding included), or `SessionError::Api`.
    pub async fn finalize(&mut self) -> Result<SubmissionResult, SessionError> {
        let sheet = self.session.begin_submission(&self.catalog)?;
        self.stop_timer();
        self.emit(SessionEvent::PhaseChanged {
            from: SessionPhase::InProgress,
            to: SessionPhase::Submitting,
        });
        info!(
            answered = sheet.answered(),
            total = sheet.len(),
            "submitting answers"
        );

        match self.scoring.submit(&sheet, self.session.identifier()).await {
            Ok(result) => {
                self.session.complete_submission()?;
                if let Err(err) = self.snapshots.clear().await {
                    warn!(error = %err, "submission succeeded but the snapshot could not be removed");
                }
                info!(total_score = ?result.total_score(), "assessment submitted");
                self.result = Some(result.clone());
                self.emit(SessionEvent::PhaseChanged {
                    from: SessionPhase::Submitting,
                    to: SessionPhase::Completed,
                });
                self.emit(SessionEvent::Completed {
                    result: result.clone(),
                });
                Ok(result)
            }
            Err(err) => {
                self.session.fail_submission()?;
                warn!(error = %err, "submission failed; answers kept for retry");
                self.emit(SessionEvent::PhaseChanged {
                    from: SessionPhase::Submitting,
                    to: SessionPhase::InProgress,
                });
                self.emit(SessionEvent::SubmissionFailed {
                    message: err.user_message(),
                });
                Err(err.into())
            }
        }
    }

    /// Finalizes before the last question. When answers are missing the
    /// respondent is asked first; `Ok(None)` means they declined.
    ///
    /// # Errors
    ///
    /// Same as [`SessionController::finalize`].
    pub async fn submit_early(
        &mut self,
        confirm: &dyn Confirmation,
    ) -> Result<Option<SubmissionResult>, SessionError> {
        let unanswered = self.session.question_count() - self.session.answered_count();
        if self.session.phase() == SessionPhase::InProgress
            && unanswered > 0
            && !confirm
                .confirm(&ConfirmPrompt::SubmitEarly { unanswered })
                .await
        {
            return Ok(None);
        }
        self.finalize().await.map(Some)
    }

    /// Applies a countdown event. Events from a replaced or stopped countdown
    /// are ignored. Returns the submission result when expiry finalized.
    ///
    /// # Errors
    ///
    /// Returns submission errors from a timeout-triggered finalize.
    pub async fn handle_timer_event(
        &mut self,
        event: TimerEvent,
    ) -> Result<Option<SubmissionResult>, SessionError> {
        if self.timer.as_ref().map(CountdownTimer::run) != Some(event.run) {
            debug!(run = event.run, "ignoring event from inactive countdown");
            return Ok(None);
        }
        match event.kind {
            TimerEventKind::Tick { remaining } => {
                self.emit(SessionEvent::TimerTick { remaining });
                Ok(None)
            }
            TimerEventKind::Expired => self.on_timeout().await,
        }
    }

    /// Forced finalize when time runs out. A no-op unless in progress.
    ///
    /// # Errors
    ///
    /// Returns submission errors from the finalize.
    pub async fn on_timeout(&mut self) -> Result<Option<SubmissionResult>, SessionError> {
        if self.session.phase() != SessionPhase::InProgress {
            debug!(phase = %self.session.phase(), "timeout ignored");
            return Ok(None);
        }
        info!(
            answered = self.session.answered_count(),
            total = self.session.question_count(),
            "time limit reached; submitting"
        );
        self.emit(SessionEvent::TimedOut);
        self.finalize().await.map(Some)
    }

    /// Asks for confirmation, then discards all progress. Returns whether the
    /// session was reset.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Validation` while a submission is outstanding,
    /// or a storage failure.
    pub async fn restart(&mut self, confirm: &dyn Confirmation) -> Result<bool, SessionError> {
        if self.session.phase() == SessionPhase::Submitting {
            return Err(ValidationError::WrongPhase {
                expected: SessionPhase::InProgress,
                actual: SessionPhase::Submitting,
            }
            .into());
        }
        if !confirm.confirm(&ConfirmPrompt::RestartSession).await {
            return Ok(false);
        }
        self.discard().await?;
        Ok(true)
    }

    /// Drops all progress and the stored snapshot without asking.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Persistence` if the snapshot cannot be removed.
    pub async fn discard(&mut self) -> Result<(), SessionError> {
        self.stop_timer();
        self.snapshots.clear().await?;
        let from = self.session.phase();
        self.session.reset();
        self.result = None;
        info!("assessment session reset");
        if from != SessionPhase::Idle {
            self.emit(SessionEvent::PhaseChanged {
                from,
                to: SessionPhase::Idle,
            });
        }
        self.emit(SessionEvent::Reset);
        Ok(())
    }

    /// Write failures are reported as events; the session keeps going in memory.
    async fn persist(&self) {
        let Some(snapshot) = self.session.snapshot() else {
            return;
        };
        if let Err(err) = self.snapshots.save(&snapshot).await {
            warn!(error = %err, "failed to save session snapshot");
            self.emit(SessionEvent::SnapshotWriteFailed {
                message: err.to_string(),
            });
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn start_timer(&mut self, budget: Duration) {
        self.stop_timer();
        self.timer_runs += 1;
        self.timer = Some(CountdownTimer::start(
            self.timer_runs,
            budget,
            self.timer_tx.clone(),
        ));
    }

    fn stop_timer(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
    }

    fn resume_budget(&self, now: DateTime<Utc>) -> Duration {
        match self.settings.timer_policy {
            TimerPolicy::ResetOnResume => self.settings.time_limit,
            TimerPolicy::DeductElapsed => {
                let elapsed = self
                    .session
                    .elapsed(now)
                    .and_then(|elapsed| elapsed.to_std().ok())
                    .unwrap_or_default();
                self.settings.time_limit.saturating_sub(elapsed)
            }
        }
    }
}
