use std::time::Duration;

use assess_core::model::{AnswerValue, SessionPhase};

use crate::api::SubmissionResult;

/// Notifications for the presentation layer, delivered over a broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PhaseChanged {
        from: SessionPhase,
        to: SessionPhase,
    },
    Started {
        question_count: usize,
    },
    Resumed {
        current_index: usize,
        answered: usize,
    },
    QuestionChanged {
        index: usize,
    },
    AnswerRecorded {
        index: usize,
        value: AnswerValue,
    },
    TimerTick {
        remaining: Duration,
    },
    TimedOut,
    /// The session is back in progress with answers intact; retrying is allowed.
    SubmissionFailed {
        message: String,
    },
    Completed {
        result: SubmissionResult,
    },
    /// A snapshot write failed. The session continues in memory.
    SnapshotWriteFailed {
        message: String,
    },
    Reset,
}
