use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Questions the controller asks the respondent before destroying or adopting progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmPrompt {
    ResumeSession {
        answered: usize,
        total: usize,
        started_at: DateTime<Utc>,
    },
    RestartSession,
    /// Submitting before the last question; unanswered items are sent empty.
    SubmitEarly {
        unanswered: usize,
    },
}

impl ConfirmPrompt {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            ConfirmPrompt::ResumeSession {
                answered,
                total,
                started_at,
            } => format!(
                "An unfinished assessment from {} was found ({answered}/{total} answered). Continue where you left off?",
                started_at.format("%Y-%m-%d %H:%M UTC")
            ),
            ConfirmPrompt::RestartSession => {
                "Restart the assessment? All current answers will be discarded.".to_owned()
            }
            ConfirmPrompt::SubmitEarly { unanswered } => format!(
                "{unanswered} question(s) are still unanswered and will be submitted empty. Submit now?"
            ),
        }
    }
}

/// Yes/no decision supplied by the presentation layer.
#[async_trait]
pub trait Confirmation: Send + Sync {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool;
}

/// Answers every prompt the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

#[async_trait]
impl Confirmation for FixedAnswer {
    async fn confirm(&self, _prompt: &ConfirmPrompt) -> bool {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::time::fixed_now;

    #[test]
    fn resume_prompt_mentions_progress() {
        let prompt = ConfirmPrompt::ResumeSession {
            answered: 12,
            total: 90,
            started_at: fixed_now(),
        };
        let message = prompt.message();
        assert!(message.contains("12/90"));
        assert!(message.contains("2023-11-14 22:13 UTC"));
    }

    #[tokio::test]
    async fn fixed_answer_ignores_prompt() {
        assert!(FixedAnswer(true).confirm(&ConfirmPrompt::RestartSession).await);
        assert!(
            !FixedAnswer(false)
                .confirm(&ConfirmPrompt::SubmitEarly { unanswered: 3 })
                .await
        );
    }
}
