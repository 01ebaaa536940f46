//! Line-oriented terminal presenter.
//!
//! Stdin is read on a dedicated thread and fed through a channel so the
//! session loop can `select!` over input, countdown events and session events.

use std::error::Error;
use std::io::{BufRead, Write};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, broadcast, mpsc};
use tracing::{debug, warn};

use assess_core::model::{Gender, Profile, RecordId, SessionPhase};
use services::{
    AdvanceOutcome, ApiError, AppServices, ConfirmPrompt, Confirmation, ResumeOutcome,
    SessionController, SessionError, SessionEvent,
};

use crate::time_fmt::format_datetime;
use crate::view::{answer_scale, history_row, question_block, result_summary};

const HELP: &str = "\
Commands:
  0-4   answer the current question and move on
  n     next question (the current one must be answered)
  b     previous question
  s     submit now
  r     restart the assessment
  t     show remaining time
  q     quit (progress is kept for 24 hours)
  h     this help";

pub struct TerminalInput {
    lines: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl TerminalInput {
    #[must_use]
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self {
            lines: Mutex::new(rx),
        }
    }

    /// `None` once stdin is closed.
    pub async fn next_line(&self) -> Option<String> {
        self.lines.lock().await.recv().await
    }

    pub async fn ask(&self, prompt: &str) -> Option<String> {
        print!("{prompt}");
        let _ = std::io::stdout().flush();
        self.next_line().await.map(|line| line.trim().to_owned())
    }
}

#[async_trait]
impl Confirmation for TerminalInput {
    async fn confirm(&self, prompt: &ConfirmPrompt) -> bool {
        let question = format!("{} [y/n] ", prompt.message());
        loop {
            let Some(answer) = self.ask(&question).await else {
                return false;
            };
            match answer.to_ascii_lowercase().as_str() {
                "y" | "yes" => return true,
                "n" | "no" => return false,
                _ => println!("Please answer y or n."),
            }
        }
    }
}

enum Flow {
    Continue,
    Quit,
}

/// Collects the start form, offering the remembered profile as defaults.
async fn start_form(
    services: &AppServices,
    input: &TerminalInput,
) -> Result<Option<Profile>, Box<dyn Error>> {
    let remembered = services.profiles().recall().await?;
    let today = services.clock().today();

    println!("Before you begin, tell us a little about yourself.");
    loop {
        let nickname_default = remembered.as_ref().map(Profile::nickname);
        let Some(nickname) = input
            .ask(&with_default("Nickname", nickname_default))
            .await
        else {
            return Ok(None);
        };
        let nickname = fallback(nickname, nickname_default);

        let birthday_default = remembered.as_ref().map(|p| p.birthday().to_string());
        let Some(birthday) = input
            .ask(&with_default("Birthday (YYYY-MM-DD)", birthday_default.as_deref()))
            .await
        else {
            return Ok(None);
        };
        let birthday = fallback(birthday, birthday_default.as_deref());
        let Ok(birthday) = NaiveDate::parse_from_str(&birthday, "%Y-%m-%d") else {
            println!("Please enter the birthday as YYYY-MM-DD.");
            continue;
        };

        let gender_default = remembered.as_ref().map(|p| p.gender().as_str());
        let Some(gender) = input
            .ask(&with_default("Gender (male/female/other)", gender_default))
            .await
        else {
            return Ok(None);
        };
        let gender = match fallback(gender, gender_default).parse::<Gender>() {
            Ok(gender) => gender,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        match Profile::new(nickname, birthday, gender, today) {
            Ok(profile) => {
                if let Err(err) = services.profiles().remember(&profile).await {
                    warn!(error = %err, "could not remember profile");
                }
                return Ok(Some(profile));
            }
            Err(err) => println!("{err}"),
        }
    }
}

fn with_default(label: &str, default: Option<&str>) -> String {
    match default {
        Some(value) => format!("{label} [{value}]: "),
        None => format!("{label}: "),
    }
}

fn fallback(entered: String, default: Option<&str>) -> String {
    if entered.is_empty() {
        default.map(str::to_owned).unwrap_or_default()
    } else {
        entered
    }
}

/// Runs one assessment from the resume offer (or start form) to the result.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded or storage fails.
pub async fn run_assessment(
    services: &AppServices,
    input: &TerminalInput,
) -> Result<(), Box<dyn Error>> {
    let catalog = services.load_catalog().await?;
    let mut controller = services.session_controller(catalog)?;
    let mut timer_events = controller
        .take_timer_events()
        .ok_or("countdown channel unavailable")?;
    let mut events = controller.subscribe();

    match controller.offer_resume(input).await? {
        ResumeOutcome::Resumed => match controller.session().started_at() {
            Some(started) => println!(
                "Welcome back. Continuing the assessment started {}.",
                format_datetime(started)
            ),
            None => println!("Welcome back. Picking up where you left off."),
        },
        ResumeOutcome::Discarded => {
            println!("A saved assessment no longer matches the questionnaire and was discarded.");
            if !begin(&mut controller, services, input).await? {
                return Ok(());
            }
        }
        ResumeOutcome::NoSnapshot | ResumeOutcome::Declined => {
            if !begin(&mut controller, services, input).await? {
                return Ok(());
            }
        }
    }
    println!("{}\n{HELP}", answer_scale());

    let mut remaining = controller.timer_budget();
    loop {
        tokio::select! {
            Some(event) = timer_events.recv() => {
                match controller.handle_timer_event(event).await {
                    Ok(_) => {}
                    Err(SessionError::Api(err)) => {
                        debug!(error = %err, "timer-driven submission failed");
                        println!("{}", retry_hint(&err));
                    }
                    Err(err) => return Err(err.into()),
                }
            }
            event = events.recv() => match event {
                Ok(event) => render_event(&controller, &event, &mut remaining),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "presenter fell behind session events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            line = input.next_line() => {
                let Some(line) = line else {
                    println!("\nInput closed. Your progress is saved.");
                    break;
                };
                match handle_command(&mut controller, services, input, line.trim(), remaining).await? {
                    Flow::Continue => {}
                    Flow::Quit => break,
                }
            }
        }

        if controller.phase() == SessionPhase::Completed {
            if let Some(result) = controller.last_result() {
                let session = controller.session();
                let duration = session
                    .elapsed(services.clock().now())
                    .and_then(|elapsed| elapsed.to_std().ok());
                println!("\n{}", result_summary(result, session.profile(), duration));
            }
            break;
        }
    }
    Ok(())
}

/// Collects a profile and starts the session. `false` if input closed.
async fn begin(
    controller: &mut SessionController,
    services: &AppServices,
    input: &TerminalInput,
) -> Result<bool, Box<dyn Error>> {
    let Some(profile) = start_form(services, input).await? else {
        return Ok(false);
    };
    controller.start(profile).await?;
    Ok(true)
}

async fn handle_command(
    controller: &mut SessionController,
    services: &AppServices,
    input: &TerminalInput,
    command: &str,
    remaining: Option<Duration>,
) -> Result<Flow, Box<dyn Error>> {
    let outcome = match command {
        "q" => {
            println!("Your progress is saved. Run again within 24 hours to continue.");
            return Ok(Flow::Quit);
        }
        "h" | "?" => {
            println!("{}\n{HELP}", answer_scale());
            Ok(())
        }
        "t" => {
            match remaining {
                Some(left) => println!("{} left.", crate::time_fmt::format_countdown(left)),
                None => println!("The countdown is not running."),
            }
            Ok(())
        }
        "b" => controller.retreat().await.map(|moved| {
            if !moved {
                println!("Already at the first question.");
            }
        }),
        "n" | "" => controller.advance().await.map(report_advance),
        "s" => controller.submit_early(input).await.map(|_| ()),
        "r" => match controller.restart(input).await {
            Ok(true) => {
                if !begin(controller, services, input).await? {
                    return Ok(Flow::Quit);
                }
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(err) => Err(err),
        },
        other => match other.parse::<u8>() {
            Ok(value) => match controller.answer_current(value).await {
                Ok(()) => controller.advance().await.map(report_advance),
                Err(err) => Err(err),
            },
            Err(_) => {
                println!("Unknown command {other:?}. Type h for help.");
                Ok(())
            }
        },
    };

    match outcome {
        Ok(()) => {}
        Err(SessionError::Validation(err)) => println!("{err}"),
        Err(SessionError::Api(err)) => {
            println!("Submission failed: {}", err.user_message());
            println!("{}", retry_hint(&err));
        }
        Err(err) => return Err(err.into()),
    }
    Ok(Flow::Continue)
}

fn retry_hint(err: &ApiError) -> &'static str {
    if err.is_network() {
        "Your answers are kept. Check your connection, then type s to try again."
    } else {
        "Your answers are kept. Type s to try again."
    }
}

fn report_advance(outcome: AdvanceOutcome) {
    if let AdvanceOutcome::Completed(_) = outcome {
        println!("Answers submitted.");
    }
}

fn render_event(
    controller: &SessionController,
    event: &SessionEvent,
    remaining: &mut Option<Duration>,
) {
    match event {
        SessionEvent::QuestionChanged { .. } => {
            if let Some(question) = controller.current_question() {
                let session = controller.session();
                println!(
                    "\n{}",
                    question_block(
                        controller.progress(),
                        question,
                        session.current_answer(),
                        *remaining
                    )
                );
            }
        }
        SessionEvent::Resumed { .. } => *remaining = controller.timer_budget(),
        SessionEvent::Started { question_count } => {
            println!("\n{question_count} questions. Answer how much each problem has troubled you recently.");
            *remaining = controller.timer_budget();
        }
        SessionEvent::TimerTick { remaining: left } => {
            *remaining = Some(*left);
            let secs = left.as_secs();
            if secs == 5 * 60 || secs == 60 {
                println!("({} left)", crate::time_fmt::format_countdown(*left));
            }
        }
        SessionEvent::TimedOut => println!("\nTime is up. Submitting your answers..."),
        SessionEvent::SubmissionFailed { message } => {
            println!("Submission failed: {message}");
        }
        SessionEvent::SnapshotWriteFailed { message } => {
            println!("Warning: progress could not be saved ({message}).");
        }
        SessionEvent::Reset => {
            *remaining = None;
            println!("The assessment was reset.");
        }
        SessionEvent::PhaseChanged { .. }
        | SessionEvent::AnswerRecorded { .. }
        | SessionEvent::Completed { .. } => {}
    }
}

/// Lists previous submissions for this client.
///
/// # Errors
///
/// Returns the service error if the history cannot be fetched.
pub async fn show_history(services: &AppServices) -> Result<(), Box<dyn Error>> {
    let entries = services.history().list_history().await?;
    if entries.is_empty() {
        println!("No previous assessments.");
        return Ok(());
    }
    for entry in &entries {
        println!("{}", history_row(entry));
    }
    Ok(())
}

/// # Errors
///
/// Returns the service error if the record cannot be fetched.
pub async fn show_record(services: &AppServices, id: RecordId) -> Result<(), Box<dyn Error>> {
    let result = services.history().history_detail(id).await?;
    println!("{}", result_summary(&result, None, None));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_entry_takes_default() {
        assert_eq!(fallback(String::new(), Some("Robin")), "Robin");
        assert_eq!(fallback("Sam".into(), Some("Robin")), "Sam");
        assert_eq!(fallback(String::new(), None), "");
    }

    #[test]
    fn service_error_retry_hint_skips_connection_advice() {
        let app = ApiError::Application {
            code: 500,
            message: "boom".into(),
        };
        assert_eq!(retry_hint(&app), "Your answers are kept. Type s to try again.");
        assert!(!retry_hint(&app).contains("connection"));
    }

    #[test]
    fn prompt_shows_default_in_brackets() {
        assert_eq!(with_default("Nickname", Some("Robin")), "Nickname [Robin]: ");
        assert_eq!(with_default("Nickname", None), "Nickname: ");
    }
}
