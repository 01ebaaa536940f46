//! Plain-text rendering for the terminal presenter.

use std::fmt::Write as _;
use std::time::Duration;

use assess_core::model::{AnswerValue, Profile, Question, SessionProgress};
use services::{HistoryEntry, SubmissionResult};

use crate::time_fmt::{format_countdown, format_duration};

/// Labels for the `0..=4` answer scale.
pub const ANSWER_LABELS: [&str; 5] = [
    "Not at all",
    "A little bit",
    "Moderately",
    "Quite a bit",
    "Extremely",
];

#[must_use]
pub fn answer_scale() -> String {
    ANSWER_LABELS
        .iter()
        .enumerate()
        .map(|(value, label)| format!("{value}={label}"))
        .collect::<Vec<_>>()
        .join("  ")
}

#[must_use]
pub fn question_block(
    progress: SessionProgress,
    question: &Question,
    current: Option<AnswerValue>,
    remaining: Option<Duration>,
) -> String {
    let mut out = format!(
        "[{}/{}, {} answered",
        progress.current + 1,
        progress.total,
        progress.answered
    );
    if let Some(remaining) = remaining {
        let _ = write!(out, ", {} left", format_countdown(remaining));
    }
    let _ = write!(out, "]\n{}", question.text());
    if let Some(value) = current {
        let label = ANSWER_LABELS
            .get(usize::from(value.value()))
            .copied()
            .unwrap_or("?");
        let _ = write!(out, "\n(current answer: {} {label})", value.value());
    }
    out
}

/// Overall band for an average item score.
#[must_use]
pub fn score_band(average: f64) -> &'static str {
    if average < 1.5 {
        "within the healthy range"
    } else if average < 2.5 {
        "mild symptoms"
    } else if average < 3.5 {
        "moderate symptoms"
    } else {
        "severe symptoms"
    }
}

#[must_use]
pub fn result_summary(
    result: &SubmissionResult,
    profile: Option<&Profile>,
    duration: Option<Duration>,
) -> String {
    let mut out = String::from("Assessment result\n");
    if let Some(profile) = profile {
        let _ = writeln!(
            out,
            "  respondent: {} ({}, age {})",
            profile.nickname(),
            profile.gender().as_str(),
            profile.derived_age()
        );
    }
    if let Some(taken_at) = result.created_at() {
        let _ = writeln!(out, "  taken at: {taken_at}");
    }
    if let Some(duration) = duration {
        let _ = writeln!(out, "  duration: {}", format_duration(duration));
    }
    if let Some(total) = result.total_score() {
        let _ = writeln!(out, "  total score: {total}");
    }
    if let Some(average) = result.average_score() {
        let _ = writeln!(out, "  average score: {average:.2} ({})", score_band(average));
    }
    if let Some(positive) = result.positive_items() {
        let _ = writeln!(out, "  positive items: {positive}");
    }

    let factors = result.factor_scores();
    if !factors.is_empty() {
        out.push_str("  factors:\n");
        for (name, score) in factors {
            let flag = if score >= 2.0 { "  needs attention" } else { "" };
            let _ = writeln!(out, "    {name:<24} {score:.2}{flag}");
        }
    }
    out
}

#[must_use]
pub fn history_row(entry: &HistoryEntry) -> String {
    let average = entry
        .average_score
        .map_or_else(|| "-".to_owned(), |avg| format!("{avg:.2}"));
    format!(
        "#{:<6} {}  total {:>6}  average {}",
        entry.id, entry.created_at, entry.total_score, average
    )
}
