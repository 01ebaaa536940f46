//! JSON shapes exchanged with the assessment service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use assess_core::model::{AnswerSheet, ClientId, Question, QuestionId, RecordId};

/// Application-level success code carried inside every response envelope.
pub const SUCCESS_CODE: i64 = 200;

/// `{code, data, msg}` wrapper around every response body.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub code: i64,
    pub data: Option<T>,
    pub msg: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireQuestion {
    pub id: QuestionId,
    pub text: String,
    #[serde(default)]
    pub order: Option<u32>,
}

impl WireQuestion {
    /// Position in the response doubles as the order when the service omits it.
    pub fn into_question(self, position: usize) -> Question {
        let order = self
            .order
            .unwrap_or_else(|| u32::try_from(position).unwrap_or(u32::MAX));
        Question::new(self.id, order, self.text)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitRequest<'a> {
    pub answers: &'a AnswerSheet,
    pub uuid: &'a str,
}

impl<'a> SubmitRequest<'a> {
    pub fn new(answers: &'a AnswerSheet, client_id: &'a ClientId) -> Self {
        Self {
            answers,
            uuid: client_id.as_str(),
        }
    }
}

/// Scoring result returned by a successful submission.
///
/// The payload is kept verbatim so every field the service reports stays
/// available; accessors cover the fields shown after completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionResult(Value);

impl SubmissionResult {
    #[must_use]
    pub fn new(raw: Value) -> Self {
        Self(raw)
    }

    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.0
    }

    #[must_use]
    pub fn total_score(&self) -> Option<f64> {
        self.0.get("total_score").and_then(Value::as_f64)
    }

    #[must_use]
    pub fn average_score(&self) -> Option<f64> {
        self.0.get("average_score").and_then(Value::as_f64)
    }

    #[must_use]
    pub fn positive_items(&self) -> Option<u64> {
        self.0.get("positive_items_count").and_then(Value::as_u64)
    }

    #[must_use]
    pub fn created_at(&self) -> Option<&str> {
        self.0.get("created_at").and_then(Value::as_str)
    }

    /// Per-factor averages keyed by factor name, when reported.
    #[must_use]
    pub fn factor_scores(&self) -> BTreeMap<String, f64> {
        self.0
            .get("factor_results")
            .and_then(Value::as_object)
            .map(|factors| {
                factors
                    .iter()
                    .filter_map(|(key, factor)| {
                        let name = factor
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or(key)
                            .to_owned();
                        factor.get("score").and_then(Value::as_f64).map(|s| (name, s))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One previous submission as listed by the history endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HistoryEntry {
    pub id: RecordId,
    pub created_at: String,
    pub total_score: f64,
    #[serde(default)]
    pub average_score: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_without_data_decodes() {
        let envelope: Envelope<Vec<WireQuestion>> =
            serde_json::from_value(json!({ "code": 404, "msg": "missing" })).unwrap();
        assert_eq!(envelope.code, 404);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.msg.as_deref(), Some("missing"));
    }

    #[test]
    fn wire_question_falls_back_to_position() {
        let wire: WireQuestion =
            serde_json::from_value(json!({ "id": 7, "text": "Headaches", "category": "x" }))
                .unwrap();
        let question = wire.into_question(3);
        assert_eq!(question.id().as_str(), "7");
        assert_eq!(question.order(), 3);
    }

    #[test]
    fn submission_result_exposes_scores() {
        let result = SubmissionResult::new(json!({
            "total_score": 180,
            "average_score": 2.0,
            "positive_items_count": 42,
            "factor_results": {
                "anxiety": { "name": "Anxiety", "score": 1.5, "raw_score": 15 }
            }
        }));
        assert_eq!(result.total_score(), Some(180.0));
        assert_eq!(result.average_score(), Some(2.0));
        assert_eq!(result.positive_items(), Some(42));
        assert_eq!(result.factor_scores().get("Anxiety"), Some(&1.5));
        assert!(result.created_at().is_none());
    }

    #[test]
    fn history_entry_accepts_integer_scores() {
        let entry: HistoryEntry = serde_json::from_value(json!({
            "id": 12,
            "created_at": "2024-05-01 10:00:00",
            "total_score": 150
        }))
        .unwrap();
        assert_eq!(entry.id, RecordId::new(12));
        assert_eq!(entry.total_score, 150.0);
        assert!(entry.average_score.is_none());
    }
}
