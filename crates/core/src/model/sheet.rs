use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::model::answer::AnswerValue;
use crate::model::ids::QuestionId;
use crate::model::question::QuestionCatalog;
use crate::model::session::ValidationError;

/// Complete answer map for submission, keyed by question id in catalog order.
///
/// Unanswered questions stay `None` and serialize as `null`; the server decides
/// how to treat them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSheet {
    entries: Vec<(QuestionId, Option<AnswerValue>)>,
}

impl AnswerSheet {
    /// Pair each catalog question with the answer at the same index.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::CatalogMismatch` if the lengths differ.
    pub fn from_catalog(
        catalog: &QuestionCatalog,
        answers: &[Option<AnswerValue>],
    ) -> Result<Self, ValidationError> {
        if catalog.len() != answers.len() {
            return Err(ValidationError::CatalogMismatch {
                expected: answers.len(),
                found: catalog.len(),
            });
        }

        let entries = catalog
            .iter()
            .zip(answers)
            .map(|(question, answer)| (question.id().clone(), *answer))
            .collect();
        Ok(Self { entries })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that carry a value.
    #[must_use]
    pub fn answered(&self) -> usize {
        self.entries.iter().filter(|(_, a)| a.is_some()).count()
    }

    /// `None` if the id is unknown, `Some(None)` if known but unanswered.
    #[must_use]
    pub fn get(&self, id: &QuestionId) -> Option<Option<AnswerValue>> {
        self.entries
            .iter()
            .find(|(qid, _)| qid == id)
            .map(|(_, answer)| *answer)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, Option<AnswerValue>)> {
        self.entries.iter().map(|(id, answer)| (id, *answer))
    }
}

impl Serialize for AnswerSheet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, answer) in &self.entries {
            map.serialize_entry(id, answer)?;
        }
        map.end()
    }
}
