use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use crate::model::ids::QuestionId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("question catalog is empty")]
    Empty,

    #[error("duplicate question id in catalog: {0}")]
    DuplicateId(QuestionId),
}

/// A single questionnaire item as delivered by the catalog service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    order: u32,
    text: String,
}

impl Question {
    #[must_use]
    pub fn new(id: QuestionId, order: u32, text: impl Into<String>) -> Self {
        Self {
            id,
            order,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Immutable, ordered list of questions for one application load.
///
/// Cloning is cheap; the questions are shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionCatalog {
    questions: Arc<[Question]>,
}

impl QuestionCatalog {
    /// Build a catalog, ordering questions by their `order` field (stable for ties).
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Empty` if no questions are given and
    /// `CatalogError::DuplicateId` if two questions share an id.
    pub fn new(mut questions: Vec<Question>) -> Result<Self, CatalogError> {
        if questions.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !seen.insert(question.id.clone()) {
                return Err(CatalogError::DuplicateId(question.id.clone()));
            }
        }

        questions.sort_by_key(Question::order);
        Ok(Self {
            questions: questions.into(),
        })
    }

    /// Number of questions (N). Always at least one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_sorts_by_order() {
        let catalog = QuestionCatalog::new(vec![
            Question::new(QuestionId::from(2), 1, "second"),
            Question::new(QuestionId::from(1), 0, "first"),
        ])
        .unwrap();

        let texts: Vec<&str> = catalog.iter().map(Question::text).collect();
        assert_eq!(texts, vec!["first", "second"]);
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn empty_catalog_is_rejected() {
        assert_eq!(QuestionCatalog::new(Vec::new()), Err(CatalogError::Empty));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = QuestionCatalog::new(vec![
            Question::new(QuestionId::from(1), 0, "a"),
            Question::new(QuestionId::from(1), 1, "b"),
        ])
        .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateId(QuestionId::from(1)));
    }
}
