use std::sync::Arc;

use tracing::{info, warn};

use assess_core::model::QuestionCatalog;

use crate::api::QuestionSource;
use crate::error::CatalogLoadError;

/// Fetches the question list once per session start and validates it.
#[derive(Clone)]
pub struct CatalogLoader {
    source: Arc<dyn QuestionSource>,
}

impl CatalogLoader {
    #[must_use]
    pub fn new(source: Arc<dyn QuestionSource>) -> Self {
        Self { source }
    }

    /// # Errors
    ///
    /// Returns `CatalogLoadError::Api` when the service cannot be reached or
    /// rejects the request, and `CatalogLoadError::Catalog` when the list is
    /// empty or repeats an id.
    pub async fn load(&self) -> Result<QuestionCatalog, CatalogLoadError> {
        let questions = self
            .source
            .fetch_questions()
            .await
            .inspect_err(|err| warn!(error = %err, "failed to load question catalog"))?;
        let catalog = QuestionCatalog::new(questions)?;
        info!(questions = catalog.len(), "question catalog loaded");
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use assess_core::model::{CatalogError, Question, QuestionId};
    use async_trait::async_trait;

    struct FixedSource(Vec<Question>);

    #[async_trait]
    impl QuestionSource for FixedSource {
        async fn fetch_questions(&self) -> Result<Vec<Question>, ApiError> {
            Ok(self.0.clone())
        }
    }

    struct Rejecting;

    #[async_trait]
    impl QuestionSource for Rejecting {
        async fn fetch_questions(&self) -> Result<Vec<Question>, ApiError> {
            Err(ApiError::Application {
                code: 500,
                message: "down".into(),
            })
        }
    }

    #[tokio::test]
    async fn load_orders_questions() {
        let loader = CatalogLoader::new(Arc::new(FixedSource(vec![
            Question::new(QuestionId::from(2), 2, "second"),
            Question::new(QuestionId::from(1), 1, "first"),
        ])));
        let catalog = loader.load().await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(0).unwrap().text(), "first");
    }

    #[tokio::test]
    async fn empty_catalog_is_rejected() {
        let loader = CatalogLoader::new(Arc::new(FixedSource(Vec::new())));
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, CatalogLoadError::Catalog(CatalogError::Empty)));
    }

    #[tokio::test]
    async fn service_errors_propagate() {
        let loader = CatalogLoader::new(Arc::new(Rejecting));
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, CatalogLoadError::Api(ApiError::Application { code: 500, .. })));
    }
}
