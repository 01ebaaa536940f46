//! HTTP client for the remote assessment service.

mod wire;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use assess_core::model::{AnswerSheet, ClientId, Question, RecordId};

use crate::config::ApiConfig;
use crate::error::ApiError;
use wire::{Envelope, SubmitRequest, WireQuestion};

pub use wire::{HistoryEntry, SUCCESS_CODE, SubmissionResult};

/// Header carrying the client identity on every request.
pub const IDENTITY_HEADER: &str = "X-User-UUID";

const QUESTIONS_PATH: &str = "api/scl90/questions";
const SUBMIT_PATH: &str = "api/scl90/submit";
const HISTORY_PATH: &str = "api/scl90/history";
const DETAIL_PATH: &str = "api/scl90/detail/";

/// Supplies the ordered question list.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError` on transport, status or decoding failures.
    async fn fetch_questions(&self) -> Result<Vec<Question>, ApiError>;
}

/// Scores a completed answer sheet.
#[async_trait]
pub trait ScoringBackend: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError` on transport, status or decoding failures.
    async fn submit(
        &self,
        answers: &AnswerSheet,
        client_id: &ClientId,
    ) -> Result<SubmissionResult, ApiError>;
}

/// Past submissions recorded for this client.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// # Errors
    ///
    /// Returns `ApiError` on transport, status or decoding failures.
    async fn list_history(&self) -> Result<Vec<HistoryEntry>, ApiError>;

    /// # Errors
    ///
    /// Returns `ApiError::Application` when the record does not exist.
    async fn history_detail(&self, id: RecordId) -> Result<SubmissionResult, ApiError>;
}

/// reqwest-backed implementation of every service trait.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    client_id: ClientId,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns `ApiError::Network` if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig, client_id: ClientId) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            client_id,
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    fn with_identity(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(IDENTITY_HEADER, self.client_id.as_str())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        debug!(endpoint, "sending request");
        let response = self
            .with_identity(request)
            .send()
            .await
            .inspect_err(|err| warn!(endpoint, error = %err, "request failed"))?;
        decode(response)
            .await
            .inspect_err(|err| warn!(endpoint, error = %err, "request rejected"))
    }
}

/// Unwraps the `{code, data, msg}` envelope.
///
/// A non-2xx status or a code other than [`SUCCESS_CODE`] becomes
/// `ApiError::Application`, carrying the envelope message when there is one.
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.bytes().await?;

    let envelope = match serde_json::from_slice::<Envelope<Value>>(&body) {
        Ok(envelope) => envelope,
        Err(err) if status.is_success() => return Err(ApiError::Decode(err)),
        Err(_) => {
            return Err(ApiError::Application {
                code: i64::from(status.as_u16()),
                message: format!("HTTP Error: {}", status.as_u16()),
            });
        }
    };

    let message = envelope.msg.filter(|msg| !msg.trim().is_empty());
    if !status.is_success() {
        return Err(ApiError::Application {
            code: i64::from(status.as_u16()),
            message: message.unwrap_or_else(|| format!("HTTP Error: {}", status.as_u16())),
        });
    }
    if envelope.code != SUCCESS_CODE {
        return Err(ApiError::Application {
            code: envelope.code,
            message: message.unwrap_or_default(),
        });
    }

    match envelope.data {
        Some(Value::Null) | None => Err(ApiError::MissingData),
        Some(data) => Ok(serde_json::from_value(data)?),
    }
}

#[async_trait]
impl QuestionSource for ApiClient {
    async fn fetch_questions(&self) -> Result<Vec<Question>, ApiError> {
        let url = self.endpoint(QUESTIONS_PATH)?;
        let wire: Vec<WireQuestion> = self.send("questions", self.http.get(url)).await?;
        Ok(wire
            .into_iter()
            .enumerate()
            .map(|(position, question)| question.into_question(position))
            .collect())
    }
}

#[async_trait]
impl ScoringBackend for ApiClient {
    async fn submit(
        &self,
        answers: &AnswerSheet,
        client_id: &ClientId,
    ) -> Result<SubmissionResult, ApiError> {
        let url = self.endpoint(SUBMIT_PATH)?;
        let body = SubmitRequest::new(answers, client_id);
        self.send("submit", self.http.post(url).json(&body)).await
    }
}

#[async_trait]
impl HistorySource for ApiClient {
    async fn list_history(&self) -> Result<Vec<HistoryEntry>, ApiError> {
        let url = self.endpoint(HISTORY_PATH)?;
        self.send("history", self.http.get(url)).await
    }

    async fn history_detail(&self, id: RecordId) -> Result<SubmissionResult, ApiError> {
        let url = self.endpoint(&format!("{DETAIL_PATH}{id}"))?;
        self.send("detail", self.http.get(url)).await
    }
}
