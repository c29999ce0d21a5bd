use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::errors::SessionError;
use crate::schemas::attempt::{AttemptResult, AttemptStatusUpdate, StartedAttempt, SubmitResponses};
use crate::schemas::quiz::Quiz;
use crate::schemas::roster::{RosterEntry, RosterPayload};
use crate::schemas::{AttemptId, QuizId, SubjectId};

/// Error code the backend sets when a student has used every attempt.
pub const ATTEMPTS_EXHAUSTED_CODE: &str = "attempts_exhausted";

#[derive(Debug, Error)]
pub enum QuizApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend responded with status {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("attempts exhausted: {detail}")]
    AttemptsExhausted { detail: String },
    #[error("not found: {detail}")]
    NotFound { detail: String },
    #[error("unexpected response body (status {status}): {detail}")]
    Decode { status: u16, detail: String },
}

/// The backend operations the session engine depends on.
#[async_trait]
pub trait QuizApi: Send + Sync {
    async fn roster(&self) -> Result<Vec<RosterEntry>, QuizApiError>;

    async fn quiz(&self, quiz_id: QuizId) -> Result<Quiz, QuizApiError>;

    async fn start_attempt(
        &self,
        subject_id: SubjectId,
        quiz_id: QuizId,
    ) -> Result<StartedAttempt, QuizApiError>;

    async fn submit_responses(
        &self,
        attempt_id: AttemptId,
        payload: &SubmitResponses,
    ) -> Result<(), QuizApiError>;

    async fn complete_attempt(&self, attempt_id: AttemptId) -> Result<(), QuizApiError>;

    async fn attempt_result(&self, attempt_id: AttemptId) -> Result<AttemptResult, QuizApiError>;
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    detail: Option<Value>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpQuizApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpQuizApi {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, QuizApiError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;

        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), token })
    }

    pub(crate) fn from_settings(settings: &crate::core::config::Settings) -> anyhow::Result<Self> {
        let api = settings.api();
        Self::new(
            &api.base_url,
            api.token.clone(),
            Duration::from_secs(api.request_timeout_seconds),
            Duration::from_secs(api.connect_timeout_seconds),
        )
        .map_err(|err| anyhow::anyhow!(err).context("Failed to build quiz API HTTP client"))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, QuizApiError> {
        let response = builder.send().await?;
        let (status, raw_body) = read_checked(response).await?;
        serde_json::from_str::<T>(&raw_body).map_err(|err| QuizApiError::Decode {
            status: status.as_u16(),
            detail: format!("{err}: {raw_body}"),
        })
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<(), QuizApiError> {
        let response = builder.send().await?;
        read_checked(response).await.map(|_| ())
    }
}

#[async_trait]
impl QuizApi for HttpQuizApi {
    async fn roster(&self) -> Result<Vec<RosterEntry>, QuizApiError> {
        let payload: RosterPayload =
            self.send_json(self.request(Method::GET, "/student/quizzes")).await?;
        Ok(payload.into_entries())
    }

    async fn quiz(&self, quiz_id: QuizId) -> Result<Quiz, QuizApiError> {
        self.send_json(self.request(Method::GET, &format!("/quiz/{quiz_id}"))).await
    }

    async fn start_attempt(
        &self,
        subject_id: SubjectId,
        quiz_id: QuizId,
    ) -> Result<StartedAttempt, QuizApiError> {
        let path = format!("/student/subjects/{subject_id}/quizzes/{quiz_id}/start");
        self.send_json(self.request(Method::POST, &path)).await
    }

    async fn submit_responses(
        &self,
        attempt_id: AttemptId,
        payload: &SubmitResponses,
    ) -> Result<(), QuizApiError> {
        let path = format!("/student/attempt/{attempt_id}/submit");
        self.send_empty(self.request(Method::POST, &path).json(payload)).await
    }

    async fn complete_attempt(&self, attempt_id: AttemptId) -> Result<(), QuizApiError> {
        let path = format!("/student/attempt/{attempt_id}");
        self.send_empty(self.request(Method::PUT, &path).json(&AttemptStatusUpdate::completed()))
            .await
    }

    async fn attempt_result(&self, attempt_id: AttemptId) -> Result<AttemptResult, QuizApiError> {
        let path = format!("/student/attempt/{attempt_id}/responses");
        self.send_json(self.request(Method::GET, &path)).await
    }
}

/// Runs one backend call under the session's request timeout.
pub(crate) async fn bounded<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, QuizApiError>>,
) -> Result<T, SessionError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(SessionError::from),
        Err(_) => Err(SessionError::Timeout),
    }
}

async fn read_checked(response: Response) -> Result<(StatusCode, String), QuizApiError> {
    let status = response.status();
    let raw_body = response.text().await?;
    if status.is_success() {
        return Ok((status, raw_body));
    }
    Err(classify_failure(status, &raw_body))
}

fn classify_failure(status: StatusCode, raw_body: &str) -> QuizApiError {
    let body = serde_json::from_str::<ErrorBody>(raw_body).unwrap_or_default();
    let detail = extract_error_message(&body).unwrap_or_else(|| {
        let trimmed = raw_body.trim();
        if trimmed.is_empty() {
            status.canonical_reason().unwrap_or("unknown_error").to_string()
        } else {
            trimmed.to_string()
        }
    });

    if body.code.as_deref() == Some(ATTEMPTS_EXHAUSTED_CODE) {
        return QuizApiError::AttemptsExhausted { detail };
    }
    if status == StatusCode::NOT_FOUND {
        return QuizApiError::NotFound { detail };
    }
    QuizApiError::Status { status: status.as_u16(), detail }
}

fn extract_error_message(body: &ErrorBody) -> Option<String> {
    if let Some(detail) = &body.detail {
        if let Some(text) = detail.as_str() {
            return Some(text.to_string());
        }
        if let Some(items) = detail.as_array() {
            let joined = items
                .iter()
                .filter_map(|item| {
                    item.get("msg")
                        .and_then(Value::as_str)
                        .or_else(|| item.get("message").and_then(Value::as_str))
                })
                .collect::<Vec<_>>()
                .join("; ");
            if !joined.is_empty() {
                return Some(joined);
            }
        }
    }

    body.message.clone().or_else(|| body.error.clone())
}
