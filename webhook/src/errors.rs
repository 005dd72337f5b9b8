use http::{Method, StatusCode};
use thiserror::Error;

/// Errors that can occur while serving webhook requests
///
/// Failures of the external config source are not represented here: they are
/// [`crate::source::SourceError`]s and always degrade to the in-repo fallback.
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("rejected request due to invalid method: {0}")]
    MethodNotAllowed(Method),

    #[error("I am a teapot")]
    Teapot,

    #[error("error while reading body of request: {0}")]
    RequestBodyError(String),

    #[error("error while parsing request payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    #[error("failed to wrap config in JSON: {0}")]
    ResponseSerializationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] shared::tls::TlsError),

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),
}

impl WebhookError {
    /// Status code reported to the caller for this error
    pub fn status(&self) -> StatusCode {
        match self {
            WebhookError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            WebhookError::Teapot => StatusCode::IM_A_TEAPOT,
            WebhookError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            WebhookError::RequestBodyError(_)
            | WebhookError::ResponseSerializationError(_)
            | WebhookError::Io(_)
            | WebhookError::Tls(_)
            | WebhookError::HttpClientError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
