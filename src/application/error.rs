use std::error::Error as StdError;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{
    application::content::{ContentError, LookupError},
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// Handler-level error: a public message for the client plus an internal
/// report picked up by the response logging middleware.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = error_body(self.status, self.public_message);
        self.report.attach(&mut response);
        response
    }
}

impl From<LookupError> for HttpError {
    fn from(error: LookupError) -> Self {
        HttpError::from_error(
            "infra::http::lookup_error_to_http_error",
            StatusCode::NOT_FOUND,
            "Post not found",
            &error,
        )
    }
}

impl From<ContentError> for HttpError {
    fn from(error: ContentError) -> Self {
        let status = match &error {
            ContentError::Source(_) => StatusCode::SERVICE_UNAVAILABLE,
            ContentError::Parse { .. } | ContentError::DuplicateId { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        };
        HttpError::from_error(
            "infra::http::content_error_to_http_error",
            status,
            "Content could not be loaded",
            &error,
        )
    }
}

/// Process-level failure reported by the binary before it exits.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
