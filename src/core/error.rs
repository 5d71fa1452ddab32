//! Typed errors raised by the record lifecycle engine
//!
//! Every expected failure of a record operation is one variant of
//! [`RecordError`]. Callers (the HTTP layer in particular) match on the
//! variant instead of inspecting messages:
//!
//! ```rust,ignore
//! match user.save().await {
//!     Ok(()) => render(user.render(None)),
//!     Err(RecordError::Invalid { errors, .. }) => bad_request(errors.full_messages()),
//!     Err(RecordError::NotFound { .. }) => not_found(),
//!     Err(e) => return Err(e),
//! }
//! ```
//!
//! `Store` and `Hook` wrap unexpected collaborator failures. They are fatal:
//! the engine never recovers from them and never folds them into `Errors`.

use crate::core::errors::Errors;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::Value;

/// Errors produced by [`Record`](crate::core::record::Record) and
/// [`Model`](crate::core::model::Model) operations
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    /// Validation failed, or a uniqueness conflict was translated into a
    /// validation message
    #[error("{}", .errors.short_message())]
    Invalid { entity: String, errors: Errors },

    /// The identity or query matched no stored row
    #[error("could not find {entity} with query={query}")]
    NotFound { entity: String, query: Value },

    /// A create-only entity was saved again without overriding protection
    #[error("`{entity}' cannot be altered after creation")]
    ReadOnly { entity: String },

    /// Raw unique-index conflict reported by the store
    #[error("{index} must be unique")]
    DuplicateKey { index: String },

    /// Backend or connectivity failure from the store
    #[error("store failure: {0}")]
    Store(#[source] anyhow::Error),

    /// An external collaborator invoked by a hook failed
    #[error("hook failure: {0}")]
    Hook(#[source] anyhow::Error),
}

/// Body of an error response: `{"errors": [{"type": ..., "messages": [...]}]}`
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub errors: Vec<ErrorEntry>,
}

/// One error entry of an [`ErrorResponse`]
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ErrorEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
    pub messages: Vec<String>,
}

impl RecordError {
    /// Build an `Invalid` error carrying a single message
    pub fn invalid(
        entity: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut errors = Errors::new();
        errors.add(field, message);
        RecordError::Invalid {
            entity: entity.into(),
            errors,
        }
    }

    /// Build a `NotFound` error for a lookup by identity
    pub fn not_found_by_id(entity: impl Into<String>, id: &str) -> Self {
        RecordError::NotFound {
            entity: entity.into(),
            query: serde_json::json!({ "_id": id }),
        }
    }

    /// The accumulated validation errors, for `Invalid`
    pub fn errors(&self) -> Option<&Errors> {
        match self {
            RecordError::Invalid { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// Flattened messages, for `Invalid`; the display string otherwise
    pub fn full_messages(&self) -> Vec<String> {
        match self {
            RecordError::Invalid { errors, .. } => errors.full_messages(),
            other => vec![other.to_string()],
        }
    }

    /// True for the fatal pass-through variants
    pub fn is_fatal(&self) -> bool {
        matches!(self, RecordError::Store(_) | RecordError::Hook(_))
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RecordError::Invalid { .. } => StatusCode::BAD_REQUEST,
            RecordError::NotFound { .. } => StatusCode::NOT_FOUND,
            RecordError::ReadOnly { .. } => StatusCode::BAD_REQUEST,
            RecordError::DuplicateKey { .. } => StatusCode::CONFLICT,
            RecordError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RecordError::Hook(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            RecordError::Invalid { .. } => "RECORD_INVALID",
            RecordError::NotFound { .. } => "RECORD_NOT_FOUND",
            RecordError::ReadOnly { .. } => "RECORD_IS_READ_ONLY",
            RecordError::DuplicateKey { .. } => "DUPLICATE_KEY",
            RecordError::Store(_) => "STORE_ERROR",
            RecordError::Hook(_) => "HOOK_ERROR",
        }
    }

    /// Kind name used as the `type` of a response entry
    pub fn kind(&self) -> &'static str {
        match self {
            RecordError::Invalid { .. } => "RecordInvalid",
            RecordError::NotFound { .. } => "RecordNotFound",
            RecordError::ReadOnly { .. } => "RecordIsReadOnly",
            RecordError::DuplicateKey { .. } => "DuplicateKey",
            RecordError::Store(_) | RecordError::Hook(_) => "Error",
        }
    }

    /// Convert to an error response body
    pub fn to_response(&self) -> ErrorResponse {
        let messages = if self.is_fatal() {
            vec!["internal error".to_string()]
        } else {
            self.full_messages()
        };

        ErrorResponse {
            errors: vec![ErrorEntry {
                kind: self.kind().to_string(),
                code: self.error_code().to_string(),
                messages,
            }],
        }
    }
}

impl IntoResponse for RecordError {
    fn into_response(self) -> Response {
        if self.is_fatal() {
            tracing::error!(error = %self, "fatal record error");
        }
        let status = self.status_code();
        let body = Json(self.to_response());
        (status, body).into_response()
    }
}

/// A specialized Result type for record operations
pub type RecordResult<T> = Result<T, RecordError>;
