#![forbid(unsafe_code)]

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use crm_storage::store::StorageError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("unauthenticated")]
    Unauthenticated,

    #[error("not found")]
    NotFound,

    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },

    #[error("conflict: {0}")]
    Conflict(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterErrorBody {
    pub status: &'static str,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl AdapterError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Invalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> AdapterErrorBody {
        let (reason, field) = match self {
            Self::Unauthenticated => ("unauthenticated".to_string(), None),
            Self::NotFound => ("not found".to_string(), None),
            Self::Invalid { field, reason } => (reason.clone(), Some(field.clone())),
            Self::Conflict(reason) => ((*reason).to_string(), None),
            Self::Internal(_) => ("internal error".to_string(), None),
        };
        AdapterErrorBody {
            status: "error",
            reason,
            field,
        }
    }

    pub(crate) fn lock_poisoned() -> Self {
        Self::Internal("adapter store lock poisoned".to_string())
    }
}

impl From<StorageError> for AdapterError {
    fn from(err: StorageError) -> Self {
        match err {
            // Absent and cross-tenant rows share one answer.
            StorageError::NotFound { .. } => Self::NotFound,
            StorageError::ForeignKeyViolation { .. } => Self::Invalid {
                field: "contact_field_type_id".to_string(),
                reason: "unknown field type".to_string(),
            },
            StorageError::DuplicateKey { table, .. } if table.starts_with("contact_field_types") => {
                Self::Conflict("field type name already exists")
            }
            StorageError::DuplicateKey { .. } => Self::Conflict("already exists"),
            StorageError::InUse { .. } => Self::Conflict("field type is in use"),
            StorageError::ContractViolation(cv) => Self::Invalid {
                field: cv.field().to_string(),
                reason: cv.reason().to_string(),
            },
        }
    }
}

impl IntoResponse for AdapterError {
    fn into_response(self) -> Response {
        if let Self::Internal(detail) = &self {
            tracing::error!(detail = detail.as_str(), "adapter request failed");
        }
        (self.status_code(), Json(self.body())).into_response()
    }
}
