use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

/// Field-level detail attached to validation failures.
#[derive(Clone, Debug, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Every operation fails with exactly one of these kinds. Driver-level
/// errors never reach the client; they collapse into `Database` and come
/// out as a bare internal-error message.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<FieldError>,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InsufficientStock(String),
    #[error("{0}")]
    PrescriptionRequired(String),
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            errors: vec![],
        }
    }

    pub fn validation_fields(message: impl Into<String>, errors: Vec<FieldError>) -> Self {
        Self::Validation {
            message: message.into(),
            errors,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            // Distinguishable from plain validation via the error code so a
            // client can prompt for a prescription or show stock levels.
            Self::InsufficientStock(_) | Self::PrescriptionRequired(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::PrescriptionRequired(_) => "prescription_required",
            Self::Database(_) | Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Never leak driver error shapes to the caller.
            ApiError::Database(err) => {
                tracing::error!(error = %err, "database error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        let errors = match &self {
            ApiError::Validation { errors, .. } => errors.clone(),
            _ => vec![],
        };

        let code = self.code();
        let body = Json(json!({
            "success": false,
            "message": message.clone(),
            "code": code,
            "errors": errors,
        }));

        let mut response = (status, body).into_response();
        response.extensions_mut().insert(ErrorSummary { code, message });
        response
    }
}

/// Attached to failed responses so the logging middleware can record what
/// went wrong without re-parsing the body.
#[derive(Clone, Debug)]
pub struct ErrorSummary {
    pub code: &'static str,
    pub message: String,
}

impl From<ValidationErrors> for ApiError {
    fn from(errs: ValidationErrors) -> Self {
        let errors = errs
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| FieldError {
                    field: field.to_string(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field)),
                })
            })
            .collect();
        ApiError::validation_fields("Validation failed", errors)
    }
}

/// Success envelope: `{success: true, message, data}`.
pub fn ok_response<T: Serialize>(message: &str, data: T) -> Json<serde_json::Value> {
    Json(json!({
        "success": true,
        "message": message,
        "data": data,
    }))
}
