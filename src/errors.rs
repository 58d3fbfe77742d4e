use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDate;

use crate::models::{BookingStatus, FieldError, Slot};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid input: {}", field_list(.0))]
    Validation(Vec<FieldError>),

    #[error("the {slot} slot on {date} was already taken, please choose another time")]
    SlotConflict { date: NaiveDate, slot: Slot },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cannot change status from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("a {0} booking cannot be moved")]
    NotMovable(BookingStatus),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("persistence error: {0}")]
    Persistence(#[from] anyhow::Error),

    #[error("unauthorized")]
    Unauthorized,
}

impl AppError {
    pub fn field(field: &'static str, message: &'static str) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn booking_not_found(id: &str) -> Self {
        AppError::NotFound(format!("booking {id}"))
    }
}

fn field_list(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.field)
        .collect::<Vec<_>>()
        .join(", ")
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::SlotConflict { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::NotMovable(_) => StatusCode::CONFLICT,
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = match &self {
            AppError::Validation(fields) => serde_json::json!({
                "error": self.to_string(),
                "fields": fields,
            }),
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (status, axum::Json(body)).into_response()
    }
}
