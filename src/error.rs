use std::collections::HashMap;

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::json;

use crate::journal::cooldown::format_timestamp;
use crate::journal::{AntiSpamViolation, JournalError};

#[derive(Debug)]
pub enum AppError {
    Validation(HashMap<String, String>),
    InvalidJson(String),
    Unauthorized,
    InvalidCredentials,
    NotFound,
    Journal(JournalError),
    Database(sqlx::Error),
    Session(tower_sessions::session::Error),
}

fn error_body(status: StatusCode, message: &str, code: &str) -> Response {
    (status, Json(json!({ "error": message, "code": code }))).into_response()
}

fn internal_error() -> Response {
    error_body(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", "INTERNAL_ERROR")
}

fn anti_spam_response(violation: AntiSpamViolation) -> Response {
    let now = Utc::now();
    let retry_in_minutes = violation.minutes_until_retry(now);
    let remaining_ms = (violation.retry_after - now).num_milliseconds().max(0);
    let retry_in_seconds = (remaining_ms + 999) / 1000;

    let body = json!({
        "error": violation.message,
        "code": "ANTI_SPAM_VIOLATION",
        "retry_after": format_timestamp(violation.retry_after),
        "retry_in_minutes": retry_in_minutes,
        "details": {
            "current_entry_created_at": format_timestamp(violation.current_entry_created_at),
        },
    });

    let mut response = (StatusCode::CONFLICT, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_in_seconds));
    response
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(details) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "Validation failed",
                    "code": "VALIDATION_ERROR",
                    "details": details,
                })),
            )
                .into_response(),
            AppError::InvalidJson(reason) => {
                tracing::debug!("Rejected request body: {reason}");
                error_body(StatusCode::BAD_REQUEST, "Invalid JSON", "INVALID_JSON")
            }
            AppError::Unauthorized => error_body(StatusCode::UNAUTHORIZED, "Unauthorized", "UNAUTHORIZED"),
            AppError::InvalidCredentials => {
                error_body(StatusCode::UNAUTHORIZED, "Invalid invite code", "INVALID_CREDENTIALS")
            }
            AppError::NotFound | AppError::Journal(JournalError::NotFound) => {
                error_body(StatusCode::NOT_FOUND, "Entry not found", "NOT_FOUND")
            }
            AppError::Journal(JournalError::AntiSpam(violation)) => anti_spam_response(violation),
            AppError::Journal(e) => {
                tracing::error!("Journal error: {e}");
                internal_error()
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                internal_error()
            }
            AppError::Session(e) => {
                tracing::error!("Session error: {e}");
                internal_error()
            }
        }
    }
}

impl From<JournalError> for AppError {
    fn from(e: JournalError) -> Self {
        AppError::Journal(e)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(e: tower_sessions::session::Error) -> Self {
        AppError::Session(e)
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::InvalidJson(rejection.body_text())
    }
}
