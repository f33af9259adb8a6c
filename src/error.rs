//! Request-boundary errors.
//!
//! Every failure a handler can produce is an [`AppError`]; its
//! `IntoResponse` impl turns it into a JSON body of the form
//! `{"code": "...", "message": "...", "fields": {...}}`.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::{auth::jwt::AuthError, users::repo::StoreError};

/// Field name to messages, in the same shape the clients already parse.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[cfg(test)]
    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0:?}")]
    Validation(FieldErrors),

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("User account is disabled.")]
    AccountDisabled,

    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation(FieldErrors::single(field, message))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(fields) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "VALIDATION_ERROR",
                    message: "Invalid input.".into(),
                    fields: Some(fields),
                },
            ),
            AppError::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "INVALID_CREDENTIALS",
                    message: AppError::InvalidCredentials.to_string(),
                    fields: None,
                },
            ),
            AppError::AccountDisabled => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    code: "ACCOUNT_DISABLED",
                    message: AppError::AccountDisabled.to_string(),
                    fields: None,
                },
            ),
            AppError::Unauthorized(e) => (
                StatusCode::UNAUTHORIZED,
                ErrorBody {
                    code: "UNAUTHORIZED",
                    message: e.to_string(),
                    fields: None,
                },
            ),
            AppError::Internal(e) => {
                // Details stay in the logs.
                error!(error = ?e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        code: "INTERNAL_ERROR",
                        message: "Internal server error".into(),
                        fields: None,
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(field) => {
                AppError::field(field, format!("user with this {field} already exists."))
            }
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_error_is_field_keyed() {
        let mut fields = FieldErrors::new();
        fields.add("password", "Ensure this field has at least 8 characters.");
        fields.add("email", "This field is required.");

        let (status, json) = body_json(AppError::Validation(fields)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "VALIDATION_ERROR");
        assert_eq!(json["fields"]["email"][0], "This field is required.");
        assert_eq!(
            json["fields"]["password"][0],
            "Ensure this field has at least 8 characters."
        );
    }

    #[tokio::test]
    async fn credential_errors_map_to_bad_request() {
        let (status, json) = body_json(AppError::InvalidCredentials).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "Invalid email or password");
        assert!(json.get("fields").is_none());

        let (status, json) = body_json(AppError::AccountDisabled).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["message"], "User account is disabled.");
    }

    #[tokio::test]
    async fn unauthorized_and_internal_statuses() {
        let (status, json) = body_json(AppError::Unauthorized(AuthError::Expired)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["code"], "UNAUTHORIZED");

        let (status, json) = body_json(AppError::Internal(anyhow::anyhow!("db down"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["message"], "Internal server error");
    }

    #[test]
    fn duplicate_store_error_names_the_field() {
        match AppError::from(StoreError::Duplicate("username")) {
            AppError::Validation(fields) => {
                assert_eq!(
                    fields.messages("username"),
                    ["user with this username already exists.".to_string()]
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
