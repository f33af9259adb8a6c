use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Field name used for errors that are not tied to one input field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// `axum::Json`, but a body that cannot be read is a 400 validation error
/// instead of axum's plain-text rejection.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(rejection_to_error)?;
        Ok(JsonBody(value))
    }
}

pub fn rejection_to_error(rejection: JsonRejection) -> AppError {
    AppError::field(NON_FIELD_ERRORS, rejection.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, StatusCode},
        response::IntoResponse,
    };
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Body1 {
        #[allow(dead_code)]
        email: Option<String>,
    }

    async fn extract(content_type: Option<&str>, body: &'static str) -> Result<Body1, AppError> {
        let mut builder = axum::http::Request::builder().method("POST").uri("/");
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        let req = builder.body(Body::from(body)).unwrap();
        JsonBody::<Body1>::from_request(req, &()).await.map(|JsonBody(v)| v)
    }

    #[tokio::test]
    async fn well_formed_json_is_accepted() {
        assert!(extract(Some("application/json"), r#"{"email":"a@b.com"}"#)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn broken_json_is_a_bad_request() {
        let err = extract(Some("application/json"), "{not json").await.unwrap_err();
        assert!(matches!(&err, AppError::Validation(f) if f.contains(NON_FIELD_ERRORS)));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_content_type_is_a_bad_request() {
        let err = extract(None, r#"{"email":"a@b.com"}"#).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
