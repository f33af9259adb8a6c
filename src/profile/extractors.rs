use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form, Json,
};

use super::{
    dto::{JsonProfileBody, ProfileUpdate},
    patch::Patch,
};
use crate::{
    error::AppError,
    extract::{rejection_to_error, NON_FIELD_ERRORS},
    images::services::{ImageUpload, IMAGE_FIELD},
};

/// Reads a profile update from JSON, multipart or url-encoded bodies.
#[async_trait]
impl<S> FromRequest<S> for ProfileUpdate
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::field(NON_FIELD_ERRORS, e.body_text()))?;
            from_multipart(multipart).await
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| AppError::field(NON_FIELD_ERRORS, e.body_text()))?;
            Ok(from_form(fields))
        } else {
            let Json(body) = Json::<JsonProfileBody>::from_request(req, state)
                .await
                .map_err(rejection_to_error)?;
            Ok(body.into())
        }
    }
}

async fn from_multipart(mut mp: Multipart) -> Result<ProfileUpdate, AppError> {
    let mut update = ProfileUpdate::default();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::field(NON_FIELD_ERRORS, e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == IMAGE_FIELD {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let body = field
                .bytes()
                .await
                .map_err(|e| AppError::field(IMAGE_FIELD, e.body_text()))?;
            update.profile_image = match (body.is_empty(), file_name.is_some()) {
                // A plain empty value clears the image.
                (true, false) => Patch::Null,
                // Browsers send an empty file input as `filename=""` with no
                // content; that means the image was left alone.
                (true, true) => Patch::Unset,
                (false, _) => Patch::Set(ImageUpload {
                    body,
                    content_type,
                    file_name,
                }),
            };
        } else if update.text_field_mut(&name).is_some() {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::field(&name, e.body_text()))?;
            if let Some(slot) = update.text_field_mut(&name) {
                *slot = Patch::Set(text);
            }
        }
        // Anything else, email included, is ignored.
    }
    Ok(update)
}

fn from_form(fields: HashMap<String, String>) -> ProfileUpdate {
    let mut update = ProfileUpdate::default();
    for (name, value) in fields {
        if name == IMAGE_FIELD {
            // A url-encoded body cannot carry a file; only an empty value
            // (clear) means anything.
            if value.is_empty() {
                update.profile_image = Patch::Null;
            }
        } else if let Some(slot) = update.text_field_mut(&name) {
            *slot = Patch::Set(value);
        }
    }
    update
}
