use axum::{
    extract::{DefaultBodyLimit, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{ProfileUpdate, ProfileView},
    services,
};
use crate::{auth::extractors::AuthUser, error::AppError, state::AppState};

pub fn profile_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/profile/",
            get(get_profile).patch(update_profile).put(update_profile),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> Result<Json<ProfileView>, AppError> {
    Ok(Json(services::get_profile(&state, &identity).await?))
}

/// PATCH and PUT share partial-update semantics.
#[instrument(skip(state, update))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    update: ProfileUpdate,
) -> Result<Json<ProfileView>, AppError> {
    Ok(Json(services::update_profile(&state, &identity, update).await?))
}
