use crate::state::AppState;
use axum::Router;

mod dto;
mod extractors;
pub mod handlers;
mod patch;
pub mod services;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    handlers::profile_routes(max_upload_bytes)
}
