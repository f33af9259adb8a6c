use tracing::{info, instrument, warn};

use super::{
    dto::{ProfileUpdate, ProfileView},
    patch::Patch,
};
use crate::{
    auth::{claims::UserIdentity, jwt::AuthError},
    error::{AppError, FieldErrors},
    images::services::{discard, presign, store_profile_image},
    state::AppState,
    users::{StoreError, User, UserChanges},
    validation::{checked_text, NULL},
};

async fn load_user(state: &AppState, identity: &UserIdentity) -> Result<User, AppError> {
    let Some(user) = state.users.find_by_id(identity.user_id).await? else {
        warn!(user_id = %identity.user_id, "token for missing user");
        return Err(AuthError::UnknownUser.into());
    };
    if !user.is_active {
        return Err(AuthError::InactiveUser.into());
    }
    Ok(user)
}

async fn to_view(state: &AppState, user: User) -> Result<ProfileView, AppError> {
    let profile_image = match &user.profile_image {
        Some(key) => Some(
            presign(
                state.storage.as_ref(),
                key,
                state.config.storage.url_ttl_seconds,
            )
            .await?,
        ),
        None => None,
    };
    Ok(ProfileView {
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
        profile_image,
    })
}

fn resolve_text(field: &str, patch: Patch<String>, errors: &mut FieldErrors) -> Option<String> {
    match patch {
        Patch::Unset => None,
        Patch::Null => {
            errors.add(field, NULL);
            None
        }
        Patch::Set(value) => checked_text(field, &value, errors),
    }
}

#[instrument(skip(state), fields(user_id = %identity.user_id))]
pub async fn get_profile(
    state: &AppState,
    identity: &UserIdentity,
) -> Result<ProfileView, AppError> {
    let user = load_user(state, identity).await?;
    to_view(state, user).await
}

/// Applies only the supplied fields. A new image replaces the old object;
/// an explicit null removes it.
#[instrument(skip(state, update), fields(user_id = %identity.user_id))]
pub async fn update_profile(
    state: &AppState,
    identity: &UserIdentity,
    update: ProfileUpdate,
) -> Result<ProfileView, AppError> {
    let mut errors = FieldErrors::new();
    let mut changes = UserChanges {
        username: resolve_text("username", update.username, &mut errors),
        first_name: resolve_text("first_name", update.first_name, &mut errors),
        last_name: resolve_text("last_name", update.last_name, &mut errors),
        profile_image: None,
    };
    if !errors.is_empty() {
        warn!(fields = ?errors, "profile update rejected");
        return Err(AppError::Validation(errors));
    }

    let current = load_user(state, identity).await?;

    let mut uploaded = None;
    match update.profile_image {
        Patch::Unset => {}
        Patch::Null => changes.profile_image = Some(None),
        Patch::Set(upload) => {
            let key = store_profile_image(state.storage.as_ref(), current.id, upload).await?;
            changes.profile_image = Some(Some(key.clone()));
            uploaded = Some(key);
        }
    }

    if changes.is_empty() {
        return to_view(state, current).await;
    }

    let user = match state.users.update(current.id, changes).await {
        Ok(u) => u,
        Err(e) => {
            if let Some(key) = &uploaded {
                discard(state.storage.as_ref(), key).await;
            }
            return Err(match e {
                StoreError::NotFound => AuthError::UnknownUser.into(),
                other => other.into(),
            });
        }
    };

    if let Some(old) = &current.profile_image {
        if user.profile_image.as_ref() != Some(old) {
            discard(state.storage.as_ref(), old).await;
        }
    }

    info!("profile updated");
    to_view(state, user).await
}
