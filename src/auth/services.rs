use tracing::{info, instrument, warn};

use super::{
    dto::{LoginRequest, SignupRequest},
    jwt::IssuedTokens,
    password::{hash_password, verify_decoy, verify_password},
};
use crate::{
    error::{AppError, FieldErrors},
    state::AppState,
    users::{NewUser, StoreError, User},
    validation::{
        is_valid_email, normalize_email, required_text, BLANK, MAX_FIELD_LEN, MIN_PASSWORD_LEN,
        REQUIRED,
    },
};

const INVALID_EMAIL: &str = "Enter a valid email address.";

fn checked_email(value: Option<&str>, errors: &mut FieldErrors) -> Option<String> {
    let Some(raw) = value else {
        errors.add("email", REQUIRED);
        return None;
    };
    let email = normalize_email(raw);
    if email.is_empty() {
        errors.add("email", BLANK);
        None
    } else if email.len() > MAX_FIELD_LEN || !is_valid_email(&email) {
        errors.add("email", INVALID_EMAIL);
        None
    } else {
        Some(email)
    }
}

/// Validates, creates the account and issues its first tokens.
#[instrument(skip(state, req))]
pub async fn signup(
    state: &AppState,
    req: SignupRequest,
) -> Result<(User, IssuedTokens), AppError> {
    let mut errors = FieldErrors::new();

    let email = checked_email(req.email.as_deref(), &mut errors);
    let password = match req.password {
        None => {
            errors.add("password", REQUIRED);
            None
        }
        Some(p) if p.is_empty() => {
            errors.add("password", BLANK);
            None
        }
        Some(p) if p.chars().count() < MIN_PASSWORD_LEN => {
            errors.add(
                "password",
                format!("Ensure this field has at least {MIN_PASSWORD_LEN} characters."),
            );
            None
        }
        Some(p) => Some(p),
    };
    let first_name = required_text("first_name", req.first_name.as_deref(), &mut errors);
    let last_name = required_text("last_name", req.last_name.as_deref(), &mut errors);
    let username = required_text("username", req.username.as_deref(), &mut errors);

    let (Some(email), Some(password), Some(first_name), Some(last_name), Some(username)) =
        (email, password, first_name, last_name, username)
    else {
        warn!(fields = ?errors, "signup rejected");
        return Err(AppError::Validation(errors));
    };

    let password_hash = hash_password(&password)?;

    let user = match state
        .users
        .create(NewUser {
            email,
            username,
            first_name,
            last_name,
            password_hash,
        })
        .await
    {
        Ok(u) => u,
        Err(StoreError::Duplicate(field)) => {
            warn!(field, "signup with taken value");
            return Err(StoreError::Duplicate(field).into());
        }
        Err(e) => return Err(e.into()),
    };

    let tokens = state.jwt.issue(user.id, &user.email)?;

    info!(
        user_id = %user.id,
        email = %user.email,
        joined = %user.created_at,
        "user registered"
    );
    Ok((user, tokens))
}

/// Checks credentials and issues tokens. Unknown email and wrong password
/// produce the same error.
#[instrument(skip(state, req))]
pub async fn login(state: &AppState, req: LoginRequest) -> Result<IssuedTokens, AppError> {
    let mut errors = FieldErrors::new();
    let email = checked_email(req.email.as_deref(), &mut errors);
    let password = match req.password {
        None => {
            errors.add("password", REQUIRED);
            None
        }
        Some(p) if p.is_empty() => {
            errors.add("password", BLANK);
            None
        }
        Some(p) => Some(p),
    };
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AppError::Validation(errors));
    };

    let Some(user) = state.users.find_by_email(&email).await? else {
        verify_decoy(&password);
        warn!(email = %email, "login unknown email");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    if !user.is_active {
        warn!(user_id = %user.id, "login to disabled account");
        return Err(AppError::AccountDisabled);
    }

    if let Err(e) = state.users.record_login(user.id).await {
        warn!(error = %e, user_id = %user.id, "could not record last login");
    }

    let tokens = state.jwt.issue(user.id, &user.email)?;
    info!(user_id = %user.id, previous_login = ?user.last_login_at, "user logged in");
    Ok(tokens)
}
