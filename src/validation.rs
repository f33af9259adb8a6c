use lazy_static::lazy_static;
use regex::Regex;

use crate::error::FieldErrors;

pub const MAX_FIELD_LEN: usize = 255;
pub const MIN_PASSWORD_LEN: usize = 8;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NULL: &str = "This field may not be null.";

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles");
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Trimmed and lowercased, the form emails are stored and looked up in.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Checks a required text value, recording any problem under `field`.
/// Returns the trimmed value when it is usable.
pub fn required_text(field: &str, value: Option<&str>, errors: &mut FieldErrors) -> Option<String> {
    let Some(value) = value else {
        errors.add(field, REQUIRED);
        return None;
    };
    checked_text(field, value, errors)
}

/// Like [`required_text`] for a value that is known to be present.
pub fn checked_text(field: &str, value: &str, errors: &mut FieldErrors) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, BLANK);
        return None;
    }
    if value.chars().count() > MAX_FIELD_LEN {
        errors.add(
            field,
            format!("Ensure this field has no more than {MAX_FIELD_LEN} characters."),
        );
        return None;
    }
    Some(value.to_string())
}
