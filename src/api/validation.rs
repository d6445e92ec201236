use super::ApiError;
use crate::constants::limits::{MAX_USERNAME_LEN, MIN_PASSWORD_LEN};

pub fn validate_username(username: &str) -> Result<&str, ApiError> {
    if username.is_empty() {
        return Err(ApiError::validation("Username is required"));
    }

    if username.len() > MAX_USERNAME_LEN {
        return Err(ApiError::validation(format!(
            "Username must be {MAX_USERNAME_LEN} characters or less"
        )));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(ApiError::validation(
            "Username can only contain letters, numbers, dots, hyphens, and underscores",
        ));
    }

    Ok(username)
}

pub fn validate_new_password<'a>(current: &str, new: &'a str) -> Result<&'a str, ApiError> {
    if new.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "New password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if new == current {
        return Err(ApiError::validation(
            "New password must be different from current password",
        ));
    }

    Ok(new)
}
