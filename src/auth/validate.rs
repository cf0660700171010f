//! Field validation for registration, login, and documents read back from
//! the store.
//!
//! Every function returns the human-readable reason on failure; those
//! strings are safe to surface in 400 bodies. Credential-adjacent failures
//! never flow through here on the 401 path.

use base64ct::{Base64, Encoding};
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;

const INVALID_ACTIVATION_TOKEN: &str = "One time activation token is invalid.";

/// Validate an email identity key: 6..=50 chars, lowercase mailbox charset,
/// and a sane mailbox@domain.tld shape.
///
/// # Errors
/// Returns the display-safe reason when the email is rejected.
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() || email.trim().is_empty() {
        return Err("Email is blank.".to_string());
    }

    if email.len() < 6 || email.len() > 50 {
        return Err("Email size is not in range (6,50) inclusive.".to_string());
    }

    let charset = r"^[a-z0-9._@-]*$";
    if !Regex::new(charset).is_ok_and(|regex| regex.is_match(email)) {
        return Err(format!("Email not matches {charset} pattern."));
    }

    if !Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email)) {
        return Err("Not a valid email.".to_string());
    }

    Ok(())
}

/// Validate a first/last name: 3..=40 letters and single spaces, trimmed.
///
/// # Errors
/// Returns the display-safe reason when the name is rejected.
pub fn validate_name(name: &str, prefix: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err(format!("{prefix}Name is blank."));
    }

    if name.len() < 3 || name.len() > 40 {
        return Err(format!("{prefix}Name size is not in range (3,40) inclusive."));
    }

    if !Regex::new(r"^[A-Za-z ]*$").is_ok_and(|regex| regex.is_match(name)) {
        return Err(format!("{prefix}Name not matches [A-Za-z ] pattern."));
    }

    if name != name.trim() {
        return Err(format!("{prefix}Name has a space at the start or at the end."));
    }

    if name.contains("  ") {
        return Err(format!("{prefix}Name has repeated space chars."));
    }

    Ok(())
}

/// Minimum acceptable password: `Aa1!aaaa`. At least one lowercase, one
/// uppercase, one digit, and one special character, 8..=120 total.
///
/// # Errors
/// Returns the display-safe reason when the password is rejected.
pub fn validate_password(password: &str) -> Result<(), String> {
    let len = password.chars().count();
    if len < 8 || len > 120 {
        return Err("Password size is not in range (8,120) inclusive.".to_string());
    }

    let mut upper_count = 0usize;
    let mut digit_count = 0usize;
    let mut special_count = 0usize;
    for c in password.chars() {
        if c.is_numeric() {
            digit_count += 1;
        } else if c.is_uppercase() {
            upper_count += 1;
        } else if !c.is_alphanumeric() {
            special_count += 1;
        }
    }
    let lower_count = len - (upper_count + digit_count + special_count);

    if lower_count < 1 {
        return Err("Password has no lower case letter.".to_string());
    }
    if upper_count < 1 {
        return Err("Password has no upper case letter.".to_string());
    }
    if digit_count < 1 {
        return Err("Password has no digit.".to_string());
    }
    if special_count < 1 {
        return Err("Password has no special character.".to_string());
    }

    Ok(())
}

/// Validate a permission list: up to 50 entries, each non-blank and at most
/// 50 characters. Empty is fine; an account may hold no permissions.
/// Order is irrelevant; the list is semantically a set.
///
/// # Errors
/// Returns the display-safe reason when the list is rejected.
pub fn validate_permissions(permissions: &[String]) -> Result<(), String> {
    if permissions.len() > 50 {
        return Err("Permissions size is not in range (0,50) inclusive.".to_string());
    }

    for permission in permissions {
        if permission.trim().is_empty() {
            return Err("A permission is blank.".to_string());
        }
        if permission.len() > 50 {
            return Err("A permission size is not in range (1,50) inclusive.".to_string());
        }
    }

    Ok(())
}

/// Validate the base64 shape of a supplied activation token before any
/// comparison happens. Cheap structural checks first, then a real decode.
///
/// # Errors
/// Returns the display-safe reason when the token shape is rejected.
pub fn validate_activation_token(token: &str) -> Result<(), String> {
    if token.len() > 128 || token.len() % 4 != 0 {
        return Err("One time activation token has an incorrect size.".to_string());
    }

    if token.trim().is_empty() {
        return Err("One time activation token is blank.".to_string());
    }

    if !token
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=')
    {
        return Err(INVALID_ACTIVATION_TOKEN.to_string());
    }

    if Base64::decode_vec(token).is_err() {
        return Err(INVALID_ACTIVATION_TOKEN.to_string());
    }

    Ok(())
}

/// Validate a stored timestamp: not in the future, not before 2024.
///
/// # Errors
/// Returns the display-safe reason when the timestamp is rejected.
pub fn validate_timestamp(timestamp: DateTime<Utc>, prefix: &str) -> Result<(), String> {
    if timestamp > Utc::now() {
        return Err(format!("{prefix}Date is in the future."));
    }

    let min = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    if timestamp < min {
        return Err(format!("{prefix}Date is before year 2024."));
    }

    Ok(())
}
