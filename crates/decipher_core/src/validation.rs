//! crates/decipher_core/src/validation.rs
//!
//! Local form checks that run before any request is sent.

use regex::Regex;
use std::sync::OnceLock;

use crate::domain::Scenario;
use crate::ports::{ServiceError, ServiceResult};

/// Registration needs at least this many strength points out of five.
pub const MIN_PASSWORD_SCORE: u8 = 3;

/// Minimum length accepted on the reset-password form.
pub const MIN_RESET_PASSWORD_LEN: usize = 6;

/// Verification codes are exactly this many digits.
pub const OTP_LEN: usize = 6;

fn special_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[!@#$%^&*(),.?":{}|<>]"#).expect("static pattern"))
}

/// Score and unmet requirements for a candidate password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordStrength {
    pub score: u8,
    pub feedback: Vec<&'static str>,
}

impl PasswordStrength {
    pub fn is_acceptable(&self) -> bool {
        self.score >= MIN_PASSWORD_SCORE
    }
}

/// One point each for length >= 8, a lowercase letter, an uppercase letter,
/// a digit and a special character.
pub fn password_strength(password: &str) -> PasswordStrength {
    let checks: [(bool, &'static str); 5] = [
        (password.chars().count() >= 8, "At least 8 characters"),
        (password.chars().any(|c| c.is_ascii_lowercase()), "One lowercase letter"),
        (password.chars().any(|c| c.is_ascii_uppercase()), "One uppercase letter"),
        (password.chars().any(|c| c.is_ascii_digit()), "One number"),
        (special_chars().is_match(password), "One special character"),
    ];

    let mut strength = PasswordStrength {
        score: 0,
        feedback: Vec::new(),
    };
    for (passed, requirement) in checks {
        if passed {
            strength.score += 1;
        } else {
            strength.feedback.push(requirement);
        }
    }
    strength
}

/// Matching requires a non-empty confirmation.
pub fn passwords_match(password: &str, confirm_password: &str) -> bool {
    !confirm_password.is_empty() && password == confirm_password
}

/// Keeps the first six digits of whatever was typed into the OTP field.
pub fn sanitize_otp(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).take(OTP_LEN).collect()
}

fn require_filled(fields: &[&str]) -> ServiceResult<()> {
    if fields.iter().any(|field| field.trim().is_empty()) {
        return Err(ServiceError::validation("Please fill in all fields"));
    }
    Ok(())
}

pub fn validate_login(email: &str, password: &str) -> ServiceResult<()> {
    require_filled(&[email, password])
}

pub fn validate_registration(
    name: &str,
    email: &str,
    password: &str,
    confirm_password: &str,
) -> ServiceResult<()> {
    require_filled(&[name, email, password, confirm_password])?;
    if !password_strength(password).is_acceptable() {
        return Err(ServiceError::validation(
            "Password is too weak. Please ensure it meets the requirements.",
        ));
    }
    if !passwords_match(password, confirm_password) {
        return Err(ServiceError::validation("Passwords do not match."));
    }
    Ok(())
}

pub fn validate_otp(email: &str, otp: &str) -> ServiceResult<()> {
    if email.trim().is_empty() {
        return Err(ServiceError::validation(
            "Missing email address for verification",
        ));
    }
    if otp.len() != OTP_LEN || !otp.chars().all(|c| c.is_ascii_digit()) {
        return Err(ServiceError::validation("Please enter a valid 6-digit code"));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> ServiceResult<()> {
    require_filled(&[email])
}

pub fn validate_password_reset(
    token: &str,
    password: &str,
    confirm_password: &str,
) -> ServiceResult<()> {
    require_filled(&[password, confirm_password])?;
    if password.chars().count() < MIN_RESET_PASSWORD_LEN {
        return Err(ServiceError::validation(
            "Password must be at least 6 characters long",
        ));
    }
    if password != confirm_password {
        return Err(ServiceError::validation("Passwords do not match"));
    }
    if token.trim().is_empty() {
        return Err(ServiceError::validation("Invalid reset token"));
    }
    Ok(())
}

pub fn validate_scenario(scenario: &Scenario) -> ServiceResult<()> {
    if scenario.title.trim().is_empty() {
        return Err(ServiceError::validation("Please enter a scenario title"));
    }
    Ok(())
}
