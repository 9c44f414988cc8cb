// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Contact and waitlist form validation.
//!
//! Checks run in a fixed order and the first failure wins, so a client
//! always sees the message for the earliest bad field. Values that are not
//! JSON strings are treated as missing.

use crate::config::ValidationConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;

/// Validation error types. The display text is shown to the visitor.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please provide your full name.")]
    ContactName,

    #[error("Please provide a valid email address.")]
    Email,

    #[error("Please tell us about your organization.")]
    Organization,

    #[error("Please select your primary interest.")]
    Interest,

    #[error("Please share at least 20 characters about your objectives.")]
    Message,

    #[error("Please provide your name.")]
    WaitlistName,

    #[error("Please select a valid role.")]
    Role,
}

/// Raw contact form payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub email: Option<Value>,
    #[serde(default)]
    pub organization: Option<Value>,
    #[serde(default)]
    pub interest: Option<Value>,
    #[serde(default)]
    pub message: Option<Value>,
}

/// Raw waitlist form payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WaitlistRequest {
    #[serde(default)]
    pub email: Option<Value>,
    #[serde(default)]
    pub name: Option<Value>,
    #[serde(default)]
    pub role: Option<Value>,
}

/// A contact form that passed validation, trimmed and normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub organization: String,
    pub interest: String,
    pub message: String,
}

/// A waitlist form that passed validation, trimmed and normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitlistForm {
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// Who is joining the waitlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Educator,
    Researcher,
    Institution,
    Other,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Educator => "educator",
            Self::Researcher => "researcher",
            Self::Institution => "institution",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    /// Exact, case-sensitive match.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "educator" => Ok(Self::Educator),
            "researcher" => Ok(Self::Researcher),
            "institution" => Ok(Self::Institution),
            "other" => Ok(Self::Other),
            _ => Err(ValidationError::Role),
        }
    }
}

/// Form validator.
#[derive(Debug, Clone)]
pub struct FormValidator {
    config: ValidationConfig,
}

impl FormValidator {
    /// Create a new validator with the given configuration.
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a contact form.
    pub fn validate_contact(&self, req: &ContactRequest) -> Result<ContactForm, ValidationError> {
        let name = min_chars(text(&req.name), self.config.min_name_chars)
            .ok_or(ValidationError::ContactName)?;
        let email = valid_email(text(&req.email)).ok_or(ValidationError::Email)?;
        let organization = min_chars(text(&req.organization), self.config.min_organization_chars)
            .ok_or(ValidationError::Organization)?;
        let interest = text(&req.interest)
            .filter(|s| !s.is_empty())
            .ok_or(ValidationError::Interest)?;
        let message = min_chars(text(&req.message), self.config.min_message_chars)
            .ok_or(ValidationError::Message)?;

        Ok(ContactForm {
            name: name.to_string(),
            email,
            organization: organization.to_string(),
            interest: interest.trim().to_string(),
            message: message.to_string(),
        })
    }

    /// Validate a waitlist form.
    pub fn validate_waitlist(&self, req: &WaitlistRequest) -> Result<WaitlistForm, ValidationError> {
        let email = valid_email(text(&req.email)).ok_or(ValidationError::Email)?;
        let name = min_chars(text(&req.name), self.config.min_name_chars)
            .ok_or(ValidationError::WaitlistName)?;
        let role = text(&req.role)
            .ok_or(ValidationError::Role)?
            .parse::<Role>()?;

        Ok(WaitlistForm {
            email,
            name: name.to_string(),
            role,
        })
    }
}

/// The string content of a JSON value, if it is a string.
fn text(value: &Option<Value>) -> Option<&str> {
    value.as_ref().and_then(Value::as_str)
}

/// Trimmed value if it is at least `min` long after trimming.
///
/// Length is measured in UTF-16 code units, so an emoji counts as two.
fn min_chars(value: Option<&str>, min: usize) -> Option<&str> {
    let trimmed = value?.trim();
    let len = trimmed.encode_utf16().count();
    if len >= min {
        Some(trimmed)
    } else {
        debug!(len, min, "Field too short");
        None
    }
}

/// Normalised (trimmed, lowercased) email if the raw value is well formed.
fn valid_email(value: Option<&str>) -> Option<String> {
    let raw = value?;
    if email_pattern().is_match(raw) {
        Some(raw.trim().to_lowercase())
    } else {
        debug!("Email failed pattern check");
        None
    }
}

/// Something@something.something, no whitespace, exactly one `@`.
fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap_or_else(|err| {
            unreachable!("static email pattern failed to compile: {err}")
        })
    })
}
