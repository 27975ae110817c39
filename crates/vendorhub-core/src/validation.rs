//! Presence validation for request payloads.
//!
//! Request DTOs keep every client-supplied field optional so that a missing
//! field is reported by name instead of as a deserialization failure.

use crate::error::{CoreError, Result};

/// Collects the names of absent fields and fails once with all of them.
///
/// ```
/// use vendorhub_core::validation::Required;
///
/// let name: Option<String> = Some("Express".into());
/// let origin: Option<String> = None;
/// let err = Required::new()
///     .text("name", &name)
///     .text("origin", &origin)
///     .finish()
///     .unwrap_err();
/// assert_eq!(err.to_string(), "Missing required fields: origin");
/// ```
#[derive(Debug, Default)]
pub struct Required {
    missing: Vec<String>,
}

impl Required {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a string that is present and not blank.
    pub fn text(mut self, field: &str, value: &Option<String>) -> Self {
        if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
            self.missing.push(field.to_string());
        }
        self
    }

    /// Require any present value.
    pub fn value<T>(mut self, field: &str, value: &Option<T>) -> Self {
        if value.is_none() {
            self.missing.push(field.to_string());
        }
        self
    }

    /// Require a present, non-empty list.
    pub fn list<T>(mut self, field: &str, value: &Option<Vec<T>>) -> Self {
        if value.as_ref().is_none_or(Vec::is_empty) {
            self.missing.push(field.to_string());
        }
        self
    }

    pub fn finish(self) -> Result<()> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(CoreError::MissingFields(self.missing))
        }
    }
}

/// Unwrap a field already checked by [`Required`].
pub fn take<T>(field: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| CoreError::missing_fields([field]))
}

/// Trimmed owned copy of an optional string, dropping blanks.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
