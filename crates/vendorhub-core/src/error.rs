use thiserror::Error;

/// Core error types for VendorHub domain operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid value for '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid {entity}: '{value}'")]
    InvalidStatus { entity: &'static str, value: String },

    #[error("Cannot change {entity} status from '{from}' to '{to}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("{0}")]
    Rule(String),

    #[error("Plan limit reached: {limit} {resource} allowed")]
    LimitReached { resource: String, limit: u32 },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CoreError {
    /// Create a new MissingFields error
    pub fn missing_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::MissingFields(fields.into_iter().map(Into::into).collect())
    }

    /// Create a new InvalidField error
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new InvalidStatus error (`entity` names the enum, e.g. "dispatch status")
    pub fn invalid_status(entity: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidStatus {
            entity,
            value: value.into(),
        }
    }

    /// Create a new InvalidTransition error
    pub fn invalid_transition(
        entity: &'static str,
        from: impl ToString,
        to: impl ToString,
    ) -> Self {
        Self::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Create a business rule violation
    pub fn rule(message: impl Into<String>) -> Self {
        Self::Rule(message.into())
    }

    /// Create a plan quota error
    pub fn limit_reached(resource: impl ToString, limit: u32) -> Self {
        Self::LimitReached {
            resource: resource.to_string(),
            limit,
        }
    }

    /// Names of the missing fields, if this is a MissingFields error
    pub fn missing(&self) -> Option<&[String]> {
        match self {
            Self::MissingFields(fields) => Some(fields),
            _ => None,
        }
    }

    /// Check if this error is a client error (4xx category)
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Check if this error is a server error (5xx category)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::JsonError(_))
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingFields(_) | Self::InvalidField { .. } | Self::InvalidDate(_) => {
                ErrorCategory::Validation
            }
            Self::InvalidStatus { .. } | Self::InvalidTransition { .. } => ErrorCategory::Lifecycle,
            Self::Rule(_) | Self::LimitReached { .. } => ErrorCategory::Rule,
            Self::JsonError(_) => ErrorCategory::Serialization,
        }
    }
}

/// Error categories for logging and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Lifecycle,
    Rule,
    Serialization,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Lifecycle => write!(f, "lifecycle"),
            Self::Rule => write!(f, "rule"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
