//! Error types for viking-core.

use thiserror::Error;

/// Result type alias for viking-core operations.
pub type VikingResult<T> = Result<T, VikingError>;

/// Domain-specific errors for Viking operations.
#[derive(Error, Debug)]
pub enum VikingError {
    /// An identity field is empty or contains characters outside `[A-Za-z0-9_-]`.
    #[error("Invalid {field}: {message}")]
    Validation {
        /// The offending field name.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The access facade was used before a filesystem was attached.
    ///
    /// Retryable once startup completes.
    #[error("Context filesystem not initialized.")]
    NotInitialized,

    /// A uri or digest tier does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-recursive removal of a non-empty directory.
    #[error("Directory not empty: {0}. Use recursive removal.")]
    NotEmpty(String),

    /// The caller's identity cannot see the uri.
    #[error("Access denied to `{uri}`: {reason}")]
    Authorization {
        /// The uri that was refused.
        uri: String,
        /// Why it was refused.
        reason: String,
    },

    /// An embedding or summarization provider call failed.
    #[error("Provider `{provider}` failed: {message}")]
    Provider {
        /// The provider or model id.
        provider: String,
        /// Description of the failure.
        message: String,
    },

    /// A uri could not be parsed.
    #[error("Invalid uri `{uri}`: {reason}")]
    InvalidUri {
        /// The rejected input.
        uri: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The target of a create or move already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// A file was found where a directory was expected.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// A directory was found where a file was expected.
    #[error("Is a directory: {0}")]
    IsADirectory(String),

    /// A configuration value is invalid.
    #[error("Invalid configuration: {message}. {hint}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    /// A storage-layer error with no domain equivalent.
    #[error("Storage error: {0}")]
    Db(#[source] viking_db::DbError),

    /// A provider-layer error.
    #[error(transparent)]
    Model(#[from] viking_model::ModelError),

    /// Generic I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Catch-all for other errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VikingError {
    /// Create a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an authorization error.
    pub fn authorization(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Authorization {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid-uri error.
    pub fn invalid_uri(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUri {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    /// Create a provider error.
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Whether retrying the same call later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized | Self::Provider { .. } | Self::Model(_)
        )
    }

    /// Whether this error means the uri or tier is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<viking_db::DbError> for VikingError {
    fn from(err: viking_db::DbError) -> Self {
        crate::db_adapter::from_db_error(err)
    }
}
