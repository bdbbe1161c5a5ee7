//! Error types for the oppminer core library.
//!
//! Each module has its own error enum to provide clear error boundaries.
//! The library uses `thiserror` for structured, typed errors.

/// Errors related to configuration loading, parsing, and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required configuration field is absent.
    #[error("missing required config field: {field}")]
    MissingField {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration field has an unacceptable value.
    #[error("invalid value for config field '{field}': {message}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// A description of why the value is invalid.
        message: String,
    },

    /// The configuration file does not exist at the specified path.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// The path that was searched.
        path: String,
    },

    /// TOML deserialization failed.
    #[error("failed to parse config file: {source}")]
    ParseError {
        /// The underlying TOML parse error.
        #[source]
        source: toml::de::Error,
    },
}

/// Errors from interacting with the LLM provider.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// HTTP request to the LLM endpoint failed.
    #[error("LLM HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// LLM API returned an error response.
    #[error("LLM API error (status {status}): {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The error message from the API.
        message: String,
    },

    /// Per-minute rate limit hit; retryable after the given delay.
    #[error("LLM rate limited{}", match .retry_after_secs {
        Some(secs) => format!(", retry after {secs}s"),
        None => String::new(),
    })]
    RateLimited {
        /// Seconds to wait before retrying, if the provider said.
        retry_after_secs: Option<u64>,
        /// True when the provider reported a per-day quota, not a
        /// per-minute window. Daily exhaustion is not retryable on the
        /// same model.
        daily: bool,
    },

    /// Every configured model has exhausted its daily request quota.
    #[error("daily request limit exhausted on model '{model}'")]
    DailyLimitExceeded {
        /// The last model that reported exhaustion.
        model: String,
    },

    /// The response body could not be parsed as JSON, even after
    /// truncation repair.
    #[error("malformed LLM response: {0}")]
    MalformedResponse(String),

    /// All retry attempts on all models failed.
    #[error("LLM call failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Total attempts made across models.
        attempts: u32,
        /// Message of the final failure.
        last_error: String,
    },
}

impl LlmError {
    /// Whether this error should count against the retry budget and be
    /// retried on the same model.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Request(_) | LlmError::MalformedResponse(_) => true,
            LlmError::Api { status, .. } => *status >= 500,
            LlmError::RateLimited { daily, .. } => !daily,
            _ => false,
        }
    }
}

/// Errors from SQLite storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to connect to the SQLite database.
    #[error("database connection error: {source}")]
    Connection {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },

    /// Database migration failed.
    #[error("database migration error: {source}")]
    Migration {
        /// The underlying migration error.
        #[source]
        source: sqlx::migrate::MigrateError,
    },

    /// A database query failed.
    #[error("database query error: {source}")]
    Query {
        /// The underlying SQLx error.
        #[source]
        source: sqlx::Error,
    },
}

/// Errors that abort a pipeline job.
///
/// Per-cluster and per-idea failures are absorbed inside the stages; only
/// the failures enumerated here surface as a `failed` job.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Required credentials or configuration are missing.
    #[error("pipeline configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A fatal store failure (initial select or final insert).
    #[error("pipeline storage error: {0}")]
    Storage(#[from] StorageError),

    /// A fatal LLM failure that no stage could absorb.
    #[error("pipeline LLM error: {0}")]
    Llm(#[from] LlmError),

    /// Job parameters failed validation.
    #[error("invalid job parameter '{field}': {message}")]
    InvalidParameter {
        /// The offending parameter name.
        field: String,
        /// Why the value was rejected.
        message: String,
    },
}
