//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all acquisition operations
//! - [`ErrorKind`]: The coarse taxonomy (transport, upstream, configuration, ...)
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use thiserror::Error;

/// Coarse error taxonomy.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Timeout or connection failure.
    Transport,
    /// Non-2xx status, malformed payload, upstream-reported failure.
    Upstream,
    /// Missing credential, unknown provider, invalid limits.
    Configuration,
    /// Operation or symbol the provider cannot serve.
    Unsupported,
    /// Sink/source failure.
    Storage,
    /// Interrupted by a stop signal.
    Cancelled,
}

/// Errors that can occur during market data acquisition.
///
/// Each variant is classified into an [`ErrorKind`] and a [`RetryClass`].
#[derive(Error, Debug)]
pub enum MarketDataError {
    /// The request did not complete within the configured timeout.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The connection could not be established or was dropped.
    #[error("Connection failure: {provider} - {message}")]
    ConnectionFailure {
        /// The provider we tried to reach
        provider: String,
        /// Underlying transport error
        message: String,
    },

    /// The provider answered with a non-2xx status.
    #[error("HTTP {status} from {provider}")]
    HttpStatus {
        /// The provider that returned the status
        provider: String,
        /// HTTP status code
        status: u16,
    },

    /// The response body could not be decoded.
    #[error("Decode error: {provider} - {message}")]
    Decode {
        /// The provider whose payload was malformed
        provider: String,
        /// Decoder message
        message: String,
    },

    /// The provider reported a logical failure inside a 2xx response.
    #[error("Provider error: {provider} - {message}")]
    ProviderError {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The requested symbol is unknown to the provider.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The provider does not implement the operation.
    #[error("Operation '{operation}' not supported by {provider}")]
    NotSupported {
        /// The unsupported operation
        operation: String,
        /// The provider that was asked
        provider: String,
    },

    /// A required credential is absent.
    #[error("Missing credential for {provider}: set {env_var}")]
    MissingCredential {
        /// Provider that needs the credential
        provider: String,
        /// Environment variable that should hold it
        env_var: String,
    },

    /// No provider variant or registration exists under this name.
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Provider configuration is invalid.
    #[error("Invalid configuration for {provider}: {message}")]
    InvalidConfig {
        /// Provider whose configuration was rejected
        provider: String,
        /// What is wrong with it
        message: String,
    },

    /// Work was interrupted by a stop signal.
    #[error("Cancelled")]
    Cancelled,

    /// The sink or source failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Filesystem error in the sink or source.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MarketDataError {
    /// Classify a `reqwest` transport error for `provider`.
    pub fn from_transport(provider: &str, error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                provider: provider.to_string(),
            }
        } else if let Some(status) = error.status() {
            Self::HttpStatus {
                provider: provider.to_string(),
                status: status.as_u16(),
            }
        } else if error.is_decode() {
            Self::Decode {
                provider: provider.to_string(),
                message: error.to_string(),
            }
        } else {
            Self::ConnectionFailure {
                provider: provider.to_string(),
                message: error.to_string(),
            }
        }
    }

    /// Returns the coarse error taxonomy for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout { .. } | Self::ConnectionFailure { .. } => ErrorKind::Transport,
            Self::HttpStatus { .. } | Self::Decode { .. } | Self::ProviderError { .. } => {
                ErrorKind::Upstream
            }
            Self::MissingCredential { .. }
            | Self::UnknownProvider(_)
            | Self::InvalidConfig { .. } => ErrorKind::Configuration,
            Self::SymbolNotFound(_) | Self::NotSupported { .. } => ErrorKind::Unsupported,
            Self::Storage(_) | Self::Io(_) => ErrorKind::Storage,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use marketfeed_market_data::errors::{MarketDataError, RetryClass};
    ///
    /// let error = MarketDataError::Timeout { provider: "binance".to_string() };
    /// assert_eq!(error.retry_class(), RetryClass::Retryable);
    ///
    /// let error = MarketDataError::SymbolNotFound("INVALID".to_string());
    /// assert_eq!(error.retry_class(), RetryClass::Never);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self.kind() {
            ErrorKind::Transport | ErrorKind::Upstream | ErrorKind::Storage => {
                RetryClass::Retryable
            }
            ErrorKind::Configuration | ErrorKind::Unsupported => RetryClass::Never,
            ErrorKind::Cancelled => RetryClass::Cancelled,
        }
    }

    /// Whether this is a configuration error (fatal to one provider's registration only).
    pub fn is_configuration(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}
