//! Error handling module for autosnap
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Provider failures and tag parse failures have their own enums so callers can
//! match on the cases that change control flow (rate limits, malformed tags).

use thiserror::Error;

/// Main error type for autosnap
#[derive(Error, Debug)]
pub enum AutosnapError {
    /// IO errors (report output)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cloud provider call failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for autosnap operations
pub type Result<T> = std::result::Result<T, AutosnapError>;

/// A management tag value that does not follow the tag grammar.
///
/// Every variant keeps the raw value so it can be reported verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagParseError {
    /// A volume tag segment is not exactly one `key=value` pair
    #[error("segment '{segment}' is not a key=value pair in [{raw}]")]
    MissingSeparator { raw: String, segment: String },

    /// A snapshot tag does not have exactly `date;destinations`
    #[error("expected 2 ';'-separated fields, found {found} in [{raw}]")]
    WrongFieldCount { raw: String, found: usize },

    /// A snapshot tag's first field is not a YYYY-MM-DD date
    #[error("invalid expiry date '{value}' in [{raw}]")]
    InvalidDate { raw: String, value: String },
}

impl TagParseError {
    /// The tag value exactly as read from the provider.
    pub fn raw(&self) -> &str {
        match self {
            Self::MissingSeparator { raw, .. }
            | Self::WrongFieldCount { raw, .. }
            | Self::InvalidDate { raw, .. } => raw,
        }
    }
}

/// Failure reported by a [`CloudProvider`](crate::provider::CloudProvider) call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider refused the request for capacity reasons
    /// (`ResourceLimitExceeded`). Copies treat this as a soft skip.
    #[error("{operation} rate limited in {region}: {message}")]
    RateLimited {
        operation: String,
        region: String,
        message: String,
    },

    /// The referenced resource does not exist
    #[error("{operation} failed in {region}: resource {resource_id} not found")]
    NotFound {
        operation: String,
        region: String,
        resource_id: String,
    },

    /// Any other API failure
    #[error("{operation} failed in {region} ({code}): {message}")]
    Api {
        operation: String,
        region: String,
        code: String,
        message: String,
    },
}

impl ProviderError {
    /// Create a rate-limit error
    pub fn rate_limited(
        operation: impl Into<String>,
        region: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::RateLimited {
            operation: operation.into(),
            region: region.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(
        operation: impl Into<String>,
        region: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            operation: operation.into(),
            region: region.into(),
            resource_id: resource_id.into(),
        }
    }

    /// Create a generic API error
    pub fn api(
        operation: impl Into<String>,
        region: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Api {
            operation: operation.into(),
            region: region.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    /// True for capacity exhaustion, which copies skip instead of failing.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
