//! Failure taxonomy for a single provider call.

/// Why a refresh cycle failed to produce a value.
///
/// These never reach clients; the refresh cycle turns them into cache
/// staleness, backoff, or (for [`FetchError::InvalidConfig`]) a suspended
/// schedule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Network failure or provider outage.
    #[error("Provider unreachable: {0}")]
    Unreachable(String),

    /// The provider rejected the widget configuration (unknown currency,
    /// competition id, city...). Not retryable until the config changes.
    #[error("Invalid widget configuration: {0}")]
    InvalidConfig(String),

    /// The provider asked us to back off.
    #[error("Rate limited by provider")]
    RateLimited,

    /// The call did not complete within the provider's time bound.
    #[error("Provider call timed out")]
    Timeout,
}

impl FetchError {
    /// Whether another attempt with the same configuration can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::InvalidConfig(_))
    }

    /// Short machine-readable tag, used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Unreachable(_) => "unreachable",
            FetchError::InvalidConfig(_) => "invalid_config",
            FetchError::RateLimited => "rate_limited",
            FetchError::Timeout => "timeout",
        }
    }
}
