//! ==============================================================================
//! error.rs - error taxonomy for the polling core
//! ==============================================================================
//!
//! purpose:
//!     ConfigError is the only error that reaches a caller synchronously
//!     (bad interval at Poller::start, unreadable host.toml).
//!     FetchError never escapes a tick: the poller turns it into a
//!     FetchState::Failure and the next scheduled tick is the retry.
//!
//! ==============================================================================

/// Configuration problems, fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("poll interval must be greater than zero (got {interval_ms} ms)")]
    InvalidInterval { interval_ms: u64 },

    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {message}")]
    Parse { message: String },

    #[error("invalid configuration: {message}")]
    Invalid { message: String },
}

/// A failed fetch for one tick.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status}")]
    Status { status: u16 },

    #[error("network error: {message}")]
    Transport { message: String },

    #[error("invalid response body: {message}")]
    Decode { message: String },

    #[error("fetch aborted by a panic")]
    Panicked,
}

impl FetchError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        FetchError::Transport {
            message: err.to_string(),
        }
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        FetchError::Decode {
            message: err.to_string(),
        }
    }
}
