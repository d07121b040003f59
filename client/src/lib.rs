pub mod connection;
pub mod engines;
pub mod gateway;
pub mod session;
pub mod wallet;

pub use connection::{ConnectionMonitor, LinkState};
pub use engines::achievements::AchievementEngine;
pub use engines::daily::DailyRewardEngine;
pub use engines::exchange::ExchangeEngine;
pub use engines::spin::SpinEngine;
pub use gateway::{CredentialSource, Gateway, GatewayConfig, RetryPolicy, StaticCredentials};
pub use session::{SessionConfig, SessionManager, StatsAccumulator, Visibility};
pub use wallet::{OptimisticTxn, WalletStore};

use gridfall_types::api::Reason;
use reqwest::StatusCode;
use thiserror::Error;

/// Error type for gateway operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid gateway URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
    #[error("http client construction failed: {0}")]
    Build(#[source] reqwest::Error),
    /// No response from the backend (connect failure or timeout). Escalates
    /// to the app-wide disconnected state, not an engine error field.
    #[error("could not reach backend: {0}")]
    Offline(#[source] reqwest::Error),
    /// HTTP 401 or an `unauthorized` reason on any call; treated uniformly as
    /// session expiry regardless of which engine triggered it.
    #[error("session expired")]
    Unauthorized,
    /// Backend-classified domain rejection.
    #[error("{message}")]
    Api {
        status: StatusCode,
        message: String,
        reason: Option<Reason>,
    },
    #[error("request failed: {0}")]
    Failed(StatusCode),
    #[error("invalid response body: {0}")]
    InvalidBody(#[source] reqwest::Error),
}

impl Error {
    /// Backend reason code, if this failure carried one.
    pub fn reason(&self) -> Option<Reason> {
        match self {
            Error::Unauthorized => Some(Reason::Unauthorized),
            Error::Api { reason, .. } => *reason,
            _ => None,
        }
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests;
