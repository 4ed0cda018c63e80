// src/error.rs
//! Error taxonomy shared by the platform transport and the cycle controller.

use thiserror::Error;

/// Failure of a single network call (page fetch, status check, claim submit).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

impl TransportError {
    pub fn decode(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            message: message.into(),
        }
    }

    /// A rejected session cannot recover by skipping a candidate; it has to surface.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Status { status: 401 | 403, .. })
    }
}

/// Cycle-level failure returned by `CycleController::run_cycle`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CycleError {
    /// Will not self-correct (empty interest set, invalid session token).
    #[error("configuration fault: {0}")]
    Configuration(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl CycleError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Fatal errors stop the polling loop; transport errors are retried after backoff.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_auth_statuses_are_fatal() {
        let forbidden = TransportError::Status {
            url: "/".into(),
            status: 403,
        };
        let busy = TransportError::Status {
            url: "/".into(),
            status: 503,
        };
        assert!(forbidden.is_fatal());
        assert!(!busy.is_fatal());
        assert!(!TransportError::decode("/", "junk").is_fatal());
    }

    #[test]
    fn configuration_faults_stop_the_loop() {
        assert!(CycleError::configuration("no games").is_fatal());
        let t: CycleError = TransportError::Timeout { url: "/".into() }.into();
        assert!(!t.is_fatal());
    }
}
