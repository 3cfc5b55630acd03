//! Error types for the proxy health probe

use thiserror::Error;

/// Errors returned by a proxy health check
#[derive(Debug, Error)]
pub enum ProxyError {
    /// `init_client` or `set_host_ip` has not been called
    #[error("proxy client is not initialized: {0}")]
    NotInitialized(&'static str),

    /// The HTTP client could not be built
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The request could not be sent or timed out
    #[error("proxy health request to {url} failed: {source}")]
    Transport {
        /// Probed URL
        url: String,
        /// Underlying transport error
        #[source]
        source: reqwest::Error,
    },

    /// The proxy answered with a non-200 status
    #[error("proxy actor health check failed. status code: {status}, status: {reason}, body: {body}")]
    UnhealthyStatus {
        /// HTTP status code
        status: u16,
        /// Canonical reason phrase
        reason: String,
        /// Response body, for diagnostics
        body: String,
    },

    /// The proxy answered with a non-200 status and its body could not be read
    #[error("proxy actor health check failed. status code: {status}, error reading body: {source}")]
    BodyRead {
        /// HTTP status code
        status: u16,
        /// Underlying read error
        #[source]
        source: reqwest::Error,
    },
}

impl ProxyError {
    /// Whether the probe gave up because the deadline passed
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Transport { source, .. } | Self::BodyRead { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}
