//! Registry transport.
//!
//! Every network access of a session goes through a [`Fetcher`]. The default
//! [`HttpFetcher`] is a blocking `ureq` agent with explicit timeouts, so a
//! stalled registry fails the request instead of stalling the session.

use std::sync::Arc;

use thiserror::Error;

use crate::cache::Bytes;

/// A failed registry request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The registry answered with a non-success status.
    #[error("GET {url} returned status {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The request never produced a response (DNS, TLS, timeout, I/O).
    #[error("GET {url} failed: {reason}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Human readable cause.
        reason: String,
    },
}

impl FetchError {
    /// The URL that failed.
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. } | Self::Transport { url, .. } => url,
        }
    }
}

/// Performs a GET and returns the body.
///
/// Implementations must be safe to call from several threads at once.
/// Non-success responses are errors; callers never retry.
pub trait Fetcher: Send + Sync {
    /// Fetch `url` and return its raw body.
    fn get(&self, url: &str) -> Result<Bytes, FetchError>;
}

impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn get(&self, url: &str) -> Result<Bytes, FetchError> {
        (**self).get(url)
    }
}

/// Fetcher backed by a shared `ureq` agent.
#[cfg(feature = "http")]
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    /// Create a fetcher from the global [`crate::config`].
    pub fn new() -> Self {
        Self::from_config(crate::config::get())
    }

    /// Create a fetcher with the timeouts and User-Agent of `config`.
    pub fn from_config(config: &crate::config::Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .timeout_connect(config.connect_timeout)
            .build();
        Self { agent }
    }
}

#[cfg(feature = "http")]
impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http")]
impl Fetcher for HttpFetcher {
    fn get(&self, url: &str) -> Result<Bytes, FetchError> {
        use std::io::Read;

        log::debug!("fetch: {url}");
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(status, _) => FetchError::Status {
                url: url.to_string(),
                status,
            },
            ureq::Error::Transport(t) => FetchError::Transport {
                url: url.to_string(),
                reason: t.to_string(),
            },
        })?;

        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Bytes::from(body))
    }
}

/// Fetcher used when the `http` feature is disabled: every request fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineFetcher;

impl Fetcher for OfflineFetcher {
    fn get(&self, url: &str) -> Result<Bytes, FetchError> {
        Err(FetchError::Transport {
            url: url.to_string(),
            reason: "network access is disabled".to_string(),
        })
    }
}

/// The fetcher sessions use when none is supplied.
pub fn default_fetcher() -> Arc<dyn Fetcher> {
    #[cfg(feature = "http")]
    {
        Arc::new(HttpFetcher::new())
    }
    #[cfg(not(feature = "http"))]
    {
        Arc::new(OfflineFetcher)
    }
}
