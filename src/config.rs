//! Configuration for virtual-bundler.
//!
//! This module provides runtime configuration for registry downloads.
//! Use [`ConfigBuilder`] at application startup to configure the User-Agent
//! string, registry base URLs and network timeouts.

use std::sync::OnceLock;
use std::time::Duration;

/// Global configuration, initialized via [`ConfigBuilder::init`].
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Default base URL for package manifests and file contents.
pub const DEFAULT_NPM_BASE: &str = "https://cdn.jsdelivr.net/npm";
/// Default base URL for package file listings.
pub const DEFAULT_DATA_BASE: &str = "https://data.jsdelivr.com/v1/package/npm";
/// Default base URL for files served straight from git repositories.
pub const DEFAULT_GH_BASE: &str = "https://cdn.jsdelivr.net/gh";

/// Base URLs of the registry CDN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryUrls {
    /// Manifests and file contents: `{npm}/{name}@{version}{path}`.
    pub npm: String,
    /// File listings: `{data}/{name}@{version}`.
    pub data: String,
    /// Repository files: `{gh}/{org}/{repo}@{ref}/{path}`.
    pub gh: String,
}

impl Default for RegistryUrls {
    fn default() -> Self {
        Self {
            npm: DEFAULT_NPM_BASE.to_string(),
            data: DEFAULT_DATA_BASE.to_string(),
            gh: DEFAULT_GH_BASE.to_string(),
        }
    }
}

impl RegistryUrls {
    /// URL of a file inside a package (`path` is empty or starts with `/`).
    pub fn package_file(&self, name: &str, version: &str, path: &str) -> String {
        format!("{}/{name}@{version}{path}", self.npm)
    }

    /// URL of the manifest of a package or of one of its sub-packages.
    pub fn manifest(&self, name: &str, version: &str, subpath: &str) -> String {
        format!("{}/{name}@{version}{subpath}/package.json", self.npm)
    }

    /// URL of the file listing of a package.
    pub fn listing(&self, name: &str, version: &str) -> String {
        format!("{}/{name}@{version}", self.data)
    }

    /// URL of a file inside a git repository.
    pub fn repository_file(&self, org: &str, repo: &str, git_ref: &str, path: &str) -> String {
        format!("{}/{org}/{repo}@{git_ref}/{path}", self.gh)
    }
}

/// Runtime configuration for virtual-bundler.
#[derive(Debug, Clone)]
pub struct Config {
    /// User-Agent string for registry downloads.
    /// Example: "my-app/1.0.0"
    pub user_agent: String,
    /// Registry base URLs used by new sessions.
    pub registry: RegistryUrls,
    /// Overall timeout of a single registry request.
    pub timeout: Duration,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: concat!("virtual-bundler/", env!("CARGO_PKG_VERSION")).to_string(),
            registry: RegistryUrls::default(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Configuration builder for fluent API.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    user_agent: Option<String>,
    registry: Option<RegistryUrls>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl ConfigBuilder {
    /// Create a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the User-Agent string for registry downloads.
    ///
    /// Default: "virtual-bundler/{version}"
    ///
    /// # Example
    ///
    /// ```
    /// use virtual_bundler::config::ConfigBuilder;
    ///
    /// ConfigBuilder::new()
    ///     .user_agent("my-app/1.0.0")
    ///     .init();
    /// ```
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Use a mirror instead of the public CDN.
    pub fn registry(mut self, registry: RegistryUrls) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the per-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Assemble a [`Config`] without installing it globally.
    pub fn build(self) -> Config {
        let defaults = Config::default();
        Config {
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
            registry: self.registry.unwrap_or(defaults.registry),
            timeout: self.timeout.unwrap_or(defaults.timeout),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
        }
    }

    /// Build and initialize the global configuration.
    ///
    /// This can only be called once. Subsequent calls are ignored.
    /// Returns `true` if configuration was set, `false` if already initialized.
    pub fn init(self) -> bool {
        CONFIG.set(self.build()).is_ok()
    }
}

/// Initialize virtual-bundler with default configuration.
///
/// This is equivalent to `ConfigBuilder::new().init()`.
pub fn init_default() -> bool {
    ConfigBuilder::new().init()
}

/// Get the current configuration, or default if not initialized.
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::default)
}
