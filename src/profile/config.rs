//! Profile session configuration
//!
//! This module defines the immutable configuration for a profile-backed
//! browser session: which profile-manager instance to talk to, which
//! profile to launch, and how.

use crate::error::{Error, Result};
use url::Url;

/// Default profile-manager API address (the service's local default port)
pub const DEFAULT_API_HOST: &str = "http://127.0.0.1:50325";

/// Default HTTP timeout for profile-manager calls, in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Proxy settings forwarded to the launched browser
///
/// Only the server address and bypass list become launch arguments; proxy
/// credentials live in the profile itself at the profile manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// Proxy server, e.g. `http://10.0.0.5:8080` or `socks5://10.0.0.5:1080`
    pub server: String,
    /// Comma-separated hosts that bypass the proxy
    pub bypass: Option<String>,
}

impl ProxySettings {
    /// Create proxy settings with just a server address
    pub fn server<S: Into<String>>(server: S) -> Self {
        Self {
            server: server.into(),
            bypass: None,
        }
    }
}

/// Configuration for a profile-backed browser session
///
/// Immutable after construction; constructed once per session. `user_id`
/// must be non-empty or construction fails with a configuration error.
#[derive(Debug, Clone)]
pub struct ProfileConfig {
    /// Profile-manager API base URL, trailing slashes stripped
    pub api_host: String,
    /// Profile identifier at the profile manager (required)
    pub user_id: String,
    /// Launch the profile headless (default: false)
    pub headless: bool,
    /// Optional proxy applied to the launched browser
    pub proxy: Option<ProxySettings>,
    /// HTTP timeout for profile-manager calls in milliseconds
    /// (default: 30000)
    pub timeout_ms: u64,
}

impl ProfileConfig {
    /// Create a config for `user_id` with all defaults
    pub fn new<S: Into<String>>(user_id: S) -> Result<Self> {
        Self::builder().user_id(user_id).build()
    }

    /// Create a new config builder
    pub fn builder() -> ProfileConfigBuilder {
        ProfileConfigBuilder::default()
    }
}

/// Builder for [`ProfileConfig`]
#[derive(Debug, Default)]
pub struct ProfileConfigBuilder {
    api_host: Option<String>,
    user_id: Option<String>,
    headless: bool,
    proxy: Option<ProxySettings>,
    timeout_ms: Option<u64>,
}

impl ProfileConfigBuilder {
    /// Set the profile-manager API base URL
    pub fn api_host<S: Into<String>>(mut self, host: S) -> Self {
        self.api_host = Some(host.into());
        self
    }

    /// Set the profile identifier (required)
    pub fn user_id<S: Into<String>>(mut self, user_id: S) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set proxy settings
    pub fn proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Set the HTTP timeout in milliseconds
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Validate and build the config
    ///
    /// Fails with a configuration error when `user_id` is missing or empty,
    /// or when the API host does not parse as an absolute URL.
    pub fn build(self) -> Result<ProfileConfig> {
        let user_id = match self.user_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Err(Error::config("profile user_id is required")),
        };

        let api_host = self
            .api_host
            .unwrap_or_else(|| DEFAULT_API_HOST.to_string());
        Url::parse(&api_host)
            .map_err(|e| Error::config(format!("invalid api host '{}': {}", api_host, e)))?;
        let api_host = api_host.trim_end_matches('/').to_string();

        Ok(ProfileConfig {
            api_host,
            user_id,
            headless: self.headless,
            proxy: self.proxy,
            timeout_ms: self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
        })
    }
}
