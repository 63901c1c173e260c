//! Remote browser handle
//!
//! Lifecycle management for the underlying Chromium instance: either a
//! profile launched through the profile-manager service and attached over
//! CDP, or a standalone instance launched locally. The handle is created
//! empty and lazily populated on first access.

use crate::error::{ConnectError, Error, ProfileError, ResourceError, Result};
use crate::profile::{ProfileConfig, ProfileManagerClient, DEFAULT_LAUNCH_ARGS};
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::handler::{Handler, HandlerConfig};
use futures::StreamExt;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Settle delay after stopping a stale profile instance.
///
/// The stop/start settle delays and the connect retry bound below are
/// empirical tuning against the profile manager's startup latency; treat
/// them as load-bearing.
pub(crate) const STOP_SETTLE: Duration = Duration::from_secs(3);

/// Settle delay between the start request and the first connect attempt
pub(crate) const START_SETTLE: Duration = Duration::from_secs(5);

/// Bounded CDP connect attempts
pub(crate) const CONNECT_ATTEMPTS: u32 = 3;

/// Fixed backoff between connect attempts
pub(crate) const CONNECT_BACKOFF: Duration = Duration::from_secs(3);

/// Per-attempt CDP connect timeout
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Per-command CDP request timeout, set explicitly on every connection.
/// Raw CDP connections do not inherit sane defaults, and the stock one is
/// too short for slow profile startups.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the underlying Chromium instance comes from
#[derive(Debug)]
pub enum BrowserSource {
    /// A persistent profile managed by the profile-manager service
    Profile(ProfileConfig),
    /// A locally launched, non-persistent instance
    Standalone(LaunchConfig),
}

/// Configuration for a locally launched (standalone) browser
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Run in headless mode (default: true)
    pub headless: bool,
    /// Browser window width (default: 1920)
    pub width: u32,
    /// Browser window height (default: 1080)
    pub height: u32,
    /// Enable sandbox (default: true)
    pub sandbox: bool,
    /// Path to Chrome/Chromium executable (None = auto-detect)
    pub chrome_path: Option<String>,
    /// Additional Chrome arguments
    pub extra_args: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            width: 1920,
            height: 1080,
            sandbox: true,
            chrome_path: None,
            extra_args: Vec::new(),
        }
    }
}

impl LaunchConfig {
    /// Create a new config builder
    pub fn builder() -> LaunchConfigBuilder {
        LaunchConfigBuilder::default()
    }
}

/// Builder for [`LaunchConfig`]
#[derive(Default)]
pub struct LaunchConfigBuilder {
    config: LaunchConfig,
}

impl LaunchConfigBuilder {
    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Set viewport dimensions
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    /// Enable/disable sandbox
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.config.sandbox = sandbox;
        self
    }

    /// Set Chrome path
    pub fn chrome_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Add an extra Chrome argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    /// Build the config
    pub fn build(self) -> LaunchConfig {
        self.config
    }
}

/// Handle to the underlying browser
///
/// Owns at most one CDP connection and its handler task. Lazily populated
/// on the first call to [`RemoteBrowser::get`]; cleared on explicit
/// [`RemoteBrowser::close`]. Not safe to share across callers: all methods
/// take `&mut self`.
pub struct RemoteBrowser {
    source: BrowserSource,
    client: Option<ProfileManagerClient>,
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
}

impl RemoteBrowser {
    /// Create a handle backed by a managed profile
    pub fn profile(config: ProfileConfig) -> Result<Self> {
        let client = ProfileManagerClient::from_config(&config)?;
        Ok(Self {
            source: BrowserSource::Profile(config),
            client: Some(client),
            browser: None,
            handler_task: None,
        })
    }

    /// Create a handle backed by a locally launched browser
    pub fn standalone(config: LaunchConfig) -> Self {
        Self {
            source: BrowserSource::Standalone(config),
            client: None,
            browser: None,
            handler_task: None,
        }
    }

    /// Whether the underlying browser is a persistent, profile-backed
    /// resource whose lifecycle is owned by the external service
    pub fn is_persistent(&self) -> bool {
        matches!(self.source, BrowserSource::Profile(_))
    }

    /// The source this handle launches from
    pub fn source(&self) -> &BrowserSource {
        &self.source
    }

    /// The live connection, if one is currently held
    pub fn connected(&self) -> Option<&Browser> {
        self.browser.as_ref()
    }

    /// Get the underlying browser, launching/connecting on first access
    #[instrument(skip(self))]
    pub async fn get(&mut self) -> Result<&Browser> {
        if self.browser.is_none() {
            let (browser, handler) = match &self.source {
                BrowserSource::Profile(config) => {
                    let client = self
                        .client
                        .as_ref()
                        .ok_or(ResourceError::NotConnected)?;
                    launch_profile(client, config).await?
                }
                BrowserSource::Standalone(config) => launch_standalone(config).await?,
            };
            self.handler_task = Some(tokio::spawn(drain_handler(handler)));
            self.browser = Some(browser);
            info!("browser ready");
        }
        Ok(self.browser.as_ref().ok_or(ResourceError::NotConnected)?)
    }

    /// Release the browser
    ///
    /// For profile-backed browsers the remote process is owned by the
    /// profile manager and may be reused by later sessions, so this only
    /// drops the local CDP connection. Standalone browsers are closed for
    /// real. Teardown never fails; cleanup errors are logged and swallowed.
    #[instrument(skip(self))]
    pub async fn close(&mut self) {
        if self.is_persistent() {
            if let Some(browser) = self.browser.take() {
                drop(browser);
                debug!("detached from profile browser");
            }
            if let Some(task) = self.handler_task.take() {
                task.abort();
            }
        } else {
            if let Some(mut browser) = self.browser.take() {
                if let Err(e) = browser.close().await {
                    warn!("browser close failed: {}", e);
                }
                let _ = browser.wait().await;
            }
            if let Some(task) = self.handler_task.take() {
                let _ = tokio::time::timeout(Duration::from_secs(5), task).await;
            }
            debug!("standalone browser closed");
        }
    }
}

/// Drain the CDP event stream until the connection goes away
async fn drain_handler(mut handler: Handler) {
    while let Some(event) = handler.next().await {
        if event.is_err() {
            debug!("browser handler stream error");
            break;
        }
    }
    debug!("browser handler finished");
}

/// Full profile launch sequence: availability check, existence check,
/// stale-instance stop, start, then CDP connect with bounded retries.
async fn launch_profile(
    client: &ProfileManagerClient,
    config: &ProfileConfig,
) -> Result<(Browser, Handler)> {
    if !client.service_available().await {
        return Err(ProfileError::ServiceUnavailable(config.api_host.clone()).into());
    }
    if !client.profile_exists(&config.user_id).await {
        return Err(ProfileError::NotFound(config.user_id.clone()).into());
    }

    // A stale instance keeps the CDP port busy; stopping one that is not
    // running is not an error.
    client.stop_profile(&config.user_id).await;
    tokio::time::sleep(STOP_SETTLE).await;

    let args = build_launch_args(config);
    let started = client
        .start_profile(&config.user_id, config.headless, &args)
        .await?;
    info!(user_id = %config.user_id, cdp_url = %started.cdp_url, "profile started");
    tokio::time::sleep(START_SETTLE).await;

    connect_cdp(&started.cdp_url).await
}

/// Launch a local browser from a [`LaunchConfig`]
async fn launch_standalone(config: &LaunchConfig) -> Result<(Browser, Handler)> {
    info!(headless = config.headless, "launching standalone browser");

    let mut builder = CdpBrowserConfig::builder()
        .viewport(Viewport {
            width: config.width,
            height: config.height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .request_timeout(REQUEST_TIMEOUT);

    if !config.headless {
        builder = builder.with_head();
    }
    if !config.sandbox {
        builder = builder.arg("--no-sandbox");
    }
    if let Some(ref path) = config.chrome_path {
        builder = builder.chrome_executable(path);
    }
    for arg in &config.extra_args {
        builder = builder.arg(arg);
    }

    let cdp_config = builder.build().map_err(Error::config)?;
    let pair = Browser::launch(cdp_config)
        .await
        .map_err(|e| Error::cdp(e.to_string()))?;
    Ok(pair)
}

/// Handler configuration shared by every CDP connection this crate opens
fn cdp_handler_config() -> HandlerConfig {
    HandlerConfig {
        request_timeout: REQUEST_TIMEOUT,
        ..Default::default()
    }
}

/// Connect to a CDP endpoint with bounded retries
async fn connect_cdp(ws_url: &str) -> Result<(Browser, Handler)> {
    retry_connect(CONNECT_ATTEMPTS, CONNECT_BACKOFF, |attempt| {
        let url = ws_url.to_string();
        async move {
            debug!(attempt, "connecting to CDP endpoint");
            let connect = Browser::connect_with_config(url, cdp_handler_config());
            match tokio::time::timeout(CONNECT_TIMEOUT, connect).await {
                Ok(Ok(pair)) => Ok(pair),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => {
                    Err(ConnectError::Timeout(CONNECT_TIMEOUT.as_millis() as u64).to_string())
                }
            }
        }
    })
    .await
}

/// Bounded retry loop with fixed backoff
///
/// Runs `connect` up to `attempts` times, sleeping `backoff` between
/// attempts, and surfaces the last failure when the bound is exhausted.
pub(crate) async fn retry_connect<T, F, Fut>(
    attempts: u32,
    backoff: Duration,
    mut connect: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, String>>,
{
    let mut last = String::new();
    for attempt in 1..=attempts {
        if attempt > 1 {
            tokio::time::sleep(backoff).await;
        }
        match connect(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, "CDP connect succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) => {
                warn!(attempt, error = %e, "CDP connect attempt failed");
                last = e;
            }
        }
    }
    Err(ConnectError::RetriesExhausted { attempts, last }.into())
}

/// Launch arguments for a profile start: the fixed default set plus the
/// configured proxy, if any.
pub(crate) fn build_launch_args(config: &ProfileConfig) -> Vec<String> {
    let mut args: Vec<String> = DEFAULT_LAUNCH_ARGS.iter().map(|s| s.to_string()).collect();
    if let Some(proxy) = &config.proxy {
        args.push(format!("--proxy-server={}", proxy.server));
        if let Some(bypass) = &proxy.bypass {
            args.push(format!("--proxy-bypass-list={}", bypass));
        }
    }
    args
}
