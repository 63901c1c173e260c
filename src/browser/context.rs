//! Session context adapter
//!
//! Bridges a [`RemoteBrowser`] to concrete context/page/state resources.
//! The three resources are lazily and independently memoized: the first
//! caller creates them, subsequent callers reuse. Profile-backed browsers
//! reuse the profile's persistent default context and its existing tabs so
//! that cookies and storage persist across automation runs; standalone
//! browsers get a dedicated context and always a fresh page.

use crate::browser::remote::{LaunchConfig, RemoteBrowser};
use crate::browser::state::BrowserState;
use crate::error::{Error, ResourceError, Result};
use crate::profile::ProfileConfig;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::browser::{
    BrowserContextId, SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::emulation::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::security::SetIgnoreCertificateErrorsParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::Page;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// User agent applied to every page the adapter hands out
pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/91.0.4472.124";

/// Accept-Language applied to every page the adapter hands out
pub(crate) const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

/// Bound on the optimistic readiness waits; a timeout is tolerated
pub(crate) const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle to the CDP browser context a session operates in
///
/// `None` id means the browser's default context: for profile-backed
/// browsers that is the profile's persistent tab set, which must never be
/// disposed from here.
#[derive(Debug, Clone)]
pub struct ContextHandle {
    id: Option<BrowserContextId>,
}

impl ContextHandle {
    /// Whether this is the browser's persistent default context
    pub fn is_persistent(&self) -> bool {
        self.id.is_none()
    }

    /// The created context id, if this is not the default context
    pub fn id(&self) -> Option<&BrowserContextId> {
        self.id.as_ref()
    }
}

/// One logical automation session over a [`RemoteBrowser`]
///
/// Owns at most one context, one page, and one derived state snapshot.
/// All methods take `&mut self`; the memoized fields are intentionally
/// unsynchronized, and exclusive access is what makes that sound.
pub struct SessionContext {
    browser: RemoteBrowser,
    context: Option<ContextHandle>,
    page: Option<Page>,
    state: Option<BrowserState>,
}

impl SessionContext {
    /// Create a session over an existing handle
    pub fn new(browser: RemoteBrowser) -> Self {
        Self {
            browser,
            context: None,
            page: None,
            state: None,
        }
    }

    /// Create a profile-backed session
    pub fn profile(config: ProfileConfig) -> Result<Self> {
        Ok(Self::new(RemoteBrowser::profile(config)?))
    }

    /// Create a standalone session
    pub fn standalone(config: LaunchConfig) -> Self {
        Self::new(RemoteBrowser::standalone(config))
    }

    /// The underlying browser handle
    pub fn browser(&self) -> &RemoteBrowser {
        &self.browser
    }

    /// Whether the session is backed by a persistent profile
    pub fn is_persistent(&self) -> bool {
        self.browser.is_persistent()
    }

    /// The memoized page, if one has been acquired
    pub fn current_page(&self) -> Option<&Page> {
        self.page.as_ref()
    }

    /// The memoized state snapshot, if one has been built
    pub fn current_state(&self) -> Option<&BrowserState> {
        self.state.as_ref()
    }

    /// Whether a context has been acquired
    pub fn has_context(&self) -> bool {
        self.context.is_some()
    }

    /// Get the session's browser context, creating it on first access
    ///
    /// Profile-backed browsers resolve to the persistent default context;
    /// standalone browsers get a dedicated context with downloads enabled.
    #[instrument(skip(self))]
    pub async fn context(&mut self) -> Result<&ContextHandle> {
        if self.context.is_none() {
            let persistent = self.browser.is_persistent();
            let browser = self.browser.get().await?;
            let handle = init_context(browser, persistent).await?;
            debug!(persistent = handle.is_persistent(), "context ready");
            self.context = Some(handle);
        }
        Ok(self.context.as_ref().ok_or(ResourceError::NotConnected)?)
    }

    /// Get the session's page, acquiring one on first access
    ///
    /// Profile-backed browsers reuse the first existing tab when the
    /// profile already has one open; standalone browsers always create a
    /// fresh page for isolation. The page gets explicit session defaults
    /// (downloads, TLS tolerance, UA/Accept-Language overrides) and a
    /// best-effort bounded wait for DOMContentLoaded.
    #[instrument(skip(self))]
    pub async fn page(&mut self) -> Result<&Page> {
        if self.page.is_none() {
            self.context().await?;
            let persistent = self.browser.is_persistent();
            let context_id = self.context.as_ref().and_then(|c| c.id.clone());
            let browser = self.browser.get().await?;

            let page = if persistent {
                let pages = browser
                    .pages()
                    .await
                    .map_err(|e| ResourceError::Page(e.to_string()))?;
                debug!(count = pages.len(), "existing pages in profile");
                match pages.into_iter().next() {
                    Some(page) => {
                        debug!("reusing existing profile page");
                        page
                    }
                    None => new_page_in(browser, None).await?,
                }
            } else {
                new_page_in(browser, context_id).await?
            };

            apply_session_defaults(&page).await?;
            wait_for_ready(&page, DOM_CONTENT_LOADED_SCRIPT, "page load").await;
            self.page = Some(page);
        }
        Ok(self.page.as_ref().ok_or(ResourceError::NotConnected)?)
    }

    /// Get the session's state snapshot, building it on first access
    ///
    /// Waits best-effort for network idle before capturing; a timeout is
    /// logged and tolerated. `use_vision` additionally captures a
    /// screenshot for visual consumers.
    #[instrument(skip(self))]
    pub async fn state(&mut self, use_vision: bool) -> Result<&BrowserState> {
        if self.state.is_none() {
            self.page().await?;
            let page = self.page.as_ref().ok_or(ResourceError::NotConnected)?;
            wait_for_ready(page, NETWORK_IDLE_SCRIPT, "network idle").await;
            let snapshot = BrowserState::capture(page, use_vision).await?;
            self.state = Some(snapshot);
        }
        Ok(self.state.as_ref().ok_or(ResourceError::NotConnected)?)
    }

    /// Drop the memoized snapshot and build a fresh one
    pub async fn refresh_state(&mut self, use_vision: bool) -> Result<&BrowserState> {
        self.state = None;
        self.state(use_vision).await
    }

    /// Release the session's context, page, and state, keeping the browser
    ///
    /// Profile-backed sessions only clear local references: the external
    /// service owns the page and context lifecycles. Standalone sessions
    /// close the page, then dispose the context, each best-effort. The next
    /// resource access starts a fresh context. Teardown never fails.
    #[instrument(skip(self))]
    pub async fn reset(&mut self) {
        if self.browser.is_persistent() {
            self.page = None;
            self.context = None;
        } else {
            // Page before context; a failed page close must not block the
            // context dispose.
            if let Some(page) = self.page.take() {
                if let Err(e) = page.close().await {
                    warn!("page close failed: {}", e);
                }
            }
            if let Some(ctx) = self.context.take() {
                if let Some(id) = ctx.id {
                    if let Some(browser) = self.browser.connected() {
                        if let Err(e) =
                            browser.execute(DisposeBrowserContextParams::new(id)).await
                        {
                            warn!("context dispose failed: {}", e);
                        }
                    }
                }
            }
        }
        self.state = None;
    }

    /// Release the session and the browser behind it
    ///
    /// Runs the [`SessionContext::reset`] teardown, then releases the
    /// browser: profile-backed browsers are only detached from, standalone
    /// ones are closed for real. Teardown never fails.
    #[instrument(skip(self))]
    pub async fn close(&mut self) {
        self.reset().await;
        self.browser.close().await;
    }
}

/// Resolve or create the context and enable downloads in it
async fn init_context(browser: &Browser, persistent: bool) -> Result<ContextHandle> {
    let id = if persistent {
        debug!("using the profile's persistent default context");
        None
    } else {
        let resp = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| ResourceError::Context(e.to_string()))?;
        Some(resp.result.browser_context_id)
    };

    if let Err(e) = allow_downloads(browser, id.clone()).await {
        // Roll back a partially created context before surfacing.
        if let Some(id) = id {
            if let Err(dispose_err) = browser
                .execute(DisposeBrowserContextParams::new(id))
                .await
            {
                warn!("failed to dispose partial context: {}", dispose_err);
            }
        }
        return Err(e);
    }

    Ok(ContextHandle { id })
}

/// Accept downloads in the given context (or browser-wide for the default
/// context). Raw CDP sessions do not inherit sane defaults.
async fn allow_downloads(browser: &Browser, context_id: Option<BrowserContextId>) -> Result<()> {
    let dir = std::env::temp_dir().join("profile-bridge-downloads");
    let _ = std::fs::create_dir_all(&dir);

    let mut builder = SetDownloadBehaviorParams::builder()
        .behavior(SetDownloadBehaviorBehavior::Allow)
        .download_path(dir.to_string_lossy());
    if let Some(id) = context_id {
        builder = builder.browser_context_id(id);
    }
    let params = builder.build().map_err(Error::cdp)?;

    browser
        .execute(params)
        .await
        .map_err(|e| ResourceError::Context(e.to_string()))?;
    Ok(())
}

/// Create a page inside the given context (default context when `None`)
async fn new_page_in(browser: &Browser, context_id: Option<BrowserContextId>) -> Result<Page> {
    let mut params = CreateTargetParams::new("about:blank");
    params.browser_context_id = context_id;
    browser
        .new_page(params)
        .await
        .map_err(|e| ResourceError::Page(e.to_string()).into())
}

/// Apply per-page session defaults: TLS-certificate-error tolerance and the
/// fixed UA/Accept-Language overrides.
async fn apply_session_defaults(page: &Page) -> Result<()> {
    page.execute(SetIgnoreCertificateErrorsParams::new(true))
        .await
        .map_err(|e| ResourceError::Page(e.to_string()))?;

    let ua = SetUserAgentOverrideParams::builder()
        .user_agent(USER_AGENT)
        .accept_language(ACCEPT_LANGUAGE)
        .build()
        .map_err(Error::cdp)?;
    page.execute(ua)
        .await
        .map_err(|e| ResourceError::Page(e.to_string()))?;

    Ok(())
}

const DOM_CONTENT_LOADED_SCRIPT: &str = r#"
    new Promise(resolve => {
        if (document.readyState !== 'loading') {
            resolve(true);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(true));
        }
    })
"#;

const NETWORK_IDLE_SCRIPT: &str = r#"
    new Promise(resolve => {
        if (document.readyState === 'complete') {
            setTimeout(() => resolve(true), 500);
        } else {
            window.addEventListener('load', () => {
                setTimeout(() => resolve(true), 500);
            });
        }
    })
"#;

/// Best-effort bounded readiness wait; an optimistic signal, not a hard
/// precondition, so timeouts are logged and tolerated.
async fn wait_for_ready(page: &Page, script: &str, what: &str) {
    match tokio::time::timeout(READY_TIMEOUT, page.evaluate(script)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!("{} wait failed, continuing anyway: {}", what, e),
        Err(_) => warn!("{} wait timed out, continuing anyway", what),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_empty() {
        let session =
            SessionContext::profile(ProfileConfig::new("kx3m9q").unwrap()).unwrap();
        assert!(session.is_persistent());
        assert!(!session.has_context());
        assert!(session.current_page().is_none());
        assert!(session.current_state().is_none());
    }

    #[test]
    fn test_standalone_session_is_not_persistent() {
        let session = SessionContext::standalone(LaunchConfig::default());
        assert!(!session.is_persistent());
    }

    #[tokio::test]
    async fn test_close_without_launch_clears_references() {
        let mut session =
            SessionContext::profile(ProfileConfig::new("kx3m9q").unwrap()).unwrap();
        session.close().await;
        assert!(!session.has_context());
        assert!(session.current_page().is_none());
        assert!(session.current_state().is_none());

        let mut standalone = SessionContext::standalone(LaunchConfig::default());
        standalone.close().await;
        assert!(!standalone.has_context());
        assert!(standalone.current_page().is_none());
    }

    #[tokio::test]
    async fn test_reset_without_launch_clears_references() {
        let mut session =
            SessionContext::profile(ProfileConfig::new("kx3m9q").unwrap()).unwrap();
        session.reset().await;
        assert!(!session.has_context());
        assert!(session.current_page().is_none());
        assert!(session.current_state().is_none());
    }
}
