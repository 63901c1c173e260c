//! Profile-manager HTTP client
//!
//! Thin client for the profile manager's local REST API. Every operation
//! except [`ProfileManagerClient::start_profile`] degrades to boolean or
//! best-effort semantics: a profile that is not running yet, or a service
//! that cannot be reached, is an expected condition everywhere except at
//! start time, which is the one call whose failure must abort the session.

use crate::error::{ProfileError, Result};
use crate::profile::ProfileConfig;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Launch arguments sent with every start request. Empirically tuned for
/// automation against fingerprint-isolated profiles.
pub const DEFAULT_LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-blink-features=AutomationControlled",
    "--disable-web-security",
    "--disable-features=IsolateOrigins,site-per-process",
    "--start-maximized",
    "--disable-notifications",
    "--ignore-certificate-errors",
];

/// Response envelope shared by all API endpoints
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ProfileList {
    #[serde(default)]
    list: Vec<ProfileEntry>,
}

#[derive(Debug, Deserialize)]
struct ProfileEntry {
    user_id: String,
}

#[derive(Debug, Deserialize)]
struct StartData {
    ws: WsEndpoints,
    #[serde(default)]
    debug_port: Option<String>,
}

/// WebSocket endpoints reported by the start endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct WsEndpoints {
    /// CDP WebSocket endpoint URL
    pub puppeteer: String,
    /// Selenium-compatible address, when the service exposes one
    #[serde(default)]
    pub selenium: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActiveData {
    #[serde(default)]
    status: String,
}

/// A successfully started profile
#[derive(Debug, Clone)]
pub struct StartedProfile {
    /// CDP WebSocket endpoint URL to connect to
    pub cdp_url: String,
    /// Selenium-compatible address, when reported
    pub selenium_url: Option<String>,
    /// Remote-debugging port, when reported
    pub debug_port: Option<String>,
}

/// Client for the profile manager's REST API
#[derive(Debug, Clone)]
pub struct ProfileManagerClient {
    http: reqwest::Client,
    base_url: String,
}

impl ProfileManagerClient {
    /// Create a client for the given API host
    pub fn new(api_host: &str, timeout_ms: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: api_host.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from a profile configuration
    pub fn from_config(config: &ProfileConfig) -> Result<Self> {
        Self::new(&config.api_host, config.timeout_ms)
    }

    /// The normalized API base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check whether the service answers its status endpoint
    ///
    /// Never fails: network errors map to `false`.
    pub async fn service_available(&self) -> bool {
        let url = format!("{}/status", self.base_url);
        match self.http.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("profile manager status check failed: {}", e);
                false
            }
        }
    }

    /// Check whether `user_id` appears in the service's profile list
    ///
    /// Any error or non-zero response code maps to `false`.
    pub async fn profile_exists(&self, user_id: &str) -> bool {
        let url = format!("{}/api/v1/user/list", self.base_url);
        let resp = match self.http.get(&url).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!("profile list request failed: {}", e);
                return false;
            }
        };
        let envelope: ApiEnvelope<ProfileList> = match resp.json().await {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!("profile list response invalid: {}", e);
                return false;
            }
        };
        profile_in_list(&envelope, user_id)
    }

    /// Check whether `user_id` is currently running
    ///
    /// Any error maps to `false`.
    pub async fn profile_active(&self, user_id: &str) -> bool {
        let url = format!("{}/api/v1/browser/active", self.base_url);
        let resp = match self
            .http
            .get(&url)
            .query(&[("user_id", user_id)])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                debug!("profile active request failed: {}", e);
                return false;
            }
        };
        match resp.json::<ApiEnvelope<ActiveData>>().await {
            Ok(envelope) => {
                envelope.code == 0
                    && envelope
                        .data
                        .map(|d| d.status == "Active")
                        .unwrap_or(false)
            }
            Err(e) => {
                debug!("profile active response invalid: {}", e);
                false
            }
        }
    }

    /// Ask the service to stop a running profile, best-effort
    ///
    /// Failures are logged, not propagated: stopping a profile that is not
    /// running is not an error, and the caller proceeds regardless.
    #[instrument(skip(self))]
    pub async fn stop_profile(&self, user_id: &str) {
        let url = format!("{}/api/v1/browser/stop", self.base_url);
        match self
            .http
            .get(&url)
            .query(&[("user_id", user_id)])
            .send()
            .await
        {
            Ok(resp) => debug!("stop request returned {}", resp.status()),
            Err(e) => warn!("failed to stop profile {}: {}", user_id, e),
        }
    }

    /// Ask the service to start a profile and return its CDP endpoint
    ///
    /// A non-zero response code fails with [`ProfileError::StartFailed`]
    /// carrying the service-provided message.
    #[instrument(skip(self, launch_args))]
    pub async fn start_profile(
        &self,
        user_id: &str,
        headless: bool,
        launch_args: &[String],
    ) -> Result<StartedProfile> {
        let url = format!("{}/api/v1/browser/start", self.base_url);
        let args_json = serde_json::to_string(launch_args)?;
        debug!(headless, launch_args = %args_json, "starting profile");

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("user_id", user_id),
                ("headless", if headless { "1" } else { "0" }),
                ("launch_args", args_json.as_str()),
                ("enable_auto_refresh", "1"),
            ])
            .send()
            .await?;

        let envelope: ApiEnvelope<StartData> = resp.json().await?;
        parse_start_response(envelope)
    }
}

/// Extract the endpoints from a start response, failing with the service's
/// own message on a non-zero code.
fn parse_start_response(envelope: ApiEnvelope<StartData>) -> Result<StartedProfile> {
    if envelope.code != 0 {
        return Err(ProfileError::StartFailed(envelope.msg).into());
    }
    let data = envelope
        .data
        .ok_or_else(|| ProfileError::StartFailed("start response had no data".to_string()))?;
    Ok(StartedProfile {
        cdp_url: data.ws.puppeteer,
        selenium_url: data.ws.selenium,
        debug_port: data.debug_port,
    })
}

fn profile_in_list(envelope: &ApiEnvelope<ProfileList>, user_id: &str) -> bool {
    envelope.code == 0
        && envelope
            .data
            .as_ref()
            .map(|d| d.list.iter().any(|p| p.user_id == user_id))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn list_envelope(json: &str) -> ApiEnvelope<ProfileList> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_profile_in_list() {
        let envelope = list_envelope(
            r#"{"code":0,"msg":"Success","data":{"list":[{"user_id":"kx3m9q","name":"shop-eu"},{"user_id":"ab12cd"}]}}"#,
        );
        assert!(profile_in_list(&envelope, "kx3m9q"));
        assert!(profile_in_list(&envelope, "ab12cd"));
        assert!(!profile_in_list(&envelope, "missing"));
    }

    #[test]
    fn test_profile_list_non_zero_code() {
        let envelope = list_envelope(r#"{"code":-1,"msg":"token invalid","data":null}"#);
        assert!(!profile_in_list(&envelope, "kx3m9q"));
    }

    #[test]
    fn test_profile_list_empty_data() {
        let envelope = list_envelope(r#"{"code":0,"msg":"Success","data":{"list":[]}}"#);
        assert!(!profile_in_list(&envelope, "kx3m9q"));
    }

    #[test]
    fn test_parse_start_response_success() {
        let envelope: ApiEnvelope<StartData> = serde_json::from_str(
            r#"{
                "code": 0,
                "msg": "Success",
                "data": {
                    "ws": {
                        "puppeteer": "ws://127.0.0.1:9321/devtools/browser/abc",
                        "selenium": "127.0.0.1:9321"
                    },
                    "debug_port": "9321",
                    "webdriver": "/opt/chromedriver"
                }
            }"#,
        )
        .unwrap();

        let started = parse_start_response(envelope).unwrap();
        assert_eq!(started.cdp_url, "ws://127.0.0.1:9321/devtools/browser/abc");
        assert_eq!(started.selenium_url.as_deref(), Some("127.0.0.1:9321"));
        assert_eq!(started.debug_port.as_deref(), Some("9321"));
    }

    #[test]
    fn test_parse_start_response_carries_msg_verbatim() {
        let envelope: ApiEnvelope<StartData> =
            serde_json::from_str(r#"{"code":-1,"msg":"user account is locked","data":null}"#)
                .unwrap();

        let err = parse_start_response(envelope).unwrap_err();
        match err {
            Error::Profile(ProfileError::StartFailed(msg)) => {
                assert_eq!(msg, "user account is locked");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_parse_start_response_missing_data() {
        let envelope: ApiEnvelope<StartData> =
            serde_json::from_str(r#"{"code":0,"msg":"Success","data":null}"#).unwrap();
        assert!(parse_start_response(envelope).is_err());
    }

    #[test]
    fn test_launch_args_encode_as_json_array() {
        let args: Vec<String> = DEFAULT_LAUNCH_ARGS.iter().map(|s| s.to_string()).collect();
        let encoded = serde_json::to_string(&args).unwrap();
        assert!(encoded.starts_with('['));
        assert!(encoded.contains("\"--no-sandbox\""));
        assert!(encoded.contains("\"--start-maximized\""));
    }

    #[test]
    fn test_base_url_normalized() {
        let client = ProfileManagerClient::new("http://127.0.0.1:50325///", 1_000).unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:50325");
    }
}
