//! Session lifecycle tests
//!
//! The ignored tests need a local Chromium; the profile-backed ones
//! additionally need a running profile-manager service with the named
//! profile configured. Run them explicitly:
//!
//! ```text
//! PROFILE_BRIDGE_TEST_USER_ID=kx3m9q cargo test -- --ignored
//! ```

use chromiumoxide::cdp::browser_protocol::target::GetBrowserContextsParams;
use profile_bridge::{LaunchConfig, ProfileConfig, SessionContext};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn test_profile_config() -> ProfileConfig {
    let user_id = std::env::var("PROFILE_BRIDGE_TEST_USER_ID")
        .expect("set PROFILE_BRIDGE_TEST_USER_ID to a configured profile id");
    ProfileConfig::builder()
        .user_id(user_id)
        .headless(true)
        .build()
        .unwrap()
}

fn headless_launch() -> LaunchConfig {
    LaunchConfig::builder().headless(true).sandbox(false).build()
}

#[tokio::test]
#[ignore] // Needs a running Chromium
async fn standalone_page_is_always_fresh() {
    init_tracing();
    let mut session = SessionContext::standalone(headless_launch());

    let first_id = session.page().await.unwrap().target_id().clone();

    // A second session against its own browser gets its own page; within
    // one session the page is memoized.
    let second_id = session.page().await.unwrap().target_id().clone();
    assert_eq!(first_id, second_id);

    // The page lives in the session's dedicated context, not the default
    // one the browser started with.
    let context = session.context().await.unwrap().clone();
    assert!(!context.is_persistent());
    assert!(context.id().is_some());

    session.close().await;
    assert!(!session.has_context());
    assert!(session.current_page().is_none());
    assert!(session.current_state().is_none());
}

#[tokio::test]
#[ignore] // Needs a running Chromium
async fn standalone_state_snapshot_is_memoized() {
    init_tracing();
    let mut session = SessionContext::standalone(headless_launch());

    let first_at = session.state(false).await.unwrap().captured_at;
    let second_at = session.state(false).await.unwrap().captured_at;
    assert_eq!(first_at, second_at);

    let refreshed_at = session.refresh_state(false).await.unwrap().captured_at;
    assert!(refreshed_at >= first_at);

    session.close().await;
}

#[tokio::test]
#[ignore] // Needs a running Chromium
async fn standalone_context_disposed_even_when_page_close_fails() {
    init_tracing();
    let mut session = SessionContext::standalone(headless_launch());

    let context_id = session.context().await.unwrap().id().unwrap().clone();

    // Kill the page out of band so the teardown's own page close fails.
    let doomed = session.page().await.unwrap().clone();
    let _ = doomed.close().await;

    session.reset().await;
    assert!(!session.has_context());
    assert!(session.current_page().is_none());

    // The dispose still went through: the context is no longer listed.
    let browser = session.browser().connected().unwrap();
    let contexts = browser
        .execute(GetBrowserContextsParams::default())
        .await
        .unwrap();
    assert!(!contexts.result.browser_context_ids.contains(&context_id));

    session.close().await;
}

#[tokio::test]
#[ignore] // Needs a running Chromium
async fn standalone_vision_state_carries_screenshot() {
    init_tracing();
    let mut session = SessionContext::standalone(headless_launch());

    let state = session.state(true).await.unwrap();
    assert!(state.has_vision());
    assert!(state.screenshot_base64().is_some());

    session.close().await;
}

#[tokio::test]
#[ignore] // Needs a running profile manager and Chromium
async fn profile_session_reuses_existing_page() {
    init_tracing();
    let mut session = SessionContext::profile(test_profile_config()).unwrap();

    // Profiles resolve to the persistent default context.
    let context = session.context().await.unwrap().clone();
    assert!(context.is_persistent());

    let first_id = session.page().await.unwrap().target_id().clone();
    let second_id = session.page().await.unwrap().target_id().clone();
    assert_eq!(first_id, second_id);

    session.close().await;
    assert!(!session.has_context());
    assert!(session.current_page().is_none());
    assert!(session.current_state().is_none());
}

#[tokio::test]
#[ignore] // Needs a running profile manager and Chromium
async fn profile_survives_session_close() {
    init_tracing();
    let config = test_profile_config();

    let mut first = SessionContext::profile(config.clone()).unwrap();
    first.state(false).await.unwrap();
    first.close().await;

    // Close never stops the remote profile; a later session can launch the
    // same profile again and gets its persisted storage back.
    let mut second = SessionContext::profile(config).unwrap();
    second.state(false).await.unwrap();
    second.close().await;
}
