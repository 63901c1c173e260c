//! profile-bridge - Persistent Browser Profiles for CDP Automation
//!
//! This crate integrates an AdsPower-style local profile-manager service
//! with chromiumoxide-based browser automation, so automated sessions can
//! reuse persistent, fingerprint-isolated Chromium profiles instead of
//! ephemeral ones.
//!
//! # Architecture
//!
//! ```text
//! SessionContext ──▶ RemoteBrowser ──▶ ProfileManagerClient
//!   (context/page/     (CDP connect,      (start/stop/list
//!    state, memoized)    lifecycle)          over HTTP)
//!                          │                    │
//!                          ▼                    ▼
//!                    CDP WebSocket       profile-manager
//!                    (chromiumoxide)       REST service
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use profile_bridge::{ProfileConfig, SessionContext};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProfileConfig::builder()
//!         .user_id("kx3m9q")
//!         .headless(false)
//!         .build()?;
//!
//!     let mut session = SessionContext::profile(config)?;
//!     let state = session.state(true).await?;
//!     println!("current page: {}", state.url);
//!
//!     // The profile itself stays running for the next session.
//!     session.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod browser;
pub mod error;
pub mod profile;

// Re-exports for convenience
pub use browser::{BrowserState, LaunchConfig, RemoteBrowser, SessionContext};
pub use error::{ConnectError, Error, ProfileError, ResourceError, Result};
pub use profile::{ProfileConfig, ProfileManagerClient, ProxySettings};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
