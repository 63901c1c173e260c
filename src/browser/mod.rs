//! Browser lifecycle and session adaptation
//!
//! This module manages the connection to the underlying Chromium instance
//! (profile-backed over CDP, or locally launched) and adapts it into the
//! context/page/state resources an automation session consumes.

pub mod context;
pub mod remote;
pub mod state;

pub use context::{ContextHandle, SessionContext};
pub use remote::{BrowserSource, LaunchConfig, LaunchConfigBuilder, RemoteBrowser};
pub use state::BrowserState;
