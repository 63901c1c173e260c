//! Profile-manager integration
//!
//! Configuration and HTTP client for the local profile-manager service
//! that launches and proxies isolated, persistent browser profiles.

pub mod client;
pub mod config;

pub use client::{ProfileManagerClient, StartedProfile, WsEndpoints, DEFAULT_LAUNCH_ARGS};
pub use config::{ProfileConfig, ProfileConfigBuilder, ProxySettings, DEFAULT_API_HOST};
