//! Shared utilities for stockcast
//!
//! This crate provides common functionality used across the stockcast workspace:
//! tracing setup and application metadata shared by the server and the CLI.

pub mod config;
pub mod logging;

pub use config::AppInfo;
pub use logging::{LogFormat, init_tracing_with};
