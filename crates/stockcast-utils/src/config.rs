//! Application metadata shared by the binaries

use serde::{Deserialize, Serialize};

/// Identifies the running application in logs and health responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    /// Application name
    pub app_name: String,
    /// Crate version
    pub version: String,
    /// Environment (dev, prod, etc.)
    pub environment: String,
}

impl AppInfo {
    /// Build metadata for a named binary
    pub fn new(app_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            version: version.into(),
            environment: std::env::var("STOCKCAST_ENV").unwrap_or_else(|_| "development".to_string()),
        }
    }
}

impl Default for AppInfo {
    fn default() -> Self {
        Self {
            app_name: "stockcast".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}
