//! dynaq configuration.
//!
//! All configuration is driven by environment variables; command-line flags
//! override individual fields.

use std::env;

/// Maximum number of requests in one batch write.
pub const MAX_WRITE_BATCH: usize = 25;

/// Global configuration for dynaq.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynaqConfig {
    /// Custom endpoint, e.g. a local emulator.
    pub endpoint_url: Option<String>,
    /// AWS region.
    pub region: String,
    /// Per-request item limit; `None` lets the store decide.
    pub page_size: Option<i32>,
    /// Requests per batch write, between 1 and 25.
    pub write_batch_size: usize,
    /// Log level filter.
    pub log_level: String,
}

impl Default for DynaqConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            region: "us-east-1".to_owned(),
            page_size: None,
            write_batch_size: MAX_WRITE_BATCH,
            log_level: "info".to_owned(),
        }
    }
}

impl DynaqConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = env::var("DYNAQ_ENDPOINT_URL") {
            config.endpoint_url = Some(v).filter(|v| !v.is_empty());
        }
        if let Ok(v) = env::var("DEFAULT_REGION").or_else(|_| env::var("AWS_REGION")) {
            config.region = v;
        }
        if let Some(v) = env::var("DYNAQ_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
        {
            config.page_size = Some(v).filter(|v| *v > 0);
        }
        if let Some(v) = env::var("DYNAQ_WRITE_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            config.write_batch_size = v;
        }
        if let Ok(v) = env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config.normalized()
    }

    /// Clamp values into their valid ranges.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.write_batch_size = self.write_batch_size.clamp(1, MAX_WRITE_BATCH);
        self.page_size = self.page_size.filter(|v| *v > 0);
        self
    }
}
