//! Directory client configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the directory client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Base URL for the vendor API (e.g. `https://api.teamdrive.example.com`).
    pub api_base_url: String,
    /// Items requested per page on paginated listings.
    pub page_size: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Base delay for async-job status polling (doubles each attempt).
    pub job_poll_base_ms: u64,
    /// Polls before an async job is declared stuck.
    pub job_poll_max_attempts: u32,
    /// Maximum bytes one property field may hold; larger values are split.
    pub property_field_ceiling: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.teamdrive.example.com".to_string(),
            page_size: 100,
            timeout_secs: 60,
            job_poll_base_ms: 1_000,
            job_poll_max_attempts: 10,
            property_field_ceiling: 1024,
        }
    }
}
