//! Client defaults in serializable form.
//!
//! [`ClientConfig`] mirrors the client builder for callers that keep their
//! defaults in JSON (or anything serde can turn into a `serde_json::Value`).
//! Every shape problem surfaces as [`Error::Configuration`] when the config is
//! read, never on the first call.

use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Client defaults as plain data. Durations are in milliseconds.
///
/// # Examples
///
/// ```
/// use courier::config::ClientConfig;
///
/// let config = ClientConfig::from_value(serde_json::json!({
///     "headers": { "user-agent": "courier-demo/1.0" },
///     "timeout": 5000,
///     "retries": 2,
///     "baseRetryDelay": 100
/// }))
/// .unwrap();
/// assert_eq!(config.retries, Some(2));
///
/// let invalid = ClientConfig::from_value(serde_json::json!({ "headers": ["nope"] }));
/// assert!(invalid.is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL that relative call URLs are resolved against.
    pub base_url: Option<String>,

    /// Headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Per-attempt timeout in milliseconds. 0 disables it.
    pub timeout: Option<u64>,

    /// Maximum redirect hops.
    pub redirects: Option<usize>,

    /// Maximum retries beyond the first attempt.
    pub retries: Option<usize>,

    /// Base backoff delay in milliseconds.
    pub base_retry_delay: Option<u64>,

    /// Backoff ceiling in milliseconds.
    pub max_retry_delay: Option<u64>,
}

impl ClientConfig {
    /// Reads a config from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for non-object headers, non-integer or
    /// negative limits, and unknown keys.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::configuration(format!("Invalid client configuration: {}", e)))
    }

    /// Reads a config from JSON text.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_value`], plus malformed JSON.
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::configuration(format!("Invalid client configuration: {}", e)))
    }
}
