//! Relay configuration
//!
//! Serde-backed configuration model with built-in defaults. A host app can
//! deserialize a full `RelayConfig` from JSON, or start from `Default` and
//! override individual fields. Empty category lists are valid: the
//! classifier falls back to its built-in definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::RelayError;
use crate::types::Direction;

/// A user-configurable notification category definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDef {
    /// Stable identifier ("navigation", "phone_call", "message", "battery", ...)
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// App identifiers that strongly indicate this category
    #[serde(default)]
    pub apps: Vec<String>,
    /// Body keywords, matched case-insensitively
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Title substrings, matched case-insensitively
    #[serde(default)]
    pub title_patterns: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// Extra phrases merged into the parser's built-in tables. All lists are
/// additive; the built-ins always remain active.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavigationKeywords {
    /// Additional phrases per direction, appended to that direction's
    /// built-in phrase set
    #[serde(default)]
    pub directions: HashMap<Direction, Vec<String>>,
    #[serde(default)]
    pub destination: Vec<String>,
    #[serde(default)]
    pub roundabout: Vec<String>,
    #[serde(default)]
    pub maneuvers: Vec<String>,
    /// Extra words that mark a text as plausibly a navigation cue
    #[serde(default)]
    pub hints: Vec<String>,
}

/// Wire format constraints for the peripheral
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatProfile {
    /// Hard limit on an encoded payload; oversize payloads are rejected,
    /// never truncated
    #[serde(default = "default_max_payload")]
    pub max_payload_bytes: usize,
}

fn default_max_payload() -> usize {
    512
}

impl Default for FormatProfile {
    fn default() -> Self {
        FormatProfile {
            max_payload_bytes: default_max_payload(),
        }
    }
}

/// Link layer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Advertised name of the display peripheral to connect to
    #[serde(default = "default_peer_name")]
    pub peer_name: String,
    #[serde(default = "default_service_uuid")]
    pub service_uuid: String,
    #[serde(default = "default_characteristic_uuid")]
    pub characteristic_uuid: String,
    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_peer_name() -> String {
    "ESP32_BLE".to_string()
}

fn default_service_uuid() -> String {
    "12345678-1234-1234-1234-1234567890ab".to_string()
}

fn default_characteristic_uuid() -> String {
    "abcd1234-5678-90ab-cdef-1234567890ab".to_string()
}

fn default_scan_timeout_ms() -> u64 {
    10_000
}

fn default_reconnect_delay_ms() -> u64 {
    5_000
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            peer_name: default_peer_name(),
            service_uuid: default_service_uuid(),
            characteristic_uuid: default_characteristic_uuid(),
            scan_timeout_ms: default_scan_timeout_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

/// Top-level relay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// User-configured categories; empty means classifier built-ins only
    #[serde(default)]
    pub categories: Vec<CategoryDef>,
    #[serde(default)]
    pub keywords: NavigationKeywords,
    #[serde(default)]
    pub format: FormatProfile,
    #[serde(default)]
    pub link: LinkConfig,
}

impl RelayConfig {
    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, RelayError> {
        let config: RelayConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the relay cannot operate with
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.format.max_payload_bytes == 0 {
            return Err(RelayError::InvalidConfig(
                "max_payload_bytes must be greater than zero".to_string(),
            ));
        }
        if self.link.peer_name.is_empty() {
            return Err(RelayError::InvalidConfig(
                "link.peer_name must not be empty".to_string(),
            ));
        }
        for def in &self.categories {
            if def.id.is_empty() {
                return Err(RelayError::InvalidConfig(
                    "category id must not be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
