//! Worker configuration.

use mprop_models::encoding::{parse_encoding_list, DEFAULT_FALLBACK_CHAIN};
use mprop_models::OutputEncoding;
use tracing::warn;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Link source frames into the materialized sequence instead of copying
    pub prefer_links: bool,
    /// Encodings tried after the preferred one fails
    pub fallback_encodings: Vec<OutputEncoding>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            prefer_links: true,
            fallback_encodings: DEFAULT_FALLBACK_CHAIN.to_vec(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let fallback_encodings = match std::env::var("MPROP_FALLBACK_ENCODINGS") {
            Ok(value) => match parse_encoding_list(&value) {
                Ok(chain) => chain,
                Err(e) => {
                    warn!("Ignoring MPROP_FALLBACK_ENCODINGS: {}", e);
                    defaults.fallback_encodings
                }
            },
            Err(_) => defaults.fallback_encodings,
        };

        Self {
            prefer_links: std::env::var("MPROP_LINK_FRAMES")
                .ok()
                .and_then(|s| parse_bool(&s))
                .unwrap_or(defaults.prefer_links),
            fallback_encodings,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
