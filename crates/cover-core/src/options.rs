//! Process-wide settings, built once at startup and passed to constructors.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Everything the service needs to know before handling its first document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Verbosity level (0 = info).
    pub verbose: u8,
    /// Location of the fixed cover image.
    pub cover_path: PathBuf,
    /// Per-document deadline for the async dispatcher.
    pub timeout_secs: u64,
    /// Prepended to the original file name of the reply.
    pub output_prefix: String,
    /// Cap on error detail shown to end users, in characters.
    pub max_detail_len: usize,
    /// Title of the generated EPUB cover page and its TOC entry.
    pub cover_title: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbose: 0,
            cover_path: PathBuf::from("cover.jpg"),
            timeout_secs: 30,
            output_prefix: "modified_".to_string(),
            max_detail_len: 200,
            cover_title: "Cover".to_string(),
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Parse settings from TOML; missing keys keep their defaults.
    pub fn from_toml_str(s: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn to_toml_string(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
