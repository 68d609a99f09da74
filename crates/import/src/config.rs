//! Import configuration
//!
//! Every key is optional; a missing key keeps its default.
//!
//! ```toml
//! default_database = "master"
//! max_name_length = 100
//! disable_workflow = true
//! ```

use crate::error::{ImportError, Result};
use phrasebook_core::tree::{DICTIONARY_ENTRY_TEMPLATE, DICTIONARY_FOLDER_TEMPLATE};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Settings for the import driver
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    /// Database preselected for imports
    pub default_database: String,
    /// Path of the default dictionary root
    pub dictionary_root: String,
    /// `path` attribute prefix that sends a missing direct item to the dictionary
    pub dictionary_path_prefix: String,
    /// Template of section buckets
    pub folder_template: String,
    /// Template of dictionary entries
    pub entry_template: String,
    /// Canonical key field of entries
    pub key_field: String,
    /// Translated text field of entries
    pub phrase_field: String,
    /// Maximum record name length, in characters
    pub max_name_length: usize,
    /// Suppress workflow enforcement for the batch
    pub disable_workflow: bool,
    /// Suppress change notifications for the batch
    pub disable_events: bool,
    /// Identity-based creation attempts before falling back to name-based creation
    pub identity_create_attempts: u32,
    /// Seconds a finished job stays pollable
    pub job_after_life_secs: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            default_database: "core".to_string(),
            dictionary_root: "/sitecore/system/Dictionary".to_string(),
            dictionary_path_prefix: "/sitecore/system/Dictionary/".to_string(),
            folder_template: DICTIONARY_FOLDER_TEMPLATE.to_string(),
            entry_template: DICTIONARY_ENTRY_TEMPLATE.to_string(),
            key_field: "Key".to_string(),
            phrase_field: "Phrase".to_string(),
            max_name_length: 100,
            disable_workflow: false,
            disable_events: false,
            identity_create_attempts: 2,
            job_after_life_secs: 60,
        }
    }
}

impl ImportConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Reject values the importer cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_name_length < 2 {
            return Err(ImportError::Config(format!(
                "max_name_length must be at least 2, got {}",
                self.max_name_length
            )));
        }
        if self.identity_create_attempts == 0 {
            return Err(ImportError::Config(
                "identity_create_attempts must be at least 1".to_string(),
            ));
        }
        if self.dictionary_root.trim().is_empty() {
            return Err(ImportError::Config("dictionary_root must not be empty".to_string()));
        }
        Ok(())
    }

    /// Retention of finished jobs
    pub fn job_after_life(&self) -> Duration {
        Duration::from_secs(self.job_after_life_secs)
    }
}
