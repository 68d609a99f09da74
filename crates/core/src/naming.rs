//! Record naming rules

use once_cell::sync::Lazy;
use regex::Regex;

/// Characters a record name may never contain
pub const INVALID_NAME_CHARS: &[char] = &['\\', '/', ':', '?', '"', '<', '>', '|', '[', ']'];

/// Default maximum record name length
pub const DEFAULT_MAX_NAME_LENGTH: usize = 100;

static VALID_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w\*\$][\w\s\-\$]*(\(\d{1,}\))?$").expect("name pattern compiles")
});

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));

/// Naming collaborator consulted before a record is created
pub trait NamingPolicy: Send + Sync {
    /// Longest allowed name, in characters
    fn max_length(&self) -> usize;

    /// Best-effort rewrite of `candidate` into a name the store accepts
    fn propose_valid_name(&self, candidate: &str) -> String;

    /// Reason `name` is rejected, `None` when it is valid
    fn name_error(&self, name: &str) -> Option<String>;
}

/// Naming rules of the content store
#[derive(Debug, Clone)]
pub struct StandardNamingPolicy {
    max_length: usize,
}

impl StandardNamingPolicy {
    /// Policy with a custom maximum length
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Default for StandardNamingPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NAME_LENGTH)
    }
}

impl NamingPolicy for StandardNamingPolicy {
    fn max_length(&self) -> usize {
        self.max_length
    }

    fn propose_valid_name(&self, candidate: &str) -> String {
        let stripped: String = candidate
            .chars()
            .filter(|c| !INVALID_NAME_CHARS.contains(c))
            .collect();
        let collapsed = WHITESPACE_RUN.replace_all(&stripped, " ");
        let trimmed = collapsed.trim().trim_end_matches('.');

        let truncated: String = trimmed.chars().take(self.max_length).collect();
        truncated.trim_end().to_string()
    }

    fn name_error(&self, name: &str) -> Option<String> {
        if name.trim().is_empty() {
            return Some("An item name cannot be blank.".to_string());
        }
        if name.chars().count() > self.max_length {
            return Some(format!(
                "An item name length should be less or equal to {}.",
                self.max_length
            ));
        }
        if name.trim() != name {
            return Some("An item name cannot start or end with blanks.".to_string());
        }
        if name.chars().any(|c| INVALID_NAME_CHARS.contains(&c)) {
            return Some(format!(
                "The item name \"{}\" contains invalid characters.",
                name
            ));
        }
        if name.ends_with('.') {
            return Some("An item name cannot end in a period (.).".to_string());
        }
        if !VALID_NAME.is_match(name) {
            return Some(format!("'{}' is not a valid name.", name));
        }
        None
    }
}
