//! Checks run on a language file before languages are offered for import

use crate::document::PhraseDocument;
use crate::error::FileCheckError;
use std::path::Path;

/// What a valid language file offers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageFileInfo {
    /// Languages of the first phrase, in document order
    pub languages: Vec<String>,
    /// Number of phrases in the file
    pub phrases: usize,
}

/// Validate `path` and list the languages it offers
pub fn inspect_language_file(path: &str) -> Result<LanguageFileInfo, FileCheckError> {
    if path.is_empty() {
        return Err(FileCheckError::NoFile);
    }
    if path == "." || path.chars().any(char::is_control) {
        return Err(FileCheckError::InvalidCharacters);
    }

    let file = Path::new(path);
    if !file.is_file() {
        return Err(FileCheckError::NotFound(path.to_string()));
    }

    let document = PhraseDocument::load(file).map_err(|e| {
        tracing::debug!(path, "Rejected language file: {}", e);
        FileCheckError::InvalidFormat(path.to_string())
    })?;
    if document.is_empty() {
        return Err(FileCheckError::InvalidFormat(path.to_string()));
    }

    Ok(LanguageFileInfo {
        languages: document.offered_languages(),
        phrases: document.len(),
    })
}
