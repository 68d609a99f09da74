//! Error types for language imports

use crate::suppress::Toggle;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for import operations
pub type Result<T> = std::result::Result<T, ImportError>;

/// Conditions that abort a whole import batch
#[derive(Error, Debug)]
pub enum ImportError {
    /// Request rejected before the job starts
    #[error("Invalid import request: {0}")]
    InvalidRequest(String),

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Target database is not known to the store provider
    #[error("Database \"{0}\" not found")]
    UnknownDatabase(String),

    /// Dictionary root path does not resolve in the target database
    #[error("Dictionary root \"{0}\" not found")]
    MissingDictionaryRoot(String),

    /// Required template missing from the target database
    #[error("Template \"{0}\" not found")]
    MissingTemplate(String),

    /// Input file could not be read
    #[error("Failed to read \"{}\"", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input file is not well-formed XML
    #[error("Invalid language file: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Input file is XML but structurally unusable
    #[error("Invalid language file: {0}")]
    Malformed(String),

    /// Host refused a batch switch
    #[error("Failed to enter {toggle} suppression: {cause:#}")]
    Suppression { toggle: Toggle, cause: anyhow::Error },

    /// Store collaborator failed
    #[error("Store operation failed: {0:#}")]
    Store(anyhow::Error),
}

impl From<anyhow::Error> for ImportError {
    fn from(error: anyhow::Error) -> Self {
        ImportError::Store(error)
    }
}

/// Conditions that skip a single phrase; the message is the job log line
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhraseSkip {
    #[error("Missing key in \"{0}\"")]
    MissingKey(String),

    #[error("{reason} in \"{phrase}\"")]
    InvalidName { reason: String, phrase: String },

    #[error("Dictionary domain \"{0}\" not found.")]
    UnknownDomain(String),

    #[error("Dictionary item for domain \"{0}\" not found.")]
    DomainWithoutRoot(String),

    #[error("Item \"{0}\" not found.")]
    ItemNotFound(String),
}

/// Reasons a language file is not offered for import
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileCheckError {
    #[error("Please specify a language file.")]
    NoFile,

    #[error("The name contains invalid characters.")]
    InvalidCharacters,

    #[error("The language file \"{0}\" does not exist.")]
    NotFound(String),

    #[error("The format of the language file \"{0}\" is invalid.")]
    InvalidFormat(String),
}
