//! Phrasebook Import - language file importer
//!
//! This crate provides:
//! - Phrase file parsing
//! - The section bucket cache and identity-first record creation
//! - Dictionary phrase reconciliation and direct field updates
//! - The import driver, run inline or as a background job
//! - Batch-scoped side-effect suppression
//! - Language file inspection

pub mod config;
pub mod context;
pub mod create;
pub mod direct;
pub mod document;
pub mod driver;
pub mod error;
pub mod fields;
pub mod languages;
pub mod reconcile;
pub mod section;
pub mod suppress;

// Re-exports
pub use config::ImportConfig;
pub use context::{PhraseOutcome, RunContext};
pub use document::{Phrase, PhraseAttributes, PhraseChild, PhraseDocument};
pub use driver::{ImportRequest, Importer, RunSummary, JOB_NAME};
pub use error::{FileCheckError, ImportError, PhraseSkip, Result};
pub use languages::{inspect_language_file, LanguageFileInfo};
pub use section::{DictionarySection, SectionCache};
pub use suppress::{NoSideEffects, ProcessToggles, SideEffects, SuppressionGuard, Toggle};
