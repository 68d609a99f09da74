//! Per-run state shared by the phrase handlers

use crate::config::ImportConfig;
use crate::error::PhraseSkip;
use phrasebook_core::{ItemId, NamingPolicy};
use phrasebook_journal::StatusSink;

/// Borrowed view of one import run
pub struct RunContext<'a> {
    pub config: &'a ImportConfig,
    pub naming: &'a dyn NamingPolicy,
    /// Requested languages, matched exactly
    pub languages: &'a [String],
    pub status: &'a dyn StatusSink,
}

impl RunContext<'_> {
    /// True when values for `language` should be written
    pub fn requests(&self, language: &str) -> bool {
        self.languages.iter().any(|requested| requested == language)
    }
}

/// What happened to one phrase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhraseOutcome {
    /// Values were written through this record
    Updated { record: ItemId, written: usize },
    /// Phrase skipped; the reason goes to the job log
    Skipped(PhraseSkip),
}
