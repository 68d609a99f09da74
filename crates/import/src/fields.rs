//! Per-language field writes shared by dictionary and direct phrases

use crate::context::RunContext;
use crate::document::{Phrase, PhraseChild};
use anyhow::Result;
use phrasebook_core::{ContentStore, Editing, Language, Record};
use tracing::{debug, warn};

/// Write each requested language child of `phrase` into `field` of `target`
///
/// Non-element children are logged and skipped. Languages that were not
/// requested, variants the store cannot load, missing fields and shared
/// fields are skipped silently. A write the store refuses leaves the prior
/// value in place and is logged; the next child is still processed.
///
/// Returns the number of values written. Store lookups that fail are
/// returned as errors.
pub fn update_fields(
    ctx: &RunContext<'_>,
    store: &dyn ContentStore,
    target: &Record,
    field: &str,
    phrase: &Phrase,
) -> Result<usize> {
    let mut written = 0;

    for child in &phrase.children {
        let (name, text) = match child {
            PhraseChild::Invalid { xml } => {
                ctx.status.log_error(&format!("Invalid entry in file at {}", xml));
                continue;
            }
            PhraseChild::Language { name, text } => (name, text),
        };

        if !ctx.requests(name) {
            continue;
        }

        let language = Language::new(name.as_str());
        let Some(variant) = store.get_in(&target.id, &language)? else {
            debug!(path = %target.path, %language, "No variant for language");
            continue;
        };
        let Some(existing) = variant.field(field) else {
            continue;
        };
        if !existing.translatable {
            continue;
        }

        match write_value(store, &variant, &existing.name, text) {
            Ok(()) => written += 1,
            Err(e) => {
                warn!(path = %variant.path, %language, field, "Field update rejected: {:#}", e);
                ctx.status.log_error(&format!(
                    "Failed to update field \"{}\" of \"{}\" in \"{}\": {:#}",
                    existing.name, variant.path, language, e
                ));
            }
        }
    }

    Ok(written)
}

fn write_value(store: &dyn ContentStore, variant: &Record, field: &str, value: &str) -> Result<()> {
    let mut editing = Editing::begin(store, variant)?;
    editing.set(field, value)?;
    editing.commit()
}
