//! Direct field updates for phrases carrying `itemid` and `fieldid`

use crate::context::{PhraseOutcome, RunContext};
use crate::document::Phrase;
use crate::error::PhraseSkip;
use crate::fields::update_fields;
use crate::reconcile::{reconcile, DictionaryTarget};
use crate::section::SectionCache;
use anyhow::Result;
use phrasebook_core::{ContentStore, ItemId, Record};
use tracing::debug;

/// Write the phrase's languages into one field of an existing record
///
/// A missing record whose `path` lies under the dictionary is reconciled
/// as a dictionary phrase instead.
pub fn update_direct(
    ctx: &RunContext<'_>,
    store: &dyn ContentStore,
    dictionary: &DictionaryTarget<'_>,
    cache: &mut SectionCache,
    phrase: &Phrase,
) -> Result<PhraseOutcome> {
    let attributes = &phrase.attributes;

    match find_record(store, &attributes.item_id)? {
        Some(record) => {
            let written = update_fields(ctx, store, &record, &attributes.field_id, phrase)?;
            Ok(PhraseOutcome::Updated {
                record: record.id,
                written,
            })
        }
        None if attributes.path.starts_with(&ctx.config.dictionary_path_prefix) => {
            debug!(item = %attributes.item_id, path = %attributes.path, "Redirecting to dictionary");
            reconcile(ctx, dictionary, cache, phrase)
        }
        None => Ok(PhraseOutcome::Skipped(PhraseSkip::ItemNotFound(
            attributes.item_id.clone(),
        ))),
    }
}

/// Look up `reference` as an identifier, or as an absolute path
fn find_record(store: &dyn ContentStore, reference: &str) -> Result<Option<Record>> {
    let reference = reference.trim();
    match ItemId::parse(reference) {
        Ok(id) => store.get(&id),
        Err(_) if reference.starts_with('/') => store.get_by_path(reference),
        Err(_) => Ok(None),
    }
}
