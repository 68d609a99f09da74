//! Dictionary phrase reconciliation
//!
//! Maps a phrase onto a dictionary entry:
//!
//! 1. key: `key` attribute, else the `en` value
//! 2. entry name: key truncated, non-word characters blanked, sanitized
//! 3. root: default dictionary, or the root of the phrase's domain
//! 4. bucket: upper-cased first character of the entry name
//! 5. entry: cached by name, created at a derived identifier when missing;
//!    a name already used by another key gets a `_N` suffix
//! 6. the entry's key field is stamped, then language values are written

use crate::context::{PhraseOutcome, RunContext};
use crate::create::RecordFactory;
use crate::document::Phrase;
use crate::error::PhraseSkip;
use crate::fields::update_fields;
use crate::section::SectionCache;
use anyhow::Result;
use once_cell::sync::Lazy;
use phrasebook_core::{ContentStore, DomainLookup, Editing, NamingPolicy, Record, Template};
use regex::Regex;
use tracing::{debug, warn};

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W").expect("non-word pattern compiles"));

/// Dictionary a run writes to
pub struct DictionaryTarget<'a> {
    pub factory: RecordFactory<'a>,
    /// Default dictionary root
    pub root: Record,
    pub folder_template: Template,
    pub entry_template: Template,
}

impl<'a> DictionaryTarget<'a> {
    /// Store holding the dictionary
    pub fn store(&self) -> &'a dyn ContentStore {
        self.factory.store()
    }
}

/// Resolve or create the entry for `phrase` and write its values
///
/// Phrase-level problems come back as [`PhraseOutcome::Skipped`] without
/// touching the store. Errors are store failures.
pub fn reconcile(
    ctx: &RunContext<'_>,
    target: &DictionaryTarget<'_>,
    cache: &mut SectionCache,
    phrase: &Phrase,
) -> Result<PhraseOutcome> {
    let key = logical_key(phrase);
    if key.is_empty() {
        return Ok(PhraseOutcome::Skipped(PhraseSkip::MissingKey(
            phrase.outer_xml().to_string(),
        )));
    }

    let name = match candidate_name(ctx.naming, key) {
        Ok(name) => name,
        Err(reason) => {
            return Ok(PhraseOutcome::Skipped(PhraseSkip::InvalidName {
                reason,
                phrase: phrase.outer_xml().to_string(),
            }))
        }
    };

    let store = target.store();
    let domain = phrase.attributes.domain.as_str();
    let domain_root;
    let root = if domain.is_empty() {
        &target.root
    } else {
        match store.resolve_domain(domain)? {
            DomainLookup::Root(record) => {
                domain_root = record;
                &domain_root
            }
            DomainLookup::Unknown => {
                return Ok(PhraseOutcome::Skipped(PhraseSkip::UnknownDomain(domain.to_string())))
            }
            DomainLookup::MissingRoot => {
                return Ok(PhraseOutcome::Skipped(PhraseSkip::DomainWithoutRoot(
                    domain.to_string(),
                )))
            }
        }
    };

    let bucket = bucket_name(&name);
    let section =
        cache.get_or_create_bucket(&target.factory, root, &bucket, &target.folder_template)?;

    // The cached copy predates key stamps made earlier in this run
    let existing = match section.entry(&name).map(|cached| cached.id) {
        Some(id) => store.get(&id)?,
        None => None,
    };

    let entry = match existing {
        None => {
            let created = create_entry(ctx, target, section.item(), &name, key)?;
            section.add_entry(created.clone());
            created
        }
        Some(current) => {
            let stored_key = current.value(&ctx.config.key_field);
            if !stored_key.is_empty() && !same_keys(stored_key, key) {
                match resolve_duplicate(ctx, target, section.item(), &current, key)? {
                    Some(entry) => entry,
                    None => {
                        return Ok(PhraseOutcome::Skipped(PhraseSkip::InvalidName {
                            reason: format!(
                                "No free name for \"{}\" within {} characters",
                                name,
                                ctx.naming.max_length()
                            ),
                            phrase: phrase.outer_xml().to_string(),
                        }))
                    }
                }
            } else {
                current
            }
        }
    };

    stamp_key(store, &entry, &ctx.config.key_field, key)?;
    let written = update_fields(ctx, store, &entry, &ctx.config.phrase_field, phrase)?;

    Ok(PhraseOutcome::Updated {
        record: entry.id,
        written,
    })
}

/// `key` attribute, else the English value
pub fn logical_key(phrase: &Phrase) -> &str {
    if phrase.attributes.key.is_empty() {
        phrase.child_value("en")
    } else {
        &phrase.attributes.key
    }
}

/// Entry name for `key`, or the naming policy's reason for rejecting it
///
/// The name is cut to the policy's maximum length before sanitizing.
pub fn candidate_name(naming: &dyn NamingPolicy, key: &str) -> std::result::Result<String, String> {
    let truncated: String = key.trim().chars().take(naming.max_length()).collect();
    let blanked = NON_WORD.replace_all(&truncated, " ");
    let proposed = naming.propose_valid_name(blanked.trim());
    match naming.name_error(&proposed) {
        Some(reason) => Err(reason),
        None => Ok(proposed),
    }
}

/// Bucket holding entries whose name starts like `name`
///
/// Always one character: a first letter whose upper case expands (`ß`)
/// keeps the first character of the mapping.
pub fn bucket_name(name: &str) -> String {
    name.chars()
        .next()
        .and_then(|first| first.to_uppercase().next())
        .map(String::from)
        .unwrap_or_default()
}

/// Keys match when equal after folding CRLF to LF
pub fn same_keys(stored: &str, key: &str) -> bool {
    stored.replace("\r\n", "\n") == key.replace("\r\n", "\n")
}

/// `base` with a `_N` suffix, never longer than `max_length` characters
///
/// The base is shortened to make room; the suffix is kept whole. `None`
/// once the suffix leaves no room for any of the base.
pub fn suffixed_name(base: &str, counter: u32, max_length: usize) -> Option<String> {
    let suffix = format!("_{}", counter);
    let room = max_length.checked_sub(suffix.len()).filter(|room| *room > 0)?;
    let head: String = base.chars().take(room).collect();
    let head = head.trim_end();
    if head.is_empty() {
        return None;
    }
    Some(format!("{}{}", head, suffix))
}

fn create_entry(
    ctx: &RunContext<'_>,
    target: &DictionaryTarget<'_>,
    bucket: &Record,
    name: &str,
    key: &str,
) -> Result<Record> {
    let key_field = ctx.config.key_field.as_str();
    let persistent = target.factory.create_persistent(
        bucket,
        name,
        key,
        &target.entry_template,
        |existing| same_keys(existing.value(key_field), key),
    )?;

    match persistent {
        Some(entry) => Ok(entry),
        None => target
            .factory
            .create_named(bucket, name, &target.entry_template),
    }
}

/// Walk `name_1`, `name_2`, ... until an entry carries `key` or a name is free
///
/// `None` when the suffixes outgrow the name length limit.
fn resolve_duplicate(
    ctx: &RunContext<'_>,
    target: &DictionaryTarget<'_>,
    bucket: &Record,
    entry: &Record,
    key: &str,
) -> Result<Option<Record>> {
    let store = target.store();
    let max_length = ctx.naming.max_length();
    let mut candidate = entry.clone();
    let mut counter = 0u32;

    loop {
        if same_keys(candidate.value(&ctx.config.key_field), key) {
            return Ok(Some(candidate));
        }

        counter += 1;
        let Some(name) = suffixed_name(&entry.name, counter, max_length) else {
            warn!(bucket = %bucket.path, base = %entry.name, key, "Ran out of suffixed names");
            return Ok(None);
        };
        match store.child(&bucket.id, &name)? {
            Some(next) => candidate = next,
            None => {
                debug!(bucket = %bucket.path, name, key, "Entry name taken by another key");
                return create_entry(ctx, target, bucket, &name, key).map(Some);
            }
        }
    }
}

fn stamp_key(store: &dyn ContentStore, entry: &Record, key_field: &str, key: &str) -> Result<()> {
    if entry.value(key_field) == key {
        return Ok(());
    }
    let mut editing = Editing::begin(store, entry)?;
    editing.set(key_field, key)?;
    editing.commit()
}
