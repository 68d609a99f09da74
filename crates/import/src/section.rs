//! Section bucket cache
//!
//! Entries under a dictionary root are grouped into buckets named after the
//! upper-cased first character of the entry name. The cache keeps every
//! bucket touched during one run, per root, together with an index of the
//! bucket's entries by case-folded name. Nothing is invalidated during the
//! run: buckets created by someone else after they were cached stay unseen.

use crate::create::RecordFactory;
use ahash::AHashMap;
use anyhow::Result;
use phrasebook_core::{ContentStore, ItemId, Record, Template};
use std::collections::hash_map::Entry;
use tracing::debug;

/// One bucket and its entries
#[derive(Debug, Clone)]
pub struct DictionarySection {
    item: Record,
    entries: AHashMap<String, Record>,
}

impl DictionarySection {
    /// Index the existing children of `item` in one enumeration
    pub fn load(store: &dyn ContentStore, item: Record) -> Result<Self> {
        let entries = store
            .children(&item.id)?
            .into_iter()
            .map(|child| (child.lookup_name(), child))
            .collect();
        Ok(Self { item, entries })
    }

    /// The bucket record
    pub fn item(&self) -> &Record {
        &self.item
    }

    /// Entry named `name` (case-insensitive)
    pub fn entry(&self, name: &str) -> Option<&Record> {
        self.entries.get(&name.to_lowercase())
    }

    /// Index a newly created entry
    pub fn add_entry(&mut self, entry: Record) {
        self.entries.insert(entry.lookup_name(), entry);
    }

    /// Number of indexed entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the bucket has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Run-scoped buckets, keyed by dictionary root and bucket name
#[derive(Debug, Default)]
pub struct SectionCache {
    roots: AHashMap<ItemId, AHashMap<String, DictionarySection>>,
}

impl SectionCache {
    /// Empty cache for a new run
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached bucket, loading or creating it on first use
    ///
    /// An existing child named `bucket` wins. Otherwise the bucket is created
    /// at the identifier derived from the root path and bucket name, falling
    /// back to a store-assigned identifier.
    pub fn get_or_create_bucket(
        &mut self,
        factory: &RecordFactory<'_>,
        root: &Record,
        bucket: &str,
        template: &Template,
    ) -> Result<&mut DictionarySection> {
        let sections = self.roots.entry(root.id).or_default();
        match sections.entry(bucket.to_string()) {
            Entry::Occupied(cached) => Ok(cached.into_mut()),
            Entry::Vacant(slot) => {
                let store = factory.store();
                let item = match store.child(&root.id, bucket)? {
                    Some(existing) => existing,
                    None => match factory.create_persistent(root, bucket, bucket, template, |_| true)? {
                        Some(created) => created,
                        None => factory.create_named(root, bucket, template)?,
                    },
                };

                let section = DictionarySection::load(store, item)?;
                debug!(
                    root = %root.path,
                    bucket,
                    entries = section.len(),
                    "Loaded dictionary section"
                );
                Ok(slot.insert(section))
            }
        }
    }

    /// Number of cached buckets across all roots
    pub fn bucket_count(&self) -> usize {
        self.roots.values().map(|sections| sections.len()).sum()
    }
}
