//! Identity-first record creation
//!
//! Buckets and entries are created under an identifier derived from
//! `(parent path, logical key)` so re-imports land on the same records. When
//! the derived identifier is taken by an unrelated record, or the store keeps
//! refusing it, creation falls back to a store-assigned identifier.

use anyhow::Result;
use phrasebook_core::{derive_id_with, ContentStore, IdentityScheme, ItemId, Record, Template};
use tracing::{debug, warn};

/// Creates records in one store
pub struct RecordFactory<'a> {
    store: &'a dyn ContentStore,
    identity: &'a dyn IdentityScheme,
    attempts: u32,
}

impl<'a> RecordFactory<'a> {
    /// `attempts` bounds identity-based tries on store errors
    pub fn new(store: &'a dyn ContentStore, identity: &'a dyn IdentityScheme, attempts: u32) -> Self {
        Self {
            store,
            identity,
            attempts: attempts.max(1),
        }
    }

    /// Store the factory writes to
    pub fn store(&self) -> &'a dyn ContentStore {
        self.store
    }

    /// Identifier `key` maps to under `parent`
    pub fn derived_id(&self, parent: &Record, key: &str) -> ItemId {
        derive_id_with(self.identity, &parent.path, key)
    }

    /// Find or create `name` under `parent` at the identifier derived from `key`
    ///
    /// A record already at that identifier is reused when it lives below
    /// `parent` and `accept` agrees. `Ok(None)` asks the caller to fall back
    /// to [`RecordFactory::create_named`].
    pub fn create_persistent<F>(
        &self,
        parent: &Record,
        name: &str,
        key: &str,
        template: &Template,
        accept: F,
    ) -> Result<Option<Record>>
    where
        F: Fn(&Record) -> bool,
    {
        let id = self.derived_id(parent, key);

        for attempt in 1..=self.attempts {
            match self.try_create_at(parent, name, template, id, &accept) {
                Ok(found) => return Ok(found),
                Err(e) => warn!(
                    attempt,
                    attempts = self.attempts,
                    parent = %parent.path,
                    name,
                    "Identity-based creation failed: {:#}",
                    e
                ),
            }
        }

        warn!(parent = %parent.path, name, "Falling back to name-based creation");
        Ok(None)
    }

    /// Create `name` under `parent` with a store-assigned identifier
    pub fn create_named(&self, parent: &Record, name: &str, template: &Template) -> Result<Record> {
        let record = self.store.create(&parent.id, name, template, None)?;
        debug!(path = %record.path, id = %record.id, "Created record by name");
        Ok(record)
    }

    fn try_create_at<F>(
        &self,
        parent: &Record,
        name: &str,
        template: &Template,
        id: ItemId,
        accept: &F,
    ) -> Result<Option<Record>>
    where
        F: Fn(&Record) -> bool,
    {
        match self.store.get(&id)? {
            None => {
                let record = self.store.create(&parent.id, name, template, Some(id))?;
                debug!(path = %record.path, %id, "Created record at derived identifier");
                Ok(Some(record))
            }
            Some(existing) if existing.is_descendant_of(&parent.id) && accept(&existing) => {
                Ok(Some(existing))
            }
            Some(existing) => {
                debug!(
                    %id,
                    found = %existing.path,
                    parent = %parent.path,
                    "Derived identifier belongs to another record"
                );
                Ok(None)
            }
        }
    }
}
