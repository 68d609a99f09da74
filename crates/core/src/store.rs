//! Store collaborator traits and the edit bracket
//!
//! The importer never talks to a concrete backend. It sees a
//! [`ContentStore`] (one named database of records) obtained from a
//! [`StoreProvider`], and wraps every write in an [`Editing`] bracket.

use crate::hash::ItemId;
use crate::tree::{Language, Record, Template};
use anyhow::Result;
use dashmap::DashMap;
use std::sync::Arc;

/// Result of resolving a named dictionary domain
#[derive(Debug, Clone)]
pub enum DomainLookup {
    /// No domain with that name exists
    Unknown,
    /// The domain exists but its definition has no dictionary root record
    MissingRoot,
    /// The domain's dictionary root
    Root(Record),
}

/// One named database of hierarchical, keyed records
///
/// Lookups return `Ok(None)` for missing records; `Err` is reserved for
/// backend failures.
pub trait ContentStore: Send + Sync {
    /// Database name, e.g. `core` or `master`
    fn name(&self) -> &str;

    /// Read-only stores are not offered as import targets
    fn is_read_only(&self) -> bool {
        false
    }

    /// Language used by [`ContentStore::get`]
    fn default_language(&self) -> Language;

    /// Load a record in the default language
    fn get(&self, id: &ItemId) -> Result<Option<Record>> {
        self.get_in(id, &self.default_language())
    }

    /// Load the variant of a record for one language
    ///
    /// `Ok(None)` when the record does not exist or the language is not
    /// available in this store.
    fn get_in(&self, id: &ItemId, language: &Language) -> Result<Option<Record>>;

    /// Load a record by absolute path (case-insensitive)
    fn get_by_path(&self, path: &str) -> Result<Option<Record>>;

    /// All children of a record, in unspecified order
    ///
    /// Implementations skip access checks and sorting; callers index the
    /// result themselves.
    fn children(&self, parent: &ItemId) -> Result<Vec<Record>>;

    /// Child of `parent` named `name` (case-insensitive)
    fn child(&self, parent: &ItemId, name: &str) -> Result<Option<Record>> {
        let wanted = name.to_lowercase();
        Ok(self
            .children(parent)?
            .into_iter()
            .find(|child| child.lookup_name() == wanted))
    }

    /// Look up a template by full name
    fn template(&self, name: &str) -> Result<Option<Template>>;

    /// Create a record under `parent`
    ///
    /// With `id` set the record is created under that identifier, otherwise
    /// the store assigns one.
    fn create(
        &self,
        parent: &ItemId,
        name: &str,
        template: &Template,
        id: Option<ItemId>,
    ) -> Result<Record>;

    /// Resolve a named dictionary domain to its root record
    fn resolve_domain(&self, domain: &str) -> Result<DomainLookup>;

    /// Open a record variant for editing
    fn begin_edit(&self, id: &ItemId, language: &Language) -> Result<()>;

    /// Stage a field value on an open record variant
    fn set_field(&self, id: &ItemId, language: &Language, field: &str, value: &str) -> Result<()>;

    /// Commit staged values and release the edit lock
    ///
    /// On failure nothing staged is applied.
    fn end_edit(&self, id: &ItemId, language: &Language) -> Result<()>;

    /// Discard staged values and release the edit lock
    fn cancel_edit(&self, id: &ItemId, language: &Language);
}

/// Edit bracket over one record variant
///
/// Either [`Editing::commit`] succeeds, or the staged values are discarded
/// when the bracket is dropped. The edit lock is released on both paths.
pub struct Editing<'a> {
    store: &'a dyn ContentStore,
    id: ItemId,
    language: Language,
    open: bool,
}

impl<'a> Editing<'a> {
    /// Open `record` (in its loaded language) for editing
    pub fn begin(store: &'a dyn ContentStore, record: &Record) -> Result<Self> {
        store.begin_edit(&record.id, &record.language)?;
        Ok(Self {
            store,
            id: record.id,
            language: record.language.clone(),
            open: true,
        })
    }

    /// Stage a field value
    pub fn set(&mut self, field: &str, value: &str) -> Result<()> {
        self.store.set_field(&self.id, &self.language, field, value)
    }

    /// Commit staged values
    pub fn commit(mut self) -> Result<()> {
        self.store.end_edit(&self.id, &self.language)?;
        self.open = false;
        Ok(())
    }
}

impl Drop for Editing<'_> {
    fn drop(&mut self) {
        if self.open {
            self.store.cancel_edit(&self.id, &self.language);
        }
    }
}

/// Resolves database names to stores
pub trait StoreProvider: Send + Sync {
    /// Look up a store by name (case-insensitive)
    fn store(&self, name: &str) -> Option<Arc<dyn ContentStore>>;

    /// Names of all known stores
    fn store_names(&self) -> Vec<String>;
}

/// Named set of stores
#[derive(Default)]
pub struct StoreRegistry {
    stores: DashMap<String, Arc<dyn ContentStore>>,
}

impl StoreRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a store under its own name, replacing any previous one
    pub fn register(&self, store: Arc<dyn ContentStore>) {
        self.stores.insert(store.name().to_lowercase(), store);
    }

    /// Sorted names of the stores an import may target
    pub fn writable_store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .stores
            .iter()
            .filter(|entry| !entry.value().is_read_only())
            .map(|entry| entry.value().name().to_string())
            .collect();
        names.sort();
        names
    }
}

impl StoreProvider for StoreRegistry {
    fn store(&self, name: &str) -> Option<Arc<dyn ContentStore>> {
        self.stores
            .get(&name.to_lowercase())
            .map(|entry| Arc::clone(entry.value()))
    }

    fn store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .stores
            .iter()
            .map(|entry| entry.value().name().to_string())
            .collect();
        names.sort();
        names
    }
}
