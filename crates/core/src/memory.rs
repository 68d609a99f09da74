//! In-memory reference implementation of [`ContentStore`]
//!
//! Holds items with shared and per-language field values, resolves paths and
//! case-insensitive child names, stages edits until commit, and can inject
//! failures so callers can exercise their fallback paths.

use crate::hash::{derive_id, ItemId};
use crate::store::{ContentStore, DomainLookup};
use crate::tree::{Field, Language, Lineage, Record, Template};
use ahash::{AHashMap, AHashSet};
use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;

/// Template used for intermediate folders created by [`MemoryStore::ensure_path`]
pub const FOLDER_TEMPLATE: &str = "Common/Folder";

const ROOT_NAME: &str = "sitecore";
const DICTIONARY_ROOT: &str = "/sitecore/system/Dictionary";

#[derive(Debug, Clone)]
struct StoredItem {
    name: String,
    parent: Option<ItemId>,
    template: String,
    children: Vec<ItemId>,
    shared: BTreeMap<String, String>,
    versioned: BTreeMap<Language, BTreeMap<String, String>>,
}

struct State {
    root: ItemId,
    items: AHashMap<ItemId, StoredItem>,
    templates: AHashMap<String, Template>,
    domains: AHashMap<String, Option<ItemId>>,
}

impl State {
    fn path_of(&self, id: &ItemId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(*id);
        while let Some(cur) = current {
            match self.items.get(&cur) {
                Some(item) => {
                    segments.push(item.name.as_str());
                    current = item.parent;
                }
                None => break,
            }
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    fn ancestors_of(&self, id: &ItemId) -> Lineage {
        let mut lineage = Lineage::new();
        let mut current = self.items.get(id).and_then(|item| item.parent);
        while let Some(cur) = current {
            lineage.push(cur);
            current = self.items.get(&cur).and_then(|item| item.parent);
        }
        lineage.reverse();
        lineage
    }

    fn template(&self, name: &str) -> Option<&Template> {
        self.templates.get(&name.to_lowercase())
    }

    fn record(&self, id: &ItemId, language: &Language) -> Option<Record> {
        let item = self.items.get(id)?;
        let empty = BTreeMap::new();
        let versioned = item.versioned.get(language).unwrap_or(&empty);

        let fields = match self.template(&item.template) {
            Some(template) => template
                .fields
                .iter()
                .map(|def| {
                    let source = if def.shared { &item.shared } else { versioned };
                    Field {
                        name: def.name.clone(),
                        value: source.get(&def.name).cloned().unwrap_or_default(),
                        translatable: !def.shared,
                    }
                })
                .collect(),
            None => Vec::new(),
        };

        Some(Record {
            id: *id,
            name: item.name.clone(),
            path: self.path_of(id),
            parent: item.parent,
            ancestors: self.ancestors_of(id),
            template: item.template.clone(),
            language: language.clone(),
            fields,
        })
    }

    fn child_named(&self, parent: &ItemId, name: &str) -> Option<ItemId> {
        let wanted = name.to_lowercase();
        self.items.get(parent)?.children.iter().copied().find(|child| {
            self.items
                .get(child)
                .map(|item| item.name.to_lowercase() == wanted)
                .unwrap_or(false)
        })
    }

    fn insert(&mut self, id: ItemId, parent: ItemId, name: &str, template: &str) {
        self.items.insert(
            id,
            StoredItem {
                name: name.to_string(),
                parent: Some(parent),
                template: template.to_string(),
                children: Vec::new(),
                shared: BTreeMap::new(),
                versioned: BTreeMap::new(),
            },
        );
        if let Some(parent_item) = self.items.get_mut(&parent) {
            parent_item.children.push(id);
        }
    }
}

#[derive(Default)]
struct Faults {
    identity_create_failures: usize,
    failing_commits: AHashSet<ItemId>,
}

/// Staged field values keyed by canonical field name
type PendingEdit = BTreeMap<String, String>;

/// In-memory hierarchical store
pub struct MemoryStore {
    name: String,
    read_only: bool,
    languages: Vec<Language>,
    state: RwLock<State>,
    edits: Mutex<AHashMap<(ItemId, Language), PendingEdit>>,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    /// Create a store holding only the `/sitecore` root, language `en`
    pub fn new(name: &str) -> Self {
        let root = derive_id("", ROOT_NAME);
        let mut items = AHashMap::new();
        items.insert(
            root,
            StoredItem {
                name: ROOT_NAME.to_string(),
                parent: None,
                template: FOLDER_TEMPLATE.to_string(),
                children: Vec::new(),
                shared: BTreeMap::new(),
                versioned: BTreeMap::new(),
            },
        );

        let mut templates = AHashMap::new();
        let folder = Template::new(FOLDER_TEMPLATE, Vec::new());
        templates.insert(folder.name.to_lowercase(), folder);

        Self {
            name: name.to_string(),
            read_only: false,
            languages: vec![Language::from("en")],
            state: RwLock::new(State {
                root,
                items,
                templates,
                domains: AHashMap::new(),
            }),
            edits: Mutex::new(AHashMap::new()),
            faults: Mutex::new(Faults::default()),
        }
    }

    /// Create a store with `/sitecore/system/Dictionary` and the dictionary templates
    pub fn with_dictionary(name: &str) -> Self {
        let store = Self::new(name);
        store.register_template(Template::dictionary_folder());
        store.register_template(Template::dictionary_entry());
        if let Err(e) = store.ensure_path(DICTIONARY_ROOT) {
            tracing::warn!(store = name, "Failed to create dictionary root: {:#}", e);
        }
        store
    }

    /// Replace the available languages; the first one becomes the default
    pub fn with_languages(mut self, languages: &[&str]) -> Self {
        self.languages = languages.iter().map(|l| Language::from(*l)).collect();
        self
    }

    /// Mark the store read-only
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Register (or replace) a template
    pub fn register_template(&self, template: Template) {
        self.state
            .write()
            .templates
            .insert(template.name.to_lowercase(), template);
    }

    /// Create any missing folders along an absolute path
    pub fn ensure_path(&self, path: &str) -> Result<Record> {
        let mut state = self.state.write();
        let mut segments = path.split('/').filter(|s| !s.is_empty());

        match segments.next() {
            Some(first) if first.eq_ignore_ascii_case(ROOT_NAME) => {}
            _ => anyhow::bail!("Path must start at /{}: {}", ROOT_NAME, path),
        }

        let mut current = state.root;
        for segment in segments {
            current = match state.child_named(&current, segment) {
                Some(existing) => existing,
                None => {
                    let parent_path = state.path_of(&current);
                    let id = derive_id(&parent_path, segment);
                    state.insert(id, current, segment, FOLDER_TEMPLATE);
                    id
                }
            };
        }

        let language = self.default_language();
        state
            .record(&current, &language)
            .with_context(|| format!("Path vanished while creating it: {}", path))
    }

    /// Register a dictionary domain; `root` is `None` for a domain without a root record
    pub fn register_domain(&self, name: &str, root: Option<ItemId>) {
        self.state.write().domains.insert(name.to_lowercase(), root);
    }

    /// Write a field value directly, bypassing the edit bracket
    pub fn put_value(&self, id: &ItemId, language: &Language, field: &str, value: &str) -> Result<()> {
        let mut state = self.state.write();
        let (canonical, shared) = {
            let item = state
                .items
                .get(id)
                .with_context(|| format!("Item {} not found", id))?;
            let template = state
                .template(&item.template)
                .with_context(|| format!("Template '{}' not found", item.template))?;
            let def = template
                .field(field)
                .with_context(|| format!("Field '{}' not found on '{}'", field, template.name))?;
            (def.name.clone(), def.shared)
        };

        if let Some(item) = state.items.get_mut(id) {
            if shared {
                item.shared.insert(canonical, value.to_string());
            } else {
                item.versioned
                    .entry(language.clone())
                    .or_default()
                    .insert(canonical, value.to_string());
            }
        }
        Ok(())
    }

    /// Make the next `count` identity-based creations fail
    pub fn fail_identity_creates(&self, count: usize) {
        self.faults.lock().identity_create_failures = count;
    }

    /// Make every commit on `id` fail
    pub fn fail_commits_for(&self, id: ItemId) {
        self.faults.lock().failing_commits.insert(id);
    }

    /// True while any language variant of `id` is open for editing
    pub fn is_editing(&self, id: &ItemId) -> bool {
        self.edits.lock().keys().any(|(edit_id, _)| edit_id == id)
    }

    /// Number of stored items, root included
    pub fn len(&self) -> usize {
        self.state.read().items.len()
    }

    /// True when only the root exists
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Serializable image of every item, keyed by path
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.read();
        let items = state
            .items
            .iter()
            .map(|(id, item)| {
                let versioned = item
                    .versioned
                    .iter()
                    .map(|(lang, values)| (lang.to_string(), values.clone()))
                    .collect();
                (
                    state.path_of(id),
                    ItemSnapshot {
                        id: *id,
                        template: item.template.clone(),
                        shared: item.shared.clone(),
                        versioned,
                    },
                )
            })
            .collect();
        StoreSnapshot { items }
    }

    fn has_language(&self, language: &Language) -> bool {
        self.languages.contains(language)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            anyhow::bail!("Database '{}' is read-only", self.name);
        }
        Ok(())
    }
}

impl ContentStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn default_language(&self) -> Language {
        self.languages
            .first()
            .cloned()
            .unwrap_or_else(|| Language::from("en"))
    }

    fn get_in(&self, id: &ItemId, language: &Language) -> Result<Option<Record>> {
        if !self.has_language(language) {
            return Ok(None);
        }
        Ok(self.state.read().record(id, language))
    }

    fn get_by_path(&self, path: &str) -> Result<Option<Record>> {
        let state = self.state.read();
        let mut segments = path.split('/').filter(|s| !s.is_empty());

        match segments.next() {
            Some(first) if first.eq_ignore_ascii_case(ROOT_NAME) => {}
            _ => return Ok(None),
        }

        let mut current = state.root;
        for segment in segments {
            match state.child_named(&current, segment) {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(state.record(&current, &self.default_language()))
    }

    fn children(&self, parent: &ItemId) -> Result<Vec<Record>> {
        let state = self.state.read();
        let language = self.default_language();
        let Some(item) = state.items.get(parent) else {
            return Ok(Vec::new());
        };
        Ok(item
            .children
            .iter()
            .filter_map(|child| state.record(child, &language))
            .collect())
    }

    fn template(&self, name: &str) -> Result<Option<Template>> {
        Ok(self.state.read().template(name).cloned())
    }

    fn create(
        &self,
        parent: &ItemId,
        name: &str,
        template: &Template,
        id: Option<ItemId>,
    ) -> Result<Record> {
        self.ensure_writable()?;

        if id.is_some() {
            let mut faults = self.faults.lock();
            if faults.identity_create_failures > 0 {
                faults.identity_create_failures -= 1;
                anyhow::bail!("Simulated store failure creating '{}'", name);
            }
        }

        let mut state = self.state.write();
        if !state.items.contains_key(parent) {
            anyhow::bail!("Parent item {} not found", parent);
        }
        if state.template(&template.name).is_none() {
            state
                .templates
                .insert(template.name.to_lowercase(), template.clone());
        }

        let id = id.unwrap_or_else(ItemId::generate);
        if state.items.contains_key(&id) {
            anyhow::bail!("Item {} already exists", id);
        }

        state.insert(id, *parent, name, &template.name);
        tracing::trace!(store = %self.name, %id, name, "Created item");

        state
            .record(&id, &self.default_language())
            .with_context(|| format!("Item {} vanished after creation", id))
    }

    fn resolve_domain(&self, domain: &str) -> Result<DomainLookup> {
        let state = self.state.read();
        let lookup = match state.domains.get(&domain.to_lowercase()) {
            None => DomainLookup::Unknown,
            Some(None) => DomainLookup::MissingRoot,
            Some(Some(root)) => match state.record(root, &self.default_language()) {
                Some(record) => DomainLookup::Root(record),
                None => DomainLookup::MissingRoot,
            },
        };
        Ok(lookup)
    }

    fn begin_edit(&self, id: &ItemId, language: &Language) -> Result<()> {
        self.ensure_writable()?;
        if !self.has_language(language) {
            anyhow::bail!("Language '{}' is not available in '{}'", language, self.name);
        }
        if !self.state.read().items.contains_key(id) {
            anyhow::bail!("Item {} not found", id);
        }

        let mut edits = self.edits.lock();
        let key = (*id, language.clone());
        if edits.contains_key(&key) {
            anyhow::bail!("Item {} ({}) is already being edited", id, language);
        }
        edits.insert(key, PendingEdit::new());
        Ok(())
    }

    fn set_field(&self, id: &ItemId, language: &Language, field: &str, value: &str) -> Result<()> {
        let canonical = {
            let state = self.state.read();
            let item = state
                .items
                .get(id)
                .with_context(|| format!("Item {} not found", id))?;
            let template = state
                .template(&item.template)
                .with_context(|| format!("Template '{}' not found", item.template))?;
            template
                .field(field)
                .map(|def| def.name.clone())
                .with_context(|| format!("Field '{}' not found on '{}'", field, template.name))?
        };

        let mut edits = self.edits.lock();
        let pending = edits
            .get_mut(&(*id, language.clone()))
            .with_context(|| format!("Item {} ({}) is not being edited", id, language))?;
        pending.insert(canonical, value.to_string());
        Ok(())
    }

    fn end_edit(&self, id: &ItemId, language: &Language) -> Result<()> {
        let pending = self
            .edits
            .lock()
            .remove(&(*id, language.clone()))
            .with_context(|| format!("Item {} ({}) is not being edited", id, language))?;

        if self.faults.lock().failing_commits.contains(id) {
            anyhow::bail!("Simulated commit failure on item {}", id);
        }

        let mut state = self.state.write();
        let shared_fields: AHashSet<String> = state
            .items
            .get(id)
            .and_then(|item| state.template(&item.template))
            .map(|template| {
                template
                    .fields
                    .iter()
                    .filter(|def| def.shared)
                    .map(|def| def.name.clone())
                    .collect()
            })
            .unwrap_or_default();

        let item = state
            .items
            .get_mut(id)
            .with_context(|| format!("Item {} not found", id))?;
        for (field, value) in pending {
            if shared_fields.contains(&field) {
                item.shared.insert(field, value);
            } else {
                item.versioned
                    .entry(language.clone())
                    .or_default()
                    .insert(field, value);
            }
        }
        Ok(())
    }

    fn cancel_edit(&self, id: &ItemId, language: &Language) {
        self.edits.lock().remove(&(*id, language.clone()));
    }
}

/// Image of a [`MemoryStore`] keyed by item path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSnapshot {
    pub items: BTreeMap<String, ItemSnapshot>,
}

impl StoreSnapshot {
    /// Item at an exact path
    pub fn get(&self, path: &str) -> Option<&ItemSnapshot> {
        self.items.get(path)
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the snapshot holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Direct children of `path`, by path
    pub fn children_of(&self, path: &str) -> Vec<&str> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.items
            .keys()
            .filter(|candidate| {
                candidate
                    .strip_prefix(&prefix)
                    .map(|rest| !rest.is_empty() && !rest.contains('/'))
                    .unwrap_or(false)
            })
            .map(String::as_str)
            .collect()
    }
}

/// One item in a [`StoreSnapshot`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSnapshot {
    pub id: ItemId,
    pub template: String,
    pub shared: BTreeMap<String, String>,
    pub versioned: BTreeMap<String, BTreeMap<String, String>>,
}

impl ItemSnapshot {
    /// Versioned value for one language, empty when unset
    pub fn value_in(&self, language: &str, field: &str) -> &str {
        self.versioned
            .get(language)
            .and_then(|values| values.get(field))
            .map(String::as_str)
            .unwrap_or("")
    }
}
