//! Record model for the hierarchical content store

use crate::hash::{derive_id, ItemId};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Template holding dictionary section buckets
pub const DICTIONARY_FOLDER_TEMPLATE: &str = "System/Dictionary/Dictionary folder";

/// Template holding dictionary entries
pub const DICTIONARY_ENTRY_TEMPLATE: &str = "System/Dictionary/Dictionary entry";

/// Ancestor chain of a record, top of the tree first
///
/// Dictionary trees are shallow, so the chain almost always stays inline.
pub type Lineage = SmallVec<[ItemId; 8]>;

/// Language tag of a record variant (`en`, `fr`, `de-DE`, ...)
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Language(String);

impl Language {
    /// Wrap a language tag
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The tag as written
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Language {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Field definition on a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name (matched case-insensitively)
    pub name: String,
    /// Shared fields hold one value for all language variants
    pub shared: bool,
}

impl FieldDef {
    /// A field with one value across all languages
    pub fn shared(name: &str) -> Self {
        Self {
            name: name.to_string(),
            shared: true,
        }
    }

    /// A field with one value per language variant
    pub fn translatable(name: &str) -> Self {
        Self {
            name: name.to_string(),
            shared: false,
        }
    }
}

/// Template a record is created from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    /// Template identifier
    pub id: ItemId,
    /// Full template name, e.g. `System/Dictionary/Dictionary entry`
    pub name: String,
    /// Fields records of this template carry
    pub fields: Vec<FieldDef>,
}

impl Template {
    /// Create a template; its identifier is derived from its name
    pub fn new(name: &str, fields: Vec<FieldDef>) -> Self {
        Self {
            id: derive_id("/sitecore/templates", name),
            name: name.to_string(),
            fields,
        }
    }

    /// Bucket folder template (no fields)
    pub fn dictionary_folder() -> Self {
        Self::new(DICTIONARY_FOLDER_TEMPLATE, Vec::new())
    }

    /// Entry template: shared `Key`, translatable `Phrase`
    pub fn dictionary_entry() -> Self {
        Self::new(
            DICTIONARY_ENTRY_TEMPLATE,
            vec![FieldDef::shared("Key"), FieldDef::translatable("Phrase")],
        )
    }

    /// Look up a field definition by name
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }
}

/// A field value as seen through one language variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub value: String,
    /// False for shared fields
    pub translatable: bool,
}

/// Snapshot of one language variant of a stored record
#[derive(Debug, Clone)]
pub struct Record {
    /// Stable identity shared by all language variants
    pub id: ItemId,
    /// Record name (unique per parent, case-insensitively, by convention)
    pub name: String,
    /// Full path, e.g. `/sitecore/system/Dictionary/H/Hello`
    pub path: String,
    /// Parent record, `None` for the tree root
    pub parent: Option<ItemId>,
    /// Ancestors from the tree root down to the parent
    pub ancestors: Lineage,
    /// Template name
    pub template: String,
    /// Language this variant was loaded in
    pub language: Language,
    /// Field values for this variant
    pub fields: Vec<Field>,
}

impl Record {
    /// Look up a field by name (case-insensitive)
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Field value, empty when the field is missing
    pub fn value(&self, name: &str) -> &str {
        self.field(name).map(|f| f.value.as_str()).unwrap_or("")
    }

    /// True when `ancestor` appears above this record in the tree
    pub fn is_descendant_of(&self, ancestor: &ItemId) -> bool {
        self.ancestors.contains(ancestor)
    }

    /// Case-folded name used for child lookups
    pub fn lookup_name(&self) -> String {
        self.name.to_lowercase()
    }
}
