//! Phrasebook Core - record addressing and store collaborators
//!
//! This crate provides:
//! - Deterministic BLAKE3-derived record identifiers
//! - The record model (records, fields, templates, languages)
//! - Store collaborator traits and the edit bracket
//! - Record naming rules
//! - An in-memory reference store

pub mod hash;
pub mod memory;
pub mod naming;
pub mod store;
pub mod tree;

// Re-export main types for convenience
pub use hash::{derive_id, derive_id_with, Blake3Identity, IdentityScheme, ItemId};
pub use memory::{ItemSnapshot, MemoryStore, StoreSnapshot};
pub use naming::{NamingPolicy, StandardNamingPolicy};
pub use store::{ContentStore, DomainLookup, Editing, StoreProvider, StoreRegistry};
pub use tree::{Field, FieldDef, Language, Lineage, Record, Template};

/// Common result type used throughout phrasebook-core
pub type Result<T> = anyhow::Result<T>;
