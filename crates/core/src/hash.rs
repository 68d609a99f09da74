//! BLAKE3-derived record identifiers
//!
//! Dictionary sections and entries are addressed by a 128-bit identifier
//! derived from their parent path and logical key, so importing the same
//! key at the same location always lands on the same record.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use ulid::Ulid;

/// A 128-bit record identifier
///
/// Rendered as an upper-case braced GUID: `{0A1B2C3D-...}`.
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ItemId([u8; 16]);

impl ItemId {
    /// Create an identifier from raw bytes
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Get the identifier as a byte slice
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Allocate a fresh identifier for name-based creation
    ///
    /// Not deterministic: two calls never return the same value.
    pub fn generate() -> Self {
        Self(Ulid::new().0.to_be_bytes())
    }

    /// Upper-case hex without separators
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Parse a braced or bare GUID; hyphens are optional
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .unwrap_or(trimmed);

        let digits: String = inner.chars().filter(|c| *c != '-').collect();
        if digits.len() != 32 {
            anyhow::bail!(
                "Invalid identifier length: expected 32 hex digits, got {}",
                digits.len()
            );
        }

        let mut bytes = [0u8; 16];
        hex::decode_to_slice(&digits, &mut bytes)
            .with_context(|| format!("Invalid identifier: {}", text))?;
        Ok(Self(bytes))
    }
}

impl FromStr for ItemId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl std::fmt::Debug for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ItemId({})", self)
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex = self.to_hex();
        write!(
            f,
            "{{{}-{}-{}-{}-{}}}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        )
    }
}

/// Maps a seed string into the identifier space
///
/// Implementations must be pure: the same seed yields the same identifier
/// on every run and every platform, otherwise re-imports duplicate records.
pub trait IdentityScheme: Send + Sync {
    /// Derive the identifier for a seed
    fn derive(&self, seed: &str) -> ItemId;
}

/// Default scheme: first 16 bytes of the BLAKE3 digest of the seed
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Identity;

impl IdentityScheme for Blake3Identity {
    fn derive(&self, seed: &str) -> ItemId {
        let hash = blake3::hash(seed.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash.as_bytes()[..16]);
        ItemId::from_bytes(bytes)
    }
}

/// Case-folded `{parent_path}/{logical_key}` seed
pub fn identity_seed(parent_path: &str, logical_key: &str) -> String {
    format!("{}/{}", parent_path, logical_key).to_lowercase()
}

/// Derive the identifier of `logical_key` under `parent_path`
pub fn derive_id(parent_path: &str, logical_key: &str) -> ItemId {
    derive_id_with(&Blake3Identity, parent_path, logical_key)
}

/// Derive with an explicit scheme
pub fn derive_id_with(
    scheme: &dyn IdentityScheme,
    parent_path: &str,
    logical_key: &str,
) -> ItemId {
    scheme.derive(&identity_seed(parent_path, logical_key))
}
