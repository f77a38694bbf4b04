//! Declarative secondary-index provisioning.
//!
//! Indexes can be declared two ways, and both end up as [`IndexSpec`]s handed to the
//! backend with create-if-absent semantics:
//!
//! - A descriptor string: `;`-separated specs, each a `,`-separated list of
//!   `field[:direction]` tokens, e.g. `"created_at;name:1,age:-1;title:text"`.
//! - Per-field declarations through the [`Indexed`] trait, usually derived with
//!   `#[derive(Indexed)]` and `#[index]` / `#[index(desc)]` field attributes.

use std::fmt;

use crate::error::{StoreError, StoreResult};

/// Direction (or kind) of one index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexDirection {
    Ascending,
    Descending,
    Text,
}

impl IndexDirection {
    /// Parses a direction token. `desc`/`-1` are descending, `text` is a text index,
    /// anything else is ascending.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();

        if token.eq_ignore_ascii_case("desc") || token == "-1" {
            IndexDirection::Descending
        } else if token.eq_ignore_ascii_case("text") {
            IndexDirection::Text
        } else {
            IndexDirection::Ascending
        }
    }
}

impl fmt::Display for IndexDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndexDirection::Ascending => "1",
            IndexDirection::Descending => "-1",
            IndexDirection::Text => "text",
        })
    }
}

/// One key of an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub field: String,
    pub direction: IndexDirection,
}

impl IndexKey {
    pub fn new(field: impl Into<String>, direction: IndexDirection) -> Self {
        Self { field: field.into(), direction }
    }
}

/// An index over one or more keys, in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexSpec {
    pub keys: Vec<IndexKey>,
}

impl IndexSpec {
    pub fn new(keys: Vec<IndexKey>) -> Self {
        Self { keys }
    }

    /// A single-field index.
    pub fn single(field: impl Into<String>, direction: IndexDirection) -> Self {
        Self { keys: vec![IndexKey::new(field, direction)] }
    }

    /// Name the backends use for this index, e.g. `name_1_age_-1`.
    pub fn name(&self) -> String {
        self.keys
            .iter()
            .map(|key| format!("{}_{}", key.field, key.direction))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// Parses an index descriptor string into index specs.
///
/// Empty specs and empty tokens are skipped, so trailing separators are harmless.
///
/// # Errors
///
/// Returns [`StoreError::InvalidField`] if a token names no field (e.g. `":1"`).
pub fn parse_descriptor(descriptor: &str) -> StoreResult<Vec<IndexSpec>> {
    let mut specs = Vec::new();

    for spec in descriptor.split(';') {
        let mut keys = Vec::new();

        for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (field, direction) = match token.split_once(':') {
                Some((field, direction)) => (field.trim(), IndexDirection::parse(direction)),
                None => (token, IndexDirection::Ascending),
            };

            if field.is_empty() {
                return Err(StoreError::InvalidField(token.to_string()));
            }

            keys.push(IndexKey::new(field, direction));
        }

        if !keys.is_empty() {
            specs.push(IndexSpec::new(keys));
        }
    }

    Ok(specs)
}

/// An index declared on one record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldIndex {
    /// Storage name of the field.
    pub name: String,
    pub direction: IndexDirection,
}

impl FieldIndex {
    /// Resolves a field declaration.
    ///
    /// `annotation` must be `index` optionally followed by `,direction` (for example
    /// `index,desc`); anything else is not an index declaration and yields `None`.
    /// The storage name is `rename` when given, else the lowercased `field`.
    pub fn from_annotation(field: &str, rename: Option<&str>, annotation: &str) -> Option<Self> {
        let mut parts = annotation.split(',').map(str::trim);

        if parts.next() != Some("index") {
            return None;
        }

        let direction = parts
            .next()
            .map(IndexDirection::parse)
            .unwrap_or(IndexDirection::Ascending);

        let name = match rename {
            Some(rename) if !rename.is_empty() => rename.to_string(),
            _ => field.to_lowercase(),
        };

        Some(Self { name, direction })
    }

    pub fn to_spec(&self) -> IndexSpec {
        IndexSpec::single(self.name.clone(), self.direction)
    }
}

/// Records that declare their indexes next to their fields.
///
/// Derive it with `#[derive(Indexed)]` from the `quarry` crate:
///
/// ```ignore
/// #[derive(Debug, Clone, Serialize, Deserialize, Indexed)]
/// pub struct Medium {
///     #[index]
///     pub title: String,
///     #[index(desc)]
///     #[serde(rename = "release_date")]
///     pub released: bson::DateTime,
/// }
/// ```
pub trait Indexed {
    /// The declared single-field indexes, in field order.
    fn declared_indexes() -> Vec<FieldIndex>;
}
