use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::Polygon;

// ---------------------------------------------------------------------------
// Entity kind
// ---------------------------------------------------------------------------

/// The two entity families the registry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Employer,
    Patch,
}

impl EntityKind {
    /// Attribute keys recognized for this kind. Anything else is rejected
    /// at the boundary where records are constructed.
    pub fn recognized_keys(&self) -> &'static [&'static str] {
        match self {
            Self::Employer => &[
                "abn",
                "industry",
                "member_id",
                "agreement_id",
                "agreement_title",
                "agreement_expiry",
                "phone",
                "suburb",
                "state",
            ],
            Self::Patch => &["boundary", "region", "organiser", "notes"],
        }
    }

    pub fn recognizes(&self, key: &str) -> bool {
        self.recognized_keys().contains(&key)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Employer => write!(f, "employer"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

// ---------------------------------------------------------------------------
// Attribute bag
// ---------------------------------------------------------------------------

/// An attribute key outside the recognized set for its entity kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnrecognizedAttr {
    pub key: String,
    pub kind: EntityKind,
}

impl fmt::Display for UnrecognizedAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attribute '{}' is not recognized for {}", self.key, self.kind)
    }
}

impl std::error::Error for UnrecognizedAttr {}

/// Ordered bag of entity attributes with a fixed recognized-key set per kind.
///
/// Validation happens here and at record construction, never inside the
/// matching logic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrBag(BTreeMap<String, String>);

impl AttrBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a bag from key/value pairs, rejecting keys the kind does not
    /// recognize.
    pub fn validated<I>(kind: EntityKind, pairs: I) -> Result<Self, UnrecognizedAttr>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut bag = BTreeMap::new();
        for (key, value) in pairs {
            if !kind.recognizes(&key) {
                return Err(UnrecognizedAttr { key, kind });
            }
            bag.insert(key, value);
        }
        Ok(Self(bag))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge `other` into self, overwriting on key collision.
    pub fn merge(&mut self, other: &AttrBag) {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Copy keys from `other` that self does not already carry.
    pub fn fill_missing(&mut self, other: &AttrBag) {
        for (key, value) in &other.0 {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

impl FromIterator<(String, String)> for AttrBag {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Registry entity
// ---------------------------------------------------------------------------

/// An existing authoritative entity. Owned by the external registry; the
/// engine only reads these and issues mutation instructions through the
/// executor seam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntity {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    #[serde(default)]
    pub attrs: AttrBag,
    /// Stored geometries; patches only, may be empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub geometries: Vec<Polygon>,
}

impl RegistryEntity {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            attrs: AttrBag::new(),
            geometries: Vec::new(),
        }
    }
}
