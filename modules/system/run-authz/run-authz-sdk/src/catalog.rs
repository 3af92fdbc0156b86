//! Service catalog.
//!
//! The catalog is the fixed, configured list of service identifiers whose runs
//! can be filtered. Every comparison against it goes through
//! [`normalize_service`], so `"config-manager"`, `"Config_Manager"` and
//! `"config_manager"` all name the same service.

use serde::{Deserialize, Serialize};

/// Property name used for service-scoped filtering (both as the attribute
/// filter key and as the query predicate column).
pub const SERVICE_ATTRIBUTE: &str = "service";

/// Canonical comparison key for a service identifier.
///
/// Trims surrounding whitespace, lowercases ASCII and maps `-` to `_`.
#[must_use]
pub fn normalize_service(id: &str) -> String {
    id.trim()
        .chars()
        .map(|c| if c == '-' { '_' } else { c.to_ascii_lowercase() })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CatalogEntry {
    /// Identifier as configured. This spelling is what decisions carry.
    id: String,
    /// Normalized key used for comparisons.
    key: String,
}

/// Ordered set of known service identifiers.
///
/// Duplicates (after normalization) and blank identifiers are dropped at
/// construction; the first spelling wins. The catalog is immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ServiceCatalog {
    entries: Vec<CatalogEntry>,
}

impl ServiceCatalog {
    /// Build a catalog from configured identifiers, preserving order.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut entries: Vec<CatalogEntry> = Vec::new();
        for id in ids {
            let id = id.into().trim().to_owned();
            let key = normalize_service(&id);
            if key.is_empty() || entries.iter().any(|e| e.key == key) {
                continue;
            }
            entries.push(CatalogEntry { id, key });
        }
        Self { entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured identifiers in catalog order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }

    /// `(configured id, normalized key)` pairs in catalog order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|e| (e.id.as_str(), e.key.as_str()))
    }

    /// Map an arbitrary spelling onto the catalog's configured identifier.
    ///
    /// Returns `None` for services the catalog does not know.
    #[must_use]
    pub fn resolve(&self, candidate: &str) -> Option<&str> {
        let key = normalize_service(candidate);
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.id.as_str())
    }

    #[must_use]
    pub fn contains(&self, candidate: &str) -> bool {
        self.resolve(candidate).is_some()
    }
}

impl From<Vec<String>> for ServiceCatalog {
    fn from(ids: Vec<String>) -> Self {
        Self::new(ids)
    }
}

impl From<ServiceCatalog> for Vec<String> {
    fn from(catalog: ServiceCatalog) -> Self {
        catalog.entries.into_iter().map(|e| e.id).collect()
    }
}
