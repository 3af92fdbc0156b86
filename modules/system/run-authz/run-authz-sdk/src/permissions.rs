//! Attribute-filter permission encoding.
//!
//! A caller's permission set is a list of [`Permission`] entries as returned
//! by the permission directory:
//!
//! ```json
//! {
//!   "permission": "playbook-dispatcher:run:read",
//!   "resourceDefinitions": [
//!     { "attributeFilter": { "key": "service", "operation": "equal", "value": "remediations" } }
//!   ]
//! }
//! ```
//!
//! The filter `value` arrives in several shapes (a string, a list, or a
//! comma-separated string for `in`). Parsing folds every shape into
//! [`AttributeFilter`]; anything it cannot read becomes
//! [`AttributeFilter::Unrecognized`], which never matches. Parsing a single
//! filter never fails.

use std::collections::BTreeSet;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// One named permission with optional attribute constraints.
///
/// An empty `attribute_filters` list means the permission is unrestricted.
/// Names are not unique within a permission set; entries with the same name
/// are unioned by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Permission name, e.g. `playbook-dispatcher:run:read`.
    pub permission: String,
    #[serde(
        rename = "resourceDefinitions",
        default,
        serialize_with = "resource_definitions::serialize",
        deserialize_with = "resource_definitions::deserialize"
    )]
    pub attribute_filters: Vec<AttributeFilter>,
}

impl Permission {
    /// Permission without attribute filters (unrestricted).
    #[must_use]
    pub fn unrestricted(name: impl Into<String>) -> Self {
        Self {
            permission: name.into(),
            attribute_filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_filters(name: impl Into<String>, filters: Vec<AttributeFilter>) -> Self {
        Self {
            permission: name.into(),
            attribute_filters: filters,
        }
    }
}

/// A typed attribute constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeFilter {
    /// `key = value`
    Equal { key: String, value: String },
    /// `key IN (values)`; never empty.
    In {
        key: String,
        values: BTreeSet<String>,
    },
    /// Unknown operation or unreadable payload. Matches nothing.
    Unrecognized,
}

impl AttributeFilter {
    #[must_use]
    pub fn equal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equal {
            key: key.into(),
            value: value.into(),
        }
    }

    /// `IN` filter. An empty value list yields [`AttributeFilter::Unrecognized`].
    #[must_use]
    pub fn one_of<I, S>(key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Self::Unrecognized;
        }
        Self::In {
            key: key.into(),
            values,
        }
    }

    /// Attribute key, if the filter was readable.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Equal { key, .. } | Self::In { key, .. } => Some(key),
            Self::Unrecognized => None,
        }
    }

    /// Values this filter admits. Empty for unrecognized filters.
    #[must_use]
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Equal { value, .. } => vec![value.as_str()],
            Self::In { values, .. } => values.iter().map(String::as_str).collect(),
            Self::Unrecognized => Vec::new(),
        }
    }

    #[must_use]
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized)
    }

    /// Read a filter from its raw JSON payload.
    #[must_use]
    pub fn from_json(raw: &Value) -> Self {
        let Some(obj) = raw.as_object() else {
            return Self::Unrecognized;
        };
        let Some(key) = obj.get("key").and_then(Value::as_str) else {
            return Self::Unrecognized;
        };
        let operation = obj
            .get("operation")
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase);

        match (operation.as_deref(), obj.get("value")) {
            (Some("equal"), Some(Value::String(value))) if !value.trim().is_empty() => {
                Self::equal(key, value.trim())
            }
            (Some("equal"), Some(Value::Array(items))) if items.len() == 1 => items[0]
                .as_str()
                .filter(|v| !v.trim().is_empty())
                .map_or(Self::Unrecognized, |v| Self::equal(key, v.trim())),
            (Some("in"), Some(Value::Array(items))) => {
                let values: Option<Vec<&str>> = items.iter().map(Value::as_str).collect();
                values.map_or(Self::Unrecognized, |values| {
                    Self::one_of(
                        key,
                        values.into_iter().map(str::trim).filter(|v| !v.is_empty()),
                    )
                })
            }
            (Some("in"), Some(Value::String(joined))) => Self::one_of(
                key,
                joined.split(',').map(str::trim).filter(|v| !v.is_empty()),
            ),
            _ => Self::Unrecognized,
        }
    }
}

impl Serialize for AttributeFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Equal { key, value } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("key", key)?;
                map.serialize_entry("operation", "equal")?;
                map.serialize_entry("value", value)?;
                map.end()
            }
            Self::In { key, values } => {
                let mut map = serializer.serialize_map(Some(3))?;
                map.serialize_entry("key", key)?;
                map.serialize_entry("operation", "in")?;
                map.serialize_entry("value", values)?;
                map.end()
            }
            Self::Unrecognized => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("operation", "unrecognized")?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for AttributeFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&raw))
    }
}

/// `resourceDefinitions: [{ "attributeFilter": {..} }]` <-> `Vec<AttributeFilter>`.
///
/// A definition without a readable `attributeFilter`, or a non-list
/// `resourceDefinitions`, still counts as a (non-matching) filter so that a
/// malformed entry can never turn into an unrestricted permission.
mod resource_definitions {
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    use super::AttributeFilter;

    #[derive(serde::Serialize)]
    struct DefinitionRef<'a> {
        #[serde(rename = "attributeFilter")]
        attribute_filter: &'a AttributeFilter,
    }

    pub(super) fn serialize<S: Serializer>(
        filters: &[AttributeFilter],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(filters.len()))?;
        for attribute_filter in filters {
            seq.serialize_element(&DefinitionRef { attribute_filter })?;
        }
        seq.end()
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<AttributeFilter>, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(match raw {
            Value::Null => Vec::new(),
            Value::Array(definitions) => definitions
                .iter()
                .map(|definition| {
                    definition
                        .get("attributeFilter")
                        .map_or(AttributeFilter::Unrecognized, AttributeFilter::from_json)
                })
                .collect(),
            _ => vec![AttributeFilter::Unrecognized],
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equal_filter_parses_string_value() {
        let filter = AttributeFilter::from_json(
            &json!({"key": "service", "operation": "equal", "value": "remediations"}),
        );
        assert_eq!(filter, AttributeFilter::equal("service", "remediations"));
    }

    #[test]
    fn in_filter_accepts_list_and_comma_separated_shapes() {
        let from_list = AttributeFilter::from_json(
            &json!({"key": "service", "operation": "in", "value": ["tasks", "remediations"]}),
        );
        let from_string = AttributeFilter::from_json(
            &json!({"key": "service", "operation": "in", "value": "tasks, remediations"}),
        );
        assert_eq!(from_list, from_string);
        assert_eq!(from_list.values(), vec!["remediations", "tasks"]);
    }

    #[test]
    fn operation_is_case_insensitive() {
        let filter = AttributeFilter::from_json(
            &json!({"key": "service", "operation": "EQUAL", "value": "tasks"}),
        );
        assert!(filter.is_recognized());
    }

    #[test]
    fn unreadable_payloads_become_unrecognized() {
        let cases = [
            json!({"key": "service", "operation": "startswith", "value": "rem"}),
            json!({"key": "service", "operation": "equal", "value": 42}),
            json!({"key": "service", "operation": "equal", "value": ["a", "b"]}),
            json!({"key": "service", "operation": "in", "value": ["a", 1]}),
            json!({"key": "service", "operation": "in", "value": []}),
            json!({"operation": "equal", "value": "tasks"}),
            json!("service=tasks"),
        ];
        for case in cases {
            assert_eq!(
                AttributeFilter::from_json(&case),
                AttributeFilter::Unrecognized,
                "{case}"
            );
        }
    }

    #[test]
    fn permission_parses_directory_shape() {
        let raw = json!({
            "permission": "playbook-dispatcher:run:read",
            "resourceDefinitions": [
                {"attributeFilter": {"key": "service", "operation": "equal", "value": "remediations"}},
                {"somethingElse": true}
            ]
        });
        let permission: Permission = serde_json::from_value(raw).unwrap();

        assert_eq!(permission.permission, "playbook-dispatcher:run:read");
        assert_eq!(
            permission.attribute_filters,
            vec![
                AttributeFilter::equal("service", "remediations"),
                AttributeFilter::Unrecognized,
            ]
        );
    }

    #[test]
    fn missing_definitions_mean_unrestricted_but_malformed_ones_do_not() {
        let open: Permission =
            serde_json::from_value(json!({"permission": "p", "resourceDefinitions": []})).unwrap();
        let absent: Permission = serde_json::from_value(json!({"permission": "p"})).unwrap();
        let broken: Permission =
            serde_json::from_value(json!({"permission": "p", "resourceDefinitions": "oops"}))
                .unwrap();

        assert!(open.attribute_filters.is_empty());
        assert!(absent.attribute_filters.is_empty());
        assert_eq!(broken.attribute_filters, vec![AttributeFilter::Unrecognized]);
    }

    #[test]
    fn serialized_permission_reads_back() {
        let permission = Permission::with_filters(
            "playbook-dispatcher:run:read",
            vec![AttributeFilter::one_of("service", ["tasks", "advisor"])],
        );
        let json = serde_json::to_value(&permission).unwrap();

        assert_eq!(
            json["resourceDefinitions"][0]["attributeFilter"]["operation"],
            "in"
        );
        let back: Permission = serde_json::from_value(json).unwrap();
        assert_eq!(back, permission);
    }
}
