//! Data model for store records.
//!
//! Everything returned by the graph store is dynamically shaped: a record is
//! a JSON object carrying `@rid` and `@class` plus whatever properties the
//! query projected. [`Record`] wraps that object with typed accessors;
//! [`Rid`] is the record identifier used as the key of every node and edge
//! map in the crate.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{GraphKbError, Result};

/// Record identifier in `#<cluster>:<position>` form.
///
/// RIDs compare as plain strings; that ordering is what the store adapter's
/// cursor pagination relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rid(String);

/// Cursor value strictly below every valid RID, used to start pagination.
pub const RID_FLOOR: &str = "#-1:-1";

impl Rid {
    /// Parses and validates a RID string.
    pub fn parse(raw: &str) -> Result<Rid> {
        let rest = raw
            .strip_prefix('#')
            .ok_or_else(|| GraphKbError::Validation(format!("bad record id {raw:?}")))?;
        let (cluster, position) = rest
            .split_once(':')
            .ok_or_else(|| GraphKbError::Validation(format!("bad record id {raw:?}")))?;
        if cluster.parse::<i64>().is_err() || position.parse::<i64>().is_err() {
            return Err(GraphKbError::Validation(format!("bad record id {raw:?}")));
        }
        Ok(Rid(raw.to_string()))
    }

    /// The underlying `#<cluster>:<position>` string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Rid {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Rid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Rid, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Rid::parse(&raw).map_err(D::Error::custom)
    }
}

/// A single record as returned by the store.
///
/// The raw projected object is kept verbatim (including the `@rid` and
/// `@class` keys) so that serializing a record reproduces exactly what the
/// store handed back; `rid` and `class` are parsed out once on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    rid: Rid,
    class: String,
    fields: Map<String, Value>,
}

impl Record {
    /// Builds a record from a raw store row. Rows without `@rid`/`@class`
    /// are rejected; the store always projects both.
    pub fn from_value(value: Value) -> Result<Record> {
        let fields = match value {
            Value::Object(map) => map,
            other => {
                return Err(GraphKbError::Internal(format!(
                    "expected record object from store, got {other}"
                )))
            }
        };
        let rid = fields
            .get("@rid")
            .and_then(Value::as_str)
            .ok_or_else(|| GraphKbError::Internal("store row is missing @rid".into()))
            .and_then(Rid::parse)?;
        let class = fields
            .get("@class")
            .and_then(Value::as_str)
            .ok_or_else(|| GraphKbError::Internal("store row is missing @class".into()))?
            .to_string();
        Ok(Record { rid, class, fields })
    }

    /// The record's identifier.
    pub fn rid(&self) -> &Rid {
        &self.rid
    }

    /// The record's class name.
    pub fn class(&self) -> &str {
        &self.class
    }

    /// Raw value of a projected property.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Looks up a dotted path such as `source.sort`, accepting either the
    /// flattened projection key (`"source.sort"`) or a nested object.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.fields.get(path) {
            return Some(value);
        }
        let mut segments = path.split('.');
        let mut current = self.fields.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// The `in` endpoint for edge records.
    pub fn in_rid(&self) -> Option<Rid> {
        self.rid_field("in")
    }

    /// The `out` endpoint for edge records.
    pub fn out_rid(&self) -> Option<Rid> {
        self.rid_field("out")
    }

    fn rid_field(&self, name: &str) -> Option<Rid> {
        let raw = self.fields.get(name)?.as_str()?;
        Rid::parse(raw).ok()
    }

    /// Whether the record carries a non-null `deletedAt`.
    pub fn is_deleted(&self) -> bool {
        matches!(self.fields.get("deletedAt"), Some(value) if !value.is_null())
    }

    /// The `name` property, when projected and a string.
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// The `displayName` property, when projected and a string.
    pub fn display_name(&self) -> Option<&str> {
        self.fields.get("displayName").and_then(Value::as_str)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
