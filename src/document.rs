//! Typed access to raw schema document objects
//!
//! Documents arrive as plain `serde_json::Value` trees. `RawObject` wraps one
//! mapping node together with its kind so that field accessors can report
//! errors naming the offending object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::{FelisError, Result};
use crate::types::FelisType;

/// The kind of a document object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Schema,
    Table,
    Column,
    Constraint,
    Index,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema => write!(f, "schema"),
            Self::Table => write!(f, "table"),
            Self::Column => write!(f, "column"),
            Self::Constraint => write!(f, "constraint"),
            Self::Index => write!(f, "index"),
        }
    }
}

/// Constraint discriminator taken from `@type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    Check,
}

impl ConstraintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unique => "Unique",
            Self::ForeignKey => "ForeignKey",
            Self::Check => "Check",
        }
    }
}

impl FromStr for ConstraintKind {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s {
            "Unique" => Ok(Self::Unique),
            "ForeignKey" => Ok(Self::ForeignKey),
            "Check" => Ok(Self::Check),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Column autoincrement setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Autoincrement {
    /// Let the backend decide
    #[default]
    Auto,
    True,
    False,
}

impl Autoincrement {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::True)
    }
}

impl From<Option<bool>> for Autoincrement {
    fn from(value: Option<bool>) -> Self {
        match value {
            Some(true) => Self::True,
            Some(false) => Self::False,
            None => Self::Auto,
        }
    }
}

// =============================================================================
// Raw Objects
// =============================================================================

/// A borrowed mapping node of a schema document
#[derive(Debug, Clone, Copy)]
pub struct RawObject<'a> {
    kind: ObjectKind,
    map: &'a Map<String, Value>,
}

impl<'a> RawObject<'a> {
    /// Wrap a value, failing if it is not a mapping
    pub fn new(kind: ObjectKind, value: &'a Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self { kind, map }),
            _ => Err(FelisError::field_type(
                format!("{} entry", kind),
                kind.to_string(),
                "object",
            )),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn map(&self) -> &'a Map<String, Value> {
        self.map
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// The `@id`, if present and non-empty
    pub fn id(&self) -> Option<&'a str> {
        self.map
            .get("@id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn name(&self) -> Option<&'a str> {
        self.map.get("name").and_then(Value::as_str)
    }

    /// Label used in error messages: the `@id`, or kind and name
    pub fn label(&self) -> String {
        match (self.id(), self.name()) {
            (Some(id), _) => id.to_string(),
            (None, Some(name)) => format!("{} '{}'", self.kind, name),
            (None, None) => format!("unnamed {}", self.kind),
        }
    }

    pub fn require_id(&self) -> Result<&'a str> {
        self.id().ok_or_else(|| FelisError::missing(self.label(), "@id"))
    }

    pub fn require_name(&self) -> Result<&'a str> {
        self.require_str("name")
    }

    /// Optional string field
    pub fn str_field(&self, key: &str) -> Result<Option<&'a str>> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(FelisError::field_type(self.label(), key, "string")),
        }
    }

    pub fn require_str(&self, key: &str) -> Result<&'a str> {
        self.str_field(key)?
            .ok_or_else(|| FelisError::missing(self.label(), key))
    }

    /// Optional boolean field
    pub fn bool_field(&self, key: &str) -> Result<Option<bool>> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(FelisError::field_type(self.label(), key, "boolean")),
        }
    }

    /// Optional integer field
    pub fn int_field(&self, key: &str) -> Result<Option<i64>> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| FelisError::field_type(self.label(), key, "integer")),
        }
    }

    /// Optional positive integer field
    pub fn positive_int_field(&self, key: &str) -> Result<Option<u32>> {
        match self.int_field(key)? {
            None => Ok(None),
            Some(n) if n > 0 => u32::try_from(n)
                .map(Some)
                .map_err(|_| FelisError::invalid_value(self.label(), key, "value is too large")),
            Some(n) => Err(FelisError::invalid_value(
                self.label(),
                key,
                format!("must be positive, got {}", n),
            )),
        }
    }

    /// Optional list field
    pub fn list(&self, key: &str) -> Result<Option<&'a Vec<Value>>> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => Ok(Some(items)),
            Some(_) => Err(FelisError::field_type(self.label(), key, "list")),
        }
    }

    pub fn require_list(&self, key: &str) -> Result<&'a Vec<Value>> {
        self.list(key)?
            .ok_or_else(|| FelisError::missing(self.label(), key))
    }

    /// Optional list of strings
    pub fn string_list(&self, key: &str) -> Result<Option<Vec<&'a str>>> {
        let Some(items) = self.list(key)? else {
            return Ok(None);
        };
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| FelisError::field_type(self.label(), key, "list of strings"))
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// A field holding either one ID string or a list of ID strings
    pub fn id_list(&self, key: &str) -> Result<Option<Vec<&'a str>>> {
        match self.map.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(id)) => Ok(Some(vec![id.as_str()])),
            Some(Value::Array(_)) => self.string_list(key),
            Some(_) => Err(FelisError::field_type(
                self.label(),
                key,
                "string or list of strings",
            )),
        }
    }

    /// Resolve the `datatype` field through the registry
    pub fn datatype(&self) -> Result<FelisType> {
        let name = self.require_str("datatype")?;
        FelisType::lookup(name).map_err(|_| FelisError::InvalidType {
            object: self.label(),
            datatype: name.to_string(),
        })
    }

    /// Explicit `nullable`, or the datatype default
    pub fn nullable(&self, datatype: FelisType) -> Result<bool> {
        Ok(self
            .bool_field("nullable")?
            .unwrap_or(!datatype.is_numeric()))
    }

    pub fn autoincrement(&self) -> Result<Autoincrement> {
        self.bool_field("autoincrement").map(Autoincrement::from)
    }

    /// Keys carrying the given namespace prefix, e.g. `"votable:"`
    pub fn prefixed<'p>(&self, prefix: &'p str) -> impl Iterator<Item = (&'a str, &'a Value)> + 'p
    where
        'a: 'p,
    {
        let map = self.map;
        map.iter()
            .filter_map(move |(k, v)| k.strip_prefix(prefix).map(|rest| (rest, v)))
    }
}

// =============================================================================
// ID Generation
// =============================================================================

/// Fill in missing `@id` fields in place
///
/// Schemas and tables get `#<name>`, columns `#<table>.<column>`, and
/// constraints and indexes `#<name>`. Objects without a name are left alone
/// and fail validation as usual.
pub fn generate_ids(document: &mut Value) {
    let Some(schema) = document.as_object_mut() else {
        return;
    };
    assign_id(schema, None);

    let Some(Value::Array(tables)) = schema.get_mut("tables") else {
        return;
    };
    for table in tables.iter_mut() {
        let Some(table) = table.as_object_mut() else {
            continue;
        };
        assign_id(table, None);
        let table_name = table.get("name").and_then(Value::as_str).map(str::to_string);

        for key in ["columns", "constraints", "indexes"] {
            let Some(Value::Array(children)) = table.get_mut(key) else {
                continue;
            };
            let scope = if key == "columns" { table_name.as_deref() } else { None };
            for child in children.iter_mut().filter_map(Value::as_object_mut) {
                assign_id(child, scope);
            }
        }
    }
}

fn assign_id(object: &mut Map<String, Value>, scope: Option<&str>) {
    let has_id = object
        .get("@id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.is_empty());
    if has_id {
        return;
    }
    let Some(name) = object.get("name").and_then(Value::as_str) else {
        return;
    };
    let id = match scope {
        Some(scope) => format!("#{}.{}", scope, name),
        None => format!("#{}", name),
    };
    object.insert("@id".to_string(), Value::String(id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_label_prefers_id() {
        let value = json!({"@id": "#t", "name": "t"});
        let raw = RawObject::new(ObjectKind::Table, &value).unwrap();
        assert_eq!(raw.label(), "#t");

        let value = json!({"@id": "", "name": "t"});
        let raw = RawObject::new(ObjectKind::Table, &value).unwrap();
        assert_eq!(raw.label(), "table 't'");
        assert!(raw.require_id().is_err());
    }

    #[test]
    fn test_id_list_normalizes_string() {
        let value = json!({"primaryKey": "#c", "other": ["#a", "#b"], "bad": 3});
        let raw = RawObject::new(ObjectKind::Table, &value).unwrap();
        assert_eq!(raw.id_list("primaryKey").unwrap(), Some(vec!["#c"]));
        assert_eq!(raw.id_list("other").unwrap(), Some(vec!["#a", "#b"]));
        assert_eq!(raw.id_list("missing").unwrap(), None);
        match raw.id_list("bad") {
            Err(FelisError::InvalidFieldType { field, .. }) => assert_eq!(field, "bad"),
            other => panic!("Expected InvalidFieldType, got {:?}", other),
        }
    }

    #[test]
    fn test_nullable_defaults() {
        let value = json!({"@id": "#c", "name": "c"});
        let raw = RawObject::new(ObjectKind::Column, &value).unwrap();
        assert!(!raw.nullable(FelisType::Int).unwrap());
        assert!(raw.nullable(FelisType::String).unwrap());

        let value = json!({"@id": "#c", "name": "c", "nullable": true});
        let raw = RawObject::new(ObjectKind::Column, &value).unwrap();
        assert!(raw.nullable(FelisType::Double).unwrap());
    }

    #[test]
    fn test_autoincrement_tristate() {
        let value = json!({"a": true, "b": false});
        let raw = RawObject::new(ObjectKind::Column, &value).unwrap();
        assert_eq!(raw.autoincrement().unwrap(), Autoincrement::Auto);

        let value = json!({"autoincrement": false});
        let raw = RawObject::new(ObjectKind::Column, &value).unwrap();
        assert_eq!(raw.autoincrement().unwrap(), Autoincrement::False);
    }

    #[test]
    fn test_positive_int_field() {
        let value = json!({"length": 0, "size": 12, "name": "x"});
        let raw = RawObject::new(ObjectKind::Column, &value).unwrap();
        assert_eq!(raw.positive_int_field("size").unwrap(), Some(12));
        assert!(matches!(
            raw.positive_int_field("length"),
            Err(FelisError::InvalidValue { .. })
        ));
        assert!(matches!(
            raw.positive_int_field("name"),
            Err(FelisError::InvalidFieldType { .. })
        ));
    }

    #[test]
    fn test_prefixed_keys() {
        let value = json!({"votable:utype": "u", "votable:xtype": "x", "tap:std": 1});
        let raw = RawObject::new(ObjectKind::Column, &value).unwrap();
        let mut keys: Vec<_> = raw.prefixed("votable:").map(|(k, _)| k).collect();
        keys.sort();
        assert_eq!(keys, vec!["utype", "xtype"]);
    }

    #[test]
    fn test_generate_ids() {
        let mut doc = json!({
            "name": "s",
            "tables": [{
                "name": "t",
                "columns": [{"name": "a"}, {"name": "b", "@id": "#keep"}],
                "indexes": [{"name": "idx_a", "columns": ["#t.a"]}]
            }]
        });
        generate_ids(&mut doc);
        assert_eq!(doc["@id"], "#s");
        assert_eq!(doc["tables"][0]["@id"], "#t");
        assert_eq!(doc["tables"][0]["columns"][0]["@id"], "#t.a");
        assert_eq!(doc["tables"][0]["columns"][1]["@id"], "#keep");
        assert_eq!(doc["tables"][0]["indexes"][0]["@id"], "#idx_a");
    }
}
