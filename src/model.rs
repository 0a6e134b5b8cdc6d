//! Plain object model
//!
//! `SimpleBuilder` turns a document into value objects: schema, tables,
//! columns, constraints, and indexes with references kept as `@id` strings.
//! `SchemaGraph` pairs the result with the ID map so those references
//! resolve back to objects.

use semver::Version;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::backend::Dialect;
use crate::config::ValidationConfig;
use crate::diagnostics::Diagnostics;
use crate::document::{Autoincrement, ConstraintKind, RawObject};
use crate::error::Result;
use crate::graph::{ColumnRef, ObjectGraph, ObjectHandle};
use crate::types::FelisType;
use crate::visitor::{SchemaBuilder, TableParts, Visitor};

/// Keys every object kind interprets itself
const COMMON_KEYS: [&str; 3] = ["@id", "name", "description"];

// =============================================================================
// Model Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    #[serde(rename = "@id")]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub version: Option<SchemaVersion>,
    pub tables: Vec<Table>,
    /// Keys not interpreted by the model, e.g. `tap:schema_index`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, Value>,
}

/// Schema version and the versions it stays compatible with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaVersion {
    pub current: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub compatible: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub read_compatible: Vec<String>,
}

impl SchemaVersion {
    /// Read a validated version value (bare string or object)
    pub fn from_value(value: &Value) -> Self {
        let strings = |key: &str| -> Vec<String> {
            value
                .get(key)
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
                .unwrap_or_default()
        };

        match value {
            Value::String(current) => Self {
                current: current.clone(),
                compatible: Vec::new(),
                read_compatible: Vec::new(),
            },
            _ => Self {
                current: value
                    .get("current")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                compatible: strings("compatible"),
                read_compatible: strings("read_compatible"),
            },
        }
    }

    /// `current` as a semantic version, if it is one (leading `v` allowed)
    pub fn semver(&self) -> Option<Version> {
        let current = self.current.strip_prefix('v').unwrap_or(&self.current);
        Version::parse(current).ok()
    }

    /// Data written by `other` can be read and written by this version
    pub fn is_compatible_with(&self, other: &str) -> bool {
        self.current == other || self.compatible.iter().any(|v| v == other)
    }

    /// Data written by `other` can at least be read by this version
    pub fn is_read_compatible_with(&self, other: &str) -> bool {
        self.is_compatible_with(other) || self.read_compatible.iter().any(|v| v == other)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    #[serde(rename = "@id")]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub columns: Vec<Column>,
    /// Column IDs, in key order
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<Constraint>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Index>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, Value>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    #[serde(rename = "@id")]
    pub id: String,
    pub name: String,
    pub datatype: FelisType,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub nullable: bool,
    pub value: Option<Value>,
    pub autoincrement: Autoincrement,
    pub description: Option<String>,
    /// Raw `<dialect>:datatype` strings
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<Dialect, String>,
    /// VOTable, TAP, and other namespaced metadata
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, Value>,
}

impl Column {
    pub fn annotation(&self, key: &str) -> Option<&Value> {
        self.annotations.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Constraint {
    #[serde(rename = "@id")]
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub deferrable: bool,
    pub initially: Option<String>,
    #[serde(flatten)]
    pub kind: ConstraintDef,
}

/// Kind-specific constraint data
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "@type")]
pub enum ConstraintDef {
    Unique {
        columns: Vec<String>,
    },
    ForeignKey {
        columns: Vec<String>,
        #[serde(rename = "referencedColumns")]
        referenced_columns: Vec<String>,
        on_delete: Option<String>,
        on_update: Option<String>,
    },
    Check {
        expression: String,
    },
}

impl Constraint {
    pub fn kind(&self) -> ConstraintKind {
        match self.kind {
            ConstraintDef::Unique { .. } => ConstraintKind::Unique,
            ConstraintDef::ForeignKey { .. } => ConstraintKind::ForeignKey,
            ConstraintDef::Check { .. } => ConstraintKind::Check,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Index {
    #[serde(rename = "@id")]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expressions: Vec<String>,
}

// =============================================================================
// Builder
// =============================================================================

/// Builds the plain object model
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleBuilder;

fn optional_string(object: &RawObject<'_>, key: &str) -> Result<Option<String>> {
    Ok(object.str_field(key)?.map(str::to_string))
}

fn ids(refs: &[ColumnRef]) -> Vec<String> {
    refs.iter().map(|c| c.id.clone()).collect()
}

/// Entries of `map` whose keys are not in `consumed`
fn annotations(map: &Map<String, Value>, consumed: &[&str]) -> BTreeMap<String, Value> {
    map.iter()
        .filter(|(k, _)| !COMMON_KEYS.contains(&k.as_str()) && !consumed.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl SchemaBuilder for SimpleBuilder {
    type Schema = Schema;
    type Version = SchemaVersion;
    type Table = Table;
    type Column = Column;
    type PrimaryKey = Vec<String>;
    type Constraint = Constraint;
    type Index = Index;

    fn build_schema_version(&mut self, version: &Value) -> Result<SchemaVersion> {
        Ok(SchemaVersion::from_value(version))
    }

    fn build_column(
        &mut self,
        column: &RawObject<'_>,
        datatype: FelisType,
        _table: &RawObject<'_>,
    ) -> Result<Column> {
        let mut overrides = BTreeMap::new();
        let mut consumed = vec![
            "datatype".to_string(),
            "length".to_string(),
            "precision".to_string(),
            "nullable".to_string(),
            "value".to_string(),
            "autoincrement".to_string(),
        ];
        for dialect in Dialect::ALL {
            let key = dialect.override_key();
            if let Some(raw) = column.str_field(&key)? {
                overrides.insert(dialect, raw.to_string());
            }
            consumed.push(key);
        }
        let consumed: Vec<&str> = consumed.iter().map(String::as_str).collect();

        Ok(Column {
            id: column.require_id()?.to_string(),
            name: column.require_name()?.to_string(),
            datatype,
            length: column.positive_int_field("length")?,
            precision: column
                .int_field("precision")?
                .and_then(|p| u32::try_from(p).ok()),
            nullable: column.nullable(datatype)?,
            value: column.get("value").filter(|v| !v.is_null()).cloned(),
            autoincrement: column.autoincrement()?,
            description: optional_string(column, "description")?,
            overrides,
            annotations: annotations(column.map(), &consumed),
        })
    }

    fn build_primary_key(
        &mut self,
        columns: &[ColumnRef],
        _table: &RawObject<'_>,
    ) -> Result<Vec<String>> {
        Ok(ids(columns))
    }

    fn build_constraint(
        &mut self,
        constraint: &RawObject<'_>,
        kind: ConstraintKind,
        columns: &[ColumnRef],
        referenced: &[ColumnRef],
        _table: &RawObject<'_>,
    ) -> Result<Constraint> {
        let def = match kind {
            ConstraintKind::Unique => ConstraintDef::Unique { columns: ids(columns) },
            ConstraintKind::ForeignKey => ConstraintDef::ForeignKey {
                columns: ids(columns),
                referenced_columns: ids(referenced),
                on_delete: optional_string(constraint, "on_delete")?,
                on_update: optional_string(constraint, "on_update")?,
            },
            ConstraintKind::Check => ConstraintDef::Check {
                expression: constraint.require_str("expression")?.to_string(),
            },
        };

        Ok(Constraint {
            id: constraint.require_id()?.to_string(),
            name: optional_string(constraint, "name")?,
            description: optional_string(constraint, "description")?,
            deferrable: constraint.bool_field("deferrable")?.unwrap_or(false),
            initially: optional_string(constraint, "initially")?,
            kind: def,
        })
    }

    fn build_index(
        &mut self,
        index: &RawObject<'_>,
        columns: &[ColumnRef],
        _table: &RawObject<'_>,
    ) -> Result<Index> {
        Ok(Index {
            id: index.require_id()?.to_string(),
            name: index.require_name()?.to_string(),
            description: optional_string(index, "description")?,
            columns: ids(columns),
            expressions: index
                .string_list("expressions")?
                .unwrap_or_default()
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }

    fn build_table(&mut self, table: &RawObject<'_>, parts: TableParts<Self>) -> Result<Table> {
        Ok(Table {
            id: table.require_id()?.to_string(),
            name: table.require_name()?.to_string(),
            description: optional_string(table, "description")?,
            columns: parts.columns,
            primary_key: parts.primary_key.unwrap_or_default(),
            constraints: parts.constraints,
            indexes: parts.indexes,
            annotations: annotations(
                table.map(),
                &["columns", "primaryKey", "constraints", "indexes"],
            ),
        })
    }

    fn build_schema(
        &mut self,
        schema: &RawObject<'_>,
        version: Option<SchemaVersion>,
        tables: Vec<Table>,
    ) -> Result<Schema> {
        Ok(Schema {
            id: schema.require_id()?.to_string(),
            name: schema.require_name()?.to_string(),
            description: optional_string(schema, "description")?,
            version,
            tables,
            annotations: annotations(schema.map(), &["version", "tables"]),
        })
    }
}

// =============================================================================
// Schema Graph
// =============================================================================

/// A borrowed object found by `@id`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObjectRef<'a> {
    Schema(&'a Schema),
    Table(&'a Table),
    Column(&'a Column),
    Constraint(&'a Constraint),
    Index(&'a Index),
}

/// Built schema plus its ID map
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    pub schema: Schema,
    pub graph: ObjectGraph,
    pub diagnostics: Diagnostics,
}

impl SchemaGraph {
    /// Build with default validation options
    pub fn build(document: &Value) -> Result<Self> {
        Self::build_with(document, &ValidationConfig::default())
    }

    pub fn build_with(document: &Value, options: &ValidationConfig) -> Result<Self> {
        let mut visitor = Visitor::with_options(SimpleBuilder, options.clone());
        let schema = visitor.visit_schema(document)?;
        let (_, graph, diagnostics) = visitor.into_parts();
        Ok(Self {
            schema,
            graph,
            diagnostics,
        })
    }

    pub fn lookup(&self, id: &str) -> Option<ObjectRef<'_>> {
        let tables = &self.schema.tables;
        match self.graph.get(id)? {
            ObjectHandle::Schema { .. } => Some(ObjectRef::Schema(&self.schema)),
            ObjectHandle::Table { index, .. } => tables.get(*index).map(ObjectRef::Table),
            ObjectHandle::Column(c) => tables
                .get(c.table_index)?
                .columns
                .get(c.position)
                .map(ObjectRef::Column),
            ObjectHandle::Constraint { table_index, index, .. } => tables
                .get(*table_index)?
                .constraints
                .get(*index)
                .map(ObjectRef::Constraint),
            ObjectHandle::Index { table_index, index, .. } => tables
                .get(*table_index)?
                .indexes
                .get(*index)
                .map(ObjectRef::Index),
        }
    }

    pub fn table(&self, id: &str) -> Option<&Table> {
        match self.lookup(id)? {
            ObjectRef::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        match self.lookup(id)? {
            ObjectRef::Column(column) => Some(column),
            _ => None,
        }
    }

    /// Table owning a column
    pub fn table_of(&self, column_id: &str) -> Option<&Table> {
        let column = self.graph.column(column_id)?;
        self.schema.tables.get(column.table_index)
    }

    pub fn primary_key_columns(&self, table: &Table) -> Vec<&Column> {
        table.primary_key.iter().filter_map(|id| self.column(id)).collect()
    }

    /// Target table of a foreign key
    pub fn referenced_table(&self, constraint: &Constraint) -> Option<&Table> {
        match &constraint.kind {
            ConstraintDef::ForeignKey { referenced_columns, .. } => {
                self.table_of(referenced_columns.first()?)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_version_helpers() {
        let v = SchemaVersion::from_value(&json!({
            "current": "v2.1.0",
            "compatible": ["v2.0.0"],
            "read_compatible": ["v1.0.0"]
        }));
        assert_eq!(v.semver(), Some(Version::new(2, 1, 0)));
        assert!(v.is_compatible_with("v2.0.0"));
        assert!(!v.is_compatible_with("v1.0.0"));
        assert!(v.is_read_compatible_with("v1.0.0"));

        let bare = SchemaVersion::from_value(&json!("dp02"));
        assert_eq!(bare.current, "dp02");
        assert_eq!(bare.semver(), None);
    }

    #[test]
    fn test_column_annotations_and_overrides() {
        let doc = json!({
            "@id": "#s", "name": "s",
            "tables": [{
                "@id": "#t", "name": "t", "mysql:engine": "MyISAM",
                "columns": [{
                    "@id": "#t.ra", "name": "ra", "datatype": "double",
                    "ivoa:ucd": "pos.eq.ra", "mysql:datatype": "FLOAT"
                }]
            }]
        });
        let built = SchemaGraph::build(&doc).unwrap();
        let column = built.column("#t.ra").unwrap();
        assert_eq!(column.overrides.get(&Dialect::MySql).map(String::as_str), Some("FLOAT"));
        assert_eq!(column.annotation("ivoa:ucd"), Some(&json!("pos.eq.ra")));
        assert!(column.annotation("mysql:datatype").is_none());

        let table = built.table("#t").unwrap();
        assert_eq!(table.annotations.get("mysql:engine"), Some(&json!("MyISAM")));
        assert!(!table.annotations.contains_key("columns"));
    }

    #[test]
    fn test_foreign_key_resolution() {
        let doc = json!({
            "@id": "#s", "name": "s",
            "tables": [
                {
                    "@id": "#a", "name": "a",
                    "columns": [{"@id": "#a.id", "name": "id", "datatype": "long"}],
                    "primaryKey": "#a.id"
                },
                {
                    "@id": "#b", "name": "b",
                    "columns": [
                        {"@id": "#b.id", "name": "id", "datatype": "long"},
                        {"@id": "#b.a_id", "name": "a_id", "datatype": "long"}
                    ],
                    "constraints": [{
                        "@id": "#fk", "name": "fk_b_a", "@type": "ForeignKey",
                        "columns": ["#b.a_id"], "referencedColumns": ["#a.id"],
                        "on_delete": "CASCADE"
                    }]
                }
            ]
        });
        let built = SchemaGraph::build(&doc).unwrap();
        let fk = match built.lookup("#fk") {
            Some(ObjectRef::Constraint(c)) => c,
            other => panic!("Expected constraint, got {:?}", other),
        };
        assert_eq!(fk.kind(), ConstraintKind::ForeignKey);
        assert_eq!(built.referenced_table(fk).map(|t| t.name.as_str()), Some("a"));

        let a = built.table("#a").unwrap();
        let pk: Vec<_> = built.primary_key_columns(a).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(pk, vec!["id"]);
    }
}
