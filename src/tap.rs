//! TAP_SCHEMA rows
//!
//! `TapBuilder` describes a schema with the five IVOA TAP_SCHEMA tables:
//! schemas, tables, columns, keys, and key_columns. Names are qualified with
//! the schema (and catalog, when configured). Only foreign keys produce key
//! rows, and only this builder tracks the `indexed` column flag.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::backend::{tap_size, VotableType};
use crate::config::{TapConfig, ValidationConfig};
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::document::{ConstraintKind, RawObject};
use crate::error::Result;
use crate::graph::{ColumnRef, ObjectGraph};
use crate::types::FelisType;
use crate::visitor::{SchemaBuilder, TableParts, Visitor};

// =============================================================================
// Rows
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaRow {
    pub schema_name: String,
    pub utype: Option<String>,
    pub description: Option<String>,
    pub schema_index: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRow {
    pub schema_name: String,
    pub table_name: String,
    pub table_type: String,
    pub utype: Option<String>,
    pub description: Option<String>,
    pub table_index: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnRow {
    pub table_name: String,
    pub column_name: String,
    pub datatype: String,
    pub arraysize: Option<String>,
    /// Deprecated TAP 1.0 size
    pub size: Option<u32>,
    pub xtype: Option<String>,
    pub description: Option<String>,
    pub utype: Option<String>,
    pub unit: Option<String>,
    pub ucd: Option<String>,
    pub indexed: i32,
    pub principal: i64,
    pub std: i64,
    pub column_index: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyRow {
    pub key_id: String,
    pub from_table: String,
    pub target_table: String,
    pub utype: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyColumnRow {
    pub key_id: String,
    pub from_column: String,
    pub target_column: String,
}

/// A key with its column pairs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TapKey {
    pub key: KeyRow,
    pub columns: Vec<KeyColumnRow>,
}

/// Rows for one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TapTable {
    pub table: TableRow,
    pub columns: Vec<ColumnRow>,
    pub keys: Vec<TapKey>,
}

/// All TAP_SCHEMA rows for one schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TapSchema {
    pub schemas: Vec<SchemaRow>,
    pub tables: Vec<TableRow>,
    pub columns: Vec<ColumnRow>,
    pub keys: Vec<KeyRow>,
    pub key_columns: Vec<KeyColumnRow>,
}

impl TapSchema {
    pub fn column(&self, table_name: &str, column_name: &str) -> Option<&ColumnRow> {
        self.columns
            .iter()
            .find(|c| c.table_name == table_name && c.column_name == column_name)
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds TAP_SCHEMA rows
pub struct TapBuilder {
    options: TapConfig,
    /// Schema name with the catalog prefix applied
    schema_name: String,
    diagnostics: Diagnostics,
}

impl Default for TapBuilder {
    fn default() -> Self {
        Self::new(TapConfig::default())
    }
}

impl TapBuilder {
    pub fn new(options: TapConfig) -> Self {
        Self {
            options,
            schema_name: String::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Diagnostics {
        self.diagnostics
    }

    fn table_name(&self, table: &str) -> String {
        format!("{}.{}", self.schema_name, table)
    }

    /// Sized columns need an arraysize or a length; timestamps need an arraysize
    fn warn_missing_arraysize(
        &mut self,
        column: &RawObject<'_>,
        votable: &VotableType,
        datatype: FelisType,
    ) {
        if votable.arraysize.is_some() {
            return;
        }
        let missing =
            datatype.is_timestamp() || (datatype.is_sized() && !column.contains("length"));
        if !missing {
            return;
        }

        let id = column.label();
        let message = format!(
            "votable:arraysize for {} is not set for type {}; consider setting it",
            id, datatype
        );
        warn!("{}", message);
        self.diagnostics
            .record(id, DiagnosticCode::MissingArraysize, message);
    }
}

fn optional_string(object: &RawObject<'_>, key: &str) -> Result<Option<String>> {
    Ok(object.str_field(key)?.map(str::to_string))
}

impl SchemaBuilder for TapBuilder {
    type Schema = TapSchema;
    type Version = ();
    type Table = TapTable;
    type Column = ColumnRow;
    type PrimaryKey = ();
    type Constraint = Option<TapKey>;
    type Index = ();

    fn start_schema(&mut self, schema: &RawObject<'_>) -> Result<()> {
        let name = match &self.options.schema_name {
            Some(name) => name.clone(),
            None => schema.require_name()?.to_string(),
        };
        self.schema_name = match &self.options.catalog_name {
            Some(catalog) => format!("{}.{}", catalog, name),
            None => name,
        };
        Ok(())
    }

    fn build_schema_version(&mut self, _version: &Value) -> Result<()> {
        Ok(())
    }

    fn build_column(
        &mut self,
        column: &RawObject<'_>,
        datatype: FelisType,
        table: &RawObject<'_>,
    ) -> Result<ColumnRow> {
        let votable =
            VotableType::from_column(column, datatype, self.options.force_unbounded_arraysize)?;
        self.warn_missing_arraysize(column, &votable, datatype);

        let unit = match column.str_field("ivoa:unit")? {
            Some(unit) => Some(unit.to_string()),
            None => optional_string(column, "fits:tunit")?,
        };

        Ok(ColumnRow {
            table_name: self.table_name(table.require_name()?),
            column_name: column.require_name()?.to_string(),
            size: tap_size(votable.arraysize.as_deref()),
            datatype: votable.datatype,
            arraysize: votable.arraysize,
            xtype: votable.xtype,
            description: optional_string(column, "description")?,
            utype: optional_string(column, "votable:utype")?,
            unit,
            ucd: optional_string(column, "ivoa:ucd")?,
            indexed: 0,
            principal: column.int_field("tap:principal")?.unwrap_or(0),
            std: column.int_field("tap:std")?.unwrap_or(0),
            column_index: column.int_field("tap:column_index")?,
        })
    }

    fn build_primary_key(&mut self, _columns: &[ColumnRef], _table: &RawObject<'_>) -> Result<()> {
        Ok(())
    }

    fn build_constraint(
        &mut self,
        constraint: &RawObject<'_>,
        kind: ConstraintKind,
        columns: &[ColumnRef],
        referenced: &[ColumnRef],
        _table: &RawObject<'_>,
    ) -> Result<Option<TapKey>> {
        if kind != ConstraintKind::ForeignKey {
            return Ok(None);
        }
        let (Some(first), Some(first_referenced)) = (columns.first(), referenced.first()) else {
            return Ok(None);
        };

        let key_id = match constraint.name() {
            Some(name) => name.to_string(),
            None => constraint.require_id()?.to_string(),
        };
        let key = KeyRow {
            key_id: key_id.clone(),
            from_table: self.table_name(&first.table_name),
            target_table: self.table_name(&first_referenced.table_name),
            utype: optional_string(constraint, "votable:utype")?,
            description: optional_string(constraint, "description")?,
        };
        let columns = columns
            .iter()
            .zip(referenced)
            .map(|(from, target)| KeyColumnRow {
                key_id: key_id.clone(),
                from_column: from.name.clone(),
                target_column: target.name.clone(),
            })
            .collect();

        Ok(Some(TapKey { key, columns }))
    }

    fn build_index(
        &mut self,
        _index: &RawObject<'_>,
        _columns: &[ColumnRef],
        _table: &RawObject<'_>,
    ) -> Result<()> {
        Ok(())
    }

    fn build_table(&mut self, table: &RawObject<'_>, parts: TableParts<Self>) -> Result<TapTable> {
        Ok(TapTable {
            table: TableRow {
                schema_name: self.schema_name.clone(),
                table_name: self.table_name(table.require_name()?),
                table_type: "table".to_string(),
                utype: optional_string(table, "votable:utype")?,
                description: optional_string(table, "description")?,
                table_index: table.int_field("tap:table_index")?.unwrap_or(0),
            },
            columns: parts.columns,
            keys: parts.constraints.into_iter().flatten().collect(),
        })
    }

    fn build_schema(
        &mut self,
        schema: &RawObject<'_>,
        _version: Option<()>,
        tables: Vec<TapTable>,
    ) -> Result<TapSchema> {
        let schema_index = match self.options.schema_index {
            Some(index) => index,
            None => schema.int_field("tap:schema_index")?.unwrap_or(0),
        };

        let mut rows = TapSchema {
            schemas: vec![SchemaRow {
                schema_name: self.schema_name.clone(),
                utype: optional_string(schema, "votable:utype")?,
                description: optional_string(schema, "description")?,
                schema_index,
            }],
            ..Default::default()
        };
        for table in tables {
            rows.tables.push(table.table);
            rows.columns.extend(table.columns);
            for key in table.keys {
                rows.keys.push(key.key);
                rows.key_columns.extend(key.columns);
            }
        }
        Ok(rows)
    }

    fn mark_indexed(&mut self, column: &mut ColumnRow) {
        column.indexed = 1;
    }
}

/// Build TAP_SCHEMA rows for a document
pub fn build_tap(
    document: &Value,
    validation: &ValidationConfig,
    options: &TapConfig,
) -> Result<(TapSchema, ObjectGraph, Diagnostics)> {
    let builder = TapBuilder::new(options.clone());
    let mut visitor = Visitor::with_options(builder, validation.clone());
    let rows = visitor.visit_schema(document)?;
    let (builder, graph, mut diagnostics) = visitor.into_parts();
    diagnostics.merge(builder.into_diagnostics());
    Ok((rows, graph, diagnostics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "@id": "#dp", "name": "dp", "tap:schema_index": 3,
            "tables": [
                {
                    "@id": "#Object", "name": "Object", "tap:table_index": 1,
                    "columns": [
                        {"@id": "#Object.id", "name": "id", "datatype": "long", "tap:principal": 1},
                        {"@id": "#Object.ra", "name": "ra", "datatype": "double",
                         "ivoa:unit": "deg", "ivoa:ucd": "pos.eq.ra", "tap:std": 1},
                        {"@id": "#Object.band", "name": "band", "datatype": "char", "length": 1},
                        {"@id": "#Object.label", "name": "label", "datatype": "string", "length": 32}
                    ],
                    "primaryKey": "#Object.id"
                },
                {
                    "@id": "#Source", "name": "Source",
                    "columns": [
                        {"@id": "#Source.id", "name": "id", "datatype": "long"},
                        {"@id": "#Source.obj", "name": "objectId", "datatype": "long"},
                        {"@id": "#Source.t", "name": "t", "datatype": "timestamp", "fits:tunit": "s"},
                        {"@id": "#Source.note", "name": "note", "datatype": "string"}
                    ],
                    "primaryKey": ["#Source.id", "#Source.obj"],
                    "constraints": [{
                        "@id": "#Source_fk", "name": "source_object", "@type": "ForeignKey",
                        "columns": ["#Source.obj"], "referencedColumns": ["#Object.id"]
                    }],
                    "indexes": [{"@id": "#Source_idx", "name": "source_obj", "columns": ["#Source.obj"]}]
                }
            ]
        })
    }

    #[test]
    fn test_rows() {
        let (rows, _, diagnostics) =
            build_tap(&document(), &ValidationConfig::default(), &TapConfig::default()).unwrap();

        assert_eq!(rows.schemas[0].schema_name, "dp");
        assert_eq!(rows.schemas[0].schema_index, 3);
        assert_eq!(rows.tables.len(), 2);
        assert_eq!(rows.tables[0].table_name, "dp.Object");
        assert_eq!(rows.tables[0].table_index, 1);
        assert_eq!(rows.columns.len(), 8);

        let ra = rows.column("dp.Object", "ra").unwrap();
        assert_eq!(ra.datatype, "double");
        assert_eq!(ra.unit.as_deref(), Some("deg"));
        assert_eq!(ra.std, 1);

        let label = rows.column("dp.Object", "label").unwrap();
        assert_eq!(label.datatype, "char");
        assert_eq!(label.arraysize.as_deref(), Some("32*"));
        assert_eq!(label.size, Some(32));

        assert_eq!(rows.column("dp.Object", "band").unwrap().arraysize, None);

        let t = rows.column("dp.Source", "t").unwrap();
        assert_eq!(t.xtype.as_deref(), Some("timestamp"));
        assert_eq!(t.unit.as_deref(), Some("s"));
        assert_eq!(t.arraysize.as_deref(), Some("*"));

        // string with neither length nor votable:arraysize
        let missing: Vec<_> = diagnostics
            .with_code(DiagnosticCode::MissingArraysize)
            .map(|d| d.object_id.as_str())
            .collect();
        assert_eq!(missing, vec!["#Source.note"]);
        assert_eq!(rows.column("dp.Source", "note").unwrap().arraysize, None);
    }

    #[test]
    fn test_indexed_flag() {
        let (rows, _, _) =
            build_tap(&document(), &ValidationConfig::default(), &TapConfig::default()).unwrap();
        assert_eq!(rows.column("dp.Object", "id").unwrap().indexed, 1);
        assert_eq!(rows.column("dp.Object", "ra").unwrap().indexed, 0);
        // composite primary key does not mark, the single-column index does
        assert_eq!(rows.column("dp.Source", "id").unwrap().indexed, 0);
        assert_eq!(rows.column("dp.Source", "objectId").unwrap().indexed, 1);
    }

    #[test]
    fn test_keys() {
        let (rows, _, _) =
            build_tap(&document(), &ValidationConfig::default(), &TapConfig::default()).unwrap();
        assert_eq!(
            rows.keys,
            vec![KeyRow {
                key_id: "source_object".to_string(),
                from_table: "dp.Source".to_string(),
                target_table: "dp.Object".to_string(),
                utype: None,
                description: None,
            }]
        );
        assert_eq!(rows.key_columns.len(), 1);
        assert_eq!(rows.key_columns[0].from_column, "objectId");
        assert_eq!(rows.key_columns[0].target_column, "id");
    }

    #[test]
    fn test_catalog_and_overrides() {
        let options = TapConfig {
            catalog_name: Some("cat".to_string()),
            schema_name: Some("dp1".to_string()),
            schema_index: Some(7),
            force_unbounded_arraysize: true,
        };
        let (rows, _, _) = build_tap(&document(), &ValidationConfig::default(), &options).unwrap();
        assert_eq!(rows.schemas[0].schema_name, "cat.dp1");
        assert_eq!(rows.schemas[0].schema_index, 7);
        let label = rows.column("cat.dp1.Object", "label").unwrap();
        assert_eq!(label.arraysize.as_deref(), Some("*"));
        assert_eq!(label.size, None);
    }
}
