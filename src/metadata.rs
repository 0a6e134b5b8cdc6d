//! Relational metadata
//!
//! `MetadataBuilder` produces the declarative table model a DDL generator
//! consumes: columns carry a [`MappedType`] that renders per dialect, and
//! tables carry their keys, constraints, indexes, and backend options.

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

use crate::backend::{ColumnSpec, Dialect, MappedType, TypeMapper};
use crate::config::{MetadataConfig, ValidationConfig};
use crate::diagnostics::Diagnostics;
use crate::document::{Autoincrement, ConstraintKind, RawObject};
use crate::error::Result;
use crate::graph::{ColumnRef, ObjectGraph};
use crate::types::FelisType;
use crate::visitor::{SchemaBuilder, TableParts, Visitor};

/// Table option keys and the names DDL generators expect
const TABLE_OPTIONS: [(&str, &str); 3] = [
    ("mysql:engine", "mysql_engine"),
    ("mysql:charset", "mysql_charset"),
    ("oracle:compress", "oracle_compress"),
];

// =============================================================================
// Metadata Types
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct MetaData {
    pub schema_name: String,
    pub description: Option<String>,
    pub tables: Vec<SqlTable>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlTable {
    pub id: String,
    pub name: String,
    /// Schema qualifier, when tables are schema-qualified
    pub schema: Option<String>,
    pub comment: Option<String>,
    pub columns: Vec<SqlColumn>,
    /// Column names
    pub primary_key: Vec<String>,
    pub constraints: Vec<SqlConstraint>,
    pub indexes: Vec<SqlIndex>,
    pub options: BTreeMap<String, String>,
}

impl SqlTable {
    pub fn qualified_name(&self) -> String {
        qualify(self.schema.as_deref(), &self.name)
    }

    pub fn column(&self, name: &str) -> Option<&SqlColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlColumn {
    pub id: String,
    pub name: String,
    pub datatype: MappedType,
    pub nullable: bool,
    pub default: Option<Value>,
    pub autoincrement: Autoincrement,
    pub comment: Option<String>,
}

impl SqlColumn {
    pub fn sql_type(&self, dialect: Dialect) -> String {
        self.datatype.render(dialect)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlConstraint {
    pub name: Option<String>,
    pub deferrable: bool,
    pub initially: Option<String>,
    pub kind: SqlConstraintKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SqlConstraintKind {
    Unique {
        columns: Vec<String>,
    },
    ForeignKey {
        columns: Vec<String>,
        /// Qualified name of the target table
        referenced_table: String,
        referenced_columns: Vec<String>,
        on_delete: Option<String>,
        on_update: Option<String>,
    },
    Check {
        expression: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct SqlIndex {
    pub name: String,
    pub columns: Vec<String>,
    pub expressions: Vec<String>,
}

fn qualify(schema: Option<&str>, name: &str) -> String {
    match schema {
        Some(schema) => format!("{}.{}", schema, name),
        None => name.to_string(),
    }
}

impl MetaData {
    pub fn table(&self, name: &str) -> Option<&SqlTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Tables ordered so that foreign-key targets precede their referrers
    ///
    /// Falls back to document order when the foreign keys form a cycle.
    pub fn sorted_tables(&self) -> Vec<&SqlTable> {
        match self.foreign_key_order() {
            Some(order) => order.into_iter().map(|i| &self.tables[i]).collect(),
            None => {
                warn!(
                    "Foreign keys in schema {} form a cycle; keeping document order",
                    self.schema_name
                );
                self.tables.iter().collect()
            }
        }
    }

    pub fn has_foreign_key_cycle(&self) -> bool {
        self.foreign_key_order().is_none()
    }

    fn foreign_key_order(&self) -> Option<Vec<usize>> {
        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(self.tables.len(), 0);
        let nodes: Vec<NodeIndex> = (0..self.tables.len()).map(|i| graph.add_node(i)).collect();
        let by_name: HashMap<String, usize> = self
            .tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.qualified_name(), i))
            .collect();

        for (from, table) in self.tables.iter().enumerate() {
            for constraint in &table.constraints {
                let SqlConstraintKind::ForeignKey { referenced_table, .. } = &constraint.kind else {
                    continue;
                };
                match by_name.get(referenced_table) {
                    Some(&target) if target != from => {
                        graph.update_edge(nodes[target], nodes[from], ());
                    }
                    _ => {}
                }
            }
        }

        toposort(&graph, None)
            .ok()
            .map(|order| order.into_iter().map(|n| graph[n]).collect())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds relational metadata for DDL generation
pub struct MetadataBuilder {
    options: MetadataConfig,
    mapper: TypeMapper,
    schema_name: String,
}

impl Default for MetadataBuilder {
    fn default() -> Self {
        Self::new(MetadataConfig::default())
    }
}

impl MetadataBuilder {
    pub fn new(options: MetadataConfig) -> Self {
        Self {
            options,
            mapper: TypeMapper::new(),
            schema_name: String::new(),
        }
    }

    fn table_schema(&self) -> Option<String> {
        self.options
            .apply_schema_to_tables
            .then(|| self.schema_name.clone())
    }

    fn qualified_table(&self, name: &str) -> String {
        qualify(self.table_schema().as_deref(), name)
    }
}

fn names(refs: &[ColumnRef]) -> Vec<String> {
    refs.iter().map(|c| c.name.clone()).collect()
}

fn description(object: &RawObject<'_>) -> Result<Option<String>> {
    Ok(object.str_field("description")?.map(str::to_string))
}

impl SchemaBuilder for MetadataBuilder {
    type Schema = MetaData;
    type Version = ();
    type Table = SqlTable;
    type Column = SqlColumn;
    type PrimaryKey = Vec<String>;
    type Constraint = Option<SqlConstraint>;
    type Index = SqlIndex;

    fn start_schema(&mut self, schema: &RawObject<'_>) -> Result<()> {
        self.schema_name = match &self.options.schema_name {
            Some(name) => name.clone(),
            None => schema.require_name()?.to_string(),
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
        _table: &RawObject<'_>,
    ) -> Result<SqlColumn> {
        let spec = ColumnSpec::from_raw(column, datatype)?;
        let mapped = self.mapper.map_column(&spec)?;
        debug!("Mapped {} to {}", spec.id, mapped.render_generic());

        Ok(SqlColumn {
            id: column.require_id()?.to_string(),
            name: column.require_name()?.to_string(),
            datatype: mapped,
            nullable: column.nullable(datatype)?,
            default: column.get("value").filter(|v| !v.is_null()).cloned(),
            autoincrement: column.autoincrement()?,
            comment: description(column)?,
        })
    }

    fn build_primary_key(
        &mut self,
        columns: &[ColumnRef],
        _table: &RawObject<'_>,
    ) -> Result<Vec<String>> {
        Ok(names(columns))
    }

    fn build_constraint(
        &mut self,
        constraint: &RawObject<'_>,
        kind: ConstraintKind,
        columns: &[ColumnRef],
        referenced: &[ColumnRef],
        _table: &RawObject<'_>,
    ) -> Result<Option<SqlConstraint>> {
        if self.options.ignore_constraints {
            return Ok(None);
        }

        let kind = match kind {
            ConstraintKind::Unique => SqlConstraintKind::Unique { columns: names(columns) },
            ConstraintKind::ForeignKey => SqlConstraintKind::ForeignKey {
                columns: names(columns),
                referenced_table: referenced
                    .first()
                    .map(|c| self.qualified_table(&c.table_name))
                    .unwrap_or_default(),
                referenced_columns: names(referenced),
                on_delete: constraint.str_field("on_delete")?.map(str::to_string),
                on_update: constraint.str_field("on_update")?.map(str::to_string),
            },
            ConstraintKind::Check => SqlConstraintKind::Check {
                expression: constraint.require_str("expression")?.to_string(),
            },
        };

        Ok(Some(SqlConstraint {
            name: constraint.name().map(str::to_string),
            deferrable: constraint.bool_field("deferrable")?.unwrap_or(false),
            initially: constraint.str_field("initially")?.map(str::to_string),
            kind,
        }))
    }

    fn build_index(
        &mut self,
        index: &RawObject<'_>,
        columns: &[ColumnRef],
        _table: &RawObject<'_>,
    ) -> Result<SqlIndex> {
        Ok(SqlIndex {
            name: index.require_name()?.to_string(),
            columns: names(columns),
            expressions: index
                .string_list("expressions")?
                .unwrap_or_default()
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }

    fn build_table(&mut self, table: &RawObject<'_>, parts: TableParts<Self>) -> Result<SqlTable> {
        let mut options = BTreeMap::new();
        for (key, option) in TABLE_OPTIONS {
            let value = match table.get(key) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => continue,
                Some(other) => other.to_string(),
            };
            options.insert(option.to_string(), value);
        }

        Ok(SqlTable {
            id: table.require_id()?.to_string(),
            name: table.require_name()?.to_string(),
            schema: self.table_schema(),
            comment: description(table)?,
            columns: parts.columns,
            primary_key: parts.primary_key.unwrap_or_default(),
            constraints: parts.constraints.into_iter().flatten().collect(),
            indexes: parts.indexes,
            options,
        })
    }

    fn build_schema(
        &mut self,
        schema: &RawObject<'_>,
        _version: Option<()>,
        tables: Vec<SqlTable>,
    ) -> Result<MetaData> {
        Ok(MetaData {
            schema_name: self.schema_name.clone(),
            description: description(schema)?,
            tables,
        })
    }
}

/// Build relational metadata for a document
pub fn build_metadata(
    document: &Value,
    validation: &ValidationConfig,
    options: &MetadataConfig,
) -> Result<(MetaData, ObjectGraph, Diagnostics)> {
    let builder = MetadataBuilder::new(options.clone());
    let mut visitor = Visitor::with_options(builder, validation.clone());
    let metadata = visitor.visit_schema(document)?;
    let (_, graph, diagnostics) = visitor.into_parts();
    Ok((metadata, graph, diagnostics))
}
