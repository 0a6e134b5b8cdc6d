//! Graph Visitor
//!
//! Builder-agnostic traversal of a schema document. The visitor owns the
//! recursion order, validation dispatch, and the ID map; every node is
//! constructed by the injected [`SchemaBuilder`].
//!
//! ## Order
//! 1. Schema, then its version if present
//! 2. Per table, in document order: the table itself, its columns, the
//!    primary key, constraints, then indexes
//! 3. Each table is assembled once its children are built, and the schema
//!    once all tables are
//!
//! References are resolved in a single pass: a column must be registered
//! before a primary key, constraint, or index can name it.

use serde_json::Value;
use tracing::debug;

use crate::config::ValidationConfig;
use crate::diagnostics::Diagnostics;
use crate::document::{generate_ids, ConstraintKind, ObjectKind, RawObject};
use crate::error::{FelisError, Result};
use crate::graph::{ColumnRef, ObjectGraph, ObjectHandle};
use crate::types::FelisType;
use crate::validate::FelisValidator;

// =============================================================================
// Builder Interface
// =============================================================================

/// Built children of one table, handed to [`SchemaBuilder::build_table`]
pub struct TableParts<B: SchemaBuilder + ?Sized> {
    pub columns: Vec<B::Column>,
    pub primary_key: Option<B::PrimaryKey>,
    pub constraints: Vec<B::Constraint>,
    pub indexes: Vec<B::Index>,
}

/// Constructs one representation of a schema document
///
/// Every method receives an object that has already passed validation, so
/// required fields can be read without re-checking their presence.
pub trait SchemaBuilder {
    type Schema;
    type Version;
    type Table;
    type Column;
    type PrimaryKey;
    type Constraint;
    type Index;

    /// Called once the schema object is validated, before any table
    fn start_schema(&mut self, _schema: &RawObject<'_>) -> Result<()> {
        Ok(())
    }

    fn build_schema_version(&mut self, version: &Value) -> Result<Self::Version>;

    fn build_column(
        &mut self,
        column: &RawObject<'_>,
        datatype: FelisType,
        table: &RawObject<'_>,
    ) -> Result<Self::Column>;

    fn build_primary_key(
        &mut self,
        columns: &[ColumnRef],
        table: &RawObject<'_>,
    ) -> Result<Self::PrimaryKey>;

    fn build_constraint(
        &mut self,
        constraint: &RawObject<'_>,
        kind: ConstraintKind,
        columns: &[ColumnRef],
        referenced: &[ColumnRef],
        table: &RawObject<'_>,
    ) -> Result<Self::Constraint>;

    fn build_index(
        &mut self,
        index: &RawObject<'_>,
        columns: &[ColumnRef],
        table: &RawObject<'_>,
    ) -> Result<Self::Index>;

    fn build_table(
        &mut self,
        table: &RawObject<'_>,
        parts: TableParts<Self>,
    ) -> Result<Self::Table>;

    fn build_schema(
        &mut self,
        schema: &RawObject<'_>,
        version: Option<Self::Version>,
        tables: Vec<Self::Table>,
    ) -> Result<Self::Schema>;

    /// A single-column primary key or index covers this column
    fn mark_indexed(&mut self, _column: &mut Self::Column) {}
}

// =============================================================================
// Visitor
// =============================================================================

/// Traversal engine for one schema document
pub struct Visitor<B: SchemaBuilder> {
    builder: B,
    validator: FelisValidator,
    graph: ObjectGraph,
}

impl<B: SchemaBuilder> Visitor<B> {
    pub fn new(builder: B) -> Self {
        Self::with_options(builder, ValidationConfig::default())
    }

    pub fn with_options(builder: B, options: ValidationConfig) -> Self {
        Self {
            builder,
            validator: FelisValidator::with_options(options),
            graph: ObjectGraph::new(),
        }
    }

    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        self.validator.diagnostics()
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    /// Consume the visitor, keeping the builder, ID map, and diagnostics
    pub fn into_parts(mut self) -> (B, ObjectGraph, Diagnostics) {
        let diagnostics = self.validator.take_diagnostics();
        (self.builder, self.graph, diagnostics)
    }

    /// Validate and build a whole document
    ///
    /// Any error aborts the traversal. Visiting again starts over with an
    /// empty ID map.
    pub fn visit_schema(&mut self, document: &Value) -> Result<B::Schema> {
        self.graph.clear();
        self.validator.reset();

        if self.validator.options().id_generation {
            let mut document = document.clone();
            generate_ids(&mut document);
            self.visit_document(&document)
        } else {
            self.visit_document(document)
        }
    }

    fn visit_document(&mut self, document: &Value) -> Result<B::Schema> {
        self.validator.check_schema(document)?;
        let schema = RawObject::new(ObjectKind::Schema, document)?;
        let id = schema.require_id()?;
        let name = schema.require_name()?;
        debug!("Building schema {}", name);
        self.graph.insert(id, ObjectHandle::Schema { name: name.to_string() });
        self.builder.start_schema(&schema)?;

        let version = match schema.get("version").filter(|v| !v.is_null()) {
            Some(version) => {
                self.validator.check_schema_version(version)?;
                Some(self.builder.build_schema_version(version)?)
            }
            None => None,
        };

        let tables = schema.require_list("tables")?;
        let mut built = Vec::with_capacity(tables.len());
        for (index, table) in tables.iter().enumerate() {
            built.push(self.visit_table(index, table)?);
        }

        self.builder.build_schema(&schema, version, built)
    }

    fn visit_table(&mut self, index: usize, value: &Value) -> Result<B::Table> {
        self.validator.check_table(value)?;
        let table = RawObject::new(ObjectKind::Table, value)?;
        let id = table.require_id()?;
        let name = table.require_name()?;
        debug!("Building table {}", name);
        self.graph.insert(
            id,
            ObjectHandle::Table {
                name: name.to_string(),
                index,
            },
        );

        let mut columns = Vec::new();
        for (position, column) in table.require_list("columns")?.iter().enumerate() {
            columns.push(self.visit_column(index, position, column, &table)?);
        }

        let primary_key = match table.get("primaryKey") {
            Some(primary_key) => {
                Some(self.visit_primary_key(index, primary_key, &table, &mut columns)?)
            }
            None => None,
        };

        let mut constraints = Vec::new();
        let constraint_values = table.list("constraints")?.into_iter().flatten();
        for (position, constraint) in constraint_values.enumerate() {
            constraints.push(self.visit_constraint(index, position, constraint, &table)?);
        }

        let mut indexes = Vec::new();
        let index_values = table.list("indexes")?.into_iter().flatten();
        for (position, idx) in index_values.enumerate() {
            indexes.push(self.visit_index(index, position, idx, &table, &mut columns)?);
        }

        self.builder.build_table(
            &table,
            TableParts {
                columns,
                primary_key,
                constraints,
                indexes,
            },
        )
    }

    fn visit_column(
        &mut self,
        table_index: usize,
        position: usize,
        value: &Value,
        table: &RawObject<'_>,
    ) -> Result<B::Column> {
        let datatype = self.validator.check_column(value, table)?;
        let column = RawObject::new(ObjectKind::Column, value)?;
        let id = column.require_id()?;

        let built = self.builder.build_column(&column, datatype, table)?;
        self.graph.insert(
            id,
            ObjectHandle::Column(ColumnRef {
                id: id.to_string(),
                name: column.require_name()?.to_string(),
                datatype,
                table_index,
                table_id: table.require_id()?.to_string(),
                table_name: table.require_name()?.to_string(),
                position,
            }),
        );
        Ok(built)
    }

    fn visit_primary_key(
        &mut self,
        table_index: usize,
        value: &Value,
        table: &RawObject<'_>,
        columns: &mut [B::Column],
    ) -> Result<B::PrimaryKey> {
        let ids = self.validator.check_primary_key(value, table)?;
        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        let refs = self.resolve_columns(table, &ids)?;
        require_table(table, &refs, table_index)?;

        self.mark_single_indexed(&refs, columns);
        self.builder.build_primary_key(&refs, table)
    }

    fn visit_constraint(
        &mut self,
        table_index: usize,
        position: usize,
        value: &Value,
        table: &RawObject<'_>,
    ) -> Result<B::Constraint> {
        let kind = self.validator.check_constraint(value)?;
        let constraint = RawObject::new(ObjectKind::Constraint, value)?;
        let id = constraint.require_id()?;

        let column_ids = constraint.id_list("columns")?.unwrap_or_default();
        let columns = self.resolve_columns(&constraint, &column_ids)?;
        require_table(&constraint, &columns, table_index)?;

        let referenced_ids = constraint.id_list("referencedColumns")?.unwrap_or_default();
        let referenced = self.resolve_columns(&constraint, &referenced_ids)?;

        let built = self
            .builder
            .build_constraint(&constraint, kind, &columns, &referenced, table)?;
        self.graph.insert(
            id,
            ObjectHandle::Constraint {
                name: constraint.name().map(str::to_string),
                table_index,
                index: position,
            },
        );
        Ok(built)
    }

    fn visit_index(
        &mut self,
        table_index: usize,
        position: usize,
        value: &Value,
        table: &RawObject<'_>,
        columns: &mut [B::Column],
    ) -> Result<B::Index> {
        self.validator.check_index(value)?;
        let index = RawObject::new(ObjectKind::Index, value)?;
        let id = index.require_id()?;

        let column_ids = index.id_list("columns")?.unwrap_or_default();
        let refs = self.resolve_columns(&index, &column_ids)?;
        require_table(&index, &refs, table_index)?;
        self.mark_single_indexed(&refs, columns);

        let built = self.builder.build_index(&index, &refs, table)?;
        self.graph.insert(
            id,
            ObjectHandle::Index {
                name: index.require_name()?.to_string(),
                table_index,
                index: position,
            },
        );
        Ok(built)
    }

    fn mark_single_indexed(&mut self, refs: &[ColumnRef], columns: &mut [B::Column]) {
        if let [only] = refs {
            if let Some(column) = columns.get_mut(only.position) {
                self.builder.mark_indexed(column);
            }
        }
    }

    /// Look up column IDs; all of them must live in one table
    fn resolve_columns(&self, owner: &RawObject<'_>, ids: &[&str]) -> Result<Vec<ColumnRef>> {
        let mut refs = Vec::with_capacity(ids.len());
        for id in ids {
            let unresolved = || FelisError::UnresolvedReference {
                object: owner.label(),
                reference: id.to_string(),
            };
            let column = self
                .graph
                .get(id)
                .ok_or_else(unresolved)?
                .as_column()
                .ok_or_else(unresolved)?;
            refs.push(column.clone());
        }

        if let Some(first) = refs.first() {
            if let Some(other) = refs.iter().find(|c| c.table_index != first.table_index) {
                return Err(FelisError::TableConsistency {
                    object: owner.label(),
                    reason: format!(
                        "{} belongs to table {} but {} belongs to table {}",
                        first.id, first.table_name, other.id, other.table_name
                    ),
                });
            }
        }
        Ok(refs)
    }
}

/// Resolved columns must belong to the table being built
fn require_table(owner: &RawObject<'_>, refs: &[ColumnRef], table_index: usize) -> Result<()> {
    match refs.iter().find(|c| c.table_index != table_index) {
        Some(foreign) => Err(FelisError::TableConsistency {
            object: owner.label(),
            reason: format!(
                "{} belongs to table {}, not the table being built",
                foreign.id, foreign.table_name
            ),
        }),
        None => Ok(()),
    }
}

// =============================================================================
// Validation-only Builder
// =============================================================================

/// Builds nothing; runs the traversal for its checks
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckBuilder;

impl SchemaBuilder for CheckBuilder {
    type Schema = ();
    type Version = ();
    type Table = ();
    type Column = ();
    type PrimaryKey = ();
    type Constraint = ();
    type Index = ();

    fn build_schema_version(&mut self, _version: &Value) -> Result<()> {
        Ok(())
    }

    fn build_column(&mut self, _: &RawObject<'_>, _: FelisType, _: &RawObject<'_>) -> Result<()> {
        Ok(())
    }

    fn build_primary_key(&mut self, _: &[ColumnRef], _: &RawObject<'_>) -> Result<()> {
        Ok(())
    }

    fn build_constraint(
        &mut self,
        _: &RawObject<'_>,
        _: ConstraintKind,
        _: &[ColumnRef],
        _: &[ColumnRef],
        _: &RawObject<'_>,
    ) -> Result<()> {
        Ok(())
    }

    fn build_index(&mut self, _: &RawObject<'_>, _: &[ColumnRef], _: &RawObject<'_>) -> Result<()> {
        Ok(())
    }

    fn build_table(&mut self, _: &RawObject<'_>, _: TableParts<Self>) -> Result<()> {
        Ok(())
    }

    fn build_schema(&mut self, _: &RawObject<'_>, _: Option<()>, _: Vec<()>) -> Result<()> {
        Ok(())
    }
}

/// Validate a document, returning its non-fatal diagnostics
pub fn validate_document(document: &Value, options: &ValidationConfig) -> Result<Diagnostics> {
    let mut visitor = Visitor::with_options(CheckBuilder, options.clone());
    visitor.visit_schema(document)?;
    let (_, _, diagnostics) = visitor.into_parts();
    Ok(diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchemaGraph;
    use serde_json::json;

    #[test]
    fn test_graph_holds_every_object() {
        let doc = json!({
            "@id": "#s", "name": "s",
            "tables": [{
                "@id": "#t", "name": "t",
                "columns": [
                    {"@id": "#t.a", "name": "a", "datatype": "int"},
                    {"@id": "#t.b", "name": "b", "datatype": "string", "length": 8}
                ],
                "primaryKey": "#t.a",
                "constraints": [{"@id": "#u", "@type": "Unique", "columns": ["#t.b"]}],
                "indexes": [{"@id": "#i", "name": "i", "columns": ["#t.a", "#t.b"]}]
            }]
        });
        let mut visitor = Visitor::new(CheckBuilder);
        visitor.visit_schema(&doc).unwrap();
        assert_eq!(visitor.graph().len(), 6);
        assert_eq!(
            visitor.graph().ids().collect::<Vec<_>>(),
            vec!["#s", "#t", "#t.a", "#t.b", "#u", "#i"]
        );
    }

    #[test]
    fn test_primary_key_must_be_declared_first() {
        let doc = json!({
            "@id": "#s", "name": "s",
            "tables": [{
                "@id": "#t", "name": "t",
                "columns": [{"@id": "#t.a", "name": "a", "datatype": "int"}],
                "primaryKey": ["#t.missing"]
            }]
        });
        match Visitor::new(CheckBuilder).visit_schema(&doc) {
            Err(FelisError::UnresolvedReference { object, reference }) => {
                assert_eq!(object, "#t");
                assert_eq!(reference, "#t.missing");
            }
            other => panic!("Expected UnresolvedReference, got {:?}", other),
        }
    }

    #[test]
    fn test_reference_to_non_column() {
        let doc = json!({
            "@id": "#s", "name": "s",
            "tables": [{
                "@id": "#t", "name": "t",
                "columns": [{"@id": "#t.a", "name": "a", "datatype": "int"}],
                "indexes": [{"@id": "#i", "name": "i", "columns": ["#t"]}]
            }]
        });
        assert!(matches!(
            Visitor::new(CheckBuilder).visit_schema(&doc),
            Err(FelisError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_revisit_starts_fresh() {
        let doc = json!({"@id": "#s", "name": "s", "tables": []});
        let mut visitor = Visitor::new(CheckBuilder);
        visitor.visit_schema(&doc).unwrap();
        visitor.visit_schema(&doc).unwrap();
        assert_eq!(visitor.graph().len(), 1);
        assert!(visitor.diagnostics().is_empty());
    }

    #[test]
    fn test_id_generation() {
        let doc = json!({
            "name": "s",
            "tables": [{
                "name": "t",
                "columns": [{"name": "a", "datatype": "int"}],
                "primaryKey": "#t.a"
            }]
        });
        assert!(matches!(
            validate_document(&doc, &ValidationConfig::default()),
            Err(FelisError::MissingField { .. })
        ));

        let options = ValidationConfig {
            id_generation: true,
            ..Default::default()
        };
        let mut visitor = Visitor::with_options(CheckBuilder, options);
        visitor.visit_schema(&doc).unwrap();
        assert!(visitor.graph().column("#t.a").is_some());
    }

    #[test]
    fn test_null_version_is_absent() {
        let doc = json!({"@id": "#s", "name": "s", "version": null, "tables": []});
        let built = SchemaGraph::build(&doc).unwrap();
        assert_eq!(built.schema.version, None);

        let doc = json!({"@id": "#s", "name": "s", "version": "1.0.0", "tables": []});
        let built = SchemaGraph::build(&doc).unwrap();
        assert_eq!(built.schema.version.map(|v| v.current), Some("1.0.0".to_string()));
    }
}
