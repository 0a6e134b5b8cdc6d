//! Object Validator
//!
//! One check per object kind. Each check either returns normally or fails
//! with a `FelisError` naming the object and the field at fault. Every check
//! that sees an `@id` registers it; a repeated `@id` is a warning (or a hard
//! error with `strict_ids`), never a silent overwrite.
//!
//! ## Checks
//! 1. **Structure**: required fields present and well-typed
//! 2. **Registry**: datatypes resolve, constraint kinds are known
//! 3. **Consistency**: mutually exclusive fields, unique names
//! 4. **Optional policy**: descriptions, TAP principal columns and table
//!    indexes, redundant dialect overrides

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

use crate::backend::{ColumnSpec, TypeMapper};
use crate::config::ValidationConfig;
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::document::{ConstraintKind, ObjectKind, RawObject};
use crate::error::{FelisError, Result};
use crate::types::FelisType;

/// Keys allowed in a schema version object
const VERSION_KEYS: [&str; 3] = ["current", "compatible", "read_compatible"];

const INITIALLY_VALUES: [&str; 2] = ["IMMEDIATE", "DEFERRED"];

const REFERENTIAL_ACTIONS: [&str; 5] =
    ["CASCADE", "SET NULL", "SET DEFAULT", "RESTRICT", "NO ACTION"];

const MIN_DESCRIPTION_LENGTH: usize = 3;

/// Validates document objects and tracks the IDs seen so far
pub struct FelisValidator {
    options: ValidationConfig,
    seen_ids: HashSet<String>,
    diagnostics: Diagnostics,
    mapper: TypeMapper,
}

impl Default for FelisValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl FelisValidator {
    pub fn new() -> Self {
        Self::with_options(ValidationConfig::default())
    }

    pub fn with_options(options: ValidationConfig) -> Self {
        Self {
            options,
            seen_ids: HashSet::new(),
            diagnostics: Diagnostics::new(),
            mapper: TypeMapper::new(),
        }
    }

    pub fn options(&self) -> &ValidationConfig {
        &self.options
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Move the collected diagnostics out, leaving an empty collection
    pub fn take_diagnostics(&mut self) -> Diagnostics {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.seen_ids.contains(id)
    }

    /// Forget seen IDs and diagnostics so another document can be checked
    pub fn reset(&mut self) {
        self.seen_ids.clear();
        self.diagnostics.clear();
    }

    fn register_id(&mut self, id: &str) -> Result<()> {
        if self.seen_ids.insert(id.to_string()) {
            return Ok(());
        }
        if self.options.strict_ids {
            return Err(FelisError::DuplicateId(id.to_string()));
        }
        let message = format!("Duplication of @id {}", id);
        warn!("{}", message);
        self.diagnostics.record(id, DiagnosticCode::DuplicateId, message);
        Ok(())
    }

    fn check_description(&self, object: &RawObject<'_>) -> Result<()> {
        let description = object.str_field("description")?;
        if !self.options.check_description {
            return Ok(());
        }
        match description {
            Some(d) if d.trim().chars().count() >= MIN_DESCRIPTION_LENGTH => Ok(()),
            Some(_) => Err(FelisError::invalid_value(
                object.label(),
                "description",
                format!("must be at least {} characters", MIN_DESCRIPTION_LENGTH),
            )),
            None => Err(FelisError::missing(object.label(), "description")),
        }
    }

    // =========================================================================
    // Schema
    // =========================================================================

    pub fn check_schema(&mut self, schema: &Value) -> Result<()> {
        let schema = RawObject::new(ObjectKind::Schema, schema)?;
        let id = schema.require_id()?;
        schema.require_name()?;
        let tables = schema.require_list("tables")?;
        self.check_description(&schema)?;

        check_unique_names(&schema, tables)?;
        if self.options.check_tap_table_indexes {
            check_tap_table_indexes(&schema, tables)?;
        }

        self.register_id(id)
    }

    /// A version is a bare string or `{current, compatible?, read_compatible?}`
    pub fn check_schema_version(&mut self, version: &Value) -> Result<()> {
        const LABEL: &str = "schema version";

        let map = match version {
            Value::String(_) => return Ok(()),
            Value::Object(map) => map,
            _ => return Err(FelisError::field_type(LABEL, "version", "string or object")),
        };

        match map.get("current") {
            Some(Value::String(_)) => {}
            Some(_) => return Err(FelisError::field_type(LABEL, "current", "string")),
            None => return Err(FelisError::missing(LABEL, "current")),
        }

        for key in ["compatible", "read_compatible"] {
            let Some(value) = map.get(key) else {
                continue;
            };
            let is_string_list = value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string));
            if !is_string_list {
                return Err(FelisError::field_type(LABEL, key, "list of strings"));
            }
        }

        for key in map.keys().filter(|k| !VERSION_KEYS.contains(&k.as_str())) {
            let message = format!("Ignoring unknown key '{}' in schema version", key);
            warn!("{}", message);
            self.diagnostics
                .record(LABEL, DiagnosticCode::UnknownVersionKey, message);
        }

        Ok(())
    }

    // =========================================================================
    // Tables
    // =========================================================================

    pub fn check_table(&mut self, table: &Value) -> Result<()> {
        let table = RawObject::new(ObjectKind::Table, table)?;
        let id = table.require_id()?;
        table.require_name()?;
        let columns = table.require_list("columns")?;
        table.list("constraints")?;
        table.list("indexes")?;
        table.int_field("tap:table_index")?;
        for key in ["mysql:engine", "mysql:charset", "votable:utype"] {
            table.str_field(key)?;
        }
        self.check_description(&table)?;

        let mut names = HashSet::new();
        for name in columns.iter().filter_map(|c| c.get("name").and_then(Value::as_str)) {
            if !names.insert(name) {
                return Err(FelisError::DuplicateName {
                    kind: "column".to_string(),
                    name: name.to_string(),
                    scope: table.label(),
                });
            }
        }

        if self.options.check_tap_principal {
            let has_principal = columns
                .iter()
                .any(|c| c.get("tap:principal").and_then(Value::as_i64) == Some(1));
            if !has_principal {
                return Err(FelisError::invalid_value(
                    table.label(),
                    "tap:principal",
                    "table has no principal column",
                ));
            }
        }

        self.register_id(id)
    }

    // =========================================================================
    // Columns
    // =========================================================================

    /// Check a column and return its resolved datatype
    pub fn check_column(&mut self, column: &Value, table: &RawObject<'_>) -> Result<FelisType> {
        let column = RawObject::new(ObjectKind::Column, column)?;
        let id = column.require_id()?;
        let name = column.require_name()?;
        let datatype = column.datatype()?;

        let length = column.positive_int_field("length")?;
        let takes_length = datatype.is_sized() || datatype.is_timestamp();
        match length {
            None if takes_length => {
                let message = format!(
                    "No length provided for {} column {} in table {}",
                    datatype,
                    name,
                    table.name().unwrap_or_default()
                );
                info!("{}", message);
                self.diagnostics.record(id, DiagnosticCode::MissingLength, message);
            }
            Some(length) if !takes_length => {
                let message =
                    format!("Length {} is ignored for {} column {}", length, datatype, name);
                warn!("{}", message);
                self.diagnostics.record(id, DiagnosticCode::IgnoredLength, message);
            }
            _ => {}
        }

        if let Some(precision) = column.int_field("precision")? {
            if !datatype.is_timestamp() {
                return Err(FelisError::invalid_value(
                    id,
                    "precision",
                    "only valid for timestamp columns",
                ));
            }
            if precision < 0 {
                return Err(FelisError::invalid_value(id, "precision", "must be non-negative"));
            }
        }

        column.bool_field("nullable")?;
        let autoincrement = column.autoincrement()?;
        if let Some(value) = column.get("value") {
            check_default_value(id, datatype, value)?;
            if autoincrement.is_enabled() {
                return Err(FelisError::conflicting(
                    id,
                    "a default value cannot be combined with autoincrement",
                ));
            }
        }

        for key in ["ivoa:unit", "fits:tunit", "ivoa:ucd", "votable:utype", "votable:xtype"] {
            column.str_field(key)?;
        }
        if column.contains("ivoa:unit") && column.contains("fits:tunit") {
            return Err(FelisError::conflicting(
                id,
                "only one of 'ivoa:unit' and 'fits:tunit' may be set",
            ));
        }
        for key in ["tap:principal", "tap:std"] {
            if let Some(flag) = column.int_field(key)? {
                if flag != 0 && flag != 1 {
                    return Err(FelisError::invalid_value(id, key, "must be 0 or 1"));
                }
            }
        }
        column.int_field("tap:column_index")?;
        self.check_description(&column)?;

        self.check_overrides(&column, datatype)?;
        self.register_id(id)?;
        Ok(datatype)
    }

    fn check_overrides(&self, column: &RawObject<'_>, datatype: FelisType) -> Result<()> {
        let spec = ColumnSpec::from_raw(column, datatype)?;
        for (dialect, raw) in &spec.overrides {
            self.mapper.parse_override(*dialect, raw, &spec.id)?;
        }

        let mappable = !datatype.is_sized() || spec.length.is_some();
        if !self.options.check_redundant_datatypes || !mappable {
            return Ok(());
        }
        for (dialect, raw) in &spec.overrides {
            if self.mapper.is_redundant_override(&spec, *dialect)? {
                return Err(FelisError::RedundantOverride {
                    object: spec.id.clone(),
                    dialect: dialect.name().to_string(),
                    value: raw.clone(),
                });
            }
        }
        Ok(())
    }

    // =========================================================================
    // Primary Keys, Constraints, Indexes
    // =========================================================================

    /// Normalize a primary key to a list of column IDs
    pub fn check_primary_key(
        &mut self,
        primary_key: &Value,
        table: &RawObject<'_>,
    ) -> Result<Vec<String>> {
        let invalid = || {
            FelisError::field_type(table.label(), "primaryKey", "string or list of strings")
        };
        match primary_key {
            Value::String(id) => Ok(vec![id.clone()]),
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
                .collect(),
            _ => Err(invalid()),
        }
    }

    /// Check a constraint and return its kind
    pub fn check_constraint(&mut self, constraint: &Value) -> Result<ConstraintKind> {
        let constraint = RawObject::new(ObjectKind::Constraint, constraint)?;
        let id = constraint.require_id()?;
        let kind_name = constraint.require_str("@type")?;
        let kind: ConstraintKind =
            kind_name
                .parse()
                .map_err(|_| FelisError::InvalidConstraintType {
                    object: id.to_string(),
                    kind: kind_name.to_string(),
                })?;
        constraint.str_field("name")?;
        self.check_description(&constraint)?;

        let deferrable = constraint.bool_field("deferrable")?.unwrap_or(false);
        if let Some(initially) = constraint.str_field("initially")? {
            if !deferrable {
                return Err(FelisError::conflicting(id, "'initially' requires 'deferrable'"));
            }
            if !INITIALLY_VALUES.contains(&initially) {
                return Err(FelisError::invalid_value(
                    id,
                    "initially",
                    format!("must be one of {}", INITIALLY_VALUES.join(", ")),
                ));
            }
        }

        match kind {
            ConstraintKind::Check => {
                let expression = constraint.require_str("expression")?;
                if expression.trim().is_empty() {
                    return Err(FelisError::invalid_value(id, "expression", "must not be empty"));
                }
            }
            ConstraintKind::Unique => {
                required_ids(&constraint, "columns")?;
            }
            ConstraintKind::ForeignKey => {
                let columns = required_ids(&constraint, "columns")?;
                let referenced = required_ids(&constraint, "referencedColumns")?;
                if columns != referenced {
                    return Err(FelisError::conflicting(
                        id,
                        format!(
                            "{} columns but {} referenced columns",
                            columns, referenced
                        ),
                    ));
                }
                for key in ["on_delete", "on_update"] {
                    if let Some(action) = constraint.str_field(key)? {
                        if !REFERENTIAL_ACTIONS.contains(&action) {
                            return Err(FelisError::invalid_value(
                                id,
                                key,
                                format!("must be one of {}", REFERENTIAL_ACTIONS.join(", ")),
                            ));
                        }
                    }
                }
            }
        }

        self.register_id(id)?;
        Ok(kind)
    }

    pub fn check_index(&mut self, index: &Value) -> Result<()> {
        let index = RawObject::new(ObjectKind::Index, index)?;
        let id = index.require_id()?;
        index.require_name()?;
        self.check_description(&index)?;

        let columns = index.id_list("columns")?.filter(|c| !c.is_empty());
        let expressions = index.string_list("expressions")?.filter(|e| !e.is_empty());
        match (columns, expressions) {
            (Some(_), Some(_)) => {
                return Err(FelisError::conflicting(
                    id,
                    "an index cannot define both columns and expressions",
                ))
            }
            (None, None) => {
                return Err(FelisError::conflicting(
                    id,
                    "an index must define either columns or expressions",
                ))
            }
            _ => {}
        }

        self.register_id(id)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Number of IDs in a required, non-empty ID list
fn required_ids(object: &RawObject<'_>, key: &str) -> Result<usize> {
    let ids = object
        .id_list(key)?
        .ok_or_else(|| FelisError::missing(object.label(), key))?;
    if ids.is_empty() {
        return Err(FelisError::invalid_value(object.label(), key, "must not be empty"));
    }
    Ok(ids.len())
}

fn check_default_value(id: &str, datatype: FelisType, value: &Value) -> Result<()> {
    let matches = match value {
        Value::Null => true,
        Value::Bool(_) => datatype == FelisType::Boolean,
        Value::Number(n) if datatype.is_integer() => n.is_i64() || n.is_u64(),
        Value::Number(_) => matches!(datatype, FelisType::Float | FelisType::Double),
        Value::String(s) if datatype.is_textual() => {
            if s.is_empty() {
                return Err(FelisError::invalid_value(
                    id,
                    "value",
                    "default string must not be empty",
                ));
            }
            true
        }
        _ => false,
    };
    if matches {
        Ok(())
    } else {
        Err(FelisError::invalid_value(
            id,
            "value",
            format!("default {} does not match datatype {}", value, datatype),
        ))
    }
}

/// Table, constraint, and index names must each be unique in a schema
fn check_unique_names(schema: &RawObject<'_>, tables: &[Value]) -> Result<()> {
    let name_of = |v: &Value| v.get("name").and_then(Value::as_str).map(str::to_string);
    let scope = schema.label();

    let mut seen: HashMap<&str, HashSet<String>> = HashMap::new();
    let mut insert = |kind: &'static str, name: String| -> Result<()> {
        if seen.entry(kind).or_default().insert(name.clone()) {
            Ok(())
        } else {
            Err(FelisError::DuplicateName {
                kind: kind.to_string(),
                name,
                scope: scope.clone(),
            })
        }
    };

    for table in tables {
        if let Some(name) = name_of(table) {
            insert("table", name)?;
        }
    }
    for table in tables {
        for (key, kind) in [("constraints", "constraint"), ("indexes", "index")] {
            let children = table.get(key).and_then(Value::as_array);
            for name in children.into_iter().flatten().filter_map(name_of) {
                insert(kind, name)?;
            }
        }
    }
    Ok(())
}

fn check_tap_table_indexes(schema: &RawObject<'_>, tables: &[Value]) -> Result<()> {
    let mut seen = HashSet::new();
    for table in tables {
        let table = RawObject::new(ObjectKind::Table, table)?;
        let index = table
            .int_field("tap:table_index")?
            .ok_or_else(|| FelisError::missing(table.label(), "tap:table_index"))?;
        if !seen.insert(index) {
            return Err(FelisError::invalid_value(
                schema.label(),
                "tap:table_index",
                format!("index {} is used by more than one table", index),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn table() -> Value {
        json!({"@id": "#t", "name": "t", "columns": []})
    }

    fn check_column(validator: &mut FelisValidator, column: Value) -> Result<FelisType> {
        let table = table();
        let table = RawObject::new(ObjectKind::Table, &table).unwrap();
        validator.check_column(&column, &table)
    }

    #[test]
    fn test_schema_requires_id() {
        let mut v = FelisValidator::new();
        match v.check_schema(&json!({"name": "s", "tables": []})) {
            Err(FelisError::MissingField { object, field }) => {
                assert_eq!(object, "schema 's'");
                assert_eq!(field, "@id");
            }
            other => panic!("Expected MissingField, got {:?}", other),
        }
        assert!(v.check_schema(&json!({"@id": "#s", "name": "s", "tables": []})).is_ok());
    }

    #[test]
    fn test_duplicate_table_names() {
        let mut v = FelisValidator::new();
        let schema = json!({"@id": "#s", "name": "s", "tables": [
            {"@id": "#a", "name": "t", "columns": []},
            {"@id": "#b", "name": "t", "columns": []}
        ]});
        match v.check_schema(&schema) {
            Err(FelisError::DuplicateName { kind, name, .. }) => {
                assert_eq!(kind, "table");
                assert_eq!(name, "t");
            }
            other => panic!("Expected DuplicateName, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_version_shapes() {
        let mut v = FelisValidator::new();
        assert!(v.check_schema_version(&json!("1.2.3")).is_ok());
        assert!(v
            .check_schema_version(&json!({"current": "v2", "compatible": ["v1"]}))
            .is_ok());

        assert!(matches!(
            v.check_schema_version(&json!({"compatible": ["v1"]})),
            Err(FelisError::MissingField { .. })
        ));
        assert!(matches!(
            v.check_schema_version(&json!({"current": 2})),
            Err(FelisError::InvalidFieldType { .. })
        ));
        assert!(matches!(
            v.check_schema_version(&json!({"current": "v2", "read_compatible": "v1"})),
            Err(FelisError::InvalidFieldType { .. })
        ));

        v.check_schema_version(&json!({"current": "v2", "extra": true})).unwrap();
        assert_eq!(v.diagnostics().with_code(DiagnosticCode::UnknownVersionKey).count(), 1);
    }

    #[test]
    fn test_column_datatype() {
        let mut v = FelisValidator::new();
        let t = check_column(&mut v, json!({"@id": "#c", "name": "c", "datatype": "long"})).unwrap();
        assert_eq!(t, FelisType::Long);

        match check_column(&mut v, json!({"@id": "#n", "name": "n", "datatype": "nibble"})) {
            Err(FelisError::InvalidType { object, datatype }) => {
                assert_eq!(object, "#n");
                assert_eq!(datatype, "nibble");
            }
            other => panic!("Expected InvalidType, got {:?}", other),
        }

        assert!(matches!(
            check_column(&mut v, json!({"@id": "#m", "name": "m"})),
            Err(FelisError::MissingField { .. })
        ));
    }

    #[test]
    fn test_missing_length_is_a_note() {
        let mut v = FelisValidator::new();
        check_column(&mut v, json!({"@id": "#s", "name": "s", "datatype": "string"})).unwrap();
        check_column(&mut v, json!({"@id": "#ts", "name": "ts", "datatype": "timestamp"})).unwrap();
        check_column(&mut v, json!({"@id": "#ok", "name": "ok", "datatype": "char", "length": 4})).unwrap();

        let notes: Vec<_> = v.diagnostics().notes().map(|d| d.object_id.as_str()).collect();
        assert_eq!(notes, vec!["#s", "#ts"]);
    }

    #[test]
    fn test_duplicate_id_warns_once() {
        let mut v = FelisValidator::new();
        check_column(&mut v, json!({"@id": "#c", "name": "c", "datatype": "int"})).unwrap();
        check_column(&mut v, json!({"@id": "#c", "name": "d", "datatype": "int"})).unwrap();

        let warnings: Vec<_> = v.diagnostics().warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "Duplication of @id #c");
    }

    #[test]
    fn test_duplicate_id_strict() {
        let mut v = FelisValidator::with_options(ValidationConfig {
            strict_ids: true,
            ..Default::default()
        });
        check_column(&mut v, json!({"@id": "#c", "name": "c", "datatype": "int"})).unwrap();
        match check_column(&mut v, json!({"@id": "#c", "name": "d", "datatype": "int"})) {
            Err(FelisError::DuplicateId(id)) => assert_eq!(id, "#c"),
            other => panic!("Expected DuplicateId, got {:?}", other),
        }
    }

    #[test]
    fn test_column_value_rules() {
        let mut v = FelisValidator::new();
        assert!(check_column(&mut v, json!({"@id": "#a", "name": "a", "datatype": "int", "value": 3})).is_ok());
        assert!(matches!(
            check_column(&mut v, json!({"@id": "#b", "name": "b", "datatype": "int", "value": 1.5})),
            Err(FelisError::InvalidValue { .. })
        ));
        assert!(matches!(
            check_column(&mut v, json!({"@id": "#c", "name": "c", "datatype": "string", "length": 8, "value": ""})),
            Err(FelisError::InvalidValue { .. })
        ));
        assert!(matches!(
            check_column(
                &mut v,
                json!({"@id": "#d", "name": "d", "datatype": "long", "value": 0, "autoincrement": true})
            ),
            Err(FelisError::ConflictingFields { .. })
        ));
        assert!(matches!(
            check_column(&mut v, json!({"@id": "#e", "name": "e", "datatype": "int", "precision": 3})),
            Err(FelisError::InvalidValue { .. })
        ));
        assert!(matches!(
            check_column(
                &mut v,
                json!({"@id": "#f", "name": "f", "datatype": "float", "ivoa:unit": "m", "fits:tunit": "m"})
            ),
            Err(FelisError::ConflictingFields { .. })
        ));
    }

    #[test]
    fn test_unknown_override_fails() {
        let mut v = FelisValidator::new();
        match check_column(
            &mut v,
            json!({"@id": "#c", "name": "c", "datatype": "int", "postgresql:datatype": "TINYINT"}),
        ) {
            Err(FelisError::UnknownBackendType { dialect, type_name, .. }) => {
                assert_eq!(dialect, "postgresql");
                assert_eq!(type_name, "TINYINT");
            }
            other => panic!("Expected UnknownBackendType, got {:?}", other),
        }
    }

    #[test]
    fn test_redundant_override_check() {
        let column = json!({"@id": "#c", "name": "c", "datatype": "double", "postgresql:datatype": "DOUBLE PRECISION"});
        let mut lenient = FelisValidator::new();
        assert!(check_column(&mut lenient, column.clone()).is_ok());

        let mut strict = FelisValidator::with_options(ValidationConfig {
            check_redundant_datatypes: true,
            ..Default::default()
        });
        assert!(matches!(
            check_column(&mut strict, column),
            Err(FelisError::RedundantOverride { .. })
        ));
    }

    #[test]
    fn test_constraint_kinds() {
        let mut v = FelisValidator::new();
        let kind = v
            .check_constraint(&json!({"@id": "#u", "@type": "Unique", "columns": ["#c"]}))
            .unwrap();
        assert_eq!(kind, ConstraintKind::Unique);

        match v.check_constraint(&json!({"@id": "#x", "@type": "Primary"})) {
            Err(FelisError::InvalidConstraintType { object, kind }) => {
                assert_eq!(object, "#x");
                assert_eq!(kind, "Primary");
            }
            other => panic!("Expected InvalidConstraintType, got {:?}", other),
        }

        assert!(matches!(
            v.check_constraint(&json!({"@id": "#k", "@type": "Check"})),
            Err(FelisError::MissingField { .. })
        ));
        assert!(matches!(
            v.check_constraint(&json!({
                "@id": "#fk", "@type": "ForeignKey",
                "columns": ["#a", "#b"], "referencedColumns": ["#c"]
            })),
            Err(FelisError::ConflictingFields { .. })
        ));
        assert!(matches!(
            v.check_constraint(&json!({
                "@id": "#d", "@type": "Unique", "columns": ["#c"], "initially": "DEFERRED"
            })),
            Err(FelisError::ConflictingFields { .. })
        ));
    }

    #[test]
    fn test_index_columns_xor_expressions() {
        let mut v = FelisValidator::new();
        assert!(v
            .check_index(&json!({"@id": "#i", "name": "i", "columns": ["#c"]}))
            .is_ok());
        assert!(v
            .check_index(&json!({"@id": "#j", "name": "j", "expressions": ["lower(c)"]}))
            .is_ok());
        for index in [
            json!({"@id": "#k", "name": "k", "columns": ["#c"], "expressions": ["c + 1"]}),
            json!({"@id": "#l", "name": "l"}),
        ] {
            assert!(matches!(
                v.check_index(&index),
                Err(FelisError::ConflictingFields { .. })
            ));
        }
    }

    #[test]
    fn test_optional_description_check() {
        let mut v = FelisValidator::with_options(ValidationConfig {
            check_description: true,
            ..Default::default()
        });
        assert!(matches!(
            v.check_table(&json!({"@id": "#t", "name": "t", "columns": []})),
            Err(FelisError::MissingField { .. })
        ));
        assert!(matches!(
            v.check_table(&json!({"@id": "#u", "name": "u", "description": "ab", "columns": []})),
            Err(FelisError::InvalidValue { .. })
        ));
        assert!(v
            .check_table(&json!({"@id": "#v", "name": "v", "description": "Visits", "columns": []}))
            .is_ok());
    }

    #[test]
    fn test_tap_table_indexes() {
        let mut v = FelisValidator::with_options(ValidationConfig {
            check_tap_table_indexes: true,
            ..Default::default()
        });
        let schema = json!({"@id": "#s", "name": "s", "tables": [
            {"@id": "#a", "name": "a", "columns": [], "tap:table_index": 1},
            {"@id": "#b", "name": "b", "columns": [], "tap:table_index": 1}
        ]});
        assert!(matches!(v.check_schema(&schema), Err(FelisError::InvalidValue { .. })));
    }

    #[test]
    fn test_tap_flags_are_zero_or_one() {
        let mut v = FelisValidator::new();
        for (key, name) in [("tap:principal", "principal"), ("tap:std", "std")] {
            let mut column = json!({"@id": format!("#t.{}", name), "name": name, "datatype": "int"});
            column[key] = json!(1);
            assert!(check_column(&mut v, column.clone()).is_ok());

            column["@id"] = json!(format!("#t.{}_bad", name));
            column[key] = json!(2);
            match check_column(&mut v, column) {
                Err(FelisError::InvalidValue { field, .. }) => assert_eq!(field, key),
                other => panic!("Expected InvalidValue, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_referential_actions() {
        let mut v = FelisValidator::new();
        let fk = |id: &str, key: &str, action: &str| {
            let mut constraint = json!({
                "@id": id, "@type": "ForeignKey",
                "columns": ["#a"], "referencedColumns": ["#b"]
            });
            constraint[key] = json!(action);
            constraint
        };

        assert!(v.check_constraint(&fk("#fk1", "on_delete", "CASCADE")).is_ok());
        assert!(v.check_constraint(&fk("#fk2", "on_update", "SET NULL")).is_ok());
        for key in ["on_delete", "on_update"] {
            match v.check_constraint(&fk("#fk3", key, "EXPLODE")) {
                Err(FelisError::InvalidValue { object, field, .. }) => {
                    assert_eq!(object, "#fk3");
                    assert_eq!(field, key);
                }
                other => panic!("Expected InvalidValue, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_initially_values() {
        let mut v = FelisValidator::new();
        let kind = v
            .check_constraint(&json!({
                "@id": "#d1", "@type": "Unique", "columns": ["#c"],
                "deferrable": true, "initially": "DEFERRED"
            }))
            .unwrap();
        assert_eq!(kind, ConstraintKind::Unique);

        match v.check_constraint(&json!({
            "@id": "#d2", "@type": "Unique", "columns": ["#c"],
            "deferrable": true, "initially": "LATER"
        })) {
            Err(FelisError::InvalidValue { object, field, .. }) => {
                assert_eq!(object, "#d2");
                assert_eq!(field, "initially");
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_tap_principal_check() {
        let mut v = FelisValidator::with_options(ValidationConfig {
            check_tap_principal: true,
            ..Default::default()
        });
        let without = json!({"@id": "#t", "name": "t", "columns": [
            {"@id": "#t.a", "name": "a", "datatype": "int", "tap:principal": 0}
        ]});
        match v.check_table(&without) {
            Err(FelisError::InvalidValue { object, field, .. }) => {
                assert_eq!(object, "#t");
                assert_eq!(field, "tap:principal");
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }

        let with = json!({"@id": "#u", "name": "u", "columns": [
            {"@id": "#u.a", "name": "a", "datatype": "int", "tap:principal": 1}
        ]});
        assert!(v.check_table(&with).is_ok());

        // off by default
        assert!(FelisValidator::new().check_table(&without).is_ok());
    }
}
