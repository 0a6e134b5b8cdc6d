//! Datatype-to-backend-type mapping
//!
//! A column's Felis datatype, length, precision, and per-dialect override
//! strings resolve to one [`MappedType`]: a generic default plus per-dialect
//! variants. Rendering picks the variant for the requested dialect and falls
//! back to the generic type.
//!
//! ## Layering
//! 1. Generic type for the datatype (`int -> INTEGER`, `string -> VARCHAR(n)`)
//! 2. Static per-dialect defaults (`double -> DOUBLE PRECISION` on PostgreSQL)
//! 3. Document overrides (`"mysql:datatype": "TINYINT"`)

pub mod dialect;
pub mod votable;

pub use dialect::Dialect;
pub use votable::{tap_size, VotableType};

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::document::RawObject;
use crate::error::{FelisError, Result};
use crate::types::FelisType;

/// `TYPENAME` or `TYPENAME(p1, p2, ...)`; type names may contain spaces
const OVERRIDE_PATTERN: &str =
    r"^\s*([A-Za-z_][A-Za-z0-9_ ]*?)\s*(?:\(\s*(\d+(?:\s*,\s*\d+)*)\s*\))?\s*$";

// =============================================================================
// Backend Types
// =============================================================================

/// A concrete backend type, e.g. `VARCHAR(64)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendType {
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<u32>,
    /// Trailing qualifier such as `WITHOUT TIME ZONE`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl BackendType {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            suffix: None,
        }
    }

    pub fn with_params(name: impl Into<String>, params: impl IntoIterator<Item = u32>) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().collect(),
            suffix: None,
        }
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn render(&self) -> String {
        let mut out = self.name.clone();
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(u32::to_string).collect();
            out.push_str(&format!("({})", params.join(",")));
        }
        if let Some(suffix) = &self.suffix {
            out.push(' ');
            out.push_str(suffix);
        }
        out
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

/// One logical column type with per-dialect renderings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedType {
    pub datatype: FelisType,
    pub default: BackendType,
    pub variants: BTreeMap<Dialect, BackendType>,
}

impl MappedType {
    /// The backend type used for a dialect
    pub fn variant(&self, dialect: Dialect) -> &BackendType {
        self.variants.get(&dialect).unwrap_or(&self.default)
    }

    pub fn render(&self, dialect: Dialect) -> String {
        self.variant(dialect).render()
    }

    pub fn render_generic(&self) -> String {
        self.default.render()
    }
}

// =============================================================================
// Column Specs
// =============================================================================

/// The mapping-relevant parts of a column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Label used in errors
    pub id: String,
    pub datatype: FelisType,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    /// Raw `<dialect>:datatype` strings
    pub overrides: BTreeMap<Dialect, String>,
}

impl ColumnSpec {
    pub fn new(id: impl Into<String>, datatype: FelisType) -> Self {
        Self {
            id: id.into(),
            datatype,
            length: None,
            precision: None,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_override(mut self, dialect: Dialect, value: impl Into<String>) -> Self {
        self.overrides.insert(dialect, value.into());
        self
    }

    /// Collect a `ColumnSpec` from a validated column object
    pub fn from_raw(column: &RawObject<'_>, datatype: FelisType) -> Result<Self> {
        let mut spec = Self::new(column.label(), datatype);
        spec.length = column.positive_int_field("length")?;
        spec.precision = column
            .int_field("precision")?
            .map(|p| {
                u32::try_from(p).map_err(|_| {
                    FelisError::invalid_value(column.label(), "precision", "must be non-negative")
                })
            })
            .transpose()?;
        for dialect in Dialect::ALL {
            if let Some(value) = column.str_field(&dialect.override_key())? {
                spec.overrides.insert(dialect, value.to_string());
            }
        }
        Ok(spec)
    }
}

// =============================================================================
// Type Mapper
// =============================================================================

/// Maps column specs to backend types
pub struct TypeMapper {
    override_pattern: Regex,
}

impl Default for TypeMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeMapper {
    pub fn new() -> Self {
        Self {
            override_pattern: Regex::new(OVERRIDE_PATTERN).expect("override pattern is valid"),
        }
    }

    /// Map a column to its per-dialect backend types
    pub fn map_column(&self, spec: &ColumnSpec) -> Result<MappedType> {
        let mut variants = BTreeMap::new();
        for (dialect, raw) in &spec.overrides {
            variants.insert(*dialect, self.resolve_override(spec, *dialect, raw)?);
        }

        let default = generic_type(spec)?;

        for dialect in Dialect::ALL {
            if variants.contains_key(&dialect) {
                continue;
            }
            let variant = dialect.default_variant(spec.datatype, spec.length, spec.precision);
            if let Some(variant) = variant {
                variants.insert(dialect, variant);
            }
        }

        Ok(MappedType {
            datatype: spec.datatype,
            default,
            variants,
        })
    }

    /// Parse a `TYPENAME(p1,...)` override for one dialect
    pub fn parse_override(&self, dialect: Dialect, raw: &str, object: &str) -> Result<BackendType> {
        let unknown = || FelisError::UnknownBackendType {
            object: object.to_string(),
            dialect: dialect.name().to_string(),
            type_name: raw.to_string(),
        };

        let captures = self.override_pattern.captures(raw).ok_or_else(unknown)?;
        let name = captures
            .get(1)
            .map(|m| m.as_str().trim().to_ascii_uppercase())
            .ok_or_else(unknown)?;
        if !dialect.knows_type(&name) {
            return Err(unknown());
        }

        let params = match captures.get(2) {
            Some(m) => m
                .as_str()
                .split(',')
                .map(|p| p.trim().parse::<u32>().map_err(|_| unknown()))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(BackendType::with_params(name, params))
    }

    /// Parse an override and give a bare length-bearing type the column's length
    fn resolve_override(
        &self,
        spec: &ColumnSpec,
        dialect: Dialect,
        raw: &str,
    ) -> Result<BackendType> {
        let mut parsed = self.parse_override(dialect, raw, &spec.id)?;
        if parsed.params.is_empty() && takes_length_param(spec.datatype) {
            parsed.params.extend(spec.length);
        }
        Ok(parsed)
    }

    /// Whether a dialect override renders the same as that dialect's default
    pub fn is_redundant_override(&self, spec: &ColumnSpec, dialect: Dialect) -> Result<bool> {
        let Some(raw) = spec.overrides.get(&dialect) else {
            return Ok(false);
        };
        let resolved = self.resolve_override(spec, dialect, raw)?;

        let mut plain = spec.clone();
        plain.overrides.clear();
        let mapped = self.map_column(&plain)?;
        Ok(resolved.render() == mapped.variant(dialect).render())
    }
}

/// Sized types whose SQL rendition carries the length, e.g. `VARCHAR(n)`
fn takes_length_param(datatype: FelisType) -> bool {
    datatype.is_sized() && datatype != FelisType::Text
}

/// Dialect-neutral type for a column
fn generic_type(spec: &ColumnSpec) -> Result<BackendType> {
    use FelisType as F;

    let length = || {
        spec.length.ok_or_else(|| FelisError::MissingLength {
            object: spec.id.clone(),
            datatype: spec.datatype.name().to_string(),
        })
    };

    let backend = match spec.datatype {
        F::Boolean => BackendType::named("BOOLEAN"),
        F::Byte => BackendType::named("TINYINT"),
        F::Short => BackendType::named("SMALLINT"),
        F::Int => BackendType::named("INTEGER"),
        F::Long => BackendType::named("BIGINT"),
        F::Float => BackendType::named("FLOAT"),
        F::Double => BackendType::named("DOUBLE"),
        F::Char => BackendType::with_params("CHAR", [length()?]),
        F::String => BackendType::with_params("VARCHAR", [length()?]),
        F::Unicode => BackendType::with_params("NVARCHAR", [length()?]),
        F::Text => {
            length()?;
            BackendType::named("TEXT")
        }
        F::Binary => BackendType::with_params("BLOB", [length()?]),
        F::Timestamp => match spec.precision {
            Some(p) => BackendType::with_params("TIMESTAMP", [p]),
            None => BackendType::named("TIMESTAMP"),
        },
    };
    Ok(backend)
}
