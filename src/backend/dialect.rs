//! SQL dialects and their static type tables
//!
//! Which type names a dialect knows about, and what each Felis datatype
//! becomes on that dialect when no override is given. Nothing here touches
//! a live database.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::BackendType;
use crate::error::FelisError;
use crate::types::FelisType;

/// A SQL backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    MySql,
    PostgreSql,
    Sqlite,
    Oracle,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [Self::MySql, Self::PostgreSql, Self::Sqlite, Self::Oracle];

    /// Name used as the prefix of `<dialect>:datatype` overrides
    pub fn name(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::PostgreSql => "postgresql",
            Self::Sqlite => "sqlite",
            Self::Oracle => "oracle",
        }
    }

    /// Document key holding this dialect's datatype override
    pub fn override_key(&self) -> String {
        format!("{}:datatype", self.name())
    }

    /// Whether `type_name` is a type this dialect understands
    pub fn knows_type(&self, type_name: &str) -> bool {
        let upper = type_name.to_ascii_uppercase();
        self.type_names().iter().any(|known| *known == upper)
    }

    pub fn type_names(&self) -> &'static [&'static str] {
        match self {
            Self::MySql => MYSQL_TYPES,
            Self::PostgreSql => POSTGRESQL_TYPES,
            Self::Sqlite => SQLITE_TYPES,
            Self::Oracle => ORACLE_TYPES,
        }
    }

    /// Dialect-specific default for a datatype, when it differs from the
    /// generic mapping
    pub fn default_variant(
        &self,
        datatype: FelisType,
        length: Option<u32>,
        precision: Option<u32>,
    ) -> Option<BackendType> {
        use FelisType as F;

        match (self, datatype) {
            (Self::MySql, F::Text) => Some(BackendType::named("LONGTEXT")),
            (Self::MySql, F::Binary) => Some(BackendType::named("LONGBLOB")),
            (Self::MySql, F::Timestamp) => {
                precision.map(|p| BackendType::with_params("DATETIME", [p]))
            }

            (Self::PostgreSql, F::Byte) => Some(BackendType::named("SMALLINT")),
            (Self::PostgreSql, F::Double) => Some(BackendType::named("DOUBLE PRECISION")),
            (Self::PostgreSql, F::Unicode) => {
                length.map(|n| BackendType::with_params("VARCHAR", [n]))
            }
            (Self::PostgreSql, F::Binary) => Some(BackendType::named("BYTEA")),
            (Self::PostgreSql, F::Timestamp) => precision.map(|p| {
                BackendType::with_params("TIMESTAMP", [p]).with_suffix("WITHOUT TIME ZONE")
            }),

            (Self::Oracle, F::Boolean) => Some(BackendType::with_params("NUMBER", [1])),
            (Self::Oracle, F::Byte) => Some(BackendType::with_params("NUMBER", [3])),
            (Self::Oracle, F::Short) => Some(BackendType::with_params("NUMBER", [5])),
            (Self::Oracle, F::Long) => Some(BackendType::with_params("NUMBER", [38, 0])),
            (Self::Oracle, F::Float) => Some(BackendType::named("BINARY_FLOAT")),
            (Self::Oracle, F::Double) => Some(BackendType::named("BINARY_DOUBLE")),
            (Self::Oracle, F::String) => length.map(|n| BackendType::with_params("VARCHAR2", [n])),
            (Self::Oracle, F::Unicode) => {
                length.map(|n| BackendType::with_params("NVARCHAR2", [n]))
            }
            (Self::Oracle, F::Text) => Some(BackendType::named("CLOB")),
            (Self::Oracle, F::Binary) => Some(BackendType::named("BLOB")),

            _ => None,
        }
    }
}

impl FromStr for Dialect {
    type Err = FelisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(Self::MySql),
            "postgresql" | "postgres" => Ok(Self::PostgreSql),
            "sqlite" => Ok(Self::Sqlite),
            "oracle" => Ok(Self::Oracle),
            _ => Err(FelisError::UnknownDialect(s.to_string())),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

const MYSQL_TYPES: &[&str] = &[
    "BIGINT", "BINARY", "BIT", "BLOB", "BOOL", "BOOLEAN", "CHAR", "DATE", "DATETIME", "DECIMAL",
    "DOUBLE", "ENUM", "FLOAT", "INT", "INTEGER", "JSON", "LONGBLOB", "LONGTEXT", "MEDIUMBLOB",
    "MEDIUMINT", "MEDIUMTEXT", "NCHAR", "NUMERIC", "NVARCHAR", "REAL", "SET", "SMALLINT", "TEXT",
    "TIME", "TIMESTAMP", "TINYBLOB", "TINYINT", "TINYTEXT", "VARBINARY", "VARCHAR", "YEAR",
];

const POSTGRESQL_TYPES: &[&str] = &[
    "BIGINT", "BIT", "BOOLEAN", "BYTEA", "CHAR", "CIDR", "DATE", "DOUBLE PRECISION", "FLOAT",
    "INET", "INTEGER", "INTERVAL", "JSON", "JSONB", "MACADDR", "MONEY", "NUMERIC", "OID", "REAL",
    "SMALLINT", "TEXT", "TIME", "TIMESTAMP", "TSVECTOR", "UUID", "VARCHAR",
];

const SQLITE_TYPES: &[&str] = &[
    "BIGINT", "BLOB", "BOOLEAN", "CHAR", "DATE", "DATETIME", "DECIMAL", "DOUBLE", "FLOAT",
    "INTEGER", "NCHAR", "NUMERIC", "NVARCHAR", "REAL", "SMALLINT", "TEXT", "TIME", "TIMESTAMP",
    "TINYINT", "VARCHAR",
];

const ORACLE_TYPES: &[&str] = &[
    "BFILE", "BINARY_DOUBLE", "BINARY_FLOAT", "BLOB", "CHAR", "CLOB", "DATE", "FLOAT", "INTEGER",
    "INTERVAL", "LONG", "NCHAR", "NCLOB", "NUMBER", "NVARCHAR2", "RAW", "ROWID", "TIMESTAMP",
    "VARCHAR", "VARCHAR2",
];
