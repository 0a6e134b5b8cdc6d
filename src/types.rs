//! Felis datatype registry
//!
//! The thirteen Felis datatypes form a closed set. Their static properties
//! live in a single table indexed by the enum discriminant, so lookups never
//! allocate and the registry is shared freely between threads.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{FelisError, Result};

/// A Felis column datatype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FelisType {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    Unicode,
    Text,
    Binary,
    Timestamp,
}

/// Static properties of a datatype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Datatype {
    /// Felis name as written in documents
    pub name: &'static str,
    /// VOTable datatype name used for TAP metadata
    pub votable_name: &'static str,
    pub is_numeric: bool,
    /// Accepts (and for SQL mapping requires) a `length`
    pub is_sized: bool,
    pub is_timestamp: bool,
}

const fn numeric(name: &'static str, votable_name: &'static str) -> Datatype {
    Datatype {
        name,
        votable_name,
        is_numeric: true,
        is_sized: false,
        is_timestamp: false,
    }
}

const fn sized(name: &'static str, votable_name: &'static str) -> Datatype {
    Datatype {
        name,
        votable_name,
        is_numeric: false,
        is_sized: true,
        is_timestamp: false,
    }
}

// Order must match the `FelisType` declaration order.
static DATATYPES: [Datatype; 13] = [
    Datatype {
        name: "boolean",
        votable_name: "boolean",
        is_numeric: false,
        is_sized: false,
        is_timestamp: false,
    },
    numeric("byte", "unsignedByte"),
    numeric("short", "short"),
    numeric("int", "int"),
    numeric("long", "long"),
    numeric("float", "float"),
    numeric("double", "double"),
    sized("char", "char"),
    sized("string", "char"),
    sized("unicode", "unicodeChar"),
    sized("text", "char"),
    sized("binary", "unsignedByte"),
    Datatype {
        name: "timestamp",
        votable_name: "char",
        is_numeric: false,
        is_sized: false,
        is_timestamp: true,
    },
];

impl FelisType {
    /// Every datatype, in registry order
    pub const ALL: [FelisType; 13] = [
        Self::Boolean,
        Self::Byte,
        Self::Short,
        Self::Int,
        Self::Long,
        Self::Float,
        Self::Double,
        Self::Char,
        Self::String,
        Self::Unicode,
        Self::Text,
        Self::Binary,
        Self::Timestamp,
    ];

    /// Iterate over every registered datatype
    pub fn all() -> impl Iterator<Item = FelisType> {
        Self::ALL.into_iter()
    }

    /// Resolve a datatype by its Felis name
    pub fn lookup(name: &str) -> Result<Self> {
        Self::all()
            .find(|t| t.name() == name)
            .ok_or_else(|| FelisError::UnknownType(name.to_string()))
    }

    pub fn properties(&self) -> &'static Datatype {
        &DATATYPES[*self as usize]
    }

    pub fn name(&self) -> &'static str {
        self.properties().name
    }

    pub fn votable_name(&self) -> &'static str {
        self.properties().votable_name
    }

    pub fn is_numeric(&self) -> bool {
        self.properties().is_numeric
    }

    pub fn is_sized(&self) -> bool {
        self.properties().is_sized
    }

    pub fn is_timestamp(&self) -> bool {
        self.properties().is_timestamp
    }

    /// Integer-valued numeric types (byte, short, int, long)
    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Byte | Self::Short | Self::Int | Self::Long)
    }

    /// Types whose values are strings in documents
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::Char | Self::String | Self::Unicode | Self::Text | Self::Timestamp
        )
    }
}

impl FromStr for FelisType {
    type Err = FelisError;

    fn from_str(s: &str) -> Result<Self> {
        Self::lookup(s)
    }
}

impl fmt::Display for FelisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
