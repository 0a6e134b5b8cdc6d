//! Felis
//!
//! Validation and construction core for Felis schema documents: YAML/JSON
//! descriptions of relational schemas (tables, columns, keys, indexes) with
//! astronomy-specific annotations.
//!
//! ## Features
//!
//! - **Type Registry**: The 13 Felis datatypes and their classifications
//! - **Validation**: Structural and semantic checks per object kind
//! - **Traversal**: One visitor drives any [`visitor::SchemaBuilder`]
//! - **ID Map**: Every `@id` resolves to the object it names
//! - **Type Mapping**: SQL dialect and VOTable renditions of each datatype
//!
//! ## Architecture
//!
//! ```text
//! document (serde_json::Value)
//!     │
//!     ▼
//! Visitor ──► FelisValidator ──► Diagnostics
//!     │
//!     ├──► SimpleBuilder   ──► model::Schema
//!     ├──► MetadataBuilder ──► metadata::MetaData
//!     ├──► TapBuilder      ──► tap::TapSchema
//!     └──► CheckBuilder    ──► ()
//! ```

pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod graph;
pub mod metadata;
pub mod model;
pub mod tap;
pub mod types;
pub mod validate;
pub mod visitor;

pub use backend::{BackendType, ColumnSpec, Dialect, MappedType, TypeMapper, VotableType};
pub use config::FelisConfig;
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use error::{FelisError, Result};
pub use graph::{ColumnRef, ObjectGraph, ObjectHandle};
pub use metadata::{build_metadata, MetaData, MetadataBuilder};
pub use model::{Schema, SchemaGraph, SimpleBuilder};
pub use tap::{build_tap, TapBuilder, TapSchema};
pub use types::FelisType;
pub use validate::FelisValidator;
pub use visitor::{validate_document, CheckBuilder, SchemaBuilder, Visitor};
