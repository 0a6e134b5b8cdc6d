//! Configuration management for Felis
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (felis.toml)
//! - Environment variables (FELIS__*)
//!
//! ## Example config file (felis.toml):
//! ```toml
//! [validation]
//! check_description = true
//! check_tap_principal = true
//! strict_ids = false
//!
//! [tap]
//! catalog_name = "dp02"
//! schema_index = 2
//!
//! [metadata]
//! apply_schema_to_tables = true
//!
//! [output]
//! format = "compact"
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FelisConfig {
    /// Validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// TAP_SCHEMA row settings
    #[serde(default)]
    pub tap: TapConfig,

    /// Relational metadata settings
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Validation configuration
///
/// Every check here is off by default; the baseline structural rules always
/// apply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Treat duplicate `@id` values as fatal instead of warning
    #[serde(default)]
    pub strict_ids: bool,

    /// Require a description of at least three characters on every object
    #[serde(default)]
    pub check_description: bool,

    /// Require at least one `tap:principal` column per table
    #[serde(default)]
    pub check_tap_principal: bool,

    /// Require unique `tap:table_index` values on every table
    #[serde(default)]
    pub check_tap_table_indexes: bool,

    /// Reject dialect overrides that render the same as the default type
    #[serde(default)]
    pub check_redundant_datatypes: bool,

    /// Generate `@id` values for objects that lack one
    #[serde(default)]
    pub id_generation: bool,
}

/// TAP_SCHEMA configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapConfig {
    /// Catalog prefix for schema and table names
    #[serde(default)]
    pub catalog_name: Option<String>,

    /// Override for the schema name taken from the document
    #[serde(default)]
    pub schema_name: Option<String>,

    /// Override for `tap:schema_index`
    #[serde(default)]
    pub schema_index: Option<i64>,

    /// Use `*` instead of `n*` for variable-length array sizes
    #[serde(default)]
    pub force_unbounded_arraysize: bool,
}

/// Relational metadata configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Override for the schema name taken from the document
    #[serde(default)]
    pub schema_name: Option<String>,

    /// Qualify tables with the schema name
    #[serde(default = "default_true")]
    pub apply_schema_to_tables: bool,

    /// Skip Unique, ForeignKey and Check constraints
    #[serde(default)]
    pub ignore_constraints: bool,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

fn default_true() -> bool {
    true
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            schema_name: None,
            apply_schema_to_tables: true,
            ignore_constraints: false,
        }
    }
}

impl FelisConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = ["felis.toml", ".felis.toml", "config/felis.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("org", "lsst", "felis") {
            let xdg_config = config_dir.config_dir().join("felis.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // FELIS__VALIDATION__STRICT_IDS=true and friends
        builder = builder.add_source(
            Environment::with_prefix("FELIS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
