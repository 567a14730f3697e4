//! Service configuration
//!
//! Loaded from an optional TOML file. Every section has defaults matching the
//! production deployment, so an absent file yields a working configuration.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Base directory for relative layer file paths
    pub data_dir: PathBuf,
    pub layers: Vec<LayerConfig>,
    /// Only enabled in a config file when the section is present
    #[serde(default)]
    pub site_details: Option<SiteDetailsConfig>,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory served under `/static`
    pub static_dir: PathBuf,
}

/// Oracle connection settings (credentials come from the environment)
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub service_name: String,
    /// Schema used to qualify table names
    pub schema: Option<String>,
}

/// One servable dataset
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerConfig {
    pub name: String,
    pub source: LayerSource,
    /// EPSG code of the source data when the file does not declare one
    pub source_epsg: Option<u32>,
    /// Proj string for source data in a system without a built-in EPSG code
    pub source_proj: Option<String>,
    /// Properties holding dates, rendered as `%Y-%m-%d`
    #[serde(default)]
    pub date_columns: Vec<String>,
}

/// Where a layer's features come from
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LayerSource {
    /// A GeoJSON file, relative to `data_dir` unless absolute
    File { path: PathBuf },
    /// A database table; point geometry is built from the coordinate columns
    Table {
        table: String,
        x_column: Option<String>,
        y_column: Option<String>,
    },
}

/// The chained lookup behind `/site_details`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteDetailsConfig {
    /// Response key for the site row itself
    #[serde(default = "default_site_record_name")]
    pub name: String,
    pub table: String,
    pub key_column: String,
    #[serde(default)]
    pub joins: Vec<JoinConfig>,
    #[serde(default)]
    pub projections: Vec<ProjectionConfig>,
}

/// A follow-up lookup keyed on a column of an earlier record
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinConfig {
    pub name: String,
    pub table: String,
    pub key_column: String,
    /// Name of the earlier record supplying the key
    pub from: String,
    pub from_column: String,
}

/// A subset of columns copied out of an earlier record
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectionConfig {
    pub name: String,
    pub from: String,
    pub columns: Vec<String>,
}

fn default_site_record_name() -> String {
    "site_info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "ora-geoslrn-kb1live.is.ed.ac.uk".to_string(),
            port: 1842,
            service_name: "GLRNLIVE_PRMY.is.ed.ac.uk".to_string(),
            schema: Some("s1511340".to_string()),
        }
    }
}

impl DatabaseConfig {
    /// Easy Connect string: `host:port/service_name`
    pub fn connect_string(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.service_name)
    }

    /// Table name qualified with the configured schema
    pub fn qualify(&self, table: &str) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{table}"),
            None => table.to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            data_dir: PathBuf::from("data"),
            layers: default_layers(),
            site_details: Some(SiteDetailsConfig::default()),
        }
    }
}

fn default_layers() -> Vec<LayerConfig> {
    let table = |table: &str, xy: bool| LayerSource::Table {
        table: table.to_string(),
        x_column: xy.then(|| "X".to_string()),
        y_column: xy.then(|| "Y".to_string()),
    };

    vec![
        LayerConfig {
            name: "buffers".to_string(),
            source: LayerSource::File {
                path: PathBuf::from("Buffers.geojson"),
            },
            source_epsg: None,
            source_proj: None,
            date_columns: ["CREATED", "UPDATED", "DESIGNATED", "AMENDED"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
        },
        LayerConfig {
            name: "spaces".to_string(),
            source: LayerSource::File {
                path: PathBuf::from("Open_Spaces.geojson"),
            },
            source_epsg: None,
            source_proj: None,
            date_columns: Vec::new(),
        },
        LayerConfig {
            name: "sites".to_string(),
            source: table("SITES", true),
            source_epsg: Some(27700),
            source_proj: None,
            date_columns: vec!["DESIGNATED".to_string()],
        },
        LayerConfig {
            name: "ccs".to_string(),
            source: table("COMMUNITY_CENTRES", true),
            source_epsg: Some(27700),
            source_proj: None,
            date_columns: Vec::new(),
        },
        LayerConfig {
            name: "proximity".to_string(),
            source: table("SITE_PROXIMITY", false),
            source_epsg: None,
            source_proj: None,
            date_columns: Vec::new(),
        },
    ]
}

impl Default for SiteDetailsConfig {
    fn default() -> Self {
        let join = |name: &str, table: &str, key: &str, from: &str, from_column: &str| JoinConfig {
            name: name.to_string(),
            table: table.to_string(),
            key_column: key.to_string(),
            from: from.to_string(),
            from_column: from_column.to_string(),
        };

        Self {
            name: default_site_record_name(),
            table: "SITES".to_string(),
            key_column: "DES_REF".to_string(),
            joins: vec![
                join("site_catchment", "SITE_CATCHMENTS", "DES_REF", "site_info", "DES_REF"),
                join("open_spaces", "OPEN_SPACES", "OS_ID", "site_info", "CLOSEST_OS_ID"),
                join(
                    "community_centres",
                    "COMMUNITY_CENTRES",
                    "CENTRE_ID",
                    "site_catchment",
                    "CLOSEST_CC_ID",
                ),
            ],
            projections: vec![ProjectionConfig {
                name: "simd_score".to_string(),
                from: "site_catchment".to_string(),
                columns: ["COMP_SIMD", "AVG_INCOME", "AVG_EMPLOY", "AVG_HEALTH", "AVG_ACCESS"]
                    .iter()
                    .map(|c| c.to_string())
                    .collect(),
            }],
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration text without validating it
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// True when any layer or the site details lookup reads from the database
    pub fn uses_database(&self) -> bool {
        self.site_details.is_some()
            || self
                .layers
                .iter()
                .any(|layer| matches!(layer.source, LayerSource::Table { .. }))
    }

    /// Resolve a layer file path against `data_dir`
    pub fn resolve_data_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    /// Check names and identifiers before anything touches files or the database
    pub fn validate(&self) -> Result<()> {
        if let Some(schema) = &self.database.schema {
            check_identifier(schema, "database schema")?;
        }

        let mut seen = HashSet::new();
        for layer in &self.layers {
            if layer.name.trim().is_empty() {
                return Err(Error::Config("layer name must not be empty".into()));
            }
            if layer.name.contains('/') {
                return Err(Error::Config(format!(
                    "layer name '{}' must not contain '/'",
                    layer.name
                )));
            }
            match (&layer.source_proj, layer.source_epsg) {
                (Some(_), Some(_)) => {
                    return Err(Error::Config(format!(
                        "layer '{}' sets both source_epsg and source_proj",
                        layer.name
                    )))
                }
                (Some(definition), None) if !definition.contains("+proj=") => {
                    return Err(Error::Config(format!(
                        "layer '{}' source_proj is not a proj string",
                        layer.name
                    )))
                }
                _ => {}
            }
            if !seen.insert(layer.name.as_str()) {
                return Err(Error::Config(format!("duplicate layer '{}'", layer.name)));
            }
            if let LayerSource::Table {
                table,
                x_column,
                y_column,
            } = &layer.source
            {
                check_identifier(table, "table")?;
                match (x_column, y_column) {
                    (Some(x), Some(y)) => {
                        check_identifier(x, "column")?;
                        check_identifier(y, "column")?;
                    }
                    (None, None) => {}
                    _ => {
                        return Err(Error::Config(format!(
                            "layer '{}' needs both x_column and y_column, or neither",
                            layer.name
                        )))
                    }
                }
            }
        }

        if let Some(details) = &self.site_details {
            details.validate()?;
        }

        Ok(())
    }
}

impl SiteDetailsConfig {
    fn validate(&self) -> Result<()> {
        check_identifier(&self.table, "table")?;
        check_identifier(&self.key_column, "column")?;

        let mut known = vec![self.name.as_str()];
        for join in &self.joins {
            check_identifier(&join.table, "table")?;
            check_identifier(&join.key_column, "column")?;
            if !known.contains(&join.from.as_str()) {
                return Err(Error::Config(format!(
                    "join '{}' reads from '{}', which is not fetched before it",
                    join.name, join.from
                )));
            }
            if known.contains(&join.name.as_str()) {
                return Err(Error::Config(format!("duplicate record name '{}'", join.name)));
            }
            known.push(&join.name);
        }

        for projection in &self.projections {
            if !known.contains(&projection.from.as_str()) {
                return Err(Error::Config(format!(
                    "projection '{}' reads from unknown record '{}'",
                    projection.name, projection.from
                )));
            }
            if known.contains(&projection.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate record name '{}'",
                    projection.name
                )));
            }
            known.push(&projection.name);
        }

        Ok(())
    }
}

/// Identifiers are spliced into SQL text, so only plain Oracle names pass
fn check_identifier(name: &str, what: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '#'))
        && name.chars().next().is_some_and(|c| c.is_ascii_alphabetic());

    if valid {
        Ok(())
    } else {
        Err(Error::Config(format!("invalid {what} name '{name}'")))
    }
}
