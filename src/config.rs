//! Configuration management for hyperschema
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (hyperschema.toml)
//! - Environment variables (HYPERSCHEMA__*)
//!
//! ## Example config file (hyperschema.toml):
//! ```toml
//! [build]
//! versioned = true
//!
//! [codegen]
//! runtime_path = "hyperschema::runtime"
//! header = "Wire types for the storage layer"
//!
//! [output]
//! json_file = "schema.json"
//! code_file = "src/schema.rs"
//! format = "pretty"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Schema build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Code generation settings
    #[serde(default)]
    pub codegen: CodegenConfig,

    /// Output file settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Schema build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Whether changes advance the schema version. When false the version
    /// stays at 1.
    #[serde(default = "default_true")]
    pub versioned: bool,
}

/// Code generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodegenConfig {
    /// Path generated modules import the runtime from
    #[serde(default = "default_runtime_path")]
    pub runtime_path: String,

    /// Extra line for the generated module's doc comment
    #[serde(default)]
    pub header: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Snapshot file
    #[serde(default = "default_json_file")]
    pub json_file: PathBuf,

    /// Generated code file
    #[serde(default = "default_code_file")]
    pub code_file: PathBuf,

    /// Snapshot JSON format
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

impl OutputFormat {
    pub fn is_pretty(self) -> bool {
        self == OutputFormat::Pretty
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_runtime_path() -> String {
    "hyperschema::runtime".to_string()
}

fn default_json_file() -> PathBuf {
    PathBuf::from("schema.json")
}

fn default_code_file() -> PathBuf {
    PathBuf::from("schema.rs")
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { versioned: true }
    }
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            runtime_path: default_runtime_path(),
            header: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_file: default_json_file(),
            code_file: default_code_file(),
            format: OutputFormat::Pretty,
        }
    }
}

impl SchemaConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "hyperschema.toml",
            ".hyperschema.toml",
            "config/hyperschema.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "hyperschema", "hyperschema") {
            let xdg_config = config_dir.config_dir().join("hyperschema.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        // HYPERSCHEMA__BUILD__VERSIONED=false and friends
        builder = builder.add_source(
            Environment::with_prefix("HYPERSCHEMA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchemaConfig::default();
        assert!(config.build.versioned);
        assert_eq!(config.codegen.runtime_path, "hyperschema::runtime");
        assert_eq!(config.output.json_file, PathBuf::from("schema.json"));
        assert!(config.output.format.is_pretty());
    }

    #[test]
    fn test_serialize_config() {
        let config = SchemaConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[build]"));
        assert!(toml_str.contains("[codegen]"));
        assert!(toml_str.contains("[output]"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");

        let mut config = SchemaConfig::default();
        config.build.versioned = false;
        config.codegen.runtime_path = "crate::runtime".to_string();
        config.output.format = OutputFormat::Compact;
        config.save(&path).unwrap();

        let loaded = SchemaConfig::load_from(Some(&path)).unwrap();
        assert!(!loaded.build.versioned);
        assert_eq!(loaded.codegen.runtime_path, "crate::runtime");
        assert_eq!(loaded.output.format, OutputFormat::Compact);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[codegen]\nheader = \"storage types\"\n").unwrap();

        let loaded = SchemaConfig::load_from(Some(&path)).unwrap();
        assert!(loaded.build.versioned);
        assert_eq!(loaded.codegen.header.as_deref(), Some("storage types"));
        assert_eq!(loaded.output.code_file, PathBuf::from("schema.rs"));
    }
}
