//! Configuration module for emplace-sense.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`.emplace-sense/settings.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `ES_` and use double underscores
//! to separate nested levels:
//! - `ES_QUERY__CHECK_ACCESS=false` sets `query.check_access`
//! - `ES_QUERY__SPAN_POLICY=legacy_search` sets `query.span_policy`
//! - `ES_LOGGING__DEFAULT=debug` sets `logging.default`

use crate::emplace::{IdentityPolicy, ResolverOptions};
use crate::parsing::DEFAULT_FLAGS;
use crate::signature::SpanPolicy;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Directory holding the settings file, searched upwards from the cwd.
pub const CONFIG_DIR: &str = ".emplace-sense";
pub const CONFIG_FILE: &str = "settings.toml";
const ENV_PREFIX: &str = "ES_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Global debug mode
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub parser: ParserConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Level for every target without an override
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-target levels, e.g. `emplace_sense::parsing = "debug"`
    #[serde(default)]
    pub modules: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct QueryConfig {
    /// Only offer public constructors
    #[serde(default = "default_true")]
    pub check_access: bool,

    /// How `value_type` is matched to a template parameter
    #[serde(default)]
    pub identity: IdentityPolicy,

    /// How parameter ranges inside signature labels are computed
    #[serde(default)]
    pub span_policy: SpanPolicy,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ParserConfig {
    /// Compiler flags passed to the front end
    #[serde(default = "default_flags")]
    pub flags: Vec<String>,

    /// File extensions treated as C++ sources
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_flags() -> Vec<String> {
    DEFAULT_FLAGS.iter().map(|f| f.to_string()).collect()
}
fn default_extensions() -> Vec<String> {
    ["cpp", "cc", "cxx", "hpp", "hh", "hxx", "h"]
        .iter()
        .map(|e| e.to_string())
        .collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            debug: false,
            logging: LoggingConfig::default(),
            query: QueryConfig::default(),
            parser: ParserConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: BTreeMap::new(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            check_access: true,
            identity: IdentityPolicy::default(),
            span_policy: SpanPolicy::default(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            flags: default_flags(),
            extensions: default_extensions(),
        }
    }
}

impl QueryConfig {
    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            check_access: self.check_access,
            identity: self.identity,
        }
    }
}

impl ParserConfig {
    /// Whether `path` has one of the configured C++ extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honouring `ES_`
    /// environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels, single underscore
            // stays part of the field name
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for the config directory from the
    /// current directory up to the root
    pub fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(CONFIG_FILE))
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file under `root`
    pub fn init_config_file(root: impl AsRef<Path>, force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.as_ref().join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        Settings::default().save(&config_path)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.logging.default, "warn");
        assert!(settings.query.check_access);
        assert_eq!(settings.query.identity, IdentityPolicy::TypeIdentity);
        assert_eq!(settings.query.span_policy, SpanPolicy::Tracked);
        assert!(settings.parser.flags.contains(&"-std=c++17".to_string()));
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
version = 2

[logging]
default = "info"

[logging.modules]
"emplace_sense::parsing" = "trace"

[query]
identity = "declaration_identity"
span_policy = "legacy_search"

[parser]
flags = ["-std=c++20", "-Iinclude"]
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.version, 2);
        assert_eq!(settings.logging.default, "info");
        assert_eq!(settings.logging.modules["emplace_sense::parsing"], "trace");
        assert_eq!(settings.query.identity, IdentityPolicy::DeclarationIdentity);
        assert_eq!(settings.query.span_policy, SpanPolicy::LegacySearch);
        assert_eq!(settings.parser.flags, vec!["-std=c++20", "-Iinclude"]);
        // Unspecified values keep their defaults
        assert!(settings.query.check_access);
        assert!(!settings.parser.extensions.is_empty());
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.query.check_access = false;
        settings.logging.modules.insert("walker".to_string(), "debug".to_string());

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "[query]\nspan_policy = \"tracked\"\n").unwrap();

        unsafe {
            std::env::set_var("ES_QUERY__SPAN_POLICY", "legacy_search");
        }
        let settings = Settings::load_from(&config_path);
        unsafe {
            std::env::remove_var("ES_QUERY__SPAN_POLICY");
        }

        assert_eq!(settings.unwrap().query.span_policy, SpanPolicy::LegacySearch);
    }

    #[test]
    fn test_init_config_file() {
        let temp_dir = TempDir::new().unwrap();

        let path = Settings::init_config_file(temp_dir.path(), false).unwrap();
        assert_eq!(path, temp_dir.path().join(".emplace-sense/settings.toml"));
        assert!(path.exists());

        assert!(Settings::init_config_file(temp_dir.path(), false).is_err());
        assert!(Settings::init_config_file(temp_dir.path(), true).is_ok());
    }

    #[test]
    fn test_extension_filter() {
        let parser = ParserConfig::default();
        assert!(parser.accepts(Path::new("src/widget.cpp")));
        assert!(parser.accepts(Path::new("include/widget.HPP")));
        assert!(!parser.accepts(Path::new("build.rs")));
        assert!(!parser.accepts(Path::new("Makefile")));
    }

    #[test]
    fn test_resolver_options_from_query() {
        let query = QueryConfig {
            check_access: false,
            identity: IdentityPolicy::DeclarationIdentity,
            span_policy: SpanPolicy::Tracked,
        };
        assert_eq!(query.resolver_options(), ResolverOptions::lenient());
    }
}
