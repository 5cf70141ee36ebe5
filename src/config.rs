//! Adapter configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! module_name = "auth"
//! debug_logs = true
//!
//! [indexes]
//! user = ["email"]
//! session = ["userId", ["userId", "token"]]
//! ```

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{GelError, GelResult};

/// File name looked up in the working directory.
pub const CONFIG_FILE: &str = "gel-auth.toml";

/// An index request: one field or a composite group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexSpec {
    Single(String),
    Composite(Vec<String>),
}

/// Options recognised by the adapter.
///
/// `module_name` has no default; every generated type and query lives in
/// the module it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    pub module_name: String,
    /// Emit each composed statement through `tracing`.
    #[serde(default)]
    pub debug_logs: bool,
    /// Pluralize generated type names.
    #[serde(default)]
    pub use_plural: bool,
    /// Per-model index requests.
    #[serde(default)]
    pub indexes: IndexMap<String, Vec<IndexSpec>>,
    /// Reject malformed identity values instead of substituting the nil UUID.
    #[serde(default)]
    pub strict_ids: bool,
    /// Default output path for generated schema files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<PathBuf>,
}

impl AdapterConfig {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            debug_logs: false,
            use_plural: false,
            indexes: IndexMap::new(),
            strict_ids: false,
            schema_path: None,
        }
    }

    pub fn debug_logs(mut self, enabled: bool) -> Self {
        self.debug_logs = enabled;
        self
    }

    pub fn use_plural(mut self, enabled: bool) -> Self {
        self.use_plural = enabled;
        self
    }

    pub fn strict_ids(mut self, enabled: bool) -> Self {
        self.strict_ids = enabled;
        self
    }

    pub fn index(mut self, model: impl Into<String>, index: IndexSpec) -> Self {
        self.indexes.entry(model.into()).or_default().push(index);
        self
    }

    /// Index requests for one model.
    pub fn indexes_for(&self, model: &str) -> &[IndexSpec] {
        self.indexes.get(model).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Path the generated schema is written to when the caller gives none.
    pub fn default_schema_path(&self) -> PathBuf {
        self.schema_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("dbschema/{}.gel", self.module_name)))
    }

    pub fn from_toml_str(input: &str) -> GelResult<Self> {
        let config: Self = toml::from_str(input).map_err(|e| GelError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> GelResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| GelError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Find a config file: `./gel-auth.toml`, then `<config dir>/gel-auth/config.toml`.
    pub fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        let global = dirs::config_dir()?.join("gel-auth").join("config.toml");
        global.is_file().then_some(global)
    }

    fn validate(&self) -> GelResult<()> {
        let valid = !self.module_name.is_empty()
            && self
                .module_name
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_');
        if !valid {
            return Err(GelError::Config(format!(
                "invalid module_name '{}'",
                self.module_name
            )));
        }
        Ok(())
    }
}
