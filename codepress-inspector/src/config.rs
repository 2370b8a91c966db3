use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::component_map::DEFAULT_IMPORT_ALIAS;
use crate::error::ConfigError;
use crate::instrument::DEFAULT_IDENTIFIER_ATTR;

/// Looked up in the project root when no config path is given.
pub const CONFIG_FILE_NAME: &str = "codepress.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InspectorConfig {
    pub identifier_attribute: String,
    pub debounce_ms: u64,
    pub import_alias: String,
    /// Where the component map module is written, relative to the project root.
    pub component_map_path: Option<PathBuf>,
    /// Keep identifier attributes in files written back after an edit.
    pub persist_identifiers: bool,
    pub ignored_dirs: Vec<String>,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            identifier_attribute: DEFAULT_IDENTIFIER_ATTR.to_string(),
            debounce_ms: 150,
            import_alias: DEFAULT_IMPORT_ALIAS.to_string(),
            component_map_path: None,
            persist_identifiers: false,
            ignored_dirs: ["node_modules", ".git", ".next", "dist", "build"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl InspectorConfig {
    /// Loose key/value config as handed over by a host; unknown keys are ignored.
    pub fn from_map(config: HashMap<String, serde_json::Value>) -> Result<Self, ConfigError> {
        let object: serde_json::Map<String, serde_json::Value> = config.into_iter().collect();
        Ok(serde_json::from_value(serde_json::Value::Object(object))?)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// `codepress.json` in `root` when present, defaults otherwise.
    pub fn discover(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            tracing::debug!("using config {}", path.display());
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn component_map_path(&self, root: &Path) -> Option<PathBuf> {
        self.component_map_path.as_ref().map(|p| root.join(p))
    }
}
