use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_ACTION_ATTRIBUTE: &str = "data-dynamic-action";
pub const DEFAULT_FORM_ID_ATTRIBUTE: &str = "data-dynamic-form-id";
pub const DEFAULT_STYLE_ID_PREFIX: &str = "dynamic-style-";
pub const DEFAULT_MAX_ACTION_DEPTH: usize = 16;
pub const DEFAULT_DIAGNOSTICS_HISTORY: usize = crate::diagnostics::DEFAULT_HISTORY_LIMIT;

/// Class names written by the validity projection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClassNames {
    pub invalid: String,
    pub valid: String,
    pub disabled: String,
}

impl Default for ClassNames {
    fn default() -> Self {
        Self {
            invalid: "is-invalid".to_string(),
            valid: "is-valid".to_string(),
            disabled: "disabled".to_string(),
        }
    }
}

/// Tunables of the binding engine. Every field has a default, so a config
/// file only lists what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Attribute naming the action of a clickable element.
    pub action_attribute: String,
    /// Attribute on `<form>` elements naming the submitted form.
    pub form_id_attribute: String,
    pub style_id_prefix: String,
    /// How many ancestors the click router inspects before giving up.
    pub max_action_depth: usize,
    /// Give up waiting for rendered content after this long. `None` waits
    /// until the binding is disconnected.
    pub attach_timeout_ms: Option<u64>,
    pub classes: ClassNames,
    /// Diagnostics kept in the engine's history; older ones are discarded.
    pub diagnostics_history: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            action_attribute: DEFAULT_ACTION_ATTRIBUTE.to_string(),
            form_id_attribute: DEFAULT_FORM_ID_ATTRIBUTE.to_string(),
            style_id_prefix: DEFAULT_STYLE_ID_PREFIX.to_string(),
            max_action_depth: DEFAULT_MAX_ACTION_DEPTH,
            attach_timeout_ms: None,
            classes: ClassNames::default(),
            diagnostics_history: DEFAULT_DIAGNOSTICS_HISTORY,
        }
    }
}

impl EngineConfig {
    /// Reads a YAML config, falling back to defaults when no path is given or
    /// the file does not exist.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) if path.exists() => {
                let contents = fs::read_to_string(path)?;
                Ok(serde_yaml::from_str(&contents)?)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn attach_timeout(&self) -> Option<Duration> {
        self.attach_timeout_ms.map(Duration::from_millis)
    }
}
