use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::registry;

/// Settings for handle diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Track every live handle core for leak diagnosis.
    pub handle_registry: bool,
    /// Log an error whenever one object has more handles than this.
    pub handle_count_warning: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            handle_registry: false,
            handle_count_warning: registry::DEFAULT_HANDLE_COUNT_WARNING,
        }
    }
}

impl CoreConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Apply the settings to the current thread.
    pub fn apply(&self) {
        registry::set_handle_count_warning(self.handle_count_warning);
        if self.handle_registry {
            registry::enable();
        } else {
            registry::disable();
        }
    }
}
