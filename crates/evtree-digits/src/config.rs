use evtree_core::ConfigError;
use serde::{Deserialize, Serialize};

/// Settings for the [`DigitManager`](crate::DigitManager).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigitConfig {
    /// Store regenerated digits as persistent entries of `~/digits` instead
    /// of temporaries.
    pub persistent_digits: bool,
}

impl DigitConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_temporary_digits() {
        assert!(!DigitConfig::default().persistent_digits);
        assert_eq!(DigitConfig::from_toml("").unwrap(), DigitConfig::default());
    }

    #[test]
    fn parse() {
        let config = DigitConfig::from_toml("persistent_digits = true").unwrap();
        assert!(config.persistent_digits);
        assert!(DigitConfig::from_toml("persistent_digits = 1").is_err());
    }
}
