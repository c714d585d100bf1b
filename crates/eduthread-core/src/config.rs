//! View thresholds shared by the scroll controller and the history trigger.

use serde::Deserialize;

use crate::error::{CoreError, Result};

/// Row thresholds for the message list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ViewConfig {
    /// Rows from the top under which an older page is requested.
    #[serde(default = "ViewConfig::default_load_older_threshold")]
    pub load_older_threshold: usize,

    /// Rows from the bottom that still count as "at the bottom".
    #[serde(default = "ViewConfig::default_stick_to_bottom_distance")]
    pub stick_to_bottom_distance: usize,
}

impl ViewConfig {
    const fn default_load_older_threshold() -> usize {
        2
    }

    const fn default_stick_to_bottom_distance() -> usize {
        3
    }

    /// Check the thresholds are usable.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` if `load_older_threshold` is zero,
    /// which would never trigger a backward fetch.
    pub fn validate(&self) -> Result<()> {
        if self.load_older_threshold == 0 {
            return Err(CoreError::InvalidConfig(
                "load_older_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            load_older_threshold: Self::default_load_older_threshold(),
            stick_to_bottom_distance: Self::default_stick_to_bottom_distance(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ViewConfig::default();
        assert_eq!(config.load_older_threshold, 2);
        assert_eq!(config.stick_to_bottom_distance, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_fields_use_defaults() {
        let config: ViewConfig = serde_json::from_str(r#"{"stick_to_bottom_distance":1}"#).unwrap();
        assert_eq!(config.load_older_threshold, 2);
        assert_eq!(config.stick_to_bottom_distance, 1);
    }

    #[test]
    fn zero_threshold_is_invalid() {
        let config = ViewConfig {
            load_older_threshold: 0,
            ..ViewConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
