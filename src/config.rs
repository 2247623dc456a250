use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Content reporting a natural height above `anomalous_height_threshold`
/// (typically a raw full-resolution image) is laid out at `fallback_height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GridSettings {
    pub card_width: f64,
    pub min_card_height: f64,
    pub gap: f64,
    pub default_columns: usize,
    pub anomalous_height_threshold: f64,
    pub fallback_height: f64,
    pub debounce_ms: u64,
    pub throttle_ms: u64,
    pub preload_buffer: f64,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            card_width: 240.0,
            min_card_height: 100.0,
            gap: 12.0,
            default_columns: 3,
            anomalous_height_threshold: 2000.0,
            fallback_height: 320.0,
            debounce_ms: 100,
            throttle_ms: 16,
            preload_buffer: 500.0,
        }
    }
}

impl GridSettings {
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "grid settings file not found, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> AppResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let parsed: Self = serde_yaml::from_str(raw)?;
        Ok(parsed.sanitized())
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let raw = serde_yaml::to_string(self)?;
        fs::write(path, raw)?;
        Ok(())
    }

    /// Replaces unusable values with their defaults. The fallback height is
    /// raised to the minimum card height when it sits below it.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let mut fixed = Vec::new();
        let positive = |value: f64, fallback: f64, name: &'static str, fixed: &mut Vec<&'static str>| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fixed.push(name);
                fallback
            }
        };

        let card_width = positive(self.card_width, defaults.card_width, "cardWidth", &mut fixed);
        let min_card_height = positive(self.min_card_height, defaults.min_card_height, "minCardHeight", &mut fixed);
        let mut fallback_height = positive(self.fallback_height, defaults.fallback_height, "fallbackHeight", &mut fixed);
        if fallback_height < min_card_height {
            fixed.push("fallbackHeight");
            fallback_height = min_card_height;
        }
        let mut anomalous_height_threshold = positive(
            self.anomalous_height_threshold,
            defaults.anomalous_height_threshold,
            "anomalousHeightThreshold",
            &mut fixed,
        );
        if anomalous_height_threshold < min_card_height {
            fixed.push("anomalousHeightThreshold");
            anomalous_height_threshold = min_card_height.max(defaults.anomalous_height_threshold);
        }

        let gap = if self.gap.is_finite() && self.gap >= 0.0 {
            self.gap
        } else {
            fixed.push("gap");
            defaults.gap
        };
        let preload_buffer = if self.preload_buffer.is_finite() && self.preload_buffer >= 0.0 {
            self.preload_buffer
        } else {
            fixed.push("preloadBuffer");
            defaults.preload_buffer
        };
        let default_columns = if self.default_columns == 0 {
            fixed.push("defaultColumns");
            defaults.default_columns
        } else {
            self.default_columns
        };

        if !fixed.is_empty() {
            tracing::warn!(fields = ?fixed, "grid settings contained unusable values, defaults applied");
        }

        Self {
            card_width,
            min_card_height,
            gap,
            default_columns,
            anomalous_height_threshold,
            fallback_height,
            debounce_ms: self.debounce_ms,
            throttle_ms: self.throttle_ms,
            preload_buffer,
        }
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::GridSettings;

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_fields() {
        let settings = GridSettings::from_yaml("cardWidth: 300\ngap: 8\n").expect("settings");
        assert_eq!(settings.card_width, 300.0);
        assert_eq!(settings.gap, 8.0);
        assert_eq!(settings.default_columns, 3);
        assert_eq!(settings.min_card_height, 100.0);
    }

    #[test]
    fn unusable_values_fall_back_to_defaults() {
        let settings = GridSettings::from_yaml("cardWidth: -5\ndefaultColumns: 0\ngap: -1\n").expect("settings");
        let defaults = GridSettings::default();
        assert_eq!(settings.card_width, defaults.card_width);
        assert_eq!(settings.default_columns, defaults.default_columns);
        assert_eq!(settings.gap, defaults.gap);
    }

    #[test]
    fn fallback_height_never_undercuts_the_minimum() {
        let settings = GridSettings::from_yaml("fallbackHeight: 50\nminCardHeight: 100\n").expect("settings");
        assert_eq!(settings.fallback_height, 100.0);
        assert_eq!(settings.min_card_height, 100.0);

        let untouched = GridSettings::from_yaml("fallbackHeight: 150\nminCardHeight: 100\n").expect("settings");
        assert_eq!(untouched.fallback_height, 150.0);
    }

    #[test]
    fn malformed_yaml_is_a_config_error() {
        let err = GridSettings::from_yaml("cardWidth: [oops").expect_err("should fail");
        assert!(err.to_string().starts_with("CONFIG_INVALID"));
    }

    #[test]
    fn load_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("grid.yaml");
        assert_eq!(GridSettings::load(&path).expect("missing file"), GridSettings::default());

        let custom = GridSettings {
            card_width: 200.0,
            debounce_ms: 40,
            ..GridSettings::default()
        };
        custom.save(&path).expect("save");
        assert_eq!(GridSettings::load(&path).expect("load"), custom);
    }
}
