//! Optional `conf/adytum.toml` settings.
use std::path::Path;
use std::time::Duration;

use anyhow::{Context as _, Result};
use serde::Deserialize;

use crate::exec::{DEFAULT_ELEVATION_HELPER, DEFAULT_TIMEOUT};

/// File name of the settings document inside `conf/`.
pub const SETTINGS_FILE: &str = "adytum.toml";

/// Tool settings. Every field has a default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Settings {
    /// Process execution settings.
    pub exec: ExecSettings,
    /// Directory names relative to `conf/`.
    pub paths: PathSettings,
}

/// `[exec]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ExecSettings {
    /// Per-command timeout in seconds.
    pub timeout_secs: u64,
    /// Elevation helper binary.
    pub elevate_with: String,
}

/// `[paths]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PathSettings {
    /// Profile documents directory.
    pub profiles: String,
    /// Module scripts directory.
    pub modules: String,
}

impl Default for ExecSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            elevate_with: DEFAULT_ELEVATION_HELPER.to_string(),
        }
    }
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            profiles: "profiles.d".to_string(),
            modules: "modules.d".to_string(),
        }
    }
}

impl Settings {
    /// Load `conf_dir/adytum.toml`, or defaults when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(conf_dir: &Path) -> Result<Self> {
        let path = conf_dir.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Configured command timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.exec.timeout_secs)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.timeout(), Duration::from_secs(18000));
        assert_eq!(settings.exec.elevate_with, "sudo");
        assert_eq!(settings.paths.modules, "modules.d");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(SETTINGS_FILE),
            "[exec]\nelevate_with = \"doas\"\n",
        )
        .unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.exec.elevate_with, "doas");
        assert_eq!(settings.exec.timeout_secs, 18000);
        assert_eq!(settings.paths.profiles, "profiles.d");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(SETTINGS_FILE),
            "[exec]\ntimeout = 5\n",
        )
        .unwrap();
        let err = Settings::load(tmp.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse TOML config"));
    }
}
