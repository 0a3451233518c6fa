//! Operating system detection from `os-release` metadata.
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::logging::Log;

/// Standard location of the release metadata file.
pub const OS_RELEASE: &str = "/etc/os-release";

/// Fallback location consulted when the standard file lacks an `ID`.
pub const OS_RELEASE_FALLBACK: &str = "/usr/lib/os-release";

/// Linux distribution family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OsFamily {
    /// Fedora.
    Fedora,
    /// Red Hat Enterprise Linux.
    Rhel,
    /// Arch Linux.
    Arch,
    /// Debian and Ubuntu.
    Debian,
    /// Anything not in the table.
    Unknown,
}

impl OsFamily {
    /// Map an `os-release` `ID` value to a family, case-insensitively.
    #[must_use]
    pub fn from_id(id: &str) -> Self {
        match id.to_ascii_lowercase().as_str() {
            "fedora" => Self::Fedora,
            "rhel" => Self::Rhel,
            "arch" => Self::Arch,
            "debian" | "ubuntu" => Self::Debian,
            _ => Self::Unknown,
        }
    }

    /// Native package manager binary for the family.
    #[must_use]
    pub const fn package_manager_name(self) -> Option<&'static str> {
        match self {
            Self::Fedora | Self::Rhel => Some("dnf"),
            Self::Arch => Some("pacman"),
            Self::Debian => Some("apt"),
            Self::Unknown => None,
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fedora => write!(f, "Fedora"),
            Self::Rhel => write!(f, "RHEL"),
            Self::Arch => write!(f, "Arch"),
            Self::Debian => write!(f, "Debian"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Detected OS identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsInfo {
    /// Distribution family.
    pub family: OsFamily,
    /// Raw `KEY=VALUE` pairs from the release file.
    pub release_fields: BTreeMap<String, String>,
}

impl OsInfo {
    /// Build from parsed release fields.
    #[must_use]
    pub fn from_fields(release_fields: BTreeMap<String, String>) -> Self {
        let family = release_fields
            .get("ID")
            .map_or(OsFamily::Unknown, |id| OsFamily::from_id(id));
        Self {
            family,
            release_fields,
        }
    }

    /// Identity used when nothing could be read.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            family: OsFamily::Unknown,
            release_fields: BTreeMap::new(),
        }
    }

    fn field(&self, key: &str) -> &str {
        self.release_fields.get(key).map_or("", String::as_str)
    }

    /// `NAME` field, or empty.
    #[must_use]
    pub fn name(&self) -> &str {
        self.field("NAME")
    }

    /// `VERSION` field, or empty.
    #[must_use]
    pub fn version(&self) -> &str {
        self.field("VERSION")
    }

    /// `PRETTY_NAME`, falling back to `NAME VERSION`.
    #[must_use]
    pub fn pretty_name(&self) -> String {
        let pretty = self.field("PRETTY_NAME");
        if !pretty.is_empty() {
            return pretty.to_string();
        }
        format!("{} {}", self.name(), self.version())
            .trim()
            .to_string()
    }

    /// Native package manager for the family.
    #[must_use]
    pub const fn package_manager_name(&self) -> Option<&'static str> {
        self.family.package_manager_name()
    }
}

/// Source of the host's OS identity.
#[cfg_attr(test, mockall::automock)]
pub trait OsDetector: Send + Sync {
    /// Detected identity. Never fails; unreadable metadata yields
    /// [`OsFamily::Unknown`].
    fn os_info(&self) -> OsInfo;
}

/// Reads `os-release` files, memoizing the result for the process lifetime.
pub struct LinuxOsDetector {
    primary: PathBuf,
    fallback: PathBuf,
    log: Arc<dyn Log>,
    cache: OnceLock<OsInfo>,
}

impl fmt::Debug for LinuxOsDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinuxOsDetector")
            .field("primary", &self.primary)
            .field("fallback", &self.fallback)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl LinuxOsDetector {
    /// Detector reading the standard locations.
    #[must_use]
    pub fn new(log: Arc<dyn Log>) -> Self {
        Self::with_paths(OS_RELEASE, OS_RELEASE_FALLBACK, log)
    }

    /// Detector reading custom locations.
    #[must_use]
    pub fn with_paths(
        primary: impl Into<PathBuf>,
        fallback: impl Into<PathBuf>,
        log: Arc<dyn Log>,
    ) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
            log,
            cache: OnceLock::new(),
        }
    }

    fn detect(&self) -> OsInfo {
        let mut fields = BTreeMap::new();
        self.read_into(&self.primary, &mut fields);
        if !fields.contains_key("ID") {
            self.read_into(&self.fallback, &mut fields);
        }
        let info = OsInfo::from_fields(fields);
        self.log.debug(&format!(
            "detected OS family {} ({})",
            info.family,
            info.pretty_name()
        ));
        info
    }

    fn read_into(&self, path: &Path, fields: &mut BTreeMap<String, String>) {
        if !path.exists() {
            return;
        }
        match fs::read_to_string(path) {
            Ok(content) => parse_release(&content, fields),
            Err(e) => self.log.warn(&format!(
                "cannot read OS release file {}: {e}",
                path.display()
            )),
        }
    }
}

impl OsDetector for LinuxOsDetector {
    fn os_info(&self) -> OsInfo {
        self.cache.get_or_init(|| self.detect()).clone()
    }
}

/// Parse `os-release` content into `fields`, overwriting existing keys.
///
/// Blank lines, `#` comments and lines without `=` are skipped. One layer
/// of surrounding double quotes is stripped from values.
pub fn parse_release(content: &str, fields: &mut BTreeMap<String, String>) {
    for line in content.lines() {
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        fields.insert(key.trim().to_string(), value.to_string());
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::logging::test_helpers::RecordingLog;

    const FEDORA: &str = r#"NAME="Fedora Linux"
VERSION="40 (Workstation Edition)"
ID=fedora
# a comment
VERSION_ID=40

PRETTY_NAME="Fedora Linux 40 (Workstation Edition)"
"#;

    fn detector(primary: &std::path::Path, fallback: &std::path::Path) -> LinuxOsDetector {
        LinuxOsDetector::with_paths(primary, fallback, Arc::new(RecordingLog::default()))
    }

    #[test]
    fn parse_release_strips_quotes_and_comments() {
        let mut fields = BTreeMap::new();
        parse_release(FEDORA, &mut fields);
        assert_eq!(fields.get("NAME").unwrap(), "Fedora Linux");
        assert_eq!(fields.get("ID").unwrap(), "fedora");
        assert_eq!(fields.get("VERSION_ID").unwrap(), "40");
        assert_eq!(fields.len(), 5);
    }

    #[test]
    fn parse_release_splits_on_first_equals_only() {
        let mut fields = BTreeMap::new();
        parse_release("HOME_URL=\"https://x.org/?a=b\"\nGARBAGE\n", &mut fields);
        assert_eq!(fields.get("HOME_URL").unwrap(), "https://x.org/?a=b");
        assert!(!fields.contains_key("GARBAGE"));
    }

    #[test]
    fn parse_release_strips_only_one_quote_layer() {
        let mut fields = BTreeMap::new();
        parse_release("NAME=\"\"quoted\"\"", &mut fields);
        assert_eq!(fields.get("NAME").unwrap(), "\"quoted\"");
    }

    #[test]
    fn family_match_is_case_insensitive() {
        assert_eq!(OsFamily::from_id("Fedora"), OsFamily::Fedora);
        assert_eq!(OsFamily::from_id("RHEL"), OsFamily::Rhel);
        assert_eq!(OsFamily::from_id("ubuntu"), OsFamily::Debian);
        assert_eq!(OsFamily::from_id("fedora-asahi"), OsFamily::Unknown);
    }

    #[test]
    fn package_manager_per_family() {
        assert_eq!(OsFamily::Fedora.package_manager_name(), Some("dnf"));
        assert_eq!(OsFamily::Rhel.package_manager_name(), Some("dnf"));
        assert_eq!(OsFamily::Arch.package_manager_name(), Some("pacman"));
        assert_eq!(OsFamily::Unknown.package_manager_name(), None);
    }

    #[test]
    fn detects_fedora_from_primary() {
        let tmp = tempfile::tempdir().unwrap();
        let primary = tmp.path().join("os-release");
        fs::write(&primary, FEDORA).unwrap();
        let info = detector(&primary, &tmp.path().join("missing")).os_info();
        assert_eq!(info.family, OsFamily::Fedora);
        assert_eq!(info.name(), "Fedora Linux");
        assert_eq!(info.version(), "40 (Workstation Edition)");
        assert_eq!(info.pretty_name(), "Fedora Linux 40 (Workstation Edition)");
    }

    #[test]
    fn falls_back_when_id_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let primary = tmp.path().join("os-release");
        let fallback = tmp.path().join("lib-os-release");
        fs::write(&primary, "NAME=\"Custom\"\n").unwrap();
        fs::write(&fallback, "ID=rhel\nVERSION=\"9.4\"\n").unwrap();
        let info = detector(&primary, &fallback).os_info();
        assert_eq!(info.family, OsFamily::Rhel);
        assert_eq!(info.name(), "Custom");
        assert_eq!(info.version(), "9.4");
    }

    #[test]
    fn missing_files_yield_unknown() {
        let tmp = tempfile::tempdir().unwrap();
        let info = detector(&tmp.path().join("a"), &tmp.path().join("b")).os_info();
        assert_eq!(info, OsInfo::unknown());
        assert_eq!(info.pretty_name(), "");
    }

    #[test]
    fn unreadable_file_warns_and_degrades() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory exists but cannot be read as a file.
        let log = Arc::new(RecordingLog::default());
        let det = LinuxOsDetector::with_paths(tmp.path(), tmp.path().join("b"), log.clone());
        assert_eq!(det.os_info().family, OsFamily::Unknown);
        assert!(log.contains("cannot read OS release file"));
    }

    #[test]
    fn detection_is_memoized() {
        let tmp = tempfile::tempdir().unwrap();
        let primary = tmp.path().join("os-release");
        fs::write(&primary, FEDORA).unwrap();
        let det = detector(&primary, &tmp.path().join("missing"));
        assert_eq!(det.os_info().family, OsFamily::Fedora);
        fs::write(&primary, "ID=arch\n").unwrap();
        assert_eq!(det.os_info().family, OsFamily::Fedora);
    }
}
