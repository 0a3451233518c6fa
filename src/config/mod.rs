//! Repository layout, settings and profile documents.
pub mod profiles;
pub mod settings;

use std::path::{Path, PathBuf};

use anyhow::Result;

use settings::Settings;

/// Environment variable naming the repository root.
pub const ROOT_ENV: &str = "ADYTUM_ROOT";

/// Resolved on-disk layout of a provisioning repository.
///
/// ```text
/// <root>/
/// ├── conf/
/// │   ├── adytum.toml        (optional)
/// │   ├── profiles.d/<name>.toml
/// │   └── modules.d/<prio>-<name>.sh
/// └── lib/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Repository root.
    pub root: PathBuf,
    /// `conf/`, exported to modules as `CONF_DIR`.
    pub conf_dir: PathBuf,
    /// `lib/`, exported to modules as `LIB_DIR`.
    pub lib_dir: PathBuf,
    /// Directory holding profile documents.
    pub profiles_dir: PathBuf,
    /// Directory holding module scripts.
    pub modules_dir: PathBuf,
}

impl Layout {
    /// Derive the layout of `root` using directory names from `settings`.
    #[must_use]
    pub fn new(root: &Path, settings: &Settings) -> Self {
        let conf_dir = root.join("conf");
        Self {
            root: root.to_path_buf(),
            lib_dir: root.join("lib"),
            profiles_dir: conf_dir.join(&settings.paths.profiles),
            modules_dir: conf_dir.join(&settings.paths.modules),
            conf_dir,
        }
    }
}

/// Whether `dir` looks like a provisioning repository.
fn is_root(dir: &Path) -> bool {
    dir.join("conf").is_dir()
}

/// Locate the repository root.
///
/// Tries, in order: the explicit `--root`, `$ADYTUM_ROOT`, directories
/// around the running binary, then the current directory.
///
/// # Errors
///
/// Returns an error if no candidate contains a `conf/` directory.
pub fn resolve_root(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(root) = explicit {
        if !is_root(root) {
            anyhow::bail!("{} has no conf/ directory", root.display());
        }
        return Ok(dunce::canonicalize(root)?);
    }

    if let Ok(root) = std::env::var(ROOT_ENV) {
        let root = PathBuf::from(root);
        if is_root(&root) {
            return Ok(dunce::canonicalize(root)?);
        }
    }

    if let Ok(exe) = std::env::current_exe()
        && let Some(parent) = exe.parent()
    {
        let candidates = [
            parent.join("../.."), // target/release/ → repo root
            parent.join(".."),    // bin/ → repo root
        ];
        for candidate in &candidates {
            if is_root(candidate) {
                return Ok(dunce::canonicalize(candidate)?);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    if is_root(&cwd) {
        return Ok(cwd);
    }

    anyhow::bail!("cannot determine adytum root. Use --root or set {ROOT_ENV}");
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn explicit_root_is_canonicalized() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("conf")).unwrap();
        let resolved = resolve_root(Some(tmp.path())).unwrap();
        assert_eq!(resolved, dunce::canonicalize(tmp.path()).unwrap());
    }

    #[test]
    fn explicit_root_without_conf_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = resolve_root(Some(tmp.path())).unwrap_err();
        assert!(err.to_string().contains("has no conf/ directory"));
    }

    #[test]
    fn layout_uses_configured_directories() {
        let mut settings = Settings::default();
        settings.paths.modules = "mods".to_string();
        let layout = Layout::new(Path::new("/repo"), &settings);
        assert_eq!(layout.conf_dir, PathBuf::from("/repo/conf"));
        assert_eq!(layout.lib_dir, PathBuf::from("/repo/lib"));
        assert_eq!(layout.profiles_dir, PathBuf::from("/repo/conf/profiles.d"));
        assert_eq!(layout.modules_dir, PathBuf::from("/repo/conf/mods"));
    }
}
