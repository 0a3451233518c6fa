//! Environment variables exported to module scripts.
use std::path::Path;

use crate::config::Layout;
use crate::config::profiles::Profile;

/// Variables every module invocation receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleEnvironment {
    vars: Vec<(String, String)>,
}

impl ModuleEnvironment {
    /// Base environment: `CONF_DIR`, `LIB_DIR`, `DEBUG` and `HOST`.
    #[must_use]
    pub fn new(conf_dir: &Path, lib_dir: &Path, debug: bool, host: &str) -> Self {
        Self {
            vars: vec![
                ("CONF_DIR".to_string(), conf_dir.display().to_string()),
                ("LIB_DIR".to_string(), lib_dir.display().to_string()),
                (
                    "DEBUG".to_string(),
                    if debug { "yes" } else { "" }.to_string(),
                ),
                ("HOST".to_string(), host.to_string()),
            ],
        }
    }

    /// Base environment for `layout` on this host.
    #[must_use]
    pub fn for_layout(layout: &Layout, debug: bool) -> Self {
        Self::new(&layout.conf_dir, &layout.lib_dir, debug, &hostname())
    }

    /// Add `PROFILE_NAME` and `PROFILE_DESC` for the loaded profile.
    #[must_use]
    pub fn with_profile(mut self, profile: &Profile) -> Self {
        self.set("PROFILE_NAME", &profile.name);
        self.set("PROFILE_DESC", &profile.description);
        self
    }

    fn set(&mut self, key: &str, value: &str) {
        if let Some(entry) = self.vars.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value.to_string();
        } else {
            self.vars.push((key.to_string(), value.to_string()));
        }
    }

    /// Value of `key`, if set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All variables in insertion order.
    #[must_use]
    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }
}

/// Local host name.
#[must_use]
pub fn hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .ok()
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .or_else(|| std::env::var("HOSTNAME").ok().filter(|h| !h.is_empty()))
        .unwrap_or_else(|| "localhost".to_string())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base(debug: bool) -> ModuleEnvironment {
        ModuleEnvironment::new(Path::new("/repo/conf"), Path::new("/repo/lib"), debug, "box")
    }

    #[test]
    fn base_variables() {
        let env = base(false);
        assert_eq!(env.get("CONF_DIR"), Some("/repo/conf"));
        assert_eq!(env.get("LIB_DIR"), Some("/repo/lib"));
        assert_eq!(env.get("DEBUG"), Some(""));
        assert_eq!(env.get("HOST"), Some("box"));
        assert_eq!(env.get("PROFILE_NAME"), None);
    }

    #[test]
    fn debug_flag_is_yes() {
        assert_eq!(base(true).get("DEBUG"), Some("yes"));
    }

    #[test]
    fn profile_variables_are_added_once() {
        let mut profile = Profile {
            name: "laptop".to_string(),
            description: "My laptop".to_string(),
            ..Profile::default()
        };
        let env = base(false).with_profile(&profile);
        profile.name = "desk".to_string();
        let env = env.with_profile(&profile);
        assert_eq!(env.get("PROFILE_NAME"), Some("desk"));
        assert_eq!(env.get("PROFILE_DESC"), Some("My laptop"));
        assert_eq!(env.vars().len(), 6);
    }

    #[test]
    fn hostname_is_never_empty() {
        assert!(!hostname().is_empty());
    }
}
