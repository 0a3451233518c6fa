//! Profile documents: loading, inheritance merge and legacy conversion.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;
use crate::logging::Log;

/// File extensions tried, in order, when locating a profile document.
pub const PROFILE_EXTENSIONS: &[&str] = &["toml", "yaml", "yml"];

/// A named, inheritable provisioning profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    /// Display name.
    pub name: String,
    /// Free-form description, exported to modules as `PROFILE_DESC`.
    pub description: String,
    /// Name of the parent profile in the same directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherit: Option<String>,
    /// Module selection.
    pub modules: ModuleConfig,
    /// Package and repository selection.
    pub packages: PackageConfig,
}

/// `modules` section of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModuleConfig {
    /// Requested module identifiers in declaration order.
    pub enabled: Vec<String>,
}

/// `packages` section of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PackageConfig {
    /// Packages to install.
    pub install: Vec<String>,
    /// Legacy copr shorthand; see [`convert_legacy`].
    pub copr: Vec<String>,
    /// Repository sources to enable before installing.
    pub repositories: Vec<RepositoryDescriptor>,
}

/// A package repository source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryDescriptor {
    /// Repository name (for copr, `owner/project`).
    pub name: String,
    /// Type tag such as `copr` or `rpm`, matched case-insensitively.
    #[serde(rename = "type")]
    pub kind: String,
    /// Repository definition URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Signing key location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Additional backend-specific settings.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl RepositoryDescriptor {
    /// A copr repository.
    #[must_use]
    pub fn copr(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: "copr".to_string(),
            url: None,
            key: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Whether the type tag equals `kind`, ignoring case.
    #[must_use]
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind.eq_ignore_ascii_case(kind)
    }

    /// `type/name`, used for step names.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}/{}", self.kind, self.name)
    }
}

/// Merge `child` over `parent`.
///
/// Scalars come from the child; every list is parent entries followed by
/// child entries, duplicates kept.
#[must_use]
pub fn merge(parent: Profile, child: Profile) -> Profile {
    fn concat<T>(mut first: Vec<T>, second: Vec<T>) -> Vec<T> {
        first.extend(second);
        first
    }

    Profile {
        name: child.name,
        description: child.description,
        inherit: child.inherit,
        modules: ModuleConfig {
            enabled: concat(parent.modules.enabled, child.modules.enabled),
        },
        packages: PackageConfig {
            install: concat(parent.packages.install, child.packages.install),
            copr: concat(parent.packages.copr, child.packages.copr),
            repositories: concat(parent.packages.repositories, child.packages.repositories),
        },
    }
}

/// Add a `copr` repository descriptor for every `packages.copr` entry that
/// lacks one. Idempotent.
#[must_use]
pub fn convert_legacy(mut profile: Profile) -> Profile {
    for name in &profile.packages.copr {
        let present = profile
            .packages
            .repositories
            .iter()
            .any(|r| r.is_kind("copr") && r.name == *name);
        if !present {
            profile
                .packages
                .repositories
                .push(RepositoryDescriptor::copr(name));
        }
    }
    profile
}

/// Loads profiles from a directory and resolves their inheritance chains.
pub struct ProfileResolver {
    profiles_dir: PathBuf,
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for ProfileResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileResolver")
            .field("profiles_dir", &self.profiles_dir)
            .finish_non_exhaustive()
    }
}

impl ProfileResolver {
    /// Resolver over `profiles_dir`.
    #[must_use]
    pub fn new(profiles_dir: impl Into<PathBuf>, log: Arc<dyn Log>) -> Self {
        Self {
            profiles_dir: profiles_dir.into(),
            log,
        }
    }

    /// Load `name`, follow its `inherit` chain, merge and normalize it.
    ///
    /// # Errors
    ///
    /// [`ProfileError::NotFound`] if `name` has no document,
    /// [`ProfileError::ParentNotFound`] if an ancestor is missing,
    /// [`ProfileError::CircularInheritance`] if the chain loops, and
    /// parse or I/O errors for unreadable documents.
    pub fn load_profile(&self, name: &str) -> Result<Profile, ProfileError> {
        let mut chain = Vec::new();
        let merged = self.load_chain(name, None, &mut chain)?;
        let profile = convert_legacy(merged);

        if let Ok(json) = serde_json::to_string_pretty(&profile) {
            self.log.debug(&format!("effective profile:\n{json}"));
        }
        Ok(profile)
    }

    /// Names of every profile document in the directory, sorted.
    #[must_use]
    pub fn available(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.profiles_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| PROFILE_EXTENSIONS.contains(&e))
            })
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    fn load_chain(
        &self,
        name: &str,
        child: Option<&str>,
        chain: &mut Vec<String>,
    ) -> Result<Profile, ProfileError> {
        if chain.iter().any(|seen| seen == name) {
            chain.push(name.to_string());
            return Err(ProfileError::CircularInheritance(chain.join(" → ")));
        }

        let path = self.locate(name).ok_or_else(|| match child {
            None => ProfileError::NotFound(name.to_string()),
            Some(child) => ProfileError::ParentNotFound {
                parent: name.to_string(),
                child: child.to_string(),
            },
        })?;

        let mut profile = read_document(&path)?;
        if profile.name.is_empty() {
            profile.name = name.to_string();
        }
        chain.push(name.to_string());

        match profile.inherit.clone().filter(|p| !p.is_empty()) {
            None => Ok(profile),
            Some(parent) => {
                self.log
                    .info(&format!("Profile {} inherits from: {parent}", profile.name));
                let parent_profile = self.load_chain(&parent, Some(name), chain)?;
                Ok(merge(parent_profile, profile))
            }
        }
    }

    fn locate(&self, name: &str) -> Option<PathBuf> {
        if name.is_empty() || name.contains(['/', '\\']) {
            return None;
        }
        PROFILE_EXTENSIONS
            .iter()
            .map(|ext| self.profiles_dir.join(format!("{name}.{ext}")))
            .find(|p| p.is_file())
    }
}

/// Deserialize one profile document, picking the format by extension.
fn read_document(path: &Path) -> Result<Profile, ProfileError> {
    let content = fs::read_to_string(path).map_err(|source| ProfileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let parse_error = |message: String| ProfileError::Parse {
        path: path.display().to_string(),
        message,
    };
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => {
            if content.trim().is_empty() {
                return Ok(Profile::default());
            }
            serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))
        }
        _ => toml::from_str(&content).map_err(|e| parse_error(e.to_string())),
    }
}
