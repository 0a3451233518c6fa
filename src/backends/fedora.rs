//! Repository sources on Fedora and RHEL: copr projects and `.repo` URLs.
use std::sync::Arc;
use std::time::Duration;

use super::RepositoryBackend;
use crate::config::profiles::RepositoryDescriptor;
use crate::error::RepositoryError;
use crate::exec::{ExecOptions, Executor};
use crate::logging::Log;

/// Enables `copr` and `rpm` repository descriptors.
pub struct FedoraRepositoryBackend {
    executor: Arc<dyn Executor>,
    log: Arc<dyn Log>,
    timeout: Duration,
}

impl std::fmt::Debug for FedoraRepositoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FedoraRepositoryBackend")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl FedoraRepositoryBackend {
    /// Backend running dnf and rpm through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, log: Arc<dyn Log>, timeout: Duration) -> Self {
        Self {
            executor,
            log,
            timeout,
        }
    }

    fn opts(&self) -> ExecOptions {
        ExecOptions::default()
            .elevated()
            .with_timeout(self.timeout)
    }

    fn enable_copr(&self, repo: &RepositoryDescriptor) -> bool {
        self.log
            .info(&format!("Enabling COPR repository: {}", repo.name));
        let result = self.executor.run(
            "dnf",
            &["copr", "enable", "-y", repo.name.as_str()],
            &self.opts(),
        );
        if !result.success {
            self.log.warn(&format!(
                "failed to enable COPR repository {} ({})",
                repo.name,
                result.failure_reason()
            ));
        }
        result.success
    }

    fn add_rpm_repository(&self, repo: &RepositoryDescriptor) -> Result<bool, RepositoryError> {
        let url = repo
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| RepositoryError::MissingField {
                name: repo.name.clone(),
                kind: repo.kind.clone(),
                field: "url",
            })?;

        if let Some(key) = repo.key.as_deref().filter(|k| !k.is_empty()) {
            let imported = self.executor.run("rpm", &["--import", key], &self.opts());
            if !imported.success {
                self.log.warn(&format!(
                    "failed to import signing key {key} for {} ({}); adding repository anyway",
                    repo.name,
                    imported.failure_reason()
                ));
            }
        }

        self.log
            .info(&format!("Adding repository {}: {url}", repo.name));
        let result = self.executor.run(
            "dnf",
            &["config-manager", "--add-repo", url],
            &self.opts(),
        );
        if !result.success {
            self.log.warn(&format!(
                "failed to add repository {} ({})",
                repo.name,
                result.failure_reason()
            ));
        }
        Ok(result.success)
    }
}

impl RepositoryBackend for FedoraRepositoryBackend {
    fn enable_repository(&self, repo: &RepositoryDescriptor) -> Result<bool, RepositoryError> {
        match repo.kind.to_ascii_lowercase().as_str() {
            "copr" => Ok(self.enable_copr(repo)),
            "rpm" => self.add_rpm_repository(repo),
            _ => Err(RepositoryError::UnsupportedType {
                kind: repo.kind.clone(),
                platform: "Fedora".to_string(),
            }),
        }
    }
}
