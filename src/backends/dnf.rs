//! dnf package installation for Fedora and RHEL.
use std::sync::Arc;
use std::time::Duration;

use super::PackageBackend;
use crate::exec::{ExecOptions, Executor, LogSink};
use crate::logging::Log;

/// Installs packages with `dnf install -y`.
pub struct DnfPackageBackend {
    executor: Arc<dyn Executor>,
    log: Arc<dyn Log>,
    timeout: Duration,
}

impl std::fmt::Debug for DnfPackageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnfPackageBackend")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl DnfPackageBackend {
    /// Backend running dnf through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, log: Arc<dyn Log>, timeout: Duration) -> Self {
        Self {
            executor,
            log,
            timeout,
        }
    }
}

impl PackageBackend for DnfPackageBackend {
    fn install_packages(&self, names: &[String]) -> bool {
        if names.is_empty() {
            self.log.info("No packages provided");
            return true;
        }

        self.log.info(&format!(
            "Installing the following packages: {}",
            names.join(" ")
        ));

        let mut args = vec!["install", "-y"];
        args.extend(names.iter().map(String::as_str));
        let opts = ExecOptions::default()
            .elevated()
            .with_timeout(self.timeout);
        let result = self
            .executor
            .execute("dnf", &args, &opts, &mut LogSink::new(&*self.log));

        if result.success {
            self.log.info("Successfully installed all packages");
        } else {
            self.log.warn(&format!(
                "dnf install failed ({}): {}",
                result.failure_reason(),
                result.stderr.trim()
            ));
        }
        result.success
    }
}
