//! Package and repository backends, selected by OS family.
//!
//! | Family          | Packages | Repositories |
//! |-----------------|----------|--------------|
//! | Fedora, RHEL    | dnf      | Fedora       |
//! | Arch, Debian    | not implemented            |
//! | unknown         | not supported              |
pub mod dnf;
pub mod fedora;

use std::sync::Arc;
use std::time::Duration;

use crate::config::profiles::RepositoryDescriptor;
use crate::error::{PlatformError, RepositoryError};
use crate::exec::Executor;
use crate::logging::Log;
use crate::platform::{OsDetector, OsFamily};

pub use dnf::DnfPackageBackend;
pub use fedora::FedoraRepositoryBackend;

/// Installs packages with the platform's package manager.
pub trait PackageBackend {
    /// Install every package in `names` with one package manager call.
    ///
    /// Empty input succeeds without running anything. A failed install is
    /// logged and reported as `false`.
    fn install_packages(&self, names: &[String]) -> bool;
}

/// Enables package repository sources.
pub trait RepositoryBackend {
    /// Enable `repo`, returning whether the underlying commands succeeded.
    ///
    /// # Errors
    ///
    /// [`RepositoryError`] when the descriptor cannot be handled on this
    /// platform at all.
    fn enable_repository(&self, repo: &RepositoryDescriptor) -> Result<bool, RepositoryError>;
}

/// Maps the detected OS family to concrete backends.
pub struct BackendSelector {
    detector: Arc<dyn OsDetector>,
    executor: Arc<dyn Executor>,
    log: Arc<dyn Log>,
    timeout: Duration,
}

impl std::fmt::Debug for BackendSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSelector")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl BackendSelector {
    /// Selector whose backends run commands through `executor`.
    #[must_use]
    pub fn new(
        detector: Arc<dyn OsDetector>,
        executor: Arc<dyn Executor>,
        log: Arc<dyn Log>,
        timeout: Duration,
    ) -> Self {
        Self {
            detector,
            executor,
            log,
            timeout,
        }
    }

    /// Package backend for the detected family.
    ///
    /// # Errors
    ///
    /// [`PlatformError::NotImplemented`] for recognized families without a
    /// backend, [`PlatformError::Unsupported`] for unknown hosts.
    pub fn package_backend(&self) -> Result<Box<dyn PackageBackend>, PlatformError> {
        const OPERATION: &str = "package management";
        match self.detector.os_info().family {
            OsFamily::Fedora | OsFamily::Rhel => Ok(Box::new(DnfPackageBackend::new(
                Arc::clone(&self.executor),
                Arc::clone(&self.log),
                self.timeout,
            ))),
            family @ (OsFamily::Arch | OsFamily::Debian) => Err(not_implemented(OPERATION, family)),
            family @ OsFamily::Unknown => Err(unsupported(OPERATION, family)),
        }
    }

    /// Repository backend for the detected family.
    ///
    /// # Errors
    ///
    /// Same conditions as [`package_backend`](Self::package_backend).
    pub fn repository_backend(&self) -> Result<Box<dyn RepositoryBackend>, PlatformError> {
        const OPERATION: &str = "repository management";
        match self.detector.os_info().family {
            OsFamily::Fedora | OsFamily::Rhel => Ok(Box::new(FedoraRepositoryBackend::new(
                Arc::clone(&self.executor),
                Arc::clone(&self.log),
                self.timeout,
            ))),
            family @ (OsFamily::Arch | OsFamily::Debian) => Err(not_implemented(OPERATION, family)),
            family @ OsFamily::Unknown => Err(unsupported(OPERATION, family)),
        }
    }
}

fn not_implemented(operation: &str, family: OsFamily) -> PlatformError {
    PlatformError::NotImplemented {
        operation: operation.to_string(),
        family: family.to_string(),
    }
}

fn unsupported(operation: &str, family: OsFamily) -> PlatformError {
    PlatformError::Unsupported {
        operation: operation.to_string(),
        family: family.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::exec::test_helpers::FakeExecutor;
    use crate::logging::test_helpers::RecordingLog;
    use crate::platform::{MockOsDetector, OsInfo};
    use std::collections::BTreeMap;

    fn selector(family_id: &str) -> BackendSelector {
        let mut fields = BTreeMap::new();
        if !family_id.is_empty() {
            fields.insert("ID".to_string(), family_id.to_string());
        }
        let info = OsInfo::from_fields(fields);
        let mut detector = MockOsDetector::new();
        detector.expect_os_info().returning(move || info.clone());
        BackendSelector::new(
            Arc::new(detector),
            Arc::new(FakeExecutor::new()),
            Arc::new(RecordingLog::default()),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn fedora_and_rhel_get_backends() {
        for id in ["fedora", "rhel"] {
            let s = selector(id);
            assert!(s.package_backend().is_ok(), "{id} package backend");
            assert!(s.repository_backend().is_ok(), "{id} repository backend");
        }
    }

    #[test]
    fn recognized_families_are_not_implemented() {
        for id in ["arch", "debian", "ubuntu"] {
            let err = selector(id).package_backend().err().unwrap();
            assert!(
                matches!(err, PlatformError::NotImplemented { .. }),
                "{id}: {err}"
            );
            let err = selector(id).repository_backend().err().unwrap();
            assert!(matches!(err, PlatformError::NotImplemented { .. }));
        }
    }

    #[test]
    fn unknown_family_is_unsupported() {
        let err = selector("").package_backend().err().unwrap();
        assert_eq!(
            err.to_string(),
            "package management is not supported on this platform (unknown)"
        );
        let err = selector("gentoo").repository_backend().err().unwrap();
        assert!(matches!(err, PlatformError::Unsupported { .. }));
    }
}
