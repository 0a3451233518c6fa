//! Top-level provisioning sequence.
//!
//! detect OS → resolve profile → enable repositories → install packages →
//! run modules. Only profile resolution aborts the run; every later phase
//! logs and records its failures and hands over to the next phase.
use std::sync::Arc;

use crate::backends::BackendSelector;
use crate::config::profiles::{Profile, ProfileResolver, RepositoryDescriptor};
use crate::environment::ModuleEnvironment;
use crate::error::{PlatformError, ProfileError};
use crate::exec::Executor;
use crate::logging::{Log, StepStatus};
use crate::modules::ModuleScheduler;
use crate::platform::OsDetector;

/// What happened during a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupOutcome {
    /// Name of the effective profile.
    pub profile: String,
    /// Failed repositories, package batches and modules.
    pub failures: usize,
    /// Backend selection found the platform unsupported.
    pub platform_unsupported: bool,
}

/// Components the orchestrator drives.
pub struct Orchestrator {
    detector: Arc<dyn OsDetector>,
    resolver: ProfileResolver,
    selector: BackendSelector,
    scheduler: ModuleScheduler,
    environment: ModuleEnvironment,
    executor: Arc<dyn Executor>,
    elevate_with: String,
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("resolver", &self.resolver)
            .field("selector", &self.selector)
            .field("scheduler", &self.scheduler)
            .field("environment", &self.environment)
            .field("elevate_with", &self.elevate_with)
            .finish_non_exhaustive()
    }
}

/// Constructor arguments for [`Orchestrator`].
pub struct OrchestratorParts {
    /// OS identity source.
    pub detector: Arc<dyn OsDetector>,
    /// Profile loader.
    pub resolver: ProfileResolver,
    /// Backend factory.
    pub selector: BackendSelector,
    /// Module runner.
    pub scheduler: ModuleScheduler,
    /// Base module environment, before profile variables.
    pub environment: ModuleEnvironment,
    /// Shared process runner, used here for the `PATH` check.
    pub executor: Arc<dyn Executor>,
    /// Elevation helper name.
    pub elevate_with: String,
    /// Logger.
    pub log: Arc<dyn Log>,
}

impl std::fmt::Debug for OrchestratorParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorParts").finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Assemble an orchestrator.
    #[must_use]
    pub fn new(parts: OrchestratorParts) -> Self {
        Self {
            detector: parts.detector,
            resolver: parts.resolver,
            selector: parts.selector,
            scheduler: parts.scheduler,
            environment: parts.environment,
            executor: parts.executor,
            elevate_with: parts.elevate_with,
            log: parts.log,
        }
    }

    /// Provision the host with `profile_name`.
    ///
    /// # Errors
    ///
    /// Returns the [`ProfileError`] when the profile cannot be resolved;
    /// nothing is executed in that case.
    pub fn run(&self, profile_name: &str) -> Result<SetupOutcome, ProfileError> {
        self.report_system();

        self.log.stage(&format!("Loading profile: {profile_name}"));
        let profile = self.resolver.load_profile(profile_name).inspect_err(|e| {
            self.log.error(&e.to_string());
            let available = self.resolver.available();
            if !available.is_empty() {
                self.log
                    .info(&format!("available profiles: {}", available.join(", ")));
            }
        })?;
        self.log
            .stage(&format!("Setting up profile: {}", profile.name));
        self.log
            .info(&format!("Description: {}", profile.description));

        let environment = self.environment.clone().with_profile(&profile);
        let mut outcome = SetupOutcome {
            profile: profile.name.clone(),
            ..SetupOutcome::default()
        };

        self.check_elevation_helper(&profile);
        self.enable_repositories(&profile, &mut outcome);
        self.install_packages(&profile, &mut outcome);
        outcome.failures += self.scheduler.run(&profile, &environment).failed;

        Ok(outcome)
    }

    fn report_system(&self) {
        let os = self.detector.os_info();
        self.log.stage("System information");
        self.log
            .info(&format!("Operating system: {}", os.pretty_name()));
        self.log.info(&format!("System type: {}", os.family));
        self.log.info(&format!(
            "Package manager: {}",
            os.package_manager_name().unwrap_or("none")
        ));
    }

    fn check_elevation_helper(&self, profile: &Profile) {
        let mutates = !profile.packages.install.is_empty()
            || !profile.packages.repositories.is_empty();
        if mutates && !self.executor.is_dry_run() && !self.executor.which(&self.elevate_with) {
            self.log.warn(&format!(
                "elevation helper '{}' not found on PATH; privileged commands will fail",
                self.elevate_with
            ));
        }
    }

    fn success_status(&self) -> StepStatus {
        if self.executor.is_dry_run() {
            StepStatus::DryRun
        } else {
            StepStatus::Ok
        }
    }

    fn platform_failure(&self, step: &str, err: &PlatformError, outcome: &mut SetupOutcome) {
        match err {
            PlatformError::NotImplemented { .. } => self.log.warn(&err.to_string()),
            PlatformError::Unsupported { .. } => {
                self.log.error(&err.to_string());
                outcome.platform_unsupported = true;
            }
        }
        self.log
            .record(step, StepStatus::Skipped, Some(&err.to_string()));
    }

    fn enable_repositories(&self, profile: &Profile, outcome: &mut SetupOutcome) {
        self.log.stage("Setting up repositories");
        let repos = &profile.packages.repositories;
        if repos.is_empty() {
            self.log.info("No repositories specified in profile");
            return;
        }

        let backend = match self.selector.repository_backend() {
            Ok(backend) => backend,
            Err(e) => {
                self.platform_failure("repositories", &e, outcome);
                return;
            }
        };

        self.log
            .info(&format!("Processing repositories ({})", repos.len()));
        for (index, repo) in repos.iter().enumerate() {
            self.log.info(&format!(
                "Enabling {} repository: {}",
                repo.kind, repo.name
            ));
            let step = format!("repository {}", repo.label());
            match backend.enable_repository(repo) {
                Ok(true) => self.log.record(&step, self.success_status(), None),
                Ok(false) => {
                    outcome.failures += 1;
                    self.log
                        .record(&step, StepStatus::Failed, Some("command failed"));
                }
                Err(e) => {
                    outcome.failures += 1;
                    self.log.error(&e.to_string());
                    self.log
                        .record(&step, StepStatus::Failed, Some(&e.to_string()));
                    self.skip_remaining(repos.get(index + 1..).unwrap_or_default());
                    return;
                }
            }
        }
    }

    fn skip_remaining(&self, rest: &[RepositoryDescriptor]) {
        if rest.is_empty() {
            return;
        }
        self.log.warn(&format!(
            "skipping {} remaining repositories",
            rest.len()
        ));
        for repo in rest {
            self.log.record(
                &format!("repository {}", repo.label()),
                StepStatus::Skipped,
                Some("repository phase aborted"),
            );
        }
    }

    fn install_packages(&self, profile: &Profile, outcome: &mut SetupOutcome) {
        self.log.stage("Installing packages");
        let names = &profile.packages.install;
        if names.is_empty() {
            self.log.info("No packages specified in profile");
            return;
        }

        let backend = match self.selector.package_backend() {
            Ok(backend) => backend,
            Err(e) => {
                self.platform_failure("packages", &e, outcome);
                return;
            }
        };

        let step = format!("packages ({})", names.len());
        if backend.install_packages(names) {
            self.log.record(&step, self.success_status(), None);
        } else {
            outcome.failures += 1;
            self.log
                .record(&step, StepStatus::Failed, Some("package installation failed"));
        }
    }
}
