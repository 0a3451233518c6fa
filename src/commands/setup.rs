//! Command: provision the machine with a profile.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use super::CommandSetup;
use crate::backends::BackendSelector;
use crate::cli::{GlobalOpts, SetupOpts};
use crate::config::profiles::ProfileResolver;
use crate::environment::ModuleEnvironment;
use crate::exec::Executor;
use crate::logging::{Log, Logger};
use crate::modules::ModuleScheduler;
use crate::orchestrator::{Orchestrator, OrchestratorParts, SetupOutcome};
use crate::platform::{LinuxOsDetector, OsDetector};

/// Exit status for a run that completed.
///
/// `1` when the platform is unsupported, `2` under `--strict` when anything
/// failed, `0` otherwise.
#[must_use]
pub const fn exit_status(outcome: &SetupOutcome, strict: bool) -> u8 {
    if outcome.platform_unsupported {
        1
    } else if strict && outcome.failures > 0 {
        2
    } else {
        0
    }
}

/// Run the setup command and return the process exit status.
///
/// # Errors
///
/// Returns an error if the root cannot be determined, settings fail to
/// parse, or the profile does not resolve.
pub fn run(
    global: &GlobalOpts,
    verbose: bool,
    opts: &SetupOpts,
    log: &Arc<Logger>,
) -> Result<u8> {
    let setup = CommandSetup::init(global, log)?;
    log.info(&format!("adytum {}", super::version::version()));
    if global.dry_run {
        log.dry_run("no commands will be executed");
    }

    let timeout = opts
        .timeout
        .map_or_else(|| setup.settings.timeout(), Duration::from_secs);
    let shared: Arc<dyn Log> = Arc::clone(log) as Arc<dyn Log>;
    let executor: Arc<dyn Executor> = setup.runner(global, log);
    let detector: Arc<dyn OsDetector> = Arc::new(LinuxOsDetector::new(Arc::clone(&shared)));
    let layout = &setup.layout;

    let orchestrator = Orchestrator::new(OrchestratorParts {
        detector: Arc::clone(&detector),
        resolver: ProfileResolver::new(&layout.profiles_dir, Arc::clone(&shared)),
        selector: BackendSelector::new(
            detector,
            Arc::clone(&executor),
            Arc::clone(&shared),
            timeout,
        ),
        scheduler: ModuleScheduler::new(
            &layout.modules_dir,
            Arc::clone(&executor),
            Arc::clone(&shared),
            timeout,
        ),
        environment: ModuleEnvironment::for_layout(layout, verbose),
        executor,
        elevate_with: setup.settings.exec.elevate_with.clone(),
        log: shared,
    });

    let outcome = orchestrator.run(&opts.profile)?;
    log.print_summary();

    let status = exit_status(&outcome, opts.strict);
    if status == 2 {
        log.error(&format!(
            "{} step(s) failed (--strict)",
            outcome.failures
        ));
    }
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(failures: usize, platform_unsupported: bool) -> SetupOutcome {
        SetupOutcome {
            profile: "p".to_string(),
            failures,
            platform_unsupported,
        }
    }

    #[test]
    fn clean_run_exits_zero() {
        assert_eq!(exit_status(&outcome(0, false), false), 0);
        assert_eq!(exit_status(&outcome(0, false), true), 0);
    }

    #[test]
    fn failures_only_matter_when_strict() {
        assert_eq!(exit_status(&outcome(3, false), false), 0);
        assert_eq!(exit_status(&outcome(3, false), true), 2);
    }

    #[test]
    fn unsupported_platform_exits_one() {
        assert_eq!(exit_status(&outcome(0, true), false), 1);
        assert_eq!(exit_status(&outcome(5, true), true), 1);
    }
}
