//! Module discovery, priority ordering and sequential execution.
//!
//! A module is a script `modules.d/<priority>-<name>.sh`. Profiles request
//! modules by full id (`110-nvm`) or bare name (`nvm`); bare names are
//! matched against `*-<name>.sh`. Modules run one at a time in ascending
//! priority, and a failing module never stops the ones after it.
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::profiles::Profile;
use crate::environment::ModuleEnvironment;
use crate::exec::{ExecOptions, Executor, LogSink};
use crate::logging::{Log, StepStatus};

/// Priority of modules without a numeric prefix.
pub const DEFAULT_PRIORITY: u32 = 999;

/// A resolved module script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Effective id (the script's file stem).
    pub id: String,
    /// Script location.
    pub script_path: PathBuf,
    /// Sort key from the id's numeric prefix.
    pub priority: u32,
    /// Id without its numeric prefix.
    pub name: String,
}

impl Module {
    /// Build a module from its effective id and script.
    #[must_use]
    pub fn new(id: &str, script_path: PathBuf) -> Self {
        Self {
            id: id.to_string(),
            script_path,
            priority: parse_priority(id),
            name: parse_name(id).to_string(),
        }
    }
}

/// Leading decimal digits of `id`, or [`DEFAULT_PRIORITY`].
#[must_use]
pub fn parse_priority(id: &str) -> u32 {
    let digits: String = id.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().unwrap_or(DEFAULT_PRIORITY)
}

/// `id` without a `<digits>-` prefix.
#[must_use]
pub fn parse_name(id: &str) -> &str {
    let rest = id.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() == id.len() {
        return id;
    }
    match rest.strip_prefix('-') {
        Some(name) if !name.is_empty() => name,
        _ => id,
    }
}

/// Whether `id` already has the `<digits>-` form.
fn has_priority_prefix(id: &str) -> bool {
    parse_name(id) != id
}

/// Counts from one module phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModuleReport {
    /// Modules whose script was run (or simulated).
    pub executed: usize,
    /// Executed modules that did not succeed.
    pub failed: usize,
    /// Requested modules with no script.
    pub missing: usize,
}

/// Finds, orders and runs module scripts.
pub struct ModuleScheduler {
    modules_dir: PathBuf,
    executor: Arc<dyn Executor>,
    log: Arc<dyn Log>,
    timeout: Duration,
}

impl std::fmt::Debug for ModuleScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleScheduler")
            .field("modules_dir", &self.modules_dir)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ModuleScheduler {
    /// Scheduler over `modules_dir`.
    #[must_use]
    pub fn new(
        modules_dir: impl Into<PathBuf>,
        executor: Arc<dyn Executor>,
        log: Arc<dyn Log>,
        timeout: Duration,
    ) -> Self {
        Self {
            modules_dir: modules_dir.into(),
            executor,
            log,
            timeout,
        }
    }

    /// Resolve one requested id to a script.
    ///
    /// Tries `<id>.sh` first. Ids without a numeric prefix then fall back to
    /// the alphabetically first `*-<id>.sh`, whose stem becomes the
    /// effective id.
    #[must_use]
    pub fn resolve(&self, requested: &str) -> Option<Module> {
        if requested.is_empty() || requested.contains(['/', '\\']) {
            return None;
        }

        let exact = self.modules_dir.join(format!("{requested}.sh"));
        if exact.is_file() {
            return Some(Module::new(requested, exact));
        }
        if has_priority_prefix(requested) {
            return None;
        }

        let suffix = format!("-{requested}.sh");
        let mut candidates: Vec<PathBuf> = fs::read_dir(&self.modules_dir)
            .ok()?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && file_name(p).is_some_and(|n| n.ends_with(&suffix)))
            .collect();
        candidates.sort();

        let path = candidates.into_iter().next()?;
        let id = path.file_stem()?.to_str()?.to_string();
        Some(Module::new(&id, path))
    }

    /// Resolve `requested` ids, returning found modules in declaration
    /// order and the ids that had no script.
    #[must_use]
    pub fn discover(&self, requested: &[String]) -> (Vec<Module>, Vec<String>) {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for id in requested {
            match self.resolve(id) {
                Some(module) => found.push(module),
                None => missing.push(id.clone()),
            }
        }
        (found, missing)
    }

    /// Resolved modules in execution order. Ties keep declaration order.
    #[must_use]
    pub fn plan(&self, requested: &[String]) -> (Vec<Module>, Vec<String>) {
        let (mut modules, missing) = self.discover(requested);
        modules.sort_by_key(|m| m.priority);
        (modules, missing)
    }

    /// Run every enabled module of `profile` with `env` injected.
    ///
    /// Never fails: missing scripts and failing modules are logged,
    /// recorded and counted.
    pub fn run(&self, profile: &Profile, env: &ModuleEnvironment) -> ModuleReport {
        self.log.stage("Processing modules");
        let mut report = ModuleReport::default();

        if profile.modules.enabled.is_empty() {
            self.log.info("No modules specified");
            return report;
        }

        let (modules, missing) = self.plan(&profile.modules.enabled);
        for id in &missing {
            self.log.warn(&format!(
                "module script not found: {id} (looked in {})",
                self.modules_dir.display()
            ));
            self.log.record(
                &format!("module {id}"),
                StepStatus::Skipped,
                Some("script not found"),
            );
        }
        report.missing = missing.len();

        self.log.debug(&format!(
            "modules will run in this order: {}",
            modules
                .iter()
                .map(|m| m.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        let opts = ExecOptions::default()
            .with_timeout(self.timeout)
            .with_env(env.vars().to_vec());

        for module in &modules {
            report.executed += 1;
            if !self.run_one(module, &opts) {
                report.failed += 1;
            }
        }
        report
    }

    fn run_one(&self, module: &Module, opts: &ExecOptions) -> bool {
        self.log.info(&format!("Installing module: {}", module.id));
        self.log.rule(&format!("Module: {}", module.id));

        let script = module.script_path.to_string_lossy();
        let mut sink = LogSink::new(&*self.log);
        let result = self.executor.execute(&script, &[], opts, &mut sink);
        let step = format!("module {}", module.id);

        if result.success {
            self.log
                .info(&format!("Successfully installed module: {}", module.id));
            let status = if self.executor.is_dry_run() {
                StepStatus::DryRun
            } else {
                StepStatus::Ok
            };
            self.log.record(&step, status, None);
        } else {
            let reason = result.failure_reason();
            self.log
                .warn(&format!("module {} failed ({reason})", module.id));
            self.log.record(&step, StepStatus::Failed, Some(&reason));
        }
        result.success
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}
