//! Command: print the module execution plan of a profile.
use std::sync::Arc;

use anyhow::Result;

use super::CommandSetup;
use crate::cli::{GlobalOpts, ProfileOpts};
use crate::config::profiles::ProfileResolver;
use crate::logging::{Log, Logger};
use crate::modules::{Module, ModuleScheduler};

/// One aligned line per module: priority, id, script.
#[must_use]
pub fn format_plan(modules: &[Module]) -> Vec<String> {
    let width = modules.iter().map(|m| m.id.len()).max().unwrap_or(0);
    modules
        .iter()
        .map(|m| {
            format!(
                "{:>4}  {:<width$}  {}",
                m.priority,
                m.id,
                m.script_path.display()
            )
        })
        .collect()
}

/// Resolve the profile and print its module plan; nothing is executed.
///
/// # Errors
///
/// Returns an error if the root cannot be found or the profile does not
/// resolve.
#[allow(clippy::print_stdout)]
pub fn run(global: &GlobalOpts, opts: &ProfileOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let shared: Arc<dyn Log> = Arc::clone(log) as Arc<dyn Log>;
    let resolver = ProfileResolver::new(&setup.layout.profiles_dir, Arc::clone(&shared));
    let profile = resolver.load_profile(&opts.profile)?;

    let scheduler = ModuleScheduler::new(
        &setup.layout.modules_dir,
        setup.runner(global, log),
        shared,
        setup.settings.timeout(),
    );
    let (plan, missing) = scheduler.plan(&profile.modules.enabled);
    for id in &missing {
        log.warn(&format!("module script not found: {id}"));
    }
    for line in format_plan(&plan) {
        println!("{line}");
    }
    Ok(())
}
