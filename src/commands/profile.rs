//! Command: print the effective profile as JSON.
use std::sync::Arc;

use anyhow::{Context as _, Result};

use super::CommandSetup;
use crate::cli::{GlobalOpts, ProfileOpts};
use crate::config::profiles::ProfileResolver;
use crate::logging::{Log, Logger};

/// Resolve the profile and print it; nothing is executed.
///
/// # Errors
///
/// Returns an error if the root cannot be found or the profile does not
/// resolve.
#[allow(clippy::print_stdout)]
pub fn run(global: &GlobalOpts, opts: &ProfileOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, log)?;
    let resolver = ProfileResolver::new(
        &setup.layout.profiles_dir,
        Arc::clone(log) as Arc<dyn Log>,
    );
    let profile = resolver.load_profile(&opts.profile)?;
    let json = serde_json::to_string_pretty(&profile).context("serializing profile")?;
    println!("{json}");
    Ok(())
}
