//! Subcommand handlers.
pub mod modules;
pub mod os;
pub mod profile;
pub mod setup;
pub mod version;

use std::sync::Arc;

use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::config::settings::Settings;
use crate::config::{Layout, resolve_root};
use crate::exec::ProcessRunner;
use crate::logging::{Log, Logger};

/// Shared state produced by the common command setup sequence.
///
/// Resolves the repository root and loads settings so that each command
/// does not have to repeat the boilerplate.
#[derive(Debug)]
pub struct CommandSetup {
    /// Resolved repository layout.
    pub layout: Layout,
    /// Loaded `conf/adytum.toml`.
    pub settings: Settings,
}

impl CommandSetup {
    /// Locate the repository and load `conf/adytum.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be determined or the
    /// settings file fails to parse.
    pub fn init(global: &GlobalOpts, log: &Logger) -> Result<Self> {
        let root = resolve_root(global.root.as_deref())?;
        let settings = Settings::load(&root.join("conf"))?;
        let layout = Layout::new(&root, &settings);
        log.debug(&format!("root: {}", layout.root.display()));
        log.debug(&format!("profiles: {}", layout.profiles_dir.display()));
        log.debug(&format!("modules: {}", layout.modules_dir.display()));
        Ok(Self { layout, settings })
    }

    /// Process runner honouring `--dry-run` and the configured helper.
    #[must_use]
    pub fn runner(&self, global: &GlobalOpts, log: &Arc<Logger>) -> Arc<ProcessRunner> {
        let log: Arc<dyn Log> = Arc::clone(log) as Arc<dyn Log>;
        Arc::new(
            ProcessRunner::new(global.dry_run, log)
                .with_elevation_helper(&self.settings.exec.elevate_with),
        )
    }
}
