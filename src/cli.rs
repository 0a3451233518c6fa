use clap::{Parser, Subcommand};

/// Top-level CLI entry point for the provisioning engine.
#[derive(Parser, Debug)]
#[command(
    name = "adytum",
    about = "Profile-driven machine provisioning",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output (also exports DEBUG=yes to modules)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Print commands instead of running them
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Override the repository root (the directory containing conf/)
    #[arg(long, global = true)]
    pub root: Option<std::path::PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Provision this machine with a profile
    Setup(SetupOpts),
    /// Print the effective profile as JSON
    Profile(ProfileOpts),
    /// Print the module execution plan of a profile
    Modules(ProfileOpts),
    /// Print the detected operating system
    Os,
    /// Generate shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
    /// Print version information
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::Profile(_) => "profile",
            Self::Modules(_) => "modules",
            Self::Os => "os",
            Self::Completions { .. } => "completions",
            Self::Version => "version",
        }
    }

    /// Profile the subcommand operates on.
    #[must_use]
    pub fn profile(&self) -> Option<&str> {
        match self {
            Self::Setup(SetupOpts { profile, .. })
            | Self::Profile(ProfileOpts { profile })
            | Self::Modules(ProfileOpts { profile }) => Some(profile),
            Self::Os | Self::Completions { .. } | Self::Version => None,
        }
    }
}

/// Options for the `setup` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct SetupOpts {
    /// Profile to apply
    #[arg(short, long)]
    pub profile: String,

    /// Per-command timeout in seconds (overrides conf/adytum.toml)
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Exit with status 2 if any repository, package or module failed
    #[arg(long)]
    pub strict: bool,
}

/// Options for subcommands that only read a profile.
#[derive(Parser, Debug, Clone)]
pub struct ProfileOpts {
    /// Profile to resolve
    #[arg(short, long)]
    pub profile: String,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_setup_with_profile_short() {
        let cli = Cli::parse_from(["adytum", "setup", "-p", "workstation"]);
        let Command::Setup(opts) = cli.command else {
            panic!("expected setup");
        };
        assert_eq!(opts.profile, "workstation");
        assert_eq!(opts.timeout, None);
        assert!(!opts.strict);
    }

    #[test]
    fn parse_setup_timeout_and_strict() {
        let cli = Cli::parse_from([
            "adytum", "setup", "--profile", "base", "--timeout", "30", "--strict",
        ]);
        let Command::Setup(opts) = cli.command else {
            panic!("expected setup");
        };
        assert_eq!(opts.timeout, Some(30));
        assert!(opts.strict);
    }

    #[test]
    fn setup_requires_profile() {
        assert!(Cli::try_parse_from(["adytum", "setup"]).is_err());
    }

    #[test]
    fn parse_dry_run_short_and_global() {
        let cli = Cli::parse_from(["adytum", "setup", "-p", "base", "-d"]);
        assert!(cli.global.dry_run);
        let cli = Cli::parse_from(["adytum", "--dry-run", "setup", "-p", "base"]);
        assert!(cli.global.dry_run);
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["adytum", "-v", "os"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Os));
    }

    #[test]
    fn parse_root_override() {
        let cli = Cli::parse_from(["adytum", "--root", "/srv/adytum", "modules", "-p", "x"]);
        assert_eq!(
            cli.global.root,
            Some(std::path::PathBuf::from("/srv/adytum"))
        );
        assert!(matches!(cli.command, Command::Modules(_)));
    }

    #[test]
    fn parse_completions() {
        let cli = Cli::parse_from(["adytum", "completions", "bash"]);
        assert!(matches!(
            cli.command,
            Command::Completions {
                shell: clap_complete::Shell::Bash
            }
        ));
    }

    #[test]
    fn profile_is_known_for_profile_commands() {
        let cli = Cli::parse_from(["adytum", "setup", "-p", "laptop"]);
        assert_eq!(cli.command.profile(), Some("laptop"));
        let cli = Cli::parse_from(["adytum", "modules", "-p", "base"]);
        assert_eq!(cli.command.profile(), Some("base"));
        let cli = Cli::parse_from(["adytum", "os"]);
        assert_eq!(cli.command.profile(), None);
    }

    #[test]
    fn command_names_match_subcommands() {
        let cli = Cli::parse_from(["adytum", "profile", "-p", "x"]);
        assert_eq!(cli.command.name(), "profile");
        let cli = Cli::parse_from(["adytum", "version"]);
        assert_eq!(cli.command.name(), "version");
    }
}
