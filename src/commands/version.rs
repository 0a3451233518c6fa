//! Command: print version information.

/// Build version: `ADYTUM_VERSION` at compile time, else the package version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("ADYTUM_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the adytum version to stdout.
#[allow(clippy::print_stdout)]
pub fn run() {
    println!("adytum {}", version());
}
