//! Command: print the detected operating system.
use std::sync::Arc;

use crate::logging::Log;
use crate::platform::{LinuxOsDetector, OsDetector as _, OsInfo};

/// Human-readable report of `info`, one `key: value` per line.
#[must_use]
pub fn describe(info: &OsInfo) -> String {
    format!(
        "family: {}\nname: {}\nversion: {}\npretty name: {}\npackage manager: {}",
        info.family,
        info.name(),
        info.version(),
        info.pretty_name(),
        info.package_manager_name().unwrap_or("none"),
    )
}

/// Detect and print the OS identity.
#[allow(clippy::print_stdout)]
pub fn run(log: Arc<dyn Log>) {
    let info = LinuxOsDetector::new(log).os_info();
    println!("{}", describe(&info));
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn describe_fedora() {
        let mut fields = BTreeMap::new();
        crate::platform::parse_release(
            "ID=fedora\nNAME=\"Fedora Linux\"\nVERSION=\"40\"\n",
            &mut fields,
        );
        insta::assert_snapshot!(describe(&OsInfo::from_fields(fields)), @r"
        family: Fedora
        name: Fedora Linux
        version: 40
        pretty name: Fedora Linux 40
        package manager: dnf
        ");
    }

    #[test]
    fn describe_unknown() {
        let text = describe(&OsInfo::unknown());
        assert!(text.starts_with("family: unknown"));
        assert!(text.ends_with("package manager: none"));
    }
}
