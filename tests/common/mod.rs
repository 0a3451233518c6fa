// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed provisioning repository, a fluent
// builder for profiles and module scripts, and an in-memory logger so each
// integration test can set up an isolated environment without repeating
// filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::os::unix::fs::PermissionsExt as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use adytum::config::settings::Settings;
use adytum::config::Layout;
use adytum::logging::{Log, StepEntry, StepStatus};
use adytum::platform::{OsDetector, OsInfo};

/// An isolated test repository backed by a [`tempfile::TempDir`].
///
/// Layout: `conf/profiles.d/`, `conf/modules.d/` and `lib/`.
pub struct TestRepo {
    /// Temporary directory containing the repository.
    pub root: tempfile::TempDir,
}

impl TestRepo {
    /// Path to the repository root.
    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    /// Layout with default directory names.
    pub fn layout(&self) -> Layout {
        Layout::new(self.root.path(), &Settings::default())
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.layout().profiles_dir
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.layout().modules_dir
    }

    /// File inside the repository that module scripts append to.
    pub fn trace_path(&self) -> PathBuf {
        self.root.path().join("trace.log")
    }

    /// Lines module scripts appended to [`trace_path`](Self::trace_path).
    pub fn trace(&self) -> Vec<String> {
        std::fs::read_to_string(self.trace_path())
            .map(|s| s.lines().map(String::from).collect())
            .unwrap_or_default()
    }
}

/// Fluent builder for [`TestRepo`].
pub struct TestRepoBuilder {
    repo: TestRepo,
}

impl TestRepoBuilder {
    /// Begin building an empty repository.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        let repo = TestRepo { root };
        std::fs::create_dir_all(repo.profiles_dir()).expect("create profiles dir");
        std::fs::create_dir_all(repo.modules_dir()).expect("create modules dir");
        std::fs::create_dir_all(repo.layout().lib_dir).expect("create lib dir");
        Self { repo }
    }

    /// Write `conf/profiles.d/<file>`.
    pub fn profile(self, file: &str, content: &str) -> Self {
        std::fs::write(self.repo.profiles_dir().join(file), content).expect("write profile");
        self
    }

    /// Write an executable `conf/modules.d/<file>` with `body` after the
    /// shebang.
    pub fn script(self, file: &str, body: &str) -> Self {
        let path = self.repo.modules_dir().join(file);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        self
    }

    /// Executable module that appends its own name to the trace file.
    pub fn tracing_script(self, file: &str) -> Self {
        let trace = self.repo.trace_path();
        let stem = file.trim_end_matches(".sh").to_string();
        self.script(
            file,
            &format!("echo \"{stem}\" >> \"{}\"", trace.display()),
        )
    }

    /// Finish building and return the repository.
    pub fn build(self) -> TestRepo {
        self.repo
    }
}

/// [`Log`] implementation that keeps everything in memory.
#[derive(Default)]
pub struct MemoryLog {
    messages: Mutex<Vec<String>>,
    steps: Mutex<Vec<StepEntry>>,
}

impl MemoryLog {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, level: &str, msg: &str) {
        self.messages
            .lock()
            .expect("lock messages")
            .push(format!("{level}: {msg}"));
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().expect("lock messages").clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }

    pub fn statuses(&self) -> Vec<(String, StepStatus)> {
        self.steps
            .lock()
            .expect("lock steps")
            .iter()
            .map(|s| (s.name.clone(), s.status))
            .collect()
    }
}

impl Log for MemoryLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }

    fn info(&self, msg: &str) {
        self.push("info", msg);
    }

    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }

    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }

    fn error(&self, msg: &str) {
        self.push("error", msg);
    }

    fn dry_run(&self, msg: &str) {
        self.push("dry_run", msg);
    }

    fn record(&self, name: &str, status: StepStatus, message: Option<&str>) {
        self.steps.lock().expect("lock steps").push(StepEntry {
            name: name.to_string(),
            status,
            message: message.map(String::from),
        });
    }
}

/// [`OsDetector`] returning a fixed `os-release` identity.
pub struct FixedOs(pub OsInfo);

impl FixedOs {
    /// Identity with only `ID=<id>` set.
    pub fn with_id(id: &str) -> Arc<Self> {
        let mut fields = std::collections::BTreeMap::new();
        fields.insert("ID".to_string(), id.to_string());
        Arc::new(Self(OsInfo::from_fields(fields)))
    }
}

impl OsDetector for FixedOs {
    fn os_info(&self) -> OsInfo {
        self.0.clone()
    }
}
