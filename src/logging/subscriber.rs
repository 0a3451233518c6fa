//! Tracing subscriber: console rendering, the per-run log file, and setup.
//!
//! Events are sorted into a few [`Kind`]s by level and target. The console
//! and the log file render the same kinds differently; subprocess output
//! streamed from modules and package managers gets its own kind so it stays
//! visually apart from adytum's own messages.
use std::fs;
use std::io::Write as _;
use std::sync::Mutex;

use tracing::Level;

use super::utils::{format_utc_datetime, format_utc_time, log_file_path, strip_ansi};

/// Target of stage headers.
pub(super) const STAGE_TARGET: &str = "adytum::stage";
/// Target of dry-run notices.
pub(super) const DRY_RUN_TARGET: &str = "adytum::dry_run";
/// Target of lines streamed from child processes.
pub(super) const OUTPUT_TARGET: &str = "adytum::output";

/// What a run is doing, written at the top of its log file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunHeader {
    /// Subcommand name; also names the log file.
    pub command: String,
    /// Profile the command operates on, if any.
    pub profile: Option<String>,
    /// Whether commands are only printed.
    pub dry_run: bool,
}

impl RunHeader {
    /// Header for `command` with no profile, not in dry-run mode.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            ..Self::default()
        }
    }

    fn render(&self, version: &str, started: &str) -> String {
        let mut facts = vec![format!("command: {}", self.command)];
        if let Some(profile) = &self.profile {
            facts.push(format!("profile: {profile}"));
        }
        if self.dry_run {
            facts.push("dry run".to_string());
        }
        let bar = "=".repeat(42);
        format!(
            "{bar}\nAdytum {version} {started}\n{}\n{bar}\n",
            facts.join(" | ")
        )
    }
}

/// Rendering class of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Stage,
    DryRun,
    Output,
    Error,
    Warn,
    Info,
    Debug,
}

impl Kind {
    fn of(level: Level, target: &str) -> Self {
        match (level, target) {
            (Level::ERROR, _) => Self::Error,
            (Level::WARN, _) => Self::Warn,
            (Level::INFO, STAGE_TARGET) => Self::Stage,
            (Level::INFO, DRY_RUN_TARGET) => Self::DryRun,
            (Level::INFO, OUTPUT_TARGET) => Self::Output,
            (Level::INFO, _) => Self::Info,
            _ => Self::Debug,
        }
    }

    fn console(self, msg: &str) -> String {
        match self {
            Self::Error => format!("\x1b[31mERROR\x1b[0m {msg}"),
            Self::Warn => format!("\x1b[33mWARN\x1b[0m  {msg}"),
            Self::Stage => format!("\x1b[1;34m==>\x1b[0m \x1b[1m{msg}\x1b[0m"),
            Self::DryRun => format!("  \x1b[33m[DRY RUN]\x1b[0m {msg}"),
            Self::Output => format!("  \x1b[2m│\x1b[0m {msg}"),
            Self::Info => format!("  {msg}"),
            Self::Debug => format!("  \x1b[2m{msg}\x1b[0m"),
        }
    }

    fn file(self, ts: &str, msg: &str) -> String {
        let msg = strip_ansi(msg);
        match self {
            Self::Stage => format!("[{ts}] ==> {msg}"),
            Self::DryRun => format!("[{ts}]     [dry run] {msg}"),
            Self::Output => format!("[{ts}]     | {msg}"),
            Self::Error => format!("[{ts}]     [error] {msg}"),
            Self::Warn => format!("[{ts}]     [warn] {msg}"),
            Self::Debug => format!("[{ts}]     [debug] {msg}"),
            Self::Info => format!("[{ts}]     {msg}"),
        }
    }
}

/// Pulls the `message` field out of an event.
#[derive(Default)]
struct MessageExtractor {
    message: String,
}

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

fn classify(event: &tracing::Event<'_>) -> (Kind, String) {
    let metadata = event.metadata();
    let mut extractor = MessageExtractor::default();
    event.record(&mut extractor);
    (
        Kind::of(*metadata.level(), metadata.target()),
        extractor.message,
    )
}

/// Appends every event to `$XDG_CACHE_HOME/adytum/<command>.log`.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Truncate the log file and write the run header. `None` when the
    /// cache directory or the file is unavailable.
    pub(super) fn new(header: &RunHeader) -> Option<Self> {
        let path = log_file_path(&header.command)?;
        let version =
            option_env!("ADYTUM_VERSION").unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        fs::write(&path, header.render(version, &format_utc_datetime())).ok()?;
        let file = fs::OpenOptions::new().append(true).open(&path).ok()?;
        Some(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let (kind, msg) = classify(event);
        let line = kind.file(&format_utc_time(), &msg);
        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "{line}").ok();
        }
    }
}

struct ConsoleFormat;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormat
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let (kind, msg) = classify(event);
        writeln!(writer, "{}", kind.console(&msg))
    }
}

/// Install the global subscriber: console output (warnings and errors on
/// stderr, the rest on stdout, debug only when `verbose`) plus the log file
/// described by `header`, which always records debug events.
///
/// Must be called once, before any logging.
pub fn init_subscriber(verbose: bool, header: &RunHeader) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let make_writer = std::io::stderr
        .with_max_level(Level::WARN)
        .and(std::io::stdout.with_min_level(Level::INFO));

    let console_layer = fmt::layer()
        .event_format(ConsoleFormat)
        .with_writer(make_writer)
        .with_filter(console_level);

    let file_layer = FileLayer::new(header).map(|l| l.with_filter(LevelFilter::DEBUG));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
}
