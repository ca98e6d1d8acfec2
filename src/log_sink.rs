//! Per-job log sink.
//!
//! Entering a sink installs a scoped tracing dispatcher that writes to stdout and,
//! when a destination is given, to a log file using
//! `<timestamp> - <source> - <message>` lines. Output captured from the trainer is
//! routed through the same dispatcher at the configured redirect level. Dropping the
//! sink restores the previous dispatcher and active log file on every exit path,
//! including unwinding.
//!
//! At most one sink may be active per process; this is not enforced.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
    sync::Mutex,
};

use time::{UtcOffset, format_description::FormatItem, macros::format_description};
use tracing::{Event, Subscriber, subscriber::DefaultGuard};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Registry,
    filter::ParseError,
    fmt::{
        self, FmtContext, FormatEvent, FormatFields,
        format::Writer,
        time::{FormatTime, OffsetTime},
    },
    prelude::*,
    registry::LookupSpan,
};

use crate::config::{LogSettings, RedirectLevel};

/// Target used for lines captured from the trainer's output streams.
pub const REDIRECT_TARGET: &str = "pixelwise_trainer::trainer_output";

static ACTIVE_LOG_FILE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Log file of the sink currently entered, if any.
pub fn active_log_file() -> Option<PathBuf> {
    ACTIVE_LOG_FILE
        .lock()
        .unwrap_or_else(|err| err.into_inner())
        .clone()
}

fn swap_active_log_file(next: Option<PathBuf>) -> Option<PathBuf> {
    let mut active = ACTIVE_LOG_FILE.lock().unwrap_or_else(|err| err.into_inner());
    std::mem::replace(&mut *active, next)
}

/// Scoped logging state for one job. See the module docs.
#[must_use = "the sink is released as soon as it is dropped"]
pub struct LogSink {
    previous_log_file: Option<PathBuf>,
    attached: Option<PathBuf>,
    redirect_level: RedirectLevel,
    // Field order matters: the dispatcher is restored before the file writer flushes.
    _dispatcher: DefaultGuard,
    _writer: Option<WorkerGuard>,
}

impl LogSink {
    /// Enter a sink writing to `destination` when given.
    ///
    /// A destination that cannot be opened is reported as a warning and the sink
    /// continues with stdout only, so logging problems never block training.
    pub fn enter(destination: Option<&Path>, settings: &LogSettings) -> Self {
        let timer = build_timer();
        let opened = destination.map(|path| (path, open_log_file(path)));
        let mut attached = None;
        let mut open_failure = None;
        let mut writer_guard = None;
        let mut file_layer = None;
        match opened {
            Some((path, Ok(file))) => {
                let (writer, guard) = tracing_appender::non_blocking(file);
                file_layer = Some(
                    fmt::layer()
                        .with_ansi(false)
                        .event_format(DashFormat::new(timer.clone()))
                        .with_writer(writer),
                );
                writer_guard = Some(guard);
                attached = Some(path.to_path_buf());
            }
            Some((path, Err(err))) => open_failure = Some((path.to_path_buf(), err)),
            None => {}
        }

        let (filter, rejected_filter) = build_env_filter(&settings.filter);
        let stdout_layer = fmt::layer().with_timer(timer).with_writer(std::io::stdout);
        let subscriber = Registry::default()
            .with(filter)
            .with(stdout_layer)
            .with(file_layer);
        let dispatcher = tracing::subscriber::set_default(subscriber);
        let previous_log_file = swap_active_log_file(attached.clone());

        if let Some(err) = rejected_filter {
            tracing::warn!(
                "Log filter `{}` is invalid, using `{DEFAULT_FILTER}`: {err}",
                settings.filter
            );
        }
        if let Some((path, err)) = open_failure {
            tracing::warn!(
                "Log file {} unavailable, continuing without it: {err}",
                path.display()
            );
        }
        if let Some(path) = &attached {
            tracing::debug!("Job log attached at {}", path.display());
        }

        Self {
            previous_log_file,
            attached,
            redirect_level: settings.redirect_level,
            _dispatcher: dispatcher,
            _writer: writer_guard,
        }
    }

    /// Whether the file layer was attached.
    pub fn file_attached(&self) -> bool {
        self.attached.is_some()
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.attached.as_deref()
    }

    pub fn redirect_level(&self) -> RedirectLevel {
        self.redirect_level
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        swap_active_log_file(self.previous_log_file.take());
    }
}

/// Record one line captured from a trainer output stream.
pub fn record_redirected(level: RedirectLevel, stream: &str, line: &str) {
    match level {
        RedirectLevel::Trace => tracing::trace!(target: REDIRECT_TARGET, "[{stream}] {line}"),
        RedirectLevel::Debug => tracing::debug!(target: REDIRECT_TARGET, "[{stream}] {line}"),
        RedirectLevel::Info => tracing::info!(target: REDIRECT_TARGET, "[{stream}] {line}"),
        RedirectLevel::Warn => tracing::warn!(target: REDIRECT_TARGET, "[{stream}] {line}"),
        RedirectLevel::Error => tracing::error!(target: REDIRECT_TARGET, "[{stream}] {line}"),
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

const DEFAULT_FILTER: &str = "info";

/// Parse `directive`, falling back to the default filter and returning the parse error.
fn build_env_filter(directive: &str) -> (EnvFilter, Option<ParseError>) {
    match EnvFilter::try_new(directive) {
        Ok(filter) => (filter, None),
        Err(err) => (EnvFilter::new(DEFAULT_FILTER), Some(err)),
    }
}

fn build_timer() -> OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
    const DISPLAY_FORMAT: &[FormatItem<'static>] = format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second],[subsecond digits:3]"
    );
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, DISPLAY_FORMAT.into())
}

/// Formats events as `<timestamp> - <target> - <fields>`.
struct DashFormat<T> {
    timer: T,
}

impl<T> DashFormat<T> {
    fn new(timer: T) -> Self {
        Self { timer }
    }
}

impl<S, N, T> FormatEvent<S, N> for DashFormat<T>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    T: FormatTime,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        self.timer.format_time(&mut writer)?;
        write!(writer, " - {} - ", event.metadata().target())?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
static SINK_TEST_LOCK: Mutex<()> = Mutex::new(());

/// Serializes tests that enter sinks, since the active log file is process-wide.
#[cfg(test)]
pub(crate) fn test_lock() -> std::sync::MutexGuard<'static, ()> {
    SINK_TEST_LOCK.lock().unwrap_or_else(|err| err.into_inner())
}
