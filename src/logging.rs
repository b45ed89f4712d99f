//! Logging backend for the `log` facade
//!
//! Records from `log` are bridged into a `tracing-subscriber` registry with
//! two fmt layers. Lines look like `2026-01-31T12:00:00.000Z INFO  message`.
//! Everything down to debug goes to the optional debug log file; stderr only
//! gets warnings and errors unless verbose output was requested.

use std::fmt;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use log::info;
use tracing::{Event, Subscriber};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// `<RFC 3339 UTC timestamp> <LEVEL padded to 5> <message>`
struct AgentLine;

impl<S, N> FormatEvent<S, N> for AgentLine
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        write!(
            writer,
            "{} {:<5} ",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn stderr_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    }
}

/// Registry with a stderr layer and, when `debug_log` is set, a file layer
fn subscriber(verbose: bool, debug_log: Option<&Path>) -> Result<impl Subscriber + Send + Sync + 'static> {
    let file_layer = debug_log
        .map(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open debug log {}", path.display()))
        })
        .transpose()?
        .map(|file| {
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .event_format(AgentLine)
                .with_filter(LevelFilter::DEBUG)
        });

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(false)
        .event_format(AgentLine)
        .with_filter(stderr_level(verbose));

    Ok(tracing_subscriber::registry().with(stderr_layer).with(file_layer))
}

/// Set up logging for the command-line tool
pub fn init(verbose: bool, debug_log: Option<&Path>) -> Result<()> {
    subscriber(verbose, debug_log)?
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to set logger: {}", e))
}

/// Logs `=== Begin <name> ===` now and the end with its duration on drop
pub struct LogScope {
    name: String,
    started: Instant,
}

impl LogScope {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        info!("=== Begin {} ===", name);
        Self {
            name,
            started: Instant::now(),
        }
    }
}

impl Drop for LogScope {
    fn drop(&mut self) {
        info!(
            "=== End {} (Duration: {}ms) ===",
            self.name,
            self.started.elapsed().as_millis()
        );
    }
}
