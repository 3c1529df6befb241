use std::{path::Path, sync::LazyLock};

use anyhow::{anyhow, Result};
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{fmt::writer::MakeWriterExt, EnvFilter};

pub const CLI_PREFIX: &str = "planner";

const KEPT_LOG_FILES: usize = 5;

/// Only the planner's own events are logged. An explicit level wins over `RUST_LOG`, and
/// without either `info` is used.
fn planner_filter(log_level: Option<LevelFilter>) -> EnvFilter {
    let level = match log_level {
        Some(level) => level.to_string(),
        None => std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    };
    EnvFilter::new(format!("{}={level}", env!("CARGO_CRATE_NAME")))
}

/// Logs go into daily rotated files under `<data dir>/logs`. Console output is opt in, the
/// planner prints days to stdout and logs would get mixed into them.
pub fn enable_logging(
    prefix: &str,
    data_dir: &Path,
    log_level: Option<LevelFilter>,
    show_std: bool,
) -> Result<()> {
    let files = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(KEPT_LOG_FILES)
        .filename_prefix(prefix)
        .build(data_dir.join("logs"))?;
    let console = std::io::stdout.with_filter(move |_| show_std);

    tracing_subscriber::fmt()
        .with_env_filter(planner_filter(log_level))
        .with_writer(console.and(files))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("Logging is already set up: {e}"))
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .try_init();
});
