//! provides logging helpers

use std::env;
use std::path::Path;
use std::sync::OnceLock;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

const DEFAULT_LOG_PREFIX: &str = "carbon-aware.log";
const ENABLE_LOG_ENV_VAR: &str = "CARBON_AWARE_ENABLE_LOG";
const LOG_PATH_ENV_VAR: &str = "CARBON_AWARE_LOG_PATH";
const LOG_LEVEL_ENV_VAR: &str = "CARBON_AWARE_LOG_LEVEL";
const LOG_OFF: &str = "off";

static LOG_WORKER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Build the fmt layer for the global subscriber.
///
/// Logs go to stdout unless `CARBON_AWARE_LOG_PATH` points at a file
/// or directory, in which case a daily-rolling appender is used.
pub fn get_fmt_layer() -> Box<dyn tracing_subscriber::Layer<Registry> + Send + Sync> {
    let filter = match env::var(ENABLE_LOG_ENV_VAR).as_deref() {
        Ok(LOG_OFF) | Ok("0") | Ok("false") => EnvFilter::new(LOG_OFF),
        _ => EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .with_env_var(LOG_LEVEL_ENV_VAR)
            .from_env_lossy(),
    };

    let fmt_layer = match env::var(LOG_PATH_ENV_VAR) {
        Ok(path) => {
            let path = Path::new(&path);
            let is_dir = path.is_dir();
            let (base_dir, prefix) = if is_dir {
                (path, DEFAULT_LOG_PREFIX)
            } else {
                (
                    path.parent().unwrap_or_else(|| Path::new(".")),
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or(DEFAULT_LOG_PREFIX),
                )
            };

            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(prefix)
                .max_log_files(7)
                .build(base_dir)
                .expect("failed to create rolling file appender");

            let (file_writer, guard) = tracing_appender::non_blocking(appender);

            // keep non blocking write thread alive in global scope
            LOG_WORKER_GUARD
                .set(guard)
                .expect("failed to set log worker guard");

            layer()
                .with_writer(file_writer)
                .with_target(true)
                .with_ansi(false)
                .boxed()
        }
        _ => layer()
            .with_writer(std::io::stdout)
            .with_target(true)
            .boxed(),
    };

    fmt_layer.with_filter(filter).boxed()
}

/// Initiate the global tracing subscriber.
pub fn init() {
    let fmt_layer = get_fmt_layer();
    registry().with(fmt_layer).init();
}
