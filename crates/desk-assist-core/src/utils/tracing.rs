use std::io;
use std::path::Path;

use chrono::Local;
use tracing_appender::rolling;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

use crate::config::ConfigPaths;

/// Initialize tracing with a file logger named after the start time.
/// The filter is read from the `RUST_LOG` environment variable.
///
/// Logs go to `log_dir` if given, otherwise to `logs/` under the user data
/// directory. Without either, they go to stdout.
pub fn init_tracing(log_dir: Option<&Path>) -> io::Result<()> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let log_dir = log_dir
        .map(Path::to_path_buf)
        .or_else(|| ConfigPaths::user_data_dir().map(|dir| dir.join("logs")));

    if let Some(log_dir) = log_dir {
        std::fs::create_dir_all(&log_dir)?;
        let file_name = format!("{timestamp}.log");
        let file_appender = rolling::never(&log_dir, &file_name);

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::Layer::new()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_span_events(FmtSpan::CLOSE)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(EnvFilter::from_default_env());
        tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

        tracing::debug!(
            target: "desk_assist_core::utils::tracing",
            path = %log_dir.join(file_name).display(),
            "Tracing initialized with file output. Filter configured via RUST_LOG env var."
        );
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(fmt::Layer::default().with_ansi(true).with_target(true))
            .with(EnvFilter::from_default_env());
        tracing::subscriber::set_global_default(subscriber).map_err(io::Error::other)?;

        tracing::debug!(
            target: "desk_assist_core::utils::tracing",
            "Tracing initialized with stdout output. Filter configured via RUST_LOG env var."
        );
    }

    Ok(())
}
