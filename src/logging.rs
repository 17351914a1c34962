use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter for the chosen verbosity; `RUST_LOG` wins when set
fn env_filter(debug: bool, quiet: bool) -> EnvFilter {
    let default = if debug {
        "skillmine=debug"
    } else if quiet {
        "skillmine=error"
    } else {
        "skillmine=info"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialize logging to stderr, plus an optional plain-text log file.
///
/// The returned guard flushes the file writer and must live until exit.
pub fn init_logging(
    debug: bool,
    quiet: bool,
    log_file: Option<&Path>,
) -> anyhow::Result<Option<WorkerGuard>> {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_line_number(debug)
        .with_file(debug)
        .with_writer(std::io::stderr);

    let Some(log_path) = log_file else {
        tracing_subscriber::registry()
            .with(env_filter(debug, quiet))
            .with(fmt_layer)
            .init();
        return Ok(None);
    };

    let dir = match log_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let file_name = log_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log file path has no file name: {}", log_path.display()))?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter(debug, quiet))
        .with(fmt_layer)
        .with(file_layer)
        .init();

    Ok(Some(guard))
}
