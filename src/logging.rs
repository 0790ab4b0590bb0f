use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_DIR: &str = "logs";
pub const LOG_FILE: &str = "clusterseeker.log";

/// Installs the global subscriber: stdout plus a daily rotated file under
/// `./logs`. Keep the returned guards alive until exit so buffered lines
/// get flushed.
pub fn init() -> (WorkerGuard, WorkerGuard) {
    std::fs::create_dir_all(LOG_DIR).ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily(LOG_DIR, LOG_FILE);
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    (stdout_guard, file_guard)
}
