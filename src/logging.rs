// Logging initialisation.
//
// Structured logs go to stdout and to a daily file `binroute.log.YYYY-MM-DD`
// under `LOG_DIR` (default `./logs`). Shift and route changes log at info,
// every position tick and poll at debug:  `RUST_LOG=binroute=debug`

use tracing_appender::non_blocking;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn,tower=warn,tungstenite=warn";

// The returned guard flushes the file writer on drop; keep it in main.
pub fn init() -> non_blocking::WorkerGuard {
    let log_dir = std::env::var("LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
    let (file_writer, guard) = non_blocking(tracing_appender::rolling::daily(log_dir, "binroute.log"));

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    guard
}
