use tracing_subscriber::EnvFilter;

use crate::args::LogArgs;

/// Install the stderr subscriber.
///
/// `--log-level` wins, then `--debug`, then `--verbose`; with none of them
/// `RUST_LOG` is honored and the fallback is `warn`.
pub fn init(log: &LogArgs) {
    let filter = match filter_directive(log) {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

pub fn filter_directive(log: &LogArgs) -> Option<&'static str> {
    if let Some(level) = log.log_level {
        Some(level.directive())
    } else if log.debug {
        Some("debug")
    } else if log.verbose {
        Some("info")
    } else {
        None
    }
}
