use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the caller's default parses.
const FALLBACK_FILTER: &str = "warn";

/// How log lines are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Human,
    Json,
}

/// Pick the filter: `env` (the `RUST_LOG` value) if it parses, then
/// `default_level`, then `warn`.
pub fn resolve_filter(env: Option<&str>, default_level: &str) -> EnvFilter {
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(default_level).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_FILTER))
}

/// Install the global subscriber. Everything goes to stderr; stdout is the
/// operator's terminal and, after a handoff, the remote shell's.
///
/// A second call is a no-op, so tests can call it freely.
pub fn init_logging(default_level: &str, format: LogFormat) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = resolve_filter(env.as_deref(), default_level);

    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let installed = match format {
        LogFormat::Human => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };

    if installed {
        tracing::debug!(?format, "logging initialised");
    }
}
