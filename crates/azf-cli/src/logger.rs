//! Tracing setup for internal diagnostics.
//!
//! User-facing progress goes through `azf_bundler::Logger`. This subscriber
//! only renders the library's `tracing` events (esbuild command lines,
//! watcher activity), which stay hidden unless `--verbose` or `RUST_LOG`
//! asks for them.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "azf_bundler=warn,azf_cli=warn";

/// Filter used with `--verbose`.
const VERBOSE_FILTER: &str = "azf_bundler=debug,azf_cli=debug";

/// Initialize the global tracing subscriber.
///
/// # Arguments
///
/// * `verbose` - Debug level for azf crates (overrides `RUST_LOG`)
/// * `no_color` - Disable ANSI colors
pub fn init_logger(verbose: bool, no_color: bool) {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr)
        .compact();

    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

/// Check if colored output should be enabled.
///
/// `NO_COLOR` disables colors, `FORCE_COLOR` forces them, otherwise the
/// terminal decides.
pub fn should_use_colors() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stderr().features().colors_supported()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_parse() {
        let _ = EnvFilter::new(DEFAULT_FILTER);
        let _ = EnvFilter::new(VERBOSE_FILTER);
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        init_logger(false, true);
        init_logger(true, true);
    }
}
