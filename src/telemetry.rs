//! Telemetry initialization.
//!
//! Controlled by `GITSHELF_LOG`:
//! - unset or empty → no subscriber (events are dropped, zero overhead)
//! - `"json"` → JSON events to stderr, filtered by `RUST_LOG` (default `info`)
//! - anything else → an [`EnvFilter`] directive such as
//!   `gitshelf=debug,gitshelf_git=trace`, human-readable on stderr
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the embedding program or test.

use tracing_subscriber::EnvFilter;

/// Name of the controlling environment variable.
pub const LOG_ENV: &str = "GITSHELF_LOG";

/// Install a global subscriber according to `GITSHELF_LOG`.
///
/// Safe to call more than once: if a global subscriber is already set, the
/// call does nothing and returns `false`.
pub fn init() -> bool {
    let setting = std::env::var(LOG_ENV).ok();
    match setting.as_deref() {
        None | Some("") => false,
        Some("json") => init_json(),
        Some(directives) => init_pretty(directives),
    }
}

/// JSON events to stderr via tracing-subscriber's JSON formatter.
fn init_json() -> bool {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .try_init()
        .is_ok()
}

/// Human-readable events to stderr, filtered by `directives`.
fn init_pretty(directives: &str) -> bool {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let filter = EnvFilter::try_new(directives).unwrap_or_else(|e| {
        eprintln!("warning: invalid {LOG_ENV} directive {directives:?}: {e}");
        EnvFilter::new("info")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok()
}
