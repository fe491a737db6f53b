//! Log output for the relay.
//!
//! `RUST_LOG` wins when set. Otherwise both relay crates log at the level
//! given on the command line and everything else stays quiet.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber with `default_filter` as the fallback filter.
///
/// Text lines omit the target; `log_json` switches to one JSON object per line
/// for log shippers.
pub fn init_tracing(default_filter: &str, log_json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::new(filter_directive(
        std::env::var("RUST_LOG").ok().as_deref(),
        default_filter,
    ));
    if log_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

/// A set but blank `RUST_LOG` counts as unset.
fn filter_directive(rust_log: Option<&str>, default_filter: &str) -> String {
    match rust_log {
        Some(directive) if !directive.trim().is_empty() => directive.to_string(),
        _ => default_filter.to_string(),
    }
}

/// `cnterra_relay` and `cnterra_core` at `level`.
pub fn default_filter(level: &str) -> String {
    format!("cnterra_relay={level},cnterra_core={level}")
}
