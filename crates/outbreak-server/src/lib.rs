pub mod arena_loop;
pub mod arena_manager;
pub mod commands;
pub mod config;
pub mod error;
pub mod host;
pub mod maps;
pub mod state;
pub mod stats;

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Filters come from `RUST_LOG` (default
/// `info`); `OUTBREAK_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("OUTBREAK_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
