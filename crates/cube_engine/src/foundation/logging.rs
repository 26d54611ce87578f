//! Logging setup

pub use log::{debug, error, info, trace, warn};

/// Install `env_logger` with an `info` default that `RUST_LOG` overrides
pub fn init() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}
