//! Logging setup
//!
//! The engine logs through the `log` facade; binaries call [`init`] once.

pub use log::{debug, info, warn, error, trace, LevelFilter};

/// Initialize the logging system, honouring `RUST_LOG` and defaulting to `info`
pub fn init() {
    init_with_level(LevelFilter::Info);
}

/// Initialize logging with an explicit default level
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_with_level(level: LevelFilter) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(level)
        .parse_default_env()
        .format_timestamp_millis()
        .try_init();
}
