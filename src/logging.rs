//! Process-wide logger setup for the binary.

use log::LevelFilter;

/// Install `env_logger` with a single minimum level. Calling it twice is a
/// no-op.
pub fn init(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_secs()
        .format_target(false)
        .try_init();
}
