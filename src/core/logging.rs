//! Logging initialization

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG, e.g. `RUST_LOG=tunegrove=debug` for per-frame
/// batch summaries.
///
/// # Example
/// ```
/// tunegrove::core::logging::init();
/// log::info!("Flora layer started");
/// ```
pub fn init() {
    // try_init so tools and doctests can call this more than once
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    )
    .format_timestamp_millis()
    .try_init();
}
