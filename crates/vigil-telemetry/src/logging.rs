use env_logger::Env;

/// Install the process logger.
///
/// `default_filter` applies when `RUST_LOG` is unset. Calling this more than
/// once is harmless; later calls keep the first logger.
pub fn init_logging(default_filter: &str) {
    let result = env_logger::Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init();
    if result.is_ok() {
        log::debug!("Logger initialised (default filter: {})", default_filter);
    }
}

/// Logger for unit and integration tests; output is captured per test.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
