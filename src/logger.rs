use tracing_subscriber::EnvFilter;

/// Environment variable that enables log output in tests.
pub const TEST_LOG_VAR: &str = "WATCHBOT_TEST_LOG";

/// Installs the global `tracing` subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_ansi(std::env::var_os("DISABLE_COLOR").is_none())
        .init();
    tracing::info!("initialized logging infra");
}

/// Enables logging if `WATCHBOT_TEST_LOG` is set. This can help with
/// debugging a test.
pub fn maybe_enable_test_logging() {
    use std::sync::Once;
    static DO_INIT: Once = Once::new();
    if std::env::var_os(TEST_LOG_VAR).is_some() {
        DO_INIT.call_once(|| {
            dotenvy::dotenv().ok();
            let _ = tracing_subscriber::fmt::Subscriber::builder()
                .with_env_filter(EnvFilter::from_env(TEST_LOG_VAR))
                .with_test_writer()
                .try_init();
        });
    }
}
