use std::sync::Once;

use tracing::{debug, info};
use tracing_subscriber::{
    filter::filter_fn,
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::error_channel;

static TEST_SETUP: Once = Once::new();

/// Install the error channel and a test subscriber (`RUST_LOG`, default
/// `debug`). Safe to call from every test.
pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        error_channel::init_once();
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    // error_channel logs every deliberately provoked failure
    let noisy_modules = ["yamltree::error_channel"];
    let module_filter = filter_fn(move |metadata| {
        !noisy_modules
            .iter()
            .any(|name| metadata.target().starts_with(name))
    });

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_test_writer()
            .with_target(true)
            .with_thread_names(false)
            .with_span_events(FmtSpan::ENTER)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(module_filter)
            .with_filter(env_filter),
    );

    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else if let Err(e) = subscriber.try_init() {
        eprintln!("Error: Failed to set up logging: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_test_setup_installs_channel_and_subscriber() {
        init_test_setup();
        init_test_setup();
        assert!(error_channel::is_installed());
        assert!(tracing::dispatcher::has_been_set());
    }
}
