pub mod admin; // privileged client + role/certification actions
pub mod api; // admin HTTP surface
pub mod backend;
pub mod config;
pub mod images;
pub mod imaging;
pub mod models;
pub mod policy; // row access policy catalogue
pub mod status;
pub mod ui;
pub mod verify; // sign-in → profile → organization check

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Logs go to stderr so JSON reports on stdout stay clean.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
