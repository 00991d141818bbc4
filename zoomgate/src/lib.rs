pub mod auth;
pub mod backends;
pub mod config;
pub mod database;
pub mod diagnostics;
pub mod error;
pub mod query_builder;
pub mod record;
pub mod resultset;
pub mod rpn;
pub mod session;
pub mod sort;
pub mod wire;

pub use backends::{BackendConnection, ConnectionManager};
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use record::RecordSyntax;
pub use resultset::{ResultSet, ResultSetRegistry};
pub use rpn::RpnNode;
pub use session::Session;
pub use wire::Worker;

/// Install the crate's `tracing` subscriber from `RUST_LOG` (`info` by
/// default). Idempotent: safe to call from every embedding binary without
/// double-initializing the global subscriber.
pub fn init_tracing() {
    use once_cell::sync::OnceCell;
    use tracing_subscriber::{fmt, EnvFilter};

    static TRACING: OnceCell<()> = OnceCell::new();
    TRACING.get_or_init(|| {
        let _ = fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with_target(false)
            .try_init();
    });
}
