//! Environment-driven connection configuration

use weir_core::{ConnectionError, Result};

/// Environment variable holding the PostgreSQL connection URI.
pub const DATABASE_URL_VAR: &str = "POSTGRES_DB_URL";

/// TCP keepalive settings appended to every connection URI so idle pooled
/// connections survive NAT gateways and load balancers.
const KEEPALIVE_PARAMS: &str =
    "keepalives=1&keepalives_idle=30&keepalives_interval=10&keepalives_count=5";

/// Read the connection URI from [`DATABASE_URL_VAR`] and append the
/// keepalive parameters.
///
/// An unset or empty variable is a
/// [`MissingConfig`](weir_core::ConnectionErrorKind::MissingConfig) error.
pub fn database_url() -> Result<String> {
    match std::env::var(DATABASE_URL_VAR) {
        Ok(url) if !url.is_empty() => Ok(append_keepalives(&url)),
        _ => Err(ConnectionError::MissingConfig(format!(
            "{DATABASE_URL_VAR} is not set"
        ))),
    }
}

/// Splice the keepalive parameters onto `url`.
///
/// A URI already ending in `?` or `&` takes the parameters directly;
/// otherwise a `?` separator is inserted first.
fn append_keepalives(url: &str) -> String {
    if url.ends_with('?') || url.ends_with('&') {
        format!("{url}{KEEPALIVE_PARAMS}")
    } else {
        format!("{url}?{KEEPALIVE_PARAMS}")
    }
}
