//! WHOIS backends for the expiry checker.
//!
//! Two implementations of [`WhoisSource`]:
//! - [`HttpWhoisSource`]: JSON WHOIS API over HTTP (default).
//! - [`TcpWhoisSource`]: plain port-43 client that follows the IANA referral.

use std::{sync::Arc, time::Duration};

use dwb_core::{
    checker::WhoisSource,
    config::{Config, WhoisBackend},
    Result,
};

mod http;
mod tcp;

pub use http::HttpWhoisSource;
pub use tcp::TcpWhoisSource;

/// Build the backend selected by `WHOIS_BACKEND`.
pub fn source_for(cfg: &Config) -> Result<Arc<dyn WhoisSource>> {
    let source: Arc<dyn WhoisSource> = match cfg.whois_backend {
        WhoisBackend::Http => Arc::new(HttpWhoisSource::new(
            &cfg.whois_api_url,
            cfg.whois_timeout,
        )?),
        WhoisBackend::Tcp => Arc::new(TcpWhoisSource::new(cfg.whois_timeout)),
    };
    tracing::info!(backend = ?cfg.whois_backend, "whois backend ready");
    Ok(source)
}

/// Timeouts shorter than this are bumped up; the checker applies the
/// configured one on top.
const MIN_IO_TIMEOUT: Duration = Duration::from_secs(1);

fn io_timeout(configured: Duration) -> Duration {
    configured.max(MIN_IO_TIMEOUT)
}
