//! Expiry checker: one WHOIS lookup per domain, normalized into a `DomainInfo`.
//!
//! Lookup and parse failures are values (`DomainInfo::error`), never faults, so
//! callers can display failures alongside successes.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

use crate::config::TierBounds;

const SECS_PER_DAY: i64 = 86_400;

// ============== WHOIS port ==============

/// Raw expiry field as returned by a WHOIS backend.
///
/// Some backends return several candidate dates; the first one wins.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpiryField {
    Single(String),
    Many(Vec<String>),
}

impl ExpiryField {
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(s) => Some(s.as_str()),
            Self::Many(xs) => xs.first().map(String::as_str),
        }
    }
}

/// What a WHOIS backend knows about one domain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WhoisRecord {
    pub expiry: Option<ExpiryField>,
    pub registrar: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    #[error("timed out")]
    Timeout,

    #[error("HTTP {0}")]
    Http(u16),

    #[error("{0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("expiry date not found")]
    DateNotFound,

    #[error("unrecognized date format: {0}")]
    UnparsedDate(String),

    #[error("check aborted: {0}")]
    Aborted(String),
}

impl LookupError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Hexagonal port for WHOIS backends (HTTP API, native port-43 client, fakes).
#[async_trait]
pub trait WhoisSource: Send + Sync {
    async fn lookup(&self, domain: &str) -> std::result::Result<WhoisRecord, LookupError>;
}

// ============== Results ==============

/// Freshness tier used for display.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Red,
    Yellow,
    Green,
}

impl Tier {
    /// Tiers are evaluated in order: red (expiring soon, incl. expired),
    /// yellow (within `attention_days`), green.
    pub fn classify(days_left: i64, bounds: TierBounds) -> Self {
        if days_left < bounds.warning_days {
            Self::Red
        } else if days_left <= bounds.attention_days {
            Self::Yellow
        } else {
            Self::Green
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Red => "🔴",
            Self::Yellow => "🟡",
            Self::Green => "🟢",
        }
    }
}

/// Result of one expiry check. Produced fresh per check, never cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainInfo {
    pub domain: String,
    pub expiry_date: Option<NaiveDate>,
    /// Negative once the domain has expired.
    pub days_left: Option<i64>,
    pub registrar: Option<String>,
    pub is_expiring_soon: bool,
    pub error: Option<LookupError>,
}

impl DomainInfo {
    pub fn failed(domain: &str, error: LookupError, registrar: Option<String>) -> Self {
        Self {
            domain: domain.to_string(),
            expiry_date: None,
            days_left: None,
            registrar,
            is_expiring_soon: false,
            error: Some(error),
        }
    }

    pub fn tier(&self, bounds: TierBounds) -> Option<Tier> {
        if self.error.is_some() {
            return None;
        }
        self.days_left.map(|d| Tier::classify(d, bounds))
    }
}

// ============== Checker ==============

#[derive(Clone)]
pub struct ExpiryChecker {
    source: Arc<dyn WhoisSource>,
    bounds: TierBounds,
    timeout: Duration,
}

impl ExpiryChecker {
    pub fn new(source: Arc<dyn WhoisSource>, bounds: TierBounds, timeout: Duration) -> Self {
        Self {
            source,
            bounds,
            timeout,
        }
    }

    pub fn bounds(&self) -> TierBounds {
        self.bounds
    }

    pub async fn check(&self, domain: &str) -> DomainInfo {
        self.check_at(domain, Local::now().naive_local()).await
    }

    pub async fn check_at(&self, domain: &str, now: NaiveDateTime) -> DomainInfo {
        let res = tokio::time::timeout(self.timeout, self.source.lookup(domain)).await;
        let record = match res {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                tracing::warn!(domain = %domain, error = %e, "whois lookup failed");
                return DomainInfo::failed(domain, e, None);
            }
            Err(_) => {
                tracing::warn!(domain = %domain, timeout_ms = self.timeout.as_millis() as u64, "whois lookup timed out");
                return DomainInfo::failed(domain, LookupError::Timeout, None);
            }
        };

        let info = classify(domain, record, self.bounds, now);
        tracing::debug!(domain = %domain, days_left = ?info.days_left, "checked domain");
        info
    }
}

/// Turn a raw WHOIS record into a `DomainInfo` relative to `now`.
pub fn classify(
    domain: &str,
    record: WhoisRecord,
    bounds: TierBounds,
    now: NaiveDateTime,
) -> DomainInfo {
    let WhoisRecord { expiry, registrar } = record;
    let registrar = registrar
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());

    let Some(raw) = expiry.as_ref().and_then(ExpiryField::first).map(str::trim) else {
        return DomainInfo::failed(domain, LookupError::DateNotFound, registrar);
    };
    if raw.is_empty() {
        return DomainInfo::failed(domain, LookupError::DateNotFound, registrar);
    }

    let Some(expiry_date) = parse_expiry_date(raw) else {
        return DomainInfo::failed(domain, LookupError::UnparsedDate(raw.to_string()), registrar);
    };

    let days_left = days_until(expiry_date, now);
    DomainInfo {
        domain: domain.to_string(),
        expiry_date: Some(expiry_date),
        days_left: Some(days_left),
        registrar,
        is_expiring_soon: days_left < bounds.warning_days,
        error: None,
    }
}

/// Parse `DD.MM.YYYY`, `YYYY-MM-DD`, or an ISO-8601 timestamp starting with
/// `YYYY-MM-DD`.
pub fn parse_expiry_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%d.%m.%Y") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    let head = raw.get(..10)?;
    let rest = &raw[10..];
    if rest.starts_with('T') || rest.starts_with(' ') {
        return NaiveDate::parse_from_str(head, "%Y-%m-%d").ok();
    }
    None
}

/// Whole days from `now` until the start of `expiry` (local midnight),
/// floored, so a domain expiring later today is 0 and one that expired
/// yesterday is -1 or less.
pub fn days_until(expiry: NaiveDate, now: NaiveDateTime) -> i64 {
    let midnight = expiry.and_time(NaiveTime::MIN);
    (midnight - now).num_seconds().div_euclid(SECS_PER_DAY)
}
