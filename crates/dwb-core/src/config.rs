use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, repository::StoreLayout, scheduler::DailyTime, Result};

/// Which WHOIS adapter performs lookups.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WhoisBackend {
    /// JSON WHOIS API over HTTP.
    Http,
    /// Native WHOIS protocol (TCP port 43) with IANA referral.
    Tcp,
}

impl WhoisBackend {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "http" | "api" => Some(Self::Http),
            "tcp" | "whois" | "native" => Some(Self::Tcp),
            _ => None,
        }
    }
}

/// Display tier boundaries, in days.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierBounds {
    /// Expiry within this many days is "expiring soon" (red, digest-worthy).
    pub warning_days: i64,
    /// Expiry within this many days (but not soon) is yellow.
    pub attention_days: i64,
}

impl Default for TierBounds {
    fn default() -> Self {
        Self {
            warning_days: 31,
            attention_days: 60,
        }
    }
}

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,

    // Storage
    pub domains_file: PathBuf,
    pub users_file: PathBuf,
    pub store_layout: StoreLayout,

    // Expiry policy
    pub tiers: TierBounds,
    pub daily_check_time: DailyTime,

    // WHOIS
    pub whois_backend: WhoisBackend,
    pub whois_api_url: String,
    pub whois_timeout: Duration,
    pub max_concurrent_checks: usize,

    // Telegram limits
    pub telegram_safe_limit: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let domains_file = env_path("DOMAINS_FILE").unwrap_or_else(|| PathBuf::from("domains.json"));
        let users_file = env_path("USERS_FILE").unwrap_or_else(|| PathBuf::from("users.json"));
        let store_layout = match env_str("STORE_LAYOUT").and_then(non_empty) {
            Some(raw) => StoreLayout::parse(&raw)
                .ok_or_else(|| Error::Config(format!("invalid STORE_LAYOUT: {raw}")))?,
            None => StoreLayout::Grouped,
        };

        let defaults = TierBounds::default();
        let warning_days = env_i64("EXPIRY_WARNING_DAYS")?.unwrap_or(defaults.warning_days);
        let attention_days = env_i64("EXPIRY_ATTENTION_DAYS")?.unwrap_or(defaults.attention_days);
        if warning_days <= 0 {
            return Err(Error::Config(
                "EXPIRY_WARNING_DAYS must be positive".to_string(),
            ));
        }
        if attention_days < warning_days {
            return Err(Error::Config(format!(
                "EXPIRY_ATTENTION_DAYS ({attention_days}) must not be below EXPIRY_WARNING_DAYS ({warning_days})"
            )));
        }
        let tiers = TierBounds {
            warning_days,
            attention_days,
        };

        let daily_check_time = match env_str("DAILY_CHECK_TIME").and_then(non_empty) {
            Some(raw) => DailyTime::parse(&raw)?,
            None => DailyTime::new(9, 0)?,
        };

        let whois_backend = match env_str("WHOIS_BACKEND").and_then(non_empty) {
            Some(raw) => WhoisBackend::parse(&raw)
                .ok_or_else(|| Error::Config(format!("invalid WHOIS_BACKEND: {raw}")))?,
            None => WhoisBackend::Http,
        };
        let whois_api_url = env_str("WHOIS_API_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| "http://htmlweb.ru/analiz/api.php".to_string());
        let whois_timeout =
            Duration::from_millis(env_u64("WHOIS_TIMEOUT_MS")?.unwrap_or(15_000).max(1));
        let max_concurrent_checks = env_usize("MAX_CONCURRENT_CHECKS")?.unwrap_or(10).max(1);

        // Telegram hard limit is 4096; keep headroom for the header line.
        let telegram_safe_limit = env_usize("TELEGRAM_SAFE_LIMIT")?
            .unwrap_or(3900)
            .clamp(200, 4096);

        Ok(Self {
            telegram_bot_token,
            domains_file,
            users_file,
            store_layout,
            tiers,
            daily_check_time,
            whois_backend,
            whois_api_url,
            whois_timeout,
            max_concurrent_checks,
            telegram_safe_limit,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    let Some(raw) = env_str(key).and_then(non_empty) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("invalid {key}: {raw}")))
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    env_parsed(key)
}

fn env_i64(key: &str) -> Result<Option<i64>> {
    env_parsed(key)
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    env_parsed(key)
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
