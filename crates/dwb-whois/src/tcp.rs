use std::{sync::OnceLock, time::Duration};

use async_trait::async_trait;
use dwb_core::checker::{ExpiryField, LookupError, WhoisRecord, WhoisSource};
use regex::Regex;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

const IANA_SERVER: &str = "whois.iana.org";
const WHOIS_PORT: u16 = 43;
const MAX_RESPONSE_BYTES: u64 = 256 * 1024;

/// Expiry labels in priority order.
const EXPIRY_LABELS: &[&str] = &[
    "registry expiry date",
    "registrar registration expiration date",
    "expiration date",
    "expiry date",
    "paid-till",
    "expires",
];

/// Native WHOIS client: asks IANA for the authoritative server, then queries it.
#[derive(Clone, Debug)]
pub struct TcpWhoisSource {
    root_server: String,
    port: u16,
    io_timeout: Duration,
}

impl TcpWhoisSource {
    pub fn new(timeout: Duration) -> Self {
        Self {
            root_server: IANA_SERVER.to_string(),
            port: WHOIS_PORT,
            io_timeout: super::io_timeout(timeout),
        }
    }

    async fn query(&self, server: &str, domain: &str) -> Result<String, LookupError> {
        let fut = async {
            let mut stream = TcpStream::connect((server, self.port))
                .await
                .map_err(|e| LookupError::Transport(format!("{server}: {e}")))?;
            stream
                .write_all(format!("{domain}\r\n").as_bytes())
                .await
                .map_err(|e| LookupError::Transport(format!("{server}: {e}")))?;

            let mut buf = Vec::new();
            stream
                .take(MAX_RESPONSE_BYTES)
                .read_to_end(&mut buf)
                .await
                .map_err(|e| LookupError::Transport(format!("{server}: {e}")))?;
            Ok(String::from_utf8_lossy(&buf).into_owned())
        };

        tokio::time::timeout(self.io_timeout, fut)
            .await
            .map_err(|_| LookupError::Timeout)?
    }
}

#[async_trait]
impl WhoisSource for TcpWhoisSource {
    async fn lookup(&self, domain: &str) -> Result<WhoisRecord, LookupError> {
        let root = self.query(&self.root_server, domain).await?;
        let text = match parse_referral(&root) {
            Some(server) if !server.eq_ignore_ascii_case(&self.root_server) => {
                tracing::debug!(domain = %domain, server = %server, "following whois referral");
                self.query(&server, domain).await?
            }
            _ => root,
        };
        Ok(parse_response(&text))
    }
}

fn referral_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)^\s*(?:refer|whois)\s*:\s*(\S+)").ok())
        .as_ref()
}

fn field_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*([A-Za-z][A-Za-z \-]*?)\s*:\s*(.*?)\s*$").ok())
        .as_ref()
}

fn dotted_date_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4})\.(\d{2})\.(\d{2})").ok())
        .as_ref()
}

/// The authoritative server named in an IANA answer.
pub(crate) fn parse_referral(text: &str) -> Option<String> {
    let caps = referral_re()?.captures(text)?;
    Some(caps[1].trim().to_string())
}

/// Pull the expiry date and registrar out of free-form WHOIS text.
pub(crate) fn parse_response(text: &str) -> WhoisRecord {
    let mut expiry_by_label: Vec<Option<String>> = vec![None; EXPIRY_LABELS.len()];
    let mut registrar = None;

    if let Some(re) = field_re() {
        for caps in re.captures_iter(text) {
            let label = caps[1].trim().to_ascii_lowercase();
            let value = caps[2].trim();
            if value.is_empty() {
                continue;
            }
            if label == "registrar" && registrar.is_none() {
                registrar = Some(value.to_string());
                continue;
            }
            if let Some(i) = EXPIRY_LABELS.iter().position(|l| *l == label) {
                if expiry_by_label[i].is_none() {
                    expiry_by_label[i] = Some(normalize_date(value));
                }
            }
        }
    }

    WhoisRecord {
        expiry: expiry_by_label.into_iter().flatten().next().map(ExpiryField::Single),
        registrar,
    }
}

/// `YYYY.MM.DD` → `YYYY-MM-DD`; anything else is left for the checker.
fn normalize_date(raw: &str) -> String {
    match dotted_date_re().and_then(|re| re.captures(raw)) {
        Some(c) => format!("{}-{}-{}", &c[1], &c[2], &c[3]),
        None => raw.to_string(),
    }
}
