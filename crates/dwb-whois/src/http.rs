use std::time::Duration;

use async_trait::async_trait;
use dwb_core::{
    checker::{ExpiryField, LookupError, WhoisRecord, WhoisSource},
    errors::Error,
    Result,
};
use serde_json::Value;

/// JSON WHOIS API client: `GET {base}?whois&url={domain}&json`.
///
/// The expiry date is read from `paid` (a string, or an array whose first
/// element wins) and the registrar from `registrar`.
#[derive(Clone, Debug)]
pub struct HttpWhoisSource {
    base_url: reqwest::Url,
    http: reqwest::Client,
}

impl HttpWhoisSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = reqwest::Url::parse(base_url.trim())
            .map_err(|e| Error::Config(format!("WHOIS_API_URL is not a valid URL: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(super::io_timeout(timeout))
            .build()
            .map_err(|e| Error::External(format!("whois http client error: {e}")))?;
        Ok(Self { base_url, http })
    }

    /// The domain is form-encoded, so it can never add query parameters.
    fn url_for(&self, domain: &str) -> reqwest::Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .clear()
            .append_key_only("whois")
            .append_pair("url", domain)
            .append_key_only("json");
        url
    }
}

#[async_trait]
impl WhoisSource for HttpWhoisSource {
    async fn lookup(&self, domain: &str) -> std::result::Result<WhoisRecord, LookupError> {
        let resp = self
            .http
            .get(self.url_for(domain))
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LookupError::Http(status.as_u16()));
        }

        let body = resp.text().await.map_err(transport_error)?;
        parse_body(&body)
    }
}

fn transport_error(e: reqwest::Error) -> LookupError {
    if e.is_timeout() {
        LookupError::Timeout
    } else {
        LookupError::Transport(e.to_string())
    }
}

/// Decode an API response body into a [`WhoisRecord`].
///
/// A missing `paid` field is not an error here; the checker reports it as
/// "date not found". An `error` field with no `paid` is surfaced as-is.
pub(crate) fn parse_body(body: &str) -> std::result::Result<WhoisRecord, LookupError> {
    let v: Value = serde_json::from_str(body.trim())
        .map_err(|e| LookupError::Malformed(e.to_string()))?;
    let Some(obj) = v.as_object() else {
        return Err(LookupError::Malformed("expected a JSON object".to_string()));
    };

    let expiry = match obj.get("paid") {
        Some(Value::String(s)) => Some(ExpiryField::Single(s.clone())),
        Some(Value::Array(xs)) => Some(ExpiryField::Many(
            xs.iter().filter_map(|x| x.as_str().map(str::to_string)).collect(),
        )),
        _ => None,
    };

    if expiry.is_none() {
        if let Some(err) = obj.get("error").and_then(Value::as_str) {
            return Err(LookupError::Transport(err.to_string()));
        }
    }

    let registrar = obj
        .get("registrar")
        .and_then(Value::as_str)
        .map(str::to_string);

    Ok(WhoisRecord { expiry, registrar })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_paid_and_registrar() {
        let rec = parse_body(r#"{"paid":"09.03.2027","registrar":"REGRU-RU","other":1}"#).unwrap();
        assert_eq!(rec.expiry, Some(ExpiryField::Single("09.03.2027".to_string())));
        assert_eq!(rec.registrar.as_deref(), Some("REGRU-RU"));
    }

    #[test]
    fn paid_may_be_a_list() {
        let rec = parse_body(r#"{"paid":["2027-03-09","2028-01-01"]}"#).unwrap();
        assert_eq!(rec.expiry.as_ref().and_then(ExpiryField::first), Some("2027-03-09"));
        assert!(rec.registrar.is_none());
    }

    #[test]
    fn missing_paid_is_not_a_transport_error() {
        let rec = parse_body(r#"{"registrar":"X"}"#).unwrap();
        assert!(rec.expiry.is_none());
    }

    #[test]
    fn api_error_and_garbage() {
        assert_eq!(
            parse_body(r#"{"error":"limit exceeded"}"#),
            Err(LookupError::Transport("limit exceeded".to_string()))
        );
        assert!(matches!(parse_body("<html>"), Err(LookupError::Malformed(_))));
        assert!(matches!(parse_body("[1,2]"), Err(LookupError::Malformed(_))));
    }

    #[test]
    fn builds_query_url() {
        let src = HttpWhoisSource::new("http://htmlweb.ru/analiz/api.php", Duration::from_secs(5))
            .unwrap();
        assert_eq!(
            src.url_for("example.com").as_str(),
            "http://htmlweb.ru/analiz/api.php?whois&url=example.com&json"
        );
    }

    #[test]
    fn domain_cannot_inject_query_parameters() {
        let src = HttpWhoisSource::new("http://htmlweb.ru/analiz/api.php", Duration::from_secs(5))
            .unwrap();
        let url = src.url_for("a.com&x=1");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("whois".to_string(), String::new()),
                ("url".to_string(), "a.com&x=1".to_string()),
                ("json".to_string(), String::new()),
            ]
        );
        assert!(url.as_str().contains("url=a.com%26x%3D1"));
    }

    #[test]
    fn rejects_unparseable_base_url() {
        assert!(matches!(
            HttpWhoisSource::new("not a url", Duration::from_secs(5)),
            Err(Error::Config(_))
        ));
    }
}
