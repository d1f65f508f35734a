use std::fmt::{Debug, Formatter};

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::api::solis::ApiError;

pub const CONTENT_TYPE: &str = "application/json";

/// API key and secret issued by Solis Cloud.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    api_secret: String,
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("api_key", &self.api_key).finish_non_exhaustive()
    }
}

/// Header values of one signed request.
#[must_use]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignedHeaders {
    pub content_md5: String,
    pub date: String,
    pub authorization: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self { api_key: api_key.into(), api_secret: api_secret.into() }
    }

    /// Sign a `POST` of `body` to `path`.
    ///
    /// The same formatted `date` goes into the signed string and into the `Date` header.
    pub fn sign(&self, body: &str, date: DateTime<Utc>, path: &str) -> Result<SignedHeaders, ApiError> {
        let content_md5 = content_md5(body);
        let date = format_date(date);
        let canonical = format!("POST\n{content_md5}\n{CONTENT_TYPE}\n{date}\n{path}");
        let mut mac = Hmac::<Sha1>::new_from_slice(self.api_secret.as_bytes())
            .map_err(|_| ApiError::new("invalid API secret"))?;
        mac.update(canonical.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());
        let authorization = format!("API {}:{signature}", self.api_key);
        Ok(SignedHeaders { content_md5, date, authorization })
    }
}

/// Base64-encoded MD5 of the exact body bytes.
#[must_use]
pub fn content_md5(body: &str) -> String {
    STANDARD.encode(md5::compute(body.as_bytes()).0)
}

/// RFC 1123 date, always in GMT.
#[must_use]
pub fn format_date(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const BODY: &str = r#"{"inverterSn":"1031234567890","cid":636}"#;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 16, 9, 30, 0).unwrap()
    }

    #[test]
    fn content_md5_ok() {
        assert_eq!(content_md5(BODY), "iMnETUOyUrcPkgy59FG4Gw==");
    }

    #[test]
    fn format_date_ok() {
        assert_eq!(format_date(date()), "Thu, 16 Oct 2025 09:30:00 GMT");
    }

    #[test]
    fn sign_ok() {
        let headers = Credentials::new("key", "secret").sign(BODY, date(), "/v2/api/atRead").unwrap();
        assert_eq!(
            headers,
            SignedHeaders {
                content_md5: "iMnETUOyUrcPkgy59FG4Gw==".to_string(),
                date: "Thu, 16 Oct 2025 09:30:00 GMT".to_string(),
                authorization: "API key:DLX6bp7UopOD23Cc4as0khktMkg=".to_string(),
            },
        );
    }

    #[test]
    fn sign_is_deterministic() {
        let credentials = Credentials::new("key", "secret");
        let first = credentials.sign(BODY, date(), "/v2/api/control").unwrap();
        let second = credentials.sign(BODY, date(), "/v2/api/control").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn debug_hides_secret() {
        let debug = format!("{:?}", Credentials::new("key", "very-secret"));
        assert!(!debug.contains("very-secret"));
    }
}
