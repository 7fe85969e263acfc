//! Upload-token signing.
//!
//! A token is `AccessKey:sign:encodedPolicy`, where `encodedPolicy` is the
//! URL-safe base64 of the JSON put policy and `sign` is the URL-safe base64
//! HMAC-SHA1 of `encodedPolicy` under the secret key.

use base64::{Engine, engine::general_purpose::URL_SAFE};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use std::time::Duration;

type HmacSha1 = Hmac<Sha1>;

/// Validity window of an upload token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Access/secret key pair.
#[derive(Clone)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// `AccessKey:urlsafe_b64(hmac_sha1(secret, data))`.
    pub fn sign(&self, data: &[u8]) -> String {
        let mut mac = HmacSha1::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(data);
        let digest = mac.finalize().into_bytes();
        format!("{}:{}", self.access_key, URL_SAFE.encode(digest))
    }

    /// Signs the base64 of `data` and appends it.
    pub fn sign_with_data(&self, data: &[u8]) -> String {
        let encoded = URL_SAFE.encode(data);
        format!("{}:{encoded}", self.sign(encoded.as_bytes()))
    }

    pub fn upload_token(&self, policy: &PutPolicy) -> Result<String, serde_json::Error> {
        Ok(self.sign_with_data(&serde_json::to_vec(policy)?))
    }

    /// Whether `token` was signed with these credentials.
    pub fn verify_upload_token(&self, token: &str) -> bool {
        match token.rsplit_once(':') {
            Some((signed, encoded)) => self.sign(encoded.as_bytes()) == signed,
            None => false,
        }
    }
}

/// The constraints an upload token carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutPolicy {
    /// `bucket` or `bucket:key`.
    pub scope: String,
    /// Unix seconds after which the token is refused.
    pub deadline: i64,
    /// JSON template the storage fills in and answers with.
    #[serde(
        rename = "returnBody",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub return_body: Option<String>,
}

impl PutPolicy {
    pub fn new(bucket: &str, now: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            scope: bucket.to_owned(),
            deadline: now.timestamp().saturating_add(ttl),
            return_body: None,
        }
    }

    pub fn with_return_body(mut self, return_body: impl Into<String>) -> Self {
        self.return_body = Some(return_body.into());
        self
    }

    pub fn bucket(&self) -> &str {
        self.scope
            .split_once(':')
            .map_or(self.scope.as_str(), |(bucket, _)| bucket)
    }
}

/// Splits a token into access key and policy, without checking the signature.
pub fn decode_upload_token(token: &str) -> Option<(String, PutPolicy)> {
    let mut parts = token.splitn(3, ':');
    let access_key = parts.next()?;
    let _sign = parts.next()?;
    let encoded = parts.next()?;
    let raw = URL_SAFE.decode(encoded).ok()?;
    let policy = serde_json::from_slice(&raw).ok()?;
    Some((access_key.to_owned(), policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn token_matches_reference_signature() {
        let credentials = Credentials::new("ak", "sk");
        let policy = PutPolicy::new("bucket", now(), DEFAULT_TOKEN_TTL);
        let token = credentials.upload_token(&policy).unwrap();

        assert_eq!(
            token,
            "ak:qqtMyvAKG1JblzO_V2SMZC_Sgas=:eyJzY29wZSI6ImJ1Y2tldCIsImRlYWRsaW5lIjoxNzAwMDAzNjAwfQ=="
        );
        assert!(credentials.verify_upload_token(&token));
        assert!(!Credentials::new("ak", "other").verify_upload_token(&token));
    }

    #[test]
    fn token_carries_deadline_and_return_body() {
        let credentials = Credentials::new("ak", "sk");
        let policy =
            PutPolicy::new("bucket", now(), DEFAULT_TOKEN_TTL).with_return_body(r#"{"k":"$(key)"}"#);
        let token = credentials.upload_token(&policy).unwrap();

        let (access_key, decoded) = decode_upload_token(&token).unwrap();
        assert_eq!(access_key, "ak");
        assert_eq!(decoded.deadline, 1_700_000_000 + 3600);
        assert_eq!(decoded.bucket(), "bucket");
        assert_eq!(decoded.return_body.as_deref(), Some(r#"{"k":"$(key)"}"#));
    }

    #[test]
    fn garbage_tokens_do_not_decode() {
        assert!(decode_upload_token("no-colons").is_none());
        assert!(decode_upload_token("ak:sig:!!!").is_none());
    }

    #[test]
    fn debug_hides_secret() {
        let debug = format!("{:?}", Credentials::new("ak", "super-secret"));
        assert!(!debug.contains("super-secret"));
    }
}
