//! Signed request assembly.

use chrono::Utc;
use mexcbot_core::Credentials;

use crate::endpoints::API_KEY_HEADER;
use crate::signing::{canonical_query, sign, Params};

/// Current time in milliseconds since the Unix epoch.
pub fn timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// A request ready to be sent: sorted parameters, their signature, and the
/// authentication headers.
///
/// The transmitted query string is produced from the same sorted map the
/// signature was computed over, so the two can never drift apart.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedRequest {
    pub path: &'static str,
    pub params: Params,
    pub signature: String,
    pub headers: Vec<(&'static str, String)>,
}

impl SignedRequest {
    /// `key=value&...&signature=<hex>`, exactly as sent.
    pub fn query_string(&self) -> String {
        let query = canonical_query(&self.params);
        if query.is_empty() {
            format!("signature={}", self.signature)
        } else {
            format!("{}&signature={}", query, self.signature)
        }
    }

    /// Full URL for `base`.
    pub fn url(&self, base: &str) -> String {
        format!("{}{}?{}", base.trim_end_matches('/'), self.path, self.query_string())
    }
}

/// Adds `timestamp` and `signature` to request parameters.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    credentials: Credentials,
}

impl RequestBuilder {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// Sign `params` for `path`, stamping them with the current time.
    ///
    /// The clock is read here, right before signing, to keep the window the
    /// exchange checks `timestamp` against as small as possible.
    pub fn build(&self, path: &'static str, params: Params) -> SignedRequest {
        self.build_at(path, params, timestamp_ms())
    }

    /// Sign `params` for `path` with an explicit timestamp.
    pub fn build_at(&self, path: &'static str, mut params: Params, timestamp: i64) -> SignedRequest {
        params.remove("signature");
        params.insert("timestamp".to_string(), timestamp.to_string());

        let signature = sign(self.credentials.api_secret.as_bytes(), &params);

        SignedRequest {
            path,
            params,
            signature,
            headers: vec![
                (API_KEY_HEADER, self.credentials.api_key.clone()),
                ("Content-Type", "application/json".to_string()),
            ],
        }
    }
}
