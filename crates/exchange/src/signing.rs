//! HMAC-SHA256 request signing.
//!
//! The exchange authenticates a request by recomputing the HMAC of its
//! canonical query string: parameter names sorted ascending, each rendered as
//! `key=value`, pairs joined with `&`. The digest is sent as lowercase hex.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

/// Request parameters. The map keeps names sorted, which is the canonical order.
pub type Params = BTreeMap<String, String>;

/// Render parameters as the canonical `key=value&...` string.
pub fn canonical_query(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Sign `params` with `secret`. Returns the lowercase hex digest.
pub fn sign(secret: &[u8], params: &Params) -> String {
    sign_query(secret, &canonical_query(params))
}

/// Sign an already canonicalized query string.
pub fn sign_query(secret: &[u8], query: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take any size");
    mac.update(query.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
