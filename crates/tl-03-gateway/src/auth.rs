//! API-key authentication of submitting clients.
//!
//! The key is taken from `Authorization: Bearer <key>` or `X-API-Key` and
//! compared against every configured credential in constant time.

use axum::http::{header, HeaderMap};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::domain::config::ClientCredential;

pub struct ApiKeyAuthenticator {
    credentials: Vec<ClientCredential>,
}

impl ApiKeyAuthenticator {
    pub fn new(credentials: Vec<ClientCredential>) -> Self {
        Self { credentials }
    }

    /// Client id owning the presented key, if any.
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<String> {
        let presented = presented_key(headers)?;

        // Scan every credential so timing does not reveal which one matched.
        let mut matched = None;
        for credential in &self.credentials {
            if constant_time_compare(presented, &credential.api_key) {
                matched = Some(credential.client_id.clone());
            }
        }

        if matched.is_none() {
            debug!("Presented API key matches no client");
        }
        matched
    }
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(header::AUTHORIZATION) {
        if let Some(token) = value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
            return Some(token.trim());
        }
    }
    headers
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

/// Constant-time string comparison.
///
/// Both inputs are padded to the longer length with different fill bytes,
/// and the length check is folded in without branching.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    let max_len = std::cmp::max(a.len(), b.len());

    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);
    (lengths_equal & contents_equal).into()
}
