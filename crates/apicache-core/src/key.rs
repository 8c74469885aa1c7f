//! Cache key derivation.
//!
//! A key is `{method}-{url}-{body}` where `body` is the RFC 8785 canonical
//! JSON of the request body, or empty when there is none. Two requests are
//! "the same" for caching only if method, url and body all match.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::types::Method;

const SEPARATOR: &str = "-";

/// Derive the cache id for a request.
///
/// If `body` cannot be serialized, a random value takes its place so the
/// request can never hit or overwrite another request's entry.
pub fn derive_key<B>(method: Method, url: &str, body: Option<&B>) -> String
where
    B: Serialize,
{
    let body_str = match body {
        None => String::new(),
        Some(b) => body_string(b),
    };

    format!("{method}{SEPARATOR}{url}{SEPARATOR}{body_str}")
}

fn body_string<B: Serialize>(body: &B) -> String {
    match serde_jcs::to_string(body) {
        Ok(s) if s == "null" => String::new(),
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to serialize body for cache key, request will not be cached");
            format!("uncacheable:{}", uuid::Uuid::new_v4())
        }
    }
}

/// Convenience for the common JSON-body case.
pub fn derive_key_json(method: Method, url: &str, body: Option<&Value>) -> String {
    derive_key(method, url, body)
}
