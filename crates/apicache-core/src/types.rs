//! Request and response types shared by the dispatcher, executors and bridge.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default freshness window in minutes.
pub const DEFAULT_CACHE_DURATION_MINUTES: u64 = 60;

/// HTTP verb. Serialized uppercase; any case is accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }

    /// Safe to repeat without changing server state beyond the first call.
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Self::Get | Self::Head | Self::Put | Self::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            other => Err(format!("unsupported HTTP method: {}", other)),
        }
    }
}

impl<'de> Deserialize<'de> for Method {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl From<Method> for reqwest::Method {
    fn from(m: Method) -> Self {
        match m {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
        }
    }
}

/// Header map sent with a request. Ordered so logs and payloads are stable.
pub type Headers = BTreeMap<String, String>;

/// Per-call options recognised by the public operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Consult and populate the cache (GET only).
    pub use_cache: bool,

    /// Freshness window for a cached GET.
    pub cache_duration_minutes: u64,

    /// Extra request headers.
    pub headers: Headers,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            use_cache: true,
            cache_duration_minutes: DEFAULT_CACHE_DURATION_MINUTES,
            headers: Headers::new(),
        }
    }
}

impl RequestOptions {
    pub fn no_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn with_cache_duration_minutes(mut self, minutes: u64) -> Self {
        self.cache_duration_minutes = minutes;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// A full request as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub url: String,
    pub method: Method,
    pub data: Option<Value>,
    pub headers: Headers,
    pub use_cache: bool,
    pub cache_duration_minutes: u64,
}

impl ApiRequest {
    /// A GET with default options.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn new(method: Method, url: impl Into<String>) -> Self {
        let options = RequestOptions::default();
        Self {
            url: url.into(),
            method,
            data: None,
            headers: options.headers,
            use_cache: options.use_cache,
            cache_duration_minutes: options.cache_duration_minutes,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.headers = options.headers;
        self.use_cache = options.use_cache;
        self.cache_duration_minutes = options.cache_duration_minutes;
        self
    }

    /// Freshness window in milliseconds.
    pub fn ttl_millis(&self) -> i64 {
        let millis = self.cache_duration_minutes.saturating_mul(60_000);
        i64::try_from(millis).unwrap_or(i64::MAX)
    }

    /// Only GETs with caching enabled touch the cache.
    pub fn is_cacheable(&self) -> bool {
        self.method == Method::Get && self.use_cache
    }

    /// The part of the request that crosses into a network executor.
    pub fn to_network(&self) -> NetworkRequest {
        NetworkRequest {
            url: self.url.clone(),
            method: self.method,
            data: self.data.clone(),
            headers: self.headers.clone(),
        }
    }
}

/// What a network executor needs to perform one call.
///
/// This is also the `fetch-remote-data` bridge payload, so field names
/// follow the wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRequest {
    pub url: String,

    #[serde(default)]
    pub method: Method,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default)]
    pub headers: Headers,
}

/// Result envelope returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    /// Response body.
    pub data: Value,

    /// Whether `data` came from the cache.
    pub from_cache: bool,

    /// Milliseconds since epoch: the stored timestamp on a hit, the
    /// fetch time otherwise.
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_deserializes_any_case() {
        for raw in ["get", "Get", "GET"] {
            let m: Method = serde_json::from_value(Value::String(raw.into())).unwrap();
            assert_eq!(m, Method::Get);
        }
        let req: NetworkRequest =
            serde_json::from_value(serde_json::json!({"url": "/x", "method": "delete"})).unwrap();
        assert_eq!(req.method, Method::Delete);
        assert_eq!(serde_json::to_value(Method::Delete).unwrap(), "DELETE");

        let err = serde_json::from_value::<Method>(Value::String("brew".into())).unwrap_err();
        assert!(err.to_string().contains("unsupported HTTP method"));
    }

    #[test]
    fn test_request_defaults() {
        let req = ApiRequest::get("/users");
        assert_eq!(req.method, Method::Get);
        assert!(req.use_cache);
        assert_eq!(req.cache_duration_minutes, 60);
        assert_eq!(req.ttl_millis(), 3_600_000);
        assert!(req.data.is_none());
        assert!(req.is_cacheable());
    }

    #[test]
    fn test_mutations_are_not_cacheable() {
        for method in [Method::Post, Method::Put, Method::Delete, Method::Patch] {
            assert!(!ApiRequest::new(method, "/users").is_cacheable());
        }
        assert!(!ApiRequest::get("/users")
            .with_options(RequestOptions::default().no_cache())
            .is_cacheable());
    }

    #[test]
    fn test_method_parse() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        assert!("TRACE".parse::<Method>().is_err());
    }

    #[test]
    fn test_network_request_wire_defaults() {
        let req: NetworkRequest =
            serde_json::from_value(serde_json::json!({"url": "https://api.test/users"})).unwrap();
        assert_eq!(req.method, Method::Get);
        assert!(req.data.is_none());
        assert!(req.headers.is_empty());
    }

    #[test]
    fn test_response_envelope_field_names() {
        let resp = ApiResponse {
            data: serde_json::json!([1, 2]),
            from_cache: true,
            timestamp: 42,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["fromCache"], true);
        assert_eq!(json["timestamp"], 42);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let req = ApiRequest::get("/x")
            .with_options(RequestOptions::default().with_cache_duration_minutes(u64::MAX));
        assert_eq!(req.ttl_millis(), i64::MAX);
    }
}
