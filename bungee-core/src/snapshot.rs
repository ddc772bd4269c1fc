//! `RequestSnapshot`: the one-per-client-request, immutable-after
//! construction record that is the sole source of truth for every failover
//! attempt. The driver reads the client request exactly once and fully
//! buffers the body into this struct; every retry synthesizes its working
//! copy from here instead of re-reading the original request.

use reqwest::header::HeaderMap;
use reqwest::Method;

/// The request body, either decoded as JSON (so plugins/transformers can
/// inspect and mutate it structurally) or carried as opaque bytes.
#[derive(Debug, Clone)]
pub enum Body {
    Json(serde_json::Value),
    Raw(Vec<u8>),
}

impl Body {
    pub fn is_json(&self) -> bool {
        matches!(self, Body::Json(_))
    }

    /// The bytes that would be sent on the wire for this body.
    pub fn as_bytes(&self) -> Vec<u8> {
        match self {
            Body::Json(value) => serde_json::to_vec(value).unwrap_or_default(),
            Body::Raw(bytes) => bytes.clone(),
        }
    }
}

/// An immutable record of one client request, captured once at the start of
/// the failover driver's attempt loop.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub method: Method,
    /// The original request's path and query, joined with an upstream's
    /// base target at dispatch time to form the outbound URL.
    pub url: String,
    pub headers: HeaderMap,
    pub body: Body,
    pub content_type: Option<String>,
}

impl RequestSnapshot {
    pub fn new(method: Method, url: String, headers: HeaderMap, raw_body: Vec<u8>) -> Self {
        let content_type = headers
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let is_json = content_type
            .as_deref()
            .map(|ct| ct.starts_with("application/json"))
            .unwrap_or(false);

        let body = if is_json {
            match serde_json::from_slice::<serde_json::Value>(&raw_body) {
                Ok(value) => Body::Json(value),
                Err(_) => Body::Raw(raw_body),
            }
        } else {
            Body::Raw(raw_body)
        };

        Self {
            method,
            url,
            headers,
            body,
            content_type,
        }
    }

    /// A per-attempt working copy. Transformers and plugins mutate this
    /// clone; the original snapshot is never modified.
    pub fn to_working_copy(&self) -> RequestSnapshot {
        self.clone()
    }
}

/// A response obtained from dispatching to an upstream (or synthesized by a
/// plugin via `onInterceptRequest`/`onResponse`), independent of any HTTP
/// framework response type so the core has no web-framework dependency.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    pub fn new(status: u16, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }
}
