//! Transport seam between SDK-shaped clients and whatever answers their calls
//!
//! Every client sends [`ApiRequest`]s through an `Arc<dyn Transport>`. Three
//! implementations exist:
//!
//! - [`http::HttpTransport`] - the real network path (reqwest)
//! - [`crate::emulator::Emulator`] - answers from a virtual cloud
//! - [`crate::harness::DispatchTransport`] - the process-wide dispatch point that
//!   forwards to an installed emulator, or to the real path when none is installed

pub mod auth;
pub mod http;

use crate::error::Result;
use futures::future::BoxFuture;
use serde_json::Value;
use url::Url;

pub use reqwest::Method;

/// Outbound API call
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Decoded query parameters, in order, repeated keys kept
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }
}

/// Response to an [`ApiRequest`]
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// First header with this name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body, or JSON `null` when the response had none
    pub fn into_body(self) -> Value {
        self.body.unwrap_or(Value::Null)
    }
}

/// Something that can answer API calls
pub trait Transport: Send + Sync {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse>>;
}

/// Join path segments onto an endpoint, percent-encoding each segment
pub fn endpoint_url(endpoint: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = endpoint.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?;
        path.pop_if_empty();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}
