//! Emulation layer
//!
//! A [`ProviderAdapter`] translates one provider's REST calls into store operations
//! and renders the results in that provider's wire shape. [`Emulator`] wraps any
//! adapter into a [`Transport`], so it can be injected into a client or installed
//! in the harness.
//!
//! # Routing
//!
//! Each adapter publishes a route table. A route pairs an HTTP method and a
//! [`PathTemplate`] with the resource name and [`Verb`] it maps to. Requests that
//! match no route fail with [`EmulatorError::UnsupportedOperation`] instead of
//! answering with something empty, so a test cannot mistake a gap in the emulation
//! for a cloud with no resources.

mod routing;

pub use routing::PathTemplate;

use crate::error::{EmulatorError, Result};
use crate::store::Provider;
use crate::transport::{ApiRequest, ApiResponse, Method, Transport};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::collections::HashMap;
use url::Url;

/// Operation kind a route maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Create,
    List,
    Get,
}

/// One entry of an adapter's route table
#[derive(Debug, Clone)]
pub struct Route {
    pub method: Method,
    pub template: PathTemplate,
    pub resource: &'static str,
    pub verb: Verb,
}

impl Route {
    pub fn new(method: Method, template: &str, resource: &'static str, verb: Verb) -> Self {
        Self {
            method,
            template: PathTemplate::parse(template),
            resource,
            verb,
        }
    }
}

/// Arguments of a routed call
#[derive(Debug, Clone)]
pub struct Call {
    pub url: Url,
    pub params: HashMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl Call {
    /// Path parameter captured by the route template
    pub fn param(&self, name: &str) -> std::result::Result<&str, EmulatorError> {
        self.params
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| {
                EmulatorError::InvalidArgument(format!("missing path parameter '{}'", name))
            })
    }

    /// First value of a query parameter
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn require_query(&self, name: &str) -> std::result::Result<&str, EmulatorError> {
        self.query(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                EmulatorError::InvalidArgument(format!("missing required parameter '{}'", name))
            })
    }

    /// Query parameter parsed as a positive count
    pub fn query_count(&self, name: &str) -> std::result::Result<Option<usize>, EmulatorError> {
        match self.query(name) {
            None => Ok(None),
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => Ok(Some(n)),
                _ => Err(EmulatorError::InvalidArgument(format!(
                    "parameter '{}' must be a positive integer, got '{}'",
                    name, raw
                ))),
            },
        }
    }

    /// Request body as a JSON object
    pub fn body_object(&self) -> std::result::Result<&Map<String, Value>, EmulatorError> {
        self.body
            .as_ref()
            .and_then(Value::as_object)
            .ok_or_else(|| {
                EmulatorError::InvalidArgument("request body must be a JSON object".to_string())
            })
    }
}

/// Translation between one provider's REST surface and the virtual cloud
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> Provider;

    fn routes(&self) -> &[Route];

    fn handle_create(
        &self,
        resource: &str,
        call: &Call,
    ) -> std::result::Result<ApiResponse, EmulatorError>;

    fn handle_list(
        &self,
        resource: &str,
        call: &Call,
    ) -> std::result::Result<ApiResponse, EmulatorError>;

    fn handle_get(
        &self,
        resource: &str,
        _call: &Call,
    ) -> std::result::Result<ApiResponse, EmulatorError> {
        Err(unsupported(self.provider(), Verb::Get, resource))
    }

    /// Render a failure as the provider's error response
    fn error_response(&self, err: &EmulatorError) -> ApiResponse;
}

/// Error for a routed verb the adapter does not model for `resource`
pub fn unsupported(provider: Provider, verb: Verb, resource: &str) -> EmulatorError {
    EmulatorError::UnsupportedOperation(format!("{} {:?} on '{}'", provider, verb, resource))
}

/// [`Transport`] answering from a [`ProviderAdapter`]
pub struct Emulator<A> {
    adapter: A,
}

impl<A: ProviderAdapter> Emulator<A> {
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Route and run a request
    pub fn handle(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, EmulatorError> {
        let provider = self.adapter.provider();
        let path = request.url.path();

        tracing::debug!(%provider, method = %request.method, path, "emulated call");

        let matched = self.adapter.routes().iter().find_map(|route| {
            if route.method != request.method {
                return None;
            }
            route.template.matches(path).map(|params| (route, params))
        });

        let Some((route, params)) = matched else {
            return Err(EmulatorError::UnsupportedOperation(format!(
                "{} {} {}",
                provider, request.method, path
            )));
        };

        let call = Call {
            url: request.url.clone(),
            params,
            query: request.query_pairs(),
            body: request.body.clone(),
        };

        match route.verb {
            Verb::Create => self.adapter.handle_create(route.resource, &call),
            Verb::List => self.adapter.handle_list(route.resource, &call),
            Verb::Get => self.adapter.handle_get(route.resource, &call),
        }
    }

    /// Route and run a request, rendering failures as provider error responses
    pub fn respond(&self, request: &ApiRequest) -> ApiResponse {
        match self.handle(request) {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(
                    provider = %self.adapter.provider(),
                    "emulated call failed: {}",
                    err
                );
                self.adapter.error_response(&err)
            },
        }
    }
}

impl<A: ProviderAdapter> Transport for Emulator<A> {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse>> {
        let response = self.respond(&request);
        Box::pin(futures::future::ready(Ok(response)))
    }
}

/// Slice one page out of `items`. Page tokens are opaque offsets.
pub fn paginate<T>(
    mut items: Vec<T>,
    limit: Option<usize>,
    token: Option<&str>,
) -> std::result::Result<(Vec<T>, Option<String>), EmulatorError> {
    let offset = match token {
        None | Some("") => 0,
        Some(token) => token
            .parse::<usize>()
            .ok()
            .filter(|offset| *offset <= items.len())
            .ok_or_else(|| {
                EmulatorError::InvalidArgument(format!("invalid page token '{}'", token))
            })?,
    };

    let mut page: Vec<T> = items.drain(offset..).collect();
    let next = match limit {
        Some(limit) if page.len() > limit => {
            page.truncate(limit);
            Some((offset + limit).to_string())
        },
        _ => None,
    };
    Ok((page, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoAdapter {
        routes: Vec<Route>,
    }

    impl EchoAdapter {
        fn new() -> Self {
            Self {
                routes: vec![
                    Route::new(Method::GET, "/v1/things/{scope}", "things", Verb::List),
                    Route::new(Method::POST, "/v1/things/{scope}", "things", Verb::Create),
                ],
            }
        }
    }

    impl ProviderAdapter for EchoAdapter {
        fn provider(&self) -> Provider {
            Provider::Google
        }

        fn routes(&self) -> &[Route] {
            &self.routes
        }

        fn handle_create(
            &self,
            resource: &str,
            call: &Call,
        ) -> std::result::Result<ApiResponse, EmulatorError> {
            let body = call.body_object()?;
            Ok(ApiResponse::json(200, json!({"resource": resource, "body": body})))
        }

        fn handle_list(
            &self,
            _resource: &str,
            call: &Call,
        ) -> std::result::Result<ApiResponse, EmulatorError> {
            Ok(ApiResponse::json(
                200,
                json!({"scope": call.param("scope")?, "q": call.query("q")}),
            ))
        }

        fn error_response(&self, err: &EmulatorError) -> ApiResponse {
            ApiResponse::json(err.status_code(), json!({"message": err.to_string()}))
        }
    }

    fn request(method: Method, url: &str) -> ApiRequest {
        ApiRequest::new(method, Url::parse(url).unwrap())
    }

    #[test]
    fn test_routes_by_method_and_path() {
        let emulator = Emulator::new(EchoAdapter::new());

        let response = emulator
            .handle(&request(Method::GET, "http://host/v1/things/s1?q=x"))
            .unwrap();
        assert_eq!(response.body, Some(json!({"scope": "s1", "q": "x"})));

        let response = emulator
            .handle(&request(Method::POST, "http://host/v1/things/s1").with_body(json!({"a": 1})))
            .unwrap();
        assert_eq!(response.body, Some(json!({"resource": "things", "body": {"a": 1}})));
    }

    #[test]
    fn test_unrouted_call_is_unsupported() {
        let emulator = Emulator::new(EchoAdapter::new());

        let err = emulator
            .handle(&request(Method::DELETE, "http://host/v1/things/s1"))
            .unwrap_err();
        assert!(matches!(err, EmulatorError::UnsupportedOperation(_)));

        let err = emulator
            .handle(&request(Method::GET, "http://host/v2/other"))
            .unwrap_err();
        assert!(matches!(err, EmulatorError::UnsupportedOperation(_)));
    }

    #[test]
    fn test_unmodeled_verb_is_unsupported() {
        let adapter = EchoAdapter {
            routes: vec![Route::new(Method::GET, "/v1/thing/{id}", "things", Verb::Get)],
        };
        let emulator = Emulator::new(adapter);
        let response = emulator.respond(&request(Method::GET, "http://host/v1/thing/1"));
        assert_eq!(response.status, 501);
    }

    #[test]
    fn test_respond_renders_errors() {
        let emulator = Emulator::new(EchoAdapter::new());
        let response = emulator.respond(&request(Method::POST, "http://host/v1/things/s1"));
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_transport_send_resolves_immediately() {
        let emulator = Emulator::new(EchoAdapter::new());
        let response = tokio_test::block_on(
            emulator.send(request(Method::GET, "http://host/v1/things/s2")),
        )
        .unwrap();
        assert_eq!(response.status, 200);
    }

    #[test]
    fn test_paginate() {
        let items: Vec<u32> = (0..5).collect();

        let (page, next) = paginate(items.clone(), Some(2), None).unwrap();
        assert_eq!(page, vec![0, 1]);
        assert_eq!(next.as_deref(), Some("2"));

        let (page, next) = paginate(items.clone(), Some(2), Some("4")).unwrap();
        assert_eq!(page, vec![4]);
        assert_eq!(next, None);

        let (page, next) = paginate(items.clone(), None, None).unwrap();
        assert_eq!(page.len(), 5);
        assert_eq!(next, None);

        assert!(paginate(items.clone(), Some(2), Some("x")).is_err());
        assert!(paginate(items, Some(2), Some("9")).is_err());
    }

    #[test]
    fn test_query_count() {
        let call = Call {
            url: Url::parse("http://host/").unwrap(),
            params: HashMap::new(),
            query: vec![
                ("limit".to_string(), "3".to_string()),
                ("bad".to_string(), "0".to_string()),
            ],
            body: None,
        };
        assert_eq!(call.query_count("limit").unwrap(), Some(3));
        assert_eq!(call.query_count("missing").unwrap(), None);
        assert!(call.query_count("bad").is_err());
        assert!(call.require_query("missing").is_err());
    }
}
