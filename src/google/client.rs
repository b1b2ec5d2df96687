//! Compute Engine client
//!
//! Mirrors the request-builder shape of Google's discovery clients:
//!
//! ```no_run
//! # async fn demo() -> mockcloud::error::Result<()> {
//! let compute = mockcloud::google::ComputeClient::new()?;
//! let instances = compute
//!     .instances()
//!     .list("my-project", "europe-west1-d")
//!     .filter("status=RUNNING")
//!     .execute()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Responses are returned as JSON values, exactly as the API sent them.

use super::schema::ErrorResponse;
use crate::error::{Error, Result};
use crate::harness;
use crate::store::Provider;
use crate::transport::auth::Credential;
use crate::transport::{endpoint_url, ApiRequest, ApiResponse, Method, Transport};
use serde_json::{Map, Value};
use std::sync::Arc;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://compute.googleapis.com";

/// Compute Engine v1 client
#[derive(Clone)]
pub struct ComputeClient {
    transport: Arc<dyn Transport>,
    endpoint: String,
}

impl ComputeClient {
    /// Client for the public endpoint, authenticated with Application Default
    /// Credentials. Calls go through the process-wide Google dispatch point.
    pub fn new() -> Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT, Credential::google_default())
    }

    /// Client for a custom endpoint (e.g. a local test server)
    pub fn with_endpoint(endpoint: &str, credential: Credential) -> Result<Self> {
        Url::parse(endpoint)?;
        Ok(Self {
            transport: harness::dispatch(Provider::Google, credential)?,
            endpoint: endpoint.to_string(),
        })
    }

    /// Client whose calls all go to `transport`
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }

    pub fn instances(&self) -> Instances<'_> {
        Instances { client: self }
    }

    pub fn machine_types(&self) -> MachineTypes<'_> {
        MachineTypes { client: self }
    }

    fn zonal(&self, method: Method, project: &str, zone: &str, path: &[&str]) -> Request<'_> {
        let mut segments: Vec<String> = ["compute", "v1", "projects", project, "zones", zone]
            .iter()
            .map(|s| s.to_string())
            .collect();
        segments.extend(path.iter().map(|s| s.to_string()));

        Request {
            client: self,
            method,
            segments,
            query: Vec::new(),
            body: None,
        }
    }
}

/// `instances` collection
pub struct Instances<'a> {
    client: &'a ComputeClient,
}

impl<'a> Instances<'a> {
    pub fn list(&self, project: &str, zone: &str) -> Request<'a> {
        self.client.zonal(Method::GET, project, zone, &["instances"])
    }

    pub fn get(&self, project: &str, zone: &str, instance: &str) -> Request<'a> {
        self.client
            .zonal(Method::GET, project, zone, &["instances", instance])
    }

    pub fn insert(&self, project: &str, zone: &str, body: Value) -> Request<'a> {
        let mut request = self
            .client
            .zonal(Method::POST, project, zone, &["instances"]);
        request.body = Some(body);
        request
    }

    pub fn delete(&self, project: &str, zone: &str, instance: &str) -> Request<'a> {
        self.client
            .zonal(Method::DELETE, project, zone, &["instances", instance])
    }

    /// Every instance in the zone, following `nextPageToken`
    pub async fn list_all(
        &self,
        project: &str,
        zone: &str,
        filter: Option<&str>,
    ) -> Result<Vec<Value>> {
        let mut all_items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.list(project, zone);
            if let Some(filter) = filter {
                request = request.filter(filter);
            }
            if let Some(token) = page_token.as_deref() {
                request = request.page_token(token);
            }

            let response = request.execute().await?;
            if let Some(items) = response.get("items").and_then(Value::as_array) {
                all_items.extend(items.iter().cloned());
            }

            page_token = response
                .get("nextPageToken")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            if page_token.is_none() {
                break;
            }
        }

        Ok(all_items)
    }
}

/// `machineTypes` collection
pub struct MachineTypes<'a> {
    client: &'a ComputeClient,
}

impl<'a> MachineTypes<'a> {
    pub fn list(&self, project: &str, zone: &str) -> Request<'a> {
        self.client
            .zonal(Method::GET, project, zone, &["machineTypes"])
    }

    pub fn get(&self, project: &str, zone: &str, machine_type: &str) -> Request<'a> {
        self.client
            .zonal(Method::GET, project, zone, &["machineTypes", machine_type])
    }
}

/// A prepared call; nothing is sent until [`Request::execute`]
pub struct Request<'a> {
    client: &'a ComputeClient,
    method: Method,
    segments: Vec<String>,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl<'a> Request<'a> {
    /// Add a query parameter
    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn filter(self, filter: &str) -> Self {
        self.param("filter", filter)
    }

    pub fn max_results(self, max_results: u32) -> Self {
        self.param("maxResults", &max_results.to_string())
    }

    pub fn page_token(self, token: &str) -> Self {
        self.param("pageToken", token)
    }

    pub async fn execute(self) -> Result<Value> {
        let segments: Vec<&str> = self.segments.iter().map(String::as_str).collect();
        let mut url = endpoint_url(&Url::parse(&self.client.endpoint)?, &segments)?;
        if !self.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&self.query);
        }

        let mut request = ApiRequest::new(self.method, url);
        if let Some(body) = self.body {
            request = request.with_body(body);
        }

        let response = self.client.transport.send(request).await?;
        if response.is_success() {
            Ok(response.body.unwrap_or_else(|| Value::Object(Map::new())))
        } else {
            Err(api_error(response))
        }
    }
}

/// Decode a Compute Engine error body
fn api_error(response: ApiResponse) -> Error {
    let status = response.status;
    let decoded = response
        .body
        .clone()
        .and_then(|body| serde_json::from_value::<ErrorResponse>(body).ok());

    match decoded {
        Some(ErrorResponse { error }) => Error::Api {
            provider: Provider::Google,
            status,
            code: error
                .errors
                .first()
                .map(|e| e.reason.clone())
                .unwrap_or_else(|| error.code.to_string()),
            message: error.message,
        },
        None => Error::unrecognized(Provider::Google, status, response.body.as_ref()),
    }
}
