//! OCI Core Services clients
//!
//! Every call returns a [`Response`] whose `data` holds the decoded body, the way
//! the OCI SDKs do. Request signing is not implemented: real calls carry whatever
//! [`Credential`] the client was built with, which suits local test endpoints.

use super::schema::{
    self, ErrorBody, Instance, LaunchInstanceDetails, Shape, SortBy, SortOrder, Vnic,
    VnicAttachment,
};
use crate::error::{Error, Result};
use crate::harness;
use crate::store::Provider;
use crate::transport::auth::Credential;
use crate::transport::{endpoint_url, ApiRequest, ApiResponse, Method, Transport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Endpoint of the Core Services API in `region`
pub fn regional_endpoint(region: &str) -> String {
    format!("https://iaas.{}.oraclecloud.com", region)
}

/// Result of an OCI call
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub data: T,
    /// `opc-request-id`
    pub request_id: Option<String>,
    /// `opc-next-page`; pass it back as `page` to fetch the next page
    pub next_page: Option<String>,
}

/// Transport and endpoint shared by the Core Services clients
#[derive(Clone)]
struct Connection {
    transport: Arc<dyn Transport>,
    endpoint: String,
}

impl Connection {
    fn dispatched(endpoint: &str, credential: Credential) -> Result<Self> {
        Url::parse(endpoint)?;
        Ok(Self {
            transport: harness::dispatch(Provider::Oracle, credential)?,
            endpoint: endpoint.to_string(),
        })
    }

    fn url(&self, path: &[&str], query: &[(&str, Option<String>)]) -> Result<Url> {
        let mut segments = vec![schema::API_VERSION];
        segments.extend_from_slice(path);

        let mut url = endpoint_url(&Url::parse(&self.endpoint)?, &segments)?;
        let present: Vec<(&str, &str)> = query
            .iter()
            .filter_map(|(name, value)| value.as_deref().map(|v| (*name, v)))
            .collect();
        if !present.is_empty() {
            url.query_pairs_mut().extend_pairs(present);
        }
        Ok(url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<Response<T>> {
        let mut request = ApiRequest::new(method, url);
        if let Some(body) = body {
            request = request.with_body(body);
        }

        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(api_error(response));
        }

        let request_id = response.header("opc-request-id").map(str::to_string);
        let next_page = response.header("opc-next-page").map(str::to_string);
        let status = response.status;
        let headers = response.headers.clone();
        let data = serde_json::from_value(response.into_body())?;

        Ok(Response {
            status,
            headers,
            data,
            request_id,
            next_page,
        })
    }
}

/// Optional arguments of [`ComputeClient::list_instances`]
#[derive(Debug, Clone, Default)]
pub struct ListInstancesOptions {
    pub availability_domain: Option<String>,
    pub display_name: Option<String>,
    pub lifecycle_state: Option<String>,
    pub sort_by: Option<SortBy>,
    pub sort_order: Option<SortOrder>,
    pub limit: Option<u32>,
    pub page: Option<String>,
}

/// `ComputeClient`: instances, VNIC attachments and shapes
#[derive(Clone)]
pub struct ComputeClient {
    connection: Connection,
}

impl ComputeClient {
    /// Client for `region`, sending through the process-wide Oracle dispatch point
    pub fn new(region: &str) -> Result<Self> {
        Self::with_endpoint(&regional_endpoint(region), Credential::Anonymous)
    }

    pub fn with_endpoint(endpoint: &str, credential: Credential) -> Result<Self> {
        Ok(Self {
            connection: Connection::dispatched(endpoint, credential)?,
        })
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            connection: Connection {
                transport,
                endpoint: regional_endpoint("us-ashburn-1"),
            },
        }
    }

    pub async fn launch_instance(
        &self,
        details: &LaunchInstanceDetails,
    ) -> Result<Response<Instance>> {
        let url = self.connection.url(&["instances"], &[])?;
        self.connection
            .call(Method::POST, url, Some(serde_json::to_value(details)?))
            .await
    }

    pub async fn list_instances(
        &self,
        compartment_id: &str,
        options: &ListInstancesOptions,
    ) -> Result<Response<Vec<Instance>>> {
        let url = self.connection.url(
            &["instances"],
            &[
                ("compartmentId", Some(compartment_id.to_string())),
                ("availabilityDomain", options.availability_domain.clone()),
                ("displayName", options.display_name.clone()),
                ("lifecycleState", options.lifecycle_state.clone()),
                ("sortBy", options.sort_by.map(|s| s.to_string())),
                ("sortOrder", options.sort_order.map(|s| s.to_string())),
                ("limit", options.limit.map(|l| l.to_string())),
                ("page", options.page.clone()),
            ],
        )?;
        self.connection.call(Method::GET, url, None).await
    }

    /// Every matching instance, following `opc-next-page`
    pub async fn list_all_instances(
        &self,
        compartment_id: &str,
        options: &ListInstancesOptions,
    ) -> Result<Vec<Instance>> {
        let mut options = options.clone();
        let mut all_items = Vec::new();

        loop {
            let response = self.list_instances(compartment_id, &options).await?;
            all_items.extend(response.data);

            if response.next_page.is_none() {
                break;
            }
            options.page = response.next_page;
        }

        Ok(all_items)
    }

    pub async fn get_instance(&self, instance_id: &str) -> Result<Response<Instance>> {
        let url = self.connection.url(&["instances", instance_id], &[])?;
        self.connection.call(Method::GET, url, None).await
    }

    pub async fn terminate_instance(&self, instance_id: &str) -> Result<Response<Value>> {
        let url = self.connection.url(&["instances", instance_id], &[])?;
        self.connection.call(Method::DELETE, url, None).await
    }

    pub async fn list_vnic_attachments(
        &self,
        compartment_id: &str,
        instance_id: Option<&str>,
    ) -> Result<Response<Vec<VnicAttachment>>> {
        let url = self.connection.url(
            &["vnicAttachments"],
            &[
                ("compartmentId", Some(compartment_id.to_string())),
                ("instanceId", instance_id.map(str::to_string)),
            ],
        )?;
        self.connection.call(Method::GET, url, None).await
    }

    pub async fn list_shapes(&self, compartment_id: &str) -> Result<Response<Vec<Shape>>> {
        let url = self
            .connection
            .url(&["shapes"], &[("compartmentId", Some(compartment_id.to_string()))])?;
        self.connection.call(Method::GET, url, None).await
    }
}

/// `VirtualNetworkClient`: VNICs
#[derive(Clone)]
pub struct VirtualNetworkClient {
    connection: Connection,
}

impl VirtualNetworkClient {
    pub fn new(region: &str) -> Result<Self> {
        Self::with_endpoint(&regional_endpoint(region), Credential::Anonymous)
    }

    pub fn with_endpoint(endpoint: &str, credential: Credential) -> Result<Self> {
        Ok(Self {
            connection: Connection::dispatched(endpoint, credential)?,
        })
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            connection: Connection {
                transport,
                endpoint: regional_endpoint("us-ashburn-1"),
            },
        }
    }

    pub async fn get_vnic(&self, vnic_id: &str) -> Result<Response<Vnic>> {
        let url = self.connection.url(&["vnics", vnic_id], &[])?;
        self.connection.call(Method::GET, url, None).await
    }
}

fn api_error(response: ApiResponse) -> Error {
    let status = response.status;
    let decoded = response
        .body
        .clone()
        .and_then(|body| serde_json::from_value::<ErrorBody>(body).ok());

    match decoded {
        Some(ErrorBody { code, message }) => Error::Api {
            provider: Provider::Oracle,
            status,
            code,
            message,
        },
        None => Error::unrecognized(Provider::Oracle, status, response.body.as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use parking_lot::Mutex;
    use serde_json::json;

    struct Recorder {
        requests: Mutex<Vec<ApiRequest>>,
        response: ApiResponse,
    }

    impl Transport for Recorder {
        fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse>> {
            self.requests.lock().push(request);
            let response = self.response.clone();
            Box::pin(async move { Ok(response) })
        }
    }

    fn recorder(response: ApiResponse) -> Arc<Recorder> {
        Arc::new(Recorder {
            requests: Mutex::new(Vec::new()),
            response,
        })
    }

    #[tokio::test]
    async fn test_list_instances_query() {
        let transport = recorder(
            ApiResponse::json(200, json!([]))
                .with_header("opc-request-id", "ABC")
                .with_header("opc-next-page", "2"),
        );
        let client = ComputeClient::with_transport(transport.clone());

        let options = ListInstancesOptions {
            sort_by: Some(SortBy::DisplayName),
            limit: Some(2),
            ..ListInstancesOptions::default()
        };
        let response = client.list_instances("foo", &options).await.unwrap();
        assert!(response.data.is_empty());
        assert_eq!(response.request_id.as_deref(), Some("ABC"));
        assert_eq!(response.next_page.as_deref(), Some("2"));

        let requests = transport.requests.lock();
        assert_eq!(requests[0].url.path(), "/20160918/instances");
        assert_eq!(
            requests[0].url.query(),
            Some("compartmentId=foo&sortBy=DISPLAYNAME&limit=2")
        );
    }

    #[tokio::test]
    async fn test_error_decoded() {
        let transport = recorder(ApiResponse::json(
            404,
            json!({"code": "NotAuthorizedOrNotFound", "message": "no such vnic"}),
        ));
        let client = VirtualNetworkClient::with_transport(transport);

        let err = client.get_vnic("ocid1.vnic.oc1..x").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.code(), Some("NotAuthorizedOrNotFound"));
    }
}
