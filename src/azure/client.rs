//! Compute management client
//!
//! `virtual_machines()` follows the shape of the Azure management SDKs:
//! long-running creates return a [`Poller`], and `list` is a lazy stream that
//! fetches a page only when the consumer asks for more items and follows
//! `nextLink` on its own.

use super::schema::{self, CloudError, OperationStatus, VirtualMachine, VirtualMachineListResult};
use crate::error::{Error, Result};
use crate::harness;
use crate::store::Provider;
use crate::transport::auth::Credential;
use crate::transport::{endpoint_url, ApiRequest, ApiResponse, Method, Transport};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// Poll interval when a long-running operation sends no `Retry-After`
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct ComputeManagementClient {
    transport: Arc<dyn Transport>,
    endpoint: String,
    subscription_id: String,
}

impl ComputeManagementClient {
    /// Client for Azure Resource Manager, sending through the process-wide Azure
    /// dispatch point
    pub fn new(subscription_id: &str, credential: Credential) -> Result<Self> {
        Self::with_endpoint(DEFAULT_ENDPOINT, subscription_id, credential)
    }

    pub fn with_endpoint(
        endpoint: &str,
        subscription_id: &str,
        credential: Credential,
    ) -> Result<Self> {
        Url::parse(endpoint)?;
        Ok(Self {
            transport: harness::dispatch(Provider::Azure, credential)?,
            endpoint: endpoint.to_string(),
            subscription_id: subscription_id.to_string(),
        })
    }

    pub fn with_transport(subscription_id: &str, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            subscription_id: subscription_id.to_string(),
        }
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn virtual_machines(&self) -> VirtualMachines<'_> {
        VirtualMachines { client: self }
    }

    fn collection_url(&self, resource_group: &str, name: Option<&str>) -> Result<Url> {
        let mut segments = vec![
            "subscriptions",
            self.subscription_id.as_str(),
            "resourceGroups",
            resource_group,
            "providers",
            "Microsoft.Compute",
            "virtualMachines",
        ];
        segments.extend(name);

        let mut url = endpoint_url(&Url::parse(&self.endpoint)?, &segments)?;
        url.query_pairs_mut()
            .append_pair("api-version", schema::API_VERSION);
        Ok(url)
    }
}

/// `virtualMachines` operations
pub struct VirtualMachines<'a> {
    client: &'a ComputeManagementClient,
}

impl<'a> VirtualMachines<'a> {
    /// Start creating (or replacing) a virtual machine
    pub async fn begin_create_or_update(
        &self,
        resource_group: &str,
        name: &str,
        parameters: VirtualMachine,
    ) -> Result<Poller> {
        let url = self.client.collection_url(resource_group, Some(name))?;
        let request =
            ApiRequest::new(Method::PUT, url).with_body(serde_json::to_value(&parameters)?);
        let response = self.client.transport.send(request).await?;

        let operation = response
            .header("azure-asyncoperation")
            .map(Url::parse)
            .transpose()?;
        let retry_after = response
            .header("retry-after")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let initial: VirtualMachine = decode(response)?;

        Ok(Poller {
            transport: self.client.transport.clone(),
            resource: self.client.collection_url(resource_group, Some(name))?,
            operation,
            poll_interval: retry_after.unwrap_or(DEFAULT_POLL_INTERVAL),
            initial,
        })
    }

    pub async fn get(&self, resource_group: &str, name: &str) -> Result<VirtualMachine> {
        let url = self.client.collection_url(resource_group, Some(name))?;
        let response = self
            .client
            .transport
            .send(ApiRequest::new(Method::GET, url))
            .await?;
        decode(response)
    }

    /// Virtual machines in a resource group. Nothing is requested until the stream
    /// is polled.
    pub fn list(&self, resource_group: &str) -> BoxStream<'static, Result<VirtualMachine>> {
        let first = match self.client.collection_url(resource_group, None) {
            Ok(url) => url,
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };
        let transport = self.client.transport.clone();

        stream::try_unfold(Some(first), move |next: Option<Url>| {
            let transport = transport.clone();
            async move {
                match next {
                    None => Ok(None),
                    Some(url) => fetch_page(transport, url).await.map(Some),
                }
            }
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<VirtualMachine, Error>)))
        .try_flatten()
        .boxed()
    }
}

/// One list page and the URL of the next, if any
async fn fetch_page(
    transport: Arc<dyn Transport>,
    url: Url,
) -> Result<(Vec<VirtualMachine>, Option<Url>)> {
    tracing::debug!("Fetching virtual machine page {}", url);

    let response = transport.send(ApiRequest::new(Method::GET, url)).await?;
    let page: VirtualMachineListResult = decode(response)?;
    let next = page.next_link.as_deref().map(Url::parse).transpose()?;
    Ok((page.value, next))
}

/// Handle to a long-running create
pub struct Poller {
    transport: Arc<dyn Transport>,
    resource: Url,
    operation: Option<Url>,
    poll_interval: Duration,
    initial: VirtualMachine,
}

impl Poller {
    /// Whether the operation finished with the initial response
    pub fn is_done(&self) -> bool {
        self.operation.is_none()
    }

    /// Wait for the operation to finish and return the resulting resource
    pub async fn result(self) -> Result<VirtualMachine> {
        let Some(operation) = self.operation else {
            return Ok(self.initial);
        };

        loop {
            let response = self
                .transport
                .send(ApiRequest::new(Method::GET, operation.clone()))
                .await?;
            let status: OperationStatus = decode(response)?;

            match status.status.as_str() {
                "Succeeded" => break,
                "Failed" | "Canceled" => {
                    let error = status.error.unwrap_or(schema::CloudErrorBody {
                        code: status.status.clone(),
                        message: "long-running operation did not succeed".to_string(),
                    });
                    return Err(Error::Api {
                        provider: Provider::Azure,
                        status: 200,
                        code: error.code,
                        message: error.message,
                    });
                },
                _ => tokio::time::sleep(self.poll_interval).await,
            }
        }

        let response = self
            .transport
            .send(ApiRequest::new(Method::GET, self.resource))
            .await?;
        decode(response)
    }
}

fn decode<T: DeserializeOwned>(response: ApiResponse) -> Result<T> {
    if !response.is_success() {
        return Err(api_error(response));
    }
    Ok(serde_json::from_value(response.into_body())?)
}

fn api_error(response: ApiResponse) -> Error {
    let status = response.status;
    let decoded = response
        .body
        .clone()
        .and_then(|body| serde_json::from_value::<CloudError>(body).ok());

    match decoded {
        Some(CloudError { error }) => Error::Api {
            provider: Provider::Azure,
            status,
            code: error.code,
            message: error.message,
        },
        None => Error::unrecognized(Provider::Azure, status, response.body.as_ref()),
    }
}
