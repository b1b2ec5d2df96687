//! Microsoft.Compute adapter

use super::schema::{self, VirtualMachine, VirtualMachineListResult};
use crate::emulator::{paginate, unsupported, Call, ProviderAdapter, Route, Verb};
use crate::error::EmulatorError;
use crate::store::{Instance, InstanceStatus, NetworkInterface, Provider, Scope, VirtualCloud};
use crate::transport::{ApiResponse, Method};
use chrono::Utc;
use serde_json::{json, Value};
use url::Url;

const VMS_PATH: &str = concat!(
    "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}",
    "/providers/Microsoft.Compute/virtualMachines"
);

pub struct AzureAdapter {
    cloud: VirtualCloud,
    routes: Vec<Route>,
}

impl AzureAdapter {
    pub fn new(cloud: VirtualCloud) -> Self {
        let item = format!("{}/{{vmName}}", VMS_PATH);
        let routes = vec![
            Route::new(Method::PUT, &item, "virtualMachines", Verb::Create),
            Route::new(Method::GET, &item, "virtualMachines", Verb::Get),
            Route::new(Method::GET, VMS_PATH, "virtualMachines", Verb::List),
        ];
        Self { cloud, routes }
    }

    pub fn cloud(&self) -> &VirtualCloud {
        &self.cloud
    }

    /// Create a virtual machine from a `createOrUpdate` body
    pub fn create(
        &self,
        subscription: &str,
        resource_group: &str,
        name: &str,
        body: &Value,
    ) -> Result<VirtualMachine, EmulatorError> {
        let request: VirtualMachine = serde_json::from_value(body.clone())
            .map_err(|e| {
                EmulatorError::InvalidArgument(format!("invalid virtual machine body: {}", e))
            })?;
        if request.location.is_empty() {
            return Err(EmulatorError::InvalidArgument(
                "virtual machine location is required".to_string(),
            ));
        }
        let metadata = match body {
            Value::Object(fields) => fields.clone(),
            _ => {
                return Err(EmulatorError::InvalidArgument(
                    "request body must be a JSON object".to_string(),
                ))
            },
        };

        let scope = Scope::azure(subscription, resource_group);
        let status = self.cloud.initial_status();

        let instance = self.cloud.with_state(|state| {
            if state.instances.get(&scope, name).is_ok() {
                return Err(EmulatorError::DuplicateIdentity {
                    scope: scope.to_string(),
                    identity: name.to_string(),
                });
            }

            let private_ip = state.allocate_ip()?;
            let record = Instance {
                identity: name.to_string(),
                id: state.ids().uuid().to_string(),
                name: name.to_string(),
                placement: request.location.clone(),
                status,
                created_at: Utc::now(),
                interfaces: vec![NetworkInterface {
                    id: state.ids().uuid().to_string(),
                    attachment_id: None,
                    name: format!("{}-nic0", name),
                    private_ip,
                }],
                metadata,
            };
            state.instances.create(&scope, record)
        })?;

        tracing::debug!("Created virtual machine {} in {}", name, scope);
        render(subscription, resource_group, &instance)
    }

    fn require_api_version(call: &Call) -> Option<ApiResponse> {
        match call.query("api-version") {
            Some(version) if !version.is_empty() => None,
            _ => Some(ApiResponse::json(
                400,
                json!({
                    "error": {
                        "code": "MissingApiVersionParameter",
                        "message": concat!(
                            "The api-version query parameter (?api-version=) ",
                            "is required for all requests."
                        )
                    }
                }),
            )),
        }
    }

    /// `nextLink` pointing at the page starting at `token`
    fn next_link(call: &Call, token: &str) -> Url {
        let mut url = call.url.clone();
        let kept: Vec<(String, String)> = call
            .query
            .iter()
            .filter(|(k, _)| k != "$skiptoken")
            .cloned()
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(&kept)
            .append_pair("$skiptoken", token);
        url
    }
}

fn resource_id(
    subscription: &str,
    resource_group: &str,
    provider_type: &str,
    name: &str,
) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/{}/{}",
        subscription, resource_group, provider_type, name
    )
}

fn provisioning_state(status: InstanceStatus) -> &'static str {
    match status {
        InstanceStatus::Running => "Succeeded",
        InstanceStatus::Created => "Creating",
    }
}

/// Render a stored instance as a `VirtualMachine`
fn render(
    subscription: &str,
    resource_group: &str,
    instance: &Instance,
) -> Result<VirtualMachine, EmulatorError> {
    let mut vm: VirtualMachine = serde_json::from_value(Value::Object(instance.metadata.clone()))?;

    vm.id = Some(resource_id(subscription, resource_group, schema::VM_TYPE, &instance.name));
    vm.name = Some(instance.name.clone());
    vm.resource_type = Some(schema::VM_TYPE.to_string());
    vm.location = instance.placement.clone();

    let properties = vm.properties_mut();
    properties.vm_id = Some(instance.id.clone());
    properties.provisioning_state = Some(provisioning_state(instance.status).to_string());
    if let Some(os_profile) = properties.os_profile.as_mut() {
        os_profile.admin_password = None;
    }
    if properties.network_profile.is_none() {
        let interfaces: Vec<Value> = instance
            .interfaces
            .iter()
            .map(|nic| {
                let provider_type = "Microsoft.Network/networkInterfaces";
                json!({"id": resource_id(subscription, resource_group, provider_type, &nic.name)})
            })
            .collect();
        properties.network_profile = Some(json!({ "networkInterfaces": interfaces }));
    }

    Ok(vm)
}

impl ProviderAdapter for AzureAdapter {
    fn provider(&self) -> Provider {
        Provider::Azure
    }

    fn routes(&self) -> &[Route] {
        &self.routes
    }

    fn handle_create(&self, resource: &str, call: &Call) -> Result<ApiResponse, EmulatorError> {
        if resource != "virtualMachines" {
            return Err(unsupported(Provider::Azure, Verb::Create, resource));
        }
        if let Some(rejection) = Self::require_api_version(call) {
            return Ok(rejection);
        }

        let body = call
            .body
            .as_ref()
            .ok_or_else(|| {
                EmulatorError::InvalidArgument("virtual machine body is required".to_string())
            })?;
        let vm = self.create(
            call.param("subscriptionId")?,
            call.param("resourceGroupName")?,
            call.param("vmName")?,
            body,
        )?;
        Ok(ApiResponse::json(201, serde_json::to_value(vm)?))
    }

    fn handle_list(&self, resource: &str, call: &Call) -> Result<ApiResponse, EmulatorError> {
        if resource != "virtualMachines" {
            return Err(unsupported(Provider::Azure, Verb::List, resource));
        }
        if let Some(rejection) = Self::require_api_version(call) {
            return Ok(rejection);
        }

        let subscription = call.param("subscriptionId")?;
        let resource_group = call.param("resourceGroupName")?;
        let instances = self.cloud.instances(&Scope::azure(subscription, resource_group));

        let (page, next) = paginate(
            instances,
            Some(self.cloud.config().azure_page_size),
            call.query("$skiptoken"),
        )?;
        let value = page
            .iter()
            .map(|instance| render(subscription, resource_group, instance))
            .collect::<Result<Vec<_>, _>>()?;

        let body = VirtualMachineListResult {
            value,
            next_link: next.map(|token| Self::next_link(call, &token).to_string()),
        };
        Ok(ApiResponse::json(200, serde_json::to_value(body)?))
    }

    fn handle_get(&self, resource: &str, call: &Call) -> Result<ApiResponse, EmulatorError> {
        if resource != "virtualMachines" {
            return Err(unsupported(Provider::Azure, Verb::Get, resource));
        }
        if let Some(rejection) = Self::require_api_version(call) {
            return Ok(rejection);
        }

        let subscription = call.param("subscriptionId")?;
        let resource_group = call.param("resourceGroupName")?;
        let name = call.param("vmName")?;
        let scope = Scope::azure(subscription, resource_group);

        let instance = self
            .cloud
            .with_state(|state| state.instances.get(&scope, name).cloned())?;
        let vm = render(subscription, resource_group, &instance)?;
        Ok(ApiResponse::json(200, serde_json::to_value(vm)?))
    }

    fn error_response(&self, err: &EmulatorError) -> ApiResponse {
        let code = match err {
            EmulatorError::DuplicateIdentity { .. } => "Conflict",
            EmulatorError::NotFound { .. } => "ResourceNotFound",
            EmulatorError::InvalidArgument(_) => "InvalidParameter",
            EmulatorError::UnsupportedOperation(_) => "UnsupportedOperation",
            EmulatorError::AlreadyActive { .. } | EmulatorError::Internal(_) => {
                "InternalServerError"
            },
        };

        ApiResponse::json(
            err.status_code(),
            json!({"error": {"code": code, "message": err.to_string()}}),
        )
    }
}
