//! OCI Core Services adapter
//!
//! Instances live in their compartment's scope. Every OCID handed out is also
//! recorded as a [`Locator`] in the tenancy scope, which is how calls addressed by
//! OCID alone (`GetInstance`, `GetVnic`) find the owning compartment.

use super::schema::{self, LaunchInstanceDetails, SortBy, SortOrder, VnicAttachment};
use crate::catalog;
use crate::emulator::{paginate, unsupported, Call, ProviderAdapter, Route, Verb};
use crate::error::EmulatorError;
use crate::store::{
    CloudState, Instance, InstanceStatus, Locator, NetworkInterface, Provider, Scope, VirtualCloud,
};
use crate::transport::{ApiResponse, Method};
use chrono::Utc;
use serde_json::{json, Value};

pub struct OracleAdapter {
    cloud: VirtualCloud,
    routes: Vec<Route>,
}

impl OracleAdapter {
    pub fn new(cloud: VirtualCloud) -> Self {
        let path = |suffix: &str| format!("/{}/{}", schema::API_VERSION, suffix);
        let routes = vec![
            Route::new(Method::POST, &path("instances"), "instances", Verb::Create),
            Route::new(Method::GET, &path("instances"), "instances", Verb::List),
            Route::new(Method::GET, &path("instances/{instanceId}"), "instances", Verb::Get),
            Route::new(Method::GET, &path("vnicAttachments"), "vnicAttachments", Verb::List),
            Route::new(Method::GET, &path("shapes"), "shapes", Verb::List),
            Route::new(Method::GET, &path("vnics/{vnicId}"), "vnics", Verb::Get),
        ];
        Self { cloud, routes }
    }

    pub fn cloud(&self) -> &VirtualCloud {
        &self.cloud
    }

    fn ocid(&self, state: &mut CloudState, kind: &str) -> String {
        format!(
            "ocid1.{}.oc1.{}.{}",
            kind,
            self.cloud.config().oracle_region,
            state.ids().lowercase(10)
        )
    }

    /// Launch an instance with one primary VNIC and its attachment
    pub fn launch(&self, body: &Value) -> Result<schema::Instance, EmulatorError> {
        let details: LaunchInstanceDetails = serde_json::from_value(body.clone())
            .map_err(|e| EmulatorError::InvalidArgument(format!("invalid launch details: {}", e)))?;
        if details.compartment_id.is_empty() {
            return Err(EmulatorError::InvalidArgument(
                "compartmentId is required".to_string(),
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

        let home = Scope::oracle(&details.compartment_id);
        let tenancy = Scope::tenancy(Provider::Oracle);
        let status = self.cloud.initial_status();
        let now = Utc::now();
        let display_name = details
            .display_name
            .clone()
            .unwrap_or_else(|| format!("instance{}", now.format("%Y%m%d%H%M")));

        let instance = self.cloud.with_state(|state| -> Result<Instance, EmulatorError> {
            let id = self.ocid(state, "instance");
            let vnic_id = self.ocid(state, "vnic");
            let attachment_id = self.ocid(state, "vnicattachment");

            // Nothing is written until every identity is known to be free
            for taken in [&id, &vnic_id] {
                if state.locators.get(&tenancy, taken).is_ok() {
                    return Err(EmulatorError::DuplicateIdentity {
                        scope: tenancy.to_string(),
                        identity: taken.clone(),
                    });
                }
            }
            let private_ip = state.allocate_ip()?;

            state.locators.create(
                &tenancy,
                Locator {
                    identity: id.clone(),
                    home: home.clone(),
                    owner: None,
                },
            )?;
            state.locators.create(
                &tenancy,
                Locator {
                    identity: vnic_id.clone(),
                    home: home.clone(),
                    owner: Some(id.clone()),
                },
            )?;

            let record = Instance {
                identity: id.clone(),
                id,
                name: display_name,
                placement: details.availability_domain.clone().unwrap_or_default(),
                status,
                created_at: now,
                interfaces: vec![NetworkInterface {
                    id: vnic_id,
                    attachment_id: Some(attachment_id),
                    name: "primary".to_string(),
                    private_ip,
                }],
                metadata,
            };
            state.instances.create(&home, record)
        })?;

        tracing::debug!("Launched instance {} in {}", instance.id, home);
        self.render(&instance)
    }

    fn render(&self, instance: &Instance) -> Result<schema::Instance, EmulatorError> {
        let details: LaunchInstanceDetails =
            serde_json::from_value(Value::Object(instance.metadata.clone()))?;
        let mut extra = details.extra;
        for key in schema::Instance::ASSIGNED_FIELDS {
            extra.remove(*key);
        }

        Ok(schema::Instance {
            id: instance.id.clone(),
            compartment_id: details.compartment_id,
            availability_domain: instance.placement.clone(),
            display_name: instance.name.clone(),
            shape: details.shape,
            region: self.cloud.config().oracle_region.clone(),
            freeform_tags: details.freeform_tags,
            lifecycle_state: lifecycle_state(instance.status).to_string(),
            time_created: instance.created_at,
            extra,
        })
    }

    /// Resolve an OCID to its home scope through the tenancy locators
    fn locate(&self, id: &str) -> Result<Locator, EmulatorError> {
        self.cloud.with_state(|state| {
            state
                .locators
                .get(&Scope::tenancy(Provider::Oracle), id)
                .cloned()
        })
    }

    fn request_id(&self) -> String {
        self.cloud
            .with_state(|state| state.ids().uuid().simple().to_string().to_uppercase())
    }

    fn respond(&self, status: u16, body: Value) -> ApiResponse {
        ApiResponse::json(status, body).with_header("opc-request-id", &self.request_id())
    }

    /// Page `items` by `limit`/`page`, reporting the next page in `opc-next-page`
    fn respond_page<T: serde::Serialize>(
        &self,
        call: &Call,
        items: Vec<T>,
    ) -> Result<ApiResponse, EmulatorError> {
        let (page, next) = paginate(items, call.query_count("limit")?, call.query("page"))?;
        let response = self.respond(200, serde_json::to_value(page)?);
        Ok(match next {
            Some(token) => response.with_header("opc-next-page", &token),
            None => response,
        })
    }

    fn list_instances(&self, call: &Call) -> Result<ApiResponse, EmulatorError> {
        let compartment = call.require_query("compartmentId")?;
        let mut instances = self.cloud.instances(&Scope::oracle(compartment));

        let sort_by = call
            .query("sortBy")
            .map(|value| {
                SortBy::parse(value).ok_or_else(|| {
                    EmulatorError::InvalidArgument(format!("invalid sortBy '{}'", value))
                })
            })
            .transpose()?;
        let sort_order = call
            .query("sortOrder")
            .map(|value| {
                SortOrder::parse(value).ok_or_else(|| {
                    EmulatorError::InvalidArgument(format!("invalid sortOrder '{}'", value))
                })
            })
            .transpose()?;

        // Stable sorts, so equal keys keep creation order in both directions
        if let Some(sort_by) = sort_by {
            let order = sort_order.unwrap_or_else(|| sort_by.default_order());
            let descending = order == SortOrder::Desc;
            instances.sort_by(|a, b| {
                let ordering = match sort_by {
                    SortBy::TimeCreated => a.created_at.cmp(&b.created_at),
                    SortBy::DisplayName => a.name.cmp(&b.name),
                };
                if descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let mut rendered = instances
            .iter()
            .map(|instance| self.render(instance))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(domain) = call.query("availabilityDomain") {
            rendered.retain(|i| i.availability_domain == domain);
        }
        if let Some(name) = call.query("displayName") {
            rendered.retain(|i| i.display_name == name);
        }
        if let Some(state) = call.query("lifecycleState") {
            rendered.retain(|i| i.lifecycle_state == state);
        }

        self.respond_page(call, rendered)
    }

    fn list_vnic_attachments(&self, call: &Call) -> Result<ApiResponse, EmulatorError> {
        let compartment = call.require_query("compartmentId")?;
        let instance_id = call.query("instanceId");

        let attachments: Vec<VnicAttachment> = self
            .cloud
            .instances(&Scope::oracle(compartment))
            .iter()
            .filter(|instance| instance_id.map_or(true, |id| instance.id == id))
            .flat_map(|instance| {
                instance.interfaces.iter().filter_map(move |nic| {
                    let id = nic.attachment_id.clone()?;
                    Some(VnicAttachment {
                        id,
                        instance_id: instance.id.clone(),
                        vnic_id: nic.id.clone(),
                        compartment_id: compartment.to_string(),
                        availability_domain: instance.placement.clone(),
                        lifecycle_state: "ATTACHED".to_string(),
                        time_created: instance.created_at,
                    })
                })
            })
            .collect();

        self.respond_page(call, attachments)
    }

    fn get_vnic(&self, call: &Call) -> Result<ApiResponse, EmulatorError> {
        let vnic_id = call.param("vnicId")?;
        let not_found = || EmulatorError::NotFound {
            scope: Scope::tenancy(Provider::Oracle).to_string(),
            identity: vnic_id.to_string(),
        };

        let locator = self.locate(vnic_id)?;
        let owner = locator.owner.as_deref().ok_or_else(not_found)?;
        let instance = self
            .cloud
            .with_state(|state| state.instances.get(&locator.home, owner).cloned())?;
        let (index, nic) = instance
            .interfaces
            .iter()
            .enumerate()
            .find(|(_, nic)| nic.id == vnic_id)
            .ok_or_else(not_found)?;

        let vnic = schema::Vnic {
            id: nic.id.clone(),
            compartment_id: locator.home.get("compartment").unwrap_or_default().to_string(),
            availability_domain: instance.placement.clone(),
            display_name: instance.name.clone(),
            private_ip: nic.private_ip.to_string(),
            is_primary: index == 0,
            lifecycle_state: "AVAILABLE".to_string(),
            time_created: instance.created_at,
        };
        Ok(self.respond(200, serde_json::to_value(vnic)?))
    }
}

fn lifecycle_state(status: InstanceStatus) -> &'static str {
    match status {
        InstanceStatus::Running => "RUNNING",
        InstanceStatus::Created => "PROVISIONING",
    }
}

impl ProviderAdapter for OracleAdapter {
    fn provider(&self) -> Provider {
        Provider::Oracle
    }

    fn routes(&self) -> &[Route] {
        &self.routes
    }

    fn handle_create(&self, resource: &str, call: &Call) -> Result<ApiResponse, EmulatorError> {
        if resource != "instances" {
            return Err(unsupported(Provider::Oracle, Verb::Create, resource));
        }
        let body = call
            .body
            .as_ref()
            .ok_or_else(|| {
                EmulatorError::InvalidArgument("launch details are required".to_string())
            })?;
        let instance = self.launch(body)?;
        Ok(self.respond(200, serde_json::to_value(instance)?))
    }

    fn handle_list(&self, resource: &str, call: &Call) -> Result<ApiResponse, EmulatorError> {
        match resource {
            "instances" => self.list_instances(call),
            "vnicAttachments" => self.list_vnic_attachments(call),
            "shapes" => {
                call.require_query("compartmentId")?;
                self.respond_page(call, catalog::shapes().to_vec())
            },
            other => Err(unsupported(Provider::Oracle, Verb::List, other)),
        }
    }

    fn handle_get(&self, resource: &str, call: &Call) -> Result<ApiResponse, EmulatorError> {
        match resource {
            "instances" => {
                let id = call.param("instanceId")?;
                let locator = self.locate(id)?;
                let instance = self
                    .cloud
                    .with_state(|state| state.instances.get(&locator.home, id).cloned())?;
                Ok(self.respond(200, serde_json::to_value(self.render(&instance)?)?))
            },
            "vnics" => self.get_vnic(call),
            other => Err(unsupported(Provider::Oracle, Verb::Get, other)),
        }
    }

    fn error_response(&self, err: &EmulatorError) -> ApiResponse {
        let code = match err {
            EmulatorError::DuplicateIdentity { .. } => "Conflict",
            EmulatorError::NotFound { .. } => "NotAuthorizedOrNotFound",
            EmulatorError::InvalidArgument(_) => "InvalidParameter",
            EmulatorError::UnsupportedOperation(_) => "UnsupportedOperation",
            EmulatorError::AlreadyActive { .. } | EmulatorError::Internal(_) => {
                "InternalServerError"
            },
        };
        self.respond(
            err.status_code(),
            json!({"code": code, "message": err.to_string()}),
        )
    }
}
