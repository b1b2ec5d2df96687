//! Compute Engine adapter

use super::filter::Filter;
use super::schema::{self, InsertInstance, ListResponse, Operation, Scheduling};
use crate::catalog;
use crate::emulator::{paginate, unsupported, Call, ProviderAdapter, Route, Verb};
use crate::error::EmulatorError;
use crate::store::{Instance, InstanceStatus, NetworkInterface, Provider, Scope, VirtualCloud};
use crate::transport::{ApiResponse, Method};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use std::net::Ipv4Addr;

const ZONE_PATH: &str = "/compute/v1/projects/{project}/zones/{zone}";

pub struct GoogleAdapter {
    cloud: VirtualCloud,
    routes: Vec<Route>,
}

impl GoogleAdapter {
    pub fn new(cloud: VirtualCloud) -> Self {
        let path = |suffix: &str| format!("{}/{}", ZONE_PATH, suffix);
        let routes = vec![
            Route::new(Method::POST, &path("instances"), "instances", Verb::Create),
            Route::new(Method::GET, &path("instances"), "instances", Verb::List),
            Route::new(Method::GET, &path("instances/{instance}"), "instances", Verb::Get),
            Route::new(Method::GET, &path("machineTypes"), "machineTypes", Verb::List),
            Route::new(
                Method::GET,
                &path("machineTypes/{machineType}"),
                "machineTypes",
                Verb::Get,
            ),
        ];
        Self { cloud, routes }
    }

    pub fn cloud(&self) -> &VirtualCloud {
        &self.cloud
    }

    /// Create an instance from an `instances.insert` body
    pub fn insert(
        &self,
        project: &str,
        zone: &str,
        body: &Value,
    ) -> Result<schema::Instance, EmulatorError> {
        let request: InsertInstance = serde_json::from_value(body.clone())
            .map_err(|e| EmulatorError::InvalidArgument(format!("invalid instance body: {}", e)))?;
        if request.name.is_empty() {
            return Err(EmulatorError::InvalidArgument(
                "instance name must not be empty".to_string(),
            ));
        }

        let scope = Scope::google(project, zone);
        let status = self.cloud.initial_status();
        let requested: Vec<Option<Ipv4Addr>> = match request.extra.get("networkInterfaces") {
            Some(Value::Array(nics)) => nics
                .iter()
                .map(|nic| match nic.get("networkIP").and_then(Value::as_str) {
                    Some(ip) => ip.parse().map(Some).map_err(|_| {
                        EmulatorError::InvalidArgument(format!("invalid networkIP {:?}", ip))
                    }),
                    None => Ok(None),
                })
                .collect::<Result<_, _>>()?,
            _ => Vec::new(),
        };

        let instance = self.cloud.with_state(|state| {
            // Checked up front so a rejected insert does not consume addresses
            if state.instances.get(&scope, &request.name).is_ok() {
                return Err(EmulatorError::DuplicateIdentity {
                    scope: scope.to_string(),
                    identity: request.name.clone(),
                });
            }

            let count = requested.len().max(1);
            let mut interfaces: Vec<NetworkInterface> = Vec::with_capacity(count);
            for index in 0..count {
                let assigned = match requested.get(index).copied().flatten() {
                    Some(ip) => state.reserve_ip(ip).map(|_| ip),
                    None => state.allocate_ip(),
                };
                let private_ip = match assigned {
                    Ok(ip) => ip,
                    Err(err) => {
                        for nic in &interfaces {
                            state.release_ip(nic.private_ip);
                        }
                        return Err(err);
                    },
                };
                interfaces.push(NetworkInterface {
                    id: state.ids().digits(19),
                    attachment_id: None,
                    name: format!("nic{}", index),
                    private_ip,
                });
            }

            let record = Instance {
                identity: request.name.clone(),
                id: state.ids().digits(19),
                name: request.name.clone(),
                placement: zone.to_string(),
                status,
                created_at: Utc::now(),
                interfaces,
                metadata: request.extra.clone(),
            };
            state.instances.create(&scope, record)
        })?;

        tracing::debug!("Inserted instance {} in {}", instance.name, scope);
        render(project, &instance)
    }

    fn operation(&self, project: &str, zone: &str, target: &schema::Instance) -> Operation {
        let (id, name) = self.cloud.with_state(|state| {
            let id = state.ids().digits(19);
            let name = format!("operation-{}", state.ids().uuid());
            (id, name)
        });
        let now = timestamp(Utc::now());
        let self_link = format!(
            "{}/projects/{}/zones/{}/operations/{}",
            schema::SELF_LINK_BASE,
            project,
            zone,
            name
        );

        Operation {
            kind: schema::OPERATION_KIND.to_string(),
            id,
            name,
            zone: zone.to_string(),
            operation_type: "insert".to_string(),
            target_link: target.self_link.clone(),
            target_id: target.id.clone(),
            status: "DONE".to_string(),
            progress: 100,
            insert_time: now.clone(),
            start_time: now.clone(),
            end_time: now,
            self_link,
        }
    }

    fn machine_type(zone: &str, project: &str, entry: &Value) -> Value {
        let mut machine_type = entry.clone();
        if let Value::Object(ref mut fields) = machine_type {
            let name = fields.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            fields.insert("zone".to_string(), Value::String(zone.to_string()));
            fields.insert(
                "selfLink".to_string(),
                Value::String(format!(
                    "{}/projects/{}/zones/{}/machineTypes/{}",
                    schema::SELF_LINK_BASE,
                    project,
                    zone,
                    name
                )),
            );
        }
        machine_type
    }
}

fn timestamp(at: chrono::DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn status_name(status: InstanceStatus) -> &'static str {
    match status {
        InstanceStatus::Running => "RUNNING",
        InstanceStatus::Created => "PROVISIONING",
    }
}

/// Render a stored instance as `compute#instance`
fn render(project: &str, instance: &Instance) -> Result<schema::Instance, EmulatorError> {
    let requested = instance
        .metadata
        .get("networkInterfaces")
        .and_then(Value::as_array);

    let network_interfaces = instance
        .interfaces
        .iter()
        .enumerate()
        .map(|(index, nic)| {
            let mut extra: Map<String, Value> = requested
                .and_then(|nics| nics.get(index))
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            extra.remove("name");
            extra.remove("networkIP");
            schema::NetworkInterface {
                name: nic.name.clone(),
                network_ip: nic.private_ip.to_string(),
                extra,
            }
        })
        .collect();

    let mut extra = instance.metadata.clone();
    for key in schema::Instance::ASSIGNED_FIELDS {
        extra.remove(*key);
    }

    let scheduling = match instance.metadata.get("scheduling") {
        Some(scheduling) => scheduling.clone(),
        None => serde_json::to_value(Scheduling::default())?,
    };

    Ok(schema::Instance {
        kind: schema::INSTANCE_KIND.to_string(),
        id: instance.id.clone(),
        name: instance.name.clone(),
        zone: instance.placement.clone(),
        status: status_name(instance.status).to_string(),
        tags: instance.metadata.get("tags").cloned().unwrap_or_else(|| json!({})),
        scheduling,
        network_interfaces,
        creation_timestamp: timestamp(instance.created_at),
        self_link: format!(
            "{}/projects/{}/zones/{}/instances/{}",
            schema::SELF_LINK_BASE,
            project,
            instance.placement,
            instance.name
        ),
        extra,
    })
}

fn parse_filter(call: &Call) -> Result<Option<Filter>, EmulatorError> {
    match call.query("filter") {
        Some(text) if !text.trim().is_empty() => Filter::parse(text)
            .map(Some)
            .map_err(|e| {
                EmulatorError::InvalidArgument(format!("invalid filter '{}': {}", text, e))
            }),
        _ => Ok(None),
    }
}

/// Filter, page and wrap rendered items
fn list_response(call: &Call, mut items: Vec<Value>) -> Result<ApiResponse, EmulatorError> {
    if let Some(filter) = parse_filter(call)? {
        items.retain(|item| filter.matches(item));
    }
    let (items, next_page_token) =
        paginate(items, call.query_count("maxResults")?, call.query("pageToken"))?;
    let body = ListResponse {
        items,
        next_page_token,
    };
    Ok(ApiResponse::json(200, serde_json::to_value(body)?))
}

impl ProviderAdapter for GoogleAdapter {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    fn routes(&self) -> &[Route] {
        &self.routes
    }

    fn handle_create(&self, resource: &str, call: &Call) -> Result<ApiResponse, EmulatorError> {
        if resource != "instances" {
            return Err(unsupported(Provider::Google, Verb::Create, resource));
        }

        let project = call.param("project")?;
        let zone = call.param("zone")?;
        let body = call
            .body
            .as_ref()
            .ok_or_else(|| {
                EmulatorError::InvalidArgument("instance body is required".to_string())
            })?;

        let instance = self.insert(project, zone, body)?;
        let operation = self.operation(project, zone, &instance);
        Ok(ApiResponse::json(200, serde_json::to_value(operation)?))
    }

    fn handle_list(&self, resource: &str, call: &Call) -> Result<ApiResponse, EmulatorError> {
        let project = call.param("project")?;
        let zone = call.param("zone")?;

        match resource {
            "instances" => {
                let items = self
                    .cloud
                    .instances(&Scope::google(project, zone))
                    .iter()
                    .map(|instance| {
                        render(project, instance)
                            .and_then(|i| serde_json::to_value(i).map_err(Into::into))
                    })
                    .collect::<Result<Vec<_>, EmulatorError>>()?;
                list_response(call, items)
            },
            "machineTypes" => {
                let items = catalog::machine_types()
                    .iter()
                    .map(|entry| Self::machine_type(zone, project, entry))
                    .collect();
                list_response(call, items)
            },
            other => Err(unsupported(Provider::Google, Verb::List, other)),
        }
    }

    fn handle_get(&self, resource: &str, call: &Call) -> Result<ApiResponse, EmulatorError> {
        let project = call.param("project")?;
        let zone = call.param("zone")?;
        let scope = Scope::google(project, zone);

        match resource {
            "instances" => {
                let name = call.param("instance")?;
                let instance = self
                    .cloud
                    .with_state(|state| state.instances.get(&scope, name).cloned())?;
                let rendered = render(project, &instance)?;
                Ok(ApiResponse::json(200, serde_json::to_value(rendered)?))
            },
            "machineTypes" => {
                let name = call.param("machineType")?;
                let entry = catalog::machine_type(name).ok_or_else(|| EmulatorError::NotFound {
                    scope: scope.to_string(),
                    identity: name.to_string(),
                })?;
                Ok(ApiResponse::json(200, Self::machine_type(zone, project, entry)))
            },
            other => Err(unsupported(Provider::Google, Verb::Get, other)),
        }
    }

    fn error_response(&self, err: &EmulatorError) -> ApiResponse {
        let reason = match err {
            EmulatorError::DuplicateIdentity { .. } => "alreadyExists",
            EmulatorError::NotFound { .. } => "notFound",
            EmulatorError::InvalidArgument(_) => "invalid",
            EmulatorError::UnsupportedOperation(_) => "unsupportedOperation",
            EmulatorError::AlreadyActive { .. } | EmulatorError::Internal(_) => "backendError",
        };
        let message = err.to_string();

        ApiResponse::json(
            err.status_code(),
            json!({
                "error": {
                    "code": err.status_code(),
                    "message": message,
                    "errors": [{"domain": "global", "reason": reason, "message": message}]
                }
            }),
        )
    }
}
