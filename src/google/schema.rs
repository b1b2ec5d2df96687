//! Compute Engine v1 wire types
//!
//! Only the fields the emulator assigns are typed. Everything else a caller sends
//! rides along in the flattened `extra` maps and comes back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const INSTANCE_KIND: &str = "compute#instance";
pub const OPERATION_KIND: &str = "compute#operation";
pub const MACHINE_TYPE_KIND: &str = "compute#machineType";

/// Host all `selfLink`s point at
pub const SELF_LINK_BASE: &str = "https://www.googleapis.com/compute/v1";

/// Body of `instances.insert`
#[derive(Debug, Clone, Deserialize)]
pub struct InsertInstance {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `scheduling` applied when the caller sends none
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scheduling {
    pub on_host_maintenance: String,
    pub automatic_restart: bool,
    pub preemptible: bool,
    pub node_affinities: Vec<Value>,
}

impl Default for Scheduling {
    fn default() -> Self {
        Self {
            on_host_maintenance: "MIGRATE".to_string(),
            automatic_restart: true,
            preemptible: false,
            node_affinities: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkInterface {
    pub name: String,
    #[serde(rename = "networkIP")]
    pub network_ip: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Rendered `compute#instance`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub kind: String,
    pub id: String,
    pub name: String,
    pub zone: String,
    pub status: String,
    pub tags: Value,
    pub scheduling: Value,
    pub network_interfaces: Vec<NetworkInterface>,
    pub creation_timestamp: String,
    pub self_link: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Instance {
    /// Keys the emulator owns; a caller's value for them never reaches `extra`
    pub const ASSIGNED_FIELDS: &'static [&'static str] = &[
        "kind",
        "id",
        "name",
        "zone",
        "status",
        "tags",
        "scheduling",
        "networkInterfaces",
        "creationTimestamp",
        "selfLink",
    ];
}

/// Zonal `compute#operation`. Emulated operations are always finished.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub kind: String,
    pub id: String,
    pub name: String,
    pub zone: String,
    pub operation_type: String,
    pub target_link: String,
    pub target_id: String,
    pub status: String,
    pub progress: u32,
    pub insert_time: String,
    pub start_time: String,
    pub end_time: String,
    pub self_link: String,
}

/// Paged list body. Serializes to `{}` when there is nothing to report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub code: u16,
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ErrorItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorItem {
    pub domain: String,
    pub reason: String,
    pub message: String,
}
