//! Provider-agnostic resource records

use super::scope::Scope;
use super::Resource;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::net::Ipv4Addr;

/// Lifecycle of a virtual instance. There is no provisioning delay: an instance is
/// either still `Created` (when the cloud is configured not to start instances) or
/// `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Created,
    Running,
}

/// Virtual network interface attached to an instance
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkInterface {
    pub id: String,
    /// Identifier of the attachment joining the interface to its instance, for
    /// providers that model attachments separately
    pub attachment_id: Option<String>,
    pub name: String,
    pub private_ip: Ipv4Addr,
}

/// Virtual compute instance
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// Key the provider addresses the instance by; unique within its scope
    pub identity: String,
    /// Server-assigned unique id
    pub id: String,
    pub name: String,
    /// Zone, location or availability domain
    pub placement: String,
    pub status: InstanceStatus,
    pub created_at: DateTime<Utc>,
    pub interfaces: Vec<NetworkInterface>,
    /// Caller-supplied attributes, returned unmodified
    pub metadata: Map<String, Value>,
}

impl Resource for Instance {
    fn identity(&self) -> &str {
        &self.identity
    }
}

/// Tenancy-wide index entry from a globally unique id to the scope owning it
#[derive(Debug, Clone, PartialEq)]
pub struct Locator {
    pub identity: String,
    pub home: Scope,
    /// Identity of the instance owning this resource, when it is not itself an instance
    pub owner: Option<String>,
}

impl Resource for Locator {
    fn identity(&self) -> &str {
        &self.identity
    }
}
