//! OCI Core Services wire types (API version 20160918)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

pub const API_VERSION: &str = "20160918";

/// Body of `LaunchInstance`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchInstanceDetails {
    pub compartment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub freeform_tags: BTreeMap<String, String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LaunchInstanceDetails {
    pub fn new(compartment_id: &str) -> Self {
        Self {
            compartment_id: compartment_id.to_string(),
            ..Self::default()
        }
    }

    pub fn with_display_name(mut self, name: &str) -> Self {
        self.display_name = Some(name.to_string());
        self
    }

    pub fn with_availability_domain(mut self, domain: &str) -> Self {
        self.availability_domain = Some(domain.to_string());
        self
    }

    pub fn with_shape(mut self, shape: &str) -> Self {
        self.shape = Some(shape.to_string());
        self
    }

    pub fn with_freeform_tag(mut self, key: &str, value: &str) -> Self {
        self.freeform_tags.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    pub compartment_id: String,
    #[serde(default)]
    pub availability_domain: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub freeform_tags: BTreeMap<String, String>,
    pub lifecycle_state: String,
    pub time_created: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Instance {
    /// Keys the emulator owns; a caller's value for them never reaches `extra`
    pub const ASSIGNED_FIELDS: &'static [&'static str] = &[
        "id",
        "compartmentId",
        "availabilityDomain",
        "displayName",
        "shape",
        "region",
        "freeformTags",
        "lifecycleState",
        "timeCreated",
    ];
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VnicAttachment {
    pub id: String,
    pub instance_id: String,
    pub vnic_id: String,
    pub compartment_id: String,
    #[serde(default)]
    pub availability_domain: String,
    pub lifecycle_state: String,
    pub time_created: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Vnic {
    pub id: String,
    pub compartment_id: String,
    #[serde(default)]
    pub availability_domain: String,
    #[serde(default)]
    pub display_name: String,
    pub private_ip: String,
    #[serde(default)]
    pub is_primary: bool,
    pub lifecycle_state: String,
    pub time_created: DateTime<Utc>,
}

/// Compute shape from the shape catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub shape: String,
    #[serde(default)]
    pub ocpus: Option<f64>,
    #[serde(rename = "memoryInGBs", default)]
    pub memory_in_gbs: Option<f64>,
    #[serde(default)]
    pub gpus: Option<u32>,
    #[serde(default)]
    pub processor_description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    TimeCreated,
    DisplayName,
}

impl SortBy {
    pub fn as_str(self) -> &'static str {
        match self {
            SortBy::TimeCreated => "TIMECREATED",
            SortBy::DisplayName => "DISPLAYNAME",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "TIMECREATED" => Some(SortBy::TimeCreated),
            "DISPLAYNAME" => Some(SortBy::DisplayName),
            _ => None,
        }
    }

    /// Order used when the caller names a sort key but no order
    pub fn default_order(self) -> SortOrder {
        match self {
            SortBy::TimeCreated => SortOrder::Desc,
            SortBy::DisplayName => SortOrder::Asc,
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ASC" => Some(SortOrder::Asc),
            "DESC" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_launch_details_require_compartment() {
        let missing_compartment = json!({"displayName": "foo"});
        assert!(serde_json::from_value::<LaunchInstanceDetails>(missing_compartment).is_err());

        let details = LaunchInstanceDetails::new("c1").with_display_name("foo");
        assert_eq!(
            serde_json::to_value(details).unwrap(),
            json!({"compartmentId": "c1", "displayName": "foo"})
        );
    }

    #[test]
    fn test_shape_field_names() {
        let shape: Shape = serde_json::from_value(json!({
            "shape": "VM.Standard2.1",
            "ocpus": 1.0,
            "memoryInGBs": 15.0,
            "maxVnicAttachments": 2
        }))
        .unwrap();
        assert_eq!(shape.memory_in_gbs, Some(15.0));
        assert_eq!(shape.extra["maxVnicAttachments"], 2);
    }

    #[test]
    fn test_sort_defaults() {
        assert_eq!(SortBy::TimeCreated.default_order(), SortOrder::Desc);
        assert_eq!(SortBy::DisplayName.default_order(), SortOrder::Asc);
        assert_eq!(SortBy::parse("NAME"), None);
        assert_eq!(SortOrder::parse("DESC"), Some(SortOrder::Desc));
    }
}
