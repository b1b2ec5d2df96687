//! Microsoft.Compute wire types (api-version 2019-03-01)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const API_VERSION: &str = "2019-03-01";
pub const VM_TYPE: &str = "Microsoft.Compute/virtualMachines";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_size: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_reference: Option<ImageReference>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OsProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_username: Option<String>,
    /// Write-only; never present in responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vm_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_profile: Option<HardwareProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_profile: Option<StorageProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_profile: Option<OsProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_profile: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `VirtualMachine` resource, used both as the create body and the response
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<VirtualMachineProperties>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VirtualMachine {
    pub fn new(location: &str) -> Self {
        Self {
            location: location.to_string(),
            ..Self::default()
        }
    }

    pub fn with_hardware_profile(mut self, vm_size: &str) -> Self {
        self.properties_mut().hardware_profile = Some(HardwareProfile {
            vm_size: Some(vm_size.to_string()),
            ..HardwareProfile::default()
        });
        self
    }

    pub fn with_image(mut self, image: ImageReference) -> Self {
        self.properties_mut().storage_profile = Some(StorageProfile {
            image_reference: Some(image),
            ..StorageProfile::default()
        });
        self
    }

    pub fn with_os_profile(mut self, profile: OsProfile) -> Self {
        self.properties_mut().os_profile = Some(profile);
        self
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    pub fn properties_mut(&mut self) -> &mut VirtualMachineProperties {
        self.properties.get_or_insert_with(VirtualMachineProperties::default)
    }

    pub fn provisioning_state(&self) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.provisioning_state.as_deref())
    }
}

/// One page of `virtualMachines` list results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineListResult {
    #[serde(default)]
    pub value: Vec<VirtualMachine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_link: Option<String>,
}

/// Body of an `Azure-AsyncOperation` status URL
#[derive(Debug, Clone, Deserialize)]
pub struct OperationStatus {
    pub status: String,
    #[serde(default)]
    pub error: Option<CloudErrorBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudError {
    pub error: CloudErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudErrorBody {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_serializes_camel_case() {
        let vm = VirtualMachine::new("eastus")
            .with_hardware_profile("Standard_DS1_v2")
            .with_os_profile(OsProfile {
                computer_name: Some("instance-1".into()),
                admin_username: Some("myusername".into()),
                ..OsProfile::default()
            })
            .with_tag("env", "test");

        assert_eq!(
            serde_json::to_value(&vm).unwrap(),
            json!({
                "location": "eastus",
                "tags": {"env": "test"},
                "properties": {
                    "hardwareProfile": {"vmSize": "Standard_DS1_v2"},
                    "osProfile": {"computerName": "instance-1", "adminUsername": "myusername"}
                }
            })
        );
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let body = json!({
            "location": "westeurope",
            "zones": ["1"],
            "properties": {"licenseType": "Windows_Server", "hardwareProfile": {"vmSize": "B1s"}}
        });
        let vm: VirtualMachine = serde_json::from_value(body.clone()).unwrap();
        assert_eq!(vm.extra["zones"], json!(["1"]));
        assert_eq!(serde_json::to_value(&vm).unwrap(), body);
    }

    #[test]
    fn test_list_page_without_next_link() {
        let page: VirtualMachineListResult = serde_json::from_value(json!({"value": []})).unwrap();
        assert!(page.value.is_empty());
        assert!(page.next_link.is_none());
    }
}
