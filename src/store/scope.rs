//! Providers and scopes
//!
//! A [`Scope`] is the addressing tuple that partitions resources: `{project, zone}`
//! for Google, `{subscription, resource-group}` for Azure and `{compartment}` for
//! Oracle. Scopes compare by provider and every key/value pair, so identical names
//! under different scopes never meet.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cloud provider whose API is emulated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Azure,
    Oracle,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Google, Provider::Azure, Provider::Oracle];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Azure => "azure",
            Provider::Oracle => "oracle",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider-specific addressing tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    provider: Provider,
    keys: Vec<(&'static str, String)>,
}

impl Scope {
    pub fn google(project: &str, zone: &str) -> Self {
        Self {
            provider: Provider::Google,
            keys: vec![("project", project.to_string()), ("zone", zone.to_string())],
        }
    }

    pub fn azure(subscription: &str, resource_group: &str) -> Self {
        Self {
            provider: Provider::Azure,
            keys: vec![
                ("subscription", subscription.to_string()),
                ("resourceGroup", resource_group.to_string()),
            ],
        }
    }

    pub fn oracle(compartment: &str) -> Self {
        Self {
            provider: Provider::Oracle,
            keys: vec![("compartment", compartment.to_string())],
        }
    }

    /// The provider-wide scope, used for identifiers that are unique across a whole
    /// account (Oracle OCIDs)
    pub fn tenancy(provider: Provider) -> Self {
        Self {
            provider,
            keys: Vec::new(),
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Value of one addressing key
    pub fn get(&self, key: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.provider)?;
        if self.keys.is_empty() {
            return f.write_str("tenancy");
        }
        let parts: Vec<String> = self
            .keys
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        f.write_str(&parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            Scope::google("foo", "bar").to_string(),
            "google:project=foo/zone=bar"
        );
        assert_eq!(
            Scope::azure("sub", "group").to_string(),
            "azure:subscription=sub/resourceGroup=group"
        );
        assert_eq!(Scope::tenancy(Provider::Oracle).to_string(), "oracle:tenancy");
    }

    #[test]
    fn test_scopes_differ_by_every_key() {
        assert_eq!(Scope::google("p", "z"), Scope::google("p", "z"));
        assert_ne!(Scope::google("p", "z"), Scope::google("p", "y"));
        assert_ne!(Scope::google("p", "z"), Scope::google("q", "z"));
        assert_ne!(Scope::oracle("c"), Scope::tenancy(Provider::Oracle));
    }

    #[test]
    fn test_get_key() {
        let scope = Scope::azure("sub", "group");
        assert_eq!(scope.get("resourceGroup"), Some("group"));
        assert_eq!(scope.get("zone"), None);
        assert_eq!(scope.provider(), Provider::Azure);
    }
}
