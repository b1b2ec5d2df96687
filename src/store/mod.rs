//! Virtual resource state
//!
//! The store knows nothing about any provider's wire format. It keeps, per [`Scope`],
//! an ordered sequence of resources:
//!
//! - [`ResourceStore`] - scope-partitioned registry with unique identities per scope
//! - [`VirtualCloud`] - shared handle bundling the stores, id generator and address pool
//! - [`Instance`] / [`Locator`] - the records adapters create
//!
//! There is no way to enumerate across scopes: a listing only ever
//! sees its own scope.

mod cloud;
pub mod ids;
mod instance;
mod scope;

pub use cloud::{CloudState, VirtualCloud};
pub use instance::{Instance, InstanceStatus, Locator, NetworkInterface};
pub use scope::{Provider, Scope};

use crate::error::EmulatorError;
use std::collections::HashMap;

/// Anything the store can hold
pub trait Resource {
    /// Key that must be unique within a scope
    fn identity(&self) -> &str;
}

/// Scope-partitioned, insertion-ordered registry
#[derive(Debug, Clone)]
pub struct ResourceStore<T> {
    scopes: HashMap<Scope, Vec<T>>,
}

impl<T> Default for ResourceStore<T> {
    fn default() -> Self {
        Self {
            scopes: HashMap::new(),
        }
    }
}

impl<T: Resource + Clone> ResourceStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource to its scope, creating the scope on first write
    pub fn create(&mut self, scope: &Scope, resource: T) -> Result<T, EmulatorError> {
        let entries = self.scopes.entry(scope.clone()).or_default();

        if entries.iter().any(|r| r.identity() == resource.identity()) {
            return Err(EmulatorError::DuplicateIdentity {
                scope: scope.to_string(),
                identity: resource.identity().to_string(),
            });
        }

        entries.push(resource.clone());
        Ok(resource)
    }

    /// Resources of one scope in insertion order; empty for unknown scopes
    pub fn list(&self, scope: &Scope) -> &[T] {
        self.scopes.get(scope).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, scope: &Scope, identity: &str) -> Result<&T, EmulatorError> {
        self.list(scope)
            .iter()
            .find(|r| r.identity() == identity)
            .ok_or_else(|| EmulatorError::NotFound {
                scope: scope.to_string(),
                identity: identity.to_string(),
            })
    }

    /// Total number of resources over all scopes
    pub fn len(&self) -> usize {
        self.scopes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
