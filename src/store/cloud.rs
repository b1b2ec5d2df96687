//! Shared virtual cloud handle

use super::ids::{AddressPool, IdGenerator};
use super::instance::{Instance, InstanceStatus, Locator};
use super::scope::Scope;
use super::ResourceStore;
use crate::config::EmulatorConfig;
use crate::error::EmulatorError;
use parking_lot::Mutex;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Everything an emulated cloud remembers
pub struct CloudState {
    pub instances: ResourceStore<Instance>,
    pub locators: ResourceStore<Locator>,
    ids: IdGenerator,
    addresses: AddressPool,
}

impl CloudState {
    pub fn ids(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    pub fn allocate_ip(&mut self) -> Result<Ipv4Addr, EmulatorError> {
        self.addresses.allocate()
    }

    pub fn reserve_ip(&mut self, ip: Ipv4Addr) -> Result<(), EmulatorError> {
        self.addresses.reserve(ip)
    }

    pub fn release_ip(&mut self, ip: Ipv4Addr) {
        self.addresses.release(ip);
    }
}

struct CloudInner {
    config: EmulatorConfig,
    state: Mutex<CloudState>,
}

/// Cloneable handle to one virtual cloud. Clones share state, which is how a store
/// is shared across mock scopes.
#[derive(Clone)]
pub struct VirtualCloud {
    inner: Arc<CloudInner>,
}

impl VirtualCloud {
    pub fn new(config: EmulatorConfig) -> Result<Self, EmulatorError> {
        let addresses = AddressPool::parse(&config.network_cidr)?;
        let state = CloudState {
            instances: ResourceStore::new(),
            locators: ResourceStore::new(),
            ids: IdGenerator::new(config.id_seed),
            addresses,
        };

        Ok(Self {
            inner: Arc::new(CloudInner {
                config,
                state: Mutex::new(state),
            }),
        })
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.inner.config
    }

    /// Run `f` with exclusive access to the state. All mutation goes through here,
    /// which serializes creates across every holder of the handle.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut CloudState) -> R) -> R {
        let mut state = self.inner.state.lock();
        f(&mut state)
    }

    /// Snapshot of one scope's instances
    pub fn instances(&self, scope: &Scope) -> Vec<Instance> {
        self.with_state(|state| state.instances.list(scope).to_vec())
    }

    /// Status newly created instances start in
    pub fn initial_status(&self) -> InstanceStatus {
        if self.inner.config.start_instances {
            InstanceStatus::Running
        } else {
            InstanceStatus::Created
        }
    }

    /// Whether two handles point at the same cloud
    pub fn ptr_eq(&self, other: &VirtualCloud) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for VirtualCloud {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.inner.state.try_lock().map(|state| state.instances.len());
        f.debug_struct("VirtualCloud")
            .field("instances", &count)
            .field("config", &self.inner.config)
            .finish()
    }
}
