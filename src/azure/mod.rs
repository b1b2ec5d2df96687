//! Azure compute
//!
//! - [`ComputeManagementClient`] - SDK-shaped client (`virtual_machines()`)
//! - [`AzureAdapter`] - emulation of `Microsoft.Compute/virtualMachines`

mod adapter;
mod client;
pub mod schema;

pub use adapter::AzureAdapter;
pub use client::{ComputeManagementClient, Poller, VirtualMachines, DEFAULT_ENDPOINT};
pub use schema::{HardwareProfile, ImageReference, OsProfile, StorageProfile, VirtualMachine};

use crate::emulator::Emulator;
use crate::store::VirtualCloud;
use crate::transport::Transport;
use std::sync::Arc;

/// Transport answering Azure Resource Manager compute calls from `cloud`
pub fn emulator(cloud: &VirtualCloud) -> Arc<dyn Transport> {
    Arc::new(Emulator::new(AzureAdapter::new(cloud.clone())))
}
