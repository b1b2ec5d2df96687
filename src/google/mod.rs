//! Google Compute Engine
//!
//! - [`ComputeClient`] - SDK-shaped client (`instances()`, `machine_types()`)
//! - [`GoogleAdapter`] - emulation of the zonal `instances` and `machineTypes` collections
//! - [`filter`] - the gcloud filter language used by list calls

mod adapter;
mod client;
pub mod filter;
pub mod schema;

pub use adapter::GoogleAdapter;
pub use client::{ComputeClient, Instances, MachineTypes, Request, DEFAULT_ENDPOINT};

use crate::emulator::Emulator;
use crate::store::VirtualCloud;
use crate::transport::Transport;
use std::sync::Arc;

/// Transport answering Compute Engine calls from `cloud`
pub fn emulator(cloud: &VirtualCloud) -> Arc<dyn Transport> {
    Arc::new(Emulator::new(GoogleAdapter::new(cloud.clone())))
}
