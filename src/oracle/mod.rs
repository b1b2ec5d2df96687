//! Oracle Cloud Infrastructure Core Services
//!
//! - [`ComputeClient`] / [`VirtualNetworkClient`] - SDK-shaped clients
//! - [`OracleAdapter`] - emulation of instances, VNIC attachments, VNICs and shapes

mod adapter;
mod client;
pub mod schema;

pub use adapter::OracleAdapter;
pub use client::{
    regional_endpoint, ComputeClient, ListInstancesOptions, Response, VirtualNetworkClient,
};
pub use schema::{Instance, LaunchInstanceDetails, Shape, SortBy, SortOrder, Vnic, VnicAttachment};

use crate::emulator::Emulator;
use crate::store::VirtualCloud;
use crate::transport::Transport;
use std::sync::Arc;

/// Transport answering Core Services calls from `cloud`
pub fn emulator(cloud: &VirtualCloud) -> Arc<dyn Transport> {
    Arc::new(Emulator::new(OracleAdapter::new(cloud.clone())))
}
