//! In-process test doubles for the Google, Azure and Oracle compute APIs.
//!
//! Clients in [`google`], [`azure`] and [`oracle`] talk to their provider through a
//! [`Transport`]. Swap the transport for an emulator and the same calls are answered
//! from a [`VirtualCloud`] instead of the network:
//!
//! - injected: `google::ComputeClient::with_transport(google::emulator(&cloud))`
//! - scoped: `let _mock = mock_google()?;` redirects every client built with `new()`
//!   until the guard is dropped

pub mod azure;
pub mod catalog;
pub mod config;
pub mod emulator;
pub mod error;
pub mod google;
pub mod harness;
pub mod mock;
pub mod oracle;
pub mod store;
pub mod transport;

pub use config::EmulatorConfig;
pub use error::{EmulatorError, Error, Result};
pub use mock::{
    mock_azure, mock_azure_with, mock_google, mock_google_with, mock_oracle, mock_oracle_with,
    MockGuard, MockOptions,
};
pub use store::{Provider, Scope, VirtualCloud};
pub use transport::{ApiRequest, ApiResponse, Transport};
