//! Scoped mock entry points
//!
//! Each entry point builds (or borrows) a [`VirtualCloud`], installs the provider's
//! emulator in the process-wide harness and returns a [`MockGuard`]. While the
//! guard lives, clients built with `new()` / `with_endpoint()` are answered by the
//! emulator. Dropping the guard restores the real call path and, unless the cloud
//! was shared in, discards every resource created in the scope.
//!
//! ```no_run
//! # async fn demo() -> mockcloud::error::Result<()> {
//! use mockcloud::google::ComputeClient;
//!
//! let _mock = mockcloud::mock_google()?;
//! let compute = ComputeClient::new()?;
//! let body = compute.instances().list("foo", "bar").execute().await?;
//! assert_eq!(body, serde_json::json!({}));
//! # Ok(())
//! # }
//! ```

use crate::azure::AzureAdapter;
use crate::config::{EmulatorConfig, SeedInstance};
use crate::error::EmulatorError;
use crate::google::GoogleAdapter;
use crate::harness::{Interception, InterceptionHarness};
use crate::oracle::OracleAdapter;
use crate::store::{Provider, VirtualCloud};
use crate::transport::Transport;
use crate::{azure, google, oracle};
use std::sync::Arc;

/// How a mock scope gets its virtual cloud
#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    /// Cloud to reuse; a fresh one is built from `config` when unset
    pub cloud: Option<VirtualCloud>,
    pub config: EmulatorConfig,
}

impl MockOptions {
    /// Reuse `cloud`, so state outlives the scope and is visible to other scopes
    pub fn shared(cloud: &VirtualCloud) -> Self {
        Self {
            cloud: Some(cloud.clone()),
            config: cloud.config().clone(),
        }
    }

    pub fn with_config(config: EmulatorConfig) -> Self {
        Self { cloud: None, config }
    }
}

/// Live mock scope; the interception ends when this is dropped
pub struct MockGuard {
    cloud: VirtualCloud,
    provider: Provider,
    _interception: Interception<'static>,
}

impl MockGuard {
    /// The cloud answering calls in this scope
    pub fn cloud(&self) -> &VirtualCloud {
        &self.cloud
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }
}

impl Drop for MockGuard {
    fn drop(&mut self) {
        tracing::info!("Leaving {} mock scope", self.provider);
    }
}

impl std::fmt::Debug for MockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGuard")
            .field("provider", &self.provider)
            .field("cloud", &self.cloud)
            .finish()
    }
}

/// Fresh virtual cloud with the configured seed instances created in it
pub fn fresh_cloud(config: EmulatorConfig) -> Result<VirtualCloud, EmulatorError> {
    let cloud = VirtualCloud::new(config)?;
    seed(&cloud, &cloud.config().seed)?;
    Ok(cloud)
}

/// Create `instances` through their providers' adapters
pub fn seed(cloud: &VirtualCloud, instances: &[SeedInstance]) -> Result<(), EmulatorError> {
    for instance in instances {
        match instance {
            SeedInstance::Google { project, zone, body } => {
                GoogleAdapter::new(cloud.clone()).insert(project, zone, body)?;
            },
            SeedInstance::Azure {
                subscription,
                resource_group,
                name,
                body,
            } => {
                AzureAdapter::new(cloud.clone()).create(subscription, resource_group, name, body)?;
            },
            SeedInstance::Oracle { body } => {
                OracleAdapter::new(cloud.clone()).launch(body)?;
            },
        }
    }
    if !instances.is_empty() {
        tracing::debug!("Seeded {} instances", instances.len());
    }
    Ok(())
}

fn enter(
    provider: Provider,
    options: MockOptions,
    emulator: fn(&VirtualCloud) -> Arc<dyn Transport>,
) -> Result<MockGuard, EmulatorError> {
    let cloud = match options.cloud {
        Some(cloud) => cloud,
        None => fresh_cloud(options.config)?,
    };

    let interception = InterceptionHarness::global(provider).intercept(emulator(&cloud))?;
    tracing::info!("Entered {} mock scope", provider);

    Ok(MockGuard {
        cloud,
        provider,
        _interception: interception,
    })
}

/// Emulate Google Compute Engine until the guard is dropped
pub fn mock_google() -> Result<MockGuard, EmulatorError> {
    mock_google_with(MockOptions::default())
}

pub fn mock_google_with(options: MockOptions) -> Result<MockGuard, EmulatorError> {
    enter(Provider::Google, options, google::emulator)
}

/// Emulate Azure compute until the guard is dropped
pub fn mock_azure() -> Result<MockGuard, EmulatorError> {
    mock_azure_with(MockOptions::default())
}

pub fn mock_azure_with(options: MockOptions) -> Result<MockGuard, EmulatorError> {
    enter(Provider::Azure, options, azure::emulator)
}

/// Emulate OCI Core Services until the guard is dropped
pub fn mock_oracle() -> Result<MockGuard, EmulatorError> {
    mock_oracle_with(MockOptions::default())
}

pub fn mock_oracle_with(options: MockOptions) -> Result<MockGuard, EmulatorError> {
    enter(Provider::Oracle, options, oracle::emulator)
}
