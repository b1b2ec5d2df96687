//! Process-wide interception
//!
//! Clients built with `new()` or `with_endpoint()` send through a
//! [`DispatchTransport`], which consults the provider's [`InterceptionHarness`] on
//! every call. When a transport is installed in the harness the call goes there;
//! otherwise it takes the real HTTP path.
//!
//! ```text
//! Inactive --activate--> Active --deactivate--> Inactive
//! ```
//!
//! Activation is not reentrant: a second `activate` on an active harness fails with
//! [`EmulatorError::AlreadyActive`]. [`Interception`] is the scoped form that
//! deactivates when dropped, including on early return and panic unwind.

use crate::error::{EmulatorError, Result};
use crate::store::Provider;
use crate::transport::auth::Credential;
use crate::transport::http::HttpTransport;
use crate::transport::{ApiRequest, ApiResponse, Transport};
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static GOOGLE: InterceptionHarness = InterceptionHarness::new(Provider::Google);
static AZURE: InterceptionHarness = InterceptionHarness::new(Provider::Azure);
static ORACLE: InterceptionHarness = InterceptionHarness::new(Provider::Oracle);

struct Activation {
    id: u64,
    transport: Arc<dyn Transport>,
}

/// Proof of one activation; hand it back to [`InterceptionHarness::deactivate`]
#[derive(Debug)]
#[must_use = "dropping the token leaves the harness active"]
pub struct ActivationToken {
    provider: Provider,
    id: u64,
}

impl ActivationToken {
    pub fn provider(&self) -> Provider {
        self.provider
    }
}

/// One provider's dispatch slot
pub struct InterceptionHarness {
    provider: Provider,
    slot: Mutex<Option<Activation>>,
    next_id: AtomicU64,
}

impl InterceptionHarness {
    pub const fn new(provider: Provider) -> Self {
        Self {
            provider,
            slot: parking_lot::const_mutex(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// The process-wide harness for `provider`
    pub fn global(provider: Provider) -> &'static InterceptionHarness {
        match provider {
            Provider::Google => &GOOGLE,
            Provider::Azure => &AZURE,
            Provider::Oracle => &ORACLE,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Install `transport` in the slot
    pub fn activate(
        &self,
        transport: Arc<dyn Transport>,
    ) -> std::result::Result<ActivationToken, EmulatorError> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(EmulatorError::AlreadyActive {
                provider: self.provider,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        *slot = Some(Activation { id, transport });
        tracing::info!("{} interception activated", self.provider);

        Ok(ActivationToken {
            provider: self.provider,
            id,
        })
    }

    /// Empty the slot, restoring the real call path
    pub fn deactivate(&self, token: ActivationToken) {
        let mut slot = self.slot.lock();
        match slot.as_ref() {
            Some(active) if active.id == token.id && token.provider == self.provider => {
                *slot = None;
                tracing::info!("{} interception deactivated", self.provider);
            },
            _ => {
                tracing::warn!(
                    "Ignoring stale {} activation token {} for the {} harness",
                    token.provider,
                    token.id,
                    self.provider
                );
            },
        }
    }

    pub fn is_active(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Installed transport, if any
    pub fn current(&self) -> Option<Arc<dyn Transport>> {
        self.slot.lock().as_ref().map(|a| a.transport.clone())
    }

    /// Activate for the lifetime of the returned guard
    pub fn intercept(
        &self,
        transport: Arc<dyn Transport>,
    ) -> std::result::Result<Interception<'_>, EmulatorError> {
        let token = self.activate(transport)?;
        Ok(Interception {
            harness: self,
            token: Some(token),
        })
    }
}

/// Scoped activation; dropping it deactivates the harness
pub struct Interception<'a> {
    harness: &'a InterceptionHarness,
    token: Option<ActivationToken>,
}

impl Interception<'_> {
    pub fn provider(&self) -> Provider {
        self.harness.provider
    }
}

impl Drop for Interception<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.harness.deactivate(token);
        }
    }
}

/// The dispatch point clients send through in the default (non-injected) mode
pub struct DispatchTransport {
    harness: &'static InterceptionHarness,
    fallback: Arc<dyn Transport>,
}

impl DispatchTransport {
    pub fn new(harness: &'static InterceptionHarness, fallback: Arc<dyn Transport>) -> Self {
        Self { harness, fallback }
    }
}

impl Transport for DispatchTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse>> {
        // The slot lock is released before the call is awaited
        match self.harness.current() {
            Some(transport) => Box::pin(async move { transport.send(request).await }),
            None => self.fallback.send(request),
        }
    }
}

/// Dispatching transport for `provider` that falls back to real HTTP
pub fn dispatch(provider: Provider, credential: Credential) -> Result<Arc<dyn Transport>> {
    let http = HttpTransport::new(credential)?;
    Ok(Arc::new(DispatchTransport::new(
        InterceptionHarness::global(provider),
        Arc::new(http),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;
    use url::Url;

    /// Answers every call with a fixed status
    struct Fixed(u16);

    impl Transport for Fixed {
        fn send(&self, _request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse>> {
            let status = self.0;
            Box::pin(async move {
                Ok(ApiResponse {
                    status,
                    headers: Vec::new(),
                    body: None,
                })
            })
        }
    }

    fn local_harness() -> &'static InterceptionHarness {
        Box::leak(Box::new(InterceptionHarness::new(Provider::Google)))
    }

    fn request() -> ApiRequest {
        ApiRequest::new(Method::GET, Url::parse("https://example.invalid/x").unwrap())
    }

    #[test]
    fn test_activate_and_deactivate() {
        let harness = local_harness();
        assert!(!harness.is_active());

        let token = harness.activate(Arc::new(Fixed(200))).unwrap();
        assert!(harness.is_active());
        assert_eq!(token.provider(), Provider::Google);

        harness.deactivate(token);
        assert!(!harness.is_active());
    }

    #[test]
    fn test_activation_is_not_reentrant() {
        let harness = local_harness();
        let token = harness.activate(Arc::new(Fixed(200))).unwrap();

        let err = harness.activate(Arc::new(Fixed(201))).unwrap_err();
        assert!(matches!(err, EmulatorError::AlreadyActive { provider: Provider::Google }));

        harness.deactivate(token);
        let token = harness.activate(Arc::new(Fixed(201))).unwrap();
        harness.deactivate(token);
    }

    #[test]
    fn test_stale_token_is_ignored() {
        let harness = local_harness();
        let other = Box::leak(Box::new(InterceptionHarness::new(Provider::Azure)));

        let stale = other.activate(Arc::new(Fixed(200))).unwrap();
        let token = harness.activate(Arc::new(Fixed(200))).unwrap();

        harness.deactivate(stale);
        assert!(harness.is_active());
        harness.deactivate(token);
        assert!(!harness.is_active());
    }

    #[test]
    fn test_guard_deactivates_on_drop() {
        let harness = local_harness();
        {
            let guard = harness.intercept(Arc::new(Fixed(200))).unwrap();
            assert_eq!(guard.provider(), Provider::Google);
            assert!(harness.is_active());
        }
        assert!(!harness.is_active());
    }

    #[test]
    fn test_guard_deactivates_on_panic() {
        let harness = local_harness();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = harness.intercept(Arc::new(Fixed(200))).unwrap();
            panic!("test body failed");
        }));
        assert!(result.is_err());
        assert!(!harness.is_active());
    }

    #[test]
    fn test_dispatch_prefers_installed_transport() {
        let harness = local_harness();
        let dispatch = DispatchTransport::new(harness, Arc::new(Fixed(599)));

        let response = tokio_test::block_on(dispatch.send(request())).unwrap();
        assert_eq!(response.status, 599);

        let guard = harness.intercept(Arc::new(Fixed(200))).unwrap();
        let response = tokio_test::block_on(dispatch.send(request())).unwrap();
        assert_eq!(response.status, 200);

        drop(guard);
        let response = tokio_test::block_on(dispatch.send(request())).unwrap();
        assert_eq!(response.status, 599);
    }

    #[test]
    fn test_global_harnesses_are_per_provider() {
        for provider in Provider::ALL {
            assert_eq!(InterceptionHarness::global(provider).provider(), provider);
        }
    }
}
