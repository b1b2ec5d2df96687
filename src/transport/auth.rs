//! Credentials for the real call path
//!
//! Emulated calls never look at credentials. Real calls attach a bearer token from
//! a [`Credential`], which for Google defaults to Application Default Credentials.

use crate::error::{Error, Result};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OnceCell, RwLock};

/// Default scopes for GCP API access
pub const DEFAULT_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

/// Token expiry buffer - refresh tokens this much before they actually expire
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if we can't determine expiry (conservative: 30 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 60);

/// Source of bearer tokens
pub trait TokenSource: Send + Sync {
    fn token(&self) -> BoxFuture<'_, Result<String>>;
}

/// How real requests authenticate
#[derive(Clone, Default)]
pub enum Credential {
    /// No `Authorization` header
    #[default]
    Anonymous,
    /// Fixed bearer token
    Bearer(String),
    /// Token fetched (and refreshed) on demand
    Source(Arc<dyn TokenSource>),
}

impl Credential {
    /// Application Default Credentials for Google APIs
    pub fn google_default() -> Self {
        Credential::Source(Arc::new(GcpCredentials::new()))
    }

    /// Bearer token for the next request, if any
    pub async fn token(&self) -> Result<Option<String>> {
        match self {
            Credential::Anonymous => Ok(None),
            Credential::Bearer(token) => Ok(Some(token.clone())),
            Credential::Source(source) => source.token().await.map(Some),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Anonymous => f.write_str("Anonymous"),
            Credential::Bearer(_) => f.write_str("Bearer([REDACTED])"),
            Credential::Source(_) => f.write_str("Source(..)"),
        }
    }
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// GCP Application Default Credentials with token caching.
///
/// The underlying provider is resolved on first use, so building a client never
/// touches the environment; only a real (non-emulated) call does.
pub struct GcpCredentials {
    provider: OnceCell<Arc<dyn gcp_auth::TokenProvider>>,
    token_cache: RwLock<Option<CachedToken>>,
}

impl GcpCredentials {
    pub fn new() -> Self {
        Self {
            provider: OnceCell::new(),
            token_cache: RwLock::new(None),
        }
    }

    async fn provider(&self) -> Result<&Arc<dyn gcp_auth::TokenProvider>> {
        self.provider
            .get_or_try_init(|| async {
                gcp_auth::provider().await.map_err(|e| {
                    Error::Credential(format!(
                        "failed to initialize GCP authentication: {}. \
                         Run 'gcloud auth application-default login'",
                        e
                    ))
                })
            })
            .await
    }

    /// Get an access token, reusing the cached one while it is valid
    pub async fn get_token(&self) -> Result<String> {
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let token = self
            .provider()
            .await?
            .token(DEFAULT_SCOPES)
            .await
            .map_err(|e| Error::Credential(format!("failed to get access token: {}", e)))?;

        let token_str = token.as_str().to_string();
        let expires_at = Instant::now() + DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER;

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token_str.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} minutes",
            (DEFAULT_TOKEN_TTL - TOKEN_EXPIRY_BUFFER).as_secs() / 60
        );

        Ok(token_str)
    }
}

impl Default for GcpCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSource for GcpCredentials {
    fn token(&self) -> BoxFuture<'_, Result<String>> {
        Box::pin(self.get_token())
    }
}
