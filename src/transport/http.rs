//! HTTP transport for the real (non-emulated) call path

use super::auth::Credential;
use super::{ApiRequest, ApiResponse, Transport};
use crate::error::Result;
use futures::future::BoxFuture;
use reqwest::Client;
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    credential: Credential,
}

impl HttpTransport {
    pub fn new(credential: Credential) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("mockcloud/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, credential })
    }

    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        tracing::debug!("{} {}", request.method, request.url);

        let mut builder = self.client.request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = self.credential.token().await? {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let text = response.text().await?;

        let is_success = (200..300).contains(&status);
        if !is_success {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&text));
        }

        let body = if text.is_empty() {
            None
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => Some(value),
                // Error pages are often not JSON; keep the text for the error message
                Err(_) if !is_success => Some(Value::String(text)),
                Err(e) => return Err(e.into()),
            }
        };

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: ApiRequest) -> BoxFuture<'_, Result<ApiResponse>> {
        Box::pin(self.execute(request))
    }
}
