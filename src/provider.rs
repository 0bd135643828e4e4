//! Shared plumbing for HTTP-backed embedding and generation providers.
//!
//! Every provider call runs inside [`bounded_call`]: when the deadline
//! passes, the in-flight future is dropped (which closes its connection) and
//! the caller gets [`RagError::ProviderTimeout`]. Timeouts are never retried
//! here.
//!
//! Within the deadline, [`post_json`] retries HTTP 429, 5xx and connection
//! failures with exponential backoff (1s, 2s, 4s, … capped at 32s). Other
//! 4xx responses fail immediately.

use std::future::Future;
use std::time::Duration;

use ragdesk_core::{RagError, Result};

/// Run a provider future under a deadline.
pub async fn bounded_call<T, F>(timeout: Duration, provider: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(provider, timeout_secs = timeout.as_secs(), "provider call timed out");
            Err(RagError::ProviderTimeout {
                provider: provider.to_string(),
                timeout_secs: timeout.as_secs(),
            })
        }
    }
}

/// Build an HTTP client whose own timeout matches the call deadline.
pub fn http_client(timeout: Duration) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Connection settings for one provider endpoint.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Provider name used in errors and logs (`"ollama"`, `"openai"`).
    pub provider: &'static str,
    pub url: String,
    pub bearer: Option<String>,
    pub max_retries: u32,
    pub timeout: Duration,
}

/// POST a JSON body and return the parsed JSON response.
pub async fn post_json(
    client: &reqwest::Client,
    endpoint: &Endpoint,
    body: &serde_json::Value,
) -> Result<serde_json::Value> {
    bounded_call(endpoint.timeout, endpoint.provider, post_with_retry(client, endpoint, body)).await
}

async fn post_with_retry(
    client: &reqwest::Client,
    endpoint: &Endpoint,
    body: &serde_json::Value,
) -> Result<serde_json::Value> {
    let mut last_err = None;

    for attempt in 0..=endpoint.max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(provider = endpoint.provider, attempt, ?delay, "retrying provider call");
            tokio::time::sleep(delay).await;
        }

        let mut request = client
            .post(&endpoint.url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(token) = &endpoint.bearer {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| classify_transport(endpoint, e));
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = RagError::provider(
                    endpoint.provider,
                    format!("API error {}: {}", status, body_text),
                );
                // Rate limited or server error, retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }
            Err(e) if e.is_timeout() => return Err(classify_transport(endpoint, e)),
            Err(e) => {
                last_err = Some(RagError::provider(
                    endpoint.provider,
                    format!("connection error (is {} reachable?): {}", endpoint.url, e),
                ));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| RagError::provider(endpoint.provider, "failed after retries")))
}

fn classify_transport(endpoint: &Endpoint, err: reqwest::Error) -> RagError {
    if err.is_timeout() {
        RagError::ProviderTimeout {
            provider: endpoint.provider.to_string(),
            timeout_secs: endpoint.timeout.as_secs(),
        }
    } else {
        RagError::provider(endpoint.provider, err)
    }
}
