use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use reqwest::header::ACCEPT;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{BootstrapError, Result};

const BASE_RETRY_DELAY_MS: u64 = 200;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Content negotiation for a GET
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    Any,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// GET `url`, failing on transport errors, timeouts and non-2xx statuses
    async fn get(&self, url: &str, accept: Accept, timeout: Duration) -> Result<HttpResponse>;
}

pub struct ReqwestTransport {
    client: Client,
    max_attempts: u8,
}

impl ReqwestTransport {
    pub fn new(max_attempts: u8) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("teneo-bootstrap/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            max_attempts: max_attempts.max(1),
        })
    }
}

#[async_trait]
impl HttpClient for ReqwestTransport {
    async fn get(&self, url: &str, accept: Accept, timeout: Duration) -> Result<HttpResponse> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let mut request = self.client.get(url).timeout(timeout);
            if accept == Accept::Json {
                request = request.header(ACCEPT, "application/json");
            }

            let failure = match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await?;
                    let response = HttpResponse { status, body };
                    if response.is_success() {
                        return Ok(response);
                    }
                    BootstrapError::Http(format!("GET {url} returned status {status}"))
                }
                Err(e) => BootstrapError::from(e),
            };

            if attempts >= self.max_attempts {
                tracing::debug!("GET {} failed after {} attempts: {}", url, attempts, failure);
                return Err(failure);
            }

            // Exponential backoff with jitter
            let factor = 2u64.saturating_pow(u32::from(attempts) - 1);
            let base_delay = Duration::from_millis(BASE_RETRY_DELAY_MS.saturating_mul(factor));
            let jitter = rand::thread_rng().gen_range(0.8..=1.2);
            let delay = Duration::from_millis((base_delay.as_millis() as f64 * jitter) as u64);
            let final_delay = std::cmp::min(delay, MAX_RETRY_DELAY);

            tracing::debug!(
                "GET {} attempt {} failed ({}), retrying in {:?}",
                url,
                attempts,
                failure,
                final_delay
            );
            sleep(final_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_get_sends_accept_json() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/static/config.json")
                .header("accept", "application/json");
            then.status(200).body(r#"{"activeSolution":"a","solutions":[]}"#);
        });

        let transport = ReqwestTransport::new(1).expect("client should build");
        let url = format!("{}/static/config.json", server.base_url());
        let resp = transport
            .get(&url, Accept::Json, Duration::from_secs(3))
            .await
            .expect("request should succeed");

        mock.assert();
        assert_eq!(resp.status, 200);
        assert!(resp.body.contains("activeSolution"));
    }

    #[tokio::test]
    async fn test_get_non_success_is_error() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(GET).path("/ip/");
            then.status(503).body("down");
        });

        let transport = ReqwestTransport::new(1).expect("client should build");
        let url = format!("{}/ip/", server.base_url());
        let err = transport
            .get(&url, Accept::Any, Duration::from_secs(3))
            .await
            .expect_err("503 should fail");
        assert!(matches!(err, BootstrapError::Http(_)));
    }

    #[tokio::test]
    async fn test_get_retries_up_to_max_attempts() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/flaky");
            then.status(500);
        });

        let transport = ReqwestTransport::new(2).expect("client should build");
        let url = format!("{}/flaky", server.base_url());
        let result = transport.get(&url, Accept::Any, Duration::from_secs(3)).await;

        assert!(result.is_err());
        mock.assert_calls(2);
    }
}
