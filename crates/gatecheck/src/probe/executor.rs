use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{sleep, timeout};
use tracing::debug;
use url::Url;

use super::types::{Observation, ProbeTarget};
use crate::config::ProbeConfig;
use crate::error::TransportError;
use crate::http::{HttpClient, HttpRequest};

/// What to fetch through an endpoint
#[derive(Debug, Clone, Copy)]
pub struct Fetch<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub headers: &'a [(String, String)],
    pub follow_redirects: bool,
    /// Statuses retried like a transport failure
    pub retry_statuses: &'a [u16],
}

impl<'a> From<&'a ProbeTarget> for Fetch<'a> {
    fn from(target: &'a ProbeTarget) -> Self {
        Self {
            method: &target.method,
            url: &target.url,
            headers: &target.headers,
            follow_redirects: target.follow_redirects,
            retry_statuses: &target.retry_statuses,
        }
    }
}

/// Probe executor - issues requests through a node's leased endpoint
pub struct ProbeExecutor {
    client: Arc<dyn HttpClient>,
    config: Arc<ProbeConfig>,
}

impl ProbeExecutor {
    pub fn new(client: Arc<dyn HttpClient>, config: Arc<ProbeConfig>) -> Self {
        Self { client, config }
    }

    /// Probe a target through `endpoint`
    pub async fn probe(&self, endpoint: &str, target: &ProbeTarget) -> Observation {
        self.fetch(endpoint, Fetch::from(target)).await
    }

    /// Fetch with retries. Never fails: transport errors come back as an
    /// observation with `status == 0` and `error` set.
    pub async fn fetch(&self, endpoint: &str, fetch: Fetch<'_>) -> Observation {
        let mut attempt = 0;

        loop {
            let observation = self.attempt(endpoint, fetch).await;

            let retryable =
                observation.is_transport_failure() || fetch.retry_statuses.contains(&observation.status);
            if !retryable || attempt >= self.config.retries {
                return observation;
            }

            attempt += 1;
            let delay = self.config.retry_delay(attempt);
            debug!(
                "Retrying {} via {} in {:?} (attempt {}/{}, last status {}, error {:?})",
                fetch.url, endpoint, delay, attempt, self.config.retries, observation.status, observation.error
            );
            sleep(delay).await;
        }
    }

    /// One attempt, following redirects when asked to
    async fn attempt(&self, endpoint: &str, fetch: Fetch<'_>) -> Observation {
        let started = Instant::now();
        let request_timeout = self.config.request_timeout();
        let mut url = fetch.url.to_string();
        let mut hops = 0;

        loop {
            let request = HttpRequest {
                method: fetch.method.to_string(),
                url: url.clone(),
                headers: fetch.headers.to_vec(),
                body: None,
                proxy: Some(endpoint.to_string()),
                timeout: request_timeout,
            };

            let response = match send_with_timeout(self.client.as_ref(), request, request_timeout).await {
                Ok(response) => response,
                Err(error) => return Observation::transport_failure(error.to_string(), elapsed_ms(started)),
            };

            if fetch.follow_redirects && (300..400).contains(&response.status) {
                let next = response.header("location").and_then(|location| resolve_location(&url, location));
                match next {
                    Some(next) if hops < self.config.max_redirects => {
                        hops += 1;
                        debug!("Following redirect {} -> {} ({} hops)", url, next, hops);
                        url = next;
                        continue;
                    }
                    Some(_) => debug!("Redirect bound {} reached at {}", self.config.max_redirects, url),
                    None => {}
                }
            }

            return Observation {
                status: response.status,
                latency_ms: elapsed_ms(started),
                headers: response.headers,
                body: response.body,
                error: None,
            };
        }
    }
}

async fn send_with_timeout(
    client: &dyn HttpClient,
    request: HttpRequest,
    limit: Duration,
) -> Result<crate::http::HttpResponse, TransportError> {
    match timeout(limit, client.send(request)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(limit)),
    }
}

/// Resolve a `Location` header against the URL that produced it
fn resolve_location(base: &str, location: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(location).ok().map(String::from)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
