//! reqwest-backed [`HttpClient`].

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::{Client, Method, Proxy, redirect};
use tracing::debug;

use super::{HttpClient, HttpRequest, HttpResponse};
use crate::error::TransportError;

/// Default transport. Keeps one reqwest client per proxy endpoint so that
/// connection pools are reused across the attempts made through one node.
pub struct ReqwestClient {
    user_agent: String,
    clients: Mutex<HashMap<Option<String>, Client>>,
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new(concat!("gatecheck/", env!("CARGO_PKG_VERSION")))
    }
}

impl ReqwestClient {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self { user_agent: user_agent.into(), clients: Mutex::new(HashMap::new()) }
    }

    fn client_for(&self, proxy: Option<&str>) -> Result<Client, TransportError> {
        let key = proxy.map(str::to_owned);
        let mut clients = self.clients.lock().map_err(|e| TransportError::Other(e.to_string()))?;

        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder()
            .user_agent(self.user_agent.as_str())
            .redirect(redirect::Policy::none());

        builder = match proxy {
            Some(proxy) => builder.proxy(Proxy::all(proxy)?),
            // never pick up HTTP(S)_PROXY for control calls
            None => builder.no_proxy(),
        };

        let client = builder.build()?;
        debug!("Built HTTP client for proxy {:?}", key);
        clients.insert(key, client.clone());
        Ok(client)
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let client = self.client_for(request.proxy.as_deref())?;

        let method = Method::from_bytes(request.method.to_uppercase().as_bytes())
            .map_err(|_| TransportError::Other(format!("Unsupported HTTP method: {}", request.method)))?;

        let mut http_request = client.request(method, &request.url).timeout(request.timeout);

        for (key, value) in &request.headers {
            http_request = http_request.header(key, value);
        }

        if let Some(body) = request.body {
            http_request = http_request.body(body);
        }

        let response = http_request.send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|value| (name.as_str().to_lowercase(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse { status, headers, body })
    }
}
