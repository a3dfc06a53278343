//! HTTP transport seam.
//!
//! The engine never talks to the network directly. Every request, whether a
//! probe through a leased endpoint or a fleet control call, goes through an
//! [`HttpClient`] handed to the engine at construction.

mod client;

pub use client::ReqwestClient;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

/// One outbound HTTP request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Route the request through this HTTP proxy
    pub proxy: Option<String>,
    pub timeout: Duration,
}

impl HttpRequest {
    /// JSON POST, used by the fleet control API
    pub fn post_json(url: impl Into<String>, body: String, timeout: Duration) -> Self {
        Self {
            method: "POST".into(),
            url: url.into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: Some(body),
            proxy: None,
            timeout,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A received HTTP response, with header names lowercased
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Transport capable of per-request proxying and custom headers.
///
/// Implementations must not follow redirects on their own: the executor needs
/// to see the literal first-hop response.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
