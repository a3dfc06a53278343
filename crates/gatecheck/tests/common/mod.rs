//! Shared helpers for the integration tests.
//!
//! `ScriptedClient` stands in for the network: fleet control calls are
//! answered by a scripted fleet, probe calls by a per-test handler.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;
use gatecheck::{
    HttpClient, HttpRequest, HttpResponse, Outcome, Predicate, ProbeConfig, ProbeTarget, Rule, TransportError,
};
use serde_json::{Value, json};

pub const FIRST_PORT: u16 = 40000;

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync;

/// How the scripted fleet answers `POST /start`
#[derive(Debug, Clone)]
pub enum FleetScript {
    /// `{ pid, ports }` with one port per requested node
    Healthy,
    /// Reply with this raw body and status
    Raw(u16, String),
    /// Connection refused
    Down,
}

pub struct ScriptedClient {
    fleet: FleetScript,
    stop_fails: bool,
    handler: Box<Handler>,
    requests: Mutex<Vec<(Instant, HttpRequest)>>,
}

impl ScriptedClient {
    pub fn new(
        fleet: FleetScript,
        handler: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self { fleet, stop_fails: false, handler: Box::new(handler), requests: Mutex::new(Vec::new()) })
    }

    pub fn with_failing_stop(
        handler: impl Fn(&HttpRequest) -> Result<HttpResponse, TransportError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            fleet: FleetScript::Healthy,
            stop_fails: true,
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().iter().map(|(_, request)| request.clone()).collect()
    }

    /// When each request routed through a leased endpoint was sent, on the tokio clock
    pub fn probe_times(&self) -> Vec<Instant> {
        self.requests.lock().unwrap().iter().filter(|(_, r)| r.proxy.is_some()).map(|(at, _)| *at).collect()
    }

    /// When each fleet control request was sent, on the tokio clock
    pub fn control_times(&self) -> Vec<Instant> {
        self.requests.lock().unwrap().iter().filter(|(_, r)| r.proxy.is_none()).map(|(at, _)| *at).collect()
    }

    /// Requests routed through a leased endpoint
    pub fn probe_requests(&self) -> Vec<HttpRequest> {
        self.requests().into_iter().filter(|r| r.proxy.is_some()).collect()
    }

    /// Fleet control requests whose path ends with `path`
    pub fn control_requests(&self, path: &str) -> Vec<HttpRequest> {
        self.requests().into_iter().filter(|r| r.proxy.is_none() && r.url.ends_with(path)).collect()
    }

    fn answer_fleet(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        if request.url.ends_with("/stop") {
            return if self.stop_fails {
                Err(TransportError::Connect("fleet went away".into()))
            } else {
                respond(200, "{}")
            };
        }

        match &self.fleet {
            FleetScript::Healthy => {
                let body: Value = serde_json::from_str(request.body.as_deref().unwrap_or("{}")).unwrap();
                let count = body["proxies"].as_array().map(Vec::len).unwrap_or(0);
                let ports: Vec<u16> = (0..count as u16).map(|i| FIRST_PORT + i).collect();
                respond(200, &json!({ "pid": 4242, "ports": ports }).to_string())
            }
            FleetScript::Raw(status, body) => respond(*status, body),
            FleetScript::Down => Err(TransportError::Connect("connection refused".into())),
        }
    }
}

#[async_trait]
impl HttpClient for ScriptedClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push((Instant::now(), request.clone()));
        tokio::task::yield_now().await;

        if request.proxy.is_none() {
            self.answer_fleet(&request)
        } else {
            (self.handler)(&request)
        }
    }
}

pub fn respond(status: u16, body: &str) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse { status, headers: Vec::new(), body: body.to_string() })
}

pub fn redirect(location: &str) -> Result<HttpResponse, TransportError> {
    Ok(HttpResponse { status: 302, headers: vec![("location".into(), location.into())], body: String::new() })
}

/// Position of the node a probe was routed through
pub fn node_position(request: &HttpRequest) -> usize {
    let proxy = request.proxy.as_deref().unwrap_or_default();
    let port: u16 = proxy.rsplit(':').next().and_then(|p| p.parse().ok()).unwrap_or(0);
    usize::from(port - FIRST_PORT)
}

pub fn node(name: &str, server: &str) -> Value {
    json!({ "name": name, "type": "ss", "server": server, "port": 8388, "cipher": "aes-128-gcm" })
}

/// Target passing on a bare status code
pub fn status_target(flag: &str, url: &str, status: u16) -> ProbeTarget {
    ProbeTarget {
        name: format!("{flag}-probe"),
        flag: flag.into(),
        tag: format!("[{}] ", flag.to_uppercase()),
        url: url.into(),
        method: "GET".into(),
        headers: vec![("User-Agent".into(), "Mozilla/5.0".into())],
        follow_redirects: false,
        retry_statuses: Vec::new(),
        rules: vec![Rule::new(Predicate::status(status), Outcome::Pass)],
        verification: None,
    }
}

/// Configuration without any waiting
pub fn config(targets: Vec<ProbeTarget>) -> ProbeConfig {
    ProbeConfig {
        start_delay_ms: 0,
        retry_delay_ms: 0,
        retries: 0,
        request_timeout_ms: 2000,
        concurrency: 4,
        targets,
        ..Default::default()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}
