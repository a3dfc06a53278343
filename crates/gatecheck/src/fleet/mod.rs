//! Fleet lease manager.
//!
//! Asks the external fleet process to expose one local HTTP proxy endpoint per
//! accepted node for a bounded duration, and releases the lease afterwards.
//! The fleet process expires the lease on its own, so release is best-effort.

mod types;

pub use types::{StartRequest, StartResponse, StopRequest};

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::FleetConfig;
use crate::error::LeaseError;
use crate::http::{HttpClient, HttpRequest};
use crate::node::NodeDescriptor;

/// Endpoints granted for one run
#[derive(Debug, Clone, PartialEq)]
pub struct FleetLease {
    pub pid: Value,
    /// Proxy endpoint per accepted node, positionally aligned with the nodes
    pub endpoints: Vec<String>,
    pub expires_after: Duration,
}

impl FleetLease {
    /// Endpoint for the node at `position` in the accepted list
    pub fn endpoint(&self, position: usize) -> Option<&str> {
        self.endpoints.get(position).map(String::as_str)
    }
}

/// Talks to the fleet control API
pub struct FleetManager {
    client: Arc<dyn HttpClient>,
    config: FleetConfig,
}

impl FleetManager {
    pub fn new(client: Arc<dyn HttpClient>, config: FleetConfig) -> Self {
        Self { client, config }
    }

    fn control_request(&self, path: &str, body: String, timeout_ms: u64) -> HttpRequest {
        let url = format!("{}/{}", self.config.api_base(), path);
        let request = HttpRequest::post_json(url, body, Duration::from_millis(timeout_ms));
        if self.config.authorization.is_empty() {
            request
        } else {
            request.header("Authorization", self.config.authorization.as_str())
        }
    }

    /// Lease one endpoint per node for `duration`
    pub async fn lease(&self, nodes: &[NodeDescriptor], duration: Duration) -> Result<FleetLease, LeaseError> {
        let body = StartRequest {
            proxies: nodes.iter().map(|node| &node.wire).collect(),
            timeout: duration.as_millis() as u64,
        };
        let body = serde_json::to_string(&body).map_err(|e| LeaseError::Malformed(e.to_string()))?;

        debug!("Requesting fleet lease for {} nodes ({:?})", nodes.len(), duration);
        let response =
            self.client.send(self.control_request("start", body, self.config.start_timeout_ms)).await?;

        if !(200..300).contains(&response.status) {
            return Err(LeaseError::Status(response.status));
        }

        let StartResponse { pid, ports } = StartResponse::parse(&response.body, nodes.len())?;
        let endpoints = ports.into_iter().map(|port| self.config.endpoint(port)).collect();

        info!("Fleet lease acquired: pid {} for {} nodes, expires after {:?}", pid, nodes.len(), duration);

        Ok(FleetLease { pid, endpoints, expires_after: duration })
    }

    /// Release a lease
    pub async fn release(&self, lease: &FleetLease) -> Result<(), LeaseError> {
        let body = serde_json::to_string(&StopRequest { pid: [&lease.pid] })
            .map_err(|e| LeaseError::Malformed(e.to_string()))?;

        let response = self.client.send(self.control_request("stop", body, self.config.stop_timeout_ms)).await?;
        if !(200..300).contains(&response.status) {
            return Err(LeaseError::Status(response.status));
        }

        info!("Fleet lease released: pid {}", lease.pid);
        Ok(())
    }
}
