//! Multi-step strong verification for challenge pages.
//!
//! A challenge interstitial does not tell a blocked egress apart from one that
//! is merely unverified. The follow-up probes fetch resources served by the
//! same edge network (the challenge platform script, the verification widget
//! script, a diagnostic endpoint) through the same node. Only when every one of
//! them comes back acceptable is the node considered to reach the target.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Predicate;
use crate::probe::{Fetch, Observation, ProbeExecutor, ProbeTarget, Verdict, VerdictKind};

/// One follow-up resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStep {
    pub name: String,
    pub url: String,
    /// Acceptable status and body shape
    pub accept: Predicate,
}

/// Challenge handling for one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrongVerification {
    /// Recognizes a challenge page
    pub challenge: Predicate,

    /// Recognizes an explicit rate-limit or ban page
    #[serde(default)]
    pub blocked: Option<Predicate>,

    pub steps: Vec<VerificationStep>,
}

impl StrongVerification {
    /// Run every step through `endpoint` and judge the results
    pub async fn run(
        &self,
        executor: &ProbeExecutor,
        endpoint: &str,
        target: &ProbeTarget,
        latency_ms: u64,
    ) -> Verdict {
        let probes = self.steps.iter().map(|step| {
            executor.fetch(endpoint, Fetch {
                method: "GET",
                url: &step.url,
                headers: &target.headers,
                follow_redirects: false,
                retry_statuses: &[],
            })
        });

        let observations = join_all(probes).await;
        self.judge(&observations, latency_ms)
    }

    /// `StrongPass` only if every step's observation satisfies its predicate
    pub fn judge(&self, observations: &[Observation], latency_ms: u64) -> Verdict {
        if observations.len() != self.steps.len() {
            let detail = format!(
                "strong verification incomplete ({}/{} steps observed)",
                observations.len(),
                self.steps.len()
            );
            return Verdict::new(VerdictKind::Fail, detail, Some(latency_ms));
        }

        for (step, observation) in self.steps.iter().zip(observations) {
            let accepted = !observation.is_transport_failure() && step.accept.matches(observation);
            debug!("Strong verification step `{}`: status {} accepted={}", step.name, observation.status, accepted);

            if !accepted {
                let detail = match &observation.error {
                    Some(error) => format!("strong verification failed at `{}`: {}", step.name, error),
                    None => format!(
                        "strong verification failed at `{}` (status {})",
                        step.name, observation.status
                    ),
                };
                return Verdict::new(VerdictKind::Fail, detail, Some(latency_ms));
            }
        }

        let detail = format!("strong verification passed ({} steps)", self.steps.len());
        Verdict::new(VerdictKind::StrongPass, detail, Some(latency_ms))
    }
}
