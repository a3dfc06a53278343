//! Response classification.
//!
//! Raw status codes are not enough: gated services answer `200` to both
//! authorized and unauthorized clients, and challenge infrastructure returns
//! `403`/`503` for blocked and merely unverified traffic alike. Evidence is
//! evaluated in order, first match wins:
//!
//! 1. transport failure => `NetworkError`
//! 2. the target's rule table (negative body signatures, positive structural
//!    signatures, status-only rules, in whatever order the table lists them)
//! 3. explicit block page => `Blocked`
//! 4. challenge page => strong verification (`StrongPass` or `Fail`)
//! 5. nothing matched => `Indeterminate`

mod rules;
mod verification;

pub use rules::{Outcome, Predicate, Rule};
pub use verification::{StrongVerification, VerificationStep};

use crate::probe::{Observation, ProbeTarget, Verdict, VerdictKind};

/// Result of classifying the primary observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Verdict(Verdict),
    /// A challenge page; the verdict depends on strong verification
    Challenge { latency_ms: u64 },
}

/// Classify one observation against a target. Pure and deterministic.
pub fn classify(observation: &Observation, target: &ProbeTarget) -> Classification {
    if let Some(error) = &observation.error {
        return Classification::Verdict(Verdict::new(VerdictKind::NetworkError, error.clone(), None));
    }

    let latency = Some(observation.latency_ms);

    for (position, rule) in target.rules.iter().enumerate() {
        if rule.when.matches(observation) {
            let kind = match rule.outcome {
                Outcome::Pass => VerdictKind::Pass,
                Outcome::Fail => VerdictKind::Fail,
                Outcome::Blocked => VerdictKind::Blocked,
            };
            let detail = format!("rule #{} matched (status {})", position + 1, observation.status);
            return Classification::Verdict(Verdict::new(kind, detail, latency));
        }
    }

    if let Some(verification) = &target.verification {
        if verification.blocked.as_ref().is_some_and(|p| p.matches(observation)) {
            let detail = format!("block page (status {})", observation.status);
            return Classification::Verdict(Verdict::new(VerdictKind::Blocked, detail, latency));
        }

        if verification.challenge.matches(observation) {
            return Classification::Challenge { latency_ms: observation.latency_ms };
        }
    }

    let detail = format!("no rule matched (status {})", observation.status);
    Classification::Verdict(Verdict::new(VerdictKind::Indeterminate, detail, latency))
}
