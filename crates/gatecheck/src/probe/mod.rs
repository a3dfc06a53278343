/// Probe module - runs probes through leased endpoints
///
/// This module is responsible for:
/// - Issuing requests through a node's endpoint with retries and redirects
/// - Bounding the number of probes in flight
/// - The target, observation and verdict types shared with the classifier
pub mod executor;
pub mod scheduler;
pub mod types;

pub use executor::{Fetch, ProbeExecutor};
pub use scheduler::ProbeScheduler;
pub use types::{Observation, ProbeTarget, Verdict, VerdictKind};
