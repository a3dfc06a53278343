//! Gatecheck - egress node capability probing
//!
//! Given a batch of egress node configurations, this library determines which
//! nodes can reach a set of gated remote services through their own egress
//! address, and tags each node with the capabilities it demonstrated.
//!
//! Probe traffic is always routed through local HTTP endpoints leased from an
//! external fleet process, one per node. The network, node conversion and the
//! cache store are collaborators handed to [`ProbeEngine`] at construction.

pub mod aggregate;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod fleet;
pub mod http;
pub mod node;
pub mod probe;

// Re-export main types
pub use cache::{CacheEntry, CacheStore, JsonFileCache, MemoryCache};
pub use classifier::{Outcome, Predicate, Rule, StrongVerification, VerificationStep};
pub use config::{FleetConfig, ProbeConfig, RetryBackoff, TagPosition};
pub use engine::{ProbeEngine, RunReport};
pub use error::{CacheError, ConfigError, ConvertError, LeaseError, TransportError};
pub use http::{HttpClient, HttpRequest, HttpResponse, ReqwestClient};
pub use node::{NodeConverter, NodeDescriptor, PassthroughConverter, RawNode};
pub use probe::{Observation, ProbeTarget, Verdict, VerdictKind};
