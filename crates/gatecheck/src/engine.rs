//! Probing engine - coordinates one run.
//!
//! Registry -> lease -> scheduler -> executor -> classifier -> cache ->
//! aggregator. A run always hands back a node list: the untouched input when
//! no node is usable or no lease could be acquired, the annotated input
//! otherwise. Per-probe failures never escape as errors.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::aggregate::{self, ProbeRecord};
use crate::cache::{self, CacheEntry, CacheStore, MemoryCache};
use crate::classifier::{self, Classification};
use crate::config::ProbeConfig;
use crate::error::ConfigError;
use crate::fleet::FleetManager;
use crate::http::HttpClient;
use crate::node::{self, NodeConverter, NodeDescriptor, RawNode};
use crate::probe::{ProbeExecutor, ProbeScheduler, ProbeTarget, Verdict, VerdictKind};

/// What happened during one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Nodes supplied by the caller
    pub input: usize,
    /// Nodes the converter accepted
    pub accepted: usize,
    pub lease_pid: Option<Value>,
    /// Set when the run was abandoned before probing
    pub aborted: Option<String>,
    pub records: Vec<ProbeRecord>,
    /// Nodes that received at least one capability
    pub tagged: usize,
}

impl RunReport {
    pub fn count(&self, kind: VerdictKind) -> usize {
        self.records.iter().filter(|record| record.verdict.kind == kind).count()
    }

    pub fn passes(&self) -> usize {
        self.records.iter().filter(|record| record.verdict.is_pass()).count()
    }

    pub fn cached(&self) -> usize {
        self.records.iter().filter(|record| record.cached).count()
    }
}

/// The probing engine
pub struct ProbeEngine {
    config: Arc<ProbeConfig>,
    converter: Arc<dyn NodeConverter>,
    cache: Option<Arc<dyn CacheStore>>,
    fleet: FleetManager,
    executor: ProbeExecutor,
    scheduler: ProbeScheduler,
}

impl ProbeEngine {
    /// Build an engine, validating the configuration once
    pub fn new(
        config: ProbeConfig,
        http: Arc<dyn HttpClient>,
        converter: Arc<dyn NodeConverter>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let config = Arc::new(config);

        let cache: Option<Arc<dyn CacheStore>> =
            if config.cache { Some(Arc::new(MemoryCache::new())) } else { None };

        Ok(Self {
            fleet: FleetManager::new(http.clone(), config.fleet.clone()),
            executor: ProbeExecutor::new(http, config.clone()),
            scheduler: ProbeScheduler::new(config.concurrency),
            converter,
            cache,
            config,
        })
    }

    /// Use `store` for cached verdicts. Ignored unless caching is enabled.
    pub fn with_cache(mut self, store: Arc<dyn CacheStore>) -> Self {
        if self.config.cache {
            self.cache = Some(store);
        }
        self
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probe every node and return the annotated list
    pub async fn run(&self, nodes: Vec<RawNode>) -> Vec<RawNode> {
        self.run_with_report(nodes).await.0
    }

    /// Probe every node, returning the annotated list and a report
    pub async fn run_with_report(&self, mut nodes: Vec<RawNode>) -> (Vec<RawNode>, RunReport) {
        let descriptors = node::register(&nodes, self.converter.as_ref());
        let mut report = RunReport { input: nodes.len(), accepted: descriptors.len(), ..Default::default() };

        if descriptors.is_empty() {
            info!("No usable nodes among {} inputs, nothing to probe", nodes.len());
            return (nodes, report);
        }

        let duration = self.config.lease_duration(descriptors.len());
        let lease = match self.fleet.lease(&descriptors, duration).await {
            Ok(lease) => lease,
            Err(e) => {
                error!("Fleet lease failed, returning input unchanged: {}", e);
                report.aborted = Some(e.to_string());
                return (nodes, report);
            }
        };
        report.lease_pid = Some(lease.pid.clone());

        info!(
            "Probing {} nodes against {} targets (concurrency {})",
            descriptors.len(),
            self.config.targets.len(),
            self.scheduler.limit()
        );
        sleep(self.config.start_delay()).await;

        let targets = &self.config.targets;
        let leased = &lease;
        let tasks: Vec<_> = descriptors
            .iter()
            .enumerate()
            .flat_map(move |(position, descriptor)| {
                let endpoint = leased.endpoint(position);
                targets
                    .iter()
                    .enumerate()
                    .map(move |(target_index, target)| self.probe_task(descriptor, endpoint, target_index, target))
            })
            .collect();

        let records = self.scheduler.run(tasks, |record: &ProbeRecord| record.verdict.is_pass()).await;

        if let Err(e) = self.fleet.release(&lease).await {
            warn!("Fleet release failed (ignored, lease expires on its own): {}", e);
        }

        report.tagged =
            aggregate::apply(&mut nodes, &descriptors, &self.config.targets, &records, self.config.tag_position);
        report.records = records;

        info!(
            "Run finished: {} nodes, {} passes ({} cached), {} nodes tagged",
            descriptors.len(),
            report.passes(),
            report.cached(),
            report.tagged
        );

        (nodes, report)
    }

    /// acquire -> attempt (with retries) -> classify -> cache write
    async fn probe_task(
        &self,
        descriptor: &NodeDescriptor,
        endpoint: Option<&str>,
        target_index: usize,
        target: &ProbeTarget,
    ) -> ProbeRecord {
        let record = |verdict: Verdict, cached: bool| ProbeRecord {
            node: descriptor.index,
            target: target_index,
            verdict,
            cached,
        };

        let cache = self
            .cache
            .as_ref()
            .map(|store| (store, cache::fingerprint(&target.flag, &target.url, &descriptor.wire)));

        if let Some((store, key)) = &cache {
            match store.get(key).await {
                Some(CacheEntry { ok: true, latency }) => {
                    debug!("Node #{} {}: cached success", descriptor.index, target.name);
                    return record(Verdict::new(VerdictKind::Pass, "cached success", latency), true);
                }
                Some(CacheEntry { ok: false, .. }) if !self.config.disable_failed_cache => {
                    debug!("Node #{} {}: cached failure", descriptor.index, target.name);
                    return record(Verdict::new(VerdictKind::Fail, "cached failure", None), true);
                }
                _ => {}
            }
        }

        let verdict = match endpoint {
            Some(endpoint) => self.evaluate(endpoint, target).await,
            None => Verdict::new(VerdictKind::NetworkError, "no endpoint leased for node", None),
        };

        debug!(
            "Node #{} ({}) {}: {} - {}",
            descriptor.index,
            descriptor.name(),
            target.name,
            verdict.kind,
            verdict.detail
        );

        if let Some((store, key)) = &cache {
            let entry =
                if verdict.is_pass() { CacheEntry::success(verdict.latency_ms) } else { CacheEntry::failure() };
            store.set(key, entry).await;
        }

        record(verdict, false)
    }

    async fn evaluate(&self, endpoint: &str, target: &ProbeTarget) -> Verdict {
        let observation = self.executor.probe(endpoint, target).await;

        match classifier::classify(&observation, target) {
            Classification::Verdict(verdict) => verdict,
            Classification::Challenge { latency_ms } => match &target.verification {
                Some(verification) => {
                    debug!("Challenge page from {} via {}, running strong verification", target.url, endpoint);
                    verification.run(&self.executor, endpoint, target, latency_ms).await
                }
                None => Verdict::new(VerdictKind::Indeterminate, "challenge page", Some(latency_ms)),
            },
        }
    }
}
