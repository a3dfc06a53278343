#![warn(clippy::all, clippy::pedantic)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use gatecheck::{
    CacheStore, JsonFileCache, PassthroughConverter, ProbeEngine, RawNode, ReqwestClient, VerdictKind,
};
use tracing::{info, level_filters::LevelFilter, warn};

mod config;

use config::Config;

#[derive(Debug, Parser)]
#[command(name = "gatecheck", version)]
#[command(about = "Probe egress nodes against gated services and tag the ones that get through")]
struct Args {
    /// JSON array of node configurations
    #[arg(long, short, required_unless_present = "print_config")]
    input: Option<PathBuf>,
    /// Where to write the annotated nodes (stdout when omitted)
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Configuration file (defaults to $XDG_CONFIG_HOME/gatecheck/config.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,
    #[arg(long)]
    concurrency: Option<usize>,
    /// Per-attempt request timeout in milliseconds
    #[arg(long, value_name = "MS")]
    timeout: Option<u64>,
    #[arg(long)]
    retries: Option<u32>,
    /// Reuse verdicts from earlier probes of identical nodes
    #[arg(long, default_value_t = false)]
    cache: bool,
    /// Persist the cache to this JSON file (implies --cache)
    #[arg(long)]
    cache_file: Option<PathBuf>,
    /// Probe again when the cache holds a failure
    #[arg(long, default_value_t = false)]
    disable_failed_cache: bool,
    /// -v for debug, -vv for trace
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Print the effective configuration and exit
    #[arg(long, default_value_t = false)]
    print_config: bool,
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    }

    /// Flags win over the config file
    fn apply(&self, config: &mut Config) {
        let probe = &mut config.probe;
        if let Some(concurrency) = self.concurrency {
            probe.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            probe.request_timeout_ms = timeout;
        }
        if let Some(retries) = self.retries {
            probe.retries = retries;
        }
        if self.cache || self.cache_file.is_some() {
            probe.cache = true;
        }
        if self.disable_failed_cache {
            probe.disable_failed_cache = true;
        }
        if let Some(path) = &self.cache_file {
            config.cache_file.path = Some(path.clone());
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to load .env: {e}");
        }
    }
    logger::init_with_level(args.log_level());

    let mut config = Config::from_config(args.config.as_ref()).context("failed to load configuration")?;
    args.apply(&mut config);

    if args.print_config {
        print!("{config}");
        return Ok(());
    }

    let input = args.input.as_ref().context("--input is required")?;
    let raw = fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))?;
    let nodes: Vec<RawNode> =
        serde_json::from_str(&raw).with_context(|| format!("{} is not a JSON array of nodes", input.display()))?;

    let file_cache = match (&config.cache_file.path, config.probe.cache) {
        (Some(path), true) => Some(Arc::new(
            JsonFileCache::load(path, config.cache_file.ttl())
                .await
                .with_context(|| format!("failed to load cache file {}", path.display()))?,
        )),
        _ => None,
    };

    let http = Arc::new(ReqwestClient::default());
    let mut engine = ProbeEngine::new(config.probe, http, Arc::new(PassthroughConverter))
        .context("invalid probe configuration")?;
    if let Some(store) = &file_cache {
        engine = engine.with_cache(store.clone() as Arc<dyn CacheStore>);
    }

    let (nodes, report) = engine.run_with_report(nodes).await;

    if let Some(reason) = &report.aborted {
        warn!("Run aborted, nodes returned unchanged: {}", reason);
    }
    info!(
        "{} of {} nodes usable, {} probes: {} pass, {} strong pass, {} fail, {} blocked, {} indeterminate, \
         {} network errors ({} cached)",
        report.accepted,
        report.input,
        report.records.len(),
        report.count(VerdictKind::Pass),
        report.count(VerdictKind::StrongPass),
        report.count(VerdictKind::Fail),
        report.count(VerdictKind::Blocked),
        report.count(VerdictKind::Indeterminate),
        report.count(VerdictKind::NetworkError),
        report.cached(),
    );

    if let Some(store) = &file_cache {
        if let Err(e) = store.persist().await {
            warn!("Failed to persist cache file: {}", e);
        }
    }

    let rendered = serde_json::to_string_pretty(&nodes).context("failed to serialize nodes")?;
    match &args.output {
        Some(path) => {
            fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
            info!("Wrote {} nodes ({} tagged) to {}", nodes.len(), report.tagged, path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
