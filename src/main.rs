use clap::{Parser, Subcommand};
use dotenv::dotenv;
use perk_rs::perk::action::{ActionRegistry, RewardPointsAction};
use perk_rs::perk::config::{self, Loader};
use perk_rs::perk::engine::Engine;
use perk_rs::perk::server::{self, AppState};
use perk_rs::perk::telemetry::{self, TelemetryConfig};
use perk_rs::perk::{dag, metrics};

use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP ingress and rule engine
    Serve {
        /// Listen address
        #[arg(short, long, default_value = "0.0.0.0:8080")]
        addr: String,

        /// Path to the rules YAML document
        #[arg(short, long, default_value = "configs/rules.yaml")]
        rules: String,
    },
    /// Validate a rule document and report every problem found
    Check {
        /// Path to the rules YAML document
        #[arg(short, long, default_value = "configs/rules.yaml")]
        rules: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    match args.command {
        Commands::Serve { addr, rules } => serve(addr, rules).await,
        Commands::Check { rules } => check(rules),
    }
}

fn registry() -> Arc<ActionRegistry> {
    let mut registry = ActionRegistry::new();
    registry.register(Arc::new(RewardPointsAction::new()));
    Arc::new(registry)
}

fn check(rules: String) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let loader = Loader::new(&rules)?;
    let doc = loader.document();
    config::validate(&doc)?;
    let graph = dag::build(&doc, &registry())?;
    println!(
        "{rules}: ok ({} scenarios, {} graph nodes)",
        doc.scenarios.len(),
        graph.node_count()
    );
    Ok(())
}

async fn serve(addr: String, rules: String) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _telemetry = telemetry::init_metrics(TelemetryConfig {
        endpoint: std::env::var("OTEL_ENDPOINT").ok(),
        service_name: "perk-rs".to_string(),
    })?;

    let loader = Arc::new(Loader::new(&rules)?);
    let doc = loader.document();
    config::validate(&doc)?;

    let registry = registry();
    let graph = dag::build(&doc, &registry)?;
    log::info!(
        "rule graph built: {} nodes, {} scenarios",
        graph.node_count(),
        doc.scenarios.len()
    );

    let engine = Arc::new(Engine::new(graph, registry.clone(), doc.engine.clone()));

    // Hot-reload: re-validate and rebuild on every document change; any
    // failure keeps the previous graph active.
    let engine_weak: Weak<Engine> = Arc::downgrade(&engine);
    let reload_registry = registry.clone();
    loader.on_change(move |doc| {
        let Some(engine) = engine_weak.upgrade() else {
            return;
        };
        if let Err(e) = config::validate(&doc) {
            metrics::reload_failures().add(1, &[]);
            log::warn!("hot-reload skipped: rule document invalid: {e}");
            return;
        }
        match dag::build(&doc, &reload_registry) {
            Ok(graph) => {
                let nodes = graph.node_count();
                engine.swap_graph(Arc::new(graph));
                log::info!("rule graph hot-reloaded: {nodes} nodes");
            }
            Err(e) => {
                metrics::reload_failures().add(1, &[]);
                log::warn!("hot-reload skipped: graph build failed: {e}");
            }
        }
    });
    let watcher = loader.clone().watch(Duration::from_secs(2));

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            log::info!("shutdown signal received");
            shutdown.cancel();
        });
    }

    let state = AppState {
        engine: engine.clone(),
        loader: loader.clone(),
        registry,
    };
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| format!("invalid address {addr:?}: {e}"))?;
    server::serve(addr, state, shutdown).await?;

    watcher.stop().await;
    match Arc::try_unwrap(engine) {
        Ok(engine) => engine.shutdown().await,
        Err(_) => log::warn!("engine still referenced at shutdown; skipping queue drain"),
    }
    log::info!("goodbye");
    Ok(())
}
