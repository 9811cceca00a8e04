use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use replica_ecs::{ComponentFactory, PrototypeRegistry};
use replica_kernel::{TreeGrowth, WorldConfig};
use replica_sync::{FailurePolicy, ReconcilerConfig};

mod session;

use session::{Session, SessionOptions};

/// Prototypes used when no file is given.
const BUILTIN_PROTOTYPES: &str = r#"[
    { "id": "marker", "name": "Marker" },
    {
        "id": "crate",
        "name": "Crate",
        "components": [
            { "type": "Collidable", "data": { "bounds": [-0.5, -0.5, 0.5, 0.5] } }
        ]
    },
    {
        "id": "lamp",
        "name": "Lamp",
        "components": [
            { "type": "Collidable", "data": { "bounds": [-0.25, -0.25, 0.25, 1.5], "hard": false } },
            { "type": "Appearance", "data": { "data": { "sprite": "lamp.png", "lit": true } } }
        ]
    }
]"#;

#[derive(Parser)]
#[command(name = "replica-cli", about = "Drive and inspect snapshot replication")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Replicate a simulated authority world to a client over a lossy queue
    Session {
        /// Number of entities the authority starts with
        #[arg(short, long, default_value = "16")]
        entities: u32,
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "30")]
        ticks: u64,
        /// Fraction of messages lost in transit, 0.0 to 1.0
        #[arg(long, default_value = "0.1")]
        drop_rate: f64,
        /// Failure policy for the client reconciler: strict or tolerant
        #[arg(long, default_value = "strict")]
        policy: FailurePolicy,
        /// Seed for entity motion and message loss
        #[arg(short, long, default_value = "42")]
        seed: u64,
        /// Linear growth step for the spatial index (doubling if omitted)
        #[arg(long)]
        tree_growth: Option<usize>,
        /// JSON file with an array of entity prototypes
        #[arg(long)]
        prototypes: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Info => {
            println!("replica-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("spatial: {}", replica_spatial::crate_info());
            println!("ecs: {}", replica_ecs::crate_info());
            println!("kernel: {}", replica_kernel::crate_info());
            println!("sync: {}", replica_sync::crate_info());
        }
        Commands::Session {
            entities,
            ticks,
            drop_rate,
            policy,
            seed,
            tree_growth,
            prototypes,
        } => {
            let mut registry = PrototypeRegistry::new();
            match prototypes {
                Some(path) => {
                    let json = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading prototypes from {}", path.display()))?;
                    registry
                        .load_json(&json)
                        .with_context(|| format!("parsing prototypes from {}", path.display()))?;
                }
                None => {
                    registry.load_json(BUILTIN_PROTOTYPES)?;
                }
            }
            anyhow::ensure!(!registry.is_empty(), "no prototypes loaded");

            let world_config = WorldConfig {
                tree_growth: tree_growth.map_or(TreeGrowth::Doubling, TreeGrowth::Linear),
                ..WorldConfig::default()
            };
            let options = SessionOptions {
                entities,
                ticks,
                drop_rate: drop_rate.clamp(0.0, 1.0),
                seed,
                world: world_config,
                reconciler: ReconcilerConfig { policy },
            };
            println!(
                "Session: entities={entities}, ticks={ticks}, drop_rate={:.2}, policy={policy}",
                options.drop_rate
            );

            let factory = ComponentFactory::with_builtins();
            let summary = Session::new(&factory, &registry, options).run()?;

            println!(
                "Messages: sent={}, dropped={}, applied={}",
                summary.sent, summary.dropped, summary.applied
            );
            println!(
                "Client: created={}, deleted={}, broken={}, skipped={}",
                summary.created, summary.deleted, summary.broken, summary.skipped
            );
            println!(
                "Authority entities={}, client entities={}, tree height={}",
                summary.authority_entities, summary.client_entities, summary.tree_height
            );
            println!("Entities within 5 units of origin: {}", summary.at_origin);
            println!(
                "Match: {}",
                if summary.mismatches == 0 { "OK" } else { "MISMATCH" }
            );
            anyhow::ensure!(
                summary.mismatches == 0,
                "{} entities differ between authority and client",
                summary.mismatches
            );
        }
    }

    Ok(())
}
