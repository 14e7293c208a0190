use fedcam::metrics::analyzer;
use fedcam::policy::PolicyRegistry;
use fedcam::simulation::Simulation;
use fedcam::simulation::config::SimConfig;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{Level, info};

use tracing_subscriber;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        #[arg(short, long, default_value = "bernoulli")]
        policy: String,
        #[arg(short = 'n', long, default_value_t = 3)]
        clients: u32,
        #[arg(short, long, default_value = "2,3")]
        low_resource: String,
        #[arg(short, long, default_value_t = 300)]
        frames: u64,
        #[arg(short, long, default_value_t = 30)]
        round_interval: u64,
        #[arg(long, default_value_t = 50.0)]
        cpu_threshold: f64,
        #[arg(long, default_value_t = 0.0)]
        fps: f64,
        #[arg(long)]
        fixed_load: Option<f64>,
        #[arg(long)]
        scheduling_only: bool,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long, default_value = "logs")]
        log_dir: PathBuf,
    },

    Analyze {
        #[arg(default_value = "logs")]
        path: PathBuf,
    },

    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let program_start = Instant::now();

    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run {
            policy,
            clients,
            low_resource,
            frames,
            round_interval,
            cpu_threshold,
            fps,
            fixed_load,
            scheduling_only,
            seed,
            log_dir,
        } => {
            let config = SimConfig {
                name: format!("{}_{}", policy, clients),
                policy_name: policy,
                num_clients: clients,
                low_resource_clients: parse_id_list(&low_resource)?,
                frames,
                round_interval,
                cpu_threshold,
                fps,
                fixed_load,
                inference: !scheduling_only,
                seed,
                log_dir,
                ..SimConfig::default()
            };

            info!("FedCam: Federated Edge Inference Simulation");

            let mut sim = Simulation::new(config)?;
            sim.run().await?;
        }

        Commands::Analyze { path } => {
            analyze_results(&path)?;
        }

        Commands::List => {
            println!("\nAvailable Accuracy Policies");

            for policy in PolicyRegistry::global().list() {
                println!("  - {}", policy);
            }

            println!("\nUsage: cargo run -- run --policy <name>");
            println!("Example: cargo run -- run --policy bernoulli\n");
        }
    }

    let total_time = program_start.elapsed();
    info!("Total runtime: {:.2}s", total_time.as_secs_f64());

    Ok(())
}

fn parse_id_list(list: &str) -> Result<Vec<u32>> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }
    list.split(',')
        .map(|id| {
            id.trim()
                .parse::<u32>()
                .map_err(|_| anyhow::anyhow!("Invalid client id: {}", id))
        })
        .collect()
}

fn analyze_results(path: &std::path::Path) -> Result<()> {
    info!("Analyzing server log in: {}", path.display());

    let records = analyzer::load_server_records(path)?;

    if records.is_empty() {
        info!("No rounds recorded.");
        return Ok(());
    }

    rounds_table(&records);

    let report = analyzer::analyze(&records);
    println!(
        "Rounds: {} ({}..{})",
        report.rounds, report.first_round, report.last_round
    );
    println!("Avg Global Accuracy: {:.4}", report.avg_global_accuracy);
    println!("Avg Update Magnitude: {:.6}", report.avg_update_magnitude);
    println!();

    Ok(())
}

// TODO: Make this less prone to break
fn rounds_table(records: &[fedcam::metrics::ServerRecord]) {
    println!("\n╔═══════════╦══════════════╦══════════════╦══════════════════════╗");
    println!("║ Round     ║ Global Acc   ║ Update Mag   ║ Server Time          ║");
    println!("╠═══════════╬══════════════╬══════════════╬══════════════════════╣");

    for record in records {
        println!(
            "║ {:>9} ║ {:>12.4} ║ {:>12.6} ║ {:>20.4} ║",
            record.round, record.global_accuracy, record.global_mse, record.server_time,
        );
    }

    println!("╚═══════════╩══════════════╩══════════════╩══════════════════════╝\n");

    if let Some(best) = records.iter().max_by(|a, b| {
        a.global_accuracy.partial_cmp(&b.global_accuracy).unwrap()
    }) {
        println!(
            "Best Round: {} (accuracy {:.4})",
            best.round, best.global_accuracy
        );
    }
}
