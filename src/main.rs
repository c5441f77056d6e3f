use anyhow::Result;
use clap::{Parser, Subcommand};
use gaswarden::config::AnalysisConfig;

#[derive(Parser)]
#[command(
    name = "gaswarden",
    about = "Appliance-grade gas-leak monitoring and incident tracking",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon (ingestion + analysis API)
    Serve {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,

        /// SQLite database path
        #[arg(long, default_value = "data/gaswarden.db")]
        db: String,
    },

    /// Run one analysis evaluation for a device and print the verdict
    Analyze {
        /// Device to analyze
        #[arg(long)]
        device: String,

        /// SQLite database path
        #[arg(long, default_value = "data/gaswarden.db")]
        db: String,
    },

    /// List recent incidents
    Incidents {
        /// Filter by device
        #[arg(long)]
        device: Option<String>,

        /// Maximum rows to print
        #[arg(long, default_value = "20")]
        limit: usize,

        /// SQLite database path
        #[arg(long, default_value = "data/gaswarden.db")]
        db: String,
    },

    /// Write synthetic readings (for bring-up without hardware)
    Simulate {
        /// Device id to write under
        #[arg(long, default_value = "sim-01")]
        device: String,

        /// Number of samples
        #[arg(long, default_value = "300")]
        count: usize,

        /// Ramp the tail of the run into leak-level concentrations
        #[arg(long)]
        leak: bool,

        /// SQLite database path
        #[arg(long, default_value = "data/gaswarden.db")]
        db: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, db } => {
            tracing::info!(%bind, "Starting gaswarden daemon");
            gaswarden::serve(&bind, &db).await?;
        }
        Commands::Analyze { device, db } => {
            let pool = gaswarden::storage::open_pool(&db)?;
            let engine = gaswarden::build_engine(pool, AnalysisConfig::from_env())?;
            let report = engine.run_analysis(&device).await?;

            println!("\n=== Gaswarden Analysis Report ===");
            println!("Device:            {}", report.device_id);
            println!("Samples in window: {}", report.count);
            println!(
                "Baseline:          mean {:.1} ppm, sigma {:.1}",
                report.baseline.mean, report.baseline.std_dev
            );
            println!("Dynamic threshold: {:.1} ppm", report.dynamic_threshold);
            println!("Hard threshold:    {:.1} ppm", report.hard_threshold);
            if let Some(v) = report.last_value {
                println!("Last value:        {:.1} ppm", v);
            }
            match &report.classifier {
                Some(c) => println!(
                    "Classifier:        prob_leak {:.3}, label {}",
                    c.prob_leak, c.label
                ),
                None => println!("Classifier:        not engaged"),
            }
            println!(
                "Status:            {} / {}",
                report.system.mode.as_str(),
                report.system.severity.as_str()
            );
            println!("  {}", report.system.message);
            if let Some(inc) = &report.incident {
                let state = if inc.is_open { "OPEN" } else { "CLOSED" };
                println!(
                    "Incident:          {} [{}] peak {:.1} ppm",
                    inc.id, state, inc.max_value
                );
            }
            println!("=================================\n");
        }
        Commands::Incidents { device, limit, db } => {
            let pool = gaswarden::storage::open_pool(&db)?;
            let tracker = gaswarden::detect::incident::IncidentTracker::new(pool);
            let incidents = tracker.list_recent(device.as_deref(), limit)?;

            if incidents.is_empty() {
                println!("No incidents recorded.");
            } else {
                println!(
                    "{:<12} | {:<15} | {:<8} | {:<20} | {:<6} | Peak",
                    "Device", "Mode", "Severity", "Started", "Open"
                );
                println!(
                    "{:-<12}-|-{:-<15}-|-{:-<8}-|-{:-<20}-|-{:-<6}-|-{:-<8}",
                    "", "", "", "", "", ""
                );
                for i in incidents {
                    println!(
                        "{:<12} | {:<15} | {:<8} | {:<20} | {:<6} | {:.1}",
                        i.device_id,
                        i.mode.as_str(),
                        i.severity.as_str(),
                        i.start_time.format("%Y-%m-%d %H:%M:%S"),
                        i.is_open,
                        i.max_value
                    );
                }
            }
        }
        Commands::Simulate {
            device,
            count,
            leak,
            db,
        } => {
            let pool = gaswarden::storage::open_pool(&db)?;
            let written = gaswarden::simulate::generate(&pool, &device, count, leak)?;
            println!("Wrote {} synthetic readings for '{}'.", written, device);
        }
    }

    Ok(())
}
