//! Skyplan CLI entry point

use clap::{Parser, Subcommand};
use skyplan_core::{ContainmentPolicy, StorageConfig, DEFAULT_RECORD};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "skyplan")]
#[command(about = "Cloud architecture designs: VPCs, subnets and the services inside them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Project root; the design is stored under <root>/.skyplan
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Name of the stored design record
    #[arg(long, default_value = DEFAULT_RECORD)]
    record: String,

    /// Only allow VPC → subnet → service nesting when assigning parents
    #[arg(long)]
    strict: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the local HTTP API
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "7890")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
    /// Summarize the stored design
    Show,
    /// Print the VPC → subnet → service outline as JSON
    Hierarchy,
    /// Load the stored design, report what was repaired, and write it back
    Repair {
        /// Report only; leave the stored record untouched
        #[arg(long)]
        dry_run: bool,
    },
    /// Write the stored design to a file ("-" for stdout)
    Export { file: PathBuf },
    /// Replace the stored design with the contents of a file
    Import { file: PathBuf },
    /// Delete the stored design
    Clear,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays pipeable
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "skyplan={level},skyplan_core={level},skyplan_server={level}",
            level = log_level
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Skyplan v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Project root: {}", cli.root.display());

    let storage = StorageConfig::new(cli.root, cli.record);
    let policy = if cli.strict {
        ContainmentPolicy::Strict
    } else {
        ContainmentPolicy::Structural
    };

    match cli.command {
        Commands::Serve { port, host } => commands::serve(&storage, policy, host, port).await,
        Commands::Show => commands::show(&storage),
        Commands::Hierarchy => commands::hierarchy(&storage),
        Commands::Repair { dry_run } => commands::repair(&storage, dry_run),
        Commands::Export { file } => commands::export(&storage, &file),
        Commands::Import { file } => commands::import(&storage, policy, &file),
        Commands::Clear => commands::clear(&storage),
        Commands::Version => {
            println!("Skyplan v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
