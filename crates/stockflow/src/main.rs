mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stockflow")]
#[command(about = "Serverless inventory stack: deploy it, tear it down.", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or update every resource, wire them and publish the site
    ///
    /// Reads UNIQUE_PREFIX, AWS_REGION, AWS_ACCOUNT_ID, NOTIFICATION_EMAIL and
    /// EXECUTION_ROLE_ARN (or LOADER_/QUERY_/NOTIFY_ROLE_ARN) from the
    /// environment or a .env file.
    Deploy,
    /// Delete every resource of the stack after confirmation
    ///
    /// Reads UNIQUE_PREFIX, AWS_REGION and AWS_ACCOUNT_ID.
    Teardown,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; progress and summaries to stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    stockflow_config::load_dotenv()?;

    match cli.command {
        Commands::Deploy => commands::deploy::handle().await,
        Commands::Teardown => commands::teardown::handle().await,
    }
}
