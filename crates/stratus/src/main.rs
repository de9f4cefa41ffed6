mod client;
mod commands;
mod output;

use clap::{Parser, Subcommand};
use colored::Colorize;
use commands::instance_group::{CreateArgs, IdArgs, ListArgs};
use stratus_config::ClientConfig;

#[derive(Parser)]
#[command(name = "stratus")]
#[command(about = "Stratus control plane client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List instance groups
    InstanceGroupList(ListArgs),
    /// Show details of an instance group
    InstanceGroupShow(IdArgs),
    /// Create an instance group
    InstanceGroupCreate(CreateArgs),
    /// Delete an instance group
    InstanceGroupDelete(IdArgs),
    /// Show version
    Version,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if matches!(cli.command, Commands::Version) {
        println!("stratus {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = ClientConfig::load()?;
    tracing::debug!("Using endpoint {}", config.endpoint);
    let client = client::InstanceGroupClient::new(&config);

    match cli.command {
        Commands::InstanceGroupList(args) => commands::instance_group::handle_list(&client, args).await,
        Commands::InstanceGroupShow(args) => commands::instance_group::handle_show(&client, args).await,
        Commands::InstanceGroupCreate(args) => commands::instance_group::handle_create(&client, args).await,
        Commands::InstanceGroupDelete(args) => commands::instance_group::handle_delete(&client, args).await,
        Commands::Version => Ok(()),
    }
}
