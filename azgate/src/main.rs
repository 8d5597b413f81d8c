//! azgate: provision Azure resources and wait for them to converge.
//!
//! Each command loads a resource configuration from a JSON file, runs one
//! create / read / update / delete against Azure Resource Manager, and prints
//! the resulting state. Ctrl-C cancels any wait in progress.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use azgate_arm::client::DEFAULT_ENDPOINT;
use azgate_arm::{
    ArmClient, ArmConfig, ResourceData, ResourceHandler, SearchServiceHandler,
    VirtualNetworkGatewayHandler, WaitSettings,
};
use azgate_wait::{Backoff, CancellationToken};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Longest accepted timeout or poll interval: one day.
const MAX_SECS: u64 = 24 * 60 * 60;

/// Azure resource provisioning
#[derive(Parser, Debug)]
#[command(name = "azgate", version, about)]
struct Cli {
    /// Azure subscription ID
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    subscription_id: String,

    /// OAuth2 bearer token for the management API
    #[arg(long, env = "AZURE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: String,

    /// Resource Manager endpoint
    #[arg(long, env = "AZGATE_ARM_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Create/update timeout in seconds
    #[arg(long, default_value = "600", value_parser = clap::value_parser!(u64).range(1..=MAX_SECS))]
    create_timeout: u64,

    /// Delete timeout in seconds
    #[arg(long, default_value = "600", value_parser = clap::value_parser!(u64).range(1..=MAX_SECS))]
    delete_timeout: u64,

    /// First poll interval in seconds (doubles after every poll)
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u64).range(1..=MAX_SECS))]
    poll_interval: u64,

    /// Upper bound for the poll interval in seconds
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..=MAX_SECS))]
    max_poll_interval: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage a virtual network gateway
    Gateway {
        #[command(subcommand)]
        action: Action,
    },

    /// Manage a search service
    Search {
        #[command(subcommand)]
        action: Action,
    },
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Create the resource and wait until it is provisioned
    Create(ResourceArgs),
    /// Refresh the state from Azure
    Read(ResourceArgs),
    /// Apply in-place changes and wait until provisioned
    Update(ResourceArgs),
    /// Delete the resource
    Delete(ResourceArgs),
}

#[derive(Args, Debug)]
struct ResourceArgs {
    /// JSON file with the resource configuration (and `id` once created)
    #[arg(short, long)]
    file: PathBuf,

    /// Write the resulting state back to the file
    #[arg(long)]
    save: bool,
}

impl Action {
    fn verb(&self) -> &'static str {
        match self {
            Self::Create(_) => "create",
            Self::Read(_) => "read",
            Self::Update(_) => "update",
            Self::Delete(_) => "delete",
        }
    }

    fn args(&self) -> &ResourceArgs {
        match self {
            Self::Create(args) | Self::Read(args) | Self::Update(args) | Self::Delete(args) => args,
        }
    }
}

impl Cli {
    fn wait_settings(&self) -> WaitSettings {
        WaitSettings {
            create_timeout: Duration::from_secs(self.create_timeout),
            delete_timeout: Duration::from_secs(self.delete_timeout),
            backoff: Backoff::exponential(
                Duration::from_secs(self.poll_interval),
                2.0,
                Duration::from_secs(self.max_poll_interval),
            ),
        }
    }
}

fn load(path: &Path) -> Result<ResourceData> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn save(path: &Path, d: &ResourceData) -> Result<()> {
    let json = serde_json::to_string_pretty(d)?;
    fs::write(path, json + "\n").with_context(|| format!("failed to write {}", path.display()))
}

async fn run(handler: &dyn ResourceHandler, action: &Action, d: &mut ResourceData) -> Result<()> {
    let result = match action {
        Action::Create(_) => {
            if let Some(id) = d.id() {
                bail!("{} already exists: {}", handler.kind(), id);
            }
            handler.create(d).await
        }
        Action::Read(_) => handler.read(d).await,
        Action::Update(_) => handler.update(d).await,
        Action::Delete(_) => handler.delete(d).await,
    };
    result.with_context(|| format!("failed to {} {}", action.verb(), handler.kind()))
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling pending waits");
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "azgate=info,azgate_arm=info,azgate_wait=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    info!("ARM endpoint: {}", cli.endpoint);
    let client = Arc::new(ArmClient::new(
        ArmConfig::new(&cli.subscription_id, &cli.access_token).with_endpoint(&cli.endpoint),
    ));
    let settings = cli.wait_settings();

    let (handler, action): (Box<dyn ResourceHandler>, &Action) = match &cli.command {
        Commands::Gateway { action } => (
            Box::new(VirtualNetworkGatewayHandler::new(client, settings, cancel)),
            action,
        ),
        Commands::Search { action } => (
            Box::new(SearchServiceHandler::new(client, settings, cancel)),
            action,
        ),
    };

    let args = action.args();
    let mut d = load(&args.file)?;
    run(handler.as_ref(), action, &mut d).await?;

    if args.save {
        save(&args.file, &d)?;
        info!("State written to {}", args.file.display());
    }
    println!("{}", serde_json::to_string_pretty(&d)?);

    Ok(())
}
