use std::path::PathBuf;
use std::process::ExitCode;

use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chaincall::app::Session;
use chaincall::config::{self, Overrides, Settings};
use chaincall::domain::call::DEFAULT_CONFIRMATIONS;
use chaincall::domain::manifest::{resolve_address, ArgValue, CallDefinition, CallKind, Manifest};
use chaincall::infrastructure::abi::{Artifact, ArtifactScanner};
use chaincall::store::Journal;

#[derive(Debug, Parser)]
#[command(
    name = "chaincall",
    version,
    about = "One-shot contract calls, deployments and proxy upgrades"
)]
struct Args {
    /// Network from the config file (falls back to $NETWORK)
    #[arg(long, global = true)]
    network: Option<String>,

    /// JSON-RPC endpoint, overriding the network's (http, ws or .ipc path)
    #[arg(long, global = true)]
    rpc: Option<String>,

    /// Manifest of named calls
    #[arg(long, global = true)]
    manifest: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a named call from the manifest
    Run { name: String },
    /// List the manifest's calls
    List,
    /// Send a state-changing call
    Send(CallArgs),
    /// Call a view method
    Read(CallArgs),
    /// Deploy a contract
    Deploy(DeployArgs),
    /// Estimate gas for a call (with --contract) or a deployment
    Estimate(EstimateArgs),
    /// Print the implementation behind an EIP-1967 proxy
    Implementation {
        /// Proxy address or env:NAME
        proxy: String,
    },
    /// Print every item of an artifact's ABI
    Abi {
        /// Artifact path or contract name
        artifact: String,
    },
    /// Show recent submissions
    Journal {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Debug, ClapArgs)]
struct CallArgs {
    /// Contract address or env:NAME
    #[arg(long)]
    contract: String,
    /// Artifact path or contract name
    #[arg(long)]
    artifact: String,
    /// Method name, signature or 0x selector
    #[arg(long)]
    method: String,
    #[arg(long, default_value_t = DEFAULT_CONFIRMATIONS)]
    confirmations: u64,
    /// Wei, decimal or 0x-hex
    #[arg(long)]
    value: Option<String>,
    /// Arguments; arrays as [a,b], tuples as (a,b)
    args: Vec<String>,
}

#[derive(Debug, ClapArgs)]
struct DeployArgs {
    #[arg(long)]
    artifact: String,
    #[arg(long, default_value_t = DEFAULT_CONFIRMATIONS)]
    confirmations: u64,
    /// Wei sent to a payable constructor
    #[arg(long)]
    value: Option<String>,
    /// Constructor arguments
    args: Vec<String>,
}

#[derive(Debug, ClapArgs)]
struct EstimateArgs {
    #[arg(long)]
    artifact: String,
    #[arg(long, requires = "method")]
    contract: Option<String>,
    #[arg(long)]
    method: Option<String>,
    #[arg(long)]
    value: Option<String>,
    args: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(args: Args) -> Result<()> {
    let overrides = Overrides {
        network: args.network,
        rpc: args.rpc,
        manifest: args.manifest,
    };
    let settings = Settings::resolve(&config::load(), &overrides, env_var)?;

    let definition = match args.command {
        Command::Run { name } => {
            let manifest = Manifest::load(&settings.manifest_path)?;
            match manifest.get(&name) {
                Some(definition) => definition.clone(),
                None => bail!(
                    "no call named '{name}' in {}",
                    settings.manifest_path.display()
                ),
            }
        }
        Command::List => return list(&settings),
        Command::Abi { artifact } => return abi(&settings, &artifact),
        Command::Journal { limit } => return journal(&settings, limit),
        Command::Implementation { proxy } => {
            let proxy: Address = resolve_address(&proxy, env_var)?;
            let session = Session::connect(settings, false).await?;
            return print(session.implementation(proxy).await?.lines());
        }
        Command::Send(call) => call_definition(CallKind::Send, call),
        Command::Read(call) => call_definition(CallKind::Read, call),
        Command::Deploy(deploy) => CallDefinition {
            confirmations: deploy.confirmations,
            value: deploy.value,
            ..adhoc_definition(CallKind::Deploy, deploy.artifact, deploy.args)
        },
        Command::Estimate(estimate) => CallDefinition {
            contract: estimate.contract,
            method: estimate.method,
            value: estimate.value,
            ..adhoc_definition(CallKind::Estimate, estimate.artifact, estimate.args)
        },
    };

    let session = Session::connect(settings, definition.kind.submits()).await?;
    let outcome = session.run_definition(&definition, env_var).await?;
    print(outcome.lines())
}

fn list(settings: &Settings) -> Result<()> {
    let manifest = Manifest::load(&settings.manifest_path)?;
    for call in &manifest.calls {
        let target = call.contract.as_deref().unwrap_or(call.artifact.as_str());
        let method = call.method.as_deref().unwrap_or("-");
        match &call.description {
            Some(description) => println!(
                "{:<28} {:<12} {} {} - {description}",
                call.name,
                call.kind.as_str(),
                target,
                method
            ),
            None => println!(
                "{:<28} {:<12} {} {}",
                call.name,
                call.kind.as_str(),
                target,
                method
            ),
        }
    }
    Ok(())
}

fn abi(settings: &Settings, reference: &str) -> Result<()> {
    let path = ArtifactScanner::resolve(reference, &settings.artifact_roots)?;
    let artifact = Artifact::load(&path)?;
    print(artifact.describe())
}

fn journal(settings: &Settings, limit: usize) -> Result<()> {
    let path = settings.journal_path.as_deref().context("no data directory")?;
    if !path.exists() {
        println!("no submissions recorded");
        return Ok(());
    }
    let journal = Journal::open(path)?;
    for entry in journal.recent(limit)? {
        println!(
            "{} {} {} {} {} {} {}",
            entry.recorded_at,
            entry.network,
            entry.outcome,
            entry.label,
            entry.method,
            entry.tx_hash.as_deref().unwrap_or("-"),
            entry.detail.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn call_definition(kind: CallKind, call: CallArgs) -> CallDefinition {
    CallDefinition {
        contract: Some(call.contract),
        method: Some(call.method),
        confirmations: call.confirmations,
        value: call.value,
        ..adhoc_definition(kind, call.artifact, call.args)
    }
}

fn adhoc_definition(kind: CallKind, artifact: String, args: Vec<String>) -> CallDefinition {
    CallDefinition {
        name: kind.as_str().to_string(),
        kind,
        description: None,
        contract: None,
        artifact,
        method: None,
        args: args.into_iter().map(ArgValue::Text).collect(),
        confirmations: DEFAULT_CONFIRMATIONS,
        value: None,
        proxy_artifact: None,
        initializer: None,
    }
}

fn print(lines: Vec<String>) -> Result<()> {
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}
