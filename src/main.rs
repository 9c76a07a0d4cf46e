use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use worker_registry::{DurabilityMode, Registry, RegistryConfig, logging};

#[derive(Parser)]
#[command(name = "worker-registry")]
#[command(about = "Register, update and look up workers in a key-value ledger")]
struct Cli {
    /// Ledger directory; omit to run against a throwaway in-memory ledger
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// WAL durability: sync, async or none
    #[arg(long)]
    durability: Option<DurabilityMode>,

    /// Worker ids per lookup page
    #[arg(long)]
    page_size: Option<usize>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Call a registry function, e.g. `invoke workerLookUp 0 0 0`
    Invoke {
        function: String,
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Print every event recorded in the ledger
    Events,
    /// Snapshot the ledger and truncate its WAL
    Checkpoint,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let mut config = RegistryConfig::from_env().context("invalid WORKER_REGISTRY_* environment")?;
    if let Some(durability) = cli.durability {
        config = config.durability(durability);
    }
    if let Some(dir) = cli.data_dir {
        config = config.data_dir(dir);
    }
    if let Some(page_size) = cli.page_size {
        config = config.page_size(page_size);
    }

    let registry = Registry::open(config).context("failed to open registry")?;

    match cli.command {
        Command::Invoke { function, args } => {
            let payload = registry
                .invoke(&function, &args)
                .await
                .map_err(|e| anyhow!("{} failed: {}", function, e))?;
            if let Some(payload) = payload {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&payload)?;
                writeln!(stdout)?;
            }
        }
        Command::Events => {
            for event in registry.ledger().events().await {
                println!(
                    "{} {} {}",
                    event.emitted_at.to_rfc3339(),
                    event.name,
                    String::from_utf8_lossy(&event.payload)
                );
            }
        }
        Command::Checkpoint => {
            registry.checkpoint().await.context("checkpoint failed")?;
            println!("checkpoint written");
        }
    }

    Ok(())
}
