//! dagmod - edit files stored as Merkle DAGs

use anyhow::Context;
use cid::Cid;
use clap::{Parser, Subcommand};
use dagmod_cli::{CliConfig, Workspace};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "dagmod")]
#[command(about = "Read and edit files stored as content-addressed DAGs")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "DAGMOD_CONFIG")]
    config: Option<PathBuf>,

    /// Block store directory (overrides the configuration)
    #[arg(short, long, env = "DAGMOD_STORE")]
    store: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "DAGMOD_DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a file and print its CID
    Import {
        /// File to read, `-` for stdin
        #[arg(default_value = "-")]
        input: PathBuf,
    },
    /// Print the contents of a file
    Cat {
        cid: Cid,
        /// Byte to start at
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// Bytes to print (default: to the end)
        #[arg(long)]
        length: Option<u64>,
    },
    /// Write data into a file at an offset and print the new CID
    Write {
        cid: Cid,
        /// Byte to write at; past the end grows the file with zeros
        #[arg(long, default_value_t = 0)]
        offset: u64,
        /// File to read, `-` for stdin
        #[arg(default_value = "-")]
        input: PathBuf,
    },
    /// Shrink or grow a file and print the new CID
    Truncate { cid: Cid, size: u64 },
    /// Print size and shape of a file as JSON
    Stat { cid: Cid },
}

fn read_input(input: &Path) -> anyhow::Result<Vec<u8>> {
    if input.as_os_str() == "-" {
        let mut data = Vec::new();
        std::io::stdin().read_to_end(&mut data)?;
        return Ok(data);
    }
    std::fs::read(input).with_context(|| format!("reading {}", input.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Logs go to stderr so file contents can be piped
    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("dagmod_cli={0},dagmod_core={0},dagmod_blockstore={0}", log_level).into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = CliConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(store) = args.store {
        config.store_path = store;
    }
    tracing::debug!(?config, "configuration");

    let workspace = Workspace::open(config)?;

    match args.command {
        Command::Import { input } => {
            let data = read_input(&input)?;
            println!("{}", workspace.import(&data).await?);
        }
        Command::Cat {
            cid,
            offset,
            length,
        } => {
            let data = workspace.cat(&cid, offset, length).await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
        Command::Write { cid, offset, input } => {
            let data = read_input(&input)?;
            println!("{}", workspace.write(&cid, offset, &data).await?);
        }
        Command::Truncate { cid, size } => {
            println!("{}", workspace.truncate(&cid, size).await?);
        }
        Command::Stat { cid } => {
            let stat = workspace.stat(&cid).await?;
            println!("{}", serde_json::to_string_pretty(&stat)?);
        }
    }

    Ok(())
}
