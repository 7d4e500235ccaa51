//! Anytrust DAC node CLI

use anyhow::{Context, Result};
use anytrust_aggregator::DacClient;
use anytrust_types::{BatchRef, DataHash};
use anytrustd::{
    default_home_dir, generate_testnet_configs, start_aggregator, start_member,
    AggregatorNodeConfig, KeyFile, MemberNodeConfig, NodeSupervisor, StorageBackend,
    AGGREGATOR_CONFIG_FILENAME, MEMBER_CONFIG_FILENAME,
};
use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Anytrust data availability committee daemon
#[derive(Parser)]
#[command(name = "anytrustd")]
#[command(version)]
#[command(about = "Anytrust DAC member, aggregator and client", long_about = None)]
#[command(propagate_version = true)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Directory for config and data
    #[arg(long, global = true, default_value_os_t = default_home_dir())]
    home: PathBuf,

    /// The logging level (trace|debug|info|warn|error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// The logging format (json|plain)
    #[arg(long, global = true, default_value = "plain")]
    log_format: String,

    /// Disable colored logs
    #[arg(long, global = true, default_value = "false")]
    log_no_color: bool,

    /// Print out full error chains
    #[arg(long, global = true, default_value = "false")]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run or initialize a committee member
    Member {
        #[command(subcommand)]
        command: MemberCommands,
    },

    /// Run or initialize an aggregator
    Aggregator {
        #[command(subcommand)]
        command: AggregatorCommands,
    },

    /// Manage member BLS keys
    Keys {
        #[command(subcommand)]
        command: KeysCommands,
    },

    /// Generate or run a local committee
    Testnet {
        #[command(subcommand)]
        command: TestnetCommands,
    },

    /// Post and retrieve batches through an aggregator
    Client {
        #[command(subcommand)]
        command: ClientCommands,
    },
}

#[derive(Subcommand)]
enum MemberCommands {
    /// Write a member config with a fresh key to {home}/config/member.json
    Init {
        /// HTTP listen address
        #[arg(long, default_value = "127.0.0.1:9701")]
        listen: SocketAddr,

        /// Storage backend
        #[arg(long, value_enum, default_value = "redb")]
        storage: StorageArg,

        /// Overwrite existing configuration
        #[arg(long, default_value = "false")]
        overwrite: bool,
    },

    /// Run the member
    Start {
        /// Path to configuration file (overrides --home)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AggregatorCommands {
    /// Run the aggregator
    Start {
        /// Path to configuration file (overrides --home)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum KeysCommands {
    /// Generate a BLS key pair
    Generate {
        /// Write a key file instead of printing
        #[arg(long)]
        output: Option<PathBuf>,

        /// Replace an existing key file
        #[arg(long, default_value = "false")]
        overwrite: bool,
    },

    /// Print the public key of a member config (ANYTRUST_BLS_SECRET_KEY applies)
    Show {
        /// Path to member configuration file (overrides --home)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum TestnetCommands {
    /// Write member and aggregator configs for a local committee
    #[command(name = "init-files")]
    InitFiles {
        /// Number of members
        #[arg(short = 'n', long, default_value = "4")]
        members: usize,

        /// Members assumed honest (F)
        #[arg(long, default_value = "1")]
        assumed_honest: usize,

        /// Output directory for testnet files
        #[arg(short, long, default_value = "./testnet")]
        output: PathBuf,

        /// Aggregator port; member i listens on starting_port + 1 + i
        #[arg(long, default_value = "9700")]
        starting_port: u16,
    },

    /// Run a local committee and aggregator in this process
    Start {
        /// Number of members
        #[arg(short = 'n', long, default_value = "4")]
        members: usize,

        /// Members assumed honest (F)
        #[arg(long, default_value = "1")]
        assumed_honest: usize,

        /// Aggregator port; member i listens on starting_port + 1 + i
        #[arg(long, default_value = "9700")]
        starting_port: u16,
    },
}

#[derive(Subcommand)]
enum ClientCommands {
    /// Certify a file and print its batch reference
    Submit {
        #[command(flatten)]
        target: ClientTarget,

        /// File holding the blob
        file: PathBuf,
    },

    /// Fetch a blob by batch reference or data hash
    Fetch {
        #[command(flatten)]
        target: ClientTarget,

        /// Batch reference (hex) or data hash (hex)
        reference: String,

        /// Write the blob here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct ClientTarget {
    /// Aggregator base URL
    #[arg(long, default_value = "http://127.0.0.1:9700")]
    url: String,

    /// Aggregator config holding the trusted committee (overrides --home)
    #[arg(long)]
    committee: Option<PathBuf>,

    /// Request timeout in milliseconds
    #[arg(long, default_value = "30000")]
    timeout_ms: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum StorageArg {
    Redb,
    Memory,
}

impl From<StorageArg> for StorageBackend {
    fn from(arg: StorageArg) -> Self {
        match arg {
            StorageArg::Redb => StorageBackend::Redb,
            StorageArg::Memory => StorageBackend::Memory,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level, &cli.log_format, cli.log_no_color);
    anytrust_metrics::init();

    let result = match cli.command {
        Commands::Member { command } => cmd_member(&cli.home, command).await,
        Commands::Aggregator { command } => cmd_aggregator(&cli.home, command).await,
        Commands::Keys { command } => cmd_keys(&cli.home, command),
        Commands::Testnet { command } => cmd_testnet(command).await,
        Commands::Client { command } => cmd_client(&cli.home, command).await,
    };

    if let Err(e) = &result {
        if cli.trace {
            eprintln!("Error: {:?}", e);
        } else {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(log_level: &str, log_format: &str, no_color: bool) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(!no_color)
        .with_writer(std::io::stderr);

    match log_format {
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }
}

fn config_path(home: &Path, explicit: Option<PathBuf>, filename: &str) -> PathBuf {
    explicit.unwrap_or_else(|| home.join("config").join(filename))
}

async fn cmd_member(home: &Path, command: MemberCommands) -> Result<()> {
    match command {
        MemberCommands::Init {
            listen,
            storage,
            overwrite,
        } => {
            let path = config_path(home, None, MEMBER_CONFIG_FILENAME);
            if path.exists() && !overwrite {
                anyhow::bail!(
                    "Configuration already exists at {}. Use --overwrite to replace.",
                    path.display()
                );
            }

            let key = KeyFile::generate();
            let mut config = MemberNodeConfig::new(listen, home.join("data"));
            config.bls_secret_key_hex = Some(key.bls_secret_key_hex.clone());
            config.storage = storage.into();
            config.save(&path)?;

            println!("Successfully initialized member configuration");
            println!();
            println!("  Config:     {}", path.display());
            println!("  Listen:     {}", listen);
            println!("  Public key: {}", key.bls_public_key_hex);
            println!();
            println!("Add this member to the aggregator committee with:");
            println!(
                "  {{ \"endpoint\": \"http://{}\", \"public_key\": \"{}\" }}",
                listen, key.bls_public_key_hex
            );
            Ok(())
        }

        MemberCommands::Start { config } => {
            let path = config_path(home, config, MEMBER_CONFIG_FILENAME);
            info!(path = %path.display(), "Loading member configuration");
            let config = MemberNodeConfig::load(&path)?;

            let supervisor = NodeSupervisor::new();
            start_member(&config, &supervisor).await?;
            run_until_shutdown(&supervisor).await
        }
    }
}

async fn cmd_aggregator(home: &Path, command: AggregatorCommands) -> Result<()> {
    match command {
        AggregatorCommands::Start { config } => {
            let path = config_path(home, config, AGGREGATOR_CONFIG_FILENAME);
            info!(path = %path.display(), "Loading aggregator configuration");
            let config = AggregatorNodeConfig::load(&path)?;

            let supervisor = NodeSupervisor::new();
            start_aggregator(&config, &supervisor).await?;
            run_until_shutdown(&supervisor).await
        }
    }
}

async fn run_until_shutdown(supervisor: &NodeSupervisor) -> Result<()> {
    supervisor.wait_for_signal().await;
    supervisor.shutdown().await?;
    Ok(())
}

fn cmd_keys(home: &Path, command: KeysCommands) -> Result<()> {
    match command {
        KeysCommands::Generate { output, overwrite } => {
            let key = KeyFile::generate();
            match output {
                Some(path) => {
                    key.save(&path, overwrite)?;
                    println!("Key file: {}", path.display());
                    println!("Public key: {}", key.bls_public_key_hex);
                }
                None => {
                    println!("secret key: {}", key.bls_secret_key_hex);
                    println!("public key: {}", key.bls_public_key_hex);
                }
            }
            Ok(())
        }

        KeysCommands::Show { config } => {
            let path = config_path(home, config, MEMBER_CONFIG_FILENAME);
            let config = MemberNodeConfig::load(&path)?;
            println!("{}", config.secret_key()?.public_key().to_hex());
            Ok(())
        }
    }
}

async fn cmd_testnet(command: TestnetCommands) -> Result<()> {
    match command {
        TestnetCommands::InitFiles {
            members,
            assumed_honest,
            output,
            starting_port,
        } => {
            println!("Generating testnet configuration for {} members...", members);
            println!();

            let net = generate_testnet_configs(members, assumed_honest, &output, starting_port)?;
            for (i, member) in net.members.iter().enumerate() {
                let path = output
                    .join(format!("member{i}"))
                    .join("config")
                    .join(MEMBER_CONFIG_FILENAME);
                member.save(&path)?;
                println!("  Created member{} (listen {})", i, member.listen);
            }
            let aggregator_path = output
                .join("aggregator")
                .join("config")
                .join(AGGREGATOR_CONFIG_FILENAME);
            net.aggregator.save(&aggregator_path)?;

            let committee = net.aggregator.validate()?;
            println!("  Created aggregator (listen {})", net.aggregator.listen);
            println!();
            println!("Committee Summary:");
            println!("  Members:        {}", committee.size());
            println!("  Assumed honest: {}", committee.assumed_honest_count());
            println!("  Quorum:         {}", committee.quorum_threshold());
            println!();
            println!("To start the committee:");
            for i in 0..members {
                println!(
                    "  anytrustd member start --home {}/member{}",
                    output.display(),
                    i
                );
            }
            println!(
                "  anytrustd aggregator start --home {}/aggregator",
                output.display()
            );
            Ok(())
        }

        TestnetCommands::Start {
            members,
            assumed_honest,
            starting_port,
        } => {
            let dir = std::env::temp_dir().join(format!("anytrust-testnet-{starting_port}"));
            let mut net = generate_testnet_configs(members, assumed_honest, &dir, starting_port)?;

            let supervisor = NodeSupervisor::new();
            for member in &mut net.members {
                member.storage = StorageBackend::Memory;
                start_member(member, &supervisor).await?;
            }
            let addr = start_aggregator(&net.aggregator, &supervisor).await?;

            info!(
                members,
                assumed_honest,
                aggregator = %addr,
                "Local testnet running, press Ctrl+C to stop"
            );
            run_until_shutdown(&supervisor).await
        }
    }
}

async fn cmd_client(home: &Path, command: ClientCommands) -> Result<()> {
    match command {
        ClientCommands::Submit { target, file } => {
            let client = dac_client(home, &target)?;
            let data =
                std::fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;

            let batch_ref = client.post_batch(&data).await?;
            println!("data hash: {}", batch_ref.data_hash);
            println!("signers:   {:#x}", batch_ref.signers_mask);
            println!("batch ref: {}", batch_ref.to_hex());
            Ok(())
        }

        ClientCommands::Fetch {
            target,
            reference,
            output,
        } => {
            let client = dac_client(home, &target)?;
            let data = match BatchRef::from_hex(&reference) {
                Ok(batch_ref) => client.get_batch(&batch_ref).await?,
                Err(_) => {
                    let hash = DataHash::from_hex(&reference)
                        .context("expected a batch reference or a data hash")?;
                    client.get_batch_by_hash(&hash).await?
                }
            };

            match output {
                Some(path) => {
                    std::fs::write(&path, &data)?;
                    println!("Wrote {} bytes to {}", data.len(), path.display());
                }
                None => println!("{}", hex::encode(&data)),
            }
            Ok(())
        }
    }
}

fn dac_client(home: &Path, target: &ClientTarget) -> Result<DacClient> {
    let path = config_path(home, target.committee.clone(), AGGREGATOR_CONFIG_FILENAME);
    let committee = AggregatorNodeConfig::load(&path)?.validate()?;
    Ok(DacClient::for_committee(
        target.url.clone(),
        &committee,
        Duration::from_millis(target.timeout_ms),
    )?)
}
