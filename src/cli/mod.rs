use clap::{Parser, Subcommand};
use shroud::config::{default_config_path, PipelineConfig};
use std::path::PathBuf;

pub mod confirm;
pub mod init_config;
pub mod key;
pub mod logging;
pub mod retrieve;
pub mod stats;
pub mod submit;
pub mod version;

#[derive(Parser)]
#[command(name = "shroud")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Privacy-preserving data contribution pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file
    InitConfig {
        /// Where to write the config (default: <config dir>/shroud/config.toml)
        #[arg(long)]
        path: Option<String>,

        /// Root directory for the filesystem blob store
        #[arg(long)]
        blob_path: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Anonymize, encrypt and submit a record
    Submit {
        /// Category name (TRADING_DATA, MARKET_SIGNALS, RISK_METRICS,
        /// COMPLIANCE_DATA, ML_DATASET) or ordinal
        #[arg(long)]
        category: String,

        /// JSON record file, or "-" for stdin
        #[arg(long)]
        record: String,

        /// Path to config file
        #[arg(long)]
        config: Option<String>,

        /// Path to file containing the encryption key
        #[arg(long)]
        key_file: Option<String>,
    },

    /// Poll for finality of an earlier submission (never resubmits)
    Confirm {
        /// Confirmation id reported by submit
        #[arg(long)]
        confirmation_id: String,

        /// Path to config file
        #[arg(long)]
        config: Option<String>,

        /// Override the configured confirmation timeout (e.g. "5m")
        #[arg(long)]
        timeout: Option<String>,
    },

    /// Fetch, verify and decrypt a stored contribution
    Retrieve {
        /// Content reference to fetch
        #[arg(long, conflicts_with = "contribution_id", required_unless_present = "contribution_id")]
        reference: Option<String>,

        /// Expected integrity digest (hex) to verify against
        #[arg(long, requires = "reference")]
        digest: Option<String>,

        /// Ledger contribution id; reference and digest are read from the ledger
        #[arg(long)]
        contribution_id: Option<u64>,

        /// Path to config file
        #[arg(long)]
        config: Option<String>,

        /// Path to file containing the encryption key
        #[arg(long)]
        key_file: Option<String>,
    },

    /// Show aggregate ledger statistics
    Stats {
        /// Path to config file
        #[arg(long)]
        config: Option<String>,
    },

    /// Display version information
    Version,
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::InitConfig {
            path,
            blob_path,
            force,
        } => init_config::execute(path, blob_path, force),
        Commands::Submit {
            category,
            record,
            config,
            key_file,
        } => submit::execute(category, record, config, key_file).await,
        Commands::Confirm {
            confirmation_id,
            config,
            timeout,
        } => confirm::execute(confirmation_id, config, timeout).await,
        Commands::Retrieve {
            reference,
            digest,
            contribution_id,
            config,
            key_file,
        } => retrieve::execute(reference, digest, contribution_id, config, key_file).await,
        Commands::Stats { config } => stats::execute(config).await,
        Commands::Version => {
            version::execute();
            Ok(())
        }
    }
}

/// Load the config (explicit path, else the default file if present, else
/// built-in defaults) and start logging at its level.
pub fn load_config(path: Option<String>) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let config = match path.map(PathBuf::from) {
        Some(path) => PipelineConfig::load(&path)?,
        None => {
            let default_path = default_config_path();
            if default_path.exists() {
                PipelineConfig::load(&default_path)?
            } else {
                PipelineConfig::default()
            }
        }
    };

    logging::init_logging(&config.logging.level);
    Ok(config)
}
