// CLI - Command Line Interface for the POC staking node
// Principle: Simple, clear, composable commands

pub mod config;
pub mod runner;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// POC Node - staking lifecycle and bonding state machine
#[derive(Parser, Debug)]
#[command(name = "poc-node")]
#[command(author = "POC Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "POC staking node - validators, delegations and the bonded set")]
#[command(long_about = r#"
Drives the staking state machine from a genesis document and block files.

Initialize a data directory:
  poc-node init --genesis genesis.json

Apply blocks (transactions, evidence, jail/unjail) and print validator updates:
  poc-node replay --blocks blocks.json

Export the current state as a genesis document:
  poc-node export --output exported.json
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info", env = "POC_LOG")]
    pub log_level: String,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a genesis document into a new data directory
    Init(InitCmd),

    /// Apply a file of blocks to the data directory
    Replay(ReplayCmd),

    /// Export the current state as a genesis document
    Export(ExportCmd),

    /// Check a genesis document without touching any state
    ValidateGenesis(ValidateGenesisCmd),

    /// Query staking state
    Query(QueryCmd),

    /// Consensus key management
    Key(KeyCmd),

    /// Purge chain data
    Purge(PurgeCmd),
}

/// Data directory selection shared by stateful commands
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Base path for chain data
    #[arg(short = 'd', long, env = "POC_BASE_PATH")]
    pub base_path: Option<PathBuf>,

    /// Chain name (subdirectory of the default data path)
    #[arg(long, default_value = "poc")]
    pub chain: String,
}

#[derive(Parser, Debug)]
pub struct InitCmd {
    #[command(flatten)]
    pub data: DataArgs,

    /// Genesis document (JSON)
    #[arg(long)]
    pub genesis: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ReplayCmd {
    #[command(flatten)]
    pub data: DataArgs,

    /// Block file (JSON array of blocks)
    #[arg(long)]
    pub blocks: PathBuf,

    /// Skip the invariant checks run after each block
    #[arg(long)]
    pub skip_invariants: bool,
}

#[derive(Parser, Debug)]
pub struct ExportCmd {
    #[command(flatten)]
    pub data: DataArgs,

    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Parser, Debug)]
pub struct ValidateGenesisCmd {
    /// Genesis document (JSON)
    pub file: PathBuf,
}

#[derive(Parser, Debug)]
pub struct QueryCmd {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(subcommand)]
    pub subcommand: QuerySubcommand,
}

#[derive(Subcommand, Debug)]
pub enum QuerySubcommand {
    /// A validator by operator address
    Validator { address: String },

    /// All validators, optionally filtered by status (bonded, unbonding, unbonded)
    Validators {
        #[arg(long)]
        status: Option<String>,
    },

    /// A delegation, or all delegations of a delegator
    Delegation {
        delegator: String,
        validator: Option<String>,
    },

    /// An unbonding delegation, or all unbondings of a delegator
    Unbonding {
        delegator: String,
        validator: Option<String>,
    },

    /// Redelegations of a delegator
    Redelegation {
        delegator: String,
        #[arg(long)]
        src: Option<String>,
        #[arg(long)]
        dst: Option<String>,
    },

    /// Bonded and not-bonded pool totals
    Pool,

    /// Staking parameters
    Params,
}

/// Key management commands
#[derive(Parser, Debug)]
pub struct KeyCmd {
    #[command(subcommand)]
    pub subcommand: KeySubcommand,
}

#[derive(Subcommand, Debug)]
pub enum KeySubcommand {
    /// Generate a new ed25519 consensus keypair
    Generate {
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (hex, json)
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Show the public key and consensus address of a secret or public key
    Inspect {
        /// Hex key (32 bytes)
        key: String,

        /// Treat the key as a public key
        #[arg(long)]
        public: bool,
    },
}

/// Purge chain data
#[derive(Parser, Debug)]
pub struct PurgeCmd {
    #[command(flatten)]
    pub data: DataArgs,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl DataArgs {
    /// Get the base path, defaulting to platform-specific data directory
    pub fn get_base_path(&self) -> PathBuf {
        if let Some(ref path) = self.base_path {
            path.clone()
        } else {
            let data_dir = dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("poc");

            data_dir.join("chains").join(&self.chain)
        }
    }
}
