// CLI Configuration - Convert CLI args to node config
// Principle: Clear mapping between user input and internal configuration

use crate::cli::{DataArgs, QuerySubcommand};
use crate::staking::{BondStatus, QueryRequest};
use crate::types::AccountId;
use std::path::PathBuf;

/// Nom du fichier de genèse copié dans le répertoire de données
pub const GENESIS_FILE: &str = "genesis.json";

/// Sous-répertoire RocksDB
pub const DB_DIR: &str = "db";

/// Complete node configuration derived from CLI arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Base data path
    pub base_path: PathBuf,
    /// RocksDB directory
    pub db_path: PathBuf,
    /// Genesis document kept alongside the database
    pub genesis_path: PathBuf,
    /// Run invariant checks after every block
    pub check_invariants: bool,
}

impl NodeConfig {
    pub fn from_data_args(data: &DataArgs) -> Self {
        let base_path = data.get_base_path();
        Self {
            db_path: base_path.join(DB_DIR),
            genesis_path: base_path.join(GENESIS_FILE),
            base_path,
            check_invariants: true,
        }
    }

    pub fn with_invariants(mut self, enabled: bool) -> Self {
        self.check_invariants = enabled;
        self
    }

    pub fn is_initialized(&self) -> bool {
        self.genesis_path.exists() && self.db_path.exists()
    }

    /// Commandes qui lisent l'état: le répertoire doit exister
    pub fn ensure_initialized(&self) -> Result<(), ConfigError> {
        if !self.is_initialized() {
            return Err(ConfigError::NotInitialized(self.base_path.display().to_string()));
        }
        Ok(())
    }

    /// `init` refuse d'écraser un répertoire existant
    pub fn ensure_uninitialized(&self) -> Result<(), ConfigError> {
        if self.db_path.exists() {
            return Err(ConfigError::AlreadyInitialized(self.base_path.display().to_string()));
        }
        Ok(())
    }
}

pub fn parse_account(s: &str) -> Result<AccountId, ConfigError> {
    s.parse()
        .map_err(|e| ConfigError::InvalidAddress(format!("{}: {}", s, e)))
}

pub fn parse_status(s: &str) -> Result<BondStatus, ConfigError> {
    match s.to_ascii_lowercase().as_str() {
        "bonded" => Ok(BondStatus::Bonded),
        "unbonding" => Ok(BondStatus::Unbonding),
        "unbonded" => Ok(BondStatus::Unbonded),
        _ => Err(ConfigError::InvalidStatus(s.to_string())),
    }
}

/// Traduit une sous-commande `query` en requête du module
pub fn query_request(cmd: &QuerySubcommand) -> Result<QueryRequest, ConfigError> {
    let request = match cmd {
        QuerySubcommand::Validator { address } => QueryRequest::Validator {
            address: parse_account(address)?,
        },
        QuerySubcommand::Validators { status } => QueryRequest::Validators {
            status: status.as_deref().map(parse_status).transpose()?,
        },
        QuerySubcommand::Delegation { delegator, validator } => match validator {
            Some(validator) => QueryRequest::Delegation {
                delegator: parse_account(delegator)?,
                validator: parse_account(validator)?,
            },
            None => QueryRequest::DelegatorDelegations {
                delegator: parse_account(delegator)?,
            },
        },
        QuerySubcommand::Unbonding { delegator, validator } => match validator {
            Some(validator) => QueryRequest::UnbondingDelegation {
                delegator: parse_account(delegator)?,
                validator: parse_account(validator)?,
            },
            None => QueryRequest::DelegatorUnbondingDelegations {
                delegator: parse_account(delegator)?,
            },
        },
        QuerySubcommand::Redelegation { delegator, src, dst } => QueryRequest::Redelegations {
            delegator: parse_account(delegator)?,
            src: src.as_deref().map(parse_account).transpose()?,
            dst: dst.as_deref().map(parse_account).transpose()?,
        },
        QuerySubcommand::Pool => QueryRequest::Pool,
        QuerySubcommand::Params => QueryRequest::Params,
    };
    Ok(request)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Data directory not initialized: {0} (run `poc-node init` first)")]
    NotInitialized(String),

    #[error("Data directory already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid validator status: {0} (expected bonded, unbonding or unbonded)")]
    InvalidStatus(String),
}
