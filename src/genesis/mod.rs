// Genesis - Document de genèse de la chaîne (comptes + état du staking)
use crate::bank::{BankError, StoreBank};
use crate::context::Context;
use crate::staking::genesis::{validate_genesis, GenesisError, GenesisState};
use crate::staking::{Keeper, ValidatorUpdate};
use crate::types::{rfc3339, AccountId, Coin, Hash, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

/// Date de genèse par défaut: 2025-01-01 00:00:00 UTC
pub const DEFAULT_GENESIS_TIME: Timestamp = 1_735_689_600;

pub const DEFAULT_CHAIN_ID: &str = "poc-1";

/// Compte crédité à la genèse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: AccountId,
    pub coins: Vec<Coin>,
}

/// Document de genèse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisDoc {
    pub chain_id: String,
    #[serde(with = "rfc3339")]
    pub genesis_time: Timestamp,
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
    #[serde(default)]
    pub staking: GenesisState,
}

/// Erreurs de chargement du document
#[derive(Debug, thiserror::Error)]
pub enum GenesisDocError {
    #[error("Erreur IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON invalide: {0}")]
    Json(#[from] serde_json::Error),

    #[error("chain_id must not be empty")]
    EmptyChainId,

    #[error("duplicate genesis account {0}")]
    DuplicateAccount(AccountId),

    #[error("invalid genesis coin {0}")]
    InvalidCoin(Coin),

    #[error("Erreur bank: {0}")]
    Bank(#[from] BankError),

    #[error(transparent)]
    Staking(#[from] GenesisError),
}

impl GenesisDoc {
    pub fn new(chain_id: impl Into<String>, genesis_time: Timestamp) -> Self {
        Self {
            chain_id: chain_id.into(),
            genesis_time,
            accounts: Vec::new(),
            staking: GenesisState::default(),
        }
    }

    /// Charge depuis un fichier JSON
    pub fn from_file(path: &Path) -> Result<Self, GenesisDocError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Sauvegarde vers un fichier JSON
    pub fn to_file(&self, path: &Path) -> Result<(), GenesisDocError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, GenesisDocError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Empreinte Blake3 du JSON canonique (compact)
    pub fn state_digest(&self) -> Result<Hash, GenesisDocError> {
        Ok(Hash::hash(&serde_json::to_vec(self)?))
    }

    pub fn validate(&self) -> Result<(), GenesisDocError> {
        if self.chain_id.trim().is_empty() {
            return Err(GenesisDocError::EmptyChainId);
        }
        let mut seen = BTreeSet::new();
        for account in &self.accounts {
            if !seen.insert(account.address) {
                return Err(GenesisDocError::DuplicateAccount(account.address));
            }
            if let Some(coin) = account
                .coins
                .iter()
                .find(|c| !Coin::is_valid_denom(&c.denom) || c.is_zero())
            {
                return Err(GenesisDocError::InvalidCoin(coin.clone()));
            }
        }
        validate_genesis(&self.staking)?;
        Ok(())
    }

    /// Crédite les comptes puis charge le staking; renvoie l'ensemble initial
    pub fn apply(
        &self,
        ctx: &mut Context,
        bank: &StoreBank,
        keeper: &Keeper,
    ) -> Result<Vec<ValidatorUpdate>, GenesisDocError> {
        self.validate()?;
        for account in &self.accounts {
            for coin in &account.coins {
                bank.mint_to_account(ctx.store_mut(), &account.address, coin)?;
            }
        }
        let updates = keeper.init_genesis(ctx, &self.staking)?;
        info!(
            "Genesis {} applied: {} accounts, {} validator updates",
            self.chain_id,
            self.accounts.len(),
            updates.len()
        );
        Ok(updates)
    }

    /// Reconstruit un document depuis l'état courant
    pub fn export(
        ctx: &Context,
        genesis_time: Timestamp,
        bank: &StoreBank,
        keeper: &Keeper,
    ) -> Result<Self, GenesisDocError> {
        let mut accounts: Vec<GenesisAccount> = Vec::new();
        for (address, coin) in bank.all_balances(ctx.store())? {
            match accounts.last_mut() {
                Some(last) if last.address == address => last.coins.push(coin),
                _ => accounts.push(GenesisAccount {
                    address,
                    coins: vec![coin],
                }),
            }
        }

        Ok(Self {
            chain_id: ctx.chain_id().to_string(),
            genesis_time,
            accounts,
            staking: keeper.export_genesis(ctx)?,
        })
    }
}

impl Default for GenesisDoc {
    fn default() -> Self {
        Self::new(DEFAULT_CHAIN_ID, DEFAULT_GENESIS_TIME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::BlockHeader;
    use crate::staking::ModuleCodec;
    use crate::storage::MemStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn keeper() -> Keeper {
        Keeper::new(Arc::new(ModuleCodec::new()), Arc::new(StoreBank::new()))
    }

    fn doc() -> GenesisDoc {
        let mut doc = GenesisDoc::default();
        doc.accounts.push(GenesisAccount {
            address: AccountId::from_bytes([1; 32]),
            coins: vec![Coin::new("poc", 1_000)],
        });
        doc
    }

    #[test]
    fn test_file_roundtrip_and_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("genesis.json");
        let doc = doc();
        doc.to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"genesis_time\": \"2025-01-01T00:00:00Z\""));

        let loaded = GenesisDoc::from_file(&path).unwrap();
        assert_eq!(loaded, doc);
        assert_eq!(loaded.state_digest().unwrap(), doc.state_digest().unwrap());
        assert_ne!(GenesisDoc::default().state_digest().unwrap(), doc.state_digest().unwrap());
    }

    #[test]
    fn test_validate_rejects_bad_accounts() {
        let mut dup = doc();
        dup.accounts.push(dup.accounts[0].clone());
        assert!(matches!(dup.validate(), Err(GenesisDocError::DuplicateAccount(_))));

        let mut zero = doc();
        zero.accounts[0].coins[0].amount = 0;
        assert!(matches!(zero.validate(), Err(GenesisDocError::InvalidCoin(_))));

        let mut no_chain = doc();
        no_chain.chain_id = " ".to_string();
        assert!(matches!(no_chain.validate(), Err(GenesisDocError::EmptyChainId)));
    }

    #[test]
    fn test_apply_then_export() {
        let doc = doc();
        let bank = StoreBank::new();
        let k = keeper();
        let mut store = MemStore::new();
        let mut ctx = Context::new(&mut store, BlockHeader::new(&doc.chain_id, 0, doc.genesis_time));

        let updates = doc.apply(&mut ctx, &bank, &k).unwrap();
        assert!(updates.is_empty());

        let exported = GenesisDoc::export(&ctx, doc.genesis_time, &bank, &k).unwrap();
        assert_eq!(exported.accounts, doc.accounts);
        assert_eq!(exported.chain_id, "poc-1");
        assert!(exported.staking.exported);
    }
}
