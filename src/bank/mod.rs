// Bank - Soldes de comptes et pools de modules
// Principe: interface étroite (SupplyKeeper) consommée par le staking

use crate::storage::{KvStore, StoreError};
use crate::types::{AccountId, Balance, Coin};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

const ACCOUNT_BALANCE_PREFIX: u8 = 0xB1;
const POOL_BALANCE_PREFIX: u8 = 0xB2;
const SUPPLY_PREFIX: u8 = 0xB3;

/// Comptes de module détenant les tokens délégués
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Pool {
    /// Tokens des validateurs Bonded
    Bonded,
    /// Tokens des validateurs Unbonding/Unbonded et des unbondings en cours
    NotBonded,
}

impl Pool {
    pub fn name(&self) -> &'static str {
        match self {
            Pool::Bonded => "bonded_tokens_pool",
            Pool::NotBonded => "not_bonded_tokens_pool",
        }
    }
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Erreurs du module bank
#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("Fonds insuffisants: {account} possède {available}, requis {required}")]
    InsufficientFunds {
        account: String,
        available: Balance,
        required: Balance,
    },

    #[error("Montant invalide: {0}")]
    InvalidAmount(String),

    #[error("Dépassement de capacité sur {0}")]
    Overflow(String),

    #[error("Erreur de stockage: {0}")]
    Store(#[from] StoreError),
}

/// Capacités de transfert attendues par le module de staking
pub trait SupplyKeeper: Send + Sync {
    /// Solde dépensable d'un compte
    fn balance(&self, store: &dyn KvStore, account: &AccountId, denom: &str) -> Result<Balance, BankError>;

    /// Solde d'un pool de module
    fn pool_balance(&self, store: &dyn KvStore, pool: Pool, denom: &str) -> Result<Balance, BankError>;

    /// Supply totale d'une dénomination
    fn supply(&self, store: &dyn KvStore, denom: &str) -> Result<Balance, BankError>;

    /// Compte -> pool (délégation)
    fn delegate_coins_from_account_to_pool(
        &self,
        store: &mut dyn KvStore,
        from: &AccountId,
        pool: Pool,
        coin: &Coin,
    ) -> Result<(), BankError>;

    /// Pool -> compte (fin d'unbonding)
    fn undelegate_coins_from_pool_to_account(
        &self,
        store: &mut dyn KvStore,
        pool: Pool,
        to: &AccountId,
        coin: &Coin,
    ) -> Result<(), BankError>;

    /// Pool -> pool (changement de statut)
    fn send_coins_from_pool_to_pool(
        &self,
        store: &mut dyn KvStore,
        from: Pool,
        to: Pool,
        coin: &Coin,
    ) -> Result<(), BankError>;

    /// Destruction (slash)
    fn burn_coins(&self, store: &mut dyn KvStore, pool: Pool, coin: &Coin) -> Result<(), BankError>;

    /// Création dans un pool (genèse)
    fn mint_coins(&self, store: &mut dyn KvStore, pool: Pool, coin: &Coin) -> Result<(), BankError>;
}

/// Implémentation adossée au même store que le staking.
///
/// Les soldes vivent dans le store de bloc, donc une surcouche abandonnée
/// annule aussi les transferts.
#[derive(Debug, Clone, Default)]
pub struct StoreBank;

impl StoreBank {
    pub fn new() -> Self {
        Self
    }

    fn account_key(account: &AccountId, denom: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(1 + 32 + denom.len());
        key.push(ACCOUNT_BALANCE_PREFIX);
        key.extend_from_slice(account.as_bytes());
        key.extend_from_slice(denom.as_bytes());
        key
    }

    fn pool_key(pool: Pool, denom: &str) -> Vec<u8> {
        let name = pool.name();
        let mut key = Vec::with_capacity(2 + name.len() + denom.len());
        key.push(POOL_BALANCE_PREFIX);
        key.extend_from_slice(name.as_bytes());
        key.push(b'/');
        key.extend_from_slice(denom.as_bytes());
        key
    }

    fn supply_key(denom: &str) -> Vec<u8> {
        let mut key = vec![SUPPLY_PREFIX];
        key.extend_from_slice(denom.as_bytes());
        key
    }

    fn read(store: &dyn KvStore, key: &[u8]) -> Result<Balance, BankError> {
        match store.get(key)? {
            Some(bytes) => {
                let raw: [u8; 16] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::ReadFailed("balance corrompue".to_string()))?;
                Ok(Balance::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }

    fn write(store: &mut dyn KvStore, key: &[u8], amount: Balance) -> Result<(), BankError> {
        if amount == 0 {
            store.delete(key)?;
        } else {
            store.set(key, &amount.to_be_bytes())?;
        }
        Ok(())
    }

    fn debit(store: &mut dyn KvStore, key: &[u8], owner: String, amount: Balance) -> Result<(), BankError> {
        let available = Self::read(store, key)?;
        let remaining = available
            .checked_sub(amount)
            .ok_or(BankError::InsufficientFunds {
                account: owner,
                available,
                required: amount,
            })?;
        Self::write(store, key, remaining)
    }

    fn credit(store: &mut dyn KvStore, key: &[u8], owner: String, amount: Balance) -> Result<(), BankError> {
        let current = Self::read(store, key)?;
        let updated = current.checked_add(amount).ok_or(BankError::Overflow(owner))?;
        Self::write(store, key, updated)
    }

    fn check_amount(coin: &Coin) -> Result<(), BankError> {
        if !coin.is_positive() {
            return Err(BankError::InvalidAmount(coin.to_string()));
        }
        Ok(())
    }

    /// Crédite un compte en créant la supply (comptes de genèse)
    pub fn mint_to_account(&self, store: &mut dyn KvStore, account: &AccountId, coin: &Coin) -> Result<(), BankError> {
        Self::check_amount(coin)?;
        Self::credit(store, &Self::account_key(account, &coin.denom), account.to_string(), coin.amount)?;
        Self::credit(store, &Self::supply_key(&coin.denom), coin.denom.clone(), coin.amount)
    }

    /// Tous les soldes non nuls, par ordre de compte puis de dénomination
    pub fn all_balances(&self, store: &dyn KvStore) -> Result<Vec<(AccountId, Coin)>, BankError> {
        let mut balances = Vec::new();
        for (key, _) in store.prefix_scan(&[ACCOUNT_BALANCE_PREFIX])? {
            if key.len() <= 33 {
                return Err(StoreError::ReadFailed("clé de solde corrompue".to_string()).into());
            }
            let mut raw = [0u8; 32];
            raw.copy_from_slice(&key[1..33]);
            let denom = String::from_utf8_lossy(&key[33..]).into_owned();
            let amount = Self::read(store, &key)?;
            balances.push((AccountId::from_bytes(raw), Coin::new(denom, amount)));
        }
        Ok(balances)
    }
}

impl SupplyKeeper for StoreBank {
    fn balance(&self, store: &dyn KvStore, account: &AccountId, denom: &str) -> Result<Balance, BankError> {
        Self::read(store, &Self::account_key(account, denom))
    }

    fn pool_balance(&self, store: &dyn KvStore, pool: Pool, denom: &str) -> Result<Balance, BankError> {
        Self::read(store, &Self::pool_key(pool, denom))
    }

    fn supply(&self, store: &dyn KvStore, denom: &str) -> Result<Balance, BankError> {
        Self::read(store, &Self::supply_key(denom))
    }

    fn delegate_coins_from_account_to_pool(
        &self,
        store: &mut dyn KvStore,
        from: &AccountId,
        pool: Pool,
        coin: &Coin,
    ) -> Result<(), BankError> {
        Self::check_amount(coin)?;
        Self::debit(store, &Self::account_key(from, &coin.denom), from.to_string(), coin.amount)?;
        Self::credit(store, &Self::pool_key(pool, &coin.denom), pool.to_string(), coin.amount)?;
        debug!("{} -> {}: {}", from, pool, coin);
        Ok(())
    }

    fn undelegate_coins_from_pool_to_account(
        &self,
        store: &mut dyn KvStore,
        pool: Pool,
        to: &AccountId,
        coin: &Coin,
    ) -> Result<(), BankError> {
        Self::check_amount(coin)?;
        Self::debit(store, &Self::pool_key(pool, &coin.denom), pool.to_string(), coin.amount)?;
        Self::credit(store, &Self::account_key(to, &coin.denom), to.to_string(), coin.amount)?;
        debug!("{} -> {}: {}", pool, to, coin);
        Ok(())
    }

    fn send_coins_from_pool_to_pool(
        &self,
        store: &mut dyn KvStore,
        from: Pool,
        to: Pool,
        coin: &Coin,
    ) -> Result<(), BankError> {
        Self::check_amount(coin)?;
        Self::debit(store, &Self::pool_key(from, &coin.denom), from.to_string(), coin.amount)?;
        Self::credit(store, &Self::pool_key(to, &coin.denom), to.to_string(), coin.amount)
    }

    fn burn_coins(&self, store: &mut dyn KvStore, pool: Pool, coin: &Coin) -> Result<(), BankError> {
        Self::check_amount(coin)?;
        Self::debit(store, &Self::pool_key(pool, &coin.denom), pool.to_string(), coin.amount)?;
        Self::debit(store, &Self::supply_key(&coin.denom), coin.denom.clone(), coin.amount)?;
        debug!("burned {} from {}", coin, pool);
        Ok(())
    }

    fn mint_coins(&self, store: &mut dyn KvStore, pool: Pool, coin: &Coin) -> Result<(), BankError> {
        Self::check_amount(coin)?;
        Self::credit(store, &Self::pool_key(pool, &coin.denom), pool.to_string(), coin.amount)?;
        Self::credit(store, &Self::supply_key(&coin.denom), coin.denom.clone(), coin.amount)
    }
}
