// Keeper - Accès à l'état du module de staking
//
// Construit une fois, partagé par référence. Toutes les lectures/écritures
// passent par le store du Context; le temps vient exclusivement de l'en-tête.

pub mod delegation;
pub mod invariants;
pub mod query;
pub mod slash;
pub mod val_state_change;
pub mod validator;

use crate::bank::{Pool, SupplyKeeper};
use crate::context::Context;
use crate::storage::KvStore;
use crate::types::{Balance, Coin, Duration};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::codec::ModuleCodec;
use super::error::StakingError;
use super::keys::PARAMS_KEY;
use super::params::Params;

pub struct Keeper {
    codec: Arc<ModuleCodec>,
    supply: Arc<dyn SupplyKeeper>,
}

impl Keeper {
    pub fn new(codec: Arc<ModuleCodec>, supply: Arc<dyn SupplyKeeper>) -> Self {
        Self { codec, supply }
    }

    pub fn codec(&self) -> &ModuleCodec {
        &self.codec
    }

    pub fn supply(&self) -> &dyn SupplyKeeper {
        self.supply.as_ref()
    }

    // ----- accès store -----

    pub(crate) fn read<T: DeserializeOwned>(&self, store: &dyn KvStore, key: &[u8]) -> Result<Option<T>, StakingError> {
        match store.get(key)? {
            Some(bytes) => Ok(Some(self.codec.decode_value(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn write<T: Serialize>(&self, store: &mut dyn KvStore, key: &[u8], value: &T) -> Result<(), StakingError> {
        let bytes = self.codec.encode_value(value)?;
        store.set(key, &bytes)?;
        Ok(())
    }

    pub(crate) fn scan<T: DeserializeOwned>(&self, store: &dyn KvStore, prefix: &[u8]) -> Result<Vec<T>, StakingError> {
        store
            .prefix_scan(prefix)?
            .into_iter()
            .map(|(_, bytes)| self.codec.decode_value(&bytes).map_err(StakingError::from))
            .collect()
    }

    // ----- paramètres -----

    pub fn get_params(&self, ctx: &Context) -> Result<Params, StakingError> {
        Ok(self.read(ctx.store(), PARAMS_KEY)?.unwrap_or_default())
    }

    pub fn set_params(&self, ctx: &mut Context, params: &Params) -> Result<(), StakingError> {
        self.write(ctx.store_mut(), PARAMS_KEY, params)
    }

    pub fn bond_denom(&self, ctx: &Context) -> Result<String, StakingError> {
        Ok(self.get_params(ctx)?.bond_denom)
    }

    pub fn unbonding_time(&self, ctx: &Context) -> Result<Duration, StakingError> {
        Ok(self.get_params(ctx)?.unbonding_time)
    }

    pub fn max_validators(&self, ctx: &Context) -> Result<u16, StakingError> {
        Ok(self.get_params(ctx)?.max_validators)
    }

    pub fn max_entries(&self, ctx: &Context) -> Result<u16, StakingError> {
        Ok(self.get_params(ctx)?.max_entries)
    }

    pub fn frozen_time(&self, ctx: &Context) -> Result<Duration, StakingError> {
        Ok(self.get_params(ctx)?.frozen_time)
    }

    // ----- pools -----

    pub fn pool_tokens(&self, ctx: &Context, pool: Pool) -> Result<Balance, StakingError> {
        let denom = self.bond_denom(ctx)?;
        Ok(self.supply.pool_balance(ctx.store(), pool, &denom)?)
    }

    pub(crate) fn move_pool_tokens(
        &self,
        ctx: &mut Context,
        from: Pool,
        to: Pool,
        amount: Balance,
    ) -> Result<(), StakingError> {
        if amount == 0 || from == to {
            return Ok(());
        }
        let coin = Coin::new(self.bond_denom(ctx)?, amount);
        debug!("moving {} from {} to {}", coin, from, to);
        if let Err(e) = self.supply.send_coins_from_pool_to_pool(ctx.store_mut(), from, to, &coin) {
            panic!("pool transfer {} -> {} failed: {}", from, to, e);
        }
        Ok(())
    }

    pub(crate) fn bonded_tokens_to_not_bonded(&self, ctx: &mut Context, amount: Balance) -> Result<(), StakingError> {
        self.move_pool_tokens(ctx, Pool::Bonded, Pool::NotBonded, amount)
    }

    pub(crate) fn not_bonded_tokens_to_bonded(&self, ctx: &mut Context, amount: Balance) -> Result<(), StakingError> {
        self.move_pool_tokens(ctx, Pool::NotBonded, Pool::Bonded, amount)
    }

    pub(crate) fn burn_tokens(&self, ctx: &mut Context, pool: Pool, amount: Balance) -> Result<(), StakingError> {
        if amount == 0 {
            return Ok(());
        }
        let coin = Coin::new(self.bond_denom(ctx)?, amount);
        if let Err(e) = self.supply.burn_coins(ctx.store_mut(), pool, &coin) {
            panic!("burning {} from {} failed: {}", coin, pool, e);
        }
        Ok(())
    }
}
