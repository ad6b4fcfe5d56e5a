// Context - Contexte d'exécution d'un bloc (store + en-tête)
use crate::storage::{KvStore, StoreError};
use crate::types::{BlockHeight, Timestamp};
use serde::{Deserialize, Serialize};

/// En-tête fourni par la couche de consensus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub chain_id: String,
    pub height: BlockHeight,
    /// Temps de bloc, seule source de temps de la machine d'état
    pub time: Timestamp,
}

impl BlockHeader {
    pub fn new(chain_id: impl Into<String>, height: BlockHeight, time: Timestamp) -> Self {
        Self {
            chain_id: chain_id.into(),
            height,
            time,
        }
    }
}

/// Contexte passé à toutes les opérations du keeper
pub struct Context<'a> {
    store: &'a mut dyn KvStore,
    header: BlockHeader,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a mut dyn KvStore, header: BlockHeader) -> Self {
        Self { store, header }
    }

    pub fn store(&self) -> &dyn KvStore {
        &*self.store
    }

    pub fn store_mut(&mut self) -> &mut dyn KvStore {
        &mut *self.store
    }

    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    pub fn block_height(&self) -> BlockHeight {
        self.header.height
    }

    pub fn block_time(&self) -> Timestamp {
        self.header.time
    }

    pub fn chain_id(&self) -> &str {
        &self.header.chain_id
    }

    /// Applique des écritures bufferisées sur le store du contexte
    pub fn commit(&mut self, ops: Vec<crate::storage::WriteOp>) -> Result<(), StoreError> {
        self.store.write_batch(ops)
    }
}
