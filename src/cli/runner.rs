// Runner - Application des blocs sur la base RocksDB
// Principle: un bloc = une surcouche de cache, écrite en un seul batch

use crate::bank::StoreBank;
use crate::cli::config::{ConfigError, NodeConfig};
use crate::context::{BlockHeader, Context};
use crate::genesis::{GenesisDoc, GenesisDocError};
use crate::staking::events::{Event, ATTR_ADDRESS, ATTR_BURNED, ATTR_POWER, ATTR_REASON, EVENT_TYPE_JAIL, EVENT_TYPE_SLASH, EVENT_TYPE_UNJAIL};
use crate::staking::{end_blocker, CodecError, HandlerError, Keeper, ModuleCodec, QueryRequest, Router, StakingError, ValidatorUpdate};
use crate::storage::{CacheStore, Database, KvStore, StoreError};
use crate::types::{rfc3339, AccountId, BlockHeight, ConsAddress, Dec, Power, Timestamp};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Métadonnées du nœud, hors des préfixes des modules
const NODE_META_KEY: &[u8] = &[0x01];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeMeta {
    pub chain_id: String,
    pub genesis_time: Timestamp,
    pub height: BlockHeight,
    pub time: Timestamp,
}

/// Bloc tel que lu dans un fichier de blocs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInput {
    pub height: BlockHeight,
    #[serde(with = "rfc3339")]
    pub time: Timestamp,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
    /// Adresses de consensus à emprisonner
    #[serde(default)]
    pub jail: Vec<ConsAddress>,
    #[serde(default)]
    pub unjail: Vec<ConsAddress>,
    #[serde(default)]
    pub txs: Vec<TxInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Signataires déclarés (signatures vérifiées en amont)
    pub signers: Vec<AccountId>,
    /// Message étiqueté `{"type": ..., "value": ...}`
    pub msg: serde_json::Value,
}

/// Preuve d'infraction transmise par la couche de consensus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub validator: ConsAddress,
    pub height: BlockHeight,
    pub power: Power,
    pub slash_fraction: Dec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReport {
    pub index: usize,
    /// 0 en cas de succès
    pub code: u32,
    pub log: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReport {
    pub height: BlockHeight,
    pub txs: Vec<TxReport>,
    /// Opérations jail/unjail refusées
    pub rejected: Vec<String>,
    pub validator_updates: Vec<ValidatorUpdate>,
    pub events: Vec<Event>,
}

/// Application: base RocksDB + keeper + routeur
pub struct App {
    db: Database,
    bank: StoreBank,
    keeper: Arc<Keeper>,
    router: Router,
    meta: Option<NodeMeta>,
    check_invariants: bool,
}

impl App {
    pub fn open(config: &NodeConfig) -> Result<Self, RunnerError> {
        let db = Database::open(&config.db_path)?;
        let codec = Arc::new(ModuleCodec::new());
        let bank = StoreBank::new();
        let keeper = Arc::new(Keeper::new(codec, Arc::new(bank.clone())));
        let router = Router::new(keeper.clone());

        let meta = match db.get(NODE_META_KEY)? {
            Some(bytes) => Some(keeper.codec().decode_value::<NodeMeta>(&bytes)?),
            None => None,
        };

        Ok(Self {
            db,
            bank,
            keeper,
            router,
            meta,
            check_invariants: config.check_invariants,
        })
    }

    pub fn meta(&self) -> Option<&NodeMeta> {
        self.meta.as_ref()
    }

    pub fn keeper(&self) -> &Keeper {
        &self.keeper
    }

    fn require_meta(&self) -> Result<NodeMeta, RunnerError> {
        self.meta.clone().ok_or(RunnerError::NotInitialized)
    }

    /// Charge le document de genèse à la hauteur 0
    pub fn init_chain(&mut self, doc: &GenesisDoc) -> Result<Vec<ValidatorUpdate>, RunnerError> {
        if self.meta.is_some() {
            return Err(RunnerError::AlreadyInitialized);
        }

        let meta = NodeMeta {
            chain_id: doc.chain_id.clone(),
            genesis_time: doc.genesis_time,
            height: 0,
            time: doc.genesis_time,
        };
        let header = BlockHeader::new(doc.chain_id.clone(), 0, doc.genesis_time);

        let (updates, ops) = {
            let mut cache = CacheStore::new(&self.db);
            let updates = {
                let mut ctx = Context::new(&mut cache, header);
                let updates = doc.apply(&mut ctx, &self.bank, &self.keeper)?;
                self.run_invariants(&ctx)?;
                updates
            };
            cache.set(NODE_META_KEY, &self.keeper.codec().encode_value(&meta)?)?;
            (updates, cache.into_ops())
        };
        self.db.batch_write(ops)?;

        info!("Chain {} initialized with {} validators", meta.chain_id, updates.len());
        self.meta = Some(meta);
        Ok(updates)
    }

    /// Applique un bloc complet; rien n'est écrit en cas d'erreur
    pub fn apply_block(&mut self, block: &BlockInput) -> Result<BlockReport, RunnerError> {
        let meta = self.require_meta()?;
        if block.height != meta.height + 1 {
            return Err(RunnerError::UnexpectedHeight {
                expected: meta.height + 1,
                got: block.height,
            });
        }
        if block.time < meta.time {
            return Err(RunnerError::TimeWentBackwards {
                last: meta.time,
                got: block.time,
            });
        }

        let next = NodeMeta {
            height: block.height,
            time: block.time,
            ..meta
        };
        let header = BlockHeader::new(next.chain_id.clone(), block.height, block.time);

        let (report, ops) = {
            let mut cache = CacheStore::new(&self.db);
            let report = {
                let mut ctx = Context::new(&mut cache, header);
                let report = self.execute_block(&mut ctx, block)?;
                self.run_invariants(&ctx)?;
                report
            };
            cache.set(NODE_META_KEY, &self.keeper.codec().encode_value(&next)?)?;
            (report, cache.into_ops())
        };
        self.db.batch_write(ops)?;

        info!(
            "Block {} applied: {} txs, {} validator updates",
            block.height,
            report.txs.len(),
            report.validator_updates.len()
        );
        self.meta = Some(next);
        Ok(report)
    }

    fn execute_block(&self, ctx: &mut Context, block: &BlockInput) -> Result<BlockReport, RunnerError> {
        let keeper = &self.keeper;
        let mut events = Vec::new();
        let mut rejected = Vec::new();

        for ev in &block.evidence {
            if ev.height > ctx.block_height() {
                return Err(RunnerError::InvalidEvidence(format!(
                    "infraction height {} is after block {}",
                    ev.height,
                    ctx.block_height()
                )));
            }
            if ev.slash_fraction > Dec::one() {
                return Err(RunnerError::InvalidEvidence(format!("slash fraction {} > 1", ev.slash_fraction)));
            }
            match keeper.get_validator_by_cons_addr(ctx, &ev.validator)? {
                Some(v) if v.is_unbonded() => {
                    warn!("Ignoring evidence against unbonded validator {}", v.operator);
                    continue;
                }
                _ => {}
            }
            let burned = keeper.slash(ctx, &ev.validator, ev.height, ev.power, ev.slash_fraction)?;
            events.push(
                Event::new(EVENT_TYPE_SLASH)
                    .attr(ATTR_ADDRESS, ev.validator)
                    .attr(ATTR_POWER, ev.power)
                    .attr(ATTR_REASON, "evidence")
                    .attr(ATTR_BURNED, burned),
            );
        }

        for cons in &block.jail {
            match atomic(ctx, |ctx| keeper.jail(ctx, cons)) {
                Ok(_) => events.push(Event::new(EVENT_TYPE_JAIL).attr(ATTR_ADDRESS, cons)),
                Err(e) => rejected.push(format!("jail {}: {}", cons, e)),
            }
        }

        for cons in &block.unjail {
            match atomic(ctx, |ctx| keeper.unjail(ctx, cons)) {
                Ok(_) => events.push(Event::new(EVENT_TYPE_UNJAIL).attr(ATTR_ADDRESS, cons)),
                Err(e) => rejected.push(format!("unjail {}: {}", cons, e)),
            }
        }

        let mut txs = Vec::with_capacity(block.txs.len());
        for (index, tx) in block.txs.iter().enumerate() {
            let outcome = keeper
                .codec()
                .msg_from_json(tx.msg.clone())
                .map_err(|e| HandlerError::from(StakingError::from(e)))
                .and_then(|msg| self.router.deliver(ctx, &tx.signers, &msg));

            let report = match outcome {
                Ok(res) => TxReport {
                    index,
                    code: 0,
                    log: res.log,
                    events: res.events,
                },
                Err(e) => {
                    debug!("tx {} of block {} failed: {}", index, block.height, e);
                    TxReport {
                        index,
                        code: e.code,
                        log: e.log,
                        events: Vec::new(),
                    }
                }
            };
            txs.push(report);
        }

        let end = end_blocker(ctx, keeper)?;
        events.extend(end.events);

        Ok(BlockReport {
            height: block.height,
            txs,
            rejected,
            validator_updates: end.validator_updates,
            events,
        })
    }

    fn run_invariants(&self, ctx: &Context) -> Result<(), RunnerError> {
        if !self.check_invariants {
            return Ok(());
        }
        let broken = self.keeper.check_invariants(ctx)?;
        if broken.is_empty() {
            return Ok(());
        }
        let details = broken.iter().map(|b| b.to_string()).collect::<Vec<_>>().join("; ");
        error!("Invariant broken at height {}: {}", ctx.block_height(), details);
        Err(RunnerError::InvariantBroken {
            height: ctx.block_height(),
            details,
        })
    }

    /// Vue en lecture seule de l'état validé
    fn with_snapshot<T>(&self, f: impl FnOnce(&mut Context) -> Result<T, RunnerError>) -> Result<T, RunnerError> {
        let meta = self.require_meta()?;
        let mut snapshot = CacheStore::new(&self.db);
        let mut ctx = Context::new(&mut snapshot, BlockHeader::new(meta.chain_id, meta.height, meta.time));
        f(&mut ctx)
    }

    /// Le temps de genèse exporté est celui du dernier bloc
    pub fn export(&self) -> Result<GenesisDoc, RunnerError> {
        let time = self.require_meta()?.time;
        self.with_snapshot(|ctx| Ok(GenesisDoc::export(ctx, time, &self.bank, &self.keeper)?))
    }

    pub fn query(&self, request: &QueryRequest) -> Result<serde_json::Value, RunnerError> {
        self.with_snapshot(|ctx| Ok(self.keeper.query(ctx, request)?))
    }
}

/// Exécute `f` sur une surcouche; les écritures ne sont gardées qu'en cas de succès
fn atomic<T>(
    ctx: &mut Context,
    f: impl FnOnce(&mut Context) -> Result<T, StakingError>,
) -> Result<T, StakingError> {
    let header = ctx.header().clone();
    let (result, ops) = {
        let mut cache = CacheStore::new(ctx.store());
        let result = {
            let mut inner = Context::new(&mut cache, header);
            f(&mut inner)
        };
        (result, cache.into_ops())
    };
    if result.is_ok() {
        ctx.commit(ops)?;
    }
    result
}

/// `init`: valide le document, le charge et le copie dans le répertoire
pub fn init(config: &NodeConfig, genesis_path: &Path) -> Result<Vec<ValidatorUpdate>, RunnerError> {
    config.ensure_uninitialized()?;
    let doc = GenesisDoc::from_file(genesis_path)?;
    doc.validate()?;

    std::fs::create_dir_all(&config.base_path)?;
    let mut app = App::open(config)?;
    let updates = app.init_chain(&doc)?;
    doc.to_file(&config.genesis_path)?;

    info!("Genesis digest: {}", doc.state_digest()?);
    Ok(updates)
}

/// `replay`: applique chaque bloc du fichier, dans l'ordre
pub fn replay(config: &NodeConfig, blocks_path: &Path) -> Result<Vec<BlockReport>, RunnerError> {
    config.ensure_initialized()?;
    let content = std::fs::read_to_string(blocks_path)?;
    let blocks: Vec<BlockInput> = serde_json::from_str(&content)?;

    let mut app = App::open(config)?;
    let mut reports = Vec::with_capacity(blocks.len());
    for block in &blocks {
        reports.push(app.apply_block(block)?);
    }
    Ok(reports)
}

pub fn export(config: &NodeConfig, output: &Path) -> Result<GenesisDoc, RunnerError> {
    config.ensure_initialized()?;
    let app = App::open(config)?;
    let doc = app.export()?;
    doc.to_file(output)?;
    info!("State exported to {}", output.display());
    Ok(doc)
}

pub fn query(config: &NodeConfig, request: &QueryRequest) -> Result<serde_json::Value, RunnerError> {
    config.ensure_initialized()?;
    App::open(config)?.query(request)
}

/// Runner errors
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Invalid block file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Genesis error: {0}")]
    Genesis(#[from] GenesisDocError),

    #[error("Staking error: {0}")]
    Staking(#[from] StakingError),

    #[error("Chain not initialized")]
    NotInitialized,

    #[error("Chain already initialized")]
    AlreadyInitialized,

    #[error("Unexpected block height: expected {expected}, got {got}")]
    UnexpectedHeight { expected: BlockHeight, got: BlockHeight },

    #[error("Block time went backwards: last {last}, got {got}")]
    TimeWentBackwards { last: Timestamp, got: Timestamp },

    #[error("Invalid evidence: {0}")]
    InvalidEvidence(String),

    #[error("Invariant broken at height {height}: {details}")]
    InvariantBroken { height: BlockHeight, details: String },
}
