// Staking - Cycle de vie des validateurs et des délégations
// Principe: une seule machine d'état, pilotée par l'en-tête de bloc

pub mod abci;
pub mod codec;
pub mod delegation;
pub mod error;
pub mod events;
pub mod genesis;
pub mod handler;
pub mod keeper;
pub mod keys;
pub mod msgs;
pub mod params;
pub mod validator;

pub use abci::{end_blocker, EndBlockResult};
pub use codec::{CodecError, ModuleCodec};
pub use error::{ErrorKind, StakingError};
pub use genesis::{validate_genesis, GenesisError, GenesisState};
pub use handler::{HandlerError, HandlerResult, Router};
pub use keeper::query::QueryRequest;
pub use keeper::Keeper;
pub use msgs::Msg;
pub use params::Params;
pub use validator::{BondStatus, Validator, ValidatorUpdate};
