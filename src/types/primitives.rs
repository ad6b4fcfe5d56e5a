// Primitives POC - Types fondamentaux minimaux
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash universel (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash([u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hash des données avec Blake3
    pub fn hash(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Hash(*hash.as_bytes())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Hauteur de bloc
pub type BlockHeight = u64;

/// Timestamp Unix en secondes, fourni par l'en-tête de bloc
pub type Timestamp = u64;

/// Durée en secondes
pub type Duration = u64;

/// Montant entier de tokens
pub type Balance = u128;

/// Puissance de consensus (tokens / POWER_REDUCTION)
pub type Power = u64;

/// Nombre de tokens par unité de puissance de consensus
pub const POWER_REDUCTION: Balance = 1_000_000;

pub const SECONDS_PER_DAY: Duration = 24 * 60 * 60;

/// Tokens correspondant à une puissance de consensus
pub fn tokens_from_consensus_power(power: Power) -> Balance {
    (power as Balance).saturating_mul(POWER_REDUCTION)
}

/// Puissance de consensus d'un montant de tokens
pub fn tokens_to_consensus_power(tokens: Balance) -> Power {
    let power = tokens / POWER_REDUCTION;
    Power::try_from(power).unwrap_or(Power::MAX)
}
