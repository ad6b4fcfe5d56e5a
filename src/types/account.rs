// Account - Adresses de comptes, d'opérateurs et de consensus
use ed25519_dalek::VerifyingKey;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Longueur d'une adresse de consensus
pub const CONS_ADDRESS_LEN: usize = 20;

/// AccountId = clé publique Ed25519 (32 bytes)
/// L'adresse opérateur d'un validateur est l'AccountId de son compte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AccountId([u8; 32]);

impl AccountId {
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        AccountId(key.to_bytes())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        AccountId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0[..8]))
    }
}

impl From<[u8; 32]> for AccountId {
    fn from(bytes: [u8; 32]) -> Self {
        AccountId(bytes)
    }
}

/// Clé publique de consensus (Ed25519)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ConsPubKey([u8; 32]);

impl ConsPubKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        ConsPubKey(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Vérifie que les bytes forment un point Ed25519 valide
    pub fn is_valid(&self) -> bool {
        VerifyingKey::from_bytes(&self.0).is_ok()
    }

    /// Adresse de consensus: 20 premiers bytes de blake3(pubkey)
    pub fn address(&self) -> ConsAddress {
        let digest = blake3::hash(&self.0);
        let mut bytes = [0u8; CONS_ADDRESS_LEN];
        bytes.copy_from_slice(&digest.as_bytes()[..CONS_ADDRESS_LEN]);
        ConsAddress(bytes)
    }
}

impl fmt::Display for ConsPubKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<&VerifyingKey> for ConsPubKey {
    fn from(key: &VerifyingKey) -> Self {
        ConsPubKey(key.to_bytes())
    }
}

/// Adresse de consensus utilisée par la couche de consensus (evidence, updates)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ConsAddress([u8; CONS_ADDRESS_LEN]);

impl ConsAddress {
    pub fn from_bytes(bytes: [u8; CONS_ADDRESS_LEN]) -> Self {
        ConsAddress(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CONS_ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for ConsAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Erreur de parsing d'adresse hexadécimale
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Hex invalide: {0}")]
    InvalidHex(String),

    #[error("Longueur invalide: {got} bytes (attendu {expected})")]
    InvalidLength { expected: usize, got: usize },
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], AddressError> {
    let raw = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(raw).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
    let got = bytes.len();
    bytes
        .try_into()
        .map_err(|_| AddressError::InvalidLength { expected: N, got })
}

// Hex en JSON, bytes bruts en bincode
macro_rules! impl_address_codec {
    ($name:ident, $len:expr) => {
        impl FromStr for $name {
            type Err = AddressError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                decode_fixed::<{ $len }>(s).map($name)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    s.parse().map_err(D::Error::custom)
                } else {
                    <[u8; $len]>::deserialize(deserializer).map($name)
                }
            }
        }
    };
}

impl_address_codec!(AccountId, 32);
impl_address_codec!(ConsPubKey, 32);
impl_address_codec!(ConsAddress, CONS_ADDRESS_LEN);
