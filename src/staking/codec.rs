// Codec - Registre de sérialisation du module
//
// Construit une fois au démarrage puis partagé (Arc) par le keeper, le routeur
// et le runner. Messages: JSON étiqueté par type; valeurs du store: bincode.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;

use super::msgs::{
    Msg, TYPE_BEGIN_REDELEGATE, TYPE_CREATE_VALIDATOR, TYPE_DELEGATE, TYPE_EDIT_VALIDATOR, TYPE_UNDELEGATE,
};

/// Erreurs d'encodage/décodage
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("type de message inconnu: {0}")]
    UnknownType(String),

    #[error("type de message déjà enregistré: {0}")]
    DuplicateType(String),

    #[error("champ 'type' manquant")]
    MissingType,

    #[error("JSON invalide: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Binaire invalide: {0}")]
    Binary(#[from] bincode::Error),
}

/// Registre explicite des types de messages connus
#[derive(Debug, Clone)]
pub struct ModuleCodec {
    registered: BTreeSet<&'static str>,
}

impl ModuleCodec {
    /// Codec vide, sans aucun message enregistré
    pub fn empty() -> Self {
        Self {
            registered: BTreeSet::new(),
        }
    }

    /// Codec du module de staking
    pub fn new() -> Self {
        let mut codec = Self::empty();
        for tag in [
            TYPE_CREATE_VALIDATOR,
            TYPE_EDIT_VALIDATOR,
            TYPE_DELEGATE,
            TYPE_UNDELEGATE,
            TYPE_BEGIN_REDELEGATE,
        ] {
            // registre neuf: pas de doublon possible
            let _ = codec.register(tag);
        }
        codec
    }

    pub fn register(&mut self, tag: &'static str) -> Result<(), CodecError> {
        if !self.registered.insert(tag) {
            return Err(CodecError::DuplicateType(tag.to_string()));
        }
        Ok(())
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.registered.contains(tag)
    }

    pub fn registered_types(&self) -> impl Iterator<Item = &&'static str> {
        self.registered.iter()
    }

    pub fn encode_msg(&self, msg: &Msg) -> Result<Vec<u8>, CodecError> {
        if !self.is_registered(msg.type_tag()) {
            return Err(CodecError::UnknownType(msg.type_tag().to_string()));
        }
        Ok(serde_json::to_vec(msg)?)
    }

    pub fn decode_msg(&self, bytes: &[u8]) -> Result<Msg, CodecError> {
        let value: serde_json::Value = serde_json::from_slice(bytes)?;
        self.msg_from_json(value)
    }

    /// Décode un message déjà parsé (fichiers de blocs)
    pub fn msg_from_json(&self, value: serde_json::Value) -> Result<Msg, CodecError> {
        let tag = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(CodecError::MissingType)?;
        if !self.is_registered(tag) {
            return Err(CodecError::UnknownType(tag.to_string()));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Octets à signer: JSON aux clés triées
    pub fn sign_bytes(&self, msg: &Msg) -> Result<Vec<u8>, CodecError> {
        // serde_json::Value trie les clés d'objet (BTreeMap)
        let value = serde_json::to_value(msg)?;
        Ok(serde_json::to_vec(&value)?)
    }

    pub fn encode_value<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(bincode::serialize(value)?)
    }

    pub fn decode_value<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

impl Default for ModuleCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staking::msgs::MsgDelegate;
    use crate::types::{AccountId, Coin};

    fn delegate_msg() -> Msg {
        Msg::Delegate(MsgDelegate {
            delegator_address: AccountId::from_bytes([1; 32]),
            validator_address: AccountId::from_bytes([2; 32]),
            amount: Coin::new("poc", 10),
        })
    }

    #[test]
    fn test_msg_json_carries_type_tag() {
        let codec = ModuleCodec::new();
        let bytes = codec.encode_msg(&delegate_msg()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["type"], "poc/MsgDelegate");
        assert_eq!(codec.decode_msg(&bytes).unwrap(), delegate_msg());
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let codec = ModuleCodec::new();
        let raw = br#"{"type":"cosmos-sdk/MsgDelegate","value":{}}"#;
        assert!(matches!(codec.decode_msg(raw), Err(CodecError::UnknownType(t)) if t == "cosmos-sdk/MsgDelegate"));

        let empty = ModuleCodec::empty();
        let bytes = codec.encode_msg(&delegate_msg()).unwrap();
        assert!(matches!(empty.decode_msg(&bytes), Err(CodecError::UnknownType(_))));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut codec = ModuleCodec::new();
        assert!(matches!(codec.register(TYPE_DELEGATE), Err(CodecError::DuplicateType(_))));
        assert_eq!(codec.registered_types().count(), 5);
    }

    #[test]
    fn test_sign_bytes_sorted() {
        let codec = ModuleCodec::new();
        let bytes = codec.sign_bytes(&delegate_msg()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let amount = text.find("\"amount\"").unwrap();
        let delegator = text.find("\"delegator_address\"").unwrap();
        assert!(amount < delegator);
    }
}
