// Events - Événements structurés émis pour les indexeurs
use serde::{Deserialize, Serialize};
use std::fmt;

pub const EVENT_TYPE_MESSAGE: &str = "message";
pub const EVENT_TYPE_CREATE_VALIDATOR: &str = "create_validator";
pub const EVENT_TYPE_EDIT_VALIDATOR: &str = "edit_validator";
pub const EVENT_TYPE_DELEGATE: &str = "delegate";
pub const EVENT_TYPE_UNBOND: &str = "unbond";
pub const EVENT_TYPE_REDELEGATE: &str = "redelegate";
pub const EVENT_TYPE_COMPLETE_UNBONDING: &str = "complete_unbonding";
pub const EVENT_TYPE_COMPLETE_REDELEGATION: &str = "complete_redelegation";
pub const EVENT_TYPE_SLASH: &str = "slash";
pub const EVENT_TYPE_JAIL: &str = "jail";
pub const EVENT_TYPE_UNJAIL: &str = "unjail";

pub const ATTR_MODULE: &str = "module";
pub const ATTR_SENDER: &str = "sender";
pub const ATTR_ACTION: &str = "action";
pub const ATTR_VALIDATOR: &str = "validator";
pub const ATTR_DELEGATOR: &str = "delegator";
pub const ATTR_SRC_VALIDATOR: &str = "source_validator";
pub const ATTR_DST_VALIDATOR: &str = "destination_validator";
pub const ATTR_AMOUNT: &str = "amount";
pub const ATTR_COMPLETION_TIME: &str = "completion_time";
pub const ATTR_COMMISSION_RATE: &str = "commission_rate";
pub const ATTR_MIN_SELF_DELEGATION: &str = "min_self_delegation";
pub const ATTR_ADDRESS: &str = "address";
pub const ATTR_POWER: &str = "power";
pub const ATTR_REASON: &str = "reason";
pub const ATTR_BURNED: &str = "burned_coins";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub kind: String,
    pub attributes: Vec<(String, String)>,
}

impl Event {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            attributes: Vec::new(),
        }
    }

    pub fn attr(mut self, key: &str, value: impl ToString) -> Self {
        self.attributes.push((key.to_string(), value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for (k, v) in &self.attributes {
            write!(f, " {}={}", k, v)?;
        }
        Ok(())
    }
}
