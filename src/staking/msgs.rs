// Messages - Les cinq messages du module de staking
use crate::types::{AccountId, Balance, Coin, ConsPubKey, Dec};
use serde::{Deserialize, Serialize};

use super::error::StakingError;
use super::validator::{CommissionRates, Description};

pub const ROUTER_KEY: &str = "staking";

pub const TYPE_CREATE_VALIDATOR: &str = "poc/MsgCreateValidator";
pub const TYPE_EDIT_VALIDATOR: &str = "poc/MsgEditValidator";
pub const TYPE_DELEGATE: &str = "poc/MsgDelegate";
pub const TYPE_UNDELEGATE: &str = "poc/MsgUndelegate";
pub const TYPE_BEGIN_REDELEGATE: &str = "poc/MsgBeginRedelegate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgCreateValidator {
    pub description: Description,
    pub commission: CommissionRates,
    pub min_self_delegation: Balance,
    pub delegator_address: AccountId,
    pub validator_address: AccountId,
    pub pubkey: ConsPubKey,
    pub value: Coin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgEditValidator {
    pub description: Description,
    pub validator_address: AccountId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commission_rate: Option<Dec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_self_delegation: Option<Balance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgDelegate {
    pub delegator_address: AccountId,
    pub validator_address: AccountId,
    pub amount: Coin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgUndelegate {
    pub delegator_address: AccountId,
    pub validator_address: AccountId,
    pub amount: Coin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgBeginRedelegate {
    pub delegator_address: AccountId,
    pub validator_src_address: AccountId,
    pub validator_dst_address: AccountId,
    pub amount: Coin,
}

/// Ensemble fermé des messages routés vers le staking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Msg {
    #[serde(rename = "poc/MsgCreateValidator")]
    CreateValidator(MsgCreateValidator),
    #[serde(rename = "poc/MsgEditValidator")]
    EditValidator(MsgEditValidator),
    #[serde(rename = "poc/MsgDelegate")]
    Delegate(MsgDelegate),
    #[serde(rename = "poc/MsgUndelegate")]
    Undelegate(MsgUndelegate),
    #[serde(rename = "poc/MsgBeginRedelegate")]
    BeginRedelegate(MsgBeginRedelegate),
}

impl Msg {
    pub fn route(&self) -> &'static str {
        ROUTER_KEY
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Msg::CreateValidator(_) => TYPE_CREATE_VALIDATOR,
            Msg::EditValidator(_) => TYPE_EDIT_VALIDATOR,
            Msg::Delegate(_) => TYPE_DELEGATE,
            Msg::Undelegate(_) => TYPE_UNDELEGATE,
            Msg::BeginRedelegate(_) => TYPE_BEGIN_REDELEGATE,
        }
    }

    /// Signataires requis
    pub fn signers(&self) -> Vec<AccountId> {
        match self {
            Msg::CreateValidator(m) => {
                let mut signers = vec![m.delegator_address];
                if m.validator_address != m.delegator_address {
                    signers.push(m.validator_address);
                }
                signers
            }
            Msg::EditValidator(m) => vec![m.validator_address],
            Msg::Delegate(m) => vec![m.delegator_address],
            Msg::Undelegate(m) => vec![m.delegator_address],
            Msg::BeginRedelegate(m) => vec![m.delegator_address],
        }
    }

    /// Vérifications sans état
    pub fn validate_basic(&self) -> Result<(), StakingError> {
        match self {
            Msg::CreateValidator(m) => {
                if m.delegator_address.is_empty() {
                    return Err(StakingError::EmptyDelegatorAddress);
                }
                if m.validator_address.is_empty() {
                    return Err(StakingError::EmptyValidatorAddress);
                }
                if m.validator_address != m.delegator_address {
                    return Err(StakingError::BadValidatorAddress {
                        validator: m.validator_address,
                        delegator: m.delegator_address,
                    });
                }
                if !m.value.is_positive() {
                    return Err(StakingError::BadDelegationAmount);
                }
                if m.description.is_empty() {
                    return Err(StakingError::EmptyDescription);
                }
                m.commission.validate()?;
                if m.min_self_delegation == 0 {
                    return Err(StakingError::MinSelfDelegationInvalid);
                }
                if m.value.amount < m.min_self_delegation {
                    return Err(StakingError::SelfDelegationBelowMinimum {
                        min: m.min_self_delegation,
                    });
                }
                Ok(())
            }
            Msg::EditValidator(m) => {
                if m.validator_address.is_empty() {
                    return Err(StakingError::EmptyValidatorAddress);
                }
                if m.description.is_empty() {
                    return Err(StakingError::NothingToModify);
                }
                if m.min_self_delegation == Some(0) {
                    return Err(StakingError::MinSelfDelegationInvalid);
                }
                if m.commission_rate.map_or(false, |r| r > Dec::one()) {
                    return Err(StakingError::CommissionHuge);
                }
                Ok(())
            }
            Msg::Delegate(m) => check_pair(&m.delegator_address, &m.validator_address, &m.amount),
            Msg::Undelegate(m) => check_pair(&m.delegator_address, &m.validator_address, &m.amount),
            Msg::BeginRedelegate(m) => {
                check_pair(&m.delegator_address, &m.validator_src_address, &m.amount)?;
                if m.validator_dst_address.is_empty() {
                    return Err(StakingError::EmptyValidatorAddress);
                }
                Ok(())
            }
        }
    }
}

fn check_pair(delegator: &AccountId, validator: &AccountId, amount: &Coin) -> Result<(), StakingError> {
    if delegator.is_empty() {
        return Err(StakingError::EmptyDelegatorAddress);
    }
    if validator.is_empty() {
        return Err(StakingError::EmptyValidatorAddress);
    }
    if !amount.is_positive() {
        return Err(StakingError::BadDelegationAmount);
    }
    Ok(())
}

impl From<MsgCreateValidator> for Msg {
    fn from(m: MsgCreateValidator) -> Self {
        Msg::CreateValidator(m)
    }
}

impl From<MsgEditValidator> for Msg {
    fn from(m: MsgEditValidator) -> Self {
        Msg::EditValidator(m)
    }
}

impl From<MsgDelegate> for Msg {
    fn from(m: MsgDelegate) -> Self {
        Msg::Delegate(m)
    }
}

impl From<MsgUndelegate> for Msg {
    fn from(m: MsgUndelegate) -> Self {
        Msg::Undelegate(m)
    }
}

impl From<MsgBeginRedelegate> for Msg {
    fn from(m: MsgBeginRedelegate) -> Self {
        Msg::BeginRedelegate(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> AccountId {
        AccountId::from_bytes([b; 32])
    }

    fn create_msg() -> MsgCreateValidator {
        MsgCreateValidator {
            description: Description::new("val", "", "", ""),
            commission: CommissionRates::new(Dec::zero(), Dec::zero(), Dec::zero()),
            min_self_delegation: 1,
            delegator_address: addr(1),
            validator_address: addr(1),
            pubkey: ConsPubKey::from_bytes([9; 32]),
            value: Coin::new("poc", 10),
        }
    }

    #[test]
    fn test_create_validator_validate_basic() {
        assert!(Msg::from(create_msg()).validate_basic().is_ok());

        let mut m = create_msg();
        m.validator_address = addr(2);
        assert!(matches!(
            Msg::from(m).validate_basic(),
            Err(StakingError::BadValidatorAddress { .. })
        ));

        let mut m = create_msg();
        m.value.amount = 0;
        assert!(matches!(Msg::from(m).validate_basic(), Err(StakingError::BadDelegationAmount)));

        let mut m = create_msg();
        m.min_self_delegation = 11;
        assert!(matches!(
            Msg::from(m).validate_basic(),
            Err(StakingError::SelfDelegationBelowMinimum { min: 11 })
        ));

        let mut m = create_msg();
        m.description = Description::default();
        assert!(matches!(Msg::from(m).validate_basic(), Err(StakingError::EmptyDescription)));
    }

    #[test]
    fn test_edit_validator_validate_basic() {
        let edit = MsgEditValidator {
            description: Description::do_not_modify(),
            validator_address: addr(1),
            commission_rate: Some(Dec::new_with_prec(11, 1)),
            min_self_delegation: None,
        };
        assert!(matches!(Msg::from(edit).validate_basic(), Err(StakingError::CommissionHuge)));

        let edit = MsgEditValidator {
            description: Description::default(),
            validator_address: addr(1),
            commission_rate: None,
            min_self_delegation: None,
        };
        assert!(matches!(Msg::from(edit).validate_basic(), Err(StakingError::NothingToModify)));
    }

    #[test]
    fn test_signers_and_tags() {
        let msg = Msg::from(MsgBeginRedelegate {
            delegator_address: addr(4),
            validator_src_address: addr(1),
            validator_dst_address: addr(2),
            amount: Coin::new("poc", 5),
        });
        assert_eq!(msg.signers(), vec![addr(4)]);
        assert_eq!(msg.type_tag(), TYPE_BEGIN_REDELEGATE);
        assert_eq!(msg.route(), ROUTER_KEY);
    }

    #[test]
    fn test_empty_addresses_rejected() {
        let msg = Msg::from(MsgDelegate {
            delegator_address: AccountId::default(),
            validator_address: addr(1),
            amount: Coin::new("poc", 5),
        });
        assert!(matches!(msg.validate_basic(), Err(StakingError::EmptyDelegatorAddress)));
    }
}
