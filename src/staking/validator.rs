// Validator - Enregistrement d'un validateur et comptabilité parts/tokens
use crate::types::{
    tokens_to_consensus_power, AccountId, Balance, BlockHeight, ConsAddress, ConsPubKey, Dec, Duration,
    Power, Timestamp, SECONDS_PER_DAY,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::StakingError;

/// Valeur sentinelle: conserver le champ existant lors d'une édition
pub const DO_NOT_MODIFY: &str = "[do-not-modify]";

pub const MAX_MONIKER_LENGTH: usize = 70;
pub const MAX_IDENTITY_LENGTH: usize = 3000;
pub const MAX_WEBSITE_LENGTH: usize = 140;
pub const MAX_DETAILS_LENGTH: usize = 280;

/// Statut de bonding d'un validateur
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BondStatus {
    Unbonded,
    Unbonding,
    Bonded,
}

impl fmt::Display for BondStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            BondStatus::Unbonded => "Unbonded",
            BondStatus::Unbonding => "Unbonding",
            BondStatus::Bonded => "Bonded",
        };
        f.write_str(s)
    }
}

/// Description publique d'un validateur
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    pub moniker: String,
    pub identity: String,
    pub website: String,
    pub details: String,
}

impl Description {
    pub fn new(moniker: &str, identity: &str, website: &str, details: &str) -> Self {
        Self {
            moniker: moniker.to_string(),
            identity: identity.to_string(),
            website: website.to_string(),
            details: details.to_string(),
        }
    }

    /// Description dont tous les champs sont la sentinelle
    pub fn do_not_modify() -> Self {
        Self::new(DO_NOT_MODIFY, DO_NOT_MODIFY, DO_NOT_MODIFY, DO_NOT_MODIFY)
    }

    pub fn is_empty(&self) -> bool {
        self.moniker.is_empty() && self.identity.is_empty() && self.website.is_empty() && self.details.is_empty()
    }

    pub fn ensure_length(&self) -> Result<(), StakingError> {
        let fields = [
            ("moniker", &self.moniker, MAX_MONIKER_LENGTH),
            ("identity", &self.identity, MAX_IDENTITY_LENGTH),
            ("website", &self.website, MAX_WEBSITE_LENGTH),
            ("details", &self.details, MAX_DETAILS_LENGTH),
        ];
        for (field, value, max) in fields {
            if value.len() > max {
                return Err(StakingError::DescriptionLength {
                    field,
                    got: value.len(),
                    max,
                });
            }
        }
        Ok(())
    }

    /// Fusionne une édition; les champs sentinelle gardent l'ancienne valeur
    pub fn update(&self, edit: &Description) -> Result<Description, StakingError> {
        let pick = |new: &String, old: &String| {
            if new == DO_NOT_MODIFY {
                old.clone()
            } else {
                new.clone()
            }
        };
        let updated = Description {
            moniker: pick(&edit.moniker, &self.moniker),
            identity: pick(&edit.identity, &self.identity),
            website: pick(&edit.website, &self.website),
            details: pick(&edit.details, &self.details),
        };
        updated.ensure_length()?;
        Ok(updated)
    }
}

/// Paramètres de commission choisis à la création
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRates {
    pub rate: Dec,
    pub max_rate: Dec,
    pub max_change_rate: Dec,
}

impl CommissionRates {
    pub fn new(rate: Dec, max_rate: Dec, max_change_rate: Dec) -> Self {
        Self {
            rate,
            max_rate,
            max_change_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == CommissionRates::default()
    }

    pub fn validate(&self) -> Result<(), StakingError> {
        if self.max_rate > Dec::one() {
            return Err(StakingError::CommissionHuge);
        }
        if self.rate > self.max_rate {
            return Err(StakingError::CommissionGtMaxRate);
        }
        if self.max_change_rate > self.max_rate {
            return Err(StakingError::CommissionChangeRateGtMaxRate);
        }
        Ok(())
    }
}

/// Commission courante et date de dernière modification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    pub rates: CommissionRates,
    pub update_time: Timestamp,
}

impl Commission {
    pub fn new(rates: CommissionRates, update_time: Timestamp) -> Self {
        Self { rates, update_time }
    }

    /// Vérifie un nouveau taux: au plus une modification par 24h,
    /// jamais au-dessus du max, hausse bornée par max_change_rate.
    pub fn validate_new_rate(&self, new_rate: Dec, block_time: Timestamp) -> Result<(), StakingError> {
        if block_time.saturating_sub(self.update_time) < SECONDS_PER_DAY {
            return Err(StakingError::CommissionUpdateTime);
        }
        if new_rate > self.rates.max_rate {
            return Err(StakingError::CommissionGtMaxRate);
        }
        if let Some(increase) = new_rate.checked_sub(self.rates.rate) {
            if increase > self.rates.max_change_rate {
                return Err(StakingError::CommissionGtMaxChangeRate);
            }
        }
        Ok(())
    }
}

/// Mise à jour de puissance transmise à la couche de consensus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: ConsPubKey,
    pub power: Power,
}

/// Validateur
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Adresse opérateur (compte de l'opérateur)
    pub operator: AccountId,
    /// Clé de consensus, unique parmi les validateurs connus
    pub cons_pubkey: ConsPubKey,
    pub jailed: bool,
    pub status: BondStatus,
    /// Tokens délégués
    pub tokens: Balance,
    /// Total des parts émises
    pub delegator_shares: Dec,
    pub description: Description,
    /// Hauteur du passage Bonded -> Unbonding
    pub unbonding_height: BlockHeight,
    /// Fin de l'unbonding du validateur
    pub unbonding_completion_time: Timestamp,
    pub commission: Commission,
    pub min_self_delegation: Balance,
    /// Temps de bloc à la création (début de la période de gel)
    pub creation_time: Timestamp,
}

impl Validator {
    pub fn new(operator: AccountId, cons_pubkey: ConsPubKey, description: Description, creation_time: Timestamp) -> Self {
        Self {
            operator,
            cons_pubkey,
            jailed: false,
            status: BondStatus::Unbonded,
            tokens: 0,
            delegator_shares: Dec::zero(),
            description,
            unbonding_height: 0,
            unbonding_completion_time: 0,
            commission: Commission::default(),
            min_self_delegation: 1,
            creation_time,
        }
    }

    pub fn cons_address(&self) -> ConsAddress {
        self.cons_pubkey.address()
    }

    pub fn is_bonded(&self) -> bool {
        self.status == BondStatus::Bonded
    }

    pub fn is_unbonding(&self) -> bool {
        self.status == BondStatus::Unbonding
    }

    pub fn is_unbonded(&self) -> bool {
        self.status == BondStatus::Unbonded
    }

    /// Puissance effective: nulle hors Bonded
    pub fn consensus_power(&self) -> Power {
        if self.is_bonded() {
            self.potential_consensus_power()
        } else {
            0
        }
    }

    /// Puissance si le validateur était Bonded
    pub fn potential_consensus_power(&self) -> Power {
        tokens_to_consensus_power(self.tokens)
    }

    pub fn to_update(&self) -> ValidatorUpdate {
        ValidatorUpdate {
            pub_key: self.cons_pubkey,
            power: self.consensus_power(),
        }
    }

    /// Fin de la période de gel de l'auto-délégation
    pub fn frozen_until(&self, frozen_time: Duration) -> Timestamp {
        self.creation_time.saturating_add(frozen_time)
    }

    pub fn is_frozen(&self, block_time: Timestamp, frozen_time: Duration) -> bool {
        block_time < self.frozen_until(frozen_time)
    }

    /// Parts sans tokens: taux de change invalide
    pub fn invalid_ex_rate(&self) -> bool {
        self.tokens == 0 && self.delegator_shares.is_positive()
    }

    pub fn tokens_from_shares(&self, shares: Dec) -> Dec {
        Dec::from_int(self.tokens).mul_quo(shares, self.delegator_shares)
    }

    pub fn tokens_from_shares_truncated(&self, shares: Dec) -> Dec {
        Dec::from_int(self.tokens).mul_quo_truncate(shares, self.delegator_shares)
    }

    /// Parts correspondant à `amount` tokens, tronquées
    pub fn shares_from_tokens(&self, amount: Balance) -> Result<Dec, StakingError> {
        if self.tokens == 0 {
            return Err(self.insufficient_shares(amount));
        }
        self.delegator_shares
            .checked_mul_int_quo_int(amount, self.tokens)
            .ok_or_else(|| self.insufficient_shares(amount))
    }

    fn insufficient_shares(&self, amount: Balance) -> StakingError {
        StakingError::InsufficientShares {
            requested: Dec::saturating_from_int(amount),
            available: self.delegator_shares,
        }
    }

    /// Ajoute des tokens délégués et renvoie les parts émises
    pub fn add_tokens_from_del(&mut self, amount: Balance) -> Dec {
        let issued = if self.delegator_shares.is_zero() {
            // première délégation: 1 part par token
            Dec::from_int(amount)
        } else {
            match self.shares_from_tokens(amount) {
                Ok(shares) => shares,
                Err(e) => panic!("delegating to validator {} with invalid exchange rate: {}", self.operator, e),
            }
        };

        self.tokens = match self.tokens.checked_add(amount) {
            Some(t) => t,
            None => panic!("validator {} token overflow", self.operator),
        };
        self.delegator_shares = self.delegator_shares.add(issued);
        issued
    }

    /// Retire des tokens (slash)
    pub fn remove_tokens(&mut self, tokens: Balance) {
        self.tokens = match self.tokens.checked_sub(tokens) {
            Some(t) => t,
            None => panic!(
                "attempted to remove {} tokens from validator {} holding {}",
                tokens, self.operator, self.tokens
            ),
        };
    }

    /// Brûle des parts et renvoie les tokens correspondants
    pub fn remove_del_shares(&mut self, shares: Dec) -> Balance {
        let remaining = self.delegator_shares.sub(shares);

        let issued_tokens = if remaining.is_zero() {
            // le dernier porteur récupère tous les tokens restants
            self.tokens
        } else {
            self.tokens_from_shares(shares).truncate_int()
        };

        self.remove_tokens(issued_tokens);
        self.delegator_shares = remaining;
        issued_tokens
    }
}

impl fmt::Display for Validator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Validator {} [{}{}] tokens={} shares={}",
            self.operator,
            self.status,
            if self.jailed { ", jailed" } else { "" },
            self.tokens,
            self.delegator_shares
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_validator() -> Validator {
        Validator::new(
            AccountId::from_bytes([1; 32]),
            ConsPubKey::from_bytes([2; 32]),
            Description::new("val", "", "", ""),
            0,
        )
    }

    #[test]
    fn test_first_delegation_issues_shares_one_to_one() {
        let mut v = test_validator();
        let shares = v.add_tokens_from_del(1_000);
        assert_eq!(shares, Dec::from_int(1_000));
        assert_eq!(v.tokens, 1_000);
    }

    #[test]
    fn test_shares_after_slash() {
        let mut v = test_validator();
        v.add_tokens_from_del(100);
        v.remove_tokens(50);

        // taux de change: 0.5 token par part
        let shares = v.add_tokens_from_del(50);
        assert_eq!(shares, Dec::from_int(100));
        assert_eq!(v.delegator_shares, Dec::from_int(200));
        assert_eq!(v.tokens_from_shares(Dec::from_int(100)), Dec::from_int(50));
    }

    #[test]
    fn test_remove_all_shares_returns_all_tokens() {
        let mut v = test_validator();
        v.add_tokens_from_del(10);
        v.remove_tokens(3);
        v.add_tokens_from_del(5);

        let total = v.delegator_shares;
        let tokens = v.remove_del_shares(total);
        assert_eq!(tokens, 12);
        assert_eq!(v.tokens, 0);
        assert!(v.delegator_shares.is_zero());
    }

    #[test]
    fn test_invalid_ex_rate() {
        let mut v = test_validator();
        v.add_tokens_from_del(10);
        v.remove_tokens(10);
        assert!(v.invalid_ex_rate());
        assert!(v.shares_from_tokens(5).is_err());
    }

    #[test]
    fn test_consensus_power_only_when_bonded() {
        let mut v = test_validator();
        v.add_tokens_from_del(5_000_000);
        assert_eq!(v.consensus_power(), 0);
        assert_eq!(v.potential_consensus_power(), 5);
        v.status = BondStatus::Bonded;
        assert_eq!(v.consensus_power(), 5);
    }

    #[test]
    fn test_description_update_and_length() {
        let d = Description::new("moniker", "id", "site", "details");
        let edit = Description::new(DO_NOT_MODIFY, "new-id", DO_NOT_MODIFY, DO_NOT_MODIFY);
        let updated = d.update(&edit).unwrap();
        assert_eq!(updated.moniker, "moniker");
        assert_eq!(updated.identity, "new-id");

        let long = Description::new(&"m".repeat(MAX_MONIKER_LENGTH + 1), "", "", "");
        assert!(matches!(
            long.ensure_length(),
            Err(StakingError::DescriptionLength { field: "moniker", .. })
        ));
    }

    #[test]
    fn test_commission_validation() {
        let ok = CommissionRates::new(Dec::new_with_prec(1, 1), Dec::new_with_prec(2, 1), Dec::new_with_prec(1, 2));
        assert!(ok.validate().is_ok());

        let huge = CommissionRates::new(Dec::zero(), Dec::new_with_prec(11, 1), Dec::zero());
        assert!(matches!(huge.validate(), Err(StakingError::CommissionHuge)));

        let above = CommissionRates::new(Dec::new_with_prec(3, 1), Dec::new_with_prec(2, 1), Dec::zero());
        assert!(matches!(above.validate(), Err(StakingError::CommissionGtMaxRate)));

        let change = CommissionRates::new(Dec::zero(), Dec::new_with_prec(2, 1), Dec::new_with_prec(3, 1));
        assert!(matches!(change.validate(), Err(StakingError::CommissionChangeRateGtMaxRate)));
    }

    #[test]
    fn test_commission_new_rate_rules() {
        let rates = CommissionRates::new(Dec::new_with_prec(1, 1), Dec::new_with_prec(5, 1), Dec::new_with_prec(1, 1));
        let commission = Commission::new(rates, 1_000);

        assert!(matches!(
            commission.validate_new_rate(Dec::new_with_prec(15, 2), 1_000 + SECONDS_PER_DAY - 1),
            Err(StakingError::CommissionUpdateTime)
        ));
        let later = 1_000 + SECONDS_PER_DAY;
        assert!(commission.validate_new_rate(Dec::new_with_prec(15, 2), later).is_ok());
        assert!(commission.validate_new_rate(Dec::zero(), later).is_ok());
        assert!(matches!(
            commission.validate_new_rate(Dec::new_with_prec(6, 1), later),
            Err(StakingError::CommissionGtMaxRate)
        ));
        assert!(matches!(
            commission.validate_new_rate(Dec::new_with_prec(3, 1), later),
            Err(StakingError::CommissionGtMaxChangeRate)
        ));
    }

    #[test]
    fn test_frozen_window() {
        let mut v = test_validator();
        v.creation_time = 100;
        assert!(v.is_frozen(100, 50));
        assert!(v.is_frozen(149, 50));
        assert!(!v.is_frozen(150, 50));
    }
}
