// Coin - Montant libellé dans une dénomination
use super::primitives::Balance;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: Balance,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: Balance) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Une dénomination valide: 3 à 16 caractères, minuscule ou chiffre, commence par une lettre
    pub fn is_valid_denom(denom: &str) -> bool {
        let len_ok = (3..=16).contains(&denom.len());
        let mut chars = denom.chars();
        let first_ok = chars.next().map_or(false, |c| c.is_ascii_lowercase());
        len_ok && first_ok && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    }
}

impl fmt::Display for Coin {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}
