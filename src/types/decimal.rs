// Decimal - Virgule fixe à 18 décimales (parts, taux, fractions de slash)
//
// Les produits intermédiaires passent par num-bigint: a * b peut dépasser u128
// alors que le résultat final tient toujours dans un u128.

use num_bigint::BigUint;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::primitives::Balance;

/// Nombre de décimales
pub const DEC_PRECISION: u32 = 18;

const PRECISION: u128 = 1_000_000_000_000_000_000;

/// Décimal non signé à virgule fixe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Dec(u128);

impl Dec {
    pub const fn zero() -> Self {
        Dec(0)
    }

    pub const fn one() -> Self {
        Dec(PRECISION)
    }

    /// Construit depuis la représentation interne (valeur * 10^18)
    pub const fn from_raw(raw: u128) -> Self {
        Dec(raw)
    }

    pub const fn raw(&self) -> u128 {
        self.0
    }

    pub fn from_int(value: Balance) -> Self {
        match value.checked_mul(PRECISION) {
            Some(raw) => Dec(raw),
            None => panic!("decimal overflow converting integer {}", value),
        }
    }

    /// `value * 10^-prec`, ex: new_with_prec(5, 2) == 0.05
    pub fn new_with_prec(value: u128, prec: u32) -> Self {
        assert!(prec <= DEC_PRECISION, "precision {} too large", prec);
        match value.checked_mul(10u128.pow(DEC_PRECISION - prec)) {
            Some(raw) => Dec(raw),
            None => panic!("decimal overflow building {}e-{}", value, prec),
        }
    }

    pub fn checked_from_int(value: Balance) -> Option<Self> {
        value.checked_mul(PRECISION).map(Dec)
    }

    /// Comme from_int, borné à la valeur maximale
    pub fn saturating_from_int(value: Balance) -> Self {
        Dec::checked_from_int(value).unwrap_or(Dec(u128::MAX))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Dec) -> Option<Dec> {
        self.0.checked_add(other.0).map(Dec)
    }

    pub fn checked_sub(self, other: Dec) -> Option<Dec> {
        self.0.checked_sub(other.0).map(Dec)
    }

    pub fn add(self, other: Dec) -> Dec {
        match self.checked_add(other) {
            Some(sum) => sum,
            None => panic!("decimal overflow: {} + {}", self, other),
        }
    }

    pub fn sub(self, other: Dec) -> Dec {
        match self.checked_sub(other) {
            Some(diff) => diff,
            None => panic!("decimal underflow: {} - {}", self, other),
        }
    }

    /// Produit arrondi (arrondi bancaire)
    pub fn mul(self, other: Dec) -> Dec {
        let product = BigUint::from(self.0) * BigUint::from(other.0);
        Dec(to_u128(chop_precision_and_round(product)))
    }

    /// Produit tronqué
    pub fn mul_truncate(self, other: Dec) -> Dec {
        let product = BigUint::from(self.0) * BigUint::from(other.0);
        Dec(to_u128(product / BigUint::from(PRECISION)))
    }

    /// `self * num / den` tronqué; None si le résultat dépasse 128 bits
    pub fn checked_mul_int_quo_int(self, num: Balance, den: Balance) -> Option<Dec> {
        assert!(den != 0, "decimal division by zero");
        let value = BigUint::from(self.0) * BigUint::from(num) / BigUint::from(den);
        u128::try_from(&value).ok().map(Dec)
    }

    /// `self * m / q`, arrondi à chaque étape comme mul puis quo
    pub fn mul_quo(self, m: Dec, q: Dec) -> Dec {
        assert!(!q.is_zero(), "decimal division by zero");
        let precision = BigUint::from(PRECISION);
        let product = chop_precision_and_round(BigUint::from(self.0) * BigUint::from(m.0));
        let scaled = product * &precision * &precision / BigUint::from(q.0);
        Dec(to_u128(chop_precision_and_round(scaled)))
    }

    /// `self * m / q`, tronqué à chaque étape comme mul_truncate puis quo_truncate
    pub fn mul_quo_truncate(self, m: Dec, q: Dec) -> Dec {
        assert!(!q.is_zero(), "decimal division by zero");
        let precision = BigUint::from(PRECISION);
        let product = BigUint::from(self.0) * BigUint::from(m.0) / &precision;
        Dec(to_u128(product * precision / BigUint::from(q.0)))
    }

    /// Quotient arrondi (arrondi bancaire)
    pub fn quo(self, other: Dec) -> Dec {
        assert!(!other.is_zero(), "decimal division by zero");
        let scaled = BigUint::from(self.0) * BigUint::from(PRECISION) * BigUint::from(PRECISION);
        Dec(to_u128(chop_precision_and_round(scaled / BigUint::from(other.0))))
    }

    /// Quotient tronqué
    pub fn quo_truncate(self, other: Dec) -> Dec {
        assert!(!other.is_zero(), "decimal division by zero");
        let scaled = BigUint::from(self.0) * BigUint::from(PRECISION);
        Dec(to_u128(scaled / BigUint::from(other.0)))
    }

    /// Partie entière
    pub fn truncate_int(&self) -> Balance {
        self.0 / PRECISION
    }

    /// Entier le plus proche (arrondi bancaire)
    pub fn round_int(&self) -> Balance {
        to_u128(chop_precision_and_round(BigUint::from(self.0)))
    }
}

fn to_u128(value: BigUint) -> u128 {
    match u128::try_from(&value) {
        Ok(v) => v,
        Err(_) => panic!("decimal overflow: {} exceeds 128 bits", value),
    }
}

// Retire 18 décimales en arrondissant au pair le plus proche
fn chop_precision_and_round(value: BigUint) -> BigUint {
    let precision = BigUint::from(PRECISION);
    let half = BigUint::from(PRECISION / 2);
    let quo = &value / &precision;
    let rem = &value % &precision;

    if rem < half {
        quo
    } else if rem > half {
        quo + 1u32
    } else if quo.bit(0) {
        quo + 1u32
    } else {
        quo
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}",
            self.0 / PRECISION,
            self.0 % PRECISION,
            width = DEC_PRECISION as usize
        )
    }
}

/// Erreurs de parsing décimal
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecError {
    #[error("Décimal vide")]
    Empty,

    #[error("Décimal invalide: {0}")]
    Invalid(String),

    #[error("Trop de décimales: {0}")]
    TooPrecise(String),

    #[error("Dépassement de capacité: {0}")]
    Overflow(String),
}

impl FromStr for Dec {
    type Err = DecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(DecError::Empty);
        }

        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };

        if int_part.is_empty()
            || !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(DecError::Invalid(s.to_string()));
        }
        if frac_part.len() > DEC_PRECISION as usize {
            return Err(DecError::TooPrecise(s.to_string()));
        }

        let int: u128 = int_part
            .parse()
            .map_err(|_| DecError::Overflow(s.to_string()))?;
        let frac: u128 = if frac_part.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac_part, width = DEC_PRECISION as usize);
            padded
                .parse()
                .map_err(|_| DecError::Invalid(s.to_string()))?
        };

        int.checked_mul(PRECISION)
            .and_then(|raw| raw.checked_add(frac))
            .map(Dec)
            .ok_or_else(|| DecError::Overflow(s.to_string()))
    }
}

// Représentation canonique en chaîne, y compris en bincode
impl Serialize for Dec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Dec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}
