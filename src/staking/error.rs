// Errors - Erreurs du module de staking
use crate::bank::BankError;
use crate::storage::StoreError;
use crate::types::{AccountId, Balance, ConsAddress, Dec, Timestamp};
use std::fmt;

use super::codec::CodecError;

/// Codespace des erreurs renvoyées par le routeur
pub const CODESPACE: &str = "staking";

/// Catégories d'erreurs exposées aux appelants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidAmount,
    InsufficientFunds,
    InsufficientShares,
    DuplicateValidator,
    BelowMinimumSelfDelegation,
    FrozenPeriodViolation,
    TransitiveRedelegation,
    Unauthorized,
    InvalidInput,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Erreurs de staking
#[derive(Debug, thiserror::Error)]
pub enum StakingError {
    #[error("empty validator address")]
    EmptyValidatorAddress,

    #[error("empty delegator address")]
    EmptyDelegatorAddress,

    #[error("validator address {validator} does not match delegator address {delegator}")]
    BadValidatorAddress { validator: AccountId, delegator: AccountId },

    #[error("validator {0} does not exist")]
    ValidatorNotFound(AccountId),

    #[error("no validator with consensus address {0}")]
    ValidatorConsAddrNotFound(ConsAddress),

    #[error("validator already exist for this operator address {0}")]
    ValidatorOwnerExists(AccountId),

    #[error("validator already exist for this pubkey, must use new validator pubkey")]
    ValidatorPubKeyExists,

    #[error("invalid consensus public key")]
    InvalidPubKey,

    #[error("no delegation for ({delegator}, {validator})")]
    DelegationNotFound { delegator: AccountId, validator: AccountId },

    #[error("no unbonding delegation found")]
    UnbondingDelegationNotFound,

    #[error("no redelegation found")]
    RedelegationNotFound,

    #[error("invalid coin denomination: got {got}, expected {expected}")]
    BadDenom { expected: String, got: String },

    #[error("amount must be > 0")]
    BadDelegationAmount,

    #[error("insufficient shares: requested {requested}, available {available}")]
    InsufficientShares { requested: Dec, available: Dec },

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("cannot redelegate to the same validator")]
    SelfRedelegation,

    #[error("redelegation destination validator not found")]
    BadRedelegationDst,

    #[error("redelegation to this validator already in progress, first redelegation to this validator must complete before next redelegation")]
    TransitiveRedelegation,

    #[error("too many unbonding delegation entries for (delegator, validator) tuple")]
    MaxUnbondingEntries,

    #[error("too many redelegation entries for (delegator, src-validator, dst-validator) tuple")]
    MaxRedelegationEntries,

    #[error("too few tokens to redelegate (truncates to zero tokens)")]
    VerySmallRedelegation,

    #[error("cannot delegate to validators with invalid (zero) ex-rate")]
    InvalidExchangeRate,

    #[error("commission cannot be more than 100%")]
    CommissionHuge,

    #[error("commission cannot be more than the max rate")]
    CommissionGtMaxRate,

    #[error("commission change rate cannot be more than the max rate")]
    CommissionChangeRateGtMaxRate,

    #[error("commission cannot be changed more than the max change rate")]
    CommissionGtMaxChangeRate,

    #[error("commission cannot be changed more than once in 24h")]
    CommissionUpdateTime,

    #[error("invalid description length for {field}, got {got}, max is {max}")]
    DescriptionLength { field: &'static str, got: usize, max: usize },

    #[error("description must be included")]
    EmptyDescription,

    #[error("transaction must include some information to modify")]
    NothingToModify,

    #[error("minimum self delegation must be a positive integer")]
    MinSelfDelegationInvalid,

    #[error("minimum self delegation cannot be decrease")]
    MinSelfDelegationDecreased,

    #[error("validator's self delegation must be greater than their minimum self delegation ({min})")]
    SelfDelegationBelowMinimum { min: Balance },

    #[error("self-delegation of {validator} is frozen until {until}")]
    FrozenPeriod { validator: AccountId, until: Timestamp },

    #[error("validator {0} is not jailed")]
    NotJailed(AccountId),

    #[error("validator {0} is jailed")]
    ValidatorJailed(AccountId),

    #[error("signer {0} did not sign the message")]
    Unauthorized(AccountId),

    #[error("Erreur bank: {0}")]
    Bank(BankError),

    #[error("Erreur de stockage: {0}")]
    Store(#[from] StoreError),

    #[error("Erreur de codec: {0}")]
    Codec(#[from] CodecError),
}

impl From<BankError> for StakingError {
    fn from(err: BankError) -> Self {
        match err {
            BankError::InsufficientFunds { .. } => StakingError::InsufficientFunds(err.to_string()),
            BankError::Store(e) => StakingError::Store(e),
            other => StakingError::Bank(other),
        }
    }
}

impl StakingError {
    pub fn kind(&self) -> ErrorKind {
        use StakingError::*;
        match self {
            ValidatorNotFound(_) | ValidatorConsAddrNotFound(_) | DelegationNotFound { .. } | UnbondingDelegationNotFound
            | RedelegationNotFound | BadRedelegationDst => ErrorKind::NotFound,
            BadDenom { .. } | BadDelegationAmount | VerySmallRedelegation | MinSelfDelegationInvalid => {
                ErrorKind::InvalidAmount
            }
            InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            InsufficientShares { .. } => ErrorKind::InsufficientShares,
            ValidatorOwnerExists(_) | ValidatorPubKeyExists => ErrorKind::DuplicateValidator,
            SelfDelegationBelowMinimum { .. } => ErrorKind::BelowMinimumSelfDelegation,
            FrozenPeriod { .. } => ErrorKind::FrozenPeriodViolation,
            TransitiveRedelegation => ErrorKind::TransitiveRedelegation,
            Unauthorized(_) => ErrorKind::Unauthorized,
            Bank(_) | Store(_) | Codec(_) => ErrorKind::Internal,
            _ => ErrorKind::InvalidInput,
        }
    }

    /// Code numérique stable renvoyé dans les résultats de transaction
    pub fn code(&self) -> u32 {
        use StakingError::*;
        match self {
            EmptyValidatorAddress => 101,
            EmptyDelegatorAddress => 102,
            BadValidatorAddress { .. } => 103,
            ValidatorNotFound(_) => 104,
            ValidatorOwnerExists(_) => 105,
            ValidatorPubKeyExists => 106,
            InvalidPubKey => 107,
            DelegationNotFound { .. } => 108,
            UnbondingDelegationNotFound => 109,
            RedelegationNotFound => 110,
            BadDenom { .. } => 111,
            BadDelegationAmount => 112,
            InsufficientShares { .. } => 113,
            InsufficientFunds(_) => 114,
            SelfRedelegation => 115,
            BadRedelegationDst => 116,
            TransitiveRedelegation => 117,
            MaxUnbondingEntries => 118,
            MaxRedelegationEntries => 119,
            VerySmallRedelegation => 120,
            InvalidExchangeRate => 121,
            CommissionHuge => 122,
            CommissionGtMaxRate => 123,
            CommissionChangeRateGtMaxRate => 124,
            CommissionGtMaxChangeRate => 125,
            CommissionUpdateTime => 126,
            DescriptionLength { .. } => 127,
            EmptyDescription => 128,
            NothingToModify => 129,
            MinSelfDelegationInvalid => 130,
            MinSelfDelegationDecreased => 131,
            SelfDelegationBelowMinimum { .. } => 132,
            FrozenPeriod { .. } => 133,
            NotJailed(_) => 134,
            ValidatorJailed(_) => 135,
            Unauthorized(_) => 136,
            ValidatorConsAddrNotFound(_) => 137,
            Bank(_) => 197,
            Store(_) => 198,
            Codec(_) => 199,
        }
    }
}
