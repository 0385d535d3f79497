//! Error types for engine operations.

use thiserror::Error;

use crate::Amount;
use crate::ledger::LedgerError;
use crate::model::{MerchantId, RedemptionId, TransactionType, UserId};
use crate::program::ProgramError;

/// Top-level error returned by [`Engine::apply`](super::Engine::apply) and
/// the individual operation methods.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("program registry: {0}")]
    Program(#[from] ProgramError),

    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("kickback rejected: {0}")]
    Kickback(#[from] KickbackError),

    #[error("redemption failed: {0}")]
    Redeem(#[from] RedeemError),

    #[error("cancellation failed: {0}")]
    Cancel(#[from] CancelError),

    #[error("adjustment failed: {0}")]
    Adjust(#[from] AdjustError),
}

/// Error recording a kickback event.
#[derive(Debug, Error)]
pub enum KickbackError {
    #[error("kickback rate {0} is outside (0, 1]")]
    InvalidRate(f64),

    #[error("invitee spend total {0} must be positive")]
    InvalidSpend(Amount),

    #[error("kickback requires at least one invitee")]
    NoInvitees,
}

/// Error during redemption.
#[derive(Debug, Error)]
pub enum RedeemError {
    #[error("must claim a positive number of points, got {0}")]
    NonPositivePoints(i64),

    #[error("loyalty program for merchant {0} is inactive")]
    ProgramInactive(MerchantId),

    #[error("{requested} points is below the {minimum} point redemption minimum")]
    BelowMinimum { requested: i64, minimum: i64 },
}

/// Error during redemption cancellation.
#[derive(Debug, Error)]
pub enum CancelError {
    #[error("redemption {0} not found")]
    NotFound(RedemptionId),

    #[error("redemption {0} is already cancelled")]
    AlreadyCancelled(RedemptionId),
}

/// Error during manual adjustment.
#[derive(Debug, Error)]
pub enum AdjustError {
    #[error("user {user} has no loyalty relationship with merchant {merchant}")]
    Unauthorized { user: UserId, merchant: MerchantId },

    #[error("{0} is not a valid manual adjustment type")]
    InvalidType(TransactionType),
}
