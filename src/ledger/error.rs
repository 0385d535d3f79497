//! Error types for ledger mutations.

use thiserror::Error;

use crate::model::{MerchantId, TransactionType, UserId};

/// Error during a ledger append.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(
        "insufficient balance for user {user} at merchant {merchant}: \
         balance {balance}, requested {requested}"
    )]
    InsufficientBalance {
        user: UserId,
        merchant: MerchantId,
        balance: i64,
        requested: i64,
    },

    #[error("{tx_type} transaction rejected: {points} points has the wrong sign or is zero")]
    InvalidPoints {
        tx_type: TransactionType,
        points: i64,
    },

    #[error("ledger contention for user {user} at merchant {merchant}, retries exhausted")]
    Contention { user: UserId, merchant: MerchantId },
}
