//! Core domain types for the loyalty engine.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Amount;

/// User identifier.
pub type UserId = u64;

/// Merchant identifier.
pub type MerchantId = u64;

/// Point transaction identifier.
pub type TxId = u64;

/// Redemption identifier.
pub type RedemptionId = u64;

/// Deal identifier (kickback linkage).
pub type DealId = u64;

/// Loyalty program identifier.
pub type ProgramId = u64;

/// Free-form transaction metadata.
pub type Metadata = BTreeMap<String, String>;

/// The kind of a point transaction. Determines the sign of `points` and
/// which lifetime counter the ledger updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Points earned from a purchase.
    Earned,
    /// Promotional or converted-kickback credit.
    Bonus,
    /// Manual correction, either direction.
    Adjusted,
    /// Debit for a reward claim.
    Redeemed,
    /// Credit reversing a prior redemption debit.
    Refunded,
    /// Write-off of points past their expiration window.
    Expired,
}

impl TransactionType {
    /// Whether `points` has a sign this transaction type accepts.
    pub fn accepts_points(self, points: i64) -> bool {
        match self {
            TransactionType::Earned | TransactionType::Bonus | TransactionType::Refunded => {
                points > 0
            }
            TransactionType::Redeemed | TransactionType::Expired => points < 0,
            TransactionType::Adjusted => points != 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::Earned => "EARNED",
            TransactionType::Bonus => "BONUS",
            TransactionType::Adjusted => "ADJUSTED",
            TransactionType::Redeemed => "REDEEMED",
            TransactionType::Refunded => "REFUNDED",
            TransactionType::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable entry in the point ledger.
///
/// The chain of transactions for a (user, merchant) pair, in creation order,
/// reconstructs the current balance exactly; the snapshot is a materialized
/// fold over this log, never an independent source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointTransaction {
    pub id: TxId,
    pub user_id: UserId,
    pub merchant_id: MerchantId,
    pub program_id: Option<ProgramId>,
    pub tx_type: TransactionType,
    /// Signed point delta: positive credits, negative debits.
    pub points: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub description: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub order_id: Option<String>,
    pub redemption_id: Option<RedemptionId>,
}

/// State of a redemption. `Cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RedemptionStatus {
    /// Redemption stands; its debit is in effect.
    #[default]
    Active,
    /// Redemption was cancelled and its debit refunded.
    Cancelled,
}

/// A reward claim that debited the balance, tracked so it can be cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redemption {
    pub id: RedemptionId,
    pub user_id: UserId,
    pub merchant_id: MerchantId,
    /// Points debited by the claim; the refund credits exactly this amount.
    pub points_redeemed: i64,
    /// The REDEEMED transaction this claim created.
    pub transaction_id: TxId,
    pub status: RedemptionStatus,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

/// Currency commission earned by a referrer from invitee spending.
///
/// A parallel reward channel to the points ledger: recording a kickback never
/// touches the point balance. Read-only once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KickbackEvent {
    pub merchant_id: MerchantId,
    /// The referrer who earns the commission.
    pub user_id: UserId,
    pub deal_id: DealId,
    /// Total spend by invitees on this occasion.
    pub source_amount_spent: Amount,
    /// Commission in currency, rounded half-up to whole cents.
    pub amount_earned: Amount,
    pub invitee_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Loyalty standing derived from lifetime earned points. Never stored, so it
/// can never disagree with the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    pub fn from_lifetime_earned(lifetime_earned: i64) -> Self {
        match lifetime_earned {
            ..1_000 => Tier::Bronze,
            1_000..5_000 => Tier::Silver,
            5_000..20_000 => Tier::Gold,
            20_000.. => Tier::Platinum,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Bronze => "BRONZE",
            Tier::Silver => "SILVER",
            Tier::Gold => "GOLD",
            Tier::Platinum => "PLATINUM",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
