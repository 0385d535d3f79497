//! Loyalty engine facade.
//!
//! Owns the program registry, the ledger, the redemption table and the
//! kickback log, and exposes the earning, redemption and adjustment
//! operations plus a command-stream driver. Every operation takes `&self`;
//! the concurrency discipline lives in the ledger's per-pair locks, so
//! callers may share the engine freely across tasks.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::Amount;
use crate::ledger::{Ledger, LoyaltySnapshot};
use crate::model::{
    KickbackEvent, MerchantId, Metadata, PointTransaction, Redemption, RedemptionId, UserId,
};
use crate::program::{ProgramConfig, ProgramRegistry};

mod error;
pub use error::{AdjustError, CancelError, EngineError, KickbackError, RedeemError};

mod earning;
pub use earning::{EarnOutcome, SkipReason};

mod adjustment;
mod redemption;

/// An external event for the engine to process: the command vocabulary of
/// the CSV feed and of embedding callers.
#[derive(Debug, Clone)]
pub enum Command {
    /// Create a merchant's loyalty program.
    InitProgram {
        merchant: MerchantId,
        config: ProgramConfig,
    },
    /// A purchase completed; try to award points.
    Earn {
        user: UserId,
        merchant: MerchantId,
        amount: Amount,
        discounted: bool,
        order_id: Option<String>,
    },
    /// Claim a reward for points.
    Redeem {
        user: UserId,
        merchant: MerchantId,
        points: i64,
    },
    /// Cancel a redemption, refunding its debit.
    Cancel {
        redemption: RedemptionId,
        reason: String,
    },
    /// Manual credit or debit.
    Adjust {
        merchant: MerchantId,
        user: UserId,
        points: i64,
        reason: String,
    },
    /// Expiry sweep for one (user, merchant) pair.
    Expire { user: UserId, merchant: MerchantId },
}

/// The loyalty engine.
pub struct Engine {
    programs: ProgramRegistry,
    ledger: Ledger,
    /// Redemption claims, for the cancellation path.
    redemptions: DashMap<RedemptionId, Redemption>,
    next_redemption_id: AtomicU64,
    /// Currency kickback events, parallel to the points ledger.
    kickbacks: RwLock<Vec<KickbackEvent>>,
}

/// Public API
impl Engine {
    pub fn new() -> Self {
        Self {
            programs: ProgramRegistry::new(),
            ledger: Ledger::new(),
            redemptions: DashMap::new(),
            next_redemption_id: AtomicU64::new(1),
            kickbacks: RwLock::new(Vec::new()),
        }
    }

    /// The program registry, for configuration calls from the request layer.
    pub fn programs(&self) -> &ProgramRegistry {
        &self.programs
    }

    /// The ledger store, for balance and transaction-listing reads.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// All materialized balance snapshots, for the report writer.
    pub fn snapshots(&self) -> Vec<LoyaltySnapshot> {
        self.ledger.snapshots()
    }

    /// Run the engine over a command stream. Individual failures are logged
    /// and never stop the feed.
    pub async fn run(&self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            let _ = self.apply(command);
        }
    }

    /// Apply a single command, logging the outcome.
    pub fn apply(&self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::InitProgram { merchant, config } => {
                let result = self.programs.initialize(merchant, config);
                Self::log_result("program", merchant, None, &result);
                result?;
            }
            Command::Earn {
                user,
                merchant,
                amount,
                discounted,
                order_id,
            } => {
                let result =
                    self.award_purchase_points(user, merchant, amount, discounted, order_id);
                match &result {
                    Ok(EarnOutcome::Awarded(tx)) => {
                        info!(merchant, user, points = tx.points, "earn applied");
                    }
                    Ok(EarnOutcome::Skipped(reason)) => {
                        info!(merchant, user, reason = %reason, "earn skipped");
                    }
                    Err(e) => {
                        info!(merchant, user, reason = %e, "earn rejected");
                    }
                }
                result?;
            }
            Command::Redeem {
                user,
                merchant,
                points,
            } => {
                let result = self.redeem(user, merchant, points);
                Self::log_result("redeem", merchant, Some(user), &result);
                result?;
            }
            Command::Cancel { redemption, reason } => {
                let result = self.cancel_redemption(redemption, &reason);
                match &result {
                    Ok(_) => info!(redemption, "cancel applied"),
                    Err(e) => info!(redemption, reason = %e, "cancel rejected"),
                }
                result?;
            }
            Command::Adjust {
                merchant,
                user,
                points,
                reason,
            } => {
                let result = self.adjust(merchant, user, points, &reason, None, Metadata::new());
                Self::log_result("adjust", merchant, Some(user), &result);
                result?;
            }
            Command::Expire { user, merchant } => {
                let result = self.sweep_expired(user, merchant);
                Self::log_result("expire", merchant, Some(user), &result);
                result?;
            }
        }
        Ok(())
    }

    /// Expiry sweep for one pair, per the merchant's expiration window.
    /// No-op (`None`) when the program never expires points or nothing is
    /// stale.
    pub fn sweep_expired(
        &self,
        user: UserId,
        merchant: MerchantId,
    ) -> Result<Option<PointTransaction>, EngineError> {
        let program = self.programs.get(merchant)?;
        let Some(days) = program.point_expiration_days else {
            return Ok(None);
        };
        let swept = self
            .ledger
            .expire(user, merchant, Some(program.id), days, Utc::now())?;
        Ok(swept)
    }
}

/// Private API
impl Engine {
    /// Small helper to log `apply` outcomes
    fn log_result<T, E: std::fmt::Display>(
        op: &'static str,
        merchant: MerchantId,
        user: Option<UserId>,
        result: &Result<T, E>,
    ) {
        match (result, user) {
            (Ok(_), Some(user)) => {
                info!(merchant, user, "{op} applied");
            }
            (Ok(_), None) => {
                info!(merchant, "{op} applied");
            }
            (Err(e), Some(user)) => {
                info!(merchant, user, reason = %e, "{op} rejected");
            }
            (Err(e), None) => {
                info!(merchant, reason = %e, "{op} rejected");
            }
        }
    }

    fn redemption_table(&self) -> &DashMap<RedemptionId, Redemption> {
        &self.redemptions
    }

    fn next_redemption_id(&self) -> RedemptionId {
        self.next_redemption_id.fetch_add(1, Ordering::Relaxed)
    }

    fn kickback_log(&self) -> &RwLock<Vec<KickbackEvent>> {
        &self.kickbacks
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
