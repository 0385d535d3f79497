//! Ledger Store: the append-only transaction log and its materialized
//! balance snapshots.
//!
//! Every balance mutation in the system flows through [`Ledger::append`]
//! (the expiry sweep included). The append validates the type/sign contract
//! and the non-negativity invariant, updates the snapshot and inserts the log
//! entry as one atomic unit under the (user, merchant) pair's lock. Distinct
//! pairs never contend.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::model::{
    MerchantId, Metadata, PointTransaction, ProgramId, RedemptionId, TransactionType, UserId,
};

mod state;
pub use state::LoyaltySnapshot;

mod error;
pub use error::LedgerError;

/// A requested ledger mutation; everything `append` needs to build the
/// transaction record.
#[derive(Debug, Clone)]
pub struct AppendRequest {
    pub user_id: UserId,
    pub merchant_id: MerchantId,
    pub program_id: Option<ProgramId>,
    pub tx_type: TransactionType,
    /// Signed point delta: positive credits, negative debits.
    pub points: i64,
    pub description: String,
    pub metadata: Metadata,
    pub order_id: Option<String>,
    pub redemption_id: Option<RedemptionId>,
}

/// Filter for transaction listing. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub merchant: Option<MerchantId>,
    pub user: Option<UserId>,
    pub tx_type: Option<TransactionType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Offset/limit paging for transaction listing.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    /// A page covering the whole result set.
    pub fn all() -> Self {
        Page {
            offset: 0,
            limit: usize::MAX,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Page {
            offset: 0,
            limit: 50,
        }
    }
}

/// The ledger store.
pub struct Ledger {
    /// One locked snapshot cell per (user, merchant) pair.
    accounts: DashMap<(UserId, MerchantId), Arc<Mutex<LoyaltySnapshot>>>,
    /// Append-only transaction log, in id order.
    log: RwLock<Vec<Arc<PointTransaction>>>,
    next_tx_id: AtomicU64,
}

impl Ledger {
    /// How long one lock acquisition may wait before it counts as a failed
    /// attempt.
    const LOCK_TIMEOUT: Duration = Duration::from_millis(200);
    /// Bounded internal retries before surfacing `Contention`.
    const LOCK_ATTEMPTS: u32 = 3;

    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            log: RwLock::new(Vec::new()),
            next_tx_id: AtomicU64::new(1),
        }
    }

    /// Append a transaction and update the pair's snapshot atomically.
    ///
    /// The balance read, non-negativity check, snapshot update and log insert
    /// happen under the pair's lock; on any failure nothing is visible.
    pub fn append(&self, request: AppendRequest) -> Result<PointTransaction, LedgerError> {
        let cell = self.account_cell(request.user_id, request.merchant_id);
        let mut snapshot = self.lock_cell(&cell, request.user_id, request.merchant_id)?;
        self.apply_locked(&mut snapshot, request, Utc::now())
    }

    /// Current snapshot for a pair. Absence means no history, so the result
    /// is a zero-valued snapshot rather than an error.
    pub fn balance(&self, user: UserId, merchant: MerchantId) -> LoyaltySnapshot {
        match self.accounts.get(&(user, merchant)) {
            Some(cell) => cell.lock().clone(),
            None => LoyaltySnapshot::new(user, merchant),
        }
    }

    /// Whether the pair has committed history. Adjustments require this.
    ///
    /// A cell with no committed transactions does not count: `account_cell`
    /// creates the cell before validation runs, so a failed first append
    /// leaves one behind.
    pub fn account_exists(&self, user: UserId, merchant: MerchantId) -> bool {
        self.accounts
            .get(&(user, merchant))
            .is_some_and(|cell| cell.lock().transaction_count > 0)
    }

    /// All materialized snapshots with committed history, for reporting.
    pub fn snapshots(&self) -> Vec<LoyaltySnapshot> {
        self.accounts
            .iter()
            .map(|entry| entry.value().lock().clone())
            .filter(|snapshot| snapshot.transaction_count > 0)
            .collect()
    }

    /// List transactions matching `filter`, newest first (created_at
    /// descending, id descending tie-break), sliced by `page`.
    pub fn transactions(&self, filter: &TransactionFilter, page: Page) -> Vec<PointTransaction> {
        let log = self.log.read();
        let mut matches: Vec<&Arc<PointTransaction>> = log
            .iter()
            .filter(|tx| filter.merchant.is_none_or(|m| tx.merchant_id == m))
            .filter(|tx| filter.user.is_none_or(|u| tx.user_id == u))
            .filter(|tx| filter.tx_type.is_none_or(|t| tx.tx_type == t))
            .filter(|tx| filter.from.is_none_or(|from| tx.created_at >= from))
            .filter(|tx| filter.to.is_none_or(|to| tx.created_at <= to))
            .collect();
        matches.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        matches
            .into_iter()
            .skip(page.offset)
            .take(page.limit)
            .map(|tx| PointTransaction::clone(tx))
            .collect()
    }

    /// Expiry sweep for one pair, meant to be driven by an external
    /// scheduler. When the last earn is older than the expiration window and
    /// the balance is positive, the whole balance is written off in a single
    /// EXPIRED transaction; otherwise the sweep is a no-op.
    pub fn expire(
        &self,
        user: UserId,
        merchant: MerchantId,
        program_id: Option<ProgramId>,
        expiration_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<PointTransaction>, LedgerError> {
        let Some(cell) = self
            .accounts
            .get(&(user, merchant))
            .map(|entry| Arc::clone(entry.value()))
        else {
            return Ok(None);
        };
        let mut snapshot = self.lock_cell(&cell, user, merchant)?;

        if snapshot.current_balance <= 0 {
            return Ok(None);
        }
        let Some(last_earned) = snapshot.last_earned_at else {
            return Ok(None);
        };
        if now - last_earned < chrono::Duration::days(i64::from(expiration_days)) {
            return Ok(None);
        }

        let request = AppendRequest {
            user_id: user,
            merchant_id: merchant,
            program_id,
            tx_type: TransactionType::Expired,
            points: -snapshot.current_balance,
            description: format!("points expired after {expiration_days} days of inactivity"),
            metadata: Metadata::from([(
                "expiration_days".to_string(),
                expiration_days.to_string(),
            )]),
            order_id: None,
            redemption_id: None,
        };
        self.apply_locked(&mut snapshot, request, now).map(Some)
    }

    /// Get or create the locked cell for a pair. The `Arc` is cloned out so
    /// the map shard lock is released before the cell lock is taken.
    fn account_cell(&self, user: UserId, merchant: MerchantId) -> Arc<Mutex<LoyaltySnapshot>> {
        self.accounts
            .entry((user, merchant))
            .or_insert_with(|| Arc::new(Mutex::new(LoyaltySnapshot::new(user, merchant))))
            .clone()
    }

    /// Take a pair's lock with a bounded wait per attempt; exhaustion
    /// surfaces as retryable `Contention`, never as a stalled caller.
    fn lock_cell<'a>(
        &self,
        cell: &'a Mutex<LoyaltySnapshot>,
        user: UserId,
        merchant: MerchantId,
    ) -> Result<MutexGuard<'a, LoyaltySnapshot>, LedgerError> {
        for _ in 0..Self::LOCK_ATTEMPTS {
            if let Some(guard) = cell.try_lock_for(Self::LOCK_TIMEOUT) {
                return Ok(guard);
            }
        }
        Err(LedgerError::Contention { user, merchant })
    }

    /// The single invariant-preserving mutation. Caller holds the pair lock.
    fn apply_locked(
        &self,
        snapshot: &mut LoyaltySnapshot,
        request: AppendRequest,
        now: DateTime<Utc>,
    ) -> Result<PointTransaction, LedgerError> {
        if !request.tx_type.accepts_points(request.points) {
            return Err(LedgerError::InvalidPoints {
                tx_type: request.tx_type,
                points: request.points,
            });
        }

        let balance_before = snapshot.current_balance;
        let balance_after = balance_before + request.points;
        if balance_after < 0 {
            return Err(LedgerError::InsufficientBalance {
                user: request.user_id,
                merchant: request.merchant_id,
                balance: balance_before,
                requested: request.points,
            });
        }

        match request.tx_type {
            TransactionType::Earned | TransactionType::Bonus => {
                snapshot.lifetime_earned += request.points;
                snapshot.last_earned_at = Some(now);
            }
            TransactionType::Adjusted if request.points > 0 => {
                snapshot.lifetime_earned += request.points;
                snapshot.last_earned_at = Some(now);
            }
            TransactionType::Redeemed => {
                snapshot.lifetime_redeemed += -request.points;
                snapshot.last_redeemed_at = Some(now);
            }
            TransactionType::Refunded => {
                snapshot.lifetime_redeemed = (snapshot.lifetime_redeemed - request.points).max(0);
            }
            // negative adjustments and expiry touch no lifetime counter
            TransactionType::Adjusted | TransactionType::Expired => {}
        }
        snapshot.current_balance = balance_after;
        snapshot.transaction_count += 1;

        let tx = Arc::new(PointTransaction {
            id: self.next_tx_id.fetch_add(1, Ordering::Relaxed),
            user_id: request.user_id,
            merchant_id: request.merchant_id,
            program_id: request.program_id,
            tx_type: request.tx_type,
            points: request.points,
            balance_before,
            balance_after,
            description: request.description,
            metadata: request.metadata,
            created_at: now,
            order_id: request.order_id,
            redemption_id: request.redemption_id,
        });
        // Insert while the pair lock is held so log and snapshot are never
        // observably out of step for this pair.
        self.log.write().push(Arc::clone(&tx));

        Ok(PointTransaction::clone(&tx))
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Ledger {
    fn log_len(&self) -> usize {
        self.log.read().len()
    }
}
