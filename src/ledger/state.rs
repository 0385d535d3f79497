use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{MerchantId, Tier, UserId};

/// Materialized balance for one (user, merchant) pair.
///
/// A cached fold over the transaction log: every field is reproducible from
/// the pair's transactions in creation order. Created lazily and never
/// deleted; reads treat a snapshot with `transaction_count == 0` as absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltySnapshot {
    pub user_id: UserId,
    pub merchant_id: MerchantId,
    /// Never negative; the ledger rejects any debit that would overdraw.
    pub current_balance: i64,
    pub lifetime_earned: i64,
    pub lifetime_redeemed: i64,
    /// Committed transactions for the pair. Zero means the cell was created
    /// for an append that never committed; such a pair has no history.
    pub transaction_count: u64,
    pub last_earned_at: Option<DateTime<Utc>>,
    pub last_redeemed_at: Option<DateTime<Utc>>,
}

impl LoyaltySnapshot {
    /// Zero-valued snapshot: the state of a pair with no history.
    pub fn new(user: UserId, merchant: MerchantId) -> Self {
        Self {
            user_id: user,
            merchant_id: merchant,
            current_balance: 0,
            lifetime_earned: 0,
            lifetime_redeemed: 0,
            transaction_count: 0,
            last_earned_at: None,
            last_redeemed_at: None,
        }
    }

    /// Loyalty tier, derived from lifetime earned points at read time.
    pub fn tier(&self) -> Tier {
        Tier::from_lifetime_earned(self.lifetime_earned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_snapshot_is_zero_valued() {
        let snapshot = LoyaltySnapshot::new(1, 2);
        assert_eq!(snapshot.user_id, 1);
        assert_eq!(snapshot.merchant_id, 2);
        assert_eq!(snapshot.current_balance, 0);
        assert_eq!(snapshot.lifetime_earned, 0);
        assert_eq!(snapshot.lifetime_redeemed, 0);
        assert_eq!(snapshot.transaction_count, 0);
        assert_eq!(snapshot.last_earned_at, None);
        assert_eq!(snapshot.last_redeemed_at, None);
    }

    #[test]
    fn tier_follows_lifetime_earned() {
        let mut snapshot = LoyaltySnapshot::new(1, 2);
        assert_eq!(snapshot.tier(), Tier::Bronze);

        snapshot.lifetime_earned = 6_000;
        assert_eq!(snapshot.tier(), Tier::Gold);
    }
}
