//! Adjustment Service: manual credits and debits with guardrails.

use super::{AdjustError, Engine, EngineError};
use crate::ledger::AppendRequest;
use crate::model::{MerchantId, Metadata, PointTransaction, TransactionType, UserId};

impl Engine {
    /// Manually credit or debit a user's balance.
    ///
    /// Only reaches users with a pre-existing loyalty relationship to the
    /// merchant; a pair with no history fails `Unauthorized`. The type
    /// defaults to BONUS for credits and ADJUSTED for debits; callers may
    /// override to REFUNDED for manual reversals outside the redemption
    /// workflow. Sign/type coherence and the non-negativity check are the
    /// ledger's.
    pub fn adjust(
        &self,
        merchant: MerchantId,
        user: UserId,
        points: i64,
        reason: &str,
        tx_type: Option<TransactionType>,
        metadata: Metadata,
    ) -> Result<PointTransaction, EngineError> {
        if !self.ledger().account_exists(user, merchant) {
            return Err(AdjustError::Unauthorized { user, merchant }.into());
        }

        let tx_type = tx_type.unwrap_or(if points > 0 {
            TransactionType::Bonus
        } else {
            TransactionType::Adjusted
        });
        if !matches!(
            tx_type,
            TransactionType::Bonus | TransactionType::Adjusted | TransactionType::Refunded
        ) {
            return Err(AdjustError::InvalidType(tx_type).into());
        }

        let program_id = self.programs().get(merchant).ok().map(|p| p.id);
        let tx = self.ledger().append(AppendRequest {
            user_id: user,
            merchant_id: merchant,
            program_id,
            tx_type,
            points,
            description: reason.to_string(),
            metadata,
            order_id: None,
            redemption_id: None,
        })?;
        Ok(tx)
    }
}
