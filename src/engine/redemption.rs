//! Redemption Workflow: points-for-reward claims and their cancellation.
//!
//! A redemption debits the balance through the ledger and records a claim
//! linked to that debit. Cancellation is the exact inverse: it credits back
//! precisely the points the original debit took, and the Active -> Cancelled
//! guard runs while the claim's map entry is held, so a racing second cancel
//! fails instead of double-crediting.

use chrono::Utc;

use super::{CancelError, Engine, EngineError, RedeemError};
use crate::ledger::AppendRequest;
use crate::model::{
    MerchantId, Metadata, PointTransaction, Redemption, RedemptionId, RedemptionStatus,
    TransactionType, UserId,
};

impl Engine {
    /// Claim a reward for `points`, debiting the user's balance.
    pub fn redeem(
        &self,
        user: UserId,
        merchant: MerchantId,
        points: i64,
    ) -> Result<Redemption, EngineError> {
        if points <= 0 {
            return Err(RedeemError::NonPositivePoints(points).into());
        }
        let program = self.programs().get(merchant)?;
        // Unlike earning, an inactive program is a hard error here: a claim
        // that silently vanished would look like success to the caller.
        if !program.is_active {
            return Err(RedeemError::ProgramInactive(merchant).into());
        }
        if points < program.minimum_redemption {
            return Err(RedeemError::BelowMinimum {
                requested: points,
                minimum: program.minimum_redemption,
            }
            .into());
        }

        let id = self.next_redemption_id();
        let value = program.redemption_value;
        let tx = self.ledger().append(AppendRequest {
            user_id: user,
            merchant_id: merchant,
            program_id: Some(program.id),
            tx_type: TransactionType::Redeemed,
            points: -points,
            description: format!("redeemed {points} points"),
            metadata: Metadata::from([("point_value".to_string(), value.to_string())]),
            order_id: None,
            redemption_id: Some(id),
        })?;

        let redemption = Redemption {
            id,
            user_id: user,
            merchant_id: merchant,
            points_redeemed: points,
            transaction_id: tx.id,
            status: RedemptionStatus::Active,
            cancelled_at: None,
            cancellation_reason: None,
        };
        self.redemption_table().insert(id, redemption.clone());
        Ok(redemption)
    }

    /// Cancel an active redemption, crediting back exactly the points its
    /// debit took. Active -> Cancelled happens at most once.
    pub fn cancel_redemption(
        &self,
        id: RedemptionId,
        reason: &str,
    ) -> Result<(PointTransaction, Redemption), EngineError> {
        let mut entry = self
            .redemption_table()
            .get_mut(&id)
            .ok_or(CancelError::NotFound(id))?;
        if entry.status == RedemptionStatus::Cancelled {
            return Err(CancelError::AlreadyCancelled(id).into());
        }

        // The refund is appended while the entry is held, so the state guard
        // and the credit form one atomic scope.
        let program_id = self.programs().get(entry.merchant_id).ok().map(|p| p.id);
        let tx = self.ledger().append(AppendRequest {
            user_id: entry.user_id,
            merchant_id: entry.merchant_id,
            program_id,
            tx_type: TransactionType::Refunded,
            points: entry.points_redeemed,
            description: format!("refund for cancelled redemption {id}"),
            metadata: Metadata::from([("reason".to_string(), reason.to_string())]),
            order_id: None,
            redemption_id: Some(id),
        })?;

        entry.status = RedemptionStatus::Cancelled;
        entry.cancelled_at = Some(Utc::now());
        entry.cancellation_reason = Some(reason.to_string());
        Ok((tx, entry.clone()))
    }

    /// Look up a redemption by id.
    pub fn redemption(&self, id: RedemptionId) -> Option<Redemption> {
        self.redemption_table().get(&id).map(|entry| entry.clone())
    }
}
