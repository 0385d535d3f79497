//! Earning Engine: point awards for purchases and currency kickback for
//! referrals.
//!
//! The two reward channels are parallel ledgers. Purchases append EARNED
//! point transactions; kickback records a currency-denominated
//! [`KickbackEvent`] and never touches the point balance. Converting kickback
//! currency into points happens only through an explicit Adjustment Service
//! BONUS transaction tagged `metadata.source = "kickback"`.

use std::fmt;

use chrono::Utc;

use super::{Engine, EngineError, KickbackError};
use crate::Amount;
use crate::ledger::AppendRequest;
use crate::model::{
    DealId, KickbackEvent, MerchantId, Metadata, PointTransaction, TransactionType, UserId,
};

/// Result of a purchase earning attempt. Policy-excluded purchases are
/// skipped, not failed: the purchase itself is fine, it just earns nothing.
#[derive(Debug)]
pub enum EarnOutcome {
    Awarded(PointTransaction),
    Skipped(SkipReason),
}

impl EarnOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, EarnOutcome::Skipped(_))
    }
}

/// Why a purchase earned no points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ProgramInactive,
    BelowMinimumPurchase,
    DiscountedExcluded,
    /// The floored point amount came to zero.
    ZeroPoints,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::ProgramInactive => "program is inactive",
            SkipReason::BelowMinimumPurchase => "purchase below program minimum",
            SkipReason::DiscountedExcluded => "discounted purchases do not earn",
            SkipReason::ZeroPoints => "purchase too small to earn a whole point",
        };
        f.write_str(reason)
    }
}

impl Engine {
    /// Award points for a completed purchase.
    ///
    /// Returns `Skipped` (not an error) when the program is inactive, the
    /// purchase is under the minimum, discounted purchases are excluded, or
    /// the floored award is zero. Fails `NotFound` when the merchant has no
    /// program at all.
    pub fn award_purchase_points(
        &self,
        user: UserId,
        merchant: MerchantId,
        purchase_amount: Amount,
        is_discounted: bool,
        order_id: Option<String>,
    ) -> Result<EarnOutcome, EngineError> {
        let program = self.programs().get(merchant)?;

        if !program.is_active {
            return Ok(EarnOutcome::Skipped(SkipReason::ProgramInactive));
        }
        if purchase_amount < program.minimum_purchase {
            return Ok(EarnOutcome::Skipped(SkipReason::BelowMinimumPurchase));
        }
        if is_discounted && !program.earn_on_discounted {
            return Ok(EarnOutcome::Skipped(SkipReason::DiscountedExcluded));
        }

        let points = purchase_amount.points(program.points_per_dollar);
        if points == 0 {
            return Ok(EarnOutcome::Skipped(SkipReason::ZeroPoints));
        }

        let metadata = Metadata::from([
            ("purchase_amount".to_string(), purchase_amount.to_string()),
            ("discounted".to_string(), is_discounted.to_string()),
        ]);
        let tx = self.ledger().append(AppendRequest {
            user_id: user,
            merchant_id: merchant,
            program_id: Some(program.id),
            tx_type: TransactionType::Earned,
            points,
            description: format!("earned on purchase of {purchase_amount}"),
            metadata,
            order_id,
            redemption_id: None,
        })?;
        Ok(EarnOutcome::Awarded(tx))
    }

    /// Record a referral kickback: currency commission for `referrer` from
    /// invitee spending on a deal. Appends no points transaction.
    pub fn award_kickback(
        &self,
        merchant: MerchantId,
        referrer: UserId,
        deal: DealId,
        invitee_spend_total: Amount,
        invitee_count: u32,
        kickback_rate: f64,
    ) -> Result<KickbackEvent, EngineError> {
        // NaN fails the range check
        if !(kickback_rate > 0.0 && kickback_rate <= 1.0) {
            return Err(KickbackError::InvalidRate(kickback_rate).into());
        }
        if invitee_spend_total <= Amount::ZERO {
            return Err(KickbackError::InvalidSpend(invitee_spend_total).into());
        }
        if invitee_count == 0 {
            return Err(KickbackError::NoInvitees.into());
        }

        let event = KickbackEvent {
            merchant_id: merchant,
            user_id: referrer,
            deal_id: deal,
            source_amount_spent: invitee_spend_total,
            amount_earned: invitee_spend_total.ratio(kickback_rate),
            invitee_count,
            created_at: Utc::now(),
        };
        self.kickback_log().write().push(event.clone());
        Ok(event)
    }

    /// Kickback events recorded for a merchant, oldest first. Read-only view
    /// for reporting.
    pub fn kickbacks(&self, merchant: MerchantId) -> Vec<KickbackEvent> {
        self.kickback_log()
            .read()
            .iter()
            .filter(|event| event.merchant_id == merchant)
            .cloned()
            .collect()
    }
}
