//! Program Registry: per-merchant loyalty program configuration.
//!
//! Exactly one program exists per merchant. Programs are created once,
//! changed only through [`ProgramRegistry::update`] and
//! [`ProgramRegistry::set_status`], and never deleted; deactivation stops new
//! earning and redemption but leaves balances untouched.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Amount;
use crate::model::{MerchantId, ProgramId};

/// Error during program registry operations.
#[derive(Debug, Error)]
pub enum ProgramError {
    #[error("merchant {0} already has a loyalty program")]
    AlreadyExists(MerchantId),

    #[error("merchant {0} has no loyalty program")]
    NotFound(MerchantId),

    #[error("invalid program config for merchant {0}: {1}")]
    InvalidConfig(MerchantId, &'static str),
}

/// A merchant's loyalty program configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltyProgram {
    pub id: ProgramId,
    pub merchant_id: MerchantId,
    /// Points awarded per currency unit spent. Earning always floors.
    pub points_per_dollar: f64,
    /// Purchases below this amount earn nothing.
    pub minimum_purchase: Amount,
    /// Smallest number of points a single redemption may claim.
    pub minimum_redemption: i64,
    /// Currency value of one point at redemption.
    pub redemption_value: Amount,
    /// Days after the last earn before the balance expires; `None` = never.
    pub point_expiration_days: Option<u32>,
    pub allow_combine_with_deals: bool,
    pub earn_on_discounted: bool,
    pub is_active: bool,
}

/// Program settings at creation time. Omitted fields take defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgramConfig {
    pub points_per_dollar: Option<f64>,
    pub minimum_purchase: Option<Amount>,
    pub minimum_redemption: Option<i64>,
    pub redemption_value: Option<Amount>,
    pub point_expiration_days: Option<u32>,
    pub allow_combine_with_deals: Option<bool>,
    pub earn_on_discounted: Option<bool>,
}

/// Partial update; only provided fields change.
///
/// `point_expiration_days` is doubly optional so a patch can distinguish
/// "leave as is" (`None`) from "clear, points never expire" (`Some(None)`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgramPatch {
    pub points_per_dollar: Option<f64>,
    pub minimum_purchase: Option<Amount>,
    pub minimum_redemption: Option<i64>,
    pub redemption_value: Option<Amount>,
    pub point_expiration_days: Option<Option<u32>>,
    pub allow_combine_with_deals: Option<bool>,
    pub earn_on_discounted: Option<bool>,
}

/// Registry of loyalty programs, keyed by merchant.
#[derive(Debug)]
pub struct ProgramRegistry {
    programs: DashMap<MerchantId, LoyaltyProgram>,
    next_id: AtomicU64,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self {
            programs: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create the program for a merchant, applying defaults for omitted
    /// fields. Fails if the merchant already has one.
    pub fn initialize(
        &self,
        merchant: MerchantId,
        config: ProgramConfig,
    ) -> Result<LoyaltyProgram, ProgramError> {
        let program = LoyaltyProgram {
            id: 0, // assigned on insert
            merchant_id: merchant,
            points_per_dollar: config.points_per_dollar.unwrap_or(1.0),
            minimum_purchase: config.minimum_purchase.unwrap_or(Amount::ZERO),
            minimum_redemption: config.minimum_redemption.unwrap_or(100),
            redemption_value: config.redemption_value.unwrap_or(Amount::from_float(0.01)),
            point_expiration_days: config.point_expiration_days,
            allow_combine_with_deals: config.allow_combine_with_deals.unwrap_or(true),
            earn_on_discounted: config.earn_on_discounted.unwrap_or(true),
            is_active: true,
        };
        Self::validate(&program)?;

        match self.programs.entry(merchant) {
            Entry::Occupied(_) => Err(ProgramError::AlreadyExists(merchant)),
            Entry::Vacant(slot) => {
                let mut program = program;
                program.id = self.next_id.fetch_add(1, Ordering::Relaxed);
                slot.insert(program.clone());
                Ok(program)
            }
        }
    }

    /// Fetch a merchant's program.
    pub fn get(&self, merchant: MerchantId) -> Result<LoyaltyProgram, ProgramError> {
        self.programs
            .get(&merchant)
            .map(|entry| entry.clone())
            .ok_or(ProgramError::NotFound(merchant))
    }

    /// Apply a partial config update. The merchant id itself is immutable.
    pub fn update(
        &self,
        merchant: MerchantId,
        patch: ProgramPatch,
    ) -> Result<LoyaltyProgram, ProgramError> {
        let mut entry = self
            .programs
            .get_mut(&merchant)
            .ok_or(ProgramError::NotFound(merchant))?;

        let mut patched = entry.clone();
        if let Some(rate) = patch.points_per_dollar {
            patched.points_per_dollar = rate;
        }
        if let Some(min) = patch.minimum_purchase {
            patched.minimum_purchase = min;
        }
        if let Some(min) = patch.minimum_redemption {
            patched.minimum_redemption = min;
        }
        if let Some(value) = patch.redemption_value {
            patched.redemption_value = value;
        }
        if let Some(days) = patch.point_expiration_days {
            patched.point_expiration_days = days;
        }
        if let Some(allow) = patch.allow_combine_with_deals {
            patched.allow_combine_with_deals = allow;
        }
        if let Some(earn) = patch.earn_on_discounted {
            patched.earn_on_discounted = earn;
        }
        Self::validate(&patched)?;

        *entry = patched.clone();
        Ok(patched)
    }

    /// Toggle whether new earning and redemption are permitted. Existing
    /// balances are unaffected.
    pub fn set_status(
        &self,
        merchant: MerchantId,
        is_active: bool,
    ) -> Result<LoyaltyProgram, ProgramError> {
        let mut entry = self
            .programs
            .get_mut(&merchant)
            .ok_or(ProgramError::NotFound(merchant))?;
        entry.is_active = is_active;
        Ok(entry.clone())
    }

    fn validate(program: &LoyaltyProgram) -> Result<(), ProgramError> {
        let merchant = program.merchant_id;
        if program.points_per_dollar <= 0.0 || !program.points_per_dollar.is_finite() {
            return Err(ProgramError::InvalidConfig(
                merchant,
                "points_per_dollar must be positive",
            ));
        }
        if program.minimum_purchase < Amount::ZERO {
            return Err(ProgramError::InvalidConfig(
                merchant,
                "minimum_purchase must not be negative",
            ));
        }
        if program.minimum_redemption <= 0 {
            return Err(ProgramError::InvalidConfig(
                merchant,
                "minimum_redemption must be positive",
            ));
        }
        if program.redemption_value <= Amount::ZERO {
            return Err(ProgramError::InvalidConfig(
                merchant,
                "redemption_value must be positive",
            ));
        }
        if program.point_expiration_days == Some(0) {
            return Err(ProgramError::InvalidConfig(
                merchant,
                "point_expiration_days must be positive when set",
            ));
        }
        Ok(())
    }
}

impl Default for ProgramRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_applies_defaults() {
        let registry = ProgramRegistry::new();
        let program = registry.initialize(1, ProgramConfig::default()).unwrap();

        assert_eq!(program.merchant_id, 1);
        assert_eq!(program.points_per_dollar, 1.0);
        assert_eq!(program.minimum_purchase, Amount::ZERO);
        assert_eq!(program.minimum_redemption, 100);
        assert_eq!(program.redemption_value, Amount::from_float(0.01));
        assert_eq!(program.point_expiration_days, None);
        assert!(program.allow_combine_with_deals);
        assert!(program.earn_on_discounted);
        assert!(program.is_active);
    }

    #[test]
    fn initialize_twice_fails() {
        let registry = ProgramRegistry::new();
        registry.initialize(1, ProgramConfig::default()).unwrap();

        let result = registry.initialize(1, ProgramConfig::default());
        assert!(matches!(result, Err(ProgramError::AlreadyExists(1))));
    }

    #[test]
    fn get_missing_program_fails() {
        let registry = ProgramRegistry::new();
        assert!(matches!(registry.get(9), Err(ProgramError::NotFound(9))));
    }

    #[test]
    fn initialize_rejects_invalid_config() {
        let registry = ProgramRegistry::new();

        let result = registry.initialize(
            1,
            ProgramConfig {
                points_per_dollar: Some(0.0),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(ProgramError::InvalidConfig(1, _))));

        let result = registry.initialize(
            1,
            ProgramConfig {
                minimum_redemption: Some(0),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(ProgramError::InvalidConfig(1, _))));

        let result = registry.initialize(
            1,
            ProgramConfig {
                point_expiration_days: Some(0),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(ProgramError::InvalidConfig(1, _))));

        // Nothing was created by the failed attempts
        assert!(matches!(registry.get(1), Err(ProgramError::NotFound(1))));
    }

    #[test]
    fn update_changes_only_provided_fields() {
        let registry = ProgramRegistry::new();
        registry.initialize(1, ProgramConfig::default()).unwrap();

        let updated = registry
            .update(
                1,
                ProgramPatch {
                    points_per_dollar: Some(2.5),
                    point_expiration_days: Some(Some(365)),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.points_per_dollar, 2.5);
        assert_eq!(updated.point_expiration_days, Some(365));
        // untouched fields keep their defaults
        assert_eq!(updated.minimum_redemption, 100);
        assert!(updated.earn_on_discounted);
    }

    #[test]
    fn update_can_clear_expiration() {
        let registry = ProgramRegistry::new();
        registry
            .initialize(
                1,
                ProgramConfig {
                    point_expiration_days: Some(90),
                    ..Default::default()
                },
            )
            .unwrap();

        let updated = registry
            .update(
                1,
                ProgramPatch {
                    point_expiration_days: Some(None),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.point_expiration_days, None);
    }

    #[test]
    fn update_missing_program_fails() {
        let registry = ProgramRegistry::new();
        let result = registry.update(1, ProgramPatch::default());
        assert!(matches!(result, Err(ProgramError::NotFound(1))));
    }

    #[test]
    fn update_rejects_invalid_patch_and_keeps_existing() {
        let registry = ProgramRegistry::new();
        registry.initialize(1, ProgramConfig::default()).unwrap();

        let result = registry.update(
            1,
            ProgramPatch {
                redemption_value: Some(Amount::ZERO),
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(ProgramError::InvalidConfig(1, _))));

        // existing config untouched
        let program = registry.get(1).unwrap();
        assert_eq!(program.redemption_value, Amount::from_float(0.01));
    }

    #[test]
    fn set_status_toggles_activity() {
        let registry = ProgramRegistry::new();
        registry.initialize(1, ProgramConfig::default()).unwrap();

        let program = registry.set_status(1, false).unwrap();
        assert!(!program.is_active);

        let program = registry.set_status(1, true).unwrap();
        assert!(program.is_active);
    }

    #[test]
    fn program_ids_are_unique() {
        let registry = ProgramRegistry::new();
        let a = registry.initialize(1, ProgramConfig::default()).unwrap();
        let b = registry.initialize(2, ProgramConfig::default()).unwrap();
        assert_ne!(a.id, b.id);
    }
}
