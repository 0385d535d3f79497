use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed-point currency amount with 4 decimal places, stored as a scaled integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Amount(i64);

impl Amount {
    const SCALE: i64 = 10_000;
    /// Scaled units per cent, used when rounding to whole cents.
    const CENT: i64 = Self::SCALE / 100;

    pub const ZERO: Amount = Amount(0);

    pub fn from_float(value: f64) -> Self {
        Amount((value * Self::SCALE as f64).round() as i64)
    }

    pub fn from_scaled(value: i64) -> Self {
        Amount(value)
    }

    /// Points earned for this purchase amount at the given rate.
    ///
    /// Always floors: fractional points are never awarded, and boundary
    /// amounts never round up (9.99 at 1 point/dollar yields 9, not 10).
    /// The product is snapped back to the 4-decimal grid before flooring so
    /// binary float error cannot tip a whole-point boundary.
    pub fn points(self, points_per_dollar: f64) -> i64 {
        let scaled = (self.0 as f64 * points_per_dollar).round() as i64;
        scaled.div_euclid(Self::SCALE)
    }

    /// Currency share of this amount at the given rate, rounded half-up to
    /// whole cents. Used for kickback commission, which is paid in currency.
    pub fn ratio(self, rate: f64) -> Amount {
        // Snap to the 4-decimal grid first, then half-up in integer math.
        let scaled = (self.0 as f64 * rate).round() as i64;
        let cents = (scaled + Self::CENT / 2).div_euclid(Self::CENT);
        Amount(cents * Self::CENT)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        let whole = abs / Self::SCALE;
        let frac = abs % Self::SCALE;
        write!(f, "{sign}{whole}.{frac:04}")
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_scaled_preserves_value() {
        let amount = Amount::from_scaled(123456);
        assert_eq!(amount, Amount(123456));
    }

    #[test]
    fn from_float_converts_correctly() {
        assert_eq!(Amount::from_float(100.0), Amount::from_scaled(1_000_000));
        assert_eq!(Amount::from_float(1.5), Amount::from_scaled(15_000));
        assert_eq!(Amount::from_float(0.0001), Amount::from_scaled(1));
    }

    #[test]
    fn from_float_rounds_correctly() {
        assert_eq!(Amount::from_float(1.23456), Amount::from_scaled(12346));
        assert_eq!(Amount::from_float(1.23454), Amount::from_scaled(12345));
    }

    #[test]
    fn display_formats_positive() {
        assert_eq!(Amount::from_scaled(1_000_000).to_string(), "100.0000");
        assert_eq!(Amount::from_scaled(15_000).to_string(), "1.5000");
        assert_eq!(Amount::from_scaled(0).to_string(), "0.0000");
    }

    #[test]
    fn display_formats_negative() {
        assert_eq!(Amount::from_scaled(-502_500).to_string(), "-50.2500");
        assert_eq!(Amount::from_scaled(-1).to_string(), "-0.0001");
    }

    #[test]
    fn points_floors_boundary_amounts() {
        assert_eq!(Amount::from_float(9.99).points(1.0), 9);
        assert_eq!(Amount::from_float(10.0).points(1.0), 10);
        assert_eq!(Amount::from_float(10.01).points(1.0), 10);
    }

    #[test]
    fn points_floors_fractional_rates() {
        assert_eq!(Amount::from_float(10.0).points(1.5), 15);
        assert_eq!(Amount::from_float(9.0).points(1.5), 13); // 13.5 floors
        assert_eq!(Amount::from_float(0.5).points(1.0), 0);
    }

    #[test]
    fn ratio_rounds_half_up_to_cents() {
        // 10.0 * 0.125 = 1.25 exactly
        assert_eq!(
            Amount::from_float(10.0).ratio(0.125),
            Amount::from_float(1.25)
        );
        // 10.05 * 0.05 = 0.5025 -> 0.50
        assert_eq!(
            Amount::from_float(10.05).ratio(0.05),
            Amount::from_float(0.50)
        );
        // 10.10 * 0.05 = 0.505 -> half rounds up to 0.51
        assert_eq!(
            Amount::from_float(10.10).ratio(0.05),
            Amount::from_float(0.51)
        );
    }

    #[test]
    fn ratio_yields_whole_cents() {
        let earned = Amount::from_float(33.33).ratio(0.1);
        assert_eq!(earned, Amount::from_float(3.33));
    }

    #[test]
    fn default_is_zero() {
        assert_eq!(Amount::default(), Amount::ZERO);
    }

    #[test]
    fn add_and_add_assign() {
        let a = Amount::from_scaled(100);
        let b = Amount::from_scaled(50);
        assert_eq!(a + b, Amount::from_scaled(150));

        let mut c = a;
        c += b;
        assert_eq!(c, Amount::from_scaled(150));
    }

    #[test]
    fn ordering() {
        assert!(Amount::from_scaled(-100) < Amount::ZERO);
        assert!(Amount::ZERO < Amount::from_scaled(100));
    }
}
