//! Fee calculation
//!
//! Pure functions computing the platform and gateway cut for one order item.
//! The result is persisted on the item at pricing time so a later commission
//! rate change cannot alter an already-priced sale.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::round_minor;

/// How a vendor pays the platform.
///
/// Subscription vendors pay a recurring fee (charged to their wallet as a
/// SUBSCRIPTION entry) and owe no per-sale commission; commission vendors pay
/// a percentage of every sale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum BusinessModel {
    /// Per-sale percentage, e.g. rate = 0.03 for 3%
    Commission { rate: Decimal },
    /// Flat recurring fee already paid; no per-sale platform cut
    Subscription,
}

impl BusinessModel {
    /// Platform fee for a gross sale amount, rounded to the currency's minor
    /// unit with round-half-up.
    pub fn platform_fee(&self, gross: Decimal, minor_units: u32) -> Decimal {
        match self {
            BusinessModel::Commission { rate } => round_minor(gross * rate, minor_units),
            BusinessModel::Subscription => Decimal::ZERO,
        }
    }

    pub fn is_commission(&self) -> bool {
        matches!(self, BusinessModel::Commission { .. })
    }
}

/// Gateway fee schedule: flat component plus a percentage of the gross.
/// Supplied by configuration, never hardcoded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GatewayFeeSchedule {
    pub flat: Decimal,
    pub rate: Decimal,
}

impl GatewayFeeSchedule {
    pub fn fee(&self, gross: Decimal, minor_units: u32) -> Decimal {
        round_minor(self.flat + gross * self.rate, minor_units)
    }
}

/// Result of pricing one order item
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeBreakdown {
    pub gross: Decimal,
    pub platform_fee: Decimal,
    pub gateway_fee: Decimal,
    pub net_earning: Decimal,
}

/// Compute the fee breakdown for one order item.
///
/// `gross = unit_price * quantity`. Invariants: each fee stays within
/// `[0, gross]` and `net_earning >= 0`.
pub fn compute_fees(
    unit_price: Decimal,
    quantity: u32,
    model: BusinessModel,
    gateway: &GatewayFeeSchedule,
    minor_units: u32,
) -> FeeBreakdown {
    let gross = round_minor(unit_price * Decimal::from(quantity), minor_units);

    let platform_fee = model
        .platform_fee(gross, minor_units)
        .clamp(Decimal::ZERO, gross);
    let gateway_fee = gateway.fee(gross, minor_units).clamp(Decimal::ZERO, gross);

    let net_earning = (gross - platform_fee - gateway_fee).max(Decimal::ZERO);

    FeeBreakdown {
        gross,
        platform_fee,
        gateway_fee,
        net_earning,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn gateway_flat(flat: &str) -> GatewayFeeSchedule {
        GatewayFeeSchedule {
            flat: dec(flat),
            rate: Decimal::ZERO,
        }
    }

    #[test]
    fn test_commission_basic() {
        // gross 100.00, rate 3%, flat gateway 2.00 -> 3.00 / 2.00 / 95.00
        let out = compute_fees(
            dec("100.00"),
            1,
            BusinessModel::Commission { rate: dec("0.03") },
            &gateway_flat("2.00"),
            2,
        );
        assert_eq!(out.platform_fee, dec("3.00"));
        assert_eq!(out.gateway_fee, dec("2.00"));
        assert_eq!(out.net_earning, dec("95.00"));
    }

    #[test]
    fn test_subscription_pays_no_commission() {
        let out = compute_fees(
            dec("250.00"),
            2,
            BusinessModel::Subscription,
            &gateway_flat("2.00"),
            2,
        );
        assert_eq!(out.gross, dec("500.00"));
        assert_eq!(out.platform_fee, dec("0"));
        // gateway fee still applies
        assert_eq!(out.gateway_fee, dec("2.00"));
        assert_eq!(out.net_earning, dec("498.00"));
    }

    #[test]
    fn test_commission_rounds_half_up() {
        // 16.85 * 3 = 50.55 gross; 50.55 * 0.03 = 1.5165 -> 1.52
        let out = compute_fees(
            dec("16.85"),
            3,
            BusinessModel::Commission { rate: dec("0.03") },
            &gateway_flat("0"),
            2,
        );
        assert_eq!(out.gross, dec("50.55"));
        assert_eq!(out.platform_fee, dec("1.52"));
        assert_eq!(out.net_earning, dec("49.03"));
    }

    #[test]
    fn test_gateway_percentage_component() {
        let schedule = GatewayFeeSchedule {
            flat: dec("0.50"),
            rate: dec("0.015"),
        };
        // gross 80.00 -> 0.50 + 1.20 = 1.70
        let out = compute_fees(
            dec("80.00"),
            1,
            BusinessModel::Commission { rate: dec("0.05") },
            &schedule,
            2,
        );
        assert_eq!(out.gateway_fee, dec("1.70"));
        assert_eq!(out.platform_fee, dec("4.00"));
        assert_eq!(out.net_earning, dec("74.30"));
    }

    #[test]
    fn test_fees_never_exceed_gross() {
        // tiny sale, flat gateway fee larger than the sale itself
        let out = compute_fees(
            dec("1.00"),
            1,
            BusinessModel::Commission { rate: dec("0.03") },
            &gateway_flat("2.00"),
            2,
        );
        assert_eq!(out.gateway_fee, dec("1.00"));
        assert!(out.net_earning >= Decimal::ZERO);
    }

    #[test]
    fn test_zero_minor_unit_currency() {
        // whole-unit currency: everything rounds to integers
        let out = compute_fees(
            dec("1500"),
            1,
            BusinessModel::Commission { rate: dec("0.025") },
            &gateway_flat("25"),
            0,
        );
        // 1500 * 0.025 = 37.5 -> 38
        assert_eq!(out.platform_fee, dec("38"));
        assert_eq!(out.net_earning, dec("1437"));
    }
}
