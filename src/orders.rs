//! Order items and vendor profiles
//!
//! Read models consumed from the order/catalog side of the platform.
//! Settlement only ever reads DELIVERED items; status transitions are driven
//! by vendor/deliverer actions outside this crate.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{OrderId, OrderItemId, VendorId};
use crate::fees::BusinessModel;

/// Fulfillment status of one order item.
///
/// Status ids are stored as SMALLINT; terminal failure states are negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i16)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentStatus {
    Pending = 0,
    Processing = 10,
    Shipped = 20,
    OutForDelivery = 30,
    /// Terminal: eligible for settlement
    Delivered = 40,
    /// Terminal: delivery attempt failed
    DeliveryFailed = -10,
    /// Terminal: cancelled (also set when a dispute refund voids the item)
    Cancelled = -20,
}

impl FulfillmentStatus {
    #[inline]
    pub fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(FulfillmentStatus::Pending),
            10 => Some(FulfillmentStatus::Processing),
            20 => Some(FulfillmentStatus::Shipped),
            30 => Some(FulfillmentStatus::OutForDelivery),
            40 => Some(FulfillmentStatus::Delivered),
            -10 => Some(FulfillmentStatus::DeliveryFailed),
            -20 => Some(FulfillmentStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "PENDING",
            FulfillmentStatus::Processing => "PROCESSING",
            FulfillmentStatus::Shipped => "SHIPPED",
            FulfillmentStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            FulfillmentStatus::Delivered => "DELIVERED",
            FulfillmentStatus::DeliveryFailed => "DELIVERY_FAILED",
            FulfillmentStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of an order: a quantity of one vendor's product.
///
/// `platform_fee`/`gateway_fee` are written exactly once at pricing time and
/// then never recomputed; `fees_priced` marks whether that has happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub vendor_id: VendorId,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub status: FulfillmentStatus,
    pub platform_fee: Decimal,
    pub gateway_fee: Decimal,
    pub fees_priced: bool,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl OrderItem {
    pub fn gross(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Net earning from the persisted fees. Only meaningful once priced.
    pub fn net_earning(&self) -> Decimal {
        self.gross() - self.platform_fee - self.gateway_fee
    }
}

/// Vendor settlement profile, read from the vendor side of the platform
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorProfile {
    pub vendor_id: VendorId,
    pub business_model: BusinessModel,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_status_id_roundtrip() {
        let states = [
            FulfillmentStatus::Pending,
            FulfillmentStatus::Processing,
            FulfillmentStatus::Shipped,
            FulfillmentStatus::OutForDelivery,
            FulfillmentStatus::Delivered,
            FulfillmentStatus::DeliveryFailed,
            FulfillmentStatus::Cancelled,
        ];
        for s in states {
            assert_eq!(FulfillmentStatus::from_id(s.id()), Some(s));
        }
        assert!(FulfillmentStatus::from_id(99).is_none());
    }

    #[test]
    fn test_gross_and_net() {
        let item = OrderItem {
            id: 1,
            order_id: 1,
            vendor_id: 7,
            unit_price: Decimal::new(2500, 2), // 25.00
            quantity: 4,
            status: FulfillmentStatus::Delivered,
            platform_fee: Decimal::new(300, 2),
            gateway_fee: Decimal::new(200, 2),
            fees_priced: true,
            delivered_at: None,
        };
        assert_eq!(item.gross(), Decimal::new(10000, 2));
        assert_eq!(item.net_earning(), Decimal::new(9500, 2));
    }
}
