//! Order lifecycle rules
//!
//! Pure functions deciding which order status changes are legal, what the
//! payment status becomes as a consequence, and whether stock has to move.
//! Persistence lives in [`crate::models::order`]; this module never touches
//! the database.
//!
//! # State Machine
//!
//! ```text
//! pending    → confirmed | processing | cancelled
//! confirmed  → processing | shipped | cancelled
//! processing → shipped | cancelled
//! shipped    → delivered | returned
//! delivered  → returned
//! ```
//!
//! `cancelled` and `returned` are terminal.
//!
//! # Payment Derivation
//!
//! | Order becomes | Method           | Payment before | Payment after |
//! |---------------|------------------|----------------|---------------|
//! | delivered     | cash on delivery | any but refunded | paid        |
//! | cancelled     | any              | paid           | refunded      |
//! | cancelled     | any              | pending        | failed        |
//! | returned      | any              | paid           | refunded      |
//!
//! # Example
//!
//! ```
//! use storecraft_shared::commerce::lifecycle::{
//!     plan_transition, InventoryEffect, OrderStatus, PaymentMethod, PaymentStatus,
//! };
//!
//! let plan = plan_transition(
//!     OrderStatus::Shipped,
//!     PaymentStatus::Pending,
//!     PaymentMethod::CashOnDelivery,
//!     OrderStatus::Delivered,
//! )
//! .unwrap();
//!
//! assert_eq!(plan.payment_status, PaymentStatus::Paid);
//! assert_eq!(plan.inventory, InventoryEffect::Decrement);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fulfilment status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, not yet looked at by the store
    Pending,

    /// Accepted by the store
    Confirmed,

    /// Being packed
    Processing,

    /// Handed to the carrier
    Shipped,

    /// Received by the customer
    Delivered,

    /// Cancelled before delivery
    Cancelled,

    /// Sent back after shipping
    Returned,
}

impl OrderStatus {
    /// All statuses, in lifecycle order
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }

    /// Terminal statuses accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Returned)
    }

    /// Checks if transition to target status is valid
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;

        matches!(
            (self, target),
            (Pending, Confirmed)
                | (Pending, Processing)
                | (Pending, Cancelled)
                | (Confirmed, Processing)
                | (Confirmed, Shipped)
                | (Confirmed, Cancelled)
                | (Processing, Shipped)
                | (Processing, Cancelled)
                | (Shipped, Delivered)
                | (Shipped, Returned)
                | (Delivered, Returned)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Nothing collected yet
    Pending,

    /// Money collected
    Paid,

    /// Money returned to the customer
    Refunded,

    /// Collection failed or was abandoned
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }

    /// Whether staff may set `target` by hand (outside an order status change)
    pub fn can_set_manually(&self, target: PaymentStatus) -> bool {
        use PaymentStatus::*;

        matches!(
            (self, target),
            (Pending, Paid) | (Pending, Failed) | (Failed, Paid) | (Paid, Refunded)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the customer pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Collected by the courier at the door
    CashOnDelivery,

    /// Paid through a payment provider at checkout
    Online,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "cash_on_delivery",
            PaymentMethod::Online => "online",
        }
    }
}

/// Stock movement required by a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryEffect {
    /// No stock changes
    None,

    /// Take ordered quantities out of stock
    Decrement,

    /// Put ordered quantities back into stock
    Restock,
}

/// Errors raised by order rules
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    /// Status change not allowed by the state machine
    #[error("Cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Manual payment change not allowed
    #[error("Cannot change payment status from {from} to {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Order has no line items
    #[error("Order must contain at least one item")]
    EmptyOrder,

    /// Line item quantity is zero or negative
    #[error("Quantity must be at least 1")]
    InvalidQuantity,

    /// Product missing, archived, or still a draft
    #[error("Product {0} is not available")]
    ProductUnavailable(uuid::Uuid),

    /// No variant matches the requested selection
    #[error("No matching variant for product {0}")]
    VariantNotFound(uuid::Uuid),

    /// Invoice amount is zero or negative
    #[error("Invoice amount must be positive")]
    InvalidInvoiceAmount,

    /// Order amounts exceed what an order can record
    #[error("Order amount exceeds {max}")]
    AmountTooLarge { max: rust_decimal::Decimal },
}

/// Outcome of validating a status change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub from: OrderStatus,
    pub to: OrderStatus,

    /// Payment status after the change
    pub payment_status: PaymentStatus,

    /// Stock movement to apply together with the change
    pub inventory: InventoryEffect,
}

/// Payment status a freshly placed order starts with
///
/// Online orders whose payment was captured at checkout start `paid`;
/// everything else waits.
pub fn initial_payment_status(method: PaymentMethod, paid_upfront: bool) -> PaymentStatus {
    match (method, paid_upfront) {
        (PaymentMethod::Online, true) => PaymentStatus::Paid,
        _ => PaymentStatus::Pending,
    }
}

/// Derives the payment status implied by moving an order into `next`
pub fn derive_payment_status(
    method: PaymentMethod,
    current: PaymentStatus,
    next: OrderStatus,
) -> PaymentStatus {
    match (next, method, current) {
        (OrderStatus::Delivered, PaymentMethod::CashOnDelivery, PaymentStatus::Refunded) => current,
        (OrderStatus::Delivered, PaymentMethod::CashOnDelivery, _) => PaymentStatus::Paid,
        (OrderStatus::Cancelled, _, PaymentStatus::Paid) => PaymentStatus::Refunded,
        (OrderStatus::Cancelled, _, PaymentStatus::Pending) => PaymentStatus::Failed,
        (OrderStatus::Returned, _, PaymentStatus::Paid) => PaymentStatus::Refunded,
        _ => current,
    }
}

/// Validates a status change and works out its consequences
///
/// # Errors
///
/// Returns `OrderError::InvalidTransition` when the state machine forbids
/// the change, including `from == to`.
pub fn plan_transition(
    from: OrderStatus,
    payment: PaymentStatus,
    method: PaymentMethod,
    to: OrderStatus,
) -> Result<TransitionPlan, OrderError> {
    if !from.can_transition_to(to) {
        return Err(OrderError::InvalidTransition { from, to });
    }

    // Stock only left the shelf once the order was delivered
    let inventory = match (from, to) {
        (_, OrderStatus::Delivered) => InventoryEffect::Decrement,
        (OrderStatus::Delivered, OrderStatus::Returned) => InventoryEffect::Restock,
        _ => InventoryEffect::None,
    };

    Ok(TransitionPlan {
        from,
        to,
        payment_status: derive_payment_status(method, payment, to),
        inventory,
    })
}

/// Validates a manual payment status change
pub fn plan_payment_change(
    current: PaymentStatus,
    target: PaymentStatus,
) -> Result<PaymentStatus, OrderError> {
    if current.can_set_manually(target) {
        Ok(target)
    } else {
        Err(OrderError::InvalidPaymentTransition {
            from: current,
            to: target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
        ];

        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        for terminal in [OrderStatus::Cancelled, OrderStatus::Returned] {
            assert!(terminal.is_terminal());
            for target in OrderStatus::ALL {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn test_self_transition_rejected() {
        for status in OrderStatus::ALL {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_cannot_cancel_after_shipping() {
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn test_cancelled_to_shipped_is_rejected() {
        let err = plan_transition(
            OrderStatus::Cancelled,
            PaymentStatus::Failed,
            PaymentMethod::Online,
            OrderStatus::Shipped,
        )
        .unwrap_err();

        assert_eq!(
            err,
            OrderError::InvalidTransition {
                from: OrderStatus::Cancelled,
                to: OrderStatus::Shipped,
            }
        );
        assert_eq!(
            err.to_string(),
            "Cannot change order status from cancelled to shipped"
        );
    }

    #[test]
    fn test_cod_becomes_paid_on_delivery() {
        let plan = plan_transition(
            OrderStatus::Shipped,
            PaymentStatus::Pending,
            PaymentMethod::CashOnDelivery,
            OrderStatus::Delivered,
        )
        .unwrap();

        assert_eq!(plan.payment_status, PaymentStatus::Paid);
        assert_eq!(plan.inventory, InventoryEffect::Decrement);
    }

    #[test]
    fn test_online_pending_stays_pending_on_delivery() {
        let status = derive_payment_status(
            PaymentMethod::Online,
            PaymentStatus::Pending,
            OrderStatus::Delivered,
        );
        assert_eq!(status, PaymentStatus::Pending);
    }

    #[test]
    fn test_cancel_refunds_paid_orders() {
        let plan = plan_transition(
            OrderStatus::Confirmed,
            PaymentStatus::Paid,
            PaymentMethod::Online,
            OrderStatus::Cancelled,
        )
        .unwrap();

        assert_eq!(plan.payment_status, PaymentStatus::Refunded);
        assert_eq!(plan.inventory, InventoryEffect::None);
    }

    #[test]
    fn test_cancel_fails_pending_payment() {
        let status = derive_payment_status(
            PaymentMethod::CashOnDelivery,
            PaymentStatus::Pending,
            OrderStatus::Cancelled,
        );
        assert_eq!(status, PaymentStatus::Failed);
    }

    #[test]
    fn test_return_after_delivery_restocks_and_refunds() {
        let plan = plan_transition(
            OrderStatus::Delivered,
            PaymentStatus::Paid,
            PaymentMethod::CashOnDelivery,
            OrderStatus::Returned,
        )
        .unwrap();

        assert_eq!(plan.inventory, InventoryEffect::Restock);
        assert_eq!(plan.payment_status, PaymentStatus::Refunded);
    }

    #[test]
    fn test_return_in_transit_does_not_restock() {
        let plan = plan_transition(
            OrderStatus::Shipped,
            PaymentStatus::Pending,
            PaymentMethod::CashOnDelivery,
            OrderStatus::Returned,
        )
        .unwrap();

        assert_eq!(plan.inventory, InventoryEffect::None);
        assert_eq!(plan.payment_status, PaymentStatus::Pending);
    }

    #[test]
    fn test_initial_payment_status() {
        assert_eq!(
            initial_payment_status(PaymentMethod::Online, true),
            PaymentStatus::Paid
        );
        assert_eq!(
            initial_payment_status(PaymentMethod::Online, false),
            PaymentStatus::Pending
        );
        assert_eq!(
            initial_payment_status(PaymentMethod::CashOnDelivery, true),
            PaymentStatus::Pending
        );
    }

    #[test]
    fn test_manual_payment_changes() {
        assert_eq!(
            plan_payment_change(PaymentStatus::Pending, PaymentStatus::Paid),
            Ok(PaymentStatus::Paid)
        );
        assert_eq!(
            plan_payment_change(PaymentStatus::Paid, PaymentStatus::Refunded),
            Ok(PaymentStatus::Refunded)
        );
        assert!(plan_payment_change(PaymentStatus::Refunded, PaymentStatus::Paid).is_err());
        assert!(plan_payment_change(PaymentStatus::Paid, PaymentStatus::Paid).is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&OrderStatus::Delivered).unwrap();
        assert_eq!(json, "\"delivered\"");

        let method: PaymentMethod = serde_json::from_str("\"cash_on_delivery\"").unwrap();
        assert_eq!(method, PaymentMethod::CashOnDelivery);
    }
}
