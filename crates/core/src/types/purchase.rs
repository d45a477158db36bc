//! Purchase records.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::id::{PurchaseId, UserId};
use super::item::Item;
use super::money::Money;

/// Receipt of a completed checkout.
///
/// Immutable once created, except for `refunded` which only ever moves from
/// `false` to `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub owner: UserId,
    pub items: Vec<Item>,
    pub total: Money,
    pub purchased_at: Option<NaiveDateTime>,
    refunded: bool,
}

impl Purchase {
    /// Build a purchase record.
    #[must_use]
    pub const fn new(
        id: PurchaseId,
        owner: UserId,
        items: Vec<Item>,
        total: Money,
        purchased_at: Option<NaiveDateTime>,
        refunded: bool,
    ) -> Self {
        Self {
            id,
            owner,
            items,
            total,
            purchased_at,
            refunded,
        }
    }

    /// Whether the purchase has been refunded.
    #[must_use]
    pub const fn is_refunded(&self) -> bool {
        self.refunded
    }

    /// Flag the purchase as refunded. Returns `false` if it already was.
    pub const fn mark_refunded(&mut self) -> bool {
        if self.refunded {
            return false;
        }
        self.refunded = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refund_flag_only_moves_forward() {
        let mut purchase = Purchase::new(
            PurchaseId::new(1),
            UserId::new(2),
            Vec::new(),
            Money::from_cents(999),
            None,
            false,
        );
        assert!(!purchase.is_refunded());
        assert!(purchase.mark_refunded());
        assert!(purchase.is_refunded());
        assert!(!purchase.mark_refunded());
        assert!(purchase.is_refunded());
    }
}
