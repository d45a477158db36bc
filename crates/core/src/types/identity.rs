//! Authenticated identity.

use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::UserId;
use super::money::Money;

/// The signed-in account.
///
/// `balance` is a denormalized copy of the wallet, kept loosely in sync by
/// the wallet store. This is also the snapshot persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub display_name: String,
    pub email: Email,
    #[serde(default)]
    pub balance: Money,
}

impl Identity {
    /// Copy of this identity carrying a different balance.
    #[must_use]
    pub fn with_balance(&self, balance: Money) -> Self {
        Self {
            balance,
            ..self.clone()
        }
    }
}
