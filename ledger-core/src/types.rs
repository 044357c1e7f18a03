//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (integer minor units inside the ledger, Decimal at the edges)

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Wrap an existing UUID
            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Generate a fresh random id
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }

            /// Underlying UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Raw bytes (used for storage keys)
            pub fn as_bytes(&self) -> &[u8; 16] {
                self.0.as_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Territory (marketplace region) identifier
    TerritoryId
);
uuid_id!(
    /// Store identifier
    StoreId
);
uuid_id!(
    /// Platform user identifier (sellers, buyers, admins)
    UserId
);
uuid_id!(
    /// Checkout identifier
    CheckoutId
);

/// Opaque payout identifier issued by the payout gateway
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PayoutId(String);

impl PayoutId {
    /// Create new payout ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO 4217 currency code (three uppercase ASCII letters)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    /// US Dollar
    pub const USD: Currency = Currency(*b"USD");
    /// Euro
    pub const EUR: Currency = Currency(*b"EUR");
    /// British Pound
    pub const GBP: Currency = Currency(*b"GBP");

    /// Parse and validate a currency code
    pub fn new(code: &str) -> crate::Result<Self> {
        let bytes = code.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_uppercase()) {
            return Err(crate::Error::InvalidAmount(format!(
                "currency code must be three uppercase letters, got '{}'",
                code
            )));
        }
        Ok(Self([bytes[0], bytes[1], bytes[2]]))
    }

    /// ISO 4217 code
    pub fn code(&self) -> &str {
        // Constructed only from validated ASCII
        std::str::from_utf8(&self.0).unwrap_or("???")
    }

    /// Raw bytes (used for storage keys)
    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl TryFrom<String> for Currency {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Currency::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.code().to_string()
    }
}

/// Who caused a status change or audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    /// Automated process (webhook, sweep, scheduler)
    System,
    /// A platform user (admin action)
    User(UserId),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::System => write!(f, "system"),
            Actor::User(id) => write!(f, "user:{}", id),
        }
    }
}

/// Minor units per major unit for two-decimal currencies
const MINOR_UNITS: i64 = 100;

/// Convert a major-unit decimal (e.g. 12.345) into integer minor units (1235).
///
/// Rounds midpoint away from zero. Fails if the value does not fit in `i64`.
pub fn cents_from_decimal(amount: Decimal) -> crate::Result<i64> {
    let scaled = amount
        .checked_mul(Decimal::from(MINOR_UNITS))
        .ok_or_else(|| crate::Error::InvalidAmount(format!("{} overflows", amount)))?;
    scaled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| crate::Error::InvalidAmount(format!("{} does not fit in minor units", amount)))
}

/// Convert integer minor units back into a major-unit decimal
pub fn decimal_from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_validation() {
        assert_eq!(Currency::new("USD").unwrap(), Currency::USD);
        assert_eq!(Currency::new("EUR").unwrap().code(), "EUR");
        assert!(Currency::new("usd").is_err());
        assert!(Currency::new("US").is_err());
        assert!(Currency::new("USDT").is_err());
    }

    #[test]
    fn test_currency_bincode_roundtrip() {
        let bytes = bincode::serialize(&Currency::GBP).unwrap();
        let decoded: Currency = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, Currency::GBP);
    }

    #[test]
    fn test_cents_from_decimal() {
        assert_eq!(cents_from_decimal(Decimal::new(12345, 2)).unwrap(), 12345);
        assert_eq!(cents_from_decimal(Decimal::new(12345, 3)).unwrap(), 1235);
        assert_eq!(cents_from_decimal(Decimal::from(200)).unwrap(), 20000);
        assert_eq!(cents_from_decimal(Decimal::new(-150, 2)).unwrap(), -150);
        assert!(cents_from_decimal(Decimal::MAX).is_err());
    }

    #[test]
    fn test_actor_display() {
        assert_eq!(Actor::System.to_string(), "system");
        let user = UserId::from_uuid(Uuid::nil());
        assert_eq!(
            Actor::User(user).to_string(),
            "user:00000000-0000-0000-0000-000000000000"
        );
    }
}
