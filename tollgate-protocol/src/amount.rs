//! Fee and transfer values using fixed-point decimal
//!
//! Fees are computed in exact decimal arithmetic. Wallet fees are whole
//! units and get truncated explicitly; message and exchange fees keep their
//! fractional part.
//!
//! # Security
//!
//! - Uses `Decimal` internally (28-29 significant digits)
//! - No f64 anywhere in fee computation
//! - Serializes as string (preserves precision)

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tollgate_lib::ProtocolError;

/// A value in some currency's unit, possibly fractional.
///
/// # Examples
///
/// ```rust
/// use tollgate_protocol::Amount;
///
/// let a = Amount::from_units(1000);
/// let b = Amount::from_units(500);
/// let total = a.checked_add(&b).unwrap();
/// assert_eq!(total.as_units(), 1500);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount {
    // Decimal serializes as string with the serde feature
    value: Decimal,
}

impl Amount {
    /// Create from whole units
    ///
    /// ```rust
    /// use tollgate_protocol::Amount;
    /// assert_eq!(Amount::from_units(7).as_units(), 7);
    /// ```
    pub fn from_units(units: i64) -> Self {
        Self {
            value: Decimal::from(units),
        }
    }

    pub fn from_decimal(value: Decimal) -> Self {
        Self { value }
    }

    /// Create from decimal string (e.g., "0.35")
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedInput`] if the string is not a decimal.
    ///
    /// ```rust
    /// use tollgate_protocol::Amount;
    /// let amt = Amount::from_str_checked("100.50").unwrap();
    /// assert_eq!(amt.to_string(), "100.50");
    /// ```
    pub fn from_str_checked(s: &str) -> Result<Self, ProtocolError> {
        Decimal::from_str(s)
            .map(|value| Self { value })
            .map_err(|e| ProtocolError::malformed("amount", e.to_string()))
    }

    /// Whole units, truncated toward zero and clamped to the i64 range.
    pub fn as_units(&self) -> i64 {
        self.value.trunc().to_i64().unwrap_or(if self.value.is_sign_negative() {
            i64::MIN
        } else {
            i64::MAX
        })
    }

    pub fn as_decimal(&self) -> Decimal {
        self.value
    }

    pub fn zero() -> Self {
        Self {
            value: Decimal::ZERO,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_sign_negative() && !self.value.is_zero()
    }

    /// Checked addition (returns None on overflow)
    pub fn checked_add(&self, other: &Self) -> Option<Self> {
        self.value
            .checked_add(other.value)
            .map(|value| Self { value })
    }

    /// Saturating addition (clamps to max on overflow)
    pub fn saturating_add(&self, other: &Self) -> Self {
        Self {
            value: self.value.saturating_add(other.value),
        }
    }

    /// Drop the fractional part.
    ///
    /// ```rust
    /// use tollgate_protocol::Amount;
    /// let amt = Amount::from_str_checked("12.99").unwrap();
    /// assert_eq!(amt.truncate(), Amount::from_units(12));
    /// ```
    pub fn truncate(&self) -> Self {
        Self {
            value: self.value.trunc(),
        }
    }

    /// Check if amount is within limit (<=)
    pub fn is_within_limit(&self, limit: &Self) -> bool {
        self.value <= limit.value
    }

    /// Exact percentage of this amount, without rounding.
    ///
    /// ```rust
    /// use tollgate_protocol::Amount;
    /// use rust_decimal_macros::dec;
    ///
    /// let amount = Amount::from_units(250);
    /// assert_eq!(amount.percentage(dec!(1.5)).as_decimal(), dec!(3.75));
    /// ```
    pub fn percentage(&self, rate: Decimal) -> Self {
        let value = self
            .value
            .checked_mul(rate)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::MAX);
        Self { value }
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Self::from_decimal(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FromStr for Amount {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_checked(s)
    }
}
