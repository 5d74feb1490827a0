//! Non-negative coin amounts.
//!
//! Coins are the spendable credit unit of an account. Both balances and
//! grants are represented as [`Coins`], which can never hold a negative
//! value: arithmetic is checked and reports overflow or overdraft as errors.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors produced by [`Coins`] construction and arithmetic.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoinsError {
    /// A negative value was supplied.
    #[error("coin amount cannot be negative (got {0})")]
    Negative(i64),
    /// Adding coins would exceed the representable maximum.
    #[error("coin balance overflow")]
    Overflow,
    /// Subtracting more coins than are available.
    #[error("insufficient coins: balance {balance}, requested {requested}")]
    Insufficient {
        /// Coins available.
        balance: i64,
        /// Coins requested.
        requested: i64,
    },
}

/// A non-negative number of coins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Coins(i64);

impl Coins {
    /// No coins.
    pub const ZERO: Self = Self(0);

    /// Create a coin amount.
    ///
    /// # Errors
    ///
    /// Returns `CoinsError::Negative` if `amount < 0`.
    pub const fn new(amount: i64) -> Result<Self, CoinsError> {
        if amount < 0 {
            return Err(CoinsError::Negative(amount));
        }
        Ok(Self(amount))
    }

    /// Create a coin amount from an unsigned count.
    #[must_use]
    #[allow(clippy::cast_lossless)] // i64::from is not const; u32 always fits in i64
    pub const fn from_u32(amount: u32) -> Self {
        Self(amount as i64)
    }

    /// The amount as an `i64` (always `>= 0`).
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0
    }

    /// Whether this amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Add a grant to this balance.
    ///
    /// # Errors
    ///
    /// Returns `CoinsError::Overflow` if the sum does not fit.
    pub const fn checked_add(self, other: Self) -> Result<Self, CoinsError> {
        match self.0.checked_add(other.0) {
            Some(sum) => Ok(Self(sum)),
            None => Err(CoinsError::Overflow),
        }
    }

    /// Debit `other` from this balance.
    ///
    /// # Errors
    ///
    /// Returns `CoinsError::Insufficient` if `other > self`.
    pub const fn checked_sub(self, other: Self) -> Result<Self, CoinsError> {
        if other.0 > self.0 {
            return Err(CoinsError::Insufficient {
                balance: self.0,
                requested: other.0,
            });
        }
        Ok(Self(self.0 - other.0))
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for Coins {
    type Error = CoinsError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<u32> for Coins {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

impl From<Coins> for i64 {
    fn from(coins: Coins) -> Self {
        coins.0
    }
}

impl<'de> Deserialize<'de> for Coins {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Coins {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Coins {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(raw)?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Coins {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_negative() {
        assert_eq!(Coins::new(-1), Err(CoinsError::Negative(-1)));
        assert_eq!(Coins::new(0), Ok(Coins::ZERO));
    }

    #[test]
    fn test_from_u32_is_lossless() {
        assert_eq!(Coins::from_u32(u32::MAX).as_i64(), i64::from(u32::MAX));
        assert_eq!(Coins::from(0).as_i64(), 0);
    }

    #[test]
    fn test_checked_add() {
        let balance = Coins::from(50);
        assert_eq!(balance.checked_add(Coins::from(150)).unwrap().as_i64(), 200);
        assert_eq!(
            Coins::new(i64::MAX).unwrap().checked_add(Coins::from(1)),
            Err(CoinsError::Overflow)
        );
    }

    #[test]
    fn test_checked_sub_never_goes_negative() {
        let balance = Coins::from(3);
        assert_eq!(balance.checked_sub(Coins::from(3)).unwrap(), Coins::ZERO);
        assert_eq!(
            balance.checked_sub(Coins::from(4)),
            Err(CoinsError::Insufficient {
                balance: 3,
                requested: 4
            })
        );
    }

    #[test]
    fn test_deserialize_rejects_negative() {
        assert!(serde_json::from_str::<Coins>("-5").is_err());
        assert_eq!(serde_json::from_str::<Coins>("5").unwrap().as_i64(), 5);
    }
}
