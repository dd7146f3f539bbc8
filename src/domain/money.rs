use crate::error::{RegistryError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul};

/// Number of decimal places money is tracked with (cents).
pub const MONEY_SCALE: u32 = 2;

/// A non-negative monetary value with cent precision.
///
/// Wraps `rust_decimal::Decimal` so balances, prices and payment rows cannot
/// go negative or carry sub-cent fractions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

/// A strictly positive monetary amount, used for anything the gateway charges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

fn check_scale(value: Decimal) -> Result<()> {
    if value.normalize().scale() > MONEY_SCALE {
        return Err(RegistryError::ValidationError(format!(
            "Amount {} has more than {} decimal places",
            value, MONEY_SCALE
        )));
    }
    Ok(())
}

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(RegistryError::ValidationError(
                "Amount must not be negative".to_string(),
            ));
        }
        check_scale(value)?;
        Ok(Self(value.normalize()))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Whole cents, as persisted by the SQL store.
    pub fn to_minor_units(&self) -> Result<i64> {
        let cents = self.0.checked_mul(Decimal::from(100));
        cents.and_then(|cents| cents.to_i64()).ok_or_else(|| {
            RegistryError::ValidationError(format!("Amount {} is out of range", self.0))
        })
    }

    pub fn from_minor_units(cents: i64) -> Result<Self> {
        Self::new(Decimal::new(cents, MONEY_SCALE))
    }

    /// Applies a percentage discount, rounding the remaining price to cents.
    pub fn discounted(&self, percent: u8) -> Self {
        let keep = Decimal::from(100u32.saturating_sub(u32::from(percent)));
        let price = (self.0 * keep / Decimal::from(100)).round_dp(MONEY_SCALE);
        Self(price.normalize())
    }
}

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            check_scale(value)?;
            Ok(Self(value.normalize()))
        } else {
            Err(RegistryError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Money {
    type Error = RegistryError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = RegistryError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Money {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl TryFrom<Money> for Amount {
    type Error = RegistryError;

    fn try_from(money: Money) -> Result<Self> {
        Self::new(money.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Mul<u32> for Money {
    type Output = Self;
    fn mul(self, rhs: u32) -> Self::Output {
        Self(self.0 * Decimal::from(rhs))
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
