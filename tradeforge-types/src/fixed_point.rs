//! Fixed-point decimal numerics.
//!
//! Prices, quantities and notionals are stored as arbitrary-precision
//! integers scaled by a per-symbol decimal `scale`. This avoids the
//! float-accumulation drift a `f64` balance would introduce over a long
//! replay, and lets every arithmetic step be checked.

use num_bigint::BigInt;
use num_traits::{Signed, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ValidationError {
    #[error("decimal string is empty")]
    Empty,
    #[error("decimal string '{0}' contains whitespace")]
    Whitespace(String),
    #[error("decimal string '{0}' is negative, which is not accepted here")]
    Negative(String),
    #[error("decimal string '{0}' uses scientific notation")]
    ScientificNotation(String),
    #[error("decimal string '{0}' has more than one decimal point")]
    MultipleDecimalPoints(String),
    #[error("decimal string '{0}' has {digits} fractional digits, exceeding scale {scale}")]
    ScaleExceeded {
        value: String,
        digits: u32,
        scale: u32,
    },
    #[error("decimal string '{0}' is not a valid number")]
    NotANumber(String),
    #[error("required field '{0}' is missing")]
    MissingField(&'static str),
}

impl ValidationError {
    #[allow(dead_code)]
    fn value_ref(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ArithmeticError {
    #[error("arithmetic underflow: subtraction would produce a negative result")]
    Underflow,
    #[error("division by zero")]
    DivisionByZero,
}

/// Parse a plain (non-scientific, non-negative) decimal string into a raw
/// scaled integer. Rejects whitespace, signs, scientific notation, more
/// than one decimal point, and fractional digits beyond `scale`.
pub fn parse_decimal(input: &str, scale: u32) -> Result<BigInt, ValidationError> {
    if input.is_empty() {
        return Err(ValidationError::Empty);
    }
    if input.chars().any(char::is_whitespace) {
        return Err(ValidationError::Whitespace(input.to_string()));
    }
    if input.contains(['e', 'E']) {
        return Err(ValidationError::ScientificNotation(input.to_string()));
    }
    if input.starts_with('-') {
        return Err(ValidationError::Negative(input.to_string()));
    }

    let mut parts = input.splitn(3, '.');
    let int_part = parts.next().unwrap_or_default();
    let frac_part = parts.next();
    if parts.next().is_some() {
        return Err(ValidationError::MultipleDecimalPoints(input.to_string()));
    }

    let int_part = if int_part.is_empty() { "0" } else { int_part };
    if !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::NotANumber(input.to_string()));
    }

    let frac_digits = frac_part.unwrap_or_default();
    if !frac_digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::NotANumber(input.to_string()));
    }
    if frac_digits.len() as u32 > scale {
        return Err(ValidationError::ScaleExceeded {
            value: input.to_string(),
            digits: frac_digits.len() as u32,
            scale,
        });
    }

    let mut digits = String::with_capacity(int_part.len() + scale as usize);
    digits.push_str(int_part);
    digits.push_str(frac_digits);
    for _ in 0..(scale as usize - frac_digits.len()) {
        digits.push('0');
    }

    BigInt::from_str(&digits).map_err(|_| ValidationError::NotANumber(input.to_string()))
}

/// Render a raw scaled integer as its canonical decimal string: no leading
/// zeros beyond one, no trailing fractional zeros beyond one digit of
/// integer part.
pub fn format_decimal(raw: &BigInt, scale: u32) -> String {
    if scale == 0 {
        return raw.to_string();
    }

    let negative = raw.is_negative();
    let magnitude = raw.abs();
    let divisor = BigInt::from(10u32).pow(scale);
    let int_part = &magnitude / &divisor;
    let frac_part = &magnitude % &divisor;

    let frac_str = format!(
        "{:0width$}",
        frac_part,
        width = scale as usize
    );
    let trimmed = frac_str.trim_end_matches('0');

    let mut out = String::new();
    if negative && !magnitude.is_zero() {
        out.push('-');
    }
    out.push_str(&int_part.to_string());
    if !trimmed.is_empty() {
        out.push('.');
        out.push_str(trimmed);
    }
    out
}

/// Floor(a*b/d), computed with arbitrary-precision integers so there is no
/// intermediate overflow regardless of `a`/`b` magnitude.
pub fn mul_div_floor(a: &BigInt, b: &BigInt, d: &BigInt) -> Result<BigInt, ArithmeticError> {
    if d.is_zero() {
        return Err(ArithmeticError::DivisionByZero);
    }
    // a, b, d are non-negative by domain invariant, so truncating division
    // already is floor division.
    Ok((a * b) / d)
}

/// Marker types branding a [`FixedPoint`] so that prices, quantities, and
/// notionals cannot be mixed up at compile time.
#[derive(Debug)]
pub struct PriceUnit;
#[derive(Debug)]
pub struct QtyUnit;
#[derive(Debug)]
pub struct NotionalUnit;
/// Unit for a per-currency balance amount. Once an amount is keyed by a
/// currency string in a balance ledger, the Price/Qty/Notional brand no
/// longer adds information, so ledgers use this single unit regardless of
/// whether the currency is a symbol's base or quote asset.
#[derive(Debug)]
pub struct AssetUnit;

/// An arbitrary-precision non-negative fixed-point value scaled by a
/// per-symbol decimal `scale`, branded by `Unit` so a `PriceInt` can never
/// be substituted for a `QtyInt`.
pub struct FixedPoint<Unit> {
    raw: BigInt,
    _unit: PhantomData<fn() -> Unit>,
}

pub type PriceInt = FixedPoint<PriceUnit>;
pub type QtyInt = FixedPoint<QtyUnit>;
pub type NotionalInt = FixedPoint<NotionalUnit>;
pub type AssetAmount = FixedPoint<AssetUnit>;

impl FixedPoint<QtyUnit> {
    pub fn as_asset_amount(&self) -> AssetAmount {
        AssetAmount::from_raw(self.raw.clone())
    }
}

impl FixedPoint<NotionalUnit> {
    pub fn as_asset_amount(&self) -> AssetAmount {
        AssetAmount::from_raw(self.raw.clone())
    }
}

impl FixedPoint<AssetUnit> {
    pub fn as_qty(&self) -> QtyInt {
        QtyInt::from_raw(self.raw.clone())
    }

    pub fn as_notional(&self) -> NotionalInt {
        NotionalInt::from_raw(self.raw.clone())
    }
}

impl<Unit> FixedPoint<Unit> {
    pub fn from_raw(raw: BigInt) -> Self {
        Self {
            raw,
            _unit: PhantomData,
        }
    }

    pub fn zero() -> Self {
        Self::from_raw(BigInt::zero())
    }

    pub fn raw(&self) -> &BigInt {
        &self.raw
    }

    pub fn into_raw(self) -> BigInt {
        self.raw
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.raw.is_positive()
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self, ArithmeticError> {
        Ok(Self::from_raw(&self.raw + &other.raw))
    }

    pub fn checked_sub(&self, other: &Self) -> Result<Self, ArithmeticError> {
        let result = &self.raw - &other.raw;
        if result.is_negative() {
            Err(ArithmeticError::Underflow)
        } else {
            Ok(Self::from_raw(result))
        }
    }

    pub fn to_decimal_string(&self, scale: u32) -> String {
        format_decimal(&self.raw, scale)
    }

    pub fn from_decimal_str(input: &str, scale: u32) -> Result<Self, ValidationError> {
        parse_decimal(input, scale).map(Self::from_raw)
    }
}

impl<Unit> Clone for FixedPoint<Unit> {
    fn clone(&self) -> Self {
        Self::from_raw(self.raw.clone())
    }
}

impl<Unit> fmt::Debug for FixedPoint<Unit> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedPoint({})", self.raw)
    }
}

impl<Unit> PartialEq for FixedPoint<Unit> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}
impl<Unit> Eq for FixedPoint<Unit> {}

impl<Unit> PartialOrd for FixedPoint<Unit> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl<Unit> Ord for FixedPoint<Unit> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<Unit> std::hash::Hash for FixedPoint<Unit> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<Unit> Serialize for FixedPoint<Unit> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.raw.to_string())
    }
}

impl<'de, Unit> Deserialize<'de> for FixedPoint<Unit> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        BigInt::from_str(&s)
            .map(Self::from_raw)
            .map_err(serde::de::Error::custom)
    }
}

/// `floor(price * qty / 10^qtyScale)`, rescaled into quote (notional) units.
pub fn notional_of(price: &PriceInt, qty: &QtyInt, qty_scale: u32) -> NotionalInt {
    let divisor = BigInt::from(10u32).pow(qty_scale);
    let raw = mul_div_floor(price.raw(), qty.raw(), &divisor)
        .expect("qty_scale divisor is never zero");
    NotionalInt::from_raw(raw)
}

/// `floor(notional * bps / 10_000)`.
pub fn fee_on_notional(notional: &NotionalInt, bps: u32) -> NotionalInt {
    let raw = mul_div_floor(notional.raw(), &BigInt::from(bps), &BigInt::from(10_000u32))
        .expect("10_000 is never zero");
    NotionalInt::from_raw(raw)
}
