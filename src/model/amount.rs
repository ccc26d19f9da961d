//! Amount type for handling monetary values written in either decimal convention.
//!
//! This module provides the `Amount` type which wraps `Decimal` and parses text such as
//! `1.234,56` or `1,234.56`. Whichever of `,` and `.` appears last is the decimal separator; the
//! other one is a thousands separator and is discarded.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// The symbol used to separate the integer part from the fraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DecimalSeparator {
    /// `1,234.56`
    Period,
    /// `1.234,56`
    Comma,
}

impl DecimalSeparator {
    fn symbol(self) -> char {
        match self {
            DecimalSeparator::Period => '.',
            DecimalSeparator::Comma => ',',
        }
    }

    fn group_symbol(self) -> char {
        match self {
            DecimalSeparator::Period => ',',
            DecimalSeparator::Comma => '.',
        }
    }
}

/// Represents how an amount was (or should be) formatted.
///
/// # Examples
///  - `AmountFormat{ decimal: Period, grouped: true }` -> `-60,000.00`
///  - `AmountFormat{ decimal: Period, grouped: false }` -> `-60000.00`
///  - `AmountFormat{ decimal: Comma, grouped: true }` -> `-60.000,00`
///  - `AmountFormat{ decimal: Comma, grouped: false }` -> `-60000,00`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AmountFormat {
    decimal: DecimalSeparator,
    grouped: bool,
}

impl AmountFormat {
    pub const fn new(decimal: DecimalSeparator, grouped: bool) -> Self {
        Self { decimal, grouped }
    }

    pub fn decimal(&self) -> DecimalSeparator {
        self.decimal
    }

    pub fn grouped(&self) -> bool {
        self.grouped
    }
}

impl Default for AmountFormat {
    fn default() -> Self {
        DEFAULT_FORMAT
    }
}

/// The default format uses a period for decimals and commas for thousands: e.g. `-60,000.00`.
const DEFAULT_FORMAT: AmountFormat = AmountFormat {
    decimal: DecimalSeparator::Period,
    grouped: true,
};

/// Amounts are persisted in minor units with this many fractional digits.
const STORAGE_SCALE: u32 = 2;

/// Represents a signed monetary amount.
///
/// Formatting is considered significant for the purposes of equality, so for numeric comparisons,
/// you should access the `Decimal` value and use that.
///
/// # Examples
///
/// Either convention parses to the same value:
/// ```
/// # use homeledger::model::Amount;
/// # use std::str::FromStr;
/// let a = Amount::from_str("1.234,56").unwrap();
/// let b = Amount::from_str("1,234.56").unwrap();
/// assert_eq!(a.value(), b.value());
/// assert_eq!(a.to_string(), "1.234,56");
/// assert_eq!(b.to_string(), "1,234.56");
/// ```
///
/// A trailing separator is rejected rather than read as zero:
/// ```
/// # use homeledger::model::Amount;
/// # use std::str::FromStr;
/// assert!(Amount::from_str("12,").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    /// The parsed numerical value.
    value: Decimal,
    /// The way the numerical value was parsed from, or should be written to, a `String`.
    format: AmountFormat,
}

impl Amount {
    /// Creates a new Amount from a Decimal value with default `String` formatting.
    pub const fn new(value: Decimal) -> Self {
        Self {
            value,
            format: DEFAULT_FORMAT,
        }
    }

    /// Creates a new Amount from a Decimal value with the specified formatting.
    pub const fn new_with_format(value: Decimal, format: AmountFormat) -> Self {
        Self { value, format }
    }

    /// Creates an Amount from storage minor units, e.g. `-4250` -> `-42.50`.
    pub fn from_cents(cents: i64) -> Self {
        Self::new(Decimal::new(cents, STORAGE_SCALE))
    }

    /// Converts to storage minor units. Returns `None` when the value has more than two
    /// significant fractional digits or does not fit in an `i64`.
    pub fn to_cents(&self) -> Option<i64> {
        if self.value.normalize().scale() > STORAGE_SCALE {
            return None;
        }
        self.value.checked_mul(Decimal::ONE_HUNDRED)?.to_i64()
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn format(&self) -> AmountFormat {
        self.format
    }

    /// Returns a copy of this amount that renders with `format`.
    pub fn with_format(self, format: AmountFormat) -> Self {
        Self { format, ..self }
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.value < Decimal::ZERO
    }

    /// The absolute value, keeping the format.
    pub fn abs(self) -> Self {
        Self {
            value: self.value.abs(),
            ..self
        }
    }

    /// The negated value, keeping the format.
    pub fn negate(self) -> Self {
        Self {
            value: -self.value,
            ..self
        }
    }
}

/// The reason a string could not be parsed into an `Amount`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    Empty,
    /// A decimal separator with nothing after it, e.g. `12,` while the user is still typing.
    TrailingSeparator,
    /// The decimal symbol appears more than once, e.g. `1.234.567`.
    AmbiguousSeparator,
    /// A thousands separator not surrounded by digits, e.g. `1,,234.00`.
    MisplacedGroup,
    /// Anything other than a sign, digits, `,` and `.`.
    InvalidCharacter(char),
    NoDigits,
    /// The digits do not fit in a `Decimal`.
    Overflow,
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AmountError::Empty => write!(f, "amount is empty"),
            AmountError::TrailingSeparator => {
                write!(f, "amount ends with a decimal separator")
            }
            AmountError::AmbiguousSeparator => {
                write!(f, "amount has more than one decimal separator")
            }
            AmountError::MisplacedGroup => {
                write!(f, "amount has a misplaced thousands separator")
            }
            AmountError::InvalidCharacter(c) => {
                write!(f, "amount contains invalid character '{c}'")
            }
            AmountError::NoDigits => write!(f, "amount has no digits"),
            AmountError::Overflow => write!(f, "amount is too large"),
        }
    }
}

impl std::error::Error for AmountError {}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        if compact.is_empty() {
            return Err(AmountError::Empty);
        }

        let (negative, unsigned) = match compact.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, compact.strip_prefix('+').unwrap_or(&compact)),
        };

        if let Some(c) = unsigned
            .chars()
            .find(|c| !c.is_ascii_digit() && *c != ',' && *c != '.')
        {
            return Err(AmountError::InvalidCharacter(c));
        }

        // The last separator to appear decides the convention.
        let decimal = match unsigned.rfind([',', '.']) {
            Some(ix) if unsigned[ix..].starts_with(',') => Some((ix, DecimalSeparator::Comma)),
            Some(ix) => Some((ix, DecimalSeparator::Period)),
            None => None,
        };

        let (integer_part, fraction, separator) = match decimal {
            Some((ix, separator)) => {
                let fraction = &unsigned[ix + 1..];
                if fraction.is_empty() {
                    return Err(AmountError::TrailingSeparator);
                }
                (&unsigned[..ix], fraction, separator)
            }
            None => (unsigned, "", DecimalSeparator::Period),
        };

        if integer_part.contains(separator.symbol()) {
            return Err(AmountError::AmbiguousSeparator);
        }

        let groups: Vec<&str> = integer_part.split(separator.group_symbol()).collect();
        let grouped = groups.len() > 1;
        if grouped && groups.iter().any(|g| g.is_empty()) {
            return Err(AmountError::MisplacedGroup);
        }
        let digits: String = groups.concat();
        if digits.is_empty() && fraction.is_empty() {
            return Err(AmountError::NoDigits);
        }

        let normalized = format!(
            "{}{}.{}",
            if negative { "-" } else { "" },
            if digits.is_empty() { "0" } else { &digits },
            if fraction.is_empty() { "0" } else { fraction }
        );
        let value = Decimal::from_str_exact(&normalized).map_err(|_| AmountError::Overflow)?;

        Ok(Amount {
            value,
            format: AmountFormat {
                decimal: separator,
                grouped,
            },
        })
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut num = self.value.abs();
        if num.scale() < STORAGE_SCALE {
            num.rescale(STORAGE_SCALE);
        }
        let sign = if self.is_negative() { "-" } else { "" };

        // `Decimal` always renders with a period and without grouping.
        let plain = num.to_string();
        let (integer, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), ""));

        let integer = if self.format.grouped {
            group_thousands(integer, self.format.decimal.group_symbol())
        } else {
            integer.to_string()
        };

        if fraction.is_empty() {
            write!(f, "{sign}{integer}")
        } else {
            write!(
                f,
                "{sign}{integer}{}{fraction}",
                self.format.decimal.symbol()
            )
        }
    }
}

fn group_thousands(digits: &str, symbol: char) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (ix, c) in digits.chars().enumerate() {
        if ix > 0 && (digits.len() - ix) % 3 == 0 {
            out.push(symbol);
        }
        out.push(c);
    }
    out
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}
