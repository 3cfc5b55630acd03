//! Kubernetes resource quantity arithmetic
//!
//! Just enough of the `resource.Quantity` grammar to sum per-container
//! requests and render them canonically: signed decimal mantissa followed by
//! a binary (`Ki`..`Ei`), decimal (`n`..`E`) or exponent (`e3`) suffix.
//! Values are held exactly as signed nano-units.

use std::fmt;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use thiserror::Error;

const NANOS_PER_UNIT: i128 = 1_000_000_000;

/// Errors raised while parsing or combining quantities
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuantityError {
    /// The string does not follow the quantity grammar
    #[error("invalid quantity '{0}'")]
    Invalid(String),

    /// The value does not fit the representable range
    #[error("quantity '{0}' is out of range")]
    Overflow(String),
}

/// Suffix family a quantity was written in; preserved when rendering
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Powers of 1024 (`Ki`, `Mi`, ...)
    BinarySI,
    /// Powers of 1000 (`m`, `k`, `M`, ...) and exponents
    DecimalSI,
}

/// A parsed quantity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedQuantity {
    nanos: i128,
    format: Format,
}

impl ParsedQuantity {
    /// Value in nano-units (1 cpu == 1_000_000_000)
    pub fn nanos(&self) -> i128 {
        self.nanos
    }

    /// Suffix family used when rendering
    pub fn format(&self) -> Format {
        self.format
    }

    /// Sum two quantities, keeping the format of `self`
    pub fn checked_add(&self, other: &ParsedQuantity) -> Option<ParsedQuantity> {
        Some(ParsedQuantity {
            nanos: self.nanos.checked_add(other.nanos)?,
            format: self.format,
        })
    }
}

impl fmt::Display for ParsedQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos == 0 {
            return f.write_str("0");
        }
        let sign = if self.nanos < 0 { "-" } else { "" };
        let abs = self.nanos.unsigned_abs();
        let per_unit = NANOS_PER_UNIT as u128;

        // sub-unit values only have decimal suffixes
        if abs % per_unit != 0 {
            return if abs % 1_000_000 == 0 {
                write!(f, "{sign}{}m", abs / 1_000_000)
            } else if abs % 1_000 == 0 {
                write!(f, "{sign}{}u", abs / 1_000)
            } else {
                write!(f, "{sign}{abs}n")
            };
        }

        let units = abs / per_unit;
        match self.format {
            Format::BinarySI => {
                for (suffix, shift) in BINARY_SUFFIXES.iter().rev() {
                    let base = 1u128 << shift;
                    if units % base == 0 {
                        return write!(f, "{sign}{}{suffix}", units / base);
                    }
                }
            }
            Format::DecimalSI => {
                for (suffix, exp) in DECIMAL_SUFFIXES.iter().rev() {
                    if *exp <= 0 {
                        break;
                    }
                    let base = 10u128.pow(*exp as u32);
                    if units % base == 0 {
                        return write!(f, "{sign}{}{suffix}", units / base);
                    }
                }
            }
        }
        write!(f, "{sign}{units}")
    }
}

const BINARY_SUFFIXES: [(&str, u32); 6] = [
    ("Ki", 10),
    ("Mi", 20),
    ("Gi", 30),
    ("Ti", 40),
    ("Pi", 50),
    ("Ei", 60),
];

const DECIMAL_SUFFIXES: [(&str, i32); 10] = [
    ("n", -9),
    ("u", -6),
    ("m", -3),
    ("", 0),
    ("k", 3),
    ("M", 6),
    ("G", 9),
    ("T", 12),
    ("P", 15),
    ("E", 18),
];

/// Parse a quantity string
pub fn parse(raw: &str) -> Result<ParsedQuantity, QuantityError> {
    let invalid = || QuantityError::Invalid(raw.to_string());
    let overflow = || QuantityError::Overflow(raw.to_string());

    let (negative, rest) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        Some(_) => (false, raw),
        None => return Err(invalid()),
    };

    let number_len = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let (number, suffix) = rest.split_at(number_len);

    let (int_part, frac_part) = match number.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (number, ""),
    };
    if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
        return Err(invalid());
    }

    let mut mantissa: i128 = 0;
    for digit in int_part.bytes().chain(frac_part.bytes()) {
        mantissa = mantissa
            .checked_mul(10)
            .and_then(|m| m.checked_add(i128::from(digit - b'0')))
            .ok_or_else(overflow)?;
    }
    let frac_digits = frac_part.len() as i32;

    let binary_shift = BINARY_SUFFIXES
        .iter()
        .find(|(s, _)| *s == suffix)
        .map(|(_, shift)| *shift);

    let (nanos, format) = if let Some(shift) = binary_shift {
        let scaled = mantissa
            .checked_mul(1i128 << shift)
            .and_then(|m| m.checked_mul(NANOS_PER_UNIT))
            .ok_or_else(overflow)?;
        (scale_by_pow10(scaled, -frac_digits).ok_or_else(overflow)?, Format::BinarySI)
    } else {
        let exp = decimal_exponent(suffix).ok_or_else(invalid)?;
        let nanos = scale_by_pow10(mantissa, exp + 9 - frac_digits).ok_or_else(overflow)?;
        (nanos, Format::DecimalSI)
    };

    Ok(ParsedQuantity {
        nanos: if negative { -nanos } else { nanos },
        format,
    })
}

/// Power of ten denoted by a decimal SI suffix or an `e<n>` exponent
fn decimal_exponent(suffix: &str) -> Option<i32> {
    if let Some((_, exp)) = DECIMAL_SUFFIXES.iter().find(|(s, _)| *s == suffix) {
        return Some(*exp);
    }
    let digits = suffix
        .strip_prefix('e')
        .or_else(|| suffix.strip_prefix('E'))?;
    digits.parse::<i32>().ok().filter(|e| e.abs() <= 64)
}

/// Multiply a non-negative value by 10^exp, rounding fractions up
fn scale_by_pow10(value: i128, exp: i32) -> Option<i128> {
    if exp >= 0 {
        return value.checked_mul(10i128.checked_pow(exp as u32)?);
    }
    match 10i128.checked_pow(exp.unsigned_abs()) {
        Some(divisor) => Some(value.checked_add(divisor - 1)? / divisor),
        None => Some(if value > 0 { 1 } else { 0 }),
    }
}

/// Parse and re-render a quantity in canonical form
pub fn canonicalize(quantity: &Quantity) -> Result<Quantity, QuantityError> {
    Ok(Quantity(parse(&quantity.0)?.to_string()))
}

/// Sum two quantities, keeping the suffix family of `a`
pub fn add(a: &Quantity, b: &Quantity) -> Result<Quantity, QuantityError> {
    let lhs = parse(&a.0)?;
    let rhs = parse(&b.0)?;
    let sum = lhs
        .checked_add(&rhs)
        .ok_or_else(|| QuantityError::Overflow(format!("{} + {}", a.0, b.0)))?;
    Ok(Quantity(sum.to_string()))
}
