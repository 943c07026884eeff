//! # Value Type System
//!
//! Two value layers sit between the wire and the caller:
//!
//! - [`RawValue`]: what a columnar payload or a constant literal carries,
//!   before any semantic interpretation (plain integers, floats, strings and
//!   nested lists for structs, limb pairs and fixed-size lists).
//! - [`Value`]: the fully typed result handed to callers (dates, decimals,
//!   rationals, 128-bit integers, nested value-type tuples).
//!
//! The converter in [`crate::convert`] maps the first onto the second under a
//! normalized [`crate::typedef::TypeDef`].

pub mod arrow_convert;

pub use arrow_convert::{array_value, read_ipc_stream};

use std::fmt;

use chrono::{DateTime, Month, NaiveDate, SecondsFormat, Utc};
use half::f16;
use rust_decimal::Decimal;

use crate::error::{DecodeError, DecodeResult};
use crate::protocol::wire::{Int128Limbs, PrimitiveType, PrimitiveValue};

// ============================================================================
// Raw Value
// ============================================================================

/// An uninterpreted scalar or composite as it arrives from the wire
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    String(String),
    /// Unicode code point, not yet validated
    Char(u32),
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float16(f16),
    Float32(f32),
    Float64(f64),
    /// Struct fields, list elements, or `[low, high]` limbs of a 128-bit integer
    List(Vec<RawValue>),
}

impl RawValue {
    /// Any integer variant widened to `i128`
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            RawValue::Int8(v) => Some(i128::from(*v)),
            RawValue::Int16(v) => Some(i128::from(*v)),
            RawValue::Int32(v) => Some(i128::from(*v)),
            RawValue::Int64(v) => Some(i128::from(*v)),
            RawValue::UInt8(v) => Some(i128::from(*v)),
            RawValue::UInt16(v) => Some(i128::from(*v)),
            RawValue::UInt32(v) => Some(i128::from(*v)),
            RawValue::UInt64(v) => Some(i128::from(*v)),
            _ => None,
        }
    }

    /// Integer reinterpreted as one 64-bit limb. Signed values keep their
    /// bit pattern, matching how limbs travel in signed columns.
    pub fn as_limb(&self) -> Option<u64> {
        match self {
            RawValue::UInt64(v) => Some(*v),
            RawValue::Int64(v) => Some(*v as u64),
            other => other.as_i128().and_then(|v| u64::try_from(v).ok()),
        }
    }

    /// Short name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Null => "Null",
            RawValue::String(_) => "String",
            RawValue::Char(_) => "Char",
            RawValue::Bool(_) => "Bool",
            RawValue::Int8(_) => "Int8",
            RawValue::Int16(_) => "Int16",
            RawValue::Int32(_) => "Int32",
            RawValue::Int64(_) => "Int64",
            RawValue::UInt8(_) => "UInt8",
            RawValue::UInt16(_) => "UInt16",
            RawValue::UInt32(_) => "UInt32",
            RawValue::UInt64(_) => "UInt64",
            RawValue::Float16(_) => "Float16",
            RawValue::Float32(_) => "Float32",
            RawValue::Float64(_) => "Float64",
            RawValue::List(_) => "List",
        }
    }

    fn limbs(limbs: Int128Limbs) -> Self {
        RawValue::List(vec![
            RawValue::UInt64(limbs.lowbits),
            RawValue::UInt64(limbs.highbits),
        ])
    }
}

/// Map a constant literal to its raw scalar.
///
/// 128-bit literals come back as a `[low, high]` limb pair; composing them is
/// the converter's job.
pub fn map_primitive_value(value: &PrimitiveValue) -> DecodeResult<RawValue> {
    let tag = value.tag;
    let missing = || DecodeError::malformed(tag.wire_name(), "literal has no value for its tag");

    let raw = match tag {
        PrimitiveType::String | PrimitiveType::Symbol => {
            RawValue::String(value.string_val.clone().ok_or_else(missing)?)
        }
        PrimitiveType::Char => RawValue::Char(value.char_val.ok_or_else(missing)?),
        PrimitiveType::Bool => RawValue::Bool(value.bool_val.ok_or_else(missing)?),
        PrimitiveType::Int8 => RawValue::Int8(narrow(tag, value.int32_val.ok_or_else(missing)?)?),
        PrimitiveType::Int16 => {
            RawValue::Int16(narrow(tag, value.int32_val.ok_or_else(missing)?)?)
        }
        PrimitiveType::Int32 => RawValue::Int32(value.int32_val.ok_or_else(missing)?),
        PrimitiveType::Int64 => RawValue::Int64(value.int64_val.ok_or_else(missing)?),
        PrimitiveType::UInt8 => {
            RawValue::UInt8(narrow(tag, value.uint32_val.ok_or_else(missing)?)?)
        }
        PrimitiveType::UInt16 => {
            RawValue::UInt16(narrow(tag, value.uint32_val.ok_or_else(missing)?)?)
        }
        PrimitiveType::UInt32 => RawValue::UInt32(value.uint32_val.ok_or_else(missing)?),
        PrimitiveType::UInt64 => RawValue::UInt64(value.uint64_val.ok_or_else(missing)?),
        PrimitiveType::Int128 => RawValue::limbs(value.int128_val.ok_or_else(missing)?),
        PrimitiveType::UInt128 => RawValue::limbs(value.uint128_val.ok_or_else(missing)?),
        PrimitiveType::Float16 | PrimitiveType::Float32 => {
            RawValue::Float32(value.float32_val.ok_or_else(missing)?)
        }
        PrimitiveType::Float64 => RawValue::Float64(value.float64_val.ok_or_else(missing)?),
        PrimitiveType::Unspecified => {
            return Err(DecodeError::UnsupportedPrimitiveKind {
                tag: tag.wire_name().to_string(),
            })
        }
    };
    Ok(raw)
}

fn narrow<S, T>(tag: PrimitiveType, v: S) -> DecodeResult<T>
where
    S: Copy + fmt::Display,
    T: TryFrom<S>,
{
    T::try_from(v).map_err(|_| DecodeError::malformed(tag.wire_name(), format!("{v} out of range")))
}

// ============================================================================
// Rational
// ============================================================================

/// An exact fraction in lowest terms with a positive denominator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    numerator: i128,
    denominator: i128,
}

impl Rational {
    /// Build a reduced rational. `None` for a zero denominator or when the
    /// sign cannot be normalized without overflow.
    pub fn new(numerator: i128, denominator: i128) -> Option<Self> {
        if denominator == 0 {
            return None;
        }
        let g = gcd(numerator.unsigned_abs(), denominator.unsigned_abs());
        // only gcd(MIN, MIN) = 2^127 misses i128; that pair is left unreduced and rejected below
        let g = i128::try_from(g).unwrap_or(1);
        let (mut n, mut d) = (numerator / g, denominator / g);
        if d < 0 {
            n = n.checked_neg()?;
            d = d.checked_neg()?;
        }
        Some(Rational {
            numerator: n,
            denominator: d,
        })
    }

    pub fn numerator(&self) -> i128 {
        self.numerator
    }

    pub fn denominator(&self) -> i128 {
        self.denominator
    }

    /// Lossy conversion for display and arithmetic
    pub fn to_f64(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

// ============================================================================
// Value
// ============================================================================

/// A decoded, semantically typed result value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value (`Missing`, or a null slot in a column)
    Null,
    String(String),
    Char(char),
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    /// Also carries unit-typed integers (`Year`, `Hour`, ...) and file offsets
    Int64(i64),
    Int128(i128),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    /// Also carries hashes
    UInt128(u128),
    Float32(f32),
    Float64(f64),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    Month(Month),
    Decimal(Decimal),
    Rational(Rational),
    /// Positional fields of a value-type instance, constants included
    Tuple(Vec<Value>),
}

impl Value {
    pub fn string(s: &str) -> Self {
        Value::String(s.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int8(v) => Some(i64::from(*v)),
            Value::Int16(v) => Some(i64::from(*v)),
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            Value::UInt8(v) => Some(i64::from(*v)),
            Value::UInt16(v) => Some(i64::from(*v)),
            Value::UInt32(v) => Some(i64::from(*v)),
            Value::UInt64(v) => i64::try_from(*v).ok(),
            Value::Int128(v) => i64::try_from(*v).ok(),
            Value::UInt128(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(values) => Some(values),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "missing"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::Char(c) => write!(f, "'{c}'"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int8(v) => write!(f, "{v}"),
            Value::Int16(v) => write!(f, "{v}"),
            Value::Int32(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Int128(v) => write!(f, "{v}"),
            Value::UInt8(v) => write!(f, "{v}"),
            Value::UInt16(v) => write!(f, "{v}"),
            Value::UInt32(v) => write!(f, "{v}"),
            Value::UInt64(v) => write!(f, "{v}"),
            Value::UInt128(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::DateTime(dt) => f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Month(m) => write!(f, "{}", m.name()),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Rational(r) => write!(f, "{r}"),
            Value::Tuple(values) => {
                f.write_str("(")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<char> for Value {
    fn from(c: char) -> Self {
        Value::Char(c)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
