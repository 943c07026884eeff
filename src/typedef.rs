//! Normalized type descriptors.
//!
//! [`normalize`] walks a wire [`WireRelType`] and produces a [`TypeDef`]:
//! primitives map one to one, constants are evaluated eagerly, and value
//! types that encode a standard type under the `rel:base:<Tag>` convention
//! are folded into that type.
//!
//! ```text
//! (:rel, :base, :Date, Int64)                  -> Date
//! (:rel, :base, :FixedDecimal, 64, 2, Int64)   -> Decimal64 (places = 2)
//! (:rel, :base, :Rational, Int32, Int32)       -> Rational32
//! (:MyType, Int64, String)                     -> ValueType [...]
//! ```

use std::fmt;

use tracing::warn;

use crate::convert::convert_value;
use crate::error::{DecodeError, DecodeResult};
use crate::protocol::wire::{PrimitiveType, RelKind, WireRelType};
use crate::value::{map_primitive_value, RawValue, Value};

/// Leaf types that carry no parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Char,
    Bool,
    DateTime,
    Date,
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
    Hash,
    Missing,
    FilePos,
    Int8,
    Int16,
    Int32,
    Int64,
    Int128,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    UInt128,
    Float16,
    Float32,
    Float64,
}

impl ScalarType {
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::String => "String",
            ScalarType::Char => "Char",
            ScalarType::Bool => "Bool",
            ScalarType::DateTime => "DateTime",
            ScalarType::Date => "Date",
            ScalarType::Year => "Year",
            ScalarType::Month => "Month",
            ScalarType::Week => "Week",
            ScalarType::Day => "Day",
            ScalarType::Hour => "Hour",
            ScalarType::Minute => "Minute",
            ScalarType::Second => "Second",
            ScalarType::Millisecond => "Millisecond",
            ScalarType::Microsecond => "Microsecond",
            ScalarType::Nanosecond => "Nanosecond",
            ScalarType::Hash => "Hash",
            ScalarType::Missing => "Missing",
            ScalarType::FilePos => "FilePos",
            ScalarType::Int8 => "Int8",
            ScalarType::Int16 => "Int16",
            ScalarType::Int32 => "Int32",
            ScalarType::Int64 => "Int64",
            ScalarType::Int128 => "Int128",
            ScalarType::UInt8 => "UInt8",
            ScalarType::UInt16 => "UInt16",
            ScalarType::UInt32 => "UInt32",
            ScalarType::UInt64 => "UInt64",
            ScalarType::UInt128 => "UInt128",
            ScalarType::Float16 => "Float16",
            ScalarType::Float32 => "Float32",
            ScalarType::Float64 => "Float64",
        }
    }

    /// Units that fold from a bare `rel:base:<Tag>` value type
    fn from_base_tag(tag: &str) -> Option<Self> {
        let ty = match tag {
            "DateTime" => ScalarType::DateTime,
            "Date" => ScalarType::Date,
            "Year" => ScalarType::Year,
            "Month" => ScalarType::Month,
            "Week" => ScalarType::Week,
            "Day" => ScalarType::Day,
            "Hour" => ScalarType::Hour,
            "Minute" => ScalarType::Minute,
            "Second" => ScalarType::Second,
            "Millisecond" => ScalarType::Millisecond,
            "Microsecond" => ScalarType::Microsecond,
            "Nanosecond" => ScalarType::Nanosecond,
            "Hash" => ScalarType::Hash,
            "Missing" => ScalarType::Missing,
            "FilePos" => ScalarType::FilePos,
            _ => return None,
        };
        Some(ty)
    }

    /// Width of a signed integer type, used to name rational limbs
    fn signed_bits(self) -> Option<u16> {
        match self {
            ScalarType::Int8 => Some(8),
            ScalarType::Int16 => Some(16),
            ScalarType::Int32 => Some(32),
            ScalarType::Int64 => Some(64),
            ScalarType::Int128 => Some(128),
            _ => None,
        }
    }
}

/// A normalized relation-position type
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDef {
    /// Fixed by the signature; `value` is already evaluated
    Constant { type_def: Box<TypeDef>, value: Value },
    Scalar(ScalarType),
    /// Fixed-point decimal of `bits` width with `places` fractional digits
    Decimal { bits: u16, places: u32 },
    /// Exact fraction with numerator and denominator of `bits` width
    Rational { bits: u16 },
    /// Unfolded value type with its children in declaration order
    ValueType(Vec<TypeDef>),
}

impl TypeDef {
    pub fn is_constant(&self) -> bool {
        matches!(self, TypeDef::Constant { .. })
    }

    /// Discriminant name, e.g. `Int64`, `Decimal128`, `Rational32`, `ValueType`
    pub fn type_name(&self) -> String {
        match self {
            TypeDef::Constant { .. } => "Constant".to_string(),
            TypeDef::Scalar(scalar) => scalar.name().to_string(),
            TypeDef::Decimal { bits, .. } => format!("Decimal{bits}"),
            TypeDef::Rational { bits } => format!("Rational{bits}"),
            TypeDef::ValueType(_) => "ValueType".to_string(),
        }
    }

    /// Decimal scale, for fixed-decimal types only
    pub fn places(&self) -> Option<u32> {
        match self {
            TypeDef::Decimal { places, .. } => Some(*places),
            _ => None,
        }
    }

    /// Children of an unfolded value type
    pub fn type_defs(&self) -> &[TypeDef] {
        match self {
            TypeDef::ValueType(children) => children,
            _ => &[],
        }
    }

    /// Folded value of a constant
    pub fn constant_value(&self) -> Option<&Value> {
        match self {
            TypeDef::Constant { value, .. } => Some(value),
            _ => None,
        }
    }

    fn constant_str(&self) -> Option<&str> {
        match self {
            TypeDef::Constant { type_def, value } if **type_def == TypeDef::Scalar(ScalarType::String) => {
                value.as_str()
            }
            _ => None,
        }
    }

    fn constant_int(&self) -> Option<i64> {
        self.constant_value().and_then(Value::as_i64)
    }
}

impl fmt::Display for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDef::Constant { type_def, value } => write!(f, "Constant({type_def} {value})"),
            TypeDef::Decimal { bits, places } => write!(f, "Decimal{bits}({places})"),
            TypeDef::ValueType(children) => {
                f.write_str("ValueType(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{child}")?;
                }
                f.write_str(")")
            }
            other => f.write_str(&other.type_name()),
        }
    }
}

// ============================================================================
// Normalizer
// ============================================================================

/// Normalize one wire relation-type descriptor
pub fn normalize(rel_type: &WireRelType) -> DecodeResult<TypeDef> {
    match rel_type.tag {
        RelKind::PrimitiveType => primitive_type_def(rel_type.primitive_type),
        RelKind::ConstantType => {
            let constant = rel_type.constant_type.as_ref().ok_or_else(|| {
                DecodeError::MalformedDescriptor {
                    reason: "CONSTANT_TYPE without constantType".to_string(),
                }
            })?;
            let inner = normalize(&constant.rel_type)?;
            let raws = constant
                .value
                .arguments
                .iter()
                .map(map_primitive_value)
                .collect::<DecodeResult<Vec<_>>>()?;
            let value = constant_value(&inner, raws)?;
            Ok(TypeDef::Constant {
                type_def: Box::new(inner),
                value,
            })
        }
        RelKind::ValueType => {
            let value_type = rel_type.value_type.as_ref().ok_or_else(|| {
                DecodeError::MalformedDescriptor {
                    reason: "VALUE_TYPE without valueType".to_string(),
                }
            })?;
            let children = value_type
                .argument_types
                .iter()
                .map(normalize)
                .collect::<DecodeResult<Vec<_>>>()?;
            Ok(fold_value_type(children))
        }
        RelKind::UnspecifiedKind => Err(DecodeError::MalformedDescriptor {
            reason: "relation type has no kind".to_string(),
        }),
    }
}

fn primitive_type_def(primitive: PrimitiveType) -> DecodeResult<TypeDef> {
    let scalar = match primitive {
        PrimitiveType::String | PrimitiveType::Symbol => ScalarType::String,
        PrimitiveType::Char => ScalarType::Char,
        PrimitiveType::Bool => ScalarType::Bool,
        PrimitiveType::Int8 => ScalarType::Int8,
        PrimitiveType::Int16 => ScalarType::Int16,
        PrimitiveType::Int32 => ScalarType::Int32,
        PrimitiveType::Int64 => ScalarType::Int64,
        PrimitiveType::Int128 => ScalarType::Int128,
        PrimitiveType::UInt8 => ScalarType::UInt8,
        PrimitiveType::UInt16 => ScalarType::UInt16,
        PrimitiveType::UInt32 => ScalarType::UInt32,
        PrimitiveType::UInt64 => ScalarType::UInt64,
        PrimitiveType::UInt128 => ScalarType::UInt128,
        PrimitiveType::Float16 => ScalarType::Float16,
        PrimitiveType::Float32 => ScalarType::Float32,
        PrimitiveType::Float64 => ScalarType::Float64,
        PrimitiveType::Unspecified => {
            return Err(DecodeError::UnsupportedPrimitiveType {
                tag: primitive.wire_name().to_string(),
            })
        }
    };
    Ok(TypeDef::Scalar(scalar))
}

/// Evaluate the literal arguments of a constant against its normalized type
fn constant_value(inner: &TypeDef, mut raws: Vec<RawValue>) -> DecodeResult<Value> {
    if let TypeDef::ValueType(_) = inner {
        let total = raws.len();
        let mut flat = raws.into_iter();
        let nested = unflatten(inner, &mut flat)?;
        let leftover = flat.count();
        if leftover > 0 {
            return Err(DecodeError::malformed(
                inner.type_name(),
                format!("{leftover} of {total} constant literals left unconsumed"),
            ));
        }
        return convert_value(inner, Some(&nested));
    }

    let raw = match raws.len() {
        0 => {
            return Err(DecodeError::malformed(
                inner.type_name(),
                "constant carries no literal",
            ))
        }
        1 => raws.swap_remove(0),
        _ => RawValue::List(raws),
    };
    convert_value(inner, Some(&raw))
}

/// Rebuild the nested physical shape of a value type from depth-first
/// flattened literals. Constant children consume nothing, rationals consume
/// their two components, nested value types recurse.
fn unflatten<I>(type_def: &TypeDef, flat: &mut I) -> DecodeResult<RawValue>
where
    I: Iterator<Item = RawValue>,
{
    match type_def {
        TypeDef::ValueType(children) => {
            let mut fields = Vec::with_capacity(children.len());
            for child in children {
                match child {
                    TypeDef::Constant { .. } => {}
                    TypeDef::ValueType(_) => fields.push(unflatten(child, flat)?),
                    TypeDef::Rational { .. } => {
                        let numerator = take_literal(child, flat)?;
                        let denominator = take_literal(child, flat)?;
                        fields.push(RawValue::List(vec![numerator, denominator]));
                    }
                    leaf => fields.push(take_literal(leaf, flat)?),
                }
            }
            Ok(RawValue::List(fields))
        }
        other => take_literal(other, flat),
    }
}

fn take_literal<I>(what: &TypeDef, flat: &mut I) -> DecodeResult<RawValue>
where
    I: Iterator<Item = RawValue>,
{
    flat.next()
        .ok_or_else(|| DecodeError::malformed(what.type_name(), "ran out of constant literals"))
}

// ============================================================================
// Value-type folding
// ============================================================================

/// Fold a `rel:base:<Tag>` value type into the standard type it encodes.
///
/// Anything that does not match a known shape is returned as a plain
/// [`TypeDef::ValueType`] with its children untouched.
pub fn fold_value_type(children: Vec<TypeDef>) -> TypeDef {
    let folded = base_tag(&children).and_then(|tag| fold_base(tag, &children));
    folded.unwrap_or_else(|| TypeDef::ValueType(children))
}

fn base_tag(children: &[TypeDef]) -> Option<&str> {
    match children {
        [rel, base, tag, ..]
            if rel.constant_str() == Some("rel") && base.constant_str() == Some("base") =>
        {
            tag.constant_str()
        }
        _ => None,
    }
}

fn fold_base(tag: &str, children: &[TypeDef]) -> Option<TypeDef> {
    if let Some(scalar) = ScalarType::from_base_tag(tag) {
        return Some(TypeDef::Scalar(scalar));
    }

    match tag {
        "FixedDecimal" if children.len() == 6 => {
            let bits = children[3].constant_int()?;
            let places = children[4].constant_int()?;
            if !matches!(bits, 16 | 32 | 64 | 128) {
                warn!(bits, "unsupported FixedDecimal width, leaving value type unfolded");
                return None;
            }
            let places = u32::try_from(places).ok()?;
            Some(TypeDef::Decimal {
                bits: bits as u16,
                places,
            })
        }
        "Rational" if children.len() == 5 => match &children[3] {
            TypeDef::Scalar(limb) => limb
                .signed_bits()
                .map(|bits| TypeDef::Rational { bits }),
            _ => None,
        },
        _ => None,
    }
}
