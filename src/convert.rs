//! Value converter: raw wire values to typed [`Value`]s under a [`TypeDef`].
//!
//! Temporal types use a Rata Die epoch (day 1 = 0001-01-01). 128-bit
//! integers arrive as `[low, high]` 64-bit limbs and are composed in two's
//! complement, so negative `Int128` values survive intact.

use chrono::{DateTime, Month, Utc};
use rust_decimal::Decimal;

use crate::error::{DecodeError, DecodeResult};
use crate::typedef::{ScalarType, TypeDef};
use crate::value::{Rational, RawValue, Value};

/// Milliseconds from the Rata Die epoch to the Unix epoch
pub const RATA_DIE_UNIX_OFFSET_MS: i64 = 62_135_683_200_000;

const MS_PER_DAY: i64 = 86_400_000;

/// Convert one raw value under its normalized type.
///
/// Constants ignore `raw` and return their folded value. Every other type
/// requires a raw value; a null raw value converts to [`Value::Null`].
pub fn convert_value(type_def: &TypeDef, raw: Option<&RawValue>) -> DecodeResult<Value> {
    match (type_def, raw) {
        (TypeDef::Constant { value, .. }, _) => Ok(value.clone()),
        (TypeDef::Scalar(ScalarType::Missing), _) => Ok(Value::Null),
        (_, None) => Err(DecodeError::malformed(
            type_def.type_name(),
            "no raw value for a non-constant type",
        )),
        (_, Some(RawValue::Null)) => Ok(Value::Null),
        (TypeDef::Scalar(scalar), Some(raw)) => convert_scalar(*scalar, raw),
        (TypeDef::Decimal { bits, places }, Some(raw)) => convert_decimal(*bits, *places, raw),
        (TypeDef::Rational { bits }, Some(raw)) => convert_rational(*bits, raw),
        (TypeDef::ValueType(children), Some(raw)) => convert_value_type(children, raw),
    }
}

/// Physical slot of each child of a value type; `None` for constants.
///
/// Slots are numbered in declaration order, skipping constant children, and
/// index into the value type's raw field list.
pub fn physical_slots(children: &[TypeDef]) -> Vec<Option<usize>> {
    let mut next = 0;
    children
        .iter()
        .map(|child| {
            if child.is_constant() {
                None
            } else {
                next += 1;
                Some(next - 1)
            }
        })
        .collect()
}

fn convert_value_type(children: &[TypeDef], raw: &RawValue) -> DecodeResult<Value> {
    let slots = physical_slots(children);
    let physical = slots.iter().flatten().count();

    let fields: Vec<&RawValue> = match raw {
        RawValue::List(items) if physical != 1 || items.len() == 1 => items.iter().collect(),
        single if physical == 1 => vec![single],
        other => {
            return Err(DecodeError::malformed(
                "ValueType",
                format!("expected {physical} fields, got {}", other.kind()),
            ))
        }
    };
    if fields.len() != physical {
        return Err(DecodeError::malformed(
            "ValueType",
            format!("expected {physical} fields, got {}", fields.len()),
        ));
    }

    children
        .iter()
        .zip(slots)
        .map(|(child, slot)| convert_value(child, slot.map(|i| fields[i])))
        .collect::<DecodeResult<Vec<_>>>()
        .map(Value::Tuple)
}

// ============================================================================
// Scalars
// ============================================================================

fn mismatch(type_name: &str, raw: &RawValue) -> DecodeError {
    DecodeError::malformed(type_name, format!("unexpected raw {}", raw.kind()))
}

/// Struct columns with a single field arrive as one-element lists
fn unwrap_single(raw: &RawValue) -> &RawValue {
    match raw {
        RawValue::List(items) if items.len() == 1 => &items[0],
        other => other,
    }
}

fn int<T: TryFrom<i128>>(type_name: &str, raw: &RawValue) -> DecodeResult<T> {
    let v = raw.as_i128().ok_or_else(|| mismatch(type_name, raw))?;
    T::try_from(v).map_err(|_| DecodeError::malformed(type_name, format!("{v} out of range")))
}

fn convert_scalar(scalar: ScalarType, raw: &RawValue) -> DecodeResult<Value> {
    let name = scalar.name();

    // 128-bit types read their own limb lists
    match scalar {
        ScalarType::Hash | ScalarType::UInt128 => return to_u128(name, raw).map(Value::UInt128),
        ScalarType::Int128 => return to_i128(name, raw).map(Value::Int128),
        _ => {}
    }

    let raw = unwrap_single(raw);
    let value = match scalar {
        ScalarType::String => match raw {
            RawValue::String(s) => Value::String(s.clone()),
            other => return Err(mismatch(name, other)),
        },
        ScalarType::Bool => match raw {
            RawValue::Bool(b) => Value::Bool(*b),
            other => return Err(mismatch(name, other)),
        },
        ScalarType::Char => {
            let code = match raw {
                RawValue::Char(c) => *c,
                other => int::<u32>(name, other)?,
            };
            let c = char::from_u32(code).ok_or_else(|| {
                DecodeError::malformed(name, format!("{code:#x} is not a Unicode scalar value"))
            })?;
            Value::Char(c)
        }
        ScalarType::Int8 => Value::Int8(int(name, raw)?),
        ScalarType::Int16 => Value::Int16(int(name, raw)?),
        ScalarType::Int32 => Value::Int32(int(name, raw)?),
        ScalarType::Int64 => Value::Int64(int(name, raw)?),
        ScalarType::UInt8 => Value::UInt8(int(name, raw)?),
        ScalarType::UInt16 => Value::UInt16(int(name, raw)?),
        ScalarType::UInt32 => Value::UInt32(int(name, raw)?),
        ScalarType::UInt64 => Value::UInt64(int(name, raw)?),
        ScalarType::Float16 | ScalarType::Float32 => match raw {
            RawValue::Float16(h) => Value::Float32(h.to_f32()),
            RawValue::Float32(f) => Value::Float32(*f),
            other => return Err(mismatch(name, other)),
        },
        ScalarType::Float64 => match raw {
            RawValue::Float64(f) => Value::Float64(*f),
            RawValue::Float32(f) => Value::Float64(f64::from(*f)),
            other => return Err(mismatch(name, other)),
        },
        ScalarType::DateTime => {
            let ms: i64 = int(name, raw)?;
            Value::DateTime(datetime_from_rata_die_ms(ms)?)
        }
        ScalarType::Date => {
            let days: i64 = int(name, raw)?;
            let ms = days
                .checked_mul(MS_PER_DAY)
                .ok_or_else(|| DecodeError::malformed(name, format!("day {days} out of range")))?;
            Value::Date(datetime_from_rata_die_ms(ms)?.date_naive())
        }
        ScalarType::Month => {
            let month: u8 = int(name, raw)?;
            let month = Month::try_from(month).map_err(|_| {
                DecodeError::malformed(name, format!("{month} is not a month of the year"))
            })?;
            Value::Month(month)
        }
        ScalarType::Year
        | ScalarType::Week
        | ScalarType::Day
        | ScalarType::Hour
        | ScalarType::Minute
        | ScalarType::Second
        | ScalarType::Millisecond
        | ScalarType::Microsecond
        | ScalarType::Nanosecond
        | ScalarType::FilePos => Value::Int64(int(name, raw)?),
        ScalarType::Missing => Value::Null,
        ScalarType::Hash | ScalarType::UInt128 | ScalarType::Int128 => {
            return Err(DecodeError::UnhandledValueType {
                type_name: name.to_string(),
            })
        }
    };
    Ok(value)
}

fn datetime_from_rata_die_ms(ms: i64) -> DecodeResult<DateTime<Utc>> {
    let out_of_range = || DecodeError::malformed("DateTime", format!("{ms}ms out of range"));
    let unix_ms = ms
        .checked_sub(RATA_DIE_UNIX_OFFSET_MS)
        .ok_or_else(out_of_range)?;
    DateTime::from_timestamp_millis(unix_ms).ok_or_else(out_of_range)
}

// ============================================================================
// 128-bit limbs
// ============================================================================

fn compose_limbs(type_name: &str, items: &[RawValue]) -> DecodeResult<u128> {
    let limb = |raw: &RawValue| raw.as_limb().ok_or_else(|| mismatch(type_name, raw));
    match items {
        // high limb elided when zero
        [low] => Ok(u128::from(limb(low)?)),
        [low, high] => Ok((u128::from(limb(high)?) << 64) | u128::from(limb(low)?)),
        _ => Err(DecodeError::malformed(
            type_name,
            format!("expected 1 or 2 limbs, got {}", items.len()),
        )),
    }
}

/// A one-field struct around a limb list arrives as `[[low, high]]`
fn unwrap_limbs(raw: &RawValue) -> &RawValue {
    match raw {
        RawValue::List(items) if matches!(items.as_slice(), [RawValue::List(_)]) => &items[0],
        other => other,
    }
}

fn to_u128(type_name: &str, raw: &RawValue) -> DecodeResult<u128> {
    match unwrap_limbs(raw) {
        RawValue::List(items) => compose_limbs(type_name, items),
        other => int(type_name, other),
    }
}

fn to_i128(type_name: &str, raw: &RawValue) -> DecodeResult<i128> {
    match unwrap_limbs(raw) {
        // two's complement: reinterpret the composed bits
        RawValue::List(items) => compose_limbs(type_name, items).map(|bits| bits as i128),
        other => int(type_name, other),
    }
}

// ============================================================================
// Decimals and rationals
// ============================================================================

fn convert_decimal(bits: u16, places: u32, raw: &RawValue) -> DecodeResult<Value> {
    let name = format!("Decimal{bits}");
    let unscaled: i128 = match bits {
        16 => int::<i16>(&name, unwrap_single(raw))?.into(),
        32 => int::<i32>(&name, unwrap_single(raw))?.into(),
        64 => int::<i64>(&name, unwrap_single(raw))?.into(),
        128 => to_i128(&name, raw)?,
        _ => return Err(DecodeError::UnhandledValueType { type_name: name }),
    };
    Decimal::try_from_i128_with_scale(unscaled, places)
        .map(Value::Decimal)
        .map_err(|e| DecodeError::malformed(&name, format!("{unscaled}e-{places}: {e}")))
}

fn convert_rational(bits: u16, raw: &RawValue) -> DecodeResult<Value> {
    let name = format!("Rational{bits}");
    let items = match raw {
        RawValue::List(items) => items.as_slice(),
        other => return Err(mismatch(&name, other)),
    };

    let (numerator, denominator) = match bits {
        8 | 16 | 32 | 64 => match items {
            [n, d] => (int::<i128>(&name, n)?, int::<i128>(&name, d)?),
            _ => {
                return Err(DecodeError::malformed(
                    &name,
                    format!("expected 2 elements, got {}", items.len()),
                ))
            }
        },
        128 => match items {
            [n_low, n_high, d_low, d_high] => (
                compose_limbs(&name, &[n_low.clone(), n_high.clone()])? as i128,
                compose_limbs(&name, &[d_low.clone(), d_high.clone()])? as i128,
            ),
            [n, d] => (to_i128(&name, n)?, to_i128(&name, d)?),
            _ => {
                return Err(DecodeError::malformed(
                    &name,
                    format!("expected 4 limbs or 2 limb pairs, got {}", items.len()),
                ))
            }
        },
        _ => return Err(DecodeError::UnhandledValueType { type_name: name }),
    };

    Rational::new(numerator, denominator)
        .map(Value::Rational)
        .ok_or_else(|| {
            DecodeError::malformed(&name, format!("{numerator}/{denominator} is not a rational"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn scalar(s: ScalarType) -> TypeDef {
        TypeDef::Scalar(s)
    }

    fn limbs(low: u64, high: u64) -> RawValue {
        RawValue::List(vec![RawValue::UInt64(low), RawValue::UInt64(high)])
    }

    #[test]
    fn test_integer_boundaries() {
        let cases = [
            (ScalarType::Int8, RawValue::Int8(i8::MIN), Value::Int8(i8::MIN)),
            (ScalarType::Int8, RawValue::Int8(i8::MAX), Value::Int8(i8::MAX)),
            (ScalarType::Int16, RawValue::Int16(-1), Value::Int16(-1)),
            (ScalarType::Int32, RawValue::Int32(0), Value::Int32(0)),
            (ScalarType::Int64, RawValue::Int64(i64::MIN), Value::Int64(i64::MIN)),
            (ScalarType::UInt8, RawValue::UInt8(u8::MAX), Value::UInt8(u8::MAX)),
            (ScalarType::UInt64, RawValue::UInt64(u64::MAX), Value::UInt64(u64::MAX)),
        ];
        for (ty, raw, expected) in cases {
            assert_eq!(convert_value(&scalar(ty), Some(&raw)).unwrap(), expected);
        }
    }

    #[test]
    fn test_integer_out_of_range() {
        let err = convert_value(&scalar(ScalarType::Int8), Some(&RawValue::Int64(300)));
        assert!(matches!(err, Err(DecodeError::MalformedCompositeValue { .. })));
    }

    #[test]
    fn test_char_outside_bmp() {
        let v = convert_value(&scalar(ScalarType::Char), Some(&RawValue::UInt32(0x1F600))).unwrap();
        assert_eq!(v, Value::Char('😀'));
        assert!(convert_value(&scalar(ScalarType::Char), Some(&RawValue::Char(0xD800))).is_err());
    }

    #[test]
    fn test_float16_accepts_both_carriers() {
        let half = RawValue::Float16(half::f16::from_f32(0.5));
        assert_eq!(
            convert_value(&scalar(ScalarType::Float16), Some(&half)).unwrap(),
            Value::Float32(0.5)
        );
        assert_eq!(
            convert_value(&scalar(ScalarType::Float16), Some(&RawValue::Float32(2.25))).unwrap(),
            Value::Float32(2.25)
        );
    }

    #[test]
    fn test_date_and_datetime() {
        let date = convert_value(&scalar(ScalarType::Date), Some(&RawValue::Int64(738075))).unwrap();
        assert_eq!(date.to_string(), "2021-10-12");

        let dt = convert_value(
            &scalar(ScalarType::DateTime),
            Some(&RawValue::Int64(63769648951000)),
        )
        .unwrap();
        let expected = DateTime::parse_from_rfc3339("2021-10-12T01:22:31+10:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(dt, Value::DateTime(expected));
        assert_eq!(dt.to_string(), "2021-10-11T15:22:31Z");
    }

    #[test]
    fn test_datetime_keeps_milliseconds() {
        let dt = convert_value(
            &scalar(ScalarType::DateTime),
            Some(&RawValue::Int64(RATA_DIE_UNIX_OFFSET_MS + 1_500)),
        )
        .unwrap();
        assert_eq!(dt.to_string(), "1970-01-01T00:00:01.500Z");
    }

    #[test]
    fn test_month_and_units() {
        assert_eq!(
            convert_value(&scalar(ScalarType::Month), Some(&RawValue::Int64(12))).unwrap(),
            Value::Month(Month::December)
        );
        assert!(convert_value(&scalar(ScalarType::Month), Some(&RawValue::Int64(13))).is_err());
        assert_eq!(
            convert_value(&scalar(ScalarType::Nanosecond), Some(&RawValue::Int64(-7))).unwrap(),
            Value::Int64(-7)
        );
        assert_eq!(
            convert_value(&scalar(ScalarType::FilePos), Some(&RawValue::Int64(4096))).unwrap(),
            Value::Int64(4096)
        );
    }

    #[test]
    fn test_missing_ignores_input() {
        let missing = scalar(ScalarType::Missing);
        assert_eq!(convert_value(&missing, None).unwrap(), Value::Null);
        assert_eq!(
            convert_value(&missing, Some(&RawValue::Int64(1))).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_limb_composition() {
        assert_eq!(
            convert_value(&scalar(ScalarType::UInt128), Some(&limbs(5, 1))).unwrap(),
            Value::UInt128((1u128 << 64) + 5)
        );
        // hash with elided high limb
        assert_eq!(
            convert_value(
                &scalar(ScalarType::Hash),
                Some(&RawValue::List(vec![RawValue::UInt64(42)]))
            )
            .unwrap(),
            Value::UInt128(42)
        );
        assert_eq!(
            convert_value(&scalar(ScalarType::Hash), Some(&RawValue::UInt64(42))).unwrap(),
            Value::UInt128(42)
        );
    }

    #[test]
    fn test_negative_int128() {
        assert_eq!(
            convert_value(&scalar(ScalarType::Int128), Some(&limbs(u64::MAX, u64::MAX))).unwrap(),
            Value::Int128(-1)
        );
        let min = i128::MIN as u128;
        assert_eq!(
            convert_value(
                &scalar(ScalarType::Int128),
                Some(&limbs(min as u64, (min >> 64) as u64))
            )
            .unwrap(),
            Value::Int128(i128::MIN)
        );
    }

    #[test]
    fn test_struct_wrapped_limbs() {
        let wrapped = |raw: RawValue| RawValue::List(vec![raw]);

        assert_eq!(
            convert_value(&scalar(ScalarType::Hash), Some(&wrapped(limbs(7, 9)))).unwrap(),
            Value::UInt128((9u128 << 64) | 7)
        );
        assert_eq!(
            convert_value(
                &scalar(ScalarType::Int128),
                Some(&wrapped(limbs(u64::MAX - 1, u64::MAX)))
            )
            .unwrap(),
            Value::Int128(-2)
        );
        // elided high limb inside the struct
        assert_eq!(
            convert_value(
                &scalar(ScalarType::UInt128),
                Some(&wrapped(RawValue::List(vec![RawValue::UInt64(3)])))
            )
            .unwrap(),
            Value::UInt128(3)
        );

        let dec = TypeDef::Decimal { bits: 128, places: 2 };
        let bits = (-1234i128) as u128;
        assert_eq!(
            convert_value(&dec, Some(&wrapped(limbs(bits as u64, (bits >> 64) as u64)))).unwrap(),
            Value::Decimal(Decimal::from_str("-12.34").unwrap())
        );
    }

    #[test]
    fn test_decimal_placement() {
        let dec = TypeDef::Decimal { bits: 64, places: 2 };
        assert_eq!(
            convert_value(&dec, Some(&RawValue::Int64(1234))).unwrap(),
            Value::Decimal(Decimal::from_str("12.34").unwrap())
        );

        let dec = TypeDef::Decimal { bits: 16, places: 3 };
        assert_eq!(
            convert_value(&dec, Some(&RawValue::Int16(-5))).unwrap(),
            Value::Decimal(Decimal::from_str("-0.005").unwrap())
        );
    }

    #[test]
    fn test_decimal128_beyond_64_bits() {
        let dec = TypeDef::Decimal { bits: 128, places: 1 };
        let unscaled: i128 = -(1i128 << 70);
        let bits = unscaled as u128;
        let v = convert_value(&dec, Some(&limbs(bits as u64, (bits >> 64) as u64))).unwrap();
        assert_eq!(
            v,
            Value::Decimal(Decimal::from_i128_with_scale(unscaled, 1))
        );

        // beyond the 96-bit mantissa is an error, not a truncation
        let huge = limbs(0, 1 << 40);
        assert!(matches!(
            convert_value(&dec, Some(&huge)),
            Err(DecodeError::MalformedCompositeValue { .. })
        ));
    }

    #[test]
    fn test_rationals() {
        let rat = TypeDef::Rational { bits: 8 };
        let raw = RawValue::List(vec![RawValue::Int8(2), RawValue::Int8(-4)]);
        assert_eq!(
            convert_value(&rat, Some(&raw)).unwrap(),
            Value::Rational(Rational::new(-1, 2).unwrap())
        );

        let bad = RawValue::List(vec![RawValue::Int8(2)]);
        assert!(matches!(
            convert_value(&rat, Some(&bad)),
            Err(DecodeError::MalformedCompositeValue { .. })
        ));

        let zero = RawValue::List(vec![RawValue::Int8(2), RawValue::Int8(0)]);
        assert!(convert_value(&rat, Some(&zero)).is_err());
    }

    #[test]
    fn test_rational128_shapes() {
        let rat = TypeDef::Rational { bits: 128 };
        let big = 1i128 << 100;
        let flat = RawValue::List(vec![
            RawValue::UInt64(big as u64),
            RawValue::UInt64((big >> 64) as u64),
            RawValue::UInt64(3),
            RawValue::UInt64(0),
        ]);
        let nested = RawValue::List(vec![
            limbs(big as u64, (big >> 64) as u64),
            limbs(3, 0),
        ]);
        let expected = Value::Rational(Rational::new(big, 3).unwrap());
        assert_eq!(convert_value(&rat, Some(&flat)).unwrap(), expected);
        assert_eq!(convert_value(&rat, Some(&nested)).unwrap(), expected);
    }

    #[test]
    fn test_unhandled_widths() {
        let err = convert_value(&TypeDef::Rational { bits: 256 }, Some(&RawValue::List(vec![])));
        assert!(matches!(err, Err(DecodeError::UnhandledValueType { ref type_name }) if type_name == "Rational256"));
        let err = convert_value(
            &TypeDef::Decimal { bits: 24, places: 0 },
            Some(&RawValue::Int32(1)),
        );
        assert!(matches!(err, Err(DecodeError::UnhandledValueType { .. })));
    }

    #[test]
    fn test_constant_ignores_raw_and_is_stable() {
        let constant = TypeDef::Constant {
            type_def: Box::new(scalar(ScalarType::String)),
            value: Value::string("foo"),
        };
        for _ in 0..3 {
            assert_eq!(convert_value(&constant, None).unwrap(), Value::string("foo"));
        }
        assert_eq!(
            convert_value(&constant, Some(&RawValue::Int64(9))).unwrap(),
            Value::string("foo")
        );
    }

    #[test]
    fn test_non_constant_requires_raw() {
        assert!(matches!(
            convert_value(&scalar(ScalarType::Int64), None),
            Err(DecodeError::MalformedCompositeValue { .. })
        ));
    }

    #[test]
    fn test_physical_slots_skip_constants() {
        let children = vec![
            TypeDef::Constant {
                type_def: Box::new(scalar(ScalarType::String)),
                value: Value::string("T"),
            },
            scalar(ScalarType::Int64),
            TypeDef::Constant {
                type_def: Box::new(scalar(ScalarType::Int64)),
                value: Value::Int64(1),
            },
            scalar(ScalarType::String),
        ];
        assert_eq!(physical_slots(&children), vec![None, Some(0), None, Some(1)]);
    }

    #[test]
    fn test_value_type_reconstruction() {
        let vt = TypeDef::ValueType(vec![
            TypeDef::Constant {
                type_def: Box::new(scalar(ScalarType::String)),
                value: Value::string("MyType"),
            },
            scalar(ScalarType::Int64),
            scalar(ScalarType::String),
        ]);
        let raw = RawValue::List(vec![RawValue::Int64(1), RawValue::String("abc".into())]);
        assert_eq!(
            convert_value(&vt, Some(&raw)).unwrap(),
            Value::Tuple(vec![
                Value::string("MyType"),
                Value::Int64(1),
                Value::string("abc")
            ])
        );

        let short = RawValue::List(vec![RawValue::Int64(1)]);
        assert!(matches!(
            convert_value(&vt, Some(&short)),
            Err(DecodeError::MalformedCompositeValue { .. })
        ));
    }

    #[test]
    fn test_value_type_single_physical_field() {
        let vt = TypeDef::ValueType(vec![
            TypeDef::Constant {
                type_def: Box::new(scalar(ScalarType::String)),
                value: Value::string("Id"),
            },
            scalar(ScalarType::UInt128),
        ]);
        let expected = Value::Tuple(vec![Value::string("Id"), Value::UInt128(7)]);
        // bare limb pair, not wrapped in a struct
        assert_eq!(convert_value(&vt, Some(&limbs(7, 0))).unwrap(), expected);
        // wrapped in a one-field struct
        assert_eq!(
            convert_value(&vt, Some(&RawValue::List(vec![limbs(7, 0)]))).unwrap(),
            expected
        );
    }
}
