//! Relation-id path adapter.
//!
//! Result parts are keyed by path strings such as `/:output/:foo/String/Int64`
//! or `/:output/(:MyType, Int64, String)`. This module turns such a path into
//! the same [`WireRelationId`] structured metadata deserializes into, so both
//! formats share one normalizer.

use super::wire::{PrimitiveType, PrimitiveValue, WireRelType, WireRelationId};
use crate::error::{DecodeError, DecodeResult};

/// Parse a relation-id path into a wire descriptor
pub fn parse_relation_path(path: &str) -> DecodeResult<WireRelationId> {
    let invalid = |reason: &str| DecodeError::InvalidRelationPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let body = path
        .strip_prefix('/')
        .ok_or_else(|| invalid("path must start with '/'"))?;
    if body.is_empty() {
        return Ok(WireRelationId::default());
    }

    let arguments = split_top_level(body, '/')
        .ok_or_else(|| invalid("unbalanced parentheses"))?
        .into_iter()
        .map(|segment| parse_segment(segment).map_err(|reason| invalid(&reason)))
        .collect::<DecodeResult<Vec<_>>>()?;

    Ok(WireRelationId::new(arguments))
}

fn parse_segment(segment: &str) -> Result<WireRelType, String> {
    let segment = segment.trim();
    if segment.is_empty() {
        return Err("empty segment".to_string());
    }

    if let Some(name) = segment.strip_prefix(':') {
        return Ok(WireRelType::symbol(name));
    }

    if let Some(inner) = segment
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        let parts = split_top_level(inner, ',').ok_or("unbalanced parentheses")?;
        let args = parts
            .into_iter()
            .map(parse_segment)
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(WireRelType::value_type(args));
    }

    if let Some((name, rest)) = segment.split_once('(') {
        let literal = rest
            .strip_suffix(')')
            .ok_or_else(|| format!("unterminated literal in '{segment}'"))?;
        let ty = PrimitiveType::from_path_name(name)
            .ok_or_else(|| format!("unknown type '{name}'"))?;
        let value = parse_literal(ty, literal.trim())?;
        return Ok(WireRelType::constant(WireRelType::primitive(ty), vec![value]));
    }

    PrimitiveType::from_path_name(segment)
        .map(WireRelType::primitive)
        .ok_or_else(|| format!("unknown type '{segment}'"))
}

fn parse_literal(ty: PrimitiveType, literal: &str) -> Result<PrimitiveValue, String> {
    let bad = || format!("invalid {} literal '{literal}'", ty.path_name().unwrap_or("?"));
    let mut value = PrimitiveValue {
        tag: ty,
        ..Default::default()
    };
    match ty {
        PrimitiveType::Bool => value.bool_val = Some(literal.parse().map_err(|_| bad())?),
        PrimitiveType::Char => {
            let c = literal
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .and_then(|s| {
                    let mut chars = s.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Some(c),
                        _ => None,
                    }
                })
                .ok_or_else(bad)?;
            value.char_val = Some(c as u32);
        }
        PrimitiveType::String | PrimitiveType::Symbol => {
            let s = literal
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(literal);
            value.string_val = Some(s.to_string());
        }
        PrimitiveType::Int8 | PrimitiveType::Int16 | PrimitiveType::Int32 => {
            value.int32_val = Some(literal.parse().map_err(|_| bad())?);
        }
        PrimitiveType::Int64 => value.int64_val = Some(literal.parse().map_err(|_| bad())?),
        PrimitiveType::UInt8 | PrimitiveType::UInt16 | PrimitiveType::UInt32 => {
            value.uint32_val = Some(literal.parse().map_err(|_| bad())?);
        }
        PrimitiveType::UInt64 => value.uint64_val = Some(literal.parse().map_err(|_| bad())?),
        PrimitiveType::Int128 => {
            let v: i128 = literal.parse().map_err(|_| bad())?;
            value = PrimitiveValue::int128(v);
        }
        PrimitiveType::UInt128 => {
            let v: u128 = literal.parse().map_err(|_| bad())?;
            value = PrimitiveValue::uint128(v);
        }
        PrimitiveType::Float16 | PrimitiveType::Float32 => {
            value.float32_val = Some(literal.parse().map_err(|_| bad())?);
        }
        PrimitiveType::Float64 => value.float64_val = Some(literal.parse().map_err(|_| bad())?),
        PrimitiveType::Unspecified => return Err(bad()),
    }
    Ok(value)
}

/// Split on `sep` outside parentheses and quotes. `None` when unbalanced.
fn split_top_level(input: &str, sep: char) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.checked_sub(1)?,
            (None, c) if c == sep && depth == 0 => {
                parts.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if depth != 0 || quote.is_some() {
        return None;
    }
    parts.push(&input[start..]);
    Some(parts)
}
