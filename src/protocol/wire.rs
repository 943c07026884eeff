//! Wire Format Types
//!
//! Serializable relation-type descriptors as the service sends them in
//! transaction metadata. The shapes follow the service's protobuf schema in
//! its JSON mapping (camelCase field names, SCREAMING_SNAKE_CASE enums, 64-bit
//! integers accepted as numbers or strings).

use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Primitive Type
// ============================================================================

/// Primitive type tag carried by `PRIMITIVE_TYPE` descriptors and by
/// primitive values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PrimitiveType {
    #[default]
    #[serde(rename = "UNSPECIFIED_TYPE")]
    Unspecified,
    #[serde(rename = "BOOL")]
    Bool,
    #[serde(rename = "CHAR")]
    Char,
    #[serde(rename = "STRING")]
    String,
    #[serde(rename = "SYMBOL")]
    Symbol,
    #[serde(rename = "INT_8")]
    Int8,
    #[serde(rename = "INT_16")]
    Int16,
    #[serde(rename = "INT_32")]
    Int32,
    #[serde(rename = "INT_64")]
    Int64,
    #[serde(rename = "INT_128")]
    Int128,
    #[serde(rename = "UINT_8")]
    UInt8,
    #[serde(rename = "UINT_16")]
    UInt16,
    #[serde(rename = "UINT_32")]
    UInt32,
    #[serde(rename = "UINT_64")]
    UInt64,
    #[serde(rename = "UINT_128")]
    UInt128,
    #[serde(rename = "FLOAT_16")]
    Float16,
    #[serde(rename = "FLOAT_32")]
    Float32,
    #[serde(rename = "FLOAT_64")]
    Float64,
}

impl PrimitiveType {
    /// Tag as it appears on the wire
    pub fn wire_name(self) -> &'static str {
        match self {
            PrimitiveType::Unspecified => "UNSPECIFIED_TYPE",
            PrimitiveType::Bool => "BOOL",
            PrimitiveType::Char => "CHAR",
            PrimitiveType::String => "STRING",
            PrimitiveType::Symbol => "SYMBOL",
            PrimitiveType::Int8 => "INT_8",
            PrimitiveType::Int16 => "INT_16",
            PrimitiveType::Int32 => "INT_32",
            PrimitiveType::Int64 => "INT_64",
            PrimitiveType::Int128 => "INT_128",
            PrimitiveType::UInt8 => "UINT_8",
            PrimitiveType::UInt16 => "UINT_16",
            PrimitiveType::UInt32 => "UINT_32",
            PrimitiveType::UInt64 => "UINT_64",
            PrimitiveType::UInt128 => "UINT_128",
            PrimitiveType::Float16 => "FLOAT_16",
            PrimitiveType::Float32 => "FLOAT_32",
            PrimitiveType::Float64 => "FLOAT_64",
        }
    }

    /// Name used in relation-id paths (`Int64`, `String`, ...)
    pub fn path_name(self) -> Option<&'static str> {
        let name = match self {
            PrimitiveType::Unspecified => return None,
            PrimitiveType::Bool => "Bool",
            PrimitiveType::Char => "Char",
            PrimitiveType::String => "String",
            PrimitiveType::Symbol => "Symbol",
            PrimitiveType::Int8 => "Int8",
            PrimitiveType::Int16 => "Int16",
            PrimitiveType::Int32 => "Int32",
            PrimitiveType::Int64 => "Int64",
            PrimitiveType::Int128 => "Int128",
            PrimitiveType::UInt8 => "UInt8",
            PrimitiveType::UInt16 => "UInt16",
            PrimitiveType::UInt32 => "UInt32",
            PrimitiveType::UInt64 => "UInt64",
            PrimitiveType::UInt128 => "UInt128",
            PrimitiveType::Float16 => "Float16",
            PrimitiveType::Float32 => "Float32",
            PrimitiveType::Float64 => "Float64",
        };
        Some(name)
    }

    /// Inverse of [`PrimitiveType::path_name`]
    pub fn from_path_name(name: &str) -> Option<Self> {
        let ty = match name {
            "Bool" => PrimitiveType::Bool,
            "Char" => PrimitiveType::Char,
            "String" => PrimitiveType::String,
            "Symbol" => PrimitiveType::Symbol,
            "Int8" => PrimitiveType::Int8,
            "Int16" => PrimitiveType::Int16,
            "Int32" => PrimitiveType::Int32,
            "Int64" => PrimitiveType::Int64,
            "Int128" => PrimitiveType::Int128,
            "UInt8" => PrimitiveType::UInt8,
            "UInt16" => PrimitiveType::UInt16,
            "UInt32" => PrimitiveType::UInt32,
            "UInt64" => PrimitiveType::UInt64,
            "UInt128" => PrimitiveType::UInt128,
            "Float16" => PrimitiveType::Float16,
            "Float32" => PrimitiveType::Float32,
            "Float64" => PrimitiveType::Float64,
            _ => return None,
        };
        Some(ty)
    }
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ============================================================================
// Primitive Value
// ============================================================================

/// 128-bit integer split into two 64-bit limbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Int128Limbs {
    #[serde(deserialize_with = "de_u64")]
    pub lowbits: u64,
    #[serde(deserialize_with = "de_u64")]
    pub highbits: u64,
}

/// A literal scalar embedded in a constant type.
///
/// The tag selects which one of the value fields is populated. Narrow
/// integers travel in the 32-bit fields, `FLOAT_16` in `float32Val`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimitiveValue {
    pub tag: PrimitiveType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub int32_val: Option<i32>,
    #[serde(
        default,
        deserialize_with = "de_opt_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub int64_val: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uint32_val: Option<u32>,
    #[serde(
        default,
        deserialize_with = "de_opt_u64",
        skip_serializing_if = "Option::is_none"
    )]
    pub uint64_val: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub float32_val: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub float64_val: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub int128_val: Option<Int128Limbs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uint128_val: Option<Int128Limbs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_val: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bool_val: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_val: Option<u32>,
}

impl PrimitiveValue {
    fn tagged(tag: PrimitiveType) -> Self {
        PrimitiveValue {
            tag,
            ..Default::default()
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        PrimitiveValue {
            string_val: Some(s.into()),
            ..Self::tagged(PrimitiveType::String)
        }
    }

    pub fn symbol(s: impl Into<String>) -> Self {
        PrimitiveValue {
            string_val: Some(s.into()),
            ..Self::tagged(PrimitiveType::Symbol)
        }
    }

    pub fn bool(b: bool) -> Self {
        PrimitiveValue {
            bool_val: Some(b),
            ..Self::tagged(PrimitiveType::Bool)
        }
    }

    pub fn char(c: char) -> Self {
        PrimitiveValue {
            char_val: Some(c as u32),
            ..Self::tagged(PrimitiveType::Char)
        }
    }

    pub fn int64(v: i64) -> Self {
        PrimitiveValue {
            int64_val: Some(v),
            ..Self::tagged(PrimitiveType::Int64)
        }
    }

    pub fn uint64(v: u64) -> Self {
        PrimitiveValue {
            uint64_val: Some(v),
            ..Self::tagged(PrimitiveType::UInt64)
        }
    }

    pub fn float64(v: f64) -> Self {
        PrimitiveValue {
            float64_val: Some(v),
            ..Self::tagged(PrimitiveType::Float64)
        }
    }

    pub fn int128(v: i128) -> Self {
        let bits = v as u128;
        PrimitiveValue {
            int128_val: Some(Int128Limbs {
                lowbits: bits as u64,
                highbits: (bits >> 64) as u64,
            }),
            ..Self::tagged(PrimitiveType::Int128)
        }
    }

    pub fn uint128(v: u128) -> Self {
        PrimitiveValue {
            uint128_val: Some(Int128Limbs {
                lowbits: v as u64,
                highbits: (v >> 64) as u64,
            }),
            ..Self::tagged(PrimitiveType::UInt128)
        }
    }

    /// Render for relation-id paths: symbols and strings as `:name`,
    /// everything else as `Type(literal)`.
    pub fn to_path_literal(&self) -> String {
        let type_name = self.tag.path_name().unwrap_or("Unknown");
        match self.tag {
            PrimitiveType::String | PrimitiveType::Symbol => {
                format!(":{}", self.string_val.as_deref().unwrap_or_default())
            }
            PrimitiveType::Bool => format!("{type_name}({})", self.bool_val.unwrap_or_default()),
            PrimitiveType::Char => {
                let c = self.char_val.and_then(char::from_u32).unwrap_or_default();
                format!("{type_name}('{c}')")
            }
            PrimitiveType::Int8 | PrimitiveType::Int16 | PrimitiveType::Int32 => {
                format!("{type_name}({})", self.int32_val.unwrap_or_default())
            }
            PrimitiveType::Int64 => format!("{type_name}({})", self.int64_val.unwrap_or_default()),
            PrimitiveType::UInt8 | PrimitiveType::UInt16 | PrimitiveType::UInt32 => {
                format!("{type_name}({})", self.uint32_val.unwrap_or_default())
            }
            PrimitiveType::UInt64 => {
                format!("{type_name}({})", self.uint64_val.unwrap_or_default())
            }
            PrimitiveType::Int128 => {
                let limbs = self.int128_val.unwrap_or_default();
                let v = ((limbs.highbits as u128) << 64 | limbs.lowbits as u128) as i128;
                format!("{type_name}({v})")
            }
            PrimitiveType::UInt128 => {
                let limbs = self.uint128_val.unwrap_or_default();
                let v = (limbs.highbits as u128) << 64 | limbs.lowbits as u128;
                format!("{type_name}({v})")
            }
            PrimitiveType::Float16 | PrimitiveType::Float32 => {
                format!("{type_name}({})", self.float32_val.unwrap_or_default())
            }
            PrimitiveType::Float64 => {
                format!("{type_name}({})", self.float64_val.unwrap_or_default())
            }
            PrimitiveType::Unspecified => type_name.to_string(),
        }
    }
}

// ============================================================================
// Relation Types
// ============================================================================

/// Discriminant of a [`WireRelType`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelKind {
    #[default]
    UnspecifiedKind,
    PrimitiveType,
    ValueType,
    ConstantType,
}

/// Ordered argument types of a value type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireValueType {
    #[serde(default)]
    pub argument_types: Vec<WireRelType>,
}

/// Literal arguments of a constant, flattened depth-first for value types
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireTuple {
    #[serde(default)]
    pub arguments: Vec<PrimitiveValue>,
}

/// A type whose single inhabitant is fixed by the signature
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireConstantType {
    pub rel_type: WireRelType,
    #[serde(default)]
    pub value: WireTuple,
}

/// One position of a relation signature.
///
/// Exactly one payload is populated, selected by `tag`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRelType {
    pub tag: RelKind,
    #[serde(default)]
    pub primitive_type: PrimitiveType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<WireValueType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant_type: Option<Box<WireConstantType>>,
}

impl WireRelType {
    pub fn primitive(primitive_type: PrimitiveType) -> Self {
        WireRelType {
            tag: RelKind::PrimitiveType,
            primitive_type,
            ..Default::default()
        }
    }

    pub fn value_type(argument_types: Vec<WireRelType>) -> Self {
        WireRelType {
            tag: RelKind::ValueType,
            value_type: Some(WireValueType { argument_types }),
            ..Default::default()
        }
    }

    pub fn constant(rel_type: WireRelType, arguments: Vec<PrimitiveValue>) -> Self {
        WireRelType {
            tag: RelKind::ConstantType,
            constant_type: Some(Box::new(WireConstantType {
                rel_type,
                value: WireTuple { arguments },
            })),
            ..Default::default()
        }
    }

    /// Constant symbol such as `:output`
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::constant(
            Self::primitive(PrimitiveType::String),
            vec![PrimitiveValue::string(name)],
        )
    }

    /// Render this position as a relation-id path segment
    pub fn to_path_segment(&self) -> String {
        match self.tag {
            RelKind::PrimitiveType => self
                .primitive_type
                .path_name()
                .unwrap_or("Unknown")
                .to_string(),
            RelKind::ValueType => {
                let args: Vec<String> = self
                    .value_type
                    .iter()
                    .flat_map(|vt| vt.argument_types.iter())
                    .map(WireRelType::to_path_segment)
                    .collect();
                format!("({})", args.join(", "))
            }
            RelKind::ConstantType => match &self.constant_type {
                Some(ct) if ct.rel_type.tag == RelKind::PrimitiveType => {
                    match ct.value.arguments.as_slice() {
                        [single] => single.to_path_literal(),
                        _ => ct.rel_type.to_path_segment(),
                    }
                }
                Some(ct) => {
                    let literals: Vec<String> = ct
                        .value
                        .arguments
                        .iter()
                        .map(PrimitiveValue::to_path_literal)
                        .collect();
                    format!("{}[{}]", ct.rel_type.to_path_segment(), literals.join(", "))
                }
                None => "Unknown".to_string(),
            },
            RelKind::UnspecifiedKind => "Unknown".to_string(),
        }
    }
}

/// Full signature of a relation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WireRelationId {
    #[serde(default)]
    pub arguments: Vec<WireRelType>,
}

impl WireRelationId {
    pub fn new(arguments: Vec<WireRelType>) -> Self {
        WireRelationId { arguments }
    }

    /// Render as a path such as `/:output/:foo/String/Int64`
    pub fn to_path(&self) -> String {
        if self.arguments.is_empty() {
            return "/".to_string();
        }
        self.arguments
            .iter()
            .map(|arg| format!("/{}", arg.to_path_segment()))
            .collect()
    }
}

/// Per-relation entry of a transaction's metadata document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationMetadata {
    pub relation_id: WireRelationId,
}

/// The metadata document returned with transaction results
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetadataInfo {
    #[serde(default)]
    pub relations: Vec<RelationMetadata>,
}

// ============================================================================
// Lenient 64-bit integers
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString<T> {
    Number(T),
    String(String),
}

fn parse_lenient<T, E>(raw: NumberOrString<T>) -> Result<T, E>
where
    T: std::str::FromStr,
    E: serde::de::Error,
{
    match raw {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s
            .parse()
            .map_err(|_| E::custom(format!("invalid integer literal: {s}"))),
    }
}

fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    parse_lenient(NumberOrString::<u64>::deserialize(deserializer)?)
}

fn de_opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Option::<NumberOrString<i64>>::deserialize(deserializer)?
        .map(parse_lenient)
        .transpose()
}

fn de_opt_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Option::<NumberOrString<u64>>::deserialize(deserializer)?
        .map(parse_lenient)
        .transpose()
}
