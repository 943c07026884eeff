//! End-to-end decoding tests: relation descriptors plus Arrow payloads to
//! result tables.

use std::str::FromStr;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, FixedSizeListArray, Int64Array, StringArray, StructArray, UInt32Array, UInt64Array,
};
use arrow::datatypes::{DataType, Field};
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use relsdk::client::Transport;
use relsdk::decode::{decode_ipc, decode_relation};
use relsdk::protocol::request::{RelationPayload, TransactionResponse};
use relsdk::protocol::wire::{PrimitiveType, PrimitiveValue, RelationMetadata};
use relsdk::{
    parse_relation_path, ClientResult, DecodeError, Rational, ScalarType, TransactionRequest,
    TypeDef, Value, WireRelType, WireRelationId,
};

// Helpers

fn ipc_bytes(batch: &RecordBatch) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = StreamWriter::try_new(&mut buf, &batch.schema()).unwrap();
        writer.write(batch).unwrap();
        writer.finish().unwrap();
    }
    buf
}

fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
    RecordBatch::try_from_iter(columns).unwrap()
}

fn struct_column(fields: Vec<(&str, ArrayRef)>) -> ArrayRef {
    Arc::new(StructArray::from(
        fields
            .into_iter()
            .map(|(name, array)| {
                (
                    Arc::new(Field::new(name, array.data_type().clone(), false)),
                    array,
                )
            })
            .collect::<Vec<_>>(),
    ))
}

fn limb_column(values: &[u128]) -> ArrayRef {
    let limbs: Vec<u64> = values
        .iter()
        .flat_map(|v| [*v as u64, (*v >> 64) as u64])
        .collect();
    Arc::new(FixedSizeListArray::new(
        Arc::new(Field::new("item", DataType::UInt64, false)),
        2,
        Arc::new(UInt64Array::from(limbs)),
        None,
    ))
}

fn s(v: &str) -> Value {
    Value::string(v)
}

/// `(:output, 1, :foo, String, :bar, Char, Int64)`
fn scenario_relation() -> WireRelationId {
    WireRelationId::new(vec![
        WireRelType::symbol("output"),
        WireRelType::constant(
            WireRelType::primitive(PrimitiveType::Int64),
            vec![PrimitiveValue::int64(1)],
        ),
        WireRelType::symbol("foo"),
        WireRelType::primitive(PrimitiveType::String),
        WireRelType::symbol("bar"),
        WireRelType::primitive(PrimitiveType::Char),
        WireRelType::primitive(PrimitiveType::Int64),
    ])
}

fn scenario_batch() -> RecordBatch {
    batch(vec![
        (
            "v1",
            Arc::new(StringArray::from(vec!["w", "x", "y", "z"])) as ArrayRef,
        ),
        (
            "v2",
            Arc::new(UInt32Array::from(vec!['a' as u32, 'b' as u32, 'c' as u32, 'd' as u32]))
                as ArrayRef,
        ),
        ("v3", Arc::new(Int64Array::from(vec![1, 2, 3, 4])) as ArrayRef),
    ])
}

// End-to-end scenario

#[test]
fn test_scenario_values() {
    let table = decode_ipc(&scenario_relation(), &ipc_bytes(&scenario_batch())).unwrap();

    assert_eq!(table.relation_id(), "/:output/Int64(1)/:foo/String/:bar/Char/Int64");
    assert_eq!(table.rows_count(), 4);
    assert_eq!(table.columns_count(), 7);

    let expected: Vec<Vec<Value>> = [("w", 'a', 1), ("x", 'b', 2), ("y", 'c', 3), ("z", 'd', 4)]
        .into_iter()
        .map(|(text, c, n)| {
            vec![
                s("output"),
                Value::Int64(1),
                s("foo"),
                s(text),
                s("bar"),
                Value::Char(c),
                Value::Int64(n),
            ]
        })
        .collect();
    assert_eq!(table.values().unwrap(), expected);
}

#[test]
fn test_scenario_physical() {
    let table = decode_relation(&scenario_relation(), Some(scenario_batch())).unwrap();
    let physical = table.physical();

    assert_eq!(physical.columns_count(), 3);
    assert_eq!(
        physical.values().unwrap(),
        vec![
            vec![s("w"), Value::Char('a'), Value::Int64(1)],
            vec![s("x"), Value::Char('b'), Value::Int64(2)],
            vec![s("y"), Value::Char('c'), Value::Int64(3)],
            vec![s("z"), Value::Char('d'), Value::Int64(4)],
        ]
    );
    // projection leaves the source untouched
    assert_eq!(table.columns_count(), 7);
}

#[test]
fn test_scenario_columns() {
    let table = decode_relation(&scenario_relation(), Some(scenario_batch())).unwrap();
    let columns = table.columns().unwrap();
    assert_eq!(columns.len(), 7);
    assert_eq!(columns[1].values, vec![Value::Int64(1); 4]);
    assert!(columns[1].type_def.is_constant());
    assert_eq!(columns[5].type_def, TypeDef::Scalar(ScalarType::Char));
    assert_eq!(
        columns[3].values,
        vec![s("w"), s("x"), s("y"), s("z")]
    );
}

#[test]
fn test_scenario_slices() {
    let table = decode_relation(&scenario_relation(), Some(scenario_batch())).unwrap();
    let all = table.values().unwrap();

    for (begin, end) in [(0, 4), (1, 3), (2, 2), (3, 4)] {
        let slice = table.slice(begin, end).unwrap();
        assert_eq!(slice.values().unwrap(), all[begin..end].to_vec());
    }
    // slice of a slice
    let nested = table.slice(1, 4).unwrap().slice(1, 2).unwrap();
    assert_eq!(nested.values().unwrap(), all[2..3].to_vec());

    assert_eq!(table.values().unwrap(), all);
}

// Fully specialized relations

#[test]
fn test_fully_specialized_relation() {
    let id = parse_relation_path("/:output/:result/Int64(42)/Char('x')").unwrap();
    let table = decode_relation(&id, None).unwrap();

    assert!(table.is_fully_specialized());
    assert_eq!(table.rows_count(), 1);
    assert_eq!(
        table.get(0).unwrap(),
        vec![s("output"), s("result"), Value::Int64(42), Value::Char('x')]
    );
    assert!(matches!(
        table.get(1),
        Err(DecodeError::RowOutOfRange { row: 1, rows: 1 })
    ));
    assert!(table.physical().values().unwrap().is_empty());
}

#[test]
fn test_empty_relation() {
    let table = decode_relation(&WireRelationId::default(), None).unwrap();
    assert_eq!(table.rows_count(), 0);
    assert_eq!(table.columns_count(), 0);
    assert!(table.values().unwrap().is_empty());
}

#[test]
fn test_zero_row_payload() {
    let id = parse_relation_path("/:output/Int64").unwrap();
    let empty = batch(vec![(
        "v1",
        Arc::new(Int64Array::from(Vec::<i64>::new())) as ArrayRef,
    )]);
    let table = decode_ipc(&id, &ipc_bytes(&empty)).unwrap();
    assert_eq!(table.rows_count(), 0);
    assert!(table.values().unwrap().is_empty());
}

// Value types over struct columns

#[test]
fn test_value_type_struct_column() {
    let id = parse_relation_path("/:output/(:Point, Int64, String)").unwrap();
    let record = batch(vec![(
        "v1",
        struct_column(vec![
            ("v1", Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef),
            ("v2", Arc::new(StringArray::from(vec!["abc", "def"])) as ArrayRef),
        ]),
    )]);
    let table = decode_relation(&id, Some(record)).unwrap();

    assert_eq!(
        table.values().unwrap(),
        vec![
            vec![
                s("output"),
                Value::Tuple(vec![s("Point"), Value::Int64(1), s("abc")])
            ],
            vec![
                s("output"),
                Value::Tuple(vec![s("Point"), Value::Int64(2), s("def")])
            ],
        ]
    );
}

#[test]
fn test_folded_standard_types() {
    let id = parse_relation_path(
        "/:output\
         /(:rel, :base, :Date, Int64)\
         /(:rel, :base, :FixedDecimal, Int64(64), Int64(2), Int64)\
         /(:rel, :base, :Rational, Int64, Int64)\
         /(:rel, :base, :Hash, UInt128)",
    )
    .unwrap();

    let record = batch(vec![
        (
            "v1",
            struct_column(vec![(
                "v1",
                Arc::new(Int64Array::from(vec![738075])) as ArrayRef,
            )]),
        ),
        (
            "v2",
            struct_column(vec![("v1", Arc::new(Int64Array::from(vec![1234])) as ArrayRef)]),
        ),
        (
            "v3",
            struct_column(vec![
                ("v1", Arc::new(Int64Array::from(vec![2])) as ArrayRef),
                ("v2", Arc::new(Int64Array::from(vec![6])) as ArrayRef),
            ]),
        ),
        ("v4", limb_column(&[(9u128 << 64) | 7])),
    ]);
    let table = decode_relation(&id, Some(record)).unwrap();

    let types = table.type_defs();
    assert_eq!(types[1], &TypeDef::Scalar(ScalarType::Date));
    assert_eq!(types[2], &TypeDef::Decimal { bits: 64, places: 2 });
    assert_eq!(types[3], &TypeDef::Rational { bits: 64 });
    assert_eq!(types[4], &TypeDef::Scalar(ScalarType::Hash));

    assert_eq!(
        table.get(0).unwrap(),
        vec![
            s("output"),
            Value::Date(NaiveDate::from_ymd_opt(2021, 10, 12).unwrap()),
            Value::Decimal(Decimal::from_str("12.34").unwrap()),
            Value::Rational(Rational::new(1, 3).unwrap()),
            Value::UInt128((9u128 << 64) | 7),
        ]
    );
}

#[test]
fn test_folded_128_bit_types_in_structs() {
    let id = parse_relation_path(
        "/(:rel, :base, :Date, Int64)\
         /(:rel, :base, :Hash, UInt128)\
         /(:rel, :base, :FixedDecimal, Int64(128), Int64(2), Int128)",
    )
    .unwrap();

    let unscaled = -(1i128 << 70) - 1234;
    let record = batch(vec![
        (
            "v1",
            struct_column(vec![(
                "v1",
                Arc::new(Int64Array::from(vec![738075])) as ArrayRef,
            )]),
        ),
        (
            "v2",
            struct_column(vec![("v1", limb_column(&[(9u128 << 64) | 7]))]),
        ),
        (
            "v3",
            struct_column(vec![("v1", limb_column(&[unscaled as u128]))]),
        ),
    ]);
    let table = decode_relation(&id, Some(record)).unwrap();

    let types = table.type_defs();
    assert_eq!(types[1], &TypeDef::Scalar(ScalarType::Hash));
    assert_eq!(types[2], &TypeDef::Decimal { bits: 128, places: 2 });

    assert_eq!(
        table.get(0).unwrap(),
        vec![
            Value::Date(NaiveDate::from_ymd_opt(2021, 10, 12).unwrap()),
            Value::UInt128((9u128 << 64) | 7),
            Value::Decimal(Decimal::from_i128_with_scale(unscaled, 2)),
        ]
    );
}

#[test]
fn test_negative_int128_column() {
    let id = parse_relation_path("/:output/Int128").unwrap();
    let record = batch(vec![("v1", limb_column(&[(-5i128) as u128, 5]))]);
    let table = decode_relation(&id, Some(record)).unwrap();
    assert_eq!(
        table.values().unwrap(),
        vec![
            vec![s("output"), Value::Int128(-5)],
            vec![s("output"), Value::Int128(5)],
        ]
    );
}

#[test]
fn test_malformed_cell_fails_whole_call() {
    // Rational expects two fields, the struct carries one
    let id = parse_relation_path("/(:rel, :base, :Rational, Int64, Int64)").unwrap();
    let record = batch(vec![(
        "v1",
        struct_column(vec![(
            "v1",
            Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
        )]),
    )]);
    let table = decode_relation(&id, Some(record)).unwrap();
    let err = table.values().unwrap_err();
    assert!(matches!(
        err,
        DecodeError::MalformedCompositeValue { ref type_name, .. } if type_name == "Rational64"
    ));
}

#[test]
fn test_unsupported_arrow_type() {
    let id = parse_relation_path("/Float64").unwrap();
    let record = batch(vec![(
        "v1",
        Arc::new(arrow::array::Date32Array::from(vec![1])) as ArrayRef,
    )]);
    let table = decode_relation(&id, Some(record)).unwrap();
    assert!(matches!(
        table.get(0),
        Err(DecodeError::UnsupportedPrimitiveType { .. })
    ));
}

// Transport

#[derive(Clone)]
struct MemoryTransport {
    response: TransactionResponse,
}

impl Transport for MemoryTransport {
    async fn execute(&self, _request: &TransactionRequest) -> ClientResult<TransactionResponse> {
        Ok(self.response.clone())
    }
}

#[tokio::test]
async fn test_query_through_transport() {
    let relation = scenario_relation();
    let transport = MemoryTransport {
        response: TransactionResponse {
            metadata: vec![
                RelationMetadata {
                    relation_id: relation.clone(),
                },
                RelationMetadata {
                    relation_id: parse_relation_path("/:output/:ok").unwrap(),
                },
            ],
            results: vec![RelationPayload {
                relation_id: relation.to_path(),
                data: ipc_bytes(&scenario_batch()),
            }],
            ..Default::default()
        },
    };

    let request = TransactionRequest::new("db", "engine", "def output = ...", true);
    let tables = transport.query(&request).await.unwrap();

    assert_eq!(tables.len(), 2);
    assert_eq!(tables[0].rows_count(), 4);
    assert_eq!(tables[0].physical().get(3).unwrap()[0], s("z"));
    assert!(tables[1].is_fully_specialized());
    assert_eq!(tables[1].values().unwrap(), vec![vec![s("output"), s("ok")]]);
}

#[tokio::test]
async fn test_query_surfaces_decode_errors() {
    let transport = MemoryTransport {
        response: TransactionResponse {
            metadata: vec![RelationMetadata {
                relation_id: parse_relation_path("/:output/Int64").unwrap(),
            }],
            ..Default::default()
        },
    };
    let request = TransactionRequest::new("db", "engine", "def output = 1", true);
    let err = transport.query(&request).await.unwrap_err();
    assert!(matches!(
        err,
        relsdk::ClientError::Decode(DecodeError::MissingRelation { .. })
    ));
}
