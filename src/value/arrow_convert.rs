//! Arrow Conversion Utilities
//!
//! Reads the columnar half of a result: Arrow IPC streams into a
//! `RecordBatch`, and single cells of an Arrow array into [`RawValue`]s.
//! Struct columns (value types) and list columns (128-bit limbs, fixed-size
//! tuples) come back as nested [`RawValue::List`]s.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{
    Array, BooleanArray, FixedSizeListArray, Float16Array, Float32Array, Float64Array,
    Int16Array, Int32Array, Int64Array, Int8Array, LargeListArray, LargeStringArray, ListArray,
    StringArray, StructArray, UInt16Array, UInt32Array, UInt64Array, UInt8Array,
};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType as ArrowDataType, Schema};
use arrow::ipc::reader::StreamReader;
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use super::RawValue;
use crate::error::{DecodeError, DecodeResult};

/// Read an Arrow IPC stream into a single `RecordBatch`
///
/// Multiple batches in the stream are concatenated. An empty stream yields an
/// empty batch with the stream's schema.
pub fn read_ipc_stream(bytes: &[u8]) -> DecodeResult<RecordBatch> {
    let reader = StreamReader::try_new(Cursor::new(bytes), None)?;
    let schema = reader.schema();
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

/// A batch with no columns that still reports `rows` rows
pub fn empty_batch(rows: usize) -> DecodeResult<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(rows));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::empty()),
        Vec::new(),
        &options,
    )?)
}

fn downcast<T: 'static>(array: &dyn Array) -> DecodeResult<&T> {
    array.as_any().downcast_ref::<T>().ok_or_else(|| {
        DecodeError::malformed(
            format!("{:?}", array.data_type()),
            "array does not match its declared data type",
        )
    })
}

/// Extract the raw value at `row` from an Arrow array
pub fn array_value(array: &dyn Array, row: usize) -> DecodeResult<RawValue> {
    if row >= array.len() {
        return Err(DecodeError::RowOutOfRange {
            row,
            rows: array.len(),
        });
    }
    if array.is_null(row) {
        return Ok(RawValue::Null);
    }

    let value = match array.data_type() {
        ArrowDataType::Utf8 => RawValue::String(downcast::<StringArray>(array)?.value(row).into()),
        ArrowDataType::LargeUtf8 => {
            RawValue::String(downcast::<LargeStringArray>(array)?.value(row).into())
        }
        ArrowDataType::Boolean => RawValue::Bool(downcast::<BooleanArray>(array)?.value(row)),
        ArrowDataType::Int8 => RawValue::Int8(downcast::<Int8Array>(array)?.value(row)),
        ArrowDataType::Int16 => RawValue::Int16(downcast::<Int16Array>(array)?.value(row)),
        ArrowDataType::Int32 => RawValue::Int32(downcast::<Int32Array>(array)?.value(row)),
        ArrowDataType::Int64 => RawValue::Int64(downcast::<Int64Array>(array)?.value(row)),
        ArrowDataType::UInt8 => RawValue::UInt8(downcast::<UInt8Array>(array)?.value(row)),
        ArrowDataType::UInt16 => RawValue::UInt16(downcast::<UInt16Array>(array)?.value(row)),
        ArrowDataType::UInt32 => RawValue::UInt32(downcast::<UInt32Array>(array)?.value(row)),
        ArrowDataType::UInt64 => RawValue::UInt64(downcast::<UInt64Array>(array)?.value(row)),
        ArrowDataType::Float16 => RawValue::Float16(downcast::<Float16Array>(array)?.value(row)),
        ArrowDataType::Float32 => RawValue::Float32(downcast::<Float32Array>(array)?.value(row)),
        ArrowDataType::Float64 => RawValue::Float64(downcast::<Float64Array>(array)?.value(row)),
        ArrowDataType::Struct(_) => {
            let arr = downcast::<StructArray>(array)?;
            let fields = arr
                .columns()
                .iter()
                .map(|column| array_value(column.as_ref(), row))
                .collect::<DecodeResult<Vec<_>>>()?;
            RawValue::List(fields)
        }
        ArrowDataType::FixedSizeList(_, _) => {
            list_values(downcast::<FixedSizeListArray>(array)?.value(row).as_ref())?
        }
        ArrowDataType::List(_) => list_values(downcast::<ListArray>(array)?.value(row).as_ref())?,
        ArrowDataType::LargeList(_) => {
            list_values(downcast::<LargeListArray>(array)?.value(row).as_ref())?
        }
        other => {
            return Err(DecodeError::UnsupportedPrimitiveType {
                tag: format!("arrow {other:?}"),
            })
        }
    };
    Ok(value)
}

fn list_values(values: &dyn Array) -> DecodeResult<RawValue> {
    let items = (0..values.len())
        .map(|i| array_value(values, i))
        .collect::<DecodeResult<Vec<_>>>()?;
    Ok(RawValue::List(items))
}
