//! Decoding entry point: relation descriptors plus columnar payloads to
//! [`ResultTable`]s.

use std::collections::HashMap;

use arrow::record_batch::RecordBatch;
use tracing::debug;

use crate::error::{DecodeError, DecodeResult};
use crate::protocol::path::parse_relation_path;
use crate::protocol::request::TransactionResponse;
use crate::protocol::wire::WireRelationId;
use crate::results::{ColumnDef, ResultTable};
use crate::typedef::normalize;
use crate::value::arrow_convert::empty_batch;
use crate::value::read_ipc_stream;

/// Normalize every argument of a relation id. Non-constant columns take
/// consecutive physical indexes in declaration order.
pub fn column_defs(relation_id: &WireRelationId) -> DecodeResult<Vec<ColumnDef>> {
    let mut next = 0;
    relation_id
        .arguments
        .iter()
        .map(|wire_type| {
            let type_def = normalize(wire_type)?;
            let array_index = if type_def.is_constant() {
                None
            } else {
                next += 1;
                Some(next - 1)
            };
            Ok(ColumnDef {
                type_def,
                array_index,
                wire_type: wire_type.clone(),
            })
        })
        .collect()
}

/// Decode one relation. `record` may be absent only when every column is
/// constant.
pub fn decode_relation(
    relation_id: &WireRelationId,
    record: Option<RecordBatch>,
) -> DecodeResult<ResultTable> {
    let path = relation_id.to_path();
    let col_defs = column_defs(relation_id)?;
    let physical = col_defs.iter().filter(|def| !def.is_constant()).count();

    let record = match record {
        Some(record) => record,
        None if physical == 0 => empty_batch(0)?,
        None => return Err(DecodeError::MissingRelation { relation_id: path }),
    };
    if record.num_columns() != physical {
        return Err(DecodeError::MalformedDescriptor {
            reason: format!(
                "{path} declares {physical} physical columns but the payload has {}",
                record.num_columns()
            ),
        });
    }

    debug!(
        relation = %path,
        columns = col_defs.len(),
        physical,
        rows = record.num_rows(),
        "decoded relation"
    );
    ResultTable::new(path, record, col_defs)
}

/// Decode a relation whose payload is an Arrow IPC stream
pub fn decode_ipc(relation_id: &WireRelationId, data: &[u8]) -> DecodeResult<ResultTable> {
    decode_relation(relation_id, Some(read_ipc_stream(data)?))
}

/// Decode every relation of a transaction response.
///
/// Payloads are matched to metadata by relation-id path. Metadata without a
/// payload is a fully specialized relation. A payload without metadata is
/// typed from its own path.
pub fn decode_response(response: &TransactionResponse) -> DecodeResult<Vec<ResultTable>> {
    let mut unmatched: HashMap<&str, &[u8]> = response
        .results
        .iter()
        .map(|payload| (payload.relation_id.as_str(), payload.data.as_slice()))
        .collect();

    let mut tables = Vec::with_capacity(response.metadata.len().max(response.results.len()));
    for meta in &response.metadata {
        let path = meta.relation_id.to_path();
        let table = match unmatched.remove(path.as_str()) {
            Some(data) => decode_ipc(&meta.relation_id, data)?,
            None => decode_relation(&meta.relation_id, None)?,
        };
        tables.push(table);
    }

    for payload in &response.results {
        if unmatched.remove(payload.relation_id.as_str()).is_some() {
            debug!(relation = %payload.relation_id, "no metadata for payload, typing from path");
            let relation_id = parse_relation_path(&payload.relation_id)?;
            tables.push(decode_ipc(&relation_id, &payload.data)?);
        }
    }

    Ok(tables)
}

impl TransactionResponse {
    /// Decode every relation in this response
    pub fn tables(&self) -> DecodeResult<Vec<ResultTable>> {
        decode_response(self)
    }
}
