//! Result tables: normalized column definitions over a columnar record.
//!
//! A [`ResultTable`] interleaves constant columns (no physical storage) with
//! array-backed columns when materializing rows. A table whose every column is
//! constant is *fully specialized* and holds exactly one logical row.

use std::sync::Arc;

use arrow::record_batch::RecordBatch;

use crate::convert::convert_value;
use crate::error::{DecodeError, DecodeResult};
use crate::protocol::wire::WireRelType;
use crate::typedef::TypeDef;
use crate::value::arrow_convert::empty_batch;
use crate::value::{array_value, Value};

/// One output column: its normalized type and, for non-constant types, the
/// index of the physical array holding its data
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub type_def: TypeDef,
    pub array_index: Option<usize>,
    /// Wire descriptor this column was normalized from, kept for diagnostics
    pub wire_type: WireRelType,
}

impl ColumnDef {
    pub fn is_constant(&self) -> bool {
        self.type_def.is_constant()
    }
}

/// Materialized values of one column
#[derive(Debug, Clone, PartialEq)]
pub struct ResultColumn {
    pub values: Vec<Value>,
    pub type_def: TypeDef,
}

/// A decoded relation: read-only view over a shared record
#[derive(Debug, Clone)]
pub struct ResultTable {
    relation_id: String,
    record: RecordBatch,
    col_defs: Arc<[ColumnDef]>,
}

impl ResultTable {
    /// Wrap a record with its column definitions.
    ///
    /// Every physical index must name a column of `record`. A fully
    /// specialized table gets a column-less one-row record, whatever the
    /// payload carried.
    pub fn new(
        relation_id: impl Into<String>,
        record: RecordBatch,
        col_defs: Vec<ColumnDef>,
    ) -> DecodeResult<Self> {
        let columns = record.num_columns();
        if let Some(column) = col_defs
            .iter()
            .filter_map(|def| def.array_index)
            .find(|&i| i >= columns)
        {
            return Err(DecodeError::ColumnOutOfRange { column, columns });
        }

        let col_defs: Arc<[ColumnDef]> = col_defs.into();
        let record = if is_fully_specialized(&col_defs) {
            empty_batch(1)?
        } else {
            record
        };

        Ok(ResultTable {
            relation_id: relation_id.into(),
            record,
            col_defs,
        })
    }

    pub fn relation_id(&self) -> &str {
        &self.relation_id
    }

    pub fn type_defs(&self) -> Vec<&TypeDef> {
        self.col_defs.iter().map(|def| &def.type_def).collect()
    }

    pub fn column_defs(&self) -> &[ColumnDef] {
        &self.col_defs
    }

    /// The underlying record (physical columns only)
    pub fn record(&self) -> &RecordBatch {
        &self.record
    }

    /// True when there is at least one column and every column is constant
    pub fn is_fully_specialized(&self) -> bool {
        is_fully_specialized(&self.col_defs)
    }

    /// Logical row count.
    ///
    /// A fully specialized table stores no physical rows but reports one,
    /// the row spelled out by its constants, so `get(0)` succeeds and
    /// `get(1)` is out of range. [`Self::physical`] of such a table has zero.
    pub fn rows_count(&self) -> usize {
        self.record.num_rows()
    }

    /// Output columns, constants included
    pub fn columns_count(&self) -> usize {
        self.col_defs.len()
    }

    /// Materialize one row in declaration order
    pub fn get(&self, row: usize) -> DecodeResult<Vec<Value>> {
        let rows = self.rows_count();
        if row >= rows {
            return Err(DecodeError::RowOutOfRange { row, rows });
        }
        self.col_defs
            .iter()
            .map(|def| self.cell(def, row))
            .collect()
    }

    /// Every row; the first failing cell fails the whole call
    pub fn values(&self) -> DecodeResult<Vec<Vec<Value>>> {
        (0..self.rows_count()).map(|row| self.get(row)).collect()
    }

    pub fn column(&self, index: usize) -> DecodeResult<ResultColumn> {
        let def = self
            .col_defs
            .get(index)
            .ok_or(DecodeError::ColumnOutOfRange {
                column: index,
                columns: self.col_defs.len(),
            })?;
        let values = (0..self.rows_count())
            .map(|row| self.cell(def, row))
            .collect::<DecodeResult<Vec<_>>>()?;
        Ok(ResultColumn {
            values,
            type_def: def.type_def.clone(),
        })
    }

    pub fn columns(&self) -> DecodeResult<Vec<ResultColumn>> {
        (0..self.columns_count()).map(|i| self.column(i)).collect()
    }

    /// Rows `begin..end` as a new table sharing this table's columns and
    /// record buffers
    pub fn slice(&self, begin: usize, end: usize) -> DecodeResult<ResultTable> {
        let rows = self.rows_count();
        if begin > end || end > rows {
            return Err(DecodeError::InvalidSlice { begin, end, rows });
        }
        Ok(ResultTable {
            relation_id: self.relation_id.clone(),
            record: self.record.slice(begin, end - begin),
            col_defs: Arc::clone(&self.col_defs),
        })
    }

    /// Projection onto the array-backed columns.
    ///
    /// Physical indexes are kept, so the projection reads the same record.
    /// With no physical columns left the projection is empty.
    pub fn physical(&self) -> ResultTable {
        let col_defs: Arc<[ColumnDef]> = self
            .col_defs
            .iter()
            .filter(|def| !def.is_constant())
            .cloned()
            .collect();
        let record = if col_defs.is_empty() {
            self.record.slice(0, 0)
        } else {
            self.record.clone()
        };
        ResultTable {
            relation_id: self.relation_id.clone(),
            record,
            col_defs,
        }
    }

    fn cell(&self, def: &ColumnDef, row: usize) -> DecodeResult<Value> {
        let Some(index) = def.array_index else {
            return convert_value(&def.type_def, None);
        };
        let array = self
            .record
            .columns()
            .get(index)
            .ok_or(DecodeError::ColumnOutOfRange {
                column: index,
                columns: self.record.num_columns(),
            })?;
        let raw = array_value(array.as_ref(), row)?;
        convert_value(&def.type_def, Some(&raw))
    }
}

fn is_fully_specialized(col_defs: &[ColumnDef]) -> bool {
    !col_defs.is_empty() && col_defs.iter().all(ColumnDef::is_constant)
}
