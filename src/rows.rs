use std::os::raw::{c_ulong, c_void};

use crate::col::ColumnDescriptor;
use crate::constant::ColumnType;
use crate::error::{Error, Result};
use crate::ffi;
use crate::stmt::{Stmt, stmt_server_error};
use crate::value::{self, FieldKind, Value};

/// One per-column receive cell.
///
/// The heap buffer, the length cell, the null indicator and the truncation
/// indicator are all owned here; the native bind slot only carries
/// pointers into this struct. The containing slice is boxed, so the
/// pointers stay valid however the binder itself moves.
#[derive(Debug)]
struct OutCell {
    tag: ColumnType,
    unsigned: bool,
    kind: FieldKind,
    /// Exact native width for fixed-width columns, empty for
    /// variable-width columns which are fetched on demand.
    buf: Box<[u8]>,
    /// True column length, written by the library on every fetch.
    length: c_ulong,
    is_null: ffi::my_bool,
    truncated: ffi::my_bool,
}

impl OutCell {
    fn new(col: &ColumnDescriptor) -> Self {
        let kind = col.kind();
        let (tag, buf) = match value::fixed_buffer_len(col.column_type) {
            Some(len) => (col.column_type, vec![0u8; len].into_boxed_slice()),
            // Variable-width columns bind a zero-length placeholder under
            // the class's generic tag, exactly long enough to learn the
            // true length from the length cell.
            None => {
                let tag = match kind {
                    FieldKind::Bytes => ColumnType::MYSQL_TYPE_LONG_BLOB,
                    FieldKind::Null => ColumnType::MYSQL_TYPE_NULL,
                    _ => ColumnType::MYSQL_TYPE_VAR_STRING,
                };
                (tag, Box::default())
            }
        };
        Self {
            tag,
            unsigned: col.is_unsigned(),
            kind,
            buf,
            length: 0,
            is_null: 0,
            truncated: 0,
        }
    }

    fn native_bind(&mut self) -> ffi::MYSQL_BIND {
        let mut bind = ffi::MYSQL_BIND::zeroed();
        bind.buffer_type = self.tag.to_native();
        bind.buffer = self.buf.as_mut_ptr().cast::<c_void>();
        bind.buffer_length = self.buf.len() as c_ulong;
        bind.length = &mut self.length;
        bind.is_null = &mut self.is_null;
        bind.error = &mut self.truncated;
        bind.is_unsigned = ffi::my_bool::from(self.unsigned);
        bind
    }
}

/// Owns the per-column receive buffers for one active result set and
/// materializes rows out of them.
///
/// Created after a successful execute, torn down exactly once when the
/// cursor is exhausted, errors out, or the owning statement is reset,
/// re-prepared or dropped. Tolerates teardown with zero rows fetched: the
/// buffers are plain owned memory.
#[derive(Debug)]
pub(crate) struct ResultBinder {
    cells: Box<[OutCell]>,
    /// Kept alive for as long as the statement holds pointers to it.
    _binds: Box<[ffi::MYSQL_BIND]>,
}

impl ResultBinder {
    /// Buffer the result set client-side, size one receive cell per column
    /// and issue the single bind-result call.
    pub(crate) fn bind(raw: *mut ffi::MYSQL_STMT, columns: &[ColumnDescriptor]) -> Result<Self> {
        // SAFETY: the statement was just executed on a live handle.
        if unsafe { ffi::mysql_stmt_store_result(raw) } != 0 {
            return Err(Error::Execute(stmt_server_error(raw)));
        }

        let mut cells: Box<[OutCell]> = columns.iter().map(OutCell::new).collect();
        let mut binds: Box<[ffi::MYSQL_BIND]> =
            cells.iter_mut().map(OutCell::native_bind).collect();

        if !binds.is_empty() {
            // SAFETY: every pointer in the bind array references memory
            // inside `cells`, which outlives the statement's use of the
            // binding (the binder is dropped only after free_result/reset).
            if unsafe { ffi::mysql_stmt_bind_result(raw, binds.as_mut_ptr()) } != 0 {
                return Err(Error::Execute(stmt_server_error(raw)));
            }
        }

        Ok(Self {
            cells,
            _binds: binds,
        })
    }

    /// Drive one fetch step and materialize the row.
    ///
    /// Truncation is the routine signal for every variable-width column:
    /// the true length arrives through the length cell, and the column is
    /// re-fetched into an exact-size scratch buffer that lives only for
    /// this call.
    #[tracing::instrument(skip_all)]
    pub(crate) fn fetch_row(&mut self, raw: *mut ffi::MYSQL_STMT) -> Result<Option<Vec<Value>>> {
        // SAFETY: the statement is live and bound to our cells.
        let rc = unsafe { ffi::mysql_stmt_fetch(raw) };
        match rc {
            ffi::MYSQL_NO_DATA => return Ok(None),
            // 0 = clean row, truncation = expected for variable columns
            0 | ffi::MYSQL_DATA_TRUNCATED => {}
            _ => return Err(Error::Fetch(stmt_server_error(raw))),
        }

        let mut row = Vec::with_capacity(self.cells.len());
        for (idx, cell) in self.cells.iter_mut().enumerate() {
            // The null indicator wins over the declared type; no column
            // fetch is issued for a null cell.
            if cell.is_null != 0 {
                row.push(Value::Null);
                continue;
            }
            let value = match cell.kind {
                FieldKind::Null => Value::Null,
                FieldKind::Integer | FieldKind::Double => {
                    value::decode_fixed(cell.tag, cell.unsigned, &cell.buf)?
                }
                FieldKind::Bytes | FieldKind::String | FieldKind::Date => {
                    fetch_column(raw, cell, idx)?
                }
            };
            row.push(value);
        }
        Ok(Some(row))
    }

    /// Rows in the buffered result set.
    pub(crate) fn num_rows(&self, raw: *mut ffi::MYSQL_STMT) -> u64 {
        // SAFETY: the statement is live and its result set is stored.
        unsafe { ffi::mysql_stmt_num_rows(raw) }
    }
}

/// Column-scoped re-fetch of one variable-width value into a fresh
/// exact-size buffer, decoded and discarded before returning.
fn fetch_column(raw: *mut ffi::MYSQL_STMT, cell: &OutCell, idx: usize) -> Result<Value> {
    let len = cell.length as usize;
    if len == 0 {
        return Ok(value::decode_variable(cell.kind, &[]));
    }

    let mut scratch = vec![0u8; len];
    let mut fetched_len: c_ulong = 0;
    let mut bind = ffi::MYSQL_BIND::zeroed();
    bind.buffer_type = cell.tag.to_native();
    bind.buffer = scratch.as_mut_ptr().cast::<c_void>();
    bind.buffer_length = len as c_ulong;
    bind.length = &mut fetched_len;

    // SAFETY: scratch and fetched_len outlive the call; the library writes
    // at most buffer_length bytes.
    let rc = unsafe { ffi::mysql_stmt_fetch_column(raw, &mut bind, idx as std::os::raw::c_uint, 0) };
    if rc != 0 {
        return Err(Error::Fetch(stmt_server_error(raw)));
    }
    Ok(value::decode_variable(cell.kind, &scratch))
}

/// Borrowing cursor over a prepared statement's buffered result set.
///
/// Rows are materialized one fetch at a time; each yielded row owns its
/// values. Dropping the cursor mid-iteration keeps the binder alive until
/// the statement is reset, re-prepared or dropped.
pub struct Rows<'stmt, 'conn> {
    pub(crate) stmt: &'stmt mut Stmt<'conn>,
}

impl Rows<'_, '_> {
    pub fn num_fields(&self) -> usize {
        self.stmt.field_count()
    }

    /// Row count of the buffered set, available before iteration.
    pub fn num_rows(&self) -> u64 {
        self.stmt.buffered_row_count()
    }
}

impl Iterator for Rows<'_, '_> {
    type Item = Result<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.stmt.fetch_next().transpose()
    }
}
