use std::marker::PhantomData;
use std::os::raw::{c_char, c_ulong};
use std::ptr::NonNull;

use crate::col::{ColumnDescriptor, FieldInfo};
use crate::conn::Conn;
use crate::constant::{ColumnFlags, ColumnType};
use crate::error::{Error, Result, ServerError, eyre};
use crate::ffi;
use crate::param::{Param, ParamBindSet};
use crate::rows::{ResultBinder, Rows};
use crate::value::Value;

/// Lifecycle state of a statement. Exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Handle allocated, no SQL associated (or last prepare failed).
    Unprepared,
    /// SQL parsed server-side; parameters may be bound.
    Prepared,
    /// Executed; a result cursor may be opened.
    Executed,
    /// Result buffers bound, rows being fetched.
    Fetching,
    /// Cursor exhausted or failed; reset() makes the statement reusable.
    Exhausted,
}

/// A prepared statement on one connection.
///
/// Owns the native statement handle, the parameter bind set, the column
/// descriptors and the result binder; all of them are released exactly
/// once, in that order, when the statement is dropped.
pub struct Stmt<'conn> {
    raw: NonNull<ffi::MYSQL_STMT>,
    state: State,
    params: ParamBindSet,
    columns: Vec<ColumnDescriptor>,
    meta: Option<NonNull<ffi::MYSQL_RES>>,
    binder: Option<ResultBinder>,
    _conn: PhantomData<&'conn Conn>,
}

pub(crate) fn stmt_server_error(raw: *mut ffi::MYSQL_STMT) -> ServerError {
    // SAFETY: callers pass a live statement handle.
    unsafe {
        ServerError {
            code: ffi::mysql_stmt_errno(raw),
            message: ffi::cstr_to_string(ffi::mysql_stmt_error(raw)),
        }
    }
}

impl<'conn> Stmt<'conn> {
    /// Allocate a statement handle against a live connection.
    pub fn new(conn: &'conn Conn) -> Result<Self> {
        // SAFETY: the connection handle is live for 'conn.
        let raw = unsafe { ffi::mysql_stmt_init(conn.raw()) };
        let raw = NonNull::new(raw).ok_or_else(|| Error::Connection(conn.server_error()))?;
        Ok(Self {
            raw,
            state: State::Unprepared,
            params: ParamBindSet::default(),
            columns: Vec::new(),
            meta: None,
            binder: None,
            _conn: PhantomData,
        })
    }

    /// Error number of the most recent failed statement call.
    pub fn error_code(&self) -> u32 {
        stmt_server_error(self.raw.as_ptr()).code
    }

    /// Error message of the most recent failed statement call.
    pub fn error_message(&self) -> String {
        stmt_server_error(self.raw.as_ptr()).message
    }

    /// Parse and validate `sql` server-side.
    ///
    /// On success the parameter slots and column descriptors are rebuilt
    /// from scratch; nothing survives from a previous prepare. On failure
    /// the statement stays unusable until prepared with corrected SQL.
    #[tracing::instrument(skip_all)]
    pub fn prepare(&mut self, sql: &str) -> Result<()> {
        self.release_results();
        self.params = ParamBindSet::default();
        self.columns.clear();
        self.free_meta();
        self.state = State::Unprepared;

        // SAFETY: the statement handle is live and the query buffer is
        // valid for the given byte length.
        let rc = unsafe {
            ffi::mysql_stmt_prepare(
                self.raw.as_ptr(),
                sql.as_ptr().cast::<c_char>(),
                sql.len() as c_ulong,
            )
        };
        if rc != 0 {
            return Err(Error::Prepare(stmt_server_error(self.raw.as_ptr())));
        }

        // SAFETY: prepare succeeded; metadata is null for statements that
        // return no rows.
        let meta = unsafe { ffi::mysql_stmt_result_metadata(self.raw.as_ptr()) };
        self.meta = NonNull::new(meta);
        self.columns = self.read_columns()?;

        // SAFETY: prepare succeeded, the declared count is now known.
        let declared = unsafe { ffi::mysql_stmt_param_count(self.raw.as_ptr()) } as usize;
        self.params = ParamBindSet::new(declared);
        self.state = State::Prepared;
        Ok(())
    }

    fn read_columns(&self) -> Result<Vec<ColumnDescriptor>> {
        let Some(meta) = self.meta else {
            return Ok(Vec::new());
        };
        // SAFETY: meta is a live metadata handle owned by self.
        let count = unsafe { ffi::mysql_num_fields(meta.as_ptr()) };
        let mut columns = Vec::with_capacity(count as usize);
        for i in 0..count {
            // SAFETY: i is within the field count of this metadata handle.
            let field = unsafe { ffi::mysql_fetch_field_direct(meta.as_ptr(), i) };
            if field.is_null() {
                return Err(Error::LibraryBug(eyre!("no metadata for column {}", i)));
            }
            // SAFETY: the field pointer is valid until the metadata handle
            // is freed; we copy everything out immediately.
            let field = unsafe { &*field };
            let column_type = ColumnType::from_native(field.type_).ok_or_else(|| {
                Error::LibraryBug(eyre!("unknown column type tag {}", field.type_))
            })?;
            columns.push(ColumnDescriptor {
                name: ffi::cstr_to_string(field.name),
                column_type,
                flags: ColumnFlags::from_bits_retain(field.flags),
                charsetnr: field.charsetnr,
            });
        }
        Ok(columns)
    }

    /// Declared placeholder count of the prepared SQL.
    pub fn param_count(&self) -> usize {
        self.params.declared()
    }

    /// Column count of the statement's result shape.
    pub fn field_count(&self) -> usize {
        self.columns.len()
    }

    /// Column descriptors, valid until the next prepare.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Column names by position.
    pub fn field_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn field_info(&self, index: usize) -> Option<FieldInfo> {
        self.columns.get(index).map(|c| FieldInfo {
            name: c.name.clone(),
            kind: c.kind(),
        })
    }

    /// Fill the next parameter slot.
    pub fn bind<P: Into<Param>>(&mut self, param: P) -> Result<()> {
        if self.state != State::Prepared {
            return Err(Error::BadUsageError(
                "parameters can only be bound between prepare and execute".to_owned(),
            ));
        }
        self.params.push(param.into())
    }

    /// Bind all filled parameter slots (when any) and execute.
    #[tracing::instrument(skip_all)]
    pub fn execute(&mut self) -> Result<()> {
        if self.state != State::Prepared {
            return Err(Error::BadUsageError(
                "execute requires a prepared statement (reset it after a previous run)".to_owned(),
            ));
        }
        if self.params.filled() != self.params.declared() {
            return Err(Error::BadUsageError(format!(
                "statement declares {} parameter(s) but {} are bound",
                self.params.declared(),
                self.params.filled()
            )));
        }

        // Statements without placeholders skip the native bind step.
        if !self.params.is_empty() {
            let mut binds = self.params.native_binds();
            // SAFETY: the bind array and every buffer it points to live in
            // self.params, untouched until execute returns.
            if unsafe { ffi::mysql_stmt_bind_param(self.raw.as_ptr(), binds.as_mut_ptr()) } != 0 {
                return Err(Error::Execute(stmt_server_error(self.raw.as_ptr())));
            }
        }

        // SAFETY: the statement is prepared and its parameters are bound.
        if unsafe { ffi::mysql_stmt_execute(self.raw.as_ptr()) } != 0 {
            return Err(Error::Execute(stmt_server_error(self.raw.as_ptr())));
        }
        self.state = State::Executed;
        Ok(())
    }

    /// Open the row cursor over the executed statement's result set.
    ///
    /// Buffers the result client-side and binds one receive cell per
    /// column; truncation of variable-width columns is handled internally
    /// by column-scoped re-fetch.
    pub fn results(&mut self) -> Result<Rows<'_, 'conn>> {
        match self.state {
            State::Executed => {
                self.binder = Some(ResultBinder::bind(self.raw.as_ptr(), &self.columns)?);
                self.state = State::Fetching;
            }
            State::Fetching => {}
            _ => {
                return Err(Error::BadUsageError(
                    "results() requires a successfully executed statement".to_owned(),
                ));
            }
        }
        Ok(Rows { stmt: self })
    }

    /// One fetch step. `Ok(None)` means the cursor is exhausted and its
    /// buffers have been released.
    pub(crate) fn fetch_next(&mut self) -> Result<Option<Vec<Value>>> {
        let Some(binder) = self.binder.as_mut() else {
            // a drained cursor stays drained
            if self.state == State::Exhausted {
                return Ok(None);
            }
            return Err(Error::BadUsageError(
                "no active result cursor to fetch from".to_owned(),
            ));
        };
        match binder.fetch_row(self.raw.as_ptr()) {
            Ok(Some(row)) => Ok(Some(row)),
            Ok(None) => {
                self.release_results();
                self.state = State::Exhausted;
                Ok(None)
            }
            Err(e) => {
                self.release_results();
                self.state = State::Exhausted;
                Err(e)
            }
        }
    }

    pub(crate) fn buffered_row_count(&self) -> u64 {
        self.binder
            .as_ref()
            .map_or(0, |b| b.num_rows(self.raw.as_ptr()))
    }

    /// Rows changed/deleted/inserted by the last execute.
    pub fn affected_rows(&self) -> u64 {
        // SAFETY: the handle is live for the lifetime of self.
        unsafe { ffi::mysql_stmt_affected_rows(self.raw.as_ptr()) }
    }

    /// AUTO_INCREMENT id generated by the last execute.
    pub fn insert_id(&self) -> u64 {
        // SAFETY: the handle is live for the lifetime of self.
        unsafe { ffi::mysql_stmt_insert_id(self.raw.as_ptr()) }
    }

    /// Clear parameter bindings and result state, returning the statement
    /// to its freshly-prepared shape. SQL text and column metadata are
    /// retained; safe to call repeatedly.
    pub fn reset(&mut self) -> Result<()> {
        self.release_results();
        self.params.reset();
        if self.state == State::Unprepared {
            return Ok(());
        }
        // SAFETY: the handle is live; reset discards server-side buffers.
        if unsafe { ffi::mysql_stmt_reset(self.raw.as_ptr()) } != 0 {
            return Err(Error::Execute(stmt_server_error(self.raw.as_ptr())));
        }
        self.state = State::Prepared;
        Ok(())
    }

    /// Drop the result binder (exactly once) and discard any pending
    /// server-side rows.
    fn release_results(&mut self) {
        if self.binder.take().is_some() {
            // SAFETY: the handle is live; free_result is idempotent at the
            // protocol level but we only ever reach it with a live binder.
            let _ = unsafe { ffi::mysql_stmt_free_result(self.raw.as_ptr()) };
        }
    }

    fn free_meta(&mut self) {
        if let Some(meta) = self.meta.take() {
            // SAFETY: meta is live and released exactly once here.
            unsafe { ffi::mysql_free_result(meta.as_ptr()) };
        }
    }
}

impl Drop for Stmt<'_> {
    fn drop(&mut self) {
        // Release order: parameter buffers, result buffers, metadata
        // handle, statement handle.
        self.params.reset();
        self.release_results();
        self.free_meta();
        // SAFETY: the handle is live and not used after this point.
        let _ = unsafe { ffi::mysql_stmt_close(self.raw.as_ptr()) };
    }
}

// SAFETY: the statement handle is confined to the thread that holds the
// &mut; Stmt is !Sync so calls cannot race.
unsafe impl Send for Stmt<'_> {}
