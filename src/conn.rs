use std::ffi::CString;
use std::marker::PhantomData;
use std::os::raw::{c_char, c_uint, c_void};
use std::ptr::NonNull;
use std::sync::Once;

use crate::constant::ConnOption;
use crate::error::{Error, Result, ServerError};
use crate::ffi;
use crate::opts::Opts;
use crate::stmt::Stmt;
use crate::value::text_from_bytes;

static LIBRARY_INIT: Once = Once::new();

/// Process-wide client library initialization, run lazily before the first
/// connection and never torn down.
fn library_init() {
    LIBRARY_INIT.call_once(|| {
        // SAFETY: mysql_server_init is documented safe to call once before
        // any other client call; null argv/groups selects the defaults.
        let _ = unsafe { ffi::mysql_server_init(0, std::ptr::null_mut(), std::ptr::null_mut()) };
    });
}

/// One authenticated session against a MySQL server.
///
/// All calls are synchronous and block until the native library finishes
/// the round trip. A connection may own several prepared statements, but
/// every cursor in this crate buffers its result set up front, so the
/// connection's single result stream is always drained before the next
/// operation starts.
pub struct Conn {
    raw: NonNull<ffi::MYSQL>,
}

// SAFETY: the session handle is only ever used through `&self`/`&mut self`
// from one thread at a time; Conn is !Sync, so no two threads can issue
// calls concurrently without external synchronization.
unsafe impl Send for Conn {}

impl Conn {
    /// Connect with the given options.
    pub fn new<O: TryInto<Opts>>(opts: O) -> Result<Self>
    where
        Error: From<O::Error>,
    {
        let opts: Opts = opts.try_into()?;
        library_init();

        // SAFETY: null asks the library to allocate a fresh handle.
        let raw = unsafe { ffi::mysql_init(std::ptr::null_mut()) };
        let raw = NonNull::new(raw).ok_or_else(|| {
            Error::Connection(ServerError {
                code: 0,
                message: "mysql_init failed (out of memory)".to_owned(),
            })
        })?;

        // From here on the handle must be closed on every failure path.
        let conn = Self { raw };

        conn.set_option_str(ConnOption::CharsetName, opts.charset)?;
        if let Some(init) = opts.init_command.as_deref() {
            conn.set_option_str(ConnOption::InitCommand, init)?;
        }
        if opts.connect_timeout > 0 {
            conn.set_option_u32(ConnOption::ConnectTimeout, opts.connect_timeout)?;
        }

        let host = opts.host.as_deref().map(cstring).transpose()?;
        let user = cstring(&opts.user)?;
        let password = opts.password.as_deref().map(cstring).transpose()?;
        let db = opts.db.as_deref().map(cstring).transpose()?;
        let socket = opts.socket.as_deref().map(cstring).transpose()?;

        // SAFETY: the handle is freshly initialized and every string
        // pointer is either null or a live NUL-terminated buffer.
        let connected = unsafe {
            ffi::mysql_real_connect(
                conn.raw.as_ptr(),
                opt_ptr(&host),
                user.as_ptr(),
                opt_ptr(&password),
                opt_ptr(&db),
                c_uint::from(opts.port),
                opt_ptr(&socket),
                0,
            )
        };
        if connected.is_null() {
            // Drop impl closes the handle.
            return Err(Error::Connection(conn.server_error()));
        }
        tracing::debug!(host = opts.host.as_deref().unwrap_or(""), port = opts.port, "connected");
        Ok(conn)
    }

    pub(crate) fn raw(&self) -> *mut ffi::MYSQL {
        self.raw.as_ptr()
    }

    /// Error number of the most recent failed call.
    pub fn error_code(&self) -> u32 {
        // SAFETY: the handle is live for the lifetime of self.
        unsafe { ffi::mysql_errno(self.raw.as_ptr()) }
    }

    /// Error message of the most recent failed call.
    pub fn error_message(&self) -> String {
        // SAFETY: the handle is live for the lifetime of self.
        ffi::cstr_to_string(unsafe { ffi::mysql_error(self.raw.as_ptr()) })
    }

    pub(crate) fn server_error(&self) -> ServerError {
        ServerError {
            code: self.error_code(),
            message: self.error_message(),
        }
    }

    /// Version string of the linked client library.
    pub fn client_info() -> String {
        library_init();
        // SAFETY: returns a pointer to a static string.
        ffi::cstr_to_string(unsafe { ffi::mysql_get_client_info() })
    }

    /// Numeric server version, e.g. 80036.
    pub fn server_version(&self) -> u64 {
        // SAFETY: the handle is live for the lifetime of self.
        unsafe { ffi::mysql_get_server_version(self.raw.as_ptr()) }
    }

    /// Check that the session is alive.
    pub fn ping(&self) -> Result<()> {
        // SAFETY: the handle is live for the lifetime of self.
        if unsafe { ffi::mysql_ping(self.raw.as_ptr()) } == 0 {
            Ok(())
        } else {
            Err(Error::Execute(self.server_error()))
        }
    }

    pub fn commit(&self) -> Result<()> {
        // SAFETY: the handle is live for the lifetime of self.
        if unsafe { ffi::mysql_commit(self.raw.as_ptr()) } == 0 {
            Ok(())
        } else {
            Err(Error::Execute(self.server_error()))
        }
    }

    pub fn rollback(&self) -> Result<()> {
        // SAFETY: the handle is live for the lifetime of self.
        if unsafe { ffi::mysql_rollback(self.raw.as_ptr()) } == 0 {
            Ok(())
        } else {
            Err(Error::Execute(self.server_error()))
        }
    }

    /// Rows changed/deleted/inserted by the last text-protocol statement.
    pub fn affected_rows(&self) -> u64 {
        // SAFETY: the handle is live for the lifetime of self.
        unsafe { ffi::mysql_affected_rows(self.raw.as_ptr()) }
    }

    /// AUTO_INCREMENT id generated by the last text-protocol statement.
    pub fn last_insert_id(&self) -> u64 {
        // SAFETY: the handle is live for the lifetime of self.
        unsafe { ffi::mysql_insert_id(self.raw.as_ptr()) }
    }

    /// Execute a text-protocol statement and buffer its result set.
    ///
    /// Statements that return no result set (DDL, transaction control)
    /// yield an empty cursor.
    #[tracing::instrument(skip_all)]
    pub fn query(&self, sql: &str) -> Result<TextRows<'_>> {
        self.run_query(sql)?;
        // SAFETY: a query just succeeded on this live handle.
        let res = unsafe { ffi::mysql_store_result(self.raw.as_ptr()) };
        match NonNull::new(res) {
            Some(res) => Ok(TextRows::new(res)),
            None if self.error_code() == 0 => Ok(TextRows::empty()),
            None => Err(Error::Execute(self.server_error())),
        }
    }

    /// Execute a text-protocol statement and discard any result set.
    #[tracing::instrument(skip_all)]
    pub fn query_drop(&self, sql: &str) -> Result<()> {
        self.run_query(sql)?;
        // SAFETY: a query just succeeded on this live handle; freeing a
        // null result is a no-op.
        unsafe {
            let res = ffi::mysql_store_result(self.raw.as_ptr());
            if !res.is_null() {
                ffi::mysql_free_result(res);
            }
        }
        Ok(())
    }

    fn run_query(&self, sql: &str) -> Result<()> {
        // SAFETY: the handle is live and the query buffer is valid for the
        // given byte length (no NUL termination required).
        let rc = unsafe {
            ffi::mysql_real_query(
                self.raw.as_ptr(),
                sql.as_ptr().cast::<c_char>(),
                sql.len() as std::os::raw::c_ulong,
            )
        };
        if rc == 0 {
            Ok(())
        } else {
            Err(Error::Execute(self.server_error()))
        }
    }

    /// Allocate a statement handle and prepare `sql` on it.
    pub fn prepare(&self, sql: &str) -> Result<Stmt<'_>> {
        let mut stmt = Stmt::new(self)?;
        stmt.prepare(sql)?;
        Ok(stmt)
    }

    fn set_option_str(&self, option: ConnOption, value: &str) -> Result<()> {
        let value = cstring(value)?;
        // SAFETY: option maps to a native constant taking a C string.
        let rc = unsafe {
            ffi::mysql_options(
                self.raw.as_ptr(),
                option.to_native(),
                value.as_ptr().cast::<c_void>(),
            )
        };
        option_result(rc, option)
    }

    fn set_option_u32(&self, option: ConnOption, value: u32) -> Result<()> {
        // SAFETY: option maps to a native constant taking an unsigned int.
        let rc = unsafe {
            ffi::mysql_options(
                self.raw.as_ptr(),
                option.to_native(),
                std::ptr::from_ref(&value).cast::<c_void>(),
            )
        };
        option_result(rc, option)
    }
}

impl Drop for Conn {
    fn drop(&mut self) {
        // SAFETY: the handle is live and not used after this point.
        unsafe { ffi::mysql_close(self.raw.as_ptr()) };
    }
}

fn option_result(rc: std::os::raw::c_int, option: ConnOption) -> Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(Error::BadConfigError(format!("unsupported option {:?}", option)))
    }
}

fn cstring(s: &str) -> Result<CString> {
    CString::new(s).map_err(|_| Error::BadConfigError(format!("interior NUL byte in `{}`", s)))
}

fn opt_ptr(s: &Option<CString>) -> *const c_char {
    s.as_ref().map_or(std::ptr::null(), |s| s.as_ptr())
}

/// Buffered cursor over a text-protocol result set. Every cell arrives as
/// the server's text rendering; NULL cells are `None`.
pub struct TextRows<'conn> {
    res: Option<NonNull<ffi::MYSQL_RES>>,
    num_fields: usize,
    _conn: PhantomData<&'conn Conn>,
}

impl<'conn> TextRows<'conn> {
    fn new(res: NonNull<ffi::MYSQL_RES>) -> Self {
        // SAFETY: res is a live stored result set.
        let num_fields = unsafe { ffi::mysql_num_fields(res.as_ptr()) } as usize;
        Self {
            res: Some(res),
            num_fields,
            _conn: PhantomData,
        }
    }

    fn empty() -> Self {
        Self {
            res: None,
            num_fields: 0,
            _conn: PhantomData,
        }
    }

    pub fn num_fields(&self) -> usize {
        self.num_fields
    }

    pub fn num_rows(&self) -> u64 {
        match self.res {
            // SAFETY: res is a live stored result set.
            Some(res) => unsafe { ffi::mysql_num_rows(res.as_ptr()) },
            None => 0,
        }
    }
}

impl Iterator for TextRows<'_> {
    type Item = Vec<Option<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        let res = self.res?;
        // SAFETY: res is a live stored result set; fetch_row returns null
        // at end of data, and lengths are valid right after a fetch.
        unsafe {
            let row = ffi::mysql_fetch_row(res.as_ptr());
            if row.is_null() {
                return None;
            }
            let lengths = ffi::mysql_fetch_lengths(res.as_ptr());
            let mut cells = Vec::with_capacity(self.num_fields);
            for i in 0..self.num_fields {
                let cell = *row.add(i);
                if cell.is_null() {
                    cells.push(None);
                } else {
                    let len = *lengths.add(i) as usize;
                    let bytes = std::slice::from_raw_parts(cell.cast::<u8>(), len);
                    cells.push(Some(text_from_bytes(bytes)));
                }
            }
            Some(cells)
        }
    }
}

impl Drop for TextRows<'_> {
    fn drop(&mut self) {
        if let Some(res) = self.res.take() {
            // SAFETY: res is live and released exactly once here.
            unsafe { ffi::mysql_free_result(res.as_ptr()) };
        }
    }
}
