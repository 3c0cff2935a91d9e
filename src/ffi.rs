//! Raw bindings for the subset of the native MySQL client ABI this crate
//! uses.
//!
//! Declared in-crate rather than through a generated `-sys` layer: the
//! surface is small and the two deployed ABI flavors (libmysqlclient 8.x
//! with C99 `bool`, libmariadb with `my_bool` as `char`) agree on struct
//! layout once boolean fields are carried as one-byte integers.
//!
//! Everything here is `unsafe`; the safe wrappers live in [`crate::conn`],
//! [`crate::stmt`] and [`crate::rows`].

#![allow(non_camel_case_types)]
#![allow(clippy::upper_case_acronyms, clippy::too_many_arguments)]

use std::os::raw::{c_char, c_int, c_uint, c_ulong, c_void};

/// One-byte boolean, ABI-compatible with both `my_bool` and C99 `bool`.
pub type my_bool = c_char;

/// Native wire type tag (`enum_field_types`).
pub type enum_field_types = c_uint;

/// `mysql_stmt_fetch` return: result set exhausted.
pub const MYSQL_NO_DATA: c_int = 100;
/// `mysql_stmt_fetch` return: at least one bound buffer was too small.
pub const MYSQL_DATA_TRUNCATED: c_int = 101;

/// Opaque session handle.
#[repr(C)]
pub struct MYSQL {
    _opaque: [u8; 0],
}

/// Opaque prepared-statement handle.
#[repr(C)]
pub struct MYSQL_STMT {
    _opaque: [u8; 0],
}

/// Opaque result-set / result-metadata handle.
#[repr(C)]
pub struct MYSQL_RES {
    _opaque: [u8; 0],
}

/// Column metadata as exposed by `mysql_fetch_field_direct`.
///
/// Field order matches both libmysqlclient 8.x and libmariadb.
#[repr(C)]
#[derive(Debug)]
pub struct MYSQL_FIELD {
    pub name: *mut c_char,
    pub org_name: *mut c_char,
    pub table: *mut c_char,
    pub org_table: *mut c_char,
    pub db: *mut c_char,
    pub catalog: *mut c_char,
    pub def: *mut c_char,
    pub length: c_ulong,
    pub max_length: c_ulong,
    pub name_length: c_uint,
    pub org_name_length: c_uint,
    pub table_length: c_uint,
    pub org_table_length: c_uint,
    pub db_length: c_uint,
    pub catalog_length: c_uint,
    pub def_length: c_uint,
    pub flags: c_uint,
    pub decimals: c_uint,
    pub charsetnr: c_uint,
    pub type_: enum_field_types,
    pub extension: *mut c_void,
}

/// One parameter or result binding slot.
///
/// The three callback slots are populated by the library itself after
/// `mysql_stmt_bind_*`; this crate only ever zero-initializes them.
#[repr(C)]
#[derive(Debug)]
pub struct MYSQL_BIND {
    pub length: *mut c_ulong,
    pub is_null: *mut my_bool,
    pub buffer: *mut c_void,
    pub error: *mut my_bool,
    pub row_ptr: *mut u8,
    pub store_param_func: *mut c_void,
    pub fetch_result: *mut c_void,
    pub skip_result: *mut c_void,
    pub buffer_length: c_ulong,
    pub offset: c_ulong,
    pub length_value: c_ulong,
    pub param_number: c_uint,
    pub pack_length: c_uint,
    pub buffer_type: enum_field_types,
    pub error_value: my_bool,
    pub is_unsigned: my_bool,
    pub long_data_used: my_bool,
    pub is_null_value: my_bool,
    pub extension: *mut c_void,
}

impl MYSQL_BIND {
    /// A fully zeroed slot, the required starting point before filling in
    /// buffer/type fields.
    pub fn zeroed() -> Self {
        // SAFETY: MYSQL_BIND is repr(C) with only integer and pointer
        // fields; the all-zero bit pattern is the documented initial state.
        unsafe { std::mem::zeroed() }
    }
}

#[link(name = "mysqlclient")]
unsafe extern "C" {
    // library + session
    pub fn mysql_server_init(
        argc: c_int,
        argv: *mut *mut c_char,
        groups: *mut *mut c_char,
    ) -> c_int;
    pub fn mysql_init(mysql: *mut MYSQL) -> *mut MYSQL;
    pub fn mysql_close(mysql: *mut MYSQL);
    pub fn mysql_options(mysql: *mut MYSQL, option: c_uint, arg: *const c_void) -> c_int;
    pub fn mysql_real_connect(
        mysql: *mut MYSQL,
        host: *const c_char,
        user: *const c_char,
        passwd: *const c_char,
        db: *const c_char,
        port: c_uint,
        unix_socket: *const c_char,
        client_flag: c_ulong,
    ) -> *mut MYSQL;
    pub fn mysql_errno(mysql: *mut MYSQL) -> c_uint;
    pub fn mysql_error(mysql: *mut MYSQL) -> *const c_char;
    pub fn mysql_ping(mysql: *mut MYSQL) -> c_int;
    pub fn mysql_get_client_info() -> *const c_char;
    pub fn mysql_get_server_version(mysql: *mut MYSQL) -> c_ulong;
    pub fn mysql_commit(mysql: *mut MYSQL) -> my_bool;
    pub fn mysql_rollback(mysql: *mut MYSQL) -> my_bool;
    pub fn mysql_insert_id(mysql: *mut MYSQL) -> u64;
    pub fn mysql_affected_rows(mysql: *mut MYSQL) -> u64;

    // text protocol
    pub fn mysql_real_query(mysql: *mut MYSQL, stmt: *const c_char, length: c_ulong) -> c_int;
    pub fn mysql_store_result(mysql: *mut MYSQL) -> *mut MYSQL_RES;
    pub fn mysql_free_result(result: *mut MYSQL_RES);
    pub fn mysql_num_rows(result: *mut MYSQL_RES) -> u64;
    pub fn mysql_num_fields(result: *mut MYSQL_RES) -> c_uint;
    pub fn mysql_fetch_row(result: *mut MYSQL_RES) -> *mut *mut c_char;
    pub fn mysql_fetch_lengths(result: *mut MYSQL_RES) -> *mut c_ulong;
    pub fn mysql_fetch_field_direct(result: *mut MYSQL_RES, fieldnr: c_uint) -> *mut MYSQL_FIELD;

    // prepared statements
    pub fn mysql_stmt_init(mysql: *mut MYSQL) -> *mut MYSQL_STMT;
    pub fn mysql_stmt_prepare(stmt: *mut MYSQL_STMT, query: *const c_char, length: c_ulong)
    -> c_int;
    pub fn mysql_stmt_param_count(stmt: *mut MYSQL_STMT) -> c_ulong;
    pub fn mysql_stmt_field_count(stmt: *mut MYSQL_STMT) -> c_uint;
    pub fn mysql_stmt_result_metadata(stmt: *mut MYSQL_STMT) -> *mut MYSQL_RES;
    pub fn mysql_stmt_bind_param(stmt: *mut MYSQL_STMT, binds: *mut MYSQL_BIND) -> my_bool;
    pub fn mysql_stmt_bind_result(stmt: *mut MYSQL_STMT, binds: *mut MYSQL_BIND) -> my_bool;
    pub fn mysql_stmt_execute(stmt: *mut MYSQL_STMT) -> c_int;
    pub fn mysql_stmt_store_result(stmt: *mut MYSQL_STMT) -> c_int;
    pub fn mysql_stmt_fetch(stmt: *mut MYSQL_STMT) -> c_int;
    pub fn mysql_stmt_fetch_column(
        stmt: *mut MYSQL_STMT,
        bind: *mut MYSQL_BIND,
        column: c_uint,
        offset: c_ulong,
    ) -> c_int;
    pub fn mysql_stmt_free_result(stmt: *mut MYSQL_STMT) -> my_bool;
    pub fn mysql_stmt_reset(stmt: *mut MYSQL_STMT) -> my_bool;
    pub fn mysql_stmt_close(stmt: *mut MYSQL_STMT) -> my_bool;
    pub fn mysql_stmt_errno(stmt: *mut MYSQL_STMT) -> c_uint;
    pub fn mysql_stmt_error(stmt: *mut MYSQL_STMT) -> *const c_char;
    pub fn mysql_stmt_affected_rows(stmt: *mut MYSQL_STMT) -> u64;
    pub fn mysql_stmt_insert_id(stmt: *mut MYSQL_STMT) -> u64;
    pub fn mysql_stmt_num_rows(stmt: *mut MYSQL_STMT) -> u64;
}

/// Reads a NUL-terminated C string into an owned `String`, replacing
/// invalid UTF-8. Returns an empty string for a null pointer.
pub fn cstr_to_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: the caller hands us a pointer the client library documents as
    // a NUL-terminated string valid for the duration of the call.
    let bytes = unsafe { std::ffi::CStr::from_ptr(ptr) }.to_bytes();
    crate::value::text_from_bytes(bytes)
}
