use std::os::raw::{c_ulong, c_void};

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::constant::ColumnType;
use crate::error::{Error, Result};
use crate::ffi;

/// Format date/time values cross the client boundary in.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A value bindable to one prepared-statement placeholder.
///
/// Every variant maps to exactly one wire type tag. Strings are transmitted
/// NUL-terminated with the terminator excluded from the transmitted length.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    TinyInt(i8),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    UnsignedTinyInt(u8),
    UnsignedSmallInt(u16),
    UnsignedInt(u32),
    UnsignedBigInt(u64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
    Uuid(Uuid),
}

impl From<i8> for Param {
    fn from(v: i8) -> Self {
        Param::TinyInt(v)
    }
}
impl From<i16> for Param {
    fn from(v: i16) -> Self {
        Param::SmallInt(v)
    }
}
impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Int(v)
    }
}
impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::BigInt(v)
    }
}
impl From<u8> for Param {
    fn from(v: u8) -> Self {
        Param::UnsignedTinyInt(v)
    }
}
impl From<u16> for Param {
    fn from(v: u16) -> Self {
        Param::UnsignedSmallInt(v)
    }
}
impl From<u32> for Param {
    fn from(v: u32) -> Self {
        Param::UnsignedInt(v)
    }
}
impl From<u64> for Param {
    fn from(v: u64) -> Self {
        Param::UnsignedBigInt(v)
    }
}
impl From<f32> for Param {
    fn from(v: f32) -> Self {
        Param::Float(v)
    }
}
impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Double(v)
    }
}
impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::TinyInt(v.into())
    }
}
impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Text(v.to_owned())
    }
}
impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Text(v)
    }
}
impl From<&[u8]> for Param {
    fn from(v: &[u8]) -> Self {
        Param::Bytes(v.to_vec())
    }
}
impl From<Vec<u8>> for Param {
    fn from(v: Vec<u8>) -> Self {
        Param::Bytes(v)
    }
}
impl From<NaiveDateTime> for Param {
    fn from(v: NaiveDateTime) -> Self {
        Param::DateTime(v)
    }
}
impl From<Uuid> for Param {
    fn from(v: Uuid) -> Self {
        Param::Uuid(v)
    }
}
impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        v.map_or(Param::Null, Into::into)
    }
}

/// One filled placeholder: wire type tag, owned payload, transmitted
/// length, signedness, null marker.
#[derive(Debug)]
pub(crate) struct ParamSlot {
    tag: ColumnType,
    unsigned: bool,
    null: bool,
    /// Owned payload bytes. Strings carry a trailing NUL that `wire_len`
    /// excludes.
    buf: Vec<u8>,
    /// Length handed to the library through the bind slot's length pointer.
    wire_len: c_ulong,
}

impl ParamSlot {
    fn encode(param: Param) -> Self {
        fn text_slot(s: String) -> ParamSlot {
            let mut buf = s.into_bytes();
            let wire_len = buf.len() as c_ulong;
            buf.push(0);
            ParamSlot {
                tag: ColumnType::MYSQL_TYPE_VAR_STRING,
                unsigned: false,
                null: false,
                buf,
                wire_len,
            }
        }
        fn scalar_slot(tag: ColumnType, unsigned: bool, buf: Vec<u8>) -> ParamSlot {
            let wire_len = buf.len() as c_ulong;
            ParamSlot {
                tag,
                unsigned,
                null: false,
                buf,
                wire_len,
            }
        }
        match param {
            Param::Null => ParamSlot {
                tag: ColumnType::MYSQL_TYPE_NULL,
                unsigned: false,
                null: true,
                buf: Vec::new(),
                wire_len: 0,
            },
            Param::TinyInt(v) => {
                scalar_slot(ColumnType::MYSQL_TYPE_TINY, false, v.to_ne_bytes().to_vec())
            }
            Param::SmallInt(v) => {
                scalar_slot(ColumnType::MYSQL_TYPE_SHORT, false, v.to_ne_bytes().to_vec())
            }
            Param::Int(v) => {
                scalar_slot(ColumnType::MYSQL_TYPE_LONG, false, v.to_ne_bytes().to_vec())
            }
            Param::BigInt(v) => {
                scalar_slot(ColumnType::MYSQL_TYPE_LONGLONG, false, v.to_ne_bytes().to_vec())
            }
            Param::UnsignedTinyInt(v) => {
                scalar_slot(ColumnType::MYSQL_TYPE_TINY, true, v.to_ne_bytes().to_vec())
            }
            Param::UnsignedSmallInt(v) => {
                scalar_slot(ColumnType::MYSQL_TYPE_SHORT, true, v.to_ne_bytes().to_vec())
            }
            Param::UnsignedInt(v) => {
                scalar_slot(ColumnType::MYSQL_TYPE_LONG, true, v.to_ne_bytes().to_vec())
            }
            Param::UnsignedBigInt(v) => {
                scalar_slot(ColumnType::MYSQL_TYPE_LONGLONG, true, v.to_ne_bytes().to_vec())
            }
            Param::Float(v) => {
                scalar_slot(ColumnType::MYSQL_TYPE_FLOAT, false, v.to_ne_bytes().to_vec())
            }
            Param::Double(v) => {
                scalar_slot(ColumnType::MYSQL_TYPE_DOUBLE, false, v.to_ne_bytes().to_vec())
            }
            Param::Text(s) => text_slot(s),
            Param::Bytes(b) => scalar_slot(ColumnType::MYSQL_TYPE_LONG_BLOB, false, b),
            Param::DateTime(dt) => text_slot(dt.format(DATETIME_FORMAT).to_string()),
            Param::Uuid(u) => text_slot(u.hyphenated().to_string()),
        }
    }

    #[cfg(test)]
    fn tag(&self) -> ColumnType {
        self.tag
    }

    #[cfg(test)]
    fn payload(&self) -> &[u8] {
        &self.buf
    }

    #[cfg(test)]
    fn wire_len(&self) -> c_ulong {
        self.wire_len
    }
}

/// The set of parameter bind slots owned by one prepared statement.
///
/// Slots are filled left-to-right. Every byte is owned by the set, so
/// `reset` frees everything and repeated prepare/bind/reset cycles cannot
/// leak.
#[derive(Debug, Default)]
pub struct ParamBindSet {
    slots: Vec<ParamSlot>,
    declared: usize,
}

impl ParamBindSet {
    pub(crate) fn new(declared: usize) -> Self {
        Self {
            slots: Vec::with_capacity(declared),
            declared,
        }
    }

    /// Number of placeholders the prepared statement declared.
    pub fn declared(&self) -> usize {
        self.declared
    }

    /// Number of slots filled so far.
    pub fn filled(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Fill the next slot. Filling past the declared placeholder count is
    /// an error.
    pub(crate) fn push(&mut self, param: Param) -> Result<()> {
        if self.slots.len() == self.declared {
            return Err(Error::BadUsageError(format!(
                "statement declares {} parameter(s), refusing to bind another",
                self.declared
            )));
        }
        self.slots.push(ParamSlot::encode(param));
        Ok(())
    }

    /// Release every slot's buffer and return to zero slots used. Safe to
    /// call repeatedly.
    pub(crate) fn reset(&mut self) {
        self.slots.clear();
    }

    /// Build the native bind array. Buffer and length pointers reference
    /// memory owned by `self`, which must outlive both the bind-param call
    /// and the subsequent execute.
    pub(crate) fn native_binds(&mut self) -> Vec<ffi::MYSQL_BIND> {
        self.slots
            .iter_mut()
            .map(|slot| {
                let mut bind = ffi::MYSQL_BIND::zeroed();
                bind.buffer_type = slot.tag.to_native();
                bind.is_unsigned = ffi::my_bool::from(slot.unsigned);
                if !slot.null {
                    bind.buffer = slot.buf.as_mut_ptr().cast::<c_void>();
                    bind.buffer_length = slot.wire_len;
                    bind.length = &mut slot.wire_len;
                }
                bind
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn string_is_nul_terminated_with_length_excluding_it() {
        let slot = ParamSlot::encode(Param::from("abc"));
        assert_eq!(slot.tag(), ColumnType::MYSQL_TYPE_VAR_STRING);
        assert_eq!(slot.payload(), b"abc\0");
        assert_eq!(slot.wire_len(), 3);
    }

    #[test]
    fn blob_length_is_exact() {
        let slot = ParamSlot::encode(Param::from(vec![1u8, 2, 3, 4]));
        assert_eq!(slot.tag(), ColumnType::MYSQL_TYPE_LONG_BLOB);
        assert_eq!(slot.payload(), &[1, 2, 3, 4]);
        assert_eq!(slot.wire_len(), 4);
    }

    #[test]
    fn integer_tags_and_widths() {
        let cases: &[(Param, ColumnType, usize)] = &[
            (Param::from(-1i8), ColumnType::MYSQL_TYPE_TINY, 1),
            (Param::from(-1i16), ColumnType::MYSQL_TYPE_SHORT, 2),
            (Param::from(-1i32), ColumnType::MYSQL_TYPE_LONG, 4),
            (Param::from(-1i64), ColumnType::MYSQL_TYPE_LONGLONG, 8),
            (Param::from(255u8), ColumnType::MYSQL_TYPE_TINY, 1),
            (Param::from(u64::MAX), ColumnType::MYSQL_TYPE_LONGLONG, 8),
            (Param::from(0.5f32), ColumnType::MYSQL_TYPE_FLOAT, 4),
            (Param::from(0.5f64), ColumnType::MYSQL_TYPE_DOUBLE, 8),
        ];
        for (param, tag, width) in cases {
            let slot = ParamSlot::encode(param.clone());
            assert_eq!(slot.tag(), *tag);
            assert_eq!(slot.payload().len(), *width);
        }
    }

    #[test]
    fn option_binds_null() {
        let slot = ParamSlot::encode(Param::from(None::<i32>));
        assert_eq!(slot.tag(), ColumnType::MYSQL_TYPE_NULL);
        assert!(slot.payload().is_empty());
        let slot = ParamSlot::encode(Param::from(Some(7i32)));
        assert_eq!(slot.tag(), ColumnType::MYSQL_TYPE_LONG);
    }

    #[test]
    fn datetime_crosses_as_text() {
        let dt = chrono::NaiveDate::from_ymd_opt(2001, 2, 3)
            .unwrap()
            .and_hms_opt(4, 5, 6)
            .unwrap();
        let slot = ParamSlot::encode(Param::from(dt));
        assert_eq!(slot.tag(), ColumnType::MYSQL_TYPE_VAR_STRING);
        assert_eq!(slot.payload(), b"2001-02-03 04:05:06\0");
        assert_eq!(slot.wire_len(), 19);
    }

    #[test]
    fn bind_past_declared_count_is_rejected() {
        let mut set = ParamBindSet::new(1);
        set.push(Param::from(1i32)).unwrap();
        let err = set.push(Param::from(2i32)).unwrap_err();
        assert!(matches!(err, Error::BadUsageError(_)));
        assert_eq!(set.filled(), 1);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut set = ParamBindSet::new(2);
        set.reset();
        set.push(Param::from("x")).unwrap();
        set.push(Param::Null).unwrap();
        assert_eq!(set.filled(), 2);
        set.reset();
        set.reset();
        assert_eq!(set.filled(), 0);
        assert_eq!(set.declared(), 2);
        // slots are reusable from zero after reset
        set.push(Param::from(1u8)).unwrap();
        assert_eq!(set.filled(), 1);
    }

    #[test]
    fn native_binds_mark_unsigned() {
        let mut set = ParamBindSet::new(2);
        set.push(Param::from(1u32)).unwrap();
        set.push(Param::from(1i32)).unwrap();
        let binds = set.native_binds();
        assert_eq!(binds[0].is_unsigned, 1);
        assert_eq!(binds[1].is_unsigned, 0);
        assert_eq!(binds[0].buffer_length, 4);
    }
}
