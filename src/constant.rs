use bitflags::bitflags;

use crate::ffi::enum_field_types;

/// Charset number the server uses to mark a blob-family column as raw
/// binary rather than text.
pub const BINARY_CHARSET_NR: u32 = 63;

/// MySQL column types as used by column metadata and bind slots.
///
/// Values match the native `enum_field_types` constants.
#[allow(non_camel_case_types)]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    MYSQL_TYPE_DECIMAL = 0,
    MYSQL_TYPE_TINY = 1,
    MYSQL_TYPE_SHORT = 2,
    MYSQL_TYPE_LONG = 3,
    MYSQL_TYPE_FLOAT = 4,
    MYSQL_TYPE_DOUBLE = 5,
    MYSQL_TYPE_NULL = 6,
    MYSQL_TYPE_TIMESTAMP = 7,
    MYSQL_TYPE_LONGLONG = 8,
    MYSQL_TYPE_INT24 = 9,
    MYSQL_TYPE_DATE = 10,
    MYSQL_TYPE_TIME = 11,
    MYSQL_TYPE_DATETIME = 12,
    MYSQL_TYPE_YEAR = 13,
    MYSQL_TYPE_NEWDATE = 14,
    MYSQL_TYPE_VARCHAR = 15,
    MYSQL_TYPE_BIT = 16,
    MYSQL_TYPE_TIMESTAMP2 = 17,
    MYSQL_TYPE_DATETIME2 = 18,
    MYSQL_TYPE_TIME2 = 19,
    MYSQL_TYPE_TYPED_ARRAY = 20,
    MYSQL_TYPE_JSON = 245,
    MYSQL_TYPE_NEWDECIMAL = 246,
    MYSQL_TYPE_ENUM = 247,
    MYSQL_TYPE_SET = 248,
    MYSQL_TYPE_TINY_BLOB = 249,
    MYSQL_TYPE_MEDIUM_BLOB = 250,
    MYSQL_TYPE_LONG_BLOB = 251,
    MYSQL_TYPE_BLOB = 252,
    MYSQL_TYPE_VAR_STRING = 253,
    MYSQL_TYPE_STRING = 254,
    MYSQL_TYPE_GEOMETRY = 255,
}

impl ColumnType {
    pub fn from_native(value: enum_field_types) -> Option<Self> {
        match value {
            0 => Some(Self::MYSQL_TYPE_DECIMAL),
            1 => Some(Self::MYSQL_TYPE_TINY),
            2 => Some(Self::MYSQL_TYPE_SHORT),
            3 => Some(Self::MYSQL_TYPE_LONG),
            4 => Some(Self::MYSQL_TYPE_FLOAT),
            5 => Some(Self::MYSQL_TYPE_DOUBLE),
            6 => Some(Self::MYSQL_TYPE_NULL),
            7 => Some(Self::MYSQL_TYPE_TIMESTAMP),
            8 => Some(Self::MYSQL_TYPE_LONGLONG),
            9 => Some(Self::MYSQL_TYPE_INT24),
            10 => Some(Self::MYSQL_TYPE_DATE),
            11 => Some(Self::MYSQL_TYPE_TIME),
            12 => Some(Self::MYSQL_TYPE_DATETIME),
            13 => Some(Self::MYSQL_TYPE_YEAR),
            14 => Some(Self::MYSQL_TYPE_NEWDATE),
            15 => Some(Self::MYSQL_TYPE_VARCHAR),
            16 => Some(Self::MYSQL_TYPE_BIT),
            17 => Some(Self::MYSQL_TYPE_TIMESTAMP2),
            18 => Some(Self::MYSQL_TYPE_DATETIME2),
            19 => Some(Self::MYSQL_TYPE_TIME2),
            20 => Some(Self::MYSQL_TYPE_TYPED_ARRAY),
            245 => Some(Self::MYSQL_TYPE_JSON),
            246 => Some(Self::MYSQL_TYPE_NEWDECIMAL),
            247 => Some(Self::MYSQL_TYPE_ENUM),
            248 => Some(Self::MYSQL_TYPE_SET),
            249 => Some(Self::MYSQL_TYPE_TINY_BLOB),
            250 => Some(Self::MYSQL_TYPE_MEDIUM_BLOB),
            251 => Some(Self::MYSQL_TYPE_LONG_BLOB),
            252 => Some(Self::MYSQL_TYPE_BLOB),
            253 => Some(Self::MYSQL_TYPE_VAR_STRING),
            254 => Some(Self::MYSQL_TYPE_STRING),
            255 => Some(Self::MYSQL_TYPE_GEOMETRY),
            _ => None,
        }
    }

    pub fn to_native(self) -> enum_field_types {
        self as enum_field_types
    }
}

bitflags! {
    /// Column definition flags from statement metadata.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ColumnFlags: u32 {
        const NOT_NULL_FLAG = 0x0001;
        const PRI_KEY_FLAG = 0x0002;
        const UNIQUE_KEY_FLAG = 0x0004;
        const MULTIPLE_KEY_FLAG = 0x0008;
        const BLOB_FLAG = 0x0010;
        const UNSIGNED_FLAG = 0x0020;
        const ZEROFILL_FLAG = 0x0040;
        const BINARY_FLAG = 0x0080;
        const ENUM_FLAG = 0x0100;
        const AUTO_INCREMENT_FLAG = 0x0200;
        const TIMESTAMP_FLAG = 0x0400;
        const SET_FLAG = 0x0800;
        const NO_DEFAULT_VALUE_FLAG = 0x1000;
        const ON_UPDATE_NOW_FLAG = 0x2000;
        const NUM_FLAG = 0x8000;
    }
}

/// Connect-time options exposed to callers.
///
/// A closed subset of the native `mysql_option` enum whose numbering is
/// stable across libmysqlclient and libmariadb.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnOption {
    ConnectTimeout,
    Compress,
    NamedPipe,
    InitCommand,
    ReadDefaultFile,
    ReadDefaultGroup,
    CharsetDir,
    CharsetName,
    LocalInfile,
    Protocol,
}

impl ConnOption {
    /// Total mapping to the native option constant.
    pub fn to_native(self) -> u32 {
        match self {
            Self::ConnectTimeout => 0,
            Self::Compress => 1,
            Self::NamedPipe => 2,
            Self::InitCommand => 3,
            Self::ReadDefaultFile => 4,
            Self::ReadDefaultGroup => 5,
            Self::CharsetDir => 6,
            Self::CharsetName => 7,
            Self::LocalInfile => 8,
            Self::Protocol => 9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_type_roundtrip() {
        for code in (0u32..=20).chain(245..=255) {
            let tag = ColumnType::from_native(code).unwrap();
            assert_eq!(tag.to_native(), code);
        }
    }

    #[test]
    fn unknown_column_type() {
        assert_eq!(ColumnType::from_native(21), None);
        assert_eq!(ColumnType::from_native(244), None);
    }

    #[test]
    fn unsigned_flag_value() {
        // matches the native UNSIGNED_FLAG constant
        assert_eq!(ColumnFlags::UNSIGNED_FLAG.bits(), 32);
        assert_eq!(ColumnFlags::BINARY_FLAG.bits(), 128);
    }
}
