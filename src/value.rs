use zerocopy::FromBytes;

use crate::constant::{BINARY_CHARSET_NR, ColumnFlags, ColumnType};
use crate::error::{Error, Result, eyre};

/// A single decoded column value.
///
/// Integer variants carry the exact width and signedness the column
/// declared; widths are never silently widened or narrowed. DATE, TIME,
/// DATETIME, TIMESTAMP and YEAR columns cross the boundary in the server's
/// text form (`Value::Date`), DECIMAL/NEWDECIMAL as `Value::Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
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
    Date(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::TinyInt(_) => "tinyint",
            Value::SmallInt(_) => "smallint",
            Value::Int(_) => "int",
            Value::BigInt(_) => "bigint",
            Value::UnsignedTinyInt(_) => "tinyint unsigned",
            Value::UnsignedSmallInt(_) => "smallint unsigned",
            Value::UnsignedInt(_) => "int unsigned",
            Value::UnsignedBigInt(_) => "bigint unsigned",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
        }
    }

    /// Any signed integer width, widened.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::TinyInt(v) => Some(v.into()),
            Value::SmallInt(v) => Some(v.into()),
            Value::Int(v) => Some(v.into()),
            Value::BigInt(v) => Some(v),
            _ => None,
        }
    }

    /// Any unsigned integer width, widened.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::UnsignedTinyInt(v) => Some(v.into()),
            Value::UnsignedSmallInt(v) => Some(v.into()),
            Value::UnsignedInt(v) => Some(v.into()),
            Value::UnsignedBigInt(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }

    /// TINYINT as boolean, the conventional MySQL bool encoding.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::TinyInt(v) => Some(v != 0),
            Value::UnsignedTinyInt(v) => Some(v != 0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Date(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// General decoding category of a column, derived from its wire type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Double,
    Bytes,
    String,
    Date,
    Null,
}

impl FieldKind {
    /// Classify a column.
    ///
    /// Blob-family tags count as `Bytes` only when the column's charset
    /// marks it binary; otherwise they are text. DECIMAL family decodes as
    /// text (no arbitrary-precision decoding).
    pub fn classify(column_type: ColumnType, charsetnr: u32) -> Self {
        use ColumnType::*;
        match column_type {
            MYSQL_TYPE_NULL => FieldKind::Null,
            MYSQL_TYPE_FLOAT | MYSQL_TYPE_DOUBLE => FieldKind::Double,
            MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_LONG | MYSQL_TYPE_INT24
            | MYSQL_TYPE_LONGLONG => FieldKind::Integer,
            MYSQL_TYPE_TIMESTAMP | MYSQL_TYPE_DATE | MYSQL_TYPE_TIME | MYSQL_TYPE_DATETIME
            | MYSQL_TYPE_YEAR | MYSQL_TYPE_NEWDATE | MYSQL_TYPE_TIMESTAMP2
            | MYSQL_TYPE_DATETIME2 | MYSQL_TYPE_TIME2 => FieldKind::Date,
            MYSQL_TYPE_TINY_BLOB | MYSQL_TYPE_MEDIUM_BLOB | MYSQL_TYPE_LONG_BLOB
            | MYSQL_TYPE_BLOB => {
                if charsetnr == BINARY_CHARSET_NR {
                    FieldKind::Bytes
                } else {
                    FieldKind::String
                }
            }
            _ => FieldKind::String,
        }
    }
}

/// Exact native receive-buffer size for fixed-width types, `None` for
/// variable-width types that are fetched column-by-column.
pub fn fixed_buffer_len(column_type: ColumnType) -> Option<usize> {
    use ColumnType::*;
    match column_type {
        MYSQL_TYPE_TINY => Some(1),
        MYSQL_TYPE_SHORT => Some(2),
        MYSQL_TYPE_LONG | MYSQL_TYPE_INT24 | MYSQL_TYPE_FLOAT => Some(4),
        MYSQL_TYPE_LONGLONG | MYSQL_TYPE_DOUBLE => Some(8),
        _ => None,
    }
}

/// Decode a fixed-width receive buffer that the client library filled with
/// a native-endian value of the column's declared width.
pub fn decode_fixed(column_type: ColumnType, unsigned: bool, buf: &[u8]) -> Result<Value> {
    use ColumnType::*;
    let mismatch = || {
        Error::LibraryBug(eyre!(
            "receive buffer for {:?} has {} bytes",
            column_type,
            buf.len()
        ))
    };
    let value = match (column_type, unsigned) {
        (MYSQL_TYPE_TINY, false) => Value::TinyInt(i8::read_from_bytes(buf).map_err(|_| mismatch())?),
        (MYSQL_TYPE_TINY, true) => {
            Value::UnsignedTinyInt(u8::read_from_bytes(buf).map_err(|_| mismatch())?)
        }
        (MYSQL_TYPE_SHORT, false) => {
            Value::SmallInt(i16::read_from_bytes(buf).map_err(|_| mismatch())?)
        }
        (MYSQL_TYPE_SHORT, true) => {
            Value::UnsignedSmallInt(u16::read_from_bytes(buf).map_err(|_| mismatch())?)
        }
        (MYSQL_TYPE_LONG | MYSQL_TYPE_INT24, false) => {
            Value::Int(i32::read_from_bytes(buf).map_err(|_| mismatch())?)
        }
        (MYSQL_TYPE_LONG | MYSQL_TYPE_INT24, true) => {
            Value::UnsignedInt(u32::read_from_bytes(buf).map_err(|_| mismatch())?)
        }
        (MYSQL_TYPE_LONGLONG, false) => {
            Value::BigInt(i64::read_from_bytes(buf).map_err(|_| mismatch())?)
        }
        (MYSQL_TYPE_LONGLONG, true) => {
            Value::UnsignedBigInt(u64::read_from_bytes(buf).map_err(|_| mismatch())?)
        }
        (MYSQL_TYPE_FLOAT, _) => Value::Float(f32::read_from_bytes(buf).map_err(|_| mismatch())?),
        (MYSQL_TYPE_DOUBLE, _) => Value::Double(f64::read_from_bytes(buf).map_err(|_| mismatch())?),
        _ => return Err(Error::LibraryBug(eyre!("{:?} is not fixed-width", column_type))),
    };
    Ok(value)
}

/// Decode a variable-width column payload according to its classification.
pub fn decode_variable(kind: FieldKind, bytes: &[u8]) -> Value {
    match kind {
        FieldKind::Bytes => Value::Bytes(bytes.to_vec()),
        FieldKind::Date => Value::Date(text_from_bytes(bytes)),
        FieldKind::Null => Value::Null,
        _ => Value::Text(text_from_bytes(bytes)),
    }
}

/// Decode raw bytes as UTF-8.
///
/// Invalid sequences are replaced with U+FFFD rather than truncating the
/// string at the first bad unit.
pub fn text_from_bytes(bytes: &[u8]) -> String {
    match simdutf8::basic::from_utf8(bytes) {
        Ok(s) => s.to_owned(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classify_blob_respects_binary_charset() {
        assert_eq!(
            FieldKind::classify(ColumnType::MYSQL_TYPE_BLOB, BINARY_CHARSET_NR),
            FieldKind::Bytes
        );
        // utf8mb4 blob is really TEXT
        assert_eq!(
            FieldKind::classify(ColumnType::MYSQL_TYPE_BLOB, 255),
            FieldKind::String
        );
    }

    #[test]
    fn classify_decimal_as_string() {
        assert_eq!(
            FieldKind::classify(ColumnType::MYSQL_TYPE_NEWDECIMAL, 255),
            FieldKind::String
        );
        assert_eq!(
            FieldKind::classify(ColumnType::MYSQL_TYPE_DECIMAL, 63),
            FieldKind::String
        );
    }

    #[test]
    fn classify_temporal_as_date() {
        for tag in [
            ColumnType::MYSQL_TYPE_TIMESTAMP,
            ColumnType::MYSQL_TYPE_DATE,
            ColumnType::MYSQL_TYPE_TIME,
            ColumnType::MYSQL_TYPE_DATETIME,
            ColumnType::MYSQL_TYPE_YEAR,
            ColumnType::MYSQL_TYPE_NEWDATE,
        ] {
            assert_eq!(FieldKind::classify(tag, 255), FieldKind::Date);
        }
    }

    #[test]
    fn fixed_widths() {
        assert_eq!(fixed_buffer_len(ColumnType::MYSQL_TYPE_TINY), Some(1));
        assert_eq!(fixed_buffer_len(ColumnType::MYSQL_TYPE_SHORT), Some(2));
        assert_eq!(fixed_buffer_len(ColumnType::MYSQL_TYPE_INT24), Some(4));
        assert_eq!(fixed_buffer_len(ColumnType::MYSQL_TYPE_LONG), Some(4));
        assert_eq!(fixed_buffer_len(ColumnType::MYSQL_TYPE_LONGLONG), Some(8));
        assert_eq!(fixed_buffer_len(ColumnType::MYSQL_TYPE_FLOAT), Some(4));
        assert_eq!(fixed_buffer_len(ColumnType::MYSQL_TYPE_DOUBLE), Some(8));
        assert_eq!(fixed_buffer_len(ColumnType::MYSQL_TYPE_VAR_STRING), None);
        assert_eq!(fixed_buffer_len(ColumnType::MYSQL_TYPE_BLOB), None);
        assert_eq!(fixed_buffer_len(ColumnType::MYSQL_TYPE_DATETIME), None);
    }

    #[test]
    fn decode_signed_boundaries() {
        let cases: &[(ColumnType, &[u8], Value)] = &[
            (ColumnType::MYSQL_TYPE_TINY, &i8::MIN.to_ne_bytes(), Value::TinyInt(i8::MIN)),
            (ColumnType::MYSQL_TYPE_TINY, &i8::MAX.to_ne_bytes(), Value::TinyInt(i8::MAX)),
            (
                ColumnType::MYSQL_TYPE_SHORT,
                &i16::MIN.to_ne_bytes(),
                Value::SmallInt(i16::MIN),
            ),
            (ColumnType::MYSQL_TYPE_LONG, &i32::MAX.to_ne_bytes(), Value::Int(i32::MAX)),
            (
                ColumnType::MYSQL_TYPE_LONGLONG,
                &i64::MIN.to_ne_bytes(),
                Value::BigInt(i64::MIN),
            ),
            (
                ColumnType::MYSQL_TYPE_LONGLONG,
                &i64::MAX.to_ne_bytes(),
                Value::BigInt(i64::MAX),
            ),
        ];
        for (tag, bytes, expected) in cases {
            assert_eq!(&decode_fixed(*tag, false, bytes).unwrap(), expected);
        }
    }

    #[test]
    fn decode_unsigned_boundaries() {
        let cases: &[(ColumnType, &[u8], Value)] = &[
            (
                ColumnType::MYSQL_TYPE_TINY,
                &u8::MAX.to_ne_bytes(),
                Value::UnsignedTinyInt(u8::MAX),
            ),
            (
                ColumnType::MYSQL_TYPE_SHORT,
                &u16::MAX.to_ne_bytes(),
                Value::UnsignedSmallInt(u16::MAX),
            ),
            (
                ColumnType::MYSQL_TYPE_LONG,
                &u32::MAX.to_ne_bytes(),
                Value::UnsignedInt(u32::MAX),
            ),
            (
                ColumnType::MYSQL_TYPE_LONGLONG,
                &u64::MAX.to_ne_bytes(),
                Value::UnsignedBigInt(u64::MAX),
            ),
        ];
        for (tag, bytes, expected) in cases {
            assert_eq!(&decode_fixed(*tag, true, bytes).unwrap(), expected);
        }
    }

    #[test]
    fn decode_floats() {
        let v = decode_fixed(
            ColumnType::MYSQL_TYPE_DOUBLE,
            false,
            &1.25f64.to_ne_bytes(),
        )
        .unwrap();
        assert_eq!(v, Value::Double(1.25));
        let v = decode_fixed(ColumnType::MYSQL_TYPE_FLOAT, false, &(-0.5f32).to_ne_bytes()).unwrap();
        assert_eq!(v, Value::Float(-0.5));
    }

    #[test]
    fn decode_fixed_rejects_wrong_len() {
        let err = decode_fixed(ColumnType::MYSQL_TYPE_LONG, false, &[0u8; 2]).unwrap_err();
        assert!(matches!(err, crate::error::Error::LibraryBug(_)));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let s = text_from_bytes(&[b'a', 0xff, b'b']);
        assert_eq!(s, "a\u{fffd}b");
    }

    #[test]
    fn widening_accessors() {
        assert_eq!(Value::SmallInt(-7).as_i64(), Some(-7));
        assert_eq!(Value::UnsignedTinyInt(255).as_u64(), Some(255));
        assert_eq!(Value::UnsignedTinyInt(255).as_i64(), None);
        assert_eq!(Value::Double(2.0).as_f64(), Some(2.0));
        assert_eq!(Value::TinyInt(1).as_bool(), Some(true));
        assert!(Value::Null.is_null());
    }
}
