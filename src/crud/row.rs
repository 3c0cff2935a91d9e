use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use url::Url;
use uuid::Uuid;

use super::{CrudError, CrudResult};
use crate::param::DATETIME_FORMAT;
use crate::value::Value;

/// Name → position map, computed once per prepared statement and shared by
/// every row it yields.
pub(crate) type ColumnMap = HashMap<String, usize>;

pub(crate) fn column_map(names: &[String]) -> ColumnMap {
    names
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.clone(), idx))
        .collect()
}

/// One fetched row, addressable by declared column name.
#[derive(Debug, Clone)]
pub struct KeyedRow {
    columns: Arc<ColumnMap>,
    values: Vec<Value>,
}

impl KeyedRow {
    pub(crate) fn new(columns: Arc<ColumnMap>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.columns.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(*self.columns.get(key)?)
    }

    /// True when the column is absent or its null indicator was set.
    pub fn is_null(&self, key: &str) -> bool {
        self.get(key).is_none_or(Value::is_null)
    }

    fn value(&self, key: &str) -> CrudResult<&Value> {
        self.get(key)
            .ok_or_else(|| CrudError(format!("No column named `{}` in this row.", key)))
    }

    fn mismatch(&self, key: &str, expected: &'static str, found: &Value) -> CrudError {
        crate::error::Error::Decode {
            column: key.to_owned(),
            expected,
            found: found.kind_name(),
        }
        .into()
    }

    pub fn get_bool(&self, key: &str) -> CrudResult<bool> {
        let v = self.value(key)?;
        v.as_bool().ok_or_else(|| self.mismatch(key, "a bool", v))
    }

    pub fn get_i8(&self, key: &str) -> CrudResult<i8> {
        match *self.value(key)? {
            Value::TinyInt(v) => Ok(v),
            ref v => Err(self.mismatch(key, "an i8", v)),
        }
    }

    pub fn get_i16(&self, key: &str) -> CrudResult<i16> {
        match *self.value(key)? {
            Value::SmallInt(v) => Ok(v),
            ref v => Err(self.mismatch(key, "an i16", v)),
        }
    }

    pub fn get_i32(&self, key: &str) -> CrudResult<i32> {
        match *self.value(key)? {
            Value::Int(v) => Ok(v),
            ref v => Err(self.mismatch(key, "an i32", v)),
        }
    }

    /// Accepts any signed integer width, widened.
    pub fn get_i64(&self, key: &str) -> CrudResult<i64> {
        let v = self.value(key)?;
        v.as_i64().ok_or_else(|| self.mismatch(key, "an i64", v))
    }

    pub fn get_u8(&self, key: &str) -> CrudResult<u8> {
        match *self.value(key)? {
            Value::UnsignedTinyInt(v) => Ok(v),
            ref v => Err(self.mismatch(key, "a u8", v)),
        }
    }

    pub fn get_u16(&self, key: &str) -> CrudResult<u16> {
        match *self.value(key)? {
            Value::UnsignedSmallInt(v) => Ok(v),
            ref v => Err(self.mismatch(key, "a u16", v)),
        }
    }

    pub fn get_u32(&self, key: &str) -> CrudResult<u32> {
        match *self.value(key)? {
            Value::UnsignedInt(v) => Ok(v),
            ref v => Err(self.mismatch(key, "a u32", v)),
        }
    }

    /// Accepts any unsigned integer width, widened.
    pub fn get_u64(&self, key: &str) -> CrudResult<u64> {
        let v = self.value(key)?;
        v.as_u64().ok_or_else(|| self.mismatch(key, "a u64", v))
    }

    pub fn get_f32(&self, key: &str) -> CrudResult<f32> {
        let v = self.value(key)?;
        v.as_f32().ok_or_else(|| self.mismatch(key, "an f32", v))
    }

    pub fn get_f64(&self, key: &str) -> CrudResult<f64> {
        let v = self.value(key)?;
        v.as_f64().ok_or_else(|| self.mismatch(key, "an f64", v))
    }

    pub fn get_str(&self, key: &str) -> CrudResult<&str> {
        let v = self.value(key)?;
        v.as_str().ok_or_else(|| self.mismatch(key, "a string", v))
    }

    pub fn get_bytes(&self, key: &str) -> CrudResult<&[u8]> {
        let v = self.value(key)?;
        v.as_bytes()
            .ok_or_else(|| self.mismatch(key, "a byte sequence", v))
    }

    pub fn get_uuid(&self, key: &str) -> CrudResult<Uuid> {
        let s = self.get_str(key)?;
        Uuid::parse_str(s).map_err(|_| CrudError(format!("Invalid UUID string `{}`.", s)))
    }

    pub fn get_datetime(&self, key: &str) -> CrudResult<NaiveDateTime> {
        let s = self.get_str(key)?;
        NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
            .map_err(|_| CrudError(format!("Invalid date string `{}`.", s)))
    }

    pub fn get_url(&self, key: &str) -> CrudResult<Url> {
        let s = self.get_str(key)?;
        Url::parse(s).map_err(|_| CrudError(format!("Invalid URL string `{}`.", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> KeyedRow {
        let columns = Arc::new(column_map(&[
            "id".to_owned(),
            "name".to_owned(),
            "score".to_owned(),
            "payload".to_owned(),
            "when".to_owned(),
            "tag".to_owned(),
            "missing_value".to_owned(),
        ]));
        KeyedRow::new(
            columns,
            vec![
                Value::BigInt(42),
                Value::Text("alice".to_owned()),
                Value::Double(0.5),
                Value::Bytes(vec![1, 2, 3]),
                Value::Date("2001-02-03 04:05:06".to_owned()),
                Value::Text("c4b91d44-6f45-4f89-8a45-4a1f5f44c9e1".to_owned()),
                Value::Null,
            ],
        )
    }

    #[test]
    fn lookup_by_name() {
        let row = sample();
        assert_eq!(row.len(), 7);
        assert!(row.contains("name"));
        assert!(!row.contains("absent"));
        assert_eq!(row.get_i64("id").unwrap(), 42);
        assert_eq!(row.get_str("name").unwrap(), "alice");
        assert_eq!(row.get_f64("score").unwrap(), 0.5);
        assert_eq!(row.get_bytes("payload").unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn null_wins_over_type() {
        let row = sample();
        assert!(row.is_null("missing_value"));
        assert!(row.is_null("absent"));
        assert!(!row.is_null("id"));
    }

    #[test]
    fn typed_mismatch_names_the_column() {
        let row = sample();
        let err = row.get_i64("name").unwrap_err();
        assert!(err.0.contains("`name`"));
        let err = row.get_u64("id").unwrap_err();
        assert!(err.0.contains("u64"));
    }

    #[test]
    fn exact_width_getters_do_not_widen() {
        let row = sample();
        // id is a BigInt; the i32 getter must refuse it
        assert!(row.get_i32("id").is_err());
    }

    #[test]
    fn special_types_parse_from_text() {
        let row = sample();
        let dt = row.get_datetime("when").unwrap();
        assert_eq!(dt.format(DATETIME_FORMAT).to_string(), "2001-02-03 04:05:06");
        let uuid = row.get_uuid("tag").unwrap();
        assert_eq!(uuid.to_string(), "c4b91d44-6f45-4f89-8a45-4a1f5f44c9e1");
        assert!(row.get_uuid("name").is_err());
    }
}
