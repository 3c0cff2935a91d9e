use std::sync::Arc;

use super::row::{ColumnMap, column_map};
use super::{CrudError, CrudResult, Expr, KeyedRow, SqlExeDelegate};
use crate::conn::Conn;
use crate::stmt::Stmt;
use crate::value::Value;

/// Statements the native prepare step rejects in some server modes; these
/// are routed around the prepared path as plain text queries.
const NO_PREP_COMMANDS: [&str; 6] = ["CREATE", "DROP", "ALTER", "BEGIN", "COMMIT", "ROLLBACK"];

/// Route `sql` to the right execution delegate: DDL and transaction
/// control go out unprepared, everything else through a prepared
/// statement.
pub fn sql_exe_delegate<'conn>(
    conn: &'conn Conn,
    sql: &str,
) -> CrudResult<Box<dyn SqlExeDelegate + 'conn>> {
    if NO_PREP_COMMANDS.iter().any(|p| sql.starts_with(p)) {
        return Ok(Box::new(DirectExeDelegate::new(conn, sql)));
    }
    let stmt = conn
        .prepare(sql)
        .map_err(|e| CrudError(format!("Could not prepare statement. {}", e)))?;
    Ok(Box::new(StmtExeDelegate::new(stmt)))
}

/// Executes one statement as a raw text query. No binds, no rows.
pub struct DirectExeDelegate<'conn> {
    conn: &'conn Conn,
    sql: String,
}

impl<'conn> DirectExeDelegate<'conn> {
    pub fn new(conn: &'conn Conn, sql: &str) -> Self {
        Self {
            conn,
            sql: sql.to_owned(),
        }
    }
}

impl SqlExeDelegate for DirectExeDelegate<'_> {
    fn bind(&mut self, bindings: &[(String, Expr)], skip: usize) -> CrudResult<()> {
        if bindings.len() > skip {
            return Err(CrudError(
                "Binds are not permitted for this type of statement.".to_owned(),
            ));
        }
        Ok(())
    }

    fn has_next(&mut self) -> CrudResult<bool> {
        self.conn
            .query_drop(&self.sql)
            .map_err(|e| CrudError(format!("Error executing statement. {}", e)))?;
        Ok(false)
    }

    fn next(&mut self) -> CrudResult<Option<KeyedRow>> {
        Ok(None)
    }
}

/// Drives a prepared statement through the execute-once-fetch-repeatedly
/// contract, resetting it for reuse once rows run out.
pub struct StmtExeDelegate<'conn> {
    stmt: Stmt<'conn>,
    columns: Arc<ColumnMap>,
    executed: bool,
    current: Option<Vec<Value>>,
}

impl<'conn> StmtExeDelegate<'conn> {
    pub fn new(stmt: Stmt<'conn>) -> Self {
        let columns = Arc::new(column_map(&stmt.field_names()));
        Self {
            stmt,
            columns,
            executed: false,
            current: None,
        }
    }
}

impl SqlExeDelegate for StmtExeDelegate<'_> {
    fn bind(&mut self, bindings: &[(String, Expr)], skip: usize) -> CrudResult<()> {
        for (_, expr) in bindings.iter().skip(skip) {
            match expr {
                Expr::Literal(param) => self.stmt.bind(param.clone())?,
                other => {
                    return Err(CrudError(format!(
                        "Asked to bind unsupported expression type: {}",
                        other.describe()
                    )));
                }
            }
        }
        Ok(())
    }

    fn has_next(&mut self) -> CrudResult<bool> {
        if !self.executed {
            self.stmt
                .execute()
                .map_err(|e| CrudError(format!("Error executing statement. {}", e)))?;
            // bind the receive buffers; the cursor state lives in the
            // statement so it survives across has_next calls
            let _ = self.stmt.results()?;
            self.executed = true;
        }
        match self.stmt.fetch_next()? {
            Some(row) => {
                self.current = Some(row);
                Ok(true)
            }
            None => {
                self.stmt.reset()?;
                self.executed = false;
                self.current = None;
                Ok(false)
            }
        }
    }

    fn next(&mut self) -> CrudResult<Option<KeyedRow>> {
        Ok(self
            .current
            .take()
            .map(|values| KeyedRow::new(Arc::clone(&self.columns), values)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_prep_routing_table() {
        for sql in [
            "CREATE TABLE t (a INT)",
            "DROP TABLE t",
            "ALTER TABLE t ADD COLUMN b INT",
            "BEGIN",
            "COMMIT",
            "ROLLBACK",
        ] {
            assert!(NO_PREP_COMMANDS.iter().any(|p| sql.starts_with(p)));
        }
        for sql in ["SELECT 1", "INSERT INTO t VALUES (?)", "SHOW COLUMNS FROM t"] {
            assert!(!NO_PREP_COMMANDS.iter().any(|p| sql.starts_with(p)));
        }
    }
}
