use bitflags::bitflags;

use super::exe::StmtExeDelegate;
use super::{Bindings, CrudResult, Expr, SqlExeDelegate, SqlGenDelegate};
use crate::conn::Conn;

/// Application-level column types the ORM engine can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSpec {
    BigInt,
    TinyInt,
    SmallInt,
    Int,
    UnsignedBigInt,
    UnsignedTinyInt,
    UnsignedSmallInt,
    UnsignedInt,
    Double,
    Float,
    Bool,
    Text,
    Blob,
    Uuid,
    DateTime,
    Url,
    Json,
}

impl ColumnSpec {
    /// SQL type each application type maps to. This table is a contract;
    /// other drivers must reproduce it exactly.
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnSpec::BigInt => "bigint",
            ColumnSpec::TinyInt => "tinyint",
            ColumnSpec::SmallInt => "smallint",
            ColumnSpec::Int => "int",
            ColumnSpec::UnsignedBigInt => "bigint unsigned",
            ColumnSpec::UnsignedTinyInt => "tinyint unsigned",
            ColumnSpec::UnsignedSmallInt => "smallint unsigned",
            ColumnSpec::UnsignedInt => "int unsigned",
            ColumnSpec::Double => "double",
            ColumnSpec::Float => "float",
            ColumnSpec::Bool => "tinyint",
            ColumnSpec::Text => "longtext",
            ColumnSpec::Blob => "longblob",
            ColumnSpec::Uuid => "varchar(36)",
            ColumnSpec::DateTime => "datetime",
            ColumnSpec::Url => "longtext",
            ColumnSpec::Json => "json",
        }
    }
}

/// One declared column of a table the ORM wants created.
#[derive(Debug, Clone)]
pub struct TableColumn {
    pub name: String,
    pub spec: ColumnSpec,
    pub primary_key: bool,
    pub optional: bool,
}

/// Declarative table description handed down by the ORM engine.
#[derive(Debug, Clone)]
pub struct TableStructure {
    pub table_name: String,
    pub columns: Vec<TableColumn>,
}

bitflags! {
    /// Table creation policy flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TableCreatePolicy: u8 {
        const SHALLOW = 0b001;
        const DROP_TABLE = 0b010;
        const RECONCILE_TABLE = 0b100;
    }
}

/// One row of `SHOW COLUMNS FROM`, used to reconcile an existing table.
#[derive(Debug, Clone)]
pub struct MysqlColumnInfo {
    pub field: String,
    pub type_name: String,
    null: String,
    key: String,
}

impl MysqlColumnInfo {
    pub fn is_null(&self) -> bool {
        self.null == "YES"
    }

    pub fn is_primary_key(&self) -> bool {
        self.key == "PRI"
    }
}

fn quote(identifier: &str) -> String {
    format!("`{}`", identifier)
}

fn column_definition(column: &TableColumn) -> String {
    let addendum = if column.primary_key {
        " PRIMARY KEY"
    } else if !column.optional {
        " NOT NULL"
    } else {
        ""
    };
    format!("{} {}{}", quote(&column.name), column.spec.sql_type(), addendum)
}

/// Statement text for creating `table`, given what already exists.
///
/// With `RECONCILE_TABLE` (and no `DROP_TABLE`) the existing columns are
/// diffed into ALTER TABLE ADD/DROP COLUMN statements; otherwise a single
/// CREATE TABLE IF NOT EXISTS.
fn create_table_statements(
    table: &TableStructure,
    policy: TableCreatePolicy,
    existing: Option<&[MysqlColumnInfo]>,
) -> Vec<String> {
    let quoted = quote(&table.table_name);
    let mut statements = Vec::new();

    if policy.contains(TableCreatePolicy::DROP_TABLE) {
        statements.push(format!("DROP TABLE IF EXISTS {}", quoted));
    }

    if !policy.contains(TableCreatePolicy::DROP_TABLE)
        && policy.contains(TableCreatePolicy::RECONCILE_TABLE)
        && let Some(existing) = existing
    {
        let removed = existing.iter().filter(|e| {
            !table
                .columns
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&e.field))
        });
        for column in removed {
            statements.push(format!(
                "ALTER TABLE {} DROP COLUMN {}",
                quoted,
                quote(&column.field)
            ));
        }
        let added = table.columns.iter().filter(|c| {
            !existing.iter().any(|e| e.field.eq_ignore_ascii_case(&c.name))
        });
        for column in added {
            statements.push(format!(
                "ALTER TABLE {} ADD COLUMN {}",
                quoted,
                column_definition(column)
            ));
        }
        return statements;
    }

    let definitions: Vec<String> = table.columns.iter().map(column_definition).collect();
    statements.push(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n\t{}\n)",
        quoted,
        definitions.join(",\n\t")
    ));
    statements
}

fn create_index_statement(table: &str, columns: &[&str], unique: bool) -> String {
    let index_name = quote(&format!("index_{}", columns.join("_")));
    let column_list: Vec<String> = columns.iter().map(|c| quote(c)).collect();
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        if unique { "UNIQUE " } else { "" },
        index_name,
        quote(table),
        column_list.join(",")
    )
}

/// MySQL implementation of the ORM's SQL-generation contract.
pub struct MysqlGenDelegate<'conn> {
    conn: &'conn Conn,
    bindings: Bindings,
}

impl<'conn> MysqlGenDelegate<'conn> {
    pub fn new(conn: &'conn Conn) -> Self {
        Self {
            conn,
            bindings: Vec::new(),
        }
    }

    /// Move the collected bindings out, leaving the delegate reusable.
    pub fn take_bindings(&mut self) -> Bindings {
        std::mem::take(&mut self.bindings)
    }

    /// Introspect an existing table. Returns `None` when the table does
    /// not exist or cannot be read.
    fn existing_columns(&self, table: &str) -> Option<Vec<MysqlColumnInfo>> {
        let sql = format!("SHOW COLUMNS FROM {}", quote(table));
        let stmt = self.conn.prepare(&sql).ok()?;
        let mut exe = StmtExeDelegate::new(stmt);
        let mut out = Vec::new();
        while exe.has_next().ok()? {
            let row = exe.next().ok()??;
            out.push(MysqlColumnInfo {
                field: row.get_str("Field").ok()?.to_owned(),
                type_name: row.get_str("Type").ok()?.to_owned(),
                null: row.get_str("Null").ok()?.to_owned(),
                key: row.get_str("Key").ok()?.to_owned(),
            });
        }
        if out.is_empty() { None } else { Some(out) }
    }
}

impl SqlGenDelegate for MysqlGenDelegate<'_> {
    fn quote(&self, identifier: &str) -> String {
        quote(identifier)
    }

    fn binding(&mut self, expr: Expr) -> String {
        self.bindings.push(("?".to_owned(), expr));
        "?".to_owned()
    }

    fn bindings(&self) -> &[(String, Expr)] {
        &self.bindings
    }

    fn create_table_sql(
        &mut self,
        table: &TableStructure,
        policy: TableCreatePolicy,
    ) -> CrudResult<Vec<String>> {
        let existing = if !policy.contains(TableCreatePolicy::DROP_TABLE)
            && policy.contains(TableCreatePolicy::RECONCILE_TABLE)
        {
            self.existing_columns(&table.table_name)
        } else {
            None
        };
        Ok(create_table_statements(table, policy, existing.as_deref()))
    }

    fn create_index_sql(
        &mut self,
        table: &str,
        columns: &[&str],
        unique: bool,
    ) -> CrudResult<Vec<String>> {
        Ok(vec![create_index_statement(table, columns, unique)])
    }
}
