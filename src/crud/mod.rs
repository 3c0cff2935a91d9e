//! Boundary to the object-relational mapping collaborator.
//!
//! The ORM engine generates SQL through a [`SqlGenDelegate`] and executes it
//! through a [`SqlExeDelegate`]; this module provides the MySQL
//! implementations of both plus the keyed row view rows are decoded
//! through. Every native failure crossing this boundary is wrapped in the
//! single [`CrudError`] shape carrying the native message.

mod exe;
mod row;
mod sqlgen;

use auto_impl::auto_impl;
use thiserror::Error;

pub use exe::{DirectExeDelegate, StmtExeDelegate, sql_exe_delegate};
pub use row::KeyedRow;
pub use sqlgen::{
    ColumnSpec, MysqlColumnInfo, MysqlGenDelegate, TableColumn, TableCreatePolicy, TableStructure,
};

use crate::param::Param;

/// Uniform error shape the ORM collaborator sees, regardless of which
/// native call failed.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CrudError(pub String);

impl From<crate::error::Error> for CrudError {
    fn from(e: crate::error::Error) -> Self {
        CrudError(e.to_string())
    }
}

pub type CrudResult<T> = Result<T, CrudError>;

/// Placeholder text plus the expression bound to it, collected in query
/// order by the gen delegate.
pub type Bindings = Vec<(String, Expr)>;

/// Closed expression tree handed down by the query builder.
///
/// Only [`Expr::Literal`] nodes are bindable; columns, combinators and
/// comparisons reaching a bind call indicate a caller bug and are rejected
/// with a typed error.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Param),
    Column(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Equality(Box<Expr>, Box<Expr>),
    Inequality(Box<Expr>, Box<Expr>),
    LessThan(Box<Expr>, Box<Expr>),
    LessThanEqual(Box<Expr>, Box<Expr>),
    GreaterThan(Box<Expr>, Box<Expr>),
    GreaterThanEqual(Box<Expr>, Box<Expr>),
    In(Box<Expr>, Vec<Expr>),
    Like(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn describe(&self) -> &'static str {
        match self {
            Expr::Literal(_) => "literal",
            Expr::Column(_) => "column",
            Expr::Not(_) => "not",
            Expr::And(..) => "and",
            Expr::Or(..) => "or",
            Expr::Equality(..) => "equality",
            Expr::Inequality(..) => "inequality",
            Expr::LessThan(..) => "less-than",
            Expr::LessThanEqual(..) => "less-than-equal",
            Expr::GreaterThan(..) => "greater-than",
            Expr::GreaterThanEqual(..) => "greater-than-equal",
            Expr::In(..) => "in",
            Expr::Like(..) => "like",
        }
    }

    /// Shorthand for wrapping any bindable scalar.
    pub fn literal<P: Into<Param>>(v: P) -> Self {
        Expr::Literal(v.into())
    }
}

impl From<Param> for Expr {
    fn from(v: Param) -> Self {
        Expr::Literal(v)
    }
}

/// SQL dialect services the ORM engine asks of a database driver.
pub trait SqlGenDelegate {
    /// Backtick-quote an identifier.
    fn quote(&self, identifier: &str) -> String;

    /// Record `expr` for later binding and return its placeholder text.
    fn binding(&mut self, expr: Expr) -> String;

    /// Expressions collected so far, in placeholder order.
    fn bindings(&self) -> &[(String, Expr)];

    fn create_table_sql(
        &mut self,
        table: &TableStructure,
        policy: TableCreatePolicy,
    ) -> CrudResult<Vec<String>>;

    fn create_index_sql(
        &mut self,
        table: &str,
        columns: &[&str],
        unique: bool,
    ) -> CrudResult<Vec<String>>;
}

/// Execution services the ORM engine asks of a database driver:
/// bind the collected parameters, then drive
/// execute-once-fetch-repeatedly through `has_next`/`next`.
#[auto_impl(&mut, Box)]
pub trait SqlExeDelegate {
    /// Forward each binding from `skip` onward to the parameter binder.
    fn bind(&mut self, bindings: &[(String, Expr)], skip: usize) -> CrudResult<()>;

    /// True while a row is available. Executes on first call; when rows
    /// are exhausted the statement is reset so it is ready for reuse.
    fn has_next(&mut self) -> CrudResult<bool>;

    /// Keyed view over the current row.
    fn next(&mut self) -> CrudResult<Option<KeyedRow>>;
}
