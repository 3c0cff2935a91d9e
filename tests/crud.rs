//! CRUD delegate integration tests. Set MYSQL_TEST_URL to run them.

use mysqlc::Conn;
use mysqlc::crud::{
    ColumnSpec, Expr, MysqlGenDelegate, SqlExeDelegate, SqlGenDelegate, TableColumn,
    TableCreatePolicy, TableStructure, sql_exe_delegate,
};

fn connect() -> Option<Conn> {
    let url = std::env::var("MYSQL_TEST_URL").ok()?;
    Some(Conn::new(url.as_str()).expect("Failed to connect"))
}

fn person_table(name: &str) -> TableStructure {
    TableStructure {
        table_name: name.to_owned(),
        columns: vec![
            TableColumn {
                name: "id".to_owned(),
                spec: ColumnSpec::BigInt,
                primary_key: true,
                optional: false,
            },
            TableColumn {
                name: "name".to_owned(),
                spec: ColumnSpec::Text,
                primary_key: false,
                optional: false,
            },
            TableColumn {
                name: "score".to_owned(),
                spec: ColumnSpec::Double,
                primary_key: false,
                optional: true,
            },
        ],
    }
}

#[test]
fn create_bind_fetch_cycle() {
    let Some(conn) = connect() else { return };
    let mut delegate = MysqlGenDelegate::new(&conn);

    let statements = delegate
        .create_table_sql(
            &person_table("crud_person"),
            TableCreatePolicy::DROP_TABLE,
        )
        .unwrap();
    for sql in &statements {
        // DDL routes around the prepared path
        let mut ddl = sql_exe_delegate(&conn, sql).unwrap();
        assert!(!ddl.has_next().unwrap());
    }

    // placeholder generation collects bindings in order
    let insert_sql = format!(
        "INSERT INTO `crud_person` (id, name, score) VALUES ({}, {}, {})",
        delegate.binding(Expr::literal(1i64)),
        delegate.binding(Expr::literal("zaphod")),
        delegate.binding(Expr::literal(4.5f64)),
    );
    assert_eq!(
        insert_sql,
        "INSERT INTO `crud_person` (id, name, score) VALUES (?, ?, ?)"
    );
    let bindings = delegate.take_bindings();

    let mut insert = sql_exe_delegate(&conn, &insert_sql).unwrap();
    insert.bind(&bindings, 0).unwrap();
    assert!(!insert.has_next().unwrap());

    let mut select = sql_exe_delegate(&conn, "SELECT id, name, score FROM crud_person").unwrap();
    assert!(select.has_next().unwrap());
    let row = select.next().unwrap().unwrap();
    assert_eq!(row.get_i64("id").unwrap(), 1);
    assert_eq!(row.get_str("name").unwrap(), "zaphod");
    assert_eq!(row.get_f64("score").unwrap(), 4.5);
    assert!(!select.has_next().unwrap());

    // exhausting the cursor reset the statement; it runs again
    assert!(select.has_next().unwrap());
    assert!(select.next().unwrap().is_some());

    let mut drop_table = sql_exe_delegate(&conn, "DROP TABLE crud_person").unwrap();
    assert!(!drop_table.has_next().unwrap());
}

#[test]
fn non_literal_expressions_are_rejected() {
    let Some(conn) = connect() else { return };
    conn.query_drop("DROP TABLE IF EXISTS crud_reject").unwrap();
    conn.query_drop("CREATE TABLE crud_reject (a INT)").unwrap();

    let mut delegate = sql_exe_delegate(&conn, "SELECT a FROM crud_reject WHERE a = ?").unwrap();
    let bindings = vec![(
        "?".to_owned(),
        Expr::Equality(
            Box::new(Expr::Column("a".to_owned())),
            Box::new(Expr::literal(1i32)),
        ),
    )];
    let err = delegate.bind(&bindings, 0).unwrap_err();
    assert!(err.0.contains("unsupported expression type"));

    conn.query_drop("DROP TABLE crud_reject").unwrap();
}

#[test]
fn direct_delegate_refuses_binds() {
    let Some(conn) = connect() else { return };
    let mut delegate = sql_exe_delegate(&conn, "CREATE TABLE crud_nobind (a INT)").unwrap();
    let bindings = vec![("?".to_owned(), Expr::literal(1i32))];
    let err = delegate.bind(&bindings, 0).unwrap_err();
    assert!(err.0.contains("not permitted"));
    // skip covers already-consumed bindings
    delegate.bind(&bindings, 1).unwrap();
}

#[test]
fn reconcile_alters_existing_table() {
    let Some(conn) = connect() else { return };
    conn.query_drop("DROP TABLE IF EXISTS crud_reconcile").unwrap();
    conn.query_drop("CREATE TABLE crud_reconcile (id BIGINT PRIMARY KEY, obsolete INT)")
        .unwrap();

    let mut delegate = MysqlGenDelegate::new(&conn);
    let statements = delegate
        .create_table_sql(
            &person_table("crud_reconcile"),
            TableCreatePolicy::RECONCILE_TABLE,
        )
        .unwrap();
    assert!(
        statements
            .iter()
            .any(|s| s.contains("DROP COLUMN `obsolete`"))
    );
    assert!(statements.iter().any(|s| s.contains("ADD COLUMN `name`")));
    for sql in &statements {
        conn.query_drop(sql).unwrap();
    }

    // reconciled table now accepts the full shape
    conn.query_drop("INSERT INTO crud_reconcile (id, name, score) VALUES (1, 'x', NULL)")
        .unwrap();
    conn.query_drop("DROP TABLE crud_reconcile").unwrap();
}

#[test]
fn keyed_row_decodes_special_types() {
    let Some(conn) = connect() else { return };
    conn.query_drop("DROP TABLE IF EXISTS crud_special").unwrap();
    conn.query_drop(
        "CREATE TABLE crud_special (tag VARCHAR(36), at DATETIME, site LONGTEXT)",
    )
    .unwrap();

    let uuid = uuid::Uuid::parse_str("c4b91d44-6f45-4f89-8a45-4a1f5f44c9e1").unwrap();
    let at = chrono::NaiveDate::from_ymd_opt(2020, 5, 6)
        .unwrap()
        .and_hms_opt(7, 8, 9)
        .unwrap();

    let mut insert = sql_exe_delegate(&conn, "INSERT INTO crud_special VALUES (?, ?, ?)").unwrap();
    let bindings = vec![
        ("?".to_owned(), Expr::literal(uuid)),
        ("?".to_owned(), Expr::literal(at)),
        ("?".to_owned(), Expr::literal("https://example.com/x")),
    ];
    insert.bind(&bindings, 0).unwrap();
    assert!(!insert.has_next().unwrap());

    let mut select = sql_exe_delegate(&conn, "SELECT tag, at, site FROM crud_special").unwrap();
    assert!(select.has_next().unwrap());
    let row = select.next().unwrap().unwrap();
    assert_eq!(row.get_uuid("tag").unwrap(), uuid);
    assert_eq!(row.get_datetime("at").unwrap(), at);
    assert_eq!(row.get_url("site").unwrap().as_str(), "https://example.com/x");

    conn.query_drop("DROP TABLE crud_special").unwrap();
}
