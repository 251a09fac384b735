//! SQLite schema introspection.

use rusqlite::{params, Connection};

use super::{Column, SchemaError, SchemaResult, SemanticType, Table};

/// Tables and views with their columns, internal tables excluded.
/// `?1` optionally restricts the result to one table.
const INTROSPECT_SQL: &str = r#"
SELECT
    m.name,
    p.name,
    p.type,
    p."notnull" AND p.dflt_value IS NULL,
    p.pk > 0
FROM sqlite_master AS m
JOIN pragma_table_info(m.name) AS p
WHERE m.type IN ('table', 'view')
  AND m.name NOT LIKE 'sqlite\_%' ESCAPE '\'
  AND (?1 IS NULL OR m.name = ?1)
ORDER BY m.name, p.name
"#;

/// Read every table, ordered by table name then column name.
pub fn introspect_tables(conn: &Connection) -> SchemaResult<Vec<Table>> {
    read_tables(conn, None)
}

/// Read a single table by name.
pub fn introspect_table(conn: &Connection, name: &str) -> SchemaResult<Table> {
    read_tables(conn, Some(name))?
        .into_iter()
        .next()
        .ok_or_else(|| SchemaError::TableNotFound(name.to_string()))
}

fn read_tables(conn: &Connection, only: Option<&str>) -> SchemaResult<Vec<Table>> {
    let mut stmt = conn.prepare(INTROSPECT_SQL)?;
    let mut rows = stmt.query(params![only])?;

    let mut tables: Vec<Table> = Vec::new();
    while let Some(row) = rows.next()? {
        let table_name: String = row.get(0)?;
        let native_type: String = row.get(2)?;
        let column = Column {
            name: row.get(1)?,
            kind: SemanticType::from_native(&native_type),
            required: row.get(3)?,
            is_pkey: row.get(4)?,
        };

        match tables.last_mut() {
            Some(table) if table.name == table_name => table.columns.push(column),
            _ => tables.push(Table {
                name: table_name,
                columns: vec![column],
            }),
        }
    }

    Ok(tables)
}
