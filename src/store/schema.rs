//! Database schema for the fact store

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Initialize the database schema and apply additive migrations
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS commits (
            hash TEXT PRIMARY KEY,
            author_name TEXT,
            author_email TEXT,
            date_timestamp INTEGER,
            message TEXT,
            files_changed TEXT
        );

        CREATE TABLE IF NOT EXISTS author_profiles (
            email TEXT PRIMARY KEY,
            name TEXT,
            profile_json TEXT,
            raw_response TEXT,
            last_updated INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_commits_email ON commits(author_email);
        "#,
    )?;

    ensure_column(conn, "author_profiles", "raw_response", "TEXT")?;

    Ok(())
}

/// Column names of a table, in declaration order
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Add `column` to `table` if a store created by an older version lacks it
fn ensure_column(conn: &Connection, table: &str, column: &str, sql_type: &str) -> Result<()> {
    let columns = table_columns(conn, table)?;
    if columns.iter().any(|c| c == column) {
        return Ok(());
    }

    tracing::info!(table, column, "Migrating database: adding missing column");
    conn.execute(
        &format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, sql_type),
        [],
    )
    .with_context(|| format!("adding column {}.{}", table, column))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert!(tables.contains(&"commits".to_string()));
        assert!(tables.contains(&"author_profiles".to_string()));
    }

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let columns = table_columns(&conn, "author_profiles").unwrap();
        assert_eq!(
            columns.iter().filter(|c| c.as_str() == "raw_response").count(),
            1
        );
    }

    #[test]
    fn test_migrates_legacy_profiles_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE author_profiles (
                email TEXT PRIMARY KEY,
                name TEXT,
                profile_json TEXT,
                last_updated INTEGER
            );
            INSERT INTO author_profiles VALUES ('a@x.com', 'Ada', '{}', 1700000000);
            "#,
        )
        .unwrap();

        init_schema(&conn).unwrap();

        let columns = table_columns(&conn, "author_profiles").unwrap();
        assert!(columns.contains(&"raw_response".to_string()));

        // Existing rows survive with the new column NULL
        let (name, raw): (String, Option<String>) = conn
            .query_row(
                "SELECT name, raw_response FROM author_profiles WHERE email = 'a@x.com'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(name, "Ada");
        assert!(raw.is_none());
    }
}
