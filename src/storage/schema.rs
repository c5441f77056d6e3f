//! Database schema and migrations.

use anyhow::Result;
use rusqlite::Connection;

/// Run all pending migrations.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS readings (
            id INTEGER PRIMARY KEY,
            device_id TEXT NOT NULL,
            value REAL NOT NULL,
            raw_signal REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS incidents (
            id TEXT PRIMARY KEY,
            device_id TEXT NOT NULL,
            mode TEXT NOT NULL,
            severity TEXT NOT NULL,
            start_time TEXT NOT NULL,
            end_time TEXT,
            is_open INTEGER NOT NULL DEFAULT 1,
            max_value REAL NOT NULL,
            max_probability REAL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_readings_device_id ON readings(device_id, id);
        CREATE INDEX IF NOT EXISTS idx_incidents_device_start ON incidents(device_id, start_time);

        -- Storage-level guarantee: at most one open incident per device.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_incidents_one_open
            ON incidents(device_id) WHERE is_open = 1;",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM incidents", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap(); // Should not error
    }

    #[test]
    fn test_second_open_incident_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        conn.execute(
            "INSERT INTO incidents (id, device_id, mode, severity, start_time, max_value)
             VALUES ('a', 'esp-01', 'HIGH_GAS', 'WARNING', datetime('now'), 700.0)",
            [],
        )
        .unwrap();

        let dup = conn.execute(
            "INSERT INTO incidents (id, device_id, mode, severity, start_time, max_value)
             VALUES ('b', 'esp-01', 'HIGH_GAS', 'WARNING', datetime('now'), 700.0)",
            [],
        );
        assert!(dup.is_err());

        // A closed incident for the same device is fine.
        conn.execute(
            "INSERT INTO incidents (id, device_id, mode, severity, start_time, end_time, is_open, max_value)
             VALUES ('c', 'esp-01', 'HIGH_GAS', 'WARNING', datetime('now'), datetime('now'), 0, 700.0)",
            [],
        )
        .unwrap();
    }
}
