//! SQLite storage layer -- schema, reading log, migrations.

pub mod schema;

use anyhow::Result;
use chrono::{DateTime, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &str) -> Result<Pool> {
    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    // Run migrations on a single connection
    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// One timestamped sensor sample for a device. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: i64,
    pub device_id: String,
    /// Sensor concentration (ppm).
    pub value: f64,
    /// Raw ADC signal, if the device reports one.
    pub raw_signal: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// Append a reading to the log. The timestamp is assigned here, at write time.
pub fn save_reading(
    pool: &Pool,
    device_id: &str,
    value: f64,
    raw_signal: Option<f64>,
) -> Result<Reading> {
    let conn = pool.get()?;
    let created_at = Utc::now();

    conn.execute(
        "INSERT INTO readings (device_id, value, raw_signal, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![device_id, value, raw_signal, created_at.to_rfc3339()],
    )?;

    Ok(Reading {
        id: conn.last_insert_rowid(),
        device_id: device_id.to_string(),
        value,
        raw_signal,
        created_at,
    })
}

/// Fetch the most recent `n` readings for a device, oldest-first.
pub fn recent_window(pool: &Pool, device_id: Option<&str>, n: usize) -> Result<Vec<Reading>> {
    let conn = pool.get()?;

    // Newest-first from the index, then reversed so callers see time ascending.
    let mut readings = match device_id {
        Some(dev) => {
            let mut stmt = conn.prepare(
                "SELECT id, device_id, value, raw_signal, created_at FROM readings
                 WHERE device_id = ?1
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(rusqlite::params![dev, n], map_reading)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, device_id, value, raw_signal, created_at FROM readings
                 ORDER BY id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(rusqlite::params![n], map_reading)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    readings.reverse();
    Ok(readings)
}

/// Newest single reading for a device, or None if nothing was ingested yet.
pub fn latest_reading(pool: &Pool, device_id: Option<&str>) -> Result<Option<Reading>> {
    Ok(recent_window(pool, device_id, 1)?.pop())
}

fn map_reading(row: &rusqlite::Row<'_>) -> rusqlite::Result<Reading> {
    Ok(Reading {
        id: row.get(0)?,
        device_id: row.get(1)?,
        value: row.get(2)?,
        raw_signal: row.get(3)?,
        created_at: chrono::DateTime::parse_from_rfc3339(&row.get::<_, String>(4)?)
            .unwrap_or_default()
            .with_timezone(&Utc),
    })
}
