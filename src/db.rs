use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{error, info};

/// Format used for the `date` column when a reading is submitted
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One water-meter observation for a house, with its billed price.
///
/// Rows are never mutated after insertion. `price` is a snapshot of
/// `water_meter * unit_rate` at submission time and is not recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: i64,
    pub house_number: String,
    pub water_meter: f64,
    pub date: String,
    pub price: f64,
}

impl Reading {
    /// Parse the stored date string.
    ///
    /// Accepts the submission format, RFC 3339, and a bare `YYYY-MM-DD`
    /// (read as midnight). Returns `None` for anything else.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.date)
    }

    /// Calendar day of the reading, time-of-day discarded
    pub fn day(&self) -> Option<NaiveDate> {
        self.timestamp().map(|ts| ts.date())
    }
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();

    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, DATE_FORMAT) {
        return Some(ts);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_local());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

// ============================================================================
// SCHEMA & QUERIES
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases report "memory" and that's fine
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
        row.get::<_, String>(0)
    })?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS water_readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            house_number TEXT NOT NULL CHECK (length(house_number) > 0),
            water_meter REAL NOT NULL CHECK (water_meter >= 0),
            date TEXT NOT NULL,
            price REAL NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_readings_date ON water_readings(date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_readings_house ON water_readings(house_number)",
        [],
    )?;

    Ok(())
}

/// Insert one reading and return the id storage assigned to it
pub fn insert_reading(
    conn: &Connection,
    house_number: &str,
    water_meter: f64,
    date: &str,
    price: f64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO water_readings (house_number, water_meter, date, price)
         VALUES (?1, ?2, ?3, ?4)",
        params![house_number, water_meter, date, price],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn get_all_readings(conn: &Connection) -> Result<Vec<Reading>> {
    let mut stmt = conn.prepare(
        "SELECT id, house_number, water_meter, date, price
         FROM water_readings
         ORDER BY id",
    )?;

    let readings = stmt
        .query_map([], |row| {
            Ok(Reading {
                id: row.get(0)?,
                house_number: row.get(1)?,
                water_meter: row.get(2)?,
                date: row.get(3)?,
                price: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(readings)
}

/// Delete every row. Returns how many rows were removed.
pub fn clear_readings(conn: &Connection) -> Result<usize> {
    let removed = conn.execute("DELETE FROM water_readings", [])?;
    Ok(removed)
}

pub fn verify_count(conn: &Connection) -> Result<i64> {
    let count: i64 =
        conn.query_row("SELECT COUNT(*) FROM water_readings", [], |row| row.get(0))?;

    Ok(count)
}

// ============================================================================
// STORAGE ACCESSOR
// ============================================================================

/// Owns the connection to the readings table.
///
/// Mutating operations swallow storage faults: they are logged and reported
/// to the caller as `false`, with no distinction between causes.
pub struct ReadingStore {
    conn: Connection,
}

impl ReadingStore {
    /// Open (or create) the database file and make sure the table exists
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        let store = Self { conn };
        store.initialize()?;

        info!(path = %path.display(), "database opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Idempotent; safe to call on an existing database
    pub fn initialize(&self) -> Result<()> {
        setup_database(&self.conn).context("Failed to initialize readings table")
    }

    pub fn insert(&self, house_number: &str, water_meter: f64, date: &str, price: f64) -> bool {
        match insert_reading(&self.conn, house_number, water_meter, date, price) {
            Ok(id) => {
                info!(id, house_number, water_meter, price, "reading added");
                true
            }
            Err(e) => {
                error!(error = %e, house_number, "error adding reading");
                false
            }
        }
    }

    pub fn read_all(&self) -> Result<Vec<Reading>> {
        get_all_readings(&self.conn).context("Failed to read water readings")
    }

    pub fn clear_all(&self) -> bool {
        match clear_readings(&self.conn) {
            Ok(removed) => {
                info!(removed, "all readings cleared");
                true
            }
            Err(e) => {
                error!(error = %e, "error clearing data");
                false
            }
        }
    }

    pub fn count(&self) -> Result<i64> {
        verify_count(&self.conn)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> ReadingStore {
        ReadingStore::open_in_memory().unwrap()
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let store = test_store();
        assert!(store.insert("H-1", 10.0, "2024-01-01 08:00:00", 45.0));

        // Second call must neither fail nor drop existing rows
        store.initialize().unwrap();
        store.initialize().unwrap();

        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_insert_and_read_all() {
        let store = test_store();

        assert!(store.insert("H-1", 10.0, "2024-01-01 08:00:00", 45.0));
        assert!(store.insert("H-2", 3.5, "2024-01-02 09:30:00", 15.75));

        let readings = store.read_all().unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].house_number, "H-1");
        assert_eq!(readings[0].water_meter, 10.0);
        assert_eq!(readings[0].price, 45.0);
        assert_eq!(readings[1].date, "2024-01-02 09:30:00");
        assert!(readings[0].id < readings[1].id, "ids must increase");
    }

    #[test]
    fn test_insert_rejected_by_schema_returns_false() {
        let store = test_store();

        assert!(!store.insert("", 1.0, "2024-01-01 00:00:00", 4.5));
        assert!(!store.insert("H-1", -1.0, "2024-01-01 00:00:00", -4.5));

        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_clear_all_then_read_all_is_empty() {
        let store = test_store();
        store.insert("H-1", 1.0, "2024-01-01 00:00:00", 4.5);
        store.insert("H-2", 2.0, "2024-01-01 00:00:00", 9.0);

        assert!(store.clear_all());
        assert!(store.read_all().unwrap().is_empty());

        // Clearing an empty table still succeeds
        assert!(store.clear_all());
    }

    #[test]
    fn test_ids_keep_increasing_after_clear() {
        let store = test_store();
        store.insert("H-1", 1.0, "2024-01-01 00:00:00", 4.5);
        let first = store.read_all().unwrap()[0].id;

        store.clear_all();
        store.insert("H-1", 1.0, "2024-01-01 00:00:00", 4.5);
        let second = store.read_all().unwrap()[0].id;

        assert!(second > first);
    }

    #[test]
    fn test_insert_reading_returns_rowid() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let id1 = insert_reading(&conn, "A", 1.0, "2024-01-01", 4.5).unwrap();
        let id2 = insert_reading(&conn, "B", 2.0, "2024-01-01", 9.0).unwrap();

        assert_eq!(id2, id1 + 1);
        assert_eq!(verify_count(&conn).unwrap(), 2);
        assert_eq!(clear_readings(&conn).unwrap(), 2);
    }

    #[test]
    fn test_failed_clear_returns_false() {
        let store = test_store();
        store
            .connection()
            .execute("DROP TABLE water_readings", [])
            .unwrap();

        assert!(!store.clear_all());
        assert!(!store.insert("H-1", 1.0, "2024-01-01", 4.5));
        assert!(store.read_all().is_err());
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let full = parse_timestamp("2024-03-05 14:15:16").unwrap();
        assert_eq!(full.format("%H:%M:%S").to_string(), "14:15:16");

        let bare = parse_timestamp("2024-03-05").unwrap();
        assert_eq!(bare.format(DATE_FORMAT).to_string(), "2024-03-05 00:00:00");

        let rfc = parse_timestamp("2024-03-05T14:15:16+07:00").unwrap();
        assert_eq!(rfc.date(), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());

        assert!(parse_timestamp("yesterday").is_none());
    }
}
