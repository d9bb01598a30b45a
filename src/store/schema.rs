use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OpenFlags, Row};

use super::error::StoreError;
use super::records::{FixRecord, StoredFix, StoredSatellite};
use crate::gnss::{Constellation, SatelliteObservation};

pub const DB_FILE_NAME: &str = "gnss_data.db";
pub const SCHEMA_VERSION: u32 = 1;

const CREATE_TABLES: &str = "
    CREATE TABLE IF NOT EXISTS location_record (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT,
        latitude REAL,
        longitude REAL,
        accuracy REAL
    );
    CREATE TABLE IF NOT EXISTS satellite_info (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        satellite_id INTEGER,
        type TEXT,
        azimuth REAL,
        elevation REAL,
        snr REAL,
        location_id INTEGER,
        FOREIGN KEY(location_id) REFERENCES location_record(id)
    );
";

const DROP_TABLES: &str = "
    DROP TABLE IF EXISTS satellite_info;
    DROP TABLE IF EXISTS location_record;
";

/// Handle on the on-disk fix database.
///
/// The connection is owned exclusively. Once closed, every operation fails
/// with [`StoreError::Unavailable`].
pub struct Store {
    path: PathBuf,
    conn: Option<Connection>,
}

impl Store {
    /// Opens (creating if needed) the database at `path` for writing.
    ///
    /// Tables are created on first use. If the stored version marker differs
    /// from `version`, both tables are dropped and recreated empty. A marker
    /// of 0 means "never initialized", so `version` must be at least 1.
    pub fn open(path: impl AsRef<Path>, version: u32) -> Result<Self, StoreError> {
        if version == 0 {
            return Err(StoreError::InvalidVersion(version));
        }
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(&path)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        ensure_schema(&mut conn, version)?;

        Ok(Store {
            path,
            conn: Some(conn),
        })
    }

    /// Opens an existing database for reading, leaving its schema untouched.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Store {
            path,
            conn: Some(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Closes the connection. Closing twice is a no-op.
    pub fn close(&mut self) -> Result<(), StoreError> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| e)?;
            log::debug!("Closed store {}", self.path.display());
        }
        Ok(())
    }

    fn conn(&self) -> Result<&Connection, StoreError> {
        self.conn.as_ref().ok_or(StoreError::Unavailable)
    }

    /// Begins a transaction. It commits on [`Transaction::end`] only if it was
    /// marked successful, and rolls back otherwise (including when dropped).
    pub fn transaction(&mut self) -> Result<Transaction<'_>, StoreError> {
        let conn = self.conn.as_mut().ok_or(StoreError::Unavailable)?;
        Ok(Transaction {
            tx: conn.transaction()?,
            successful: false,
        })
    }

    pub fn schema_version(&self) -> Result<u32, StoreError> {
        Ok(read_version(self.conn()?)?)
    }

    /// All fixes in insertion order, each with its satellites.
    pub fn fixes(&self) -> Result<Vec<StoredFix>, StoreError> {
        let conn = self.conn()?;

        let mut satellites: HashMap<i64, Vec<StoredSatellite>> = HashMap::new();
        let mut stmt = conn.prepare(
            "SELECT id, satellite_id, type, azimuth, elevation, snr, location_id
             FROM satellite_info ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            let kind: String = row.get(2)?;
            Ok(StoredSatellite {
                id: row.get(0)?,
                observation: SatelliteObservation {
                    svid: row.get(1)?,
                    constellation: Constellation::from_name(&kind),
                    azimuth_deg: real(row, 3)?,
                    elevation_deg: real(row, 4)?,
                    snr: real(row, 5)?,
                },
                location_id: row.get(6)?,
            })
        })?;
        for row in rows {
            let satellite = row?;
            satellites
                .entry(satellite.location_id)
                .or_default()
                .push(satellite);
        }

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, latitude, longitude, accuracy
             FROM location_record ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                FixRecord {
                    timestamp: row.get(1)?,
                    latitude: real(row, 2)?,
                    longitude: real(row, 3)?,
                    accuracy: real(row, 4)?,
                },
            ))
        })?;

        let mut fixes = Vec::new();
        for row in rows {
            let (id, fix) = row?;
            fixes.push(StoredFix {
                id,
                fix,
                satellites: satellites.remove(&id).unwrap_or_default(),
            });
        }
        Ok(fixes)
    }

    /// Number of satellite rows whose `location_id` has no parent fix.
    pub fn count_orphans(&self) -> Result<u64, StoreError> {
        let count: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM satellite_info s
             LEFT JOIN location_record l ON s.location_id = l.id
             WHERE l.id IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("Failed to close store {}: {}", self.path.display(), e);
        }
    }
}

/// SQLite stores a NaN binding as NULL; read it back as NaN.
fn real(row: &Row<'_>, idx: usize) -> rusqlite::Result<f64> {
    Ok(row.get::<_, Option<f64>>(idx)?.unwrap_or(f64::NAN))
}

fn read_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

fn ensure_schema(conn: &mut Connection, version: u32) -> Result<(), StoreError> {
    let current = read_version(conn)?;
    let tx = conn.transaction()?;

    if current != 0 && current != version {
        log::warn!(
            "Schema version changed ({} -> {}), dropping all recorded data",
            current,
            version
        );
        tx.execute_batch(DROP_TABLES)?;
    }
    tx.execute_batch(CREATE_TABLES)?;
    tx.pragma_update(None, "user_version", version)?;

    tx.commit()?;
    Ok(())
}

/// A transaction on the store.
pub struct Transaction<'a> {
    tx: rusqlite::Transaction<'a>,
    successful: bool,
}

impl Transaction<'_> {
    /// Inserts a fix and returns its key.
    pub fn insert_fix(&self, fix: &FixRecord) -> rusqlite::Result<i64> {
        self.tx
            .prepare_cached(
                "INSERT INTO location_record (timestamp, latitude, longitude, accuracy)
                 VALUES (?1, ?2, ?3, ?4)",
            )?
            .execute(params![fix.timestamp, fix.latitude, fix.longitude, fix.accuracy])?;
        Ok(self.last_insert_id())
    }

    /// Inserts a satellite row under the fix `location_id`.
    pub fn insert_observation(
        &self,
        location_id: i64,
        observation: &SatelliteObservation,
    ) -> rusqlite::Result<i64> {
        let kind: &'static str = observation.constellation.into();
        self.tx
            .prepare_cached(
                "INSERT INTO satellite_info
                 (satellite_id, type, azimuth, elevation, snr, location_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?
            .execute(params![
                observation.svid,
                kind,
                observation.azimuth_deg,
                observation.elevation_deg,
                observation.snr,
                location_id
            ])?;
        Ok(self.last_insert_id())
    }

    /// Key of the last row inserted on this connection.
    pub fn last_insert_id(&self) -> i64 {
        self.tx.last_insert_rowid()
    }

    pub fn mark_successful(&mut self) {
        self.successful = true;
    }

    /// Commits if marked successful, otherwise rolls back. Returns whether
    /// the transaction was committed.
    pub fn end(self) -> rusqlite::Result<bool> {
        if self.successful {
            self.tx.commit()?;
            Ok(true)
        } else {
            self.tx.rollback()?;
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fix(lat: f64) -> FixRecord {
        FixRecord {
            timestamp: "2024-01-01 00:00:00.000".to_string(),
            latitude: lat,
            longitude: 2.0,
            accuracy: 5.0,
        }
    }

    fn gps(svid: i32) -> SatelliteObservation {
        SatelliteObservation {
            svid,
            constellation: Constellation::Gps,
            azimuth_deg: 10.0,
            elevation_deg: 45.0,
            snr: 30.0,
        }
    }

    #[test]
    fn test_open_creates_tables() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path().join(DB_FILE_NAME), SCHEMA_VERSION).unwrap();

        assert!(store.is_open());
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
        assert!(store.fixes().unwrap().is_empty());
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("logs").join(DB_FILE_NAME);
        Store::open(&path, SCHEMA_VERSION).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_marked_transaction_commits() {
        let dir = TempDir::new().unwrap();
        let mut store = Store::open(dir.path().join(DB_FILE_NAME), SCHEMA_VERSION).unwrap();

        let mut tx = store.transaction().unwrap();
        let id = tx.insert_fix(&fix(1.0)).unwrap();
        assert_eq!(tx.last_insert_id(), id);
        tx.insert_observation(id, &gps(7)).unwrap();
        tx.mark_successful();
        assert!(tx.end().unwrap());

        let fixes = store.fixes().unwrap();
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].id, id);
        assert_eq!(fixes[0].satellites.len(), 1);
        assert_eq!(fixes[0].satellites[0].location_id, id);
    }

    #[test]
    fn test_unmarked_transaction_rolls_back() {
        let dir = TempDir::new().unwrap();
        let mut store = Store::open(dir.path().join(DB_FILE_NAME), SCHEMA_VERSION).unwrap();

        let tx = store.transaction().unwrap();
        let id = tx.insert_fix(&fix(1.0)).unwrap();
        tx.insert_observation(id, &gps(7)).unwrap();
        assert!(!tx.end().unwrap());

        assert!(store.fixes().unwrap().is_empty());
        assert_eq!(store.count_orphans().unwrap(), 0);
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let dir = TempDir::new().unwrap();
        let mut store = Store::open(dir.path().join(DB_FILE_NAME), SCHEMA_VERSION).unwrap();

        {
            let mut tx = store.transaction().unwrap();
            tx.insert_fix(&fix(1.0)).unwrap();
            tx.mark_successful();
        }

        assert!(store.fixes().unwrap().is_empty());
    }

    #[test]
    fn test_foreign_key_is_enforced() {
        let dir = TempDir::new().unwrap();
        let mut store = Store::open(dir.path().join(DB_FILE_NAME), SCHEMA_VERSION).unwrap();

        let tx = store.transaction().unwrap();
        assert!(tx.insert_observation(9999, &gps(1)).is_err());
        tx.end().unwrap();
    }

    #[test]
    fn test_same_version_keeps_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DB_FILE_NAME);
        {
            let mut store = Store::open(&path, 3).unwrap();
            let mut tx = store.transaction().unwrap();
            tx.insert_fix(&fix(1.0)).unwrap();
            tx.mark_successful();
            tx.end().unwrap();
        }

        let store = Store::open(&path, 3).unwrap();
        assert_eq!(store.fixes().unwrap().len(), 1);
    }

    #[test]
    fn test_version_change_recreates_tables() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DB_FILE_NAME);
        {
            let mut store = Store::open(&path, 1).unwrap();
            let mut tx = store.transaction().unwrap();
            let id = tx.insert_fix(&fix(1.0)).unwrap();
            tx.insert_observation(id, &gps(3)).unwrap();
            tx.mark_successful();
            tx.end().unwrap();
        }

        let store = Store::open(&path, 2).unwrap();
        assert_eq!(store.schema_version().unwrap(), 2);
        assert!(store.fixes().unwrap().is_empty());
    }

    #[test]
    fn test_version_zero_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DB_FILE_NAME);

        assert!(matches!(
            Store::open(&path, 0),
            Err(StoreError::InvalidVersion(0))
        ));
        assert!(!path.exists());
    }

    #[test]
    fn test_null_reals_read_back_as_nan() {
        let dir = TempDir::new().unwrap();
        let mut store = Store::open(dir.path().join(DB_FILE_NAME), SCHEMA_VERSION).unwrap();

        let mut tx = store.transaction().unwrap();
        let id = tx
            .insert_fix(&FixRecord {
                accuracy: f64::NAN,
                ..fix(1.0)
            })
            .unwrap();
        tx.insert_observation(
            id,
            &SatelliteObservation {
                azimuth_deg: f64::NAN,
                elevation_deg: f64::NAN,
                ..gps(5)
            },
        )
        .unwrap();
        tx.mark_successful();
        tx.end().unwrap();

        let fixes = store.fixes().unwrap();
        assert_eq!(fixes[0].fix.latitude, 1.0);
        assert!(fixes[0].fix.accuracy.is_nan());
        let observation = &fixes[0].satellites[0].observation;
        assert!(observation.azimuth_deg.is_nan());
        assert!(observation.elevation_deg.is_nan());
        assert_eq!(observation.snr, 30.0);
    }

    #[test]
    fn test_read_only_open_leaves_version_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DB_FILE_NAME);
        Store::open(&path, 4).unwrap();

        let store = Store::open_read_only(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), 4);
    }

    #[test]
    fn test_closed_store_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let mut store = Store::open(dir.path().join(DB_FILE_NAME), SCHEMA_VERSION).unwrap();

        store.close().unwrap();
        store.close().unwrap();

        assert!(!store.is_open());
        assert!(matches!(store.transaction(), Err(StoreError::Unavailable)));
        assert!(matches!(store.fixes(), Err(StoreError::Unavailable)));
    }
}
