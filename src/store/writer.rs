use super::error::{StoreError, WriteError};
use super::records::FixRecord;
use super::schema::{Store, Transaction};
use crate::gnss::SatelliteObservation;

/// Persists a fix together with its satellites as one unit.
pub struct TransactionalWriter {
    store: Store,
}

impl TransactionalWriter {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Writes `fix` and every observation under it in a single transaction,
    /// returning the fix key. On any failure nothing from this call is kept.
    pub fn write(
        &mut self,
        fix: &FixRecord,
        observations: &[SatelliteObservation],
    ) -> Result<i64, WriteError> {
        let mut tx = self.store.transaction()?;

        let result = insert_all(&tx, fix, observations);
        if result.is_ok() {
            tx.mark_successful();
        }

        match (result, tx.end()) {
            (Ok(location_id), Ok(_)) => Ok(location_id),
            (Err(e), _) => Err(e.into()),
            (Ok(_), Err(e)) => Err(e.into()),
        }
    }

    pub fn close(&mut self) -> Result<(), StoreError> {
        self.store.close()
    }
}

fn insert_all(
    tx: &Transaction<'_>,
    fix: &FixRecord,
    observations: &[SatelliteObservation],
) -> rusqlite::Result<i64> {
    let location_id = tx.insert_fix(fix)?;
    for observation in observations {
        tx.insert_observation(location_id, observation)?;
    }
    Ok(location_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gnss::Constellation;
    use crate::store::{DB_FILE_NAME, SCHEMA_VERSION};
    use std::path::Path;
    use tempfile::TempDir;

    fn fix(lat: f64, lon: f64, accuracy: f64) -> FixRecord {
        FixRecord {
            timestamp: "2024-05-01 12:00:00.250".to_string(),
            latitude: lat,
            longitude: lon,
            accuracy,
        }
    }

    fn sat(svid: i32, constellation: Constellation) -> SatelliteObservation {
        SatelliteObservation {
            svid,
            constellation,
            azimuth_deg: 10.0,
            elevation_deg: 45.0,
            snr: 30.0,
        }
    }

    fn writer(path: &Path) -> TransactionalWriter {
        TransactionalWriter::new(Store::open(path, SCHEMA_VERSION).unwrap())
    }

    /// Makes every insert of `svid` into satellite_info abort.
    fn inject_fault(path: &Path, svid: i32) {
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute_batch(&format!(
            "CREATE TRIGGER fail_svid_{svid} BEFORE INSERT ON satellite_info
             WHEN NEW.satellite_id = {svid}
             BEGIN SELECT RAISE(ABORT, 'injected fault'); END;"
        ))
        .unwrap();
    }

    #[test]
    fn test_write_links_children_to_fix() {
        let dir = TempDir::new().unwrap();
        let mut writer = writer(&dir.path().join(DB_FILE_NAME));

        let id = writer
            .write(
                &fix(1.0, 2.0, 5.0),
                &[sat(1, Constellation::Gps), sat(20, Constellation::Galileo)],
            )
            .unwrap();

        let fixes = writer.store().fixes().unwrap();
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].id, id);
        assert_eq!(fixes[0].fix, fix(1.0, 2.0, 5.0));
        let svids: Vec<i32> = fixes[0].satellites.iter().map(|s| s.observation.svid).collect();
        assert_eq!(svids, [1, 20]);
        assert!(fixes[0].satellites.iter().all(|s| s.location_id == id));
    }

    #[test]
    fn test_write_without_satellites() {
        let dir = TempDir::new().unwrap();
        let mut writer = writer(&dir.path().join(DB_FILE_NAME));

        writer.write(&fix(1.0, 2.0, 5.0), &[]).unwrap();

        let fixes = writer.store().fixes().unwrap();
        assert_eq!(fixes.len(), 1);
        assert!(fixes[0].satellites.is_empty());
    }

    #[test]
    fn test_keys_increase() {
        let dir = TempDir::new().unwrap();
        let mut writer = writer(&dir.path().join(DB_FILE_NAME));

        let first = writer.write(&fix(1.0, 1.0, 1.0), &[]).unwrap();
        let second = writer.write(&fix(2.0, 2.0, 2.0), &[]).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_failure_mid_transaction_keeps_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DB_FILE_NAME);
        let mut writer = writer(&path);
        inject_fault(&path, 13);

        let result = writer.write(
            &fix(1.0, 2.0, 5.0),
            &[
                sat(1, Constellation::Gps),
                sat(2, Constellation::Gps),
                sat(13, Constellation::Glonass),
                sat(14, Constellation::Glonass),
            ],
        );

        assert!(matches!(result, Err(WriteError::Transaction(_))));
        assert!(writer.store().fixes().unwrap().is_empty());
        assert_eq!(writer.store().count_orphans().unwrap(), 0);
    }

    #[test]
    fn test_failed_fix_insert_keeps_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DB_FILE_NAME);
        let mut writer = writer(&path);
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER fail_fix BEFORE INSERT ON location_record
             WHEN NEW.latitude = 66.0
             BEGIN SELECT RAISE(ABORT, 'injected fault'); END;",
        )
        .unwrap();

        let result = writer.write(
            &fix(66.0, 2.0, 5.0),
            &[sat(1, Constellation::Gps), sat(2, Constellation::Sbas)],
        );
        assert!(matches!(result, Err(WriteError::Transaction(_))));
        assert!(writer.store().fixes().unwrap().is_empty());
        assert_eq!(writer.store().count_orphans().unwrap(), 0);

        writer
            .write(&fix(1.0, 2.0, 5.0), &[sat(1, Constellation::Gps)])
            .unwrap();
        assert_eq!(writer.store().fixes().unwrap().len(), 1);
    }

    #[test]
    fn test_nan_readings_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut writer = writer(&dir.path().join(DB_FILE_NAME));

        let unreadable = SatelliteObservation {
            snr: f64::NAN,
            ..sat(8, Constellation::Galileo)
        };
        writer
            .write(&fix(1.0, 2.0, 5.0), &[unreadable, sat(9, Constellation::Gps)])
            .unwrap();
        writer.write(&fix(3.0, 4.0, 5.0), &[]).unwrap();

        let fixes = writer.store().fixes().unwrap();
        assert_eq!(fixes.len(), 2);
        let satellites = &fixes[0].satellites;
        assert_eq!(satellites[0].observation.svid, 8);
        assert!(satellites[0].observation.snr.is_nan());
        assert_eq!(satellites[0].observation.azimuth_deg, 10.0);
        assert_eq!(satellites[1].observation.snr, 30.0);
    }

    #[test]
    fn test_failure_does_not_poison_later_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DB_FILE_NAME);
        let mut writer = writer(&path);
        inject_fault(&path, 13);

        assert!(writer
            .write(&fix(1.0, 1.0, 1.0), &[sat(13, Constellation::Gps)])
            .is_err());
        let id = writer
            .write(&fix(2.0, 2.0, 2.0), &[sat(4, Constellation::Gps)])
            .unwrap();

        let fixes = writer.store().fixes().unwrap();
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].id, id);
        assert_eq!(fixes[0].fix.latitude, 2.0);
        assert_eq!(fixes[0].satellites.len(), 1);
    }

    #[test]
    fn test_closed_store_fails_every_write() {
        let dir = TempDir::new().unwrap();
        let mut writer = writer(&dir.path().join(DB_FILE_NAME));
        writer.close().unwrap();

        for _ in 0..2 {
            assert!(matches!(
                writer.write(&fix(1.0, 2.0, 5.0), &[]),
                Err(WriteError::StoreUnavailable)
            ));
        }
    }
}
