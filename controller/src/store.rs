use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{Local, NaiveDateTime, Timelike};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use climate_common::{ReadingFields, SensorReading, TIMESTAMP_FORMAT};

use crate::error::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sensor_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    bme_temp REAL,
    bme_press REAL,
    bme_gas REAL,
    scd_co2 INTEGER,
    scd_hum REAL
)";

const SELECT_COLUMNS: &str = "SELECT id, timestamp, bme_temp, bme_press, bme_gas, scd_co2, scd_hum
     FROM sensor_data";

struct StoreInner {
    conn: Connection,
    last_timestamp: Option<NaiveDateTime>,
}

/// Append-only telemetry table. Cloning shares the same connection; every call
/// is serialized on an internal lock and commits before returning.
#[derive(Clone)]
pub struct TelemetryStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl TelemetryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self::with_connection(Connection::open(path)?)?;
        info!("telemetry store opened at {}", path.display());
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(SCHEMA, [])?;
        let store = Self {
            inner: Arc::new(Mutex::new(StoreInner {
                conn,
                last_timestamp: None,
            })),
        };

        let last_timestamp = store.latest()?.map(|reading| reading.timestamp);
        store.lock()?.last_timestamp = last_timestamp;
        Ok(store)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn append(&self, fields: &ReadingFields) -> Result<SensorReading, StoreError> {
        let mut inner = self.lock()?;

        let now = Local::now().naive_local();
        let now = now.with_nanosecond(0).unwrap_or(now);
        // Wall clock may step backwards; stored order must not.
        let timestamp = match inner.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };

        inner.conn.execute(
            "INSERT INTO sensor_data (timestamp, bme_temp, bme_press, bme_gas, scd_co2, scd_hum)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                timestamp.format(TIMESTAMP_FORMAT).to_string(),
                fields.temperature,
                fields.pressure,
                fields.gas,
                fields.co2,
                fields.humidity,
            ],
        )?;
        let id = inner.conn.last_insert_rowid();
        inner.last_timestamp = Some(timestamp);

        Ok(SensorReading {
            id,
            timestamp,
            fields: *fields,
        })
    }

    pub fn latest(&self) -> Result<Option<SensorReading>, StoreError> {
        let inner = self.lock()?;
        let raw = inner
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT 1"),
                [],
                RawReading::from_row,
            )
            .optional()?;
        raw.map(RawReading::into_reading).transpose()
    }

    /// Up to `limit` newest readings, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<SensorReading>, StoreError> {
        let inner = self.lock()?;
        let mut stmt = inner
            .conn
            .prepare(&format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1"))?;
        let rows = stmt.query_map(params![limit as i64], RawReading::from_row)?;

        let mut readings = Vec::new();
        for row in rows {
            readings.push(row?.into_reading()?);
        }
        Ok(readings)
    }
}

struct RawReading {
    id: i64,
    timestamp: String,
    fields: ReadingFields,
}

impl RawReading {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            fields: ReadingFields {
                temperature: row.get(2)?,
                pressure: row.get(3)?,
                gas: row.get(4)?,
                co2: row.get(5)?,
                humidity: row.get(6)?,
            },
        })
    }

    fn into_reading(self) -> Result<SensorReading, StoreError> {
        let timestamp = NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT)
            .map_err(|_| StoreError::Timestamp(self.timestamp.clone()))?;
        Ok(SensorReading {
            id: self.id,
            timestamp,
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp(value: f64) -> ReadingFields {
        ReadingFields {
            temperature: Some(value),
            ..ReadingFields::default()
        }
    }

    #[test]
    fn empty_store_has_no_latest() {
        let store = TelemetryStore::open_in_memory().unwrap();
        assert_eq!(store.latest().unwrap(), None);
        assert!(store.recent(10).unwrap().is_empty());
    }

    #[test]
    fn identical_appends_get_increasing_ids() {
        let store = TelemetryStore::open_in_memory().unwrap();

        let first = store.append(&temp(21.0)).unwrap();
        let second = store.append(&temp(21.0)).unwrap();

        assert!(second.id > first.id);
        assert!(second.timestamp >= first.timestamp);
        assert_eq!(store.latest().unwrap(), Some(second));
    }

    #[test]
    fn latest_round_trips_every_column() {
        let store = TelemetryStore::open_in_memory().unwrap();
        let fields = ReadingFields {
            temperature: Some(21.5),
            pressure: Some(1008.25),
            gas: None,
            co2: Some(640),
            humidity: Some(38.5),
        };

        let stored = store.append(&fields).unwrap();
        let latest = store.latest().unwrap().unwrap();

        assert_eq!(latest, stored);
        assert_eq!(latest.fields, fields);
    }

    #[test]
    fn recent_is_newest_first_and_bounded() {
        let store = TelemetryStore::open_in_memory().unwrap();
        for value in [20.0, 21.0, 22.0, 23.0] {
            store.append(&temp(value)).unwrap();
        }

        let recent = store.recent(3).unwrap();
        let temps: Vec<_> = recent.iter().map(|r| r.fields.temperature).collect();

        assert_eq!(temps, vec![Some(23.0), Some(22.0), Some(21.0)]);
    }

    #[test]
    fn concurrent_appends_stay_distinct() {
        let store = TelemetryStore::open_in_memory().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let store = store.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .map(|_| store.append(&temp(worker as f64)).unwrap().id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids: Vec<i64> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();

        assert_eq!(ids.len(), 100);
        assert_eq!(store.latest().unwrap().unwrap().id, *ids.last().unwrap());
    }

    #[test]
    fn reopening_file_keeps_history() {
        let dir = std::env::temp_dir().join(format!("climate-store-{}", std::process::id()));
        let path = dir.join("sensor_data.db");
        let _ = std::fs::remove_file(&path);

        let first = TelemetryStore::open(&path).unwrap();
        let stored = first.append(&temp(19.5)).unwrap();
        drop(first);

        let reopened = TelemetryStore::open(&path).unwrap();
        assert_eq!(reopened.latest().unwrap(), Some(stored));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
