//! SQLite-backed local store, the one backend a save can never skip.

use std::path::Path;

use rusqlite::{Connection, params};
use tracing::instrument;

use crate::error::{ElisaError, Result};
use crate::io::{PlateReader, PlateWriter};
use crate::model::{self, ControlKind, Plate, Well, WellPosition};

/// Durable local persistence keyed by plate identity.
pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    /// Opens (or creates) the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Opens an in-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    fn fetch_wells(&self, plate_id: i64, plate_name: &str) -> Result<Vec<Well>> {
        let mut wells: Vec<Well> = WellPosition::all().map(Well::empty).collect();
        let mut statement = self
            .conn
            .prepare("SELECT well, sample, value, category FROM wells WHERE plate_id = ?1")?;
        let rows = statement.query_map(params![plate_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        for row in rows {
            let (label, sample, value, category) = row?;
            let position: WellPosition = label.parse().map_err(|_| {
                ElisaError::LocalStore(format!(
                    "invalid well label '{label}' stored for plate '{plate_name}'"
                ))
            })?;
            let control = match category {
                Some(text) => Some(ControlKind::from_label(&text).ok_or_else(|| {
                    ElisaError::LocalStore(format!(
                        "unknown control category '{text}' in well {position} of plate '{plate_name}'"
                    ))
                })?),
                None => None,
            };

            let well = &mut wells[position.index()];
            well.sample_name = sample;
            well.value = value;
            well.control = control;
        }
        Ok(wells)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS plates (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE (name, created_at)
        );

        CREATE TABLE IF NOT EXISTS wells (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            plate_id INTEGER NOT NULL REFERENCES plates(id) ON DELETE CASCADE,
            well TEXT NOT NULL,
            sample TEXT,
            value REAL,
            category TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_wells_plate ON wells(plate_id);
        CREATE INDEX IF NOT EXISTS idx_plates_created ON plates(created_at);
        ",
    )?;
    Ok(())
}

impl PlateWriter for LocalStore {
    /// Upserts the plate and its 96 wells in one transaction. An existing
    /// record with the same `(name, created_at)` identity is fully replaced,
    /// which makes re-saving an identical plate idempotent.
    #[instrument(level = "debug", skip_all, fields(plate = %plate.name()))]
    fn save(&mut self, plate: &Plate) -> Result<()> {
        let created_at = model::format_timestamp(plate.created_at());

        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM plates WHERE name = ?1 AND created_at = ?2",
            params![plate.name(), created_at],
        )?;
        tx.execute(
            "INSERT INTO plates (name, created_at) VALUES (?1, ?2)",
            params![plate.name(), created_at],
        )?;
        let plate_id = tx.last_insert_rowid();

        {
            let mut statement = tx.prepare(
                "INSERT INTO wells (plate_id, well, sample, value, category)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for well in plate.wells() {
                statement.execute(params![
                    plate_id,
                    well.position.to_string(),
                    well.sample_name,
                    well.value,
                    well.control.map(|kind| kind.label()),
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}

impl PlateReader for LocalStore {
    /// Returns every stored plate in ascending `created_at` order, fully
    /// reconstructed.
    fn fetch_all(&mut self) -> Result<Vec<Plate>> {
        let headers: Vec<(i64, String, String)> = {
            let mut statement = self
                .conn
                .prepare("SELECT id, name, created_at FROM plates ORDER BY created_at ASC, id ASC")?;
            let rows = statement
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?;
            rows.collect::<std::result::Result<_, _>>()?
        };

        let mut plates = Vec::with_capacity(headers.len());
        for (plate_id, name, created_at) in headers {
            let created_at = model::parse_timestamp(&created_at).ok_or_else(|| {
                ElisaError::LocalStore(format!(
                    "invalid created_at '{created_at}' stored for plate '{name}'"
                ))
            })?;
            let wells = self.fetch_wells(plate_id, &name)?;
            let plate = Plate::from_stored(name, created_at, wells)
                .map_err(|error| ElisaError::LocalStore(error.to_string()))?;
            plates.push(plate);
        }
        Ok(plates)
    }
}
