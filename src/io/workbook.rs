//! Mirrors plates into an xlsx workbook, one sheet per plate.
//!
//! `rust_xlsxwriter` can only produce whole files, so a re-save reads every
//! existing sheet back through `calamine` as plain cell text, swaps in the
//! plate's freshly rendered section, and rewrites the workbook in place.

use std::path::{Path, PathBuf};

use calamine::{DataType, Reader, Xlsx, open_workbook};
use rust_xlsxwriter::Workbook;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::grid::{self, SheetTable};
use crate::io::PlateWriter;
use crate::model::Plate;

/// Workbook mirror of the plate store, keyed by (sanitised) plate name.
pub struct WorkbookStore {
    path: PathBuf,
}

impl WorkbookStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_tables(&self) -> Result<Vec<SheetTable>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut workbook: Xlsx<_> = open_workbook(&self.path)?;
        let names: Vec<String> = workbook.sheet_names().to_vec();
        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let range = match workbook.worksheet_range(&name) {
                Some(range) => range?,
                None => continue,
            };
            let rows = range
                .rows()
                .map(|row| row.iter().map(cell_to_string).collect())
                .collect();
            tables.push(SheetTable {
                sheet_name: name,
                rows,
            });
        }
        Ok(tables)
    }
}

impl PlateWriter for WorkbookStore {
    /// Overwrites the sheet for `plate.name` if one exists, appends a new
    /// sheet otherwise. Other plates' sheets are carried over untouched.
    #[instrument(level = "debug", skip_all, fields(plate = %plate.name(), path = %self.path.display()))]
    fn save(&mut self, plate: &Plate) -> Result<()> {
        let mut tables = self.load_tables()?;
        let section = grid::plate_section(plate);
        match tables
            .iter_mut()
            .find(|table| table.sheet_name == section.sheet_name)
        {
            Some(existing) => *existing = section,
            None => tables.push(section),
        }

        debug!(sheet_count = tables.len(), "rewriting workbook");
        write_tables(&self.path, &tables)
    }
}

fn write_tables(path: &Path, tables: &[SheetTable]) -> Result<()> {
    let mut writer = Workbook::new();
    for table in tables {
        let worksheet = writer.add_worksheet();
        worksheet.set_name(table.sheet_name.as_str())?;
        for (row_index, row) in table.rows.iter().enumerate() {
            for (column_index, cell) in row.iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                worksheet.write_string(row_index as u32, column_index as u16, cell.as_str())?;
            }
        }
    }
    writer.save(path)?;
    Ok(())
}

fn cell_to_string(cell: &DataType) -> String {
    match cell {
        DataType::String(value) => value.clone(),
        DataType::Float(value) => value.to_string(),
        DataType::Int(value) => value.to_string(),
        DataType::Bool(value) => value.to_string(),
        DataType::Empty => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use super::*;
    use crate::model::{Well, WellPosition};

    fn plate(name: &str, sample: &str) -> Plate {
        let mut wells: Vec<Well> = WellPosition::all().map(Well::empty).collect();
        wells[0].sample_name = Some(sample.to_string());
        wells[0].value = Some(0.5);
        Plate::from_stored(
            name,
            Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap(),
            wells,
        )
        .expect("plate built")
    }

    #[test]
    fn resave_overwrites_the_section_and_keeps_other_sheets() {
        let dir = tempdir().expect("temp dir");
        let mut store = WorkbookStore::new(dir.path().join("elisa.xlsx"));

        store.save(&plate("Run-1", "S1")).expect("first plate saved");
        store.save(&plate("Run-2", "S9")).expect("second plate saved");
        store
            .save(&plate("Run-1", "S1-corrected"))
            .expect("resave succeeded");

        let tables = store.load_tables().expect("workbook read back");
        assert_eq!(tables.len(), 2);

        let run_1 = tables
            .iter()
            .find(|table| table.sheet_name == "Run-1")
            .expect("Run-1 sheet present");
        // Metadata row, blank row, Samples header, then row A.
        assert_eq!(run_1.rows[3][1], "S1-corrected");

        let run_2 = tables
            .iter()
            .find(|table| table.sheet_name == "Run-2")
            .expect("Run-2 sheet present");
        assert_eq!(run_2.rows[3][1], "S9");
    }
}
