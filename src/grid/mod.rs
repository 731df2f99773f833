use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::model::{
    self, COLUMN_COUNT, ControlKind, Plate, ROW_COUNT, Well, WellPosition,
};

/// Marker accepted in pasted grids for an intentionally empty cell.
pub const EMPTY_CELL_MARKER: &str = "-";

/// Number of rows a rendered plate section occupies: the metadata row plus
/// three header-led 8x12 blocks separated by blank rows.
const SECTION_ROW_COUNT: usize = 1 + 3 * (ROW_COUNT + 2);

/// A table that will be materialised as one section of a spreadsheet
/// document, either a workbook sheet or a remote worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub sheet_name: String,
    pub rows: Vec<Vec<String>>,
}

/// Parses a pasted sample-name grid into exactly 8 rows of 12 optional
/// labels. Cells are separated by tabs, commas, or whitespace; tab and comma
/// separators preserve empty cells, and `-` marks an empty cell explicitly.
pub fn parse_sample_grid(text: &str) -> Result<Vec<Vec<Option<String>>>, ValidationError> {
    let rows = parse_cells(text)?;
    Ok(rows
        .into_iter()
        .map(|row| row.iter().map(|cell| normalize_cell(cell)).collect())
        .collect())
}

/// Parses a pasted measurement grid into exactly 8 rows of 12 optional
/// numbers. A non-numeric, non-empty cell is rejected outright rather than
/// silently dropped.
pub fn parse_value_grid(text: &str) -> Result<Vec<Vec<Option<f64>>>, ValidationError> {
    let rows = parse_cells(text)?;
    let mut values = Vec::with_capacity(ROW_COUNT);
    for (row_index, row) in rows.iter().enumerate() {
        let mut value_row = Vec::with_capacity(COLUMN_COUNT);
        for (column_index, cell) in row.iter().enumerate() {
            let value = match normalize_cell(cell) {
                Some(text) => Some(text.parse::<f64>().map_err(|_| {
                    ValidationError::MalformedGrid(format!(
                        "invalid value '{text}' in well {}",
                        cell_label(row_index, column_index)
                    ))
                })?),
                None => None,
            };
            value_row.push(value);
        }
        values.push(value_row);
    }
    Ok(values)
}

/// Parses a comma- or whitespace-separated list of well labels such as
/// `"A1, B2 C3"`. Labels are case-insensitive.
pub fn parse_positions(text: &str) -> Result<Vec<WellPosition>, ValidationError> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(str::parse)
        .collect()
}

/// Builds the position → control-kind map from per-category well lists. A
/// position named in more than one list takes the last assignment.
pub fn control_map(
    assignments: &[(ControlKind, &str)],
) -> Result<BTreeMap<WellPosition, ControlKind>, ValidationError> {
    let mut map = BTreeMap::new();
    for (kind, text) in assignments {
        for position in parse_positions(text)? {
            map.insert(position, *kind);
        }
    }
    Ok(map)
}

/// Assembles a new plate from parsed grids and control assignments. The
/// result still has to pass [`Plate::validate`] before it is persisted.
pub fn build_plate(
    name: &str,
    samples: Vec<Vec<Option<String>>>,
    values: Vec<Vec<Option<f64>>>,
    controls: &BTreeMap<WellPosition, ControlKind>,
) -> Result<Plate, ValidationError> {
    check_shape(&samples, "sample grid")?;
    check_shape(&values, "value grid")?;

    let mut wells: Vec<Well> = WellPosition::all().map(Well::empty).collect();
    for (row_index, (sample_row, value_row)) in samples.into_iter().zip(values).enumerate() {
        for (column_index, (sample, value)) in sample_row.into_iter().zip(value_row).enumerate() {
            let well = &mut wells[row_index * COLUMN_COUNT + column_index];
            well.sample_name = sample;
            well.value = value;
        }
    }
    for (position, kind) in controls {
        wells[position.index()].control = Some(*kind);
    }

    Plate::new(name, wells)
}

/// Renders a plate into its spreadsheet section: a metadata row followed by
/// the Samples, Values, and Controls blocks in exact grid order. Control
/// wells are marked structurally in the Controls block with their category
/// label, so the section survives round-trips through plain cell text.
pub fn plate_section(plate: &Plate) -> SheetTable {
    let mut rows = Vec::with_capacity(SECTION_ROW_COUNT);
    rows.push(vec![
        "Plate".to_string(),
        plate.name().to_string(),
        "Created".to_string(),
        model::format_timestamp(plate.created_at()),
    ]);

    push_block(&mut rows, plate, "Samples", |well| {
        well.sample_name.clone().unwrap_or_default()
    });
    push_block(&mut rows, plate, "Values", |well| {
        well.value.map(|value| value.to_string()).unwrap_or_default()
    });
    push_block(&mut rows, plate, "Controls", |well| {
        well.control
            .map(|kind| kind.label().to_string())
            .unwrap_or_default()
    });

    SheetTable {
        sheet_name: sanitize_sheet_name(plate.name()),
        rows,
    }
}

/// Parses a section previously produced by [`plate_section`] back into a
/// plate. Used when reading the remote document.
pub fn parse_section(rows: &[Vec<String>]) -> Result<Plate, ValidationError> {
    let rows: Vec<Vec<String>> = rows.iter().map(|row| trim_trailing(row)).collect();
    if rows.len() != SECTION_ROW_COUNT {
        return Err(ValidationError::MalformedGrid(format!(
            "section has {} rows, expected {SECTION_ROW_COUNT}",
            rows.len()
        )));
    }

    let meta = &rows[0];
    if meta.len() < 4 || meta[0] != "Plate" || meta[2] != "Created" {
        return Err(ValidationError::MalformedGrid(
            "missing plate metadata row".to_string(),
        ));
    }
    let name = meta[1].clone();
    let created_at = model::parse_timestamp(&meta[3]).ok_or_else(|| {
        ValidationError::MalformedGrid(format!("invalid timestamp '{}'", meta[3]))
    })?;

    let block_len = ROW_COUNT + 1;
    let samples = parse_block(&rows[2..2 + block_len], "Samples")?;
    let values = parse_block(&rows[3 + block_len..3 + 2 * block_len], "Values")?;
    let controls = parse_block(&rows[4 + 2 * block_len..4 + 3 * block_len], "Controls")?;

    let mut wells: Vec<Well> = WellPosition::all().map(Well::empty).collect();
    for row_index in 0..ROW_COUNT {
        for column_index in 0..COLUMN_COUNT {
            let label = cell_label(row_index, column_index);
            let well = &mut wells[row_index * COLUMN_COUNT + column_index];
            well.sample_name = normalize_cell(&samples[row_index][column_index]);
            well.value = match normalize_cell(&values[row_index][column_index]) {
                Some(text) => Some(text.parse::<f64>().map_err(|_| {
                    ValidationError::MalformedGrid(format!(
                        "invalid value '{text}' in well {label}"
                    ))
                })?),
                None => None,
            };
            well.control = match normalize_cell(&controls[row_index][column_index]) {
                Some(text) => Some(ControlKind::from_label(&text).ok_or_else(|| {
                    ValidationError::MalformedGrid(format!(
                        "unknown control kind '{text}' in well {label}"
                    ))
                })?),
                None => None,
            };
        }
    }

    Plate::from_stored(name, created_at, wells)
}

fn push_block(
    rows: &mut Vec<Vec<String>>,
    plate: &Plate,
    title: &str,
    cell: impl Fn(&Well) -> String,
) {
    rows.push(Vec::new());

    let mut header = Vec::with_capacity(COLUMN_COUNT + 1);
    header.push(title.to_string());
    for column in 1..=COLUMN_COUNT {
        header.push(column.to_string());
    }
    rows.push(header);

    for row_index in 0..ROW_COUNT {
        let mut cells = Vec::with_capacity(COLUMN_COUNT + 1);
        cells.push(((b'A' + row_index as u8) as char).to_string());
        for column_index in 0..COLUMN_COUNT {
            cells.push(cell(&plate.wells()[row_index * COLUMN_COUNT + column_index]));
        }
        rows.push(cells);
    }
}

// Rows may arrive with trailing empty cells trimmed; pad each one back to
// the full grid width.
fn parse_block(
    rows: &[Vec<String>],
    title: &str,
) -> Result<Vec<Vec<String>>, ValidationError> {
    let header = &rows[0];
    if header.first().map(String::as_str) != Some(title) {
        return Err(ValidationError::MalformedGrid(format!(
            "missing '{title}' block"
        )));
    }

    let mut block = Vec::with_capacity(ROW_COUNT);
    for (row_index, row) in rows[1..].iter().enumerate() {
        let expected = ((b'A' + row_index as u8) as char).to_string();
        if row.first() != Some(&expected) {
            return Err(ValidationError::MalformedGrid(format!(
                "'{title}' block is missing row {expected}"
            )));
        }
        if row.len() > COLUMN_COUNT + 1 {
            return Err(ValidationError::MalformedGrid(format!(
                "'{title}' row {expected} has {} columns, expected {COLUMN_COUNT}",
                row.len() - 1
            )));
        }
        block.push(
            (0..COLUMN_COUNT)
                .map(|index| row.get(index + 1).cloned().unwrap_or_default())
                .collect(),
        );
    }
    Ok(block)
}

fn parse_cells(text: &str) -> Result<Vec<Vec<String>>, ValidationError> {
    let lines: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    if lines.len() != ROW_COUNT {
        return Err(ValidationError::MalformedGrid(format!(
            "expected {ROW_COUNT} rows, found {}",
            lines.len()
        )));
    }

    let mut rows = Vec::with_capacity(ROW_COUNT);
    for (row_index, line) in lines.iter().enumerate() {
        let cells = tokenize_line(line);
        if cells.len() != COLUMN_COUNT {
            return Err(ValidationError::MalformedGrid(format!(
                "row {} has {} columns, expected {COLUMN_COUNT}",
                (b'A' + row_index as u8) as char,
                cells.len()
            )));
        }
        rows.push(cells);
    }
    Ok(rows)
}

// Tab and comma separators keep empty cells positional; bare whitespace
// cannot, which is what the `-` marker is for.
fn tokenize_line(line: &str) -> Vec<String> {
    if line.contains('\t') {
        line.split('\t').map(|cell| cell.trim().to_string()).collect()
    } else if line.contains(',') {
        line.split(',').map(|cell| cell.trim().to_string()).collect()
    } else {
        line.split_whitespace().map(str::to_string).collect()
    }
}

fn normalize_cell(cell: &str) -> Option<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || trimmed == EMPTY_CELL_MARKER {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn check_shape<T>(rows: &[Vec<T>], what: &str) -> Result<(), ValidationError> {
    if rows.len() != ROW_COUNT {
        return Err(ValidationError::MalformedGrid(format!(
            "{what} has {} rows, expected {ROW_COUNT}",
            rows.len()
        )));
    }
    for (row_index, row) in rows.iter().enumerate() {
        if row.len() != COLUMN_COUNT {
            return Err(ValidationError::MalformedGrid(format!(
                "{what} row {} has {} columns, expected {COLUMN_COUNT}",
                (b'A' + row_index as u8) as char,
                row.len()
            )));
        }
    }
    Ok(())
}

fn cell_label(row_index: usize, column_index: usize) -> String {
    format!("{}{}", (b'A' + row_index as u8) as char, column_index + 1)
}

fn trim_trailing(row: &[String]) -> Vec<String> {
    let mut cells = row.to_vec();
    while cells.last().is_some_and(|cell| cell.trim().is_empty()) {
        cells.pop();
    }
    cells
}

/// Keeps section names inside Excel's sheet naming rules.
pub fn sanitize_sheet_name(raw: &str) -> String {
    let invalid = [':', '\\', '/', '?', '*', '[', ']', '\'', '"'];
    let mut sanitized: String = raw
        .chars()
        .map(|ch| {
            if invalid.contains(&ch) || ch.is_control() {
                '_'
            } else {
                ch
            }
        })
        .collect();

    sanitized = sanitized.trim().to_string();
    if sanitized.is_empty() {
        sanitized = "Plate".to_string();
    }

    if sanitized.len() > 31 {
        sanitized.truncate(31);
    }

    sanitized
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn dashes(filled: &[&str]) -> String {
        let mut lines = Vec::with_capacity(ROW_COUNT);
        for row in 0..ROW_COUNT {
            let mut cells: Vec<String> = vec![EMPTY_CELL_MARKER.to_string(); COLUMN_COUNT];
            if row == 0 {
                for (index, cell) in filled.iter().enumerate() {
                    cells[index] = (*cell).to_string();
                }
            }
            lines.push(cells.join(" "));
        }
        lines.join("\n")
    }

    #[test]
    fn whitespace_grid_parses_with_empty_markers() {
        let samples = parse_sample_grid(&dashes(&["S1", "S2"])).expect("grid parsed");
        assert_eq!(samples[0][0].as_deref(), Some("S1"));
        assert_eq!(samples[0][1].as_deref(), Some("S2"));
        assert_eq!(samples[0][2], None);
        assert_eq!(samples[7][11], None);
    }

    #[test]
    fn tab_separated_grid_preserves_empty_cells() {
        let line_a = format!("S1\t\tS3{}", "\t-".repeat(COLUMN_COUNT - 3));
        let rest =
            vec![vec![EMPTY_CELL_MARKER; COLUMN_COUNT].join("\t"); ROW_COUNT - 1].join("\n");
        let samples =
            parse_sample_grid(&format!("{line_a}\n{rest}")).expect("grid parsed");
        assert_eq!(samples[0][0].as_deref(), Some("S1"));
        assert_eq!(samples[0][1], None);
        assert_eq!(samples[0][2].as_deref(), Some("S3"));
        assert_eq!(samples[3][5], None);
    }

    #[test]
    fn short_grid_is_rejected() {
        let text = dashes(&[]).lines().take(7).collect::<Vec<_>>().join("\n");
        assert!(matches!(
            parse_sample_grid(&text),
            Err(ValidationError::MalformedGrid(_))
        ));
    }

    #[test]
    fn ragged_row_is_rejected_by_letter() {
        let mut lines: Vec<String> = dashes(&[]).lines().map(str::to_string).collect();
        lines[2] = "- -".to_string();
        let error = parse_sample_grid(&lines.join("\n")).expect_err("ragged grid rejected");
        assert_eq!(
            error,
            ValidationError::MalformedGrid("row C has 2 columns, expected 12".to_string())
        );
    }

    #[test]
    fn bad_value_cell_names_the_well() {
        let error =
            parse_value_grid(&dashes(&["0.1", "abc"])).expect_err("bad value rejected");
        assert_eq!(
            error,
            ValidationError::MalformedGrid("invalid value 'abc' in well A2".to_string())
        );
    }

    #[test]
    fn later_control_list_wins_on_duplicates() {
        let map = control_map(&[
            (ControlKind::Positive, "A1, A2"),
            (ControlKind::SubstrateBlank, "a2"),
        ])
        .expect("control map parsed");
        let a1: WellPosition = "A1".parse().expect("position");
        let a2: WellPosition = "A2".parse().expect("position");
        assert_eq!(map.get(&a1), Some(&ControlKind::Positive));
        assert_eq!(map.get(&a2), Some(&ControlKind::SubstrateBlank));
    }

    #[test]
    fn section_roundtrips_a_plate() {
        let samples = parse_sample_grid(&dashes(&["S1", "S2", "S3"])).expect("samples");
        let values = parse_value_grid(&dashes(&["0.12", "0.34", "0.56"])).expect("values");
        let controls = control_map(&[(ControlKind::Positive, "A1")]).expect("controls");
        let plate = build_plate("Run-42", samples, values, &controls).expect("plate built");
        let plate = Plate::from_stored(
            plate.name(),
            Utc.with_ymd_and_hms(2026, 8, 7, 12, 0, 0).unwrap(),
            plate.wells().to_vec(),
        )
        .expect("plate restamped");

        let section = plate_section(&plate);
        assert_eq!(section.sheet_name, "Run-42");
        let restored = parse_section(&section.rows).expect("section parsed");
        assert_eq!(restored, plate);
    }

    #[test]
    fn garbage_section_is_rejected() {
        let rows = vec![vec!["not".to_string(), "a".to_string(), "plate".to_string()]];
        assert!(matches!(
            parse_section(&rows),
            Err(ValidationError::MalformedGrid(_))
        ));
    }

    #[test]
    fn sheet_names_are_sanitised() {
        assert_eq!(sanitize_sheet_name("Run: 42/a"), "Run_ 42_a");
        assert_eq!(sanitize_sheet_name(""), "Plate");
        assert_eq!(sanitize_sheet_name(&"x".repeat(40)).len(), 31);
    }
}
