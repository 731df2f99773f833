use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::ValidationError;

/// Number of rows on an ELISA plate (A through H).
pub const ROW_COUNT: usize = 8;
/// Number of columns on an ELISA plate (1 through 12).
pub const COLUMN_COUNT: usize = 12;
/// Total number of wells on a plate.
pub const WELL_COUNT: usize = ROW_COUNT * COLUMN_COUNT;

/// Address of one well on the 8x12 grid, row letter A-H plus column
/// number 1-12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WellPosition {
    row: u8,
    column: u8,
}

impl WellPosition {
    /// Iterates every position on the plate in row-major order, A1 through
    /// H12. Grid indices and well vectors follow this order throughout the
    /// crate.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..WELL_COUNT).map(|index| Self {
            row: (index / COLUMN_COUNT) as u8,
            column: (index % COLUMN_COUNT) as u8,
        })
    }

    /// Row-major index of this position inside a plate's well vector.
    pub fn index(&self) -> usize {
        self.row as usize * COLUMN_COUNT + self.column as usize
    }

    /// Zero-based row index (A is 0).
    pub fn row(&self) -> usize {
        self.row as usize
    }

    /// Zero-based column index (1 is 0).
    pub fn column(&self) -> usize {
        self.column as usize
    }

    /// Row letter as printed on the plate, A through H.
    pub fn row_letter(&self) -> char {
        (b'A' + self.row) as char
    }
}

impl fmt::Display for WellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.row_letter(), self.column + 1)
    }
}

impl FromStr for WellPosition {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid =
            || ValidationError::MalformedGrid(format!("invalid well position '{}'", s.trim()));

        let text = s.trim().to_ascii_uppercase();
        let mut chars = text.chars();
        let row_letter = chars.next().ok_or_else(invalid)?;
        let row = (row_letter as i32) - ('A' as i32);
        let column: usize = chars.as_str().parse().map_err(|_| invalid())?;
        if row < 0 || row >= ROW_COUNT as i32 || column < 1 || column > COLUMN_COUNT {
            return Err(invalid());
        }
        Ok(Self {
            row: row as u8,
            column: (column - 1) as u8,
        })
    }
}

/// Assay control category assigned to a well. The labels match the ones used
/// on bench sheets and are the values persisted by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// Positive control serum (`K+`).
    Positive,
    /// Negative control, healthy serum (`K- healthy`).
    NegativeHealthy,
    /// Negative control, buffer only (`K- buffer`).
    NegativeBuffer,
    /// Substrate blank well.
    SubstrateBlank,
}

impl ControlKind {
    /// Persisted label for this control category.
    pub fn label(&self) -> &'static str {
        match self {
            ControlKind::Positive => "K+",
            ControlKind::NegativeHealthy => "K- healthy",
            ControlKind::NegativeBuffer => "K- buffer",
            ControlKind::SubstrateBlank => "substrate blank",
        }
    }

    /// Resolves a persisted label back into a control category.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "K+" => Some(ControlKind::Positive),
            "K- healthy" => Some(ControlKind::NegativeHealthy),
            "K- buffer" => Some(ControlKind::NegativeBuffer),
            "substrate blank" => Some(ControlKind::SubstrateBlank),
            _ => None,
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One cell of the plate grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Well {
    /// Grid address, fixed by the well's index inside the plate.
    pub position: WellPosition,
    /// Sample label; `None` means the well is unused.
    pub sample_name: Option<String>,
    /// Measured value; presence must match `sample_name` presence.
    pub value: Option<f64>,
    /// Control category, if the well is an assay control.
    pub control: Option<ControlKind>,
}

impl Well {
    /// Creates an unused well at the given position.
    pub fn empty(position: WellPosition) -> Self {
        Self {
            position,
            sample_name: None,
            value: None,
            control: None,
        }
    }

    /// Whether the well is flagged as an assay control.
    pub fn is_control(&self) -> bool {
        self.control.is_some()
    }

    /// Whether the well carries neither a sample nor a value.
    pub fn is_empty(&self) -> bool {
        self.sample_name.is_none() && self.value.is_none()
    }
}

/// One recorded ELISA run: a named, timestamped 8x12 grid of wells.
///
/// The grid shape is checked at construction and the plate is immutable
/// afterwards; persistence adapters only ever read it. The tuple
/// `(name, created_at)` is the identity key used to detect the same logical
/// plate across backends.
#[derive(Debug, Clone, PartialEq)]
pub struct Plate {
    name: String,
    created_at: DateTime<Utc>,
    wells: Vec<Well>,
}

impl Plate {
    /// Creates a plate stamped with the current time.
    pub fn new(name: impl Into<String>, wells: Vec<Well>) -> Result<Self, ValidationError> {
        Self::from_stored(name, Utc::now(), wells)
    }

    /// Reconstructs a plate fetched from a backend, keeping its original
    /// creation timestamp.
    pub fn from_stored(
        name: impl Into<String>,
        created_at: DateTime<Utc>,
        wells: Vec<Well>,
    ) -> Result<Self, ValidationError> {
        let plate = Self {
            name: name.into(),
            created_at,
            wells,
        };
        plate.check_structure()?;
        Ok(plate)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// All 96 wells in row-major order, A1 through H12.
    pub fn wells(&self) -> &[Well] {
        &self.wells
    }

    /// The well at the given grid address.
    pub fn well(&self, position: WellPosition) -> &Well {
        &self.wells[position.index()]
    }

    /// Checks the plate against the model rules, short-circuiting on the
    /// first violation: grid shape, then name, then sample/value pairing,
    /// then control flags. Pure; no side effects.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.check_structure()?;

        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }

        for well in &self.wells {
            if well.sample_name.is_some() != well.value.is_some() {
                return Err(ValidationError::MismatchedWell(well.position));
            }
        }

        for well in &self.wells {
            if well.is_control() && well.sample_name.is_none() {
                return Err(ValidationError::InvalidControl(well.position));
            }
        }

        Ok(())
    }

    // Enforced by the constructors; re-checked defensively by `validate`.
    fn check_structure(&self) -> Result<(), ValidationError> {
        if self.wells.len() != WELL_COUNT {
            return Err(ValidationError::MalformedGrid(format!(
                "expected {WELL_COUNT} wells, found {}",
                self.wells.len()
            )));
        }
        for (expected, well) in WellPosition::all().zip(&self.wells) {
            if well.position != expected {
                return Err(ValidationError::MalformedGrid(format!(
                    "well at index {} is addressed {} instead of {expected}",
                    expected.index(),
                    well.position
                )));
            }
        }
        Ok(())
    }
}

/// Serialises a plate timestamp the way every backend stores it: RFC 3339
/// UTC with millisecond precision, which keeps the text form
/// lexicographically sortable and identity comparison across stores exact.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses a timestamp previously produced by [`format_timestamp`].
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|timestamp| timestamp.with_timezone(&Utc))
}
