//! Storage adapters for the three plate backends.
//!
//! Each backend implements the narrow capability traits below, which is what
//! lets the [`sync`](crate::sync) coordinator drive real stores and test
//! doubles through the same signatures.

pub mod local;
pub mod remote;
pub mod workbook;

use crate::error::Result;
use crate::model::Plate;

/// Write capability shared by every backend adapter. Saving a plate replaces
/// any previously stored record with the same identity.
pub trait PlateWriter {
    fn save(&mut self, plate: &Plate) -> Result<()>;
}

/// Read capability for backends that can return their stored plates.
pub trait PlateReader {
    fn fetch_all(&mut self) -> Result<Vec<Plate>>;
}
