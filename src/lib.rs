//! Core library for the elisa-tools command line application.
//!
//! The library records ELISA plate results and keeps three independent
//! stores consistent for the same logical plate: a local SQLite database, an
//! xlsx workbook, and a remote cloud spreadsheet document. The modules are
//! structured to keep responsibilities narrow and composable: backend
//! adapters live under [`io`], data representations inside [`model`], the
//! grid parsing and section rendering in [`grid`], and the synchronization
//! orchestration under [`sync`].

pub mod error;
pub mod grid;
pub mod io;
pub mod model;
pub mod sync;

pub use error::{ElisaError, Result, ValidationError};
