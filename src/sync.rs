//! Orchestrates a save across the three backends with fixed ordering and
//! per-step failure isolation, and dispatches fetches to a chosen source.

use std::fmt;

use tracing::{info, instrument, warn};

use crate::error::{ElisaError, Result};
use crate::io::{PlateReader, PlateWriter};
use crate::model::Plate;

/// Backend selection for [`SyncCoordinator::fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Local,
    Remote,
}

/// Caller-selected mirrors for a save. The local store is always written.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    pub write_workbook: bool,
    pub write_remote: bool,
}

/// What happened to one step of the save pipeline.
#[derive(Debug)]
pub enum StepOutcome {
    /// The step ran and succeeded.
    Ok,
    /// The step was not requested by the caller.
    Skipped,
    /// The step ran and failed; prior steps are not undone.
    Failed(ElisaError),
}

impl StepOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, StepOutcome::Ok)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, StepOutcome::Skipped)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }

    fn from_result(result: Result<()>) -> Self {
        match result {
            Ok(()) => StepOutcome::Ok,
            Err(error) => StepOutcome::Failed(error),
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Ok => f.write_str("ok"),
            StepOutcome::Skipped => f.write_str("skipped"),
            StepOutcome::Failed(error) => write!(f, "failed ({error})"),
        }
    }
}

/// Per-backend report for one save. The caller is always told exactly which
/// of the three backends succeeded, was skipped, or failed, never a single
/// aggregate flag.
#[derive(Debug)]
pub struct SyncOutcome {
    pub local: StepOutcome,
    pub workbook: StepOutcome,
    pub remote: StepOutcome,
}

impl SyncOutcome {
    /// Whether every requested step succeeded.
    pub fn fully_synced(&self) -> bool {
        !self.local.is_failed() && !self.workbook.is_failed() && !self.remote.is_failed()
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "local: {}, workbook: {}, remote: {}",
            self.local, self.workbook, self.remote
        )
    }
}

/// Drives a save through `VALIDATE → LOCAL_WRITE → WORKBOOK_WRITE →
/// REMOTE_WRITE`, strictly in that order. Steps run to completion one at a
/// time so that failure attribution stays unambiguous; there is no rollback
/// for mirrors that diverge after a partial failure.
pub struct SyncCoordinator<L, W, R> {
    local: L,
    workbook: W,
    remote: R,
}

impl<L, W, R> SyncCoordinator<L, W, R>
where
    L: PlateWriter + PlateReader,
    W: PlateWriter,
    R: PlateWriter + PlateReader,
{
    pub fn new(local: L, workbook: W, remote: R) -> Self {
        Self {
            local,
            workbook,
            remote,
        }
    }

    /// Validates the plate, then writes it to the local store and to each
    /// requested mirror. A validation failure returns before any backend is
    /// touched; a local store failure aborts the remaining steps. Workbook
    /// and remote failures are captured per step and never undo the local
    /// write or block each other.
    #[instrument(level = "info", skip_all, fields(plate = %plate.name()))]
    pub fn save(&mut self, plate: &Plate, options: &SyncOptions) -> Result<SyncOutcome> {
        plate.validate()?;
        self.local.save(plate)?;
        info!("plate stored locally");

        let workbook = if options.write_workbook {
            let outcome = StepOutcome::from_result(self.workbook.save(plate));
            match &outcome {
                StepOutcome::Failed(error) => warn!(error = %error, "workbook write failed"),
                _ => info!("plate mirrored to workbook"),
            }
            outcome
        } else {
            StepOutcome::Skipped
        };

        let remote = if options.write_remote {
            let outcome = StepOutcome::from_result(self.remote.save(plate));
            match &outcome {
                StepOutcome::Failed(error) => warn!(error = %error, "remote write failed"),
                _ => info!("plate uploaded to remote document"),
            }
            outcome
        } else {
            StepOutcome::Skipped
        };

        Ok(SyncOutcome {
            local: StepOutcome::Ok,
            workbook,
            remote,
        })
    }

    /// Returns the chosen backend's plate list verbatim; sources are never
    /// merged or reconciled.
    #[instrument(level = "info", skip_all, fields(source = ?source))]
    pub fn fetch(&mut self, source: FetchSource) -> Result<Vec<Plate>> {
        match source {
            FetchSource::Local => self.local.fetch_all(),
            FetchSource::Remote => self.remote.fetch_all(),
        }
    }
}
