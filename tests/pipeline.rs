use chrono::{DateTime, TimeZone, Utc};
use elisa_tools::error::{ElisaError, Result, ValidationError};
use elisa_tools::grid;
use elisa_tools::io::local::LocalStore;
use elisa_tools::io::remote::{RemoteApi, RemoteSection, RemoteStore};
use elisa_tools::io::workbook::WorkbookStore;
use elisa_tools::io::{PlateReader, PlateWriter};
use elisa_tools::model::{ControlKind, Plate, Well, WellPosition};
use elisa_tools::sync::{FetchSource, SyncCoordinator, SyncOptions};
use tempfile::{TempDir, tempdir};

/// In-memory stand-in for the remote document service.
#[derive(Default)]
struct MemoryRemote {
    sections: Vec<RemoteSection>,
}

impl RemoteApi for MemoryRemote {
    fn put_section(&mut self, section: &RemoteSection) -> Result<()> {
        match self
            .sections
            .iter_mut()
            .find(|existing| existing.title == section.title)
        {
            Some(existing) => *existing = section.clone(),
            None => self.sections.push(section.clone()),
        }
        Ok(())
    }

    fn list_sections(&mut self) -> Result<Vec<RemoteSection>> {
        Ok(self.sections.clone())
    }
}

/// Workbook double whose writes always fail, simulating a locked file.
struct FailingWorkbook;

impl PlateWriter for FailingWorkbook {
    fn save(&mut self, _plate: &Plate) -> Result<()> {
        Err(ElisaError::Io(std::io::Error::other(
            "workbook file is locked",
        )))
    }
}

fn grid_text(filled: &[&str]) -> String {
    let mut lines = Vec::new();
    for row in 0..8 {
        let mut cells: Vec<String> = vec!["-".to_string(); 12];
        if row == 0 {
            for (index, cell) in filled.iter().enumerate() {
                cells[index] = (*cell).to_string();
            }
        }
        lines.push(cells.join(" "));
    }
    lines.join("\n")
}

fn timestamp(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 7, hour, 0, 0).unwrap()
}

/// The plate from the bench scenario: A1-A3 filled with S1-S3, A1 a positive
/// control, everything else empty.
fn run_42() -> Plate {
    let samples = grid::parse_sample_grid(&grid_text(&["S1", "S2", "S3"])).expect("samples parsed");
    let values =
        grid::parse_value_grid(&grid_text(&["0.12", "0.34", "0.56"])).expect("values parsed");
    let controls = grid::control_map(&[(ControlKind::Positive, "A1")]).expect("controls parsed");
    let plate = grid::build_plate("Run-42", samples, values, &controls).expect("plate built");
    // Re-stamp with a fixed timestamp so stored copies compare equal.
    Plate::from_stored(plate.name(), timestamp(12), plate.wells().to_vec())
        .expect("plate restamped")
}

fn coordinator(
    dir: &TempDir,
) -> SyncCoordinator<LocalStore, WorkbookStore, RemoteStore<MemoryRemote>> {
    let local = LocalStore::open(&dir.path().join("elisa.db")).expect("local store opened");
    let workbook = WorkbookStore::new(dir.path().join("elisa.xlsx"));
    let remote = RemoteStore::new(MemoryRemote::default());
    SyncCoordinator::new(local, workbook, remote)
}

#[test]
fn run_42_saves_locally_and_to_workbook_and_skips_remote() {
    let dir = tempdir().expect("temp dir");
    let mut coordinator = coordinator(&dir);
    let plate = run_42();
    plate.validate().expect("plate is valid");

    let outcome = coordinator
        .save(
            &plate,
            &SyncOptions {
                write_workbook: true,
                write_remote: false,
            },
        )
        .expect("save succeeded");

    assert!(outcome.local.is_ok());
    assert!(outcome.workbook.is_ok());
    assert!(outcome.remote.is_skipped());
    assert!(outcome.fully_synced());

    let plates = coordinator
        .fetch(FetchSource::Local)
        .expect("local fetch succeeded");
    assert_eq!(plates.len(), 1);
    assert_eq!(plates[0].name(), "Run-42");

    let a1: WellPosition = "A1".parse().expect("position parsed");
    assert!(plates[0].well(a1).is_control());
    assert_eq!(plates[0].well(a1).value, Some(0.12));
}

#[test]
fn workbook_failure_keeps_local_record_and_still_reaches_remote() {
    let dir = tempdir().expect("temp dir");
    let local = LocalStore::open(&dir.path().join("elisa.db")).expect("local store opened");
    let mut coordinator =
        SyncCoordinator::new(local, FailingWorkbook, RemoteStore::new(MemoryRemote::default()));
    let plate = run_42();

    let outcome = coordinator
        .save(
            &plate,
            &SyncOptions {
                write_workbook: true,
                write_remote: true,
            },
        )
        .expect("save reported an outcome despite the workbook failure");

    assert!(outcome.local.is_ok());
    assert!(outcome.workbook.is_failed());
    assert!(outcome.remote.is_ok());
    assert!(!outcome.fully_synced());

    // The local record survives the workbook failure.
    let plates = coordinator
        .fetch(FetchSource::Local)
        .expect("local fetch succeeded");
    assert_eq!(plates.len(), 1);
    assert_eq!(plates[0], plate);

    // And so does the remote mirror written after it.
    let plates = coordinator
        .fetch(FetchSource::Remote)
        .expect("remote fetch succeeded");
    assert_eq!(plates.len(), 1);
    assert_eq!(plates[0], plate);
}

#[test]
fn validation_failure_touches_no_backend() {
    let dir = tempdir().expect("temp dir");
    let mut coordinator = coordinator(&dir);

    let mut wells: Vec<Well> = WellPosition::all().map(Well::empty).collect();
    let b1: WellPosition = "B1".parse().expect("position parsed");
    wells[b1.index()].sample_name = Some("X".to_string());
    let plate = Plate::new("Broken", wells).expect("structurally well-formed");

    let error = coordinator
        .save(&plate, &SyncOptions::default())
        .expect_err("validation must fail");
    assert!(matches!(
        error,
        ElisaError::Validation(ValidationError::MismatchedWell(position)) if position == b1
    ));

    assert!(
        coordinator
            .fetch(FetchSource::Local)
            .expect("local fetch succeeded")
            .is_empty()
    );
    assert!(!dir.path().join("elisa.xlsx").exists());
}

#[test]
fn local_only_save_touches_only_the_local_store() {
    let dir = tempdir().expect("temp dir");
    let mut coordinator = coordinator(&dir);

    let outcome = coordinator
        .save(&run_42(), &SyncOptions::default())
        .expect("save succeeded");
    assert!(outcome.local.is_ok());
    assert!(outcome.workbook.is_skipped());
    assert!(outcome.remote.is_skipped());

    assert!(!dir.path().join("elisa.xlsx").exists());
    assert!(
        coordinator
            .fetch(FetchSource::Remote)
            .expect("remote fetch succeeded")
            .is_empty()
    );
    assert_eq!(
        coordinator
            .fetch(FetchSource::Local)
            .expect("local fetch succeeded")
            .len(),
        1
    );
}

#[test]
fn resaving_an_identical_plate_stores_one_record_everywhere() {
    let dir = tempdir().expect("temp dir");
    let mut coordinator = coordinator(&dir);
    let plate = run_42();
    let options = SyncOptions {
        write_workbook: true,
        write_remote: true,
    };

    coordinator.save(&plate, &options).expect("first save");
    let outcome = coordinator.save(&plate, &options).expect("second save");
    assert!(outcome.fully_synced());

    assert_eq!(
        coordinator
            .fetch(FetchSource::Local)
            .expect("local fetch succeeded")
            .len(),
        1
    );
    assert_eq!(
        coordinator
            .fetch(FetchSource::Remote)
            .expect("remote fetch succeeded")
            .len(),
        1
    );
}

#[test]
fn local_fetch_returns_plates_in_creation_order_with_full_fidelity() {
    let dir = tempdir().expect("temp dir");
    let mut coordinator = coordinator(&dir);

    let mut wells: Vec<Well> = WellPosition::all().map(Well::empty).collect();
    wells[0].sample_name = Some("S1".to_string());
    wells[0].value = Some(0.12);
    wells[0].control = Some(ControlKind::NegativeBuffer);
    let early = Plate::from_stored("morning", timestamp(9), wells.clone()).expect("plate built");
    let late = Plate::from_stored("afternoon", timestamp(15), wells).expect("plate built");

    // Saved out of order on purpose.
    coordinator
        .save(&late, &SyncOptions::default())
        .expect("late plate saved");
    coordinator
        .save(&early, &SyncOptions::default())
        .expect("early plate saved");

    let plates = coordinator
        .fetch(FetchSource::Local)
        .expect("local fetch succeeded");
    assert_eq!(plates.len(), 2);
    assert_eq!(plates[0], early);
    assert_eq!(plates[1], late);
}

#[test]
fn remote_fetch_skips_sections_that_do_not_parse() {
    let dir = tempdir().expect("temp dir");
    let local = LocalStore::open(&dir.path().join("elisa.db")).expect("local store opened");
    let workbook = WorkbookStore::new(dir.path().join("elisa.xlsx"));
    let remote = RemoteStore::new(MemoryRemote {
        sections: vec![RemoteSection {
            title: "scratch".to_string(),
            rows: vec![vec!["not".to_string(), "a".to_string(), "plate".to_string()]],
        }],
    });
    let mut coordinator = SyncCoordinator::new(local, workbook, remote);

    let plate = run_42();
    coordinator
        .save(
            &plate,
            &SyncOptions {
                write_workbook: false,
                write_remote: true,
            },
        )
        .expect("save succeeded");

    let plates = coordinator
        .fetch(FetchSource::Remote)
        .expect("remote fetch succeeded");
    assert_eq!(plates.len(), 1);
    assert_eq!(plates[0], plate);
}
