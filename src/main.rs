use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use elisa_tools::grid;
use elisa_tools::io::local::LocalStore;
use elisa_tools::io::remote::{HttpRemoteApi, RemoteStore, load_credentials};
use elisa_tools::io::workbook::WorkbookStore;
use elisa_tools::model::{self, ControlKind, Plate, WellPosition};
use elisa_tools::sync::{FetchSource, SyncCoordinator, SyncOptions};
use elisa_tools::{ElisaError, Result};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging()?;
    match cli.command {
        Command::Add(args) => execute_add(args),
        Command::Fetch(args) => execute_fetch(args),
    }
}

fn init_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ElisaError::Logging(error.to_string()))
}

fn execute_add(args: AddArgs) -> Result<()> {
    for path in [&args.samples, &args.values] {
        if !path.exists() {
            return Err(ElisaError::MissingInput(path.clone()));
        }
    }

    let samples = grid::parse_sample_grid(&std::fs::read_to_string(&args.samples)?)?;
    let values = grid::parse_value_grid(&std::fs::read_to_string(&args.values)?)?;
    let controls = control_assignments(&args)?;
    let plate = grid::build_plate(&args.name, samples, values, &controls)?;

    let mut coordinator = build_coordinator(&args.backends, args.remote)?;
    let options = SyncOptions {
        write_workbook: args.workbook,
        write_remote: args.remote,
    };
    let outcome = coordinator.save(&plate, &options)?;
    println!("plate '{}' saved: {outcome}", plate.name());
    Ok(())
}

fn execute_fetch(args: FetchArgs) -> Result<()> {
    let source = FetchSource::from(args.source);
    let mut coordinator = build_coordinator(&args.backends, source == FetchSource::Remote)?;
    let plates = coordinator.fetch(source)?;
    if plates.is_empty() {
        println!("no plates stored");
        return Ok(());
    }
    for plate in &plates {
        print_plate(plate);
    }
    Ok(())
}

fn control_assignments(args: &AddArgs) -> Result<BTreeMap<WellPosition, ControlKind>> {
    let mut assignments = Vec::new();
    for (kind, text) in [
        (ControlKind::Positive, &args.positive),
        (ControlKind::NegativeHealthy, &args.negative_healthy),
        (ControlKind::NegativeBuffer, &args.negative_buffer),
        (ControlKind::SubstrateBlank, &args.blank),
    ] {
        if let Some(text) = text {
            assignments.push((kind, text.as_str()));
        }
    }
    Ok(grid::control_map(&assignments)?)
}

type Coordinator = SyncCoordinator<LocalStore, WorkbookStore, RemoteStore<HttpRemoteApi>>;

fn build_coordinator(backends: &BackendArgs, remote_required: bool) -> Result<Coordinator> {
    let local = LocalStore::open(&backends.db)?;
    let workbook = WorkbookStore::new(backends.workbook_file.clone());
    let remote = RemoteStore::new(remote_api(backends, remote_required)?);
    Ok(SyncCoordinator::new(local, workbook, remote))
}

fn remote_api(backends: &BackendArgs, required: bool) -> Result<HttpRemoteApi> {
    let base_url = match &backends.remote_url {
        Some(url) => url.clone(),
        None if required => {
            return Err(ElisaError::Remote(
                "no remote URL configured (pass --remote-url)".to_string(),
            ));
        }
        None => String::new(),
    };
    let token = match &backends.credentials {
        Some(path) => Some(load_credentials(path)?.token),
        None => None,
    };
    Ok(HttpRemoteApi::new(
        base_url,
        backends.document.clone(),
        token,
    ))
}

fn print_plate(plate: &Plate) {
    println!(
        "plate '{}' created {}",
        plate.name(),
        model::format_timestamp(plate.created_at())
    );
    for well in plate.wells() {
        if well.is_empty() {
            continue;
        }
        let sample = well.sample_name.as_deref().unwrap_or("");
        let value = well
            .value
            .map(|value| value.to_string())
            .unwrap_or_default();
        match well.control {
            Some(kind) => println!("  {}  {sample}  {value}  {kind}", well.position),
            None => println!("  {}  {sample}  {value}", well.position),
        }
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Record ELISA plate results across SQLite, an Excel workbook, and a remote spreadsheet."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a new plate and mirror it to the requested backends.
    Add(AddArgs),
    /// List stored plates from the chosen backend.
    Fetch(FetchArgs),
}

#[derive(clap::Args)]
struct AddArgs {
    /// Plate name.
    #[arg(long)]
    name: String,

    /// Text file holding the 8x12 sample-name grid.
    #[arg(long)]
    samples: PathBuf,

    /// Text file holding the 8x12 measurement grid.
    #[arg(long)]
    values: PathBuf,

    /// Positive control wells, e.g. "A1,B1".
    #[arg(long)]
    positive: Option<String>,

    /// Healthy-serum negative control wells.
    #[arg(long)]
    negative_healthy: Option<String>,

    /// Buffer-only negative control wells.
    #[arg(long)]
    negative_buffer: Option<String>,

    /// Substrate blank wells.
    #[arg(long)]
    blank: Option<String>,

    /// Mirror the plate into the Excel workbook.
    #[arg(long)]
    workbook: bool,

    /// Upload the plate to the remote document.
    #[arg(long)]
    remote: bool,

    #[command(flatten)]
    backends: BackendArgs,
}

#[derive(clap::Args)]
struct FetchArgs {
    /// Backend to read plates from.
    #[arg(long, value_enum, default_value_t = Source::Local)]
    source: Source,

    #[command(flatten)]
    backends: BackendArgs,
}

#[derive(clap::Args)]
struct BackendArgs {
    /// SQLite database path.
    #[arg(long, default_value = "elisa.db")]
    db: PathBuf,

    /// Excel workbook path.
    #[arg(long, default_value = "elisa.xlsx")]
    workbook_file: PathBuf,

    /// Base URL of the remote spreadsheet service.
    #[arg(long)]
    remote_url: Option<String>,

    /// Remote document name.
    #[arg(long, default_value = "ElisaData")]
    document: String,

    /// JSON credentials file holding the API token.
    #[arg(long)]
    credentials: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Source {
    Local,
    Remote,
}

impl From<Source> for FetchSource {
    fn from(source: Source) -> Self {
        match source {
            Source::Local => FetchSource::Local,
            Source::Remote => FetchSource::Remote,
        }
    }
}
