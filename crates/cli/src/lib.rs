use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use intake_core::{
    config, BatchSubmitter, Intake, NoticeLevel, Notifier, Settings, StubTransport,
};
use intake_model::{
    format_size, FileHandle, FileRecord, LayoutMode, SortDirection, SortKey, UploadBatch,
};
use pdf_engine::LopdfEngine;
use preview_core::{CloseTrigger, PreviewState};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use storage::{Storage, ThemeStore};

/// Overrides the preferences directory.
pub const DATA_DIR_ENV: &str = "INTAKE_DATA_DIR";

#[derive(Debug, Parser)]
#[command(name = "intake")]
#[command(about = "Stage documents, unlock PDFs and submit the batch")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Stage files and print the sorted, filtered list.
    List {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
        /// name, size, date or status; anything else sorts by name.
        #[arg(long, default_value = "name")]
        sort: String,
        #[arg(long)]
        desc: bool,
        #[arg(long, default_value = "")]
        filter: String,
        #[arg(long)]
        json: bool,
    },
    /// Open a PDF preview, trying each password in turn.
    Preview {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long = "password", value_name = "PASSWORD")]
        passwords: Vec<String>,
        /// 1-based page to show.
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Zoom steps from the default; negative zooms out.
        #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
        zoom: i32,
        /// Write the rendered page as PNG.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Stage files and submit them as one batch.
    Submit {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
        /// Password for a staged file, as NAME=PASSWORD.
        #[arg(long = "password", value_name = "NAME=PASSWORD", value_parser = parse_named_password)]
        passwords: Vec<(String, String)>,
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Show or toggle the saved theme.
    Theme {
        #[arg(long)]
        toggle: bool,
        /// Report the system theme as dark.
        #[arg(long)]
        system_dark: bool,
    },
    /// Show or set the saved file list layout.
    Layout {
        #[arg(value_enum)]
        set: Option<LayoutArg>,
    },
    /// Print the resolved configuration.
    Config,
    /// Print CLI version.
    Version,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayoutArg {
    Grid,
    List,
}

impl From<LayoutArg> for LayoutMode {
    fn from(value: LayoutArg) -> Self {
        match value {
            LayoutArg::Grid => Self::Grid,
            LayoutArg::List => Self::List,
        }
    }
}

/// Prints notices to stderr the way a toast would surface them.
struct StderrNotifier;

impl Notifier for StderrNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        eprintln!("{level}: {message}");
    }
}

type CliIntake = Intake<LopdfEngine, StderrNotifier>;

#[derive(Debug, Serialize)]
struct ListOutput {
    files: Vec<FileRow>,
    rejected: Vec<RejectedRow>,
}

#[derive(Debug, Serialize)]
struct FileRow {
    name: String,
    size: u64,
    size_label: String,
    password_protected: bool,
    previewable: bool,
}

impl From<&FileRecord> for FileRow {
    fn from(record: &FileRecord) -> Self {
        Self {
            name: record.handle.name().to_owned(),
            size: record.handle.size(),
            size_label: format_size(record.handle.size()),
            password_protected: record.is_password_protected,
            previewable: record.handle.can_preview(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RejectedRow {
    name: String,
    reason: String,
}

#[derive(Debug, Serialize)]
struct PreviewOutput {
    file: String,
    state: String,
    attempts: u32,
    page: Option<u32>,
    page_count: Option<u32>,
    zoom: Option<f32>,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct SubmitOutput {
    files: usize,
    fields: Vec<String>,
    batch: BatchRow,
}

#[derive(Debug, Serialize)]
struct BatchRow {
    id: u64,
    completed: usize,
    total: usize,
    percent_complete: u8,
    documents: Vec<DocumentRow>,
}

#[derive(Debug, Serialize)]
struct DocumentRow {
    id: String,
    name: String,
    size_label: String,
    stage: String,
    description: &'static str,
}

impl From<&UploadBatch> for BatchRow {
    fn from(batch: &UploadBatch) -> Self {
        Self {
            id: batch.id.0,
            completed: batch.completed(),
            total: batch.total(),
            percent_complete: batch.percent_complete(),
            documents: batch
                .documents()
                .iter()
                .map(|doc| DocumentRow {
                    id: doc.id.to_string(),
                    name: doc.name.clone(),
                    size_label: format_size(doc.size),
                    stage: doc.stage.label().to_owned(),
                    description: doc.stage.description(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ConfigOutput {
    max_file_size_mb: u64,
    accepted_extensions: Vec<String>,
    submit_delay_ms: u128,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::List { files, sort, desc, filter, json } => {
            run_list(&files, &sort, desc, &filter, json)
        }
        Commands::Preview { file, passwords, page, zoom, output } => {
            run_preview(&file, &passwords, page, zoom, output.as_deref())
        }
        Commands::Submit { files, passwords, delay_ms } => run_submit(&files, &passwords, delay_ms),
        Commands::Theme { toggle, system_dark } => run_theme(toggle, system_dark),
        Commands::Layout { set } => run_layout(set.map(LayoutMode::from)),
        Commands::Config => run_config(),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_settings() -> Result<Settings> {
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let config = config::load_config(&cwd).context("failed to load configuration")?;
    Ok(config.resolve())
}

fn stage(intake: &mut CliIntake, files: &[PathBuf], settings: &Settings) -> Result<Vec<RejectedRow>> {
    let handles = files
        .iter()
        .map(|path| {
            ensure_file_exists(path)?;
            FileHandle::from_path(path)
                .with_context(|| format!("failed to read {}", path.display()))
        })
        .collect::<Result<Vec<_>>>()?;

    let (_, rejected) = intake.add_files(handles, settings);
    Ok(rejected
        .into_iter()
        .map(|rejection| RejectedRow { name: rejection.name, reason: rejection.reason.to_string() })
        .collect())
}

fn run_list(files: &[PathBuf], sort: &str, desc: bool, filter: &str, json: bool) -> Result<()> {
    let settings = load_settings()?;
    let mut intake = Intake::new(LopdfEngine::new(), StderrNotifier);
    let rejected = stage(&mut intake, files, &settings)?;

    intake.set_search(filter);
    intake.set_sort(SortKey::parse_lossy(sort));
    if desc && intake.query().direction == SortDirection::Asc {
        intake.toggle_direction();
    }

    let rows: Vec<FileRow> = intake.visible().into_iter().map(FileRow::from).collect();

    if json {
        let output = ListOutput { files: rows, rejected };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for row in rows {
        let lock = if row.password_protected { "\tlocked" } else { "" };
        println!("{}\t{}{lock}", row.name, row.size_label);
    }
    Ok(())
}

fn run_preview(
    file: &Path,
    passwords: &[String],
    page: u32,
    zoom: i32,
    output: Option<&Path>,
) -> Result<()> {
    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let settings = load_settings()?;
    let mut intake = Intake::new(LopdfEngine::new(), StderrNotifier);
    let rejected = stage(&mut intake, &[file.to_path_buf()], &settings)?;
    if let Some(rejection) = rejected.first() {
        anyhow::bail!("{} was not staged: {}", rejection.name, rejection.reason);
    }

    let id = intake
        .store()
        .records()
        .first()
        .map(|record| record.id)
        .context("no file was staged")?;

    let mut state = intake.open_preview(id).context("failed to open preview")?;
    for password in passwords {
        if state != PreviewState::AwaitingPassword {
            break;
        }
        state = intake.submit_password(password.as_str());
    }

    if state == PreviewState::Unlocked {
        let controller = intake.preview_mut().controller_mut();
        controller.go_to_page(page);
        for _ in 0..zoom.unsigned_abs() {
            if zoom > 0 {
                controller.zoom_in();
            } else {
                controller.zoom_out();
            }
        }
    }

    let report = preview_report(&intake, file);
    println!("{}", serde_json::to_string_pretty(&report)?);

    match state {
        PreviewState::Unlocked => {
            if let Some(output) = output {
                write_page(&intake, output)?;
            }
            intake.close_preview(CloseTrigger::CloseButton);
            Ok(())
        }
        PreviewState::AwaitingPassword => {
            let reason = report.error.as_deref().unwrap_or("password required");
            anyhow::bail!("{}: {reason}", file.display())
        }
        _ => {
            let reason = report.error.as_deref().unwrap_or("preview did not open");
            anyhow::bail!("{}: {reason}", file.display())
        }
    }
}

fn preview_report(intake: &CliIntake, file: &Path) -> PreviewOutput {
    let session = intake.preview().controller().session();
    let state = intake.preview().state();
    let unlocked = state == PreviewState::Unlocked;

    PreviewOutput {
        file: file.file_name().map_or_else(
            || file.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        ),
        state: state.to_string(),
        attempts: session.map_or(0, |session| session.attempt_count()),
        page: session.filter(|_| unlocked).map(|session| session.page_view().page()),
        page_count: session.filter(|_| unlocked).map(|session| session.page_view().page_count()),
        zoom: session.filter(|_| unlocked).map(|session| session.page_view().zoom()),
        error: session.and_then(|session| {
            session.password_error().or_else(|| session.error_message()).map(str::to_owned)
        }),
    }
}

fn write_page(intake: &CliIntake, output: &Path) -> Result<()> {
    let image = intake
        .preview()
        .render_current_page()
        .context("failed to render page")?
        .context("preview is not unlocked")?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    image.save(output).with_context(|| format!("failed to write image to {}", output.display()))?;
    eprintln!("wrote {}", output.display());
    Ok(())
}

fn run_submit(files: &[PathBuf], passwords: &[(String, String)], delay_ms: Option<u64>) -> Result<()> {
    let settings = load_settings()?;
    let mut intake = Intake::new(LopdfEngine::new(), StderrNotifier);
    stage(&mut intake, files, &settings)?;

    for (name, password) in passwords {
        unlock_for_submit(&mut intake, name, password)?;
    }

    let delay = delay_ms.map_or(settings.submit_delay, Duration::from_millis);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("failed to start async runtime")?;

    let payload_fields: Vec<String> = intake_core::build_payload(intake.store())
        .fields()
        .into_iter()
        .map(str::to_owned)
        .collect();
    let submitter = BatchSubmitter::new();
    let ack = runtime
        .block_on(intake.submit(&submitter, &StubTransport::new(delay)))
        .context("submission failed")?;

    let batch = submitter
        .ledger()
        .get(ack.batch)
        .map(BatchRow::from)
        .context("accepted batch was not recorded")?;
    let output = SubmitOutput { files: ack.file_count, fields: payload_fields, batch };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Validates `password` against the staged file; only a password that unlocks
/// the document is kept for submission.
fn unlock_for_submit(intake: &mut CliIntake, name: &str, password: &str) -> Result<()> {
    let record = intake
        .store()
        .find_by_name(name)
        .with_context(|| format!("--password refers to {name}, which was not staged"))?;
    let id = record.id;

    if !record.handle.can_preview() {
        tracing::warn!(name, "ignoring password for a file that is not a PDF");
        return Ok(());
    }

    let mut state = intake.open_preview(id).context("failed to open preview")?;
    if state == PreviewState::AwaitingPassword {
        state = intake.submit_password(password);
    }
    intake.close_preview(CloseTrigger::CloseButton);

    match state {
        PreviewState::Unlocked if intake.store().password(id).is_some() => Ok(()),
        PreviewState::Unlocked => {
            tracing::warn!(name, "ignoring password for a file that is not password protected");
            Ok(())
        }
        PreviewState::AwaitingPassword => anyhow::bail!("incorrect password for {name}"),
        _ => anyhow::bail!("{name} could not be opened"),
    }
}

fn open_storage() -> Result<Storage> {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => Ok(Storage::with_root(dir)),
        None => Storage::from_default_project().context("failed to locate preferences"),
    }
}

fn run_theme(toggle: bool, system_dark: bool) -> Result<()> {
    let mut theme = ThemeStore::init(open_storage()?, system_dark);
    if toggle {
        theme.toggle().context("failed to save theme")?;
    }

    println!("{}", if theme.is_dark() { "dark" } else { "light" });
    Ok(())
}

fn run_layout(set: Option<LayoutMode>) -> Result<()> {
    let storage = open_storage()?;
    let mut preferences = storage.load_preferences().context("failed to load preferences")?;

    if let Some(layout) = set.filter(|layout| *layout != preferences.layout) {
        preferences.layout = layout;
        storage.save_preferences(&preferences).context("failed to save layout")?;
    }

    println!(
        "{}",
        match preferences.layout {
            LayoutMode::Grid => "grid",
            LayoutMode::List => "list",
        }
    );
    Ok(())
}

fn run_config() -> Result<()> {
    let settings = load_settings()?;
    let output = ConfigOutput {
        max_file_size_mb: settings.max_file_size_mb,
        accepted_extensions: settings.accepted_extensions,
        submit_delay_ms: settings.submit_delay.as_millis(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn parse_named_password(value: &str) -> Result<(String, String), String> {
    let (name, password) =
        value.split_once('=').ok_or_else(|| format!("expected NAME=PASSWORD, got `{value}`"))?;
    if name.is_empty() {
        return Err("file name must not be empty".to_owned());
    }
    Ok((name.to_owned(), password.to_owned()))
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
