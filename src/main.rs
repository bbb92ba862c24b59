use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod domain;
mod inputter;
mod model;
mod table;
mod ui;
mod view;

use controller::Controller;
use domain::{AppConfig, TabError};
use model::{Model, Status};
use table::Table;
use ui::TableUi;

#[derive(Debug, Parser)]
#[command(name = "tabview", version, about = "Browse a tabular data file with search, sort and pagination.")]
struct Args {
    /// Data file to browse (csv, parquet, arrow/ipc or json)
    path: String,

    /// Rows per page
    #[arg(long, default_value_t = domain::DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Column the search box filters on at startup
    #[arg(long)]
    filter_column: Option<String>,

    /// Widest a column may render
    #[arg(long, default_value_t = domain::DEFAULT_MAX_COLUMN_WIDTH)]
    max_column_width: usize,

    /// Sort by lower-cased text only, ignoring dates and numbers
    #[arg(long)]
    plain_sort: bool,

    /// Write logs to this file; RUST_LOG controls the filter
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

fn run() -> Result<(), TabError> {
    let args = Args::parse();
    let config = AppConfig::default()
        .page_size(args.page_size)
        .max_column_width(args.max_column_width)
        .plain_sort(args.plain_sort)
        .filter_column(args.filter_column.clone())
        .log_file(args.log_file.clone());
    init_tracing(config.log_file.as_deref())?;

    let path = shellexpand::full(&args.path)
        .map_err(|e| TabError::LoadingFailed(e.to_string()))?;
    let table = Table::load(PathBuf::from(path.as_ref()))?;
    info!(
        "Loaded {} rows and {} columns from {}",
        table.len(),
        table.columns().len(),
        table.name()
    );

    let mut model = Model::init(&config, table);
    let controller = Controller::new(&config);
    let ui = TableUi::new(&config);

    let mut terminal = ratatui::init();

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(message)?;
        }
    }

    Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> Result<(), TabError> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = std::fs::File::create(path)?;
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}
