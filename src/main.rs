use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::{Mutex, mpsc};
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_error::{ErrorLayer, SpanTrace};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod archives;
mod backend;
mod config;
mod controller;
mod domain;
mod ead;
mod grid;
mod inputter;
mod model;
mod navigation;
mod table;
mod ui;
mod views;

use backend::{Dispatcher, HttpBackend};
use config::{AdminConfig, DEFAULT_CONFIG_PATH, expand_path, load_config};
use controller::Controller;
use domain::AdminError;
use model::{Model, Status};
use navigation::ViewId;
use ui::AdminUI;

/// Terminal administration client for the records backend.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML config file [default: ~/.recadmin/config.yml]
    #[arg(short, long)]
    config: Option<String>,

    /// Backend base url, e.g. http://localhost:6543
    #[arg(short, long)]
    base_url: Option<String>,

    /// Request timeout in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Rows per grid page
    #[arg(short, long)]
    page_length: Option<usize>,

    /// View shown on startup (Logs, Scans, EAD, Archives)
    #[arg(short, long)]
    view: Option<String>,

    /// Log file
    #[arg(short, long)]
    log_file: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn build_config(args: &Args) -> Result<AdminConfig, AdminError> {
    let (path, allow_missing) = match &args.config {
        Some(path) => (expand_path(path), false),
        None => (expand_path(DEFAULT_CONFIG_PATH), true),
    };
    let file = load_config(&path, allow_missing)?;
    let mut config = AdminConfig::default().merge(&file);

    if let Some(url) = &args.base_url {
        config = config.base_url(url.as_str());
    }
    if let Some(timeout) = args.timeout {
        config = config.timeout(timeout);
    }
    if let Some(length) = args.page_length {
        config = config.page_length(length.max(1));
    }
    if let Some(label) = &args.view {
        config = config.default_view(label.parse::<ViewId>()?);
    }
    if let Some(log_file) = &args.log_file {
        config = config.log_file(expand_path(log_file));
    }
    Ok(config)
}

fn setup_logging(path: &Path) -> Result<(), AdminError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| AdminError::ConfigError(format!("failed to set up logging: {e}")))
}

fn run(args: Args) -> Result<(), AdminError> {
    let config = build_config(&args)?;
    setup_logging(&config.log_file)?;
    let _span = tracing::info_span!("recadmin", base_url = %config.base_url).entered();
    info!("Starting recadmin with {config:?}");

    let (tx, rx) = mpsc::channel();
    let backend = HttpBackend::new(&config.base_url, Duration::from_secs(config.timeout))?;
    let dispatcher = Dispatcher::new(backend, tx);

    let mut model = Model::init(&config);
    model.start();
    let ui = AdminUI::new(&config);
    let controller = Controller::new(&config);

    let mut terminal = ratatui::init();
    let result = (|| -> Result<(), AdminError> {
        while model.status != Status::QUITTING {
            for call in model.take_outgoing() {
                dispatcher.dispatch(call);
            }

            terminal.draw(|f| ui.draw(&model, f))?;

            let message = controller.handle_event(&model)?;
            model.update(message)?;

            // Completions are applied on this thread only.
            while let Ok(message) = rx.try_recv() {
                model.update(Some(message))?;
            }
        }
        Ok(())
    })();
    ratatui::restore();
    if let Err(e) = &result {
        error!("recadmin failed: {e}\n{}", SpanTrace::capture());
    }
    info!("Exiting recadmin");
    result
}
