pub mod catalog;
pub mod config;
pub mod errors;
pub mod flow;
pub mod log_retention;
pub mod logging;
pub mod recorder;
pub mod runtime;
pub mod server;
pub mod session;
pub mod session_store;
pub mod session_token;
pub mod types;

use std::sync::Arc;

use catalog::TrialCatalog;
use clap::{error::ErrorKind, CommandFactory, Parser};
use config::{load_config, AppConfig, CliOverrides};
use errors::StudyError;
use flow::FlowController;
use logging::{append_run_log, init_run_logger, structured_fallback_line, JsonlLogger};
use recorder::ResponseRecorder;
use runtime::{ProductionRuntime, RandomSource, SeededRandom};
use serde_json::json;
use server::{AppState, StudyApp};
use session_store::SessionStore;

#[derive(Debug, Clone, Parser)]
#[command(name = "studyflow", version)]
#[command(about = "Guided explanation-rating study served over HTTP")]
pub struct Cli {
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,
    #[arg(long)]
    pub bind: Option<String>,
    #[arg(long = "data-dir")]
    pub data_dir: Option<std::path::PathBuf>,
    #[arg(long = "session-db")]
    pub session_db: Option<std::path::PathBuf>,
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long, default_value_t = false)]
    pub check_catalog: bool,
}

pub fn run() -> Result<i32, StudyError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let cwd = std::env::current_dir().map_err(|e| StudyError::Io(e.to_string()))?;
    let runtime = ProductionRuntime::new();
    run_with_runtime(&args, &cwd, &runtime)
}

pub fn run_with_runtime(
    args: &[std::ffi::OsString],
    cwd: &std::path::Path,
    runtime: &ProductionRuntime,
) -> Result<i32, StudyError> {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(StudyError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        bind: cli.bind.clone(),
        data_dir: cli.data_dir.clone(),
        session_db: cli.session_db.clone(),
        seed: cli.seed,
    };
    let cfg = load_config(&overrides, cwd, runtime.file_system.as_ref())?;

    let catalog = TrialCatalog::standard();
    let summary = catalog.validate()?;
    if cli.check_catalog {
        runtime.terminal.write_line(&summary.render_line())?;
        return Ok(0);
    }

    let mut logger = JsonlLogger::new(&cfg.storage.run_log);
    logger.budget_bytes = cfg.storage.log_budget_bytes;
    init_run_logger(logger);
    append_run_log(
        "info",
        "startup.config.loaded",
        json!({
            "bind": cfg.server.bind,
            "data_dir": cfg.storage.data_dir.display().to_string(),
            "session_db": cfg.storage.session_db.display().to_string(),
            "seeded": cfg.study.seed.is_some(),
        }),
    );

    let bind = cfg.bind_addr()?;
    let store = SessionStore::open(&cfg.storage.session_db)?;
    store.purge_idle(idle_cutoff_ms(&cfg, runtime))?;
    let app = build_app(&cfg, runtime, catalog, store);

    runtime.terminal.write_line(&structured_fallback_line(
        "server",
        "listening",
        &format!("http://{bind} data_dir={}", cfg.storage.data_dir.display()),
    ))?;

    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| StudyError::Io(e.to_string()))?;
    tokio_runtime.block_on(server::serve(app, bind))?;
    Ok(0)
}

/// Wires the controller, recorder and store behind one shared handle.
/// Only trial sampling sees the configured seed; tokens use the runtime's
/// entropy source.
pub fn build_app(
    cfg: &AppConfig,
    runtime: &ProductionRuntime,
    catalog: TrialCatalog,
    store: SessionStore,
) -> AppState {
    let trial_random: Arc<dyn RandomSource> =
        Arc::new(SeededRandom::from_optional_seed(cfg.study.seed));
    let recorder = ResponseRecorder::new(
        cfg.storage.data_dir.clone(),
        runtime.file_system.clone(),
        runtime.clock.clone(),
    );
    Arc::new(StudyApp {
        controller: FlowController::new(catalog, recorder, trial_random),
        store,
        cookie_name: cfg.server.cookie_name.clone(),
        clock: runtime.clock.clone(),
        token_random: runtime.random.clone(),
    })
}

fn idle_cutoff_ms(cfg: &AppConfig, runtime: &ProductionRuntime) -> i64 {
    let now_ms = runtime
        .clock
        .now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);
    let ttl_ms = cfg.storage.session_ttl_hours.saturating_mul(3_600_000) as i64;
    now_ms.saturating_sub(ttl_ms)
}

pub fn render_help() -> String {
    let mut cmd = Cli::command();
    let mut buffer = Vec::new();
    if cmd.write_long_help(&mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
