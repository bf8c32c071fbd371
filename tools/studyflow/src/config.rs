use crate::errors::StudyError;
use crate::runtime::FileSystem;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_COOKIE_NAME: &str = "studyflow_session";

#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub bind: Option<String>,
    pub data_dir: Option<PathBuf>,
    pub session_db: Option<PathBuf>,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub study: StudyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
    pub cookie_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub session_db: PathBuf,
    pub run_log: PathBuf,
    pub log_budget_bytes: u64,
    pub session_ttl_hours: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudyConfig {
    pub seed: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind: "127.0.0.1:5000".to_string(),
                cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("data"),
                session_db: PathBuf::from(".cache/studyflow/sessions.sqlite"),
                run_log: PathBuf::from(".cache/studyflow/logs/run.jsonl"),
                log_budget_bytes: crate::logging::DEFAULT_DISK_BUDGET_BYTES,
                session_ttl_hours: 72,
            },
            study: StudyConfig { seed: None },
        }
    }
}

impl AppConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr, StudyError> {
        self.server.bind.parse().map_err(|e| {
            StudyError::InvalidConfig(format!("server.bind `{}`: {e}", self.server.bind))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialAppConfig {
    server: Option<PartialServerConfig>,
    storage: Option<PartialStorageConfig>,
    study: Option<PartialStudyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialServerConfig {
    bind: Option<String>,
    cookie_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialStorageConfig {
    data_dir: Option<PathBuf>,
    session_db: Option<PathBuf>,
    run_log: Option<PathBuf>,
    log_budget_bytes: Option<u64>,
    session_ttl_hours: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PartialStudyConfig {
    seed: Option<u64>,
}

/// Defaults, then the TOML file, then CLI flags. Paths come back absolute.
pub fn load_config(
    overrides: &CliOverrides,
    process_cwd: &Path,
    fs: &dyn FileSystem,
) -> Result<AppConfig, StudyError> {
    let mut cfg = AppConfig::default();

    if let Some(path) = &overrides.config_path {
        let path = absolutize_path(process_cwd, path);
        let file_contents = fs.read_to_string(&path)?;
        let partial: PartialAppConfig = toml::from_str(&file_contents)
            .map_err(|e| StudyError::ConfigParse(e.to_string()))?;
        merge_partial_config(&mut cfg, partial);
    }

    apply_cli_overrides(&mut cfg, overrides);
    resolve_paths(&mut cfg, process_cwd);
    validate_config(&cfg)?;
    Ok(cfg)
}

fn merge_partial_config(cfg: &mut AppConfig, partial: PartialAppConfig) {
    if let Some(server) = partial.server {
        if let Some(bind) = server.bind {
            cfg.server.bind = bind;
        }
        if let Some(cookie_name) = server.cookie_name {
            cfg.server.cookie_name = cookie_name;
        }
    }

    if let Some(storage) = partial.storage {
        if let Some(value) = storage.data_dir {
            cfg.storage.data_dir = value;
        }
        if let Some(value) = storage.session_db {
            cfg.storage.session_db = value;
        }
        if let Some(value) = storage.run_log {
            cfg.storage.run_log = value;
        }
        if let Some(value) = storage.log_budget_bytes {
            cfg.storage.log_budget_bytes = value;
        }
        if let Some(value) = storage.session_ttl_hours {
            cfg.storage.session_ttl_hours = value;
        }
    }

    if let Some(study) = partial.study {
        if study.seed.is_some() {
            cfg.study.seed = study.seed;
        }
    }
}

fn apply_cli_overrides(cfg: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(bind) = &overrides.bind {
        cfg.server.bind = bind.clone();
    }
    if let Some(data_dir) = &overrides.data_dir {
        cfg.storage.data_dir = data_dir.clone();
    }
    if let Some(session_db) = &overrides.session_db {
        cfg.storage.session_db = session_db.clone();
    }
    if overrides.seed.is_some() {
        cfg.study.seed = overrides.seed;
    }
}

fn resolve_paths(cfg: &mut AppConfig, process_cwd: &Path) {
    cfg.storage.data_dir = absolutize_path(process_cwd, &cfg.storage.data_dir);
    cfg.storage.session_db = absolutize_path(process_cwd, &cfg.storage.session_db);
    cfg.storage.run_log = absolutize_path(process_cwd, &cfg.storage.run_log);
}

pub fn absolutize_path(base: &Path, value: &Path) -> PathBuf {
    if value.is_absolute() {
        value.to_path_buf()
    } else {
        base.join(value)
    }
}

pub fn validate_config(cfg: &AppConfig) -> Result<(), StudyError> {
    cfg.bind_addr()?;

    if cfg.server.cookie_name.is_empty() {
        return Err(StudyError::InvalidConfig(
            "server.cookie_name must not be empty".to_string(),
        ));
    }
    if !cfg.server.cookie_name.bytes().all(is_cookie_token_byte) {
        return Err(StudyError::InvalidConfig(format!(
            "server.cookie_name `{}` contains characters not allowed in a cookie name",
            cfg.server.cookie_name
        )));
    }

    if cfg.storage.log_budget_bytes == 0 {
        return Err(StudyError::InvalidConfig(
            "storage.log_budget_bytes must be > 0".to_string(),
        ));
    }

    if cfg.storage.session_ttl_hours == 0 {
        return Err(StudyError::InvalidConfig(
            "storage.session_ttl_hours must be > 0".to_string(),
        ));
    }

    // Retention prunes every .jsonl file next to the run log.
    if cfg.storage.run_log.parent() == Some(cfg.storage.data_dir.as_path()) {
        return Err(StudyError::InvalidConfig(
            "storage.run_log must not live directly in storage.data_dir".to_string(),
        ));
    }

    if cfg.storage.session_db.as_os_str().is_empty() {
        return Err(StudyError::InvalidConfig(
            "storage.session_db must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn is_cookie_token_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte)
}
