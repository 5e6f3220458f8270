//! Runtime configuration, read from environment variables.
//!
//! | variable                          | default                 |
//! |-----------------------------------|-------------------------|
//! | `TENANTGATE_LOG_FORMAT`           | `json`                  |
//! | `TENANTGATE_<DEST>_PATH`          | see [`RoutePaths`]      |
//! | `TENANTGATE_UNAUTHORIZED_MESSAGE` | static access-denied text |
//! | `TENANTGATE_FIXTURES`             | none (built-in demo data) |
//!
//! `<DEST>` is one of `LOGIN`, `VALIDATE_ROLE`, `DEVELOPER`, `ADMIN`,
//! `VENDOR`, `UNAUTHORIZED`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tenantgate_auth::IdentityFixture;
use tenantgate_core::DomainError;
use tenantgate_observability::{LogFormat, UnknownLogFormat};
use tenantgate_session::RoutePaths;

pub const DEFAULT_UNAUTHORIZED_MESSAGE: &str = "You do not have permission to access this resource.";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    LogFormat(#[from] UnknownLogFormat),

    #[error("invalid routes: {0}")]
    Routes(#[from] DomainError),

    #[error("failed to read fixture {path}: {source}")]
    FixtureIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse fixture {path}: {source}")]
    FixtureParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub log_format: LogFormat,
    pub routes: RoutePaths,
    pub unauthorized_message: String,
    pub fixtures: Option<PathBuf>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            routes: RoutePaths::default(),
            unauthorized_message: DEFAULT_UNAUTHORIZED_MESSAGE.to_string(),
            fixtures: None,
        }
    }
}

impl GateConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, or a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(format) = lookup("TENANTGATE_LOG_FORMAT") {
            config.log_format = format.parse()?;
        }

        let routes = &mut config.routes;
        for (key, slot) in [
            ("TENANTGATE_LOGIN_PATH", &mut routes.login),
            ("TENANTGATE_VALIDATE_ROLE_PATH", &mut routes.validate_role),
            ("TENANTGATE_DEVELOPER_PATH", &mut routes.developer),
            ("TENANTGATE_ADMIN_PATH", &mut routes.admin),
            ("TENANTGATE_VENDOR_PATH", &mut routes.vendor),
            ("TENANTGATE_UNAUTHORIZED_PATH", &mut routes.unauthorized),
        ] {
            if let Some(value) = lookup(key) {
                *slot = value;
            }
        }
        config.routes.validate()?;

        if let Some(message) = lookup("TENANTGATE_UNAUTHORIZED_MESSAGE") {
            config.unauthorized_message = message;
        }
        config.fixtures = lookup("TENANTGATE_FIXTURES").map(PathBuf::from);

        Ok(config)
    }

    /// Load the configured fixture file, or the built-in demo data.
    pub fn load_fixture(&self) -> Result<IdentityFixture, ConfigError> {
        match &self.fixtures {
            Some(path) => load_fixture(path),
            None => parse_fixture(Path::new("<built-in>"), DEMO_FIXTURE),
        }
    }
}

const DEMO_FIXTURE: &str = include_str!("../fixtures/demo.json");

pub fn load_fixture(path: &Path) -> Result<IdentityFixture, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::FixtureIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_fixture(path, &raw)
}

fn parse_fixture(path: &Path, raw: &str) -> Result<IdentityFixture, ConfigError> {
    serde_json::from_str(raw).map_err(|source| ConfigError::FixtureParse {
        path: path.to_path_buf(),
        source,
    })
}
