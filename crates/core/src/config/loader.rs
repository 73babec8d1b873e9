//! Config file loading.
//!
//! The TOML file is the base layer; `STEMCUT_*` environment variables are
//! merged over it, with `__` separating nested keys, so
//! `STEMCUT_BATCH__MAX_CONCURRENT_JOBS=2` sets `batch.max_concurrent_jobs`.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

const ENV_PREFIX: &str = "STEMCUT_";
const ENV_NESTING: &str = "__";

fn layered(path: &Path) -> Figment {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split(ENV_NESTING))
}

/// Reads `path` and applies environment overrides.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    layered(path)
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Parses a TOML document as-is, without environment overrides.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}
