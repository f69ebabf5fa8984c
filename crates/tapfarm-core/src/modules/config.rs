//! Environment-style configuration loading.
//!
//! Sources, lowest priority first:
//! 1. optional `.env` file (`KEY=VALUE` lines, read as INI root keys)
//! 2. process environment
//!
//! Keys are case-insensitive and map onto [`FarmConfig`] fields.

use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::path::Path;
use tapfarm_types::{ConfigError, FarmConfig};

/// Default dotenv file looked up in the working directory.
pub const ENV_FILE: &str = ".env";

/// Load and validate configuration from `.env` and the process environment.
pub fn load_config() -> Result<FarmConfig, ConfigError> {
    load_config_from(Path::new(ENV_FILE), None)
}

/// Load and validate configuration from `env_file` layered under an
/// environment.
///
/// `environment` replaces the process environment when given.
pub fn load_config_from(
    env_file: &Path,
    environment: Option<HashMap<String, String>>,
) -> Result<FarmConfig, ConfigError> {
    let settings = Config::builder()
        .add_source(
            File::new(&env_file.to_string_lossy(), FileFormat::Ini).required(false),
        )
        .add_source(Environment::default().try_parsing(true).source(environment))
        .build()
        .map_err(parse_error)?;

    let mut farm: FarmConfig = settings.try_deserialize().map_err(parse_error)?;
    normalize(&mut farm);
    farm.validate_all()?;

    tracing::debug!(
        env_file = %env_file.display(),
        use_proxy = farm.use_proxy,
        sessions_per_proxy = farm.sessions_per_proxy,
        "Configuration loaded"
    );
    Ok(farm)
}

/// Treat blank optional values as unset.
fn normalize(farm: &mut FarmConfig) {
    if farm.update_url.as_deref().is_some_and(|u| u.trim().is_empty()) {
        farm.update_url = None;
    }
    if farm.ref_id.trim().is_empty() {
        farm.ref_id = tapfarm_types::models::DEFAULT_REF_ID.to_string();
    }
}

fn parse_error(e: config::ConfigError) -> ConfigError {
    ConfigError::ParseError { message: e.to_string() }
}
