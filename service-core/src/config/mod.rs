use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Base configuration shared by every service binary. Service-specific
/// settings wrap this in their own config struct.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8000
}

impl Config {
    /// Loads from an optional `configuration` file, then `APP_*` environment
    /// variables. Missing sources fall back to defaults.
    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
