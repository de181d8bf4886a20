use std::path::Path;

use eyre::{Context, Result};
use serde::Deserialize;
use tokio::fs;

/// Raw TOML shape. Every field is optional: CLI flags win on conflict, see `runtime::load_runtime`.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DaemonConfig {
    pub name: Option<String>,
    pub volume: Option<String>,
    pub http_addr: Option<String>,
    pub http_port: Option<u16>,
    pub bind_port: Option<u16>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub peers: Vec<String>,
    pub price: Option<PriceConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PriceConfig {
    pub formula: Option<String>,
    pub static_price: Option<f32>,
    pub default_price: Option<f32>,
    pub old_price: Option<f32>,
    pub young_price: Option<f32>,
    pub old_age: Option<String>,
    pub young_age: Option<String>,
}

impl DaemonConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .wrap_err_with(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&content).wrap_err("failed to parse config file")
    }
}
