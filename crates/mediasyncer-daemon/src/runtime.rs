use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use eyre::{bail, eyre, Context, Result};
use mediasyncer_core::price::{AgePrice, PriceFormula, RandomPrice, StaticPrice};

use crate::cli::{DaemonArgs, PriceFormulaKind};
use crate::config::DaemonConfig;

#[derive(Debug, Clone)]
pub struct PriceSettings {
    pub formula: PriceFormulaKind,
    pub static_price: f32,
    pub default_price: f32,
    pub old_price: f32,
    pub young_price: f32,
    pub old_age: Duration,
    pub young_age: Duration,
}

impl Default for PriceSettings {
    fn default() -> Self {
        Self {
            formula: PriceFormulaKind::Static,
            static_price: 1.0,
            default_price: 0.5,
            old_price: 1.0,
            young_price: 1.0,
            old_age: Duration::from_secs(30 * 24 * 3600),
            young_age: Duration::from_secs(24 * 3600),
        }
    }
}

/// Builds the concrete formula this node bids and reserves with.
pub fn build_price_formula(settings: &PriceSettings) -> Arc<dyn PriceFormula> {
    match settings.formula {
        PriceFormulaKind::Static => Arc::new(StaticPrice(settings.static_price)),
        PriceFormulaKind::Random => Arc::new(RandomPrice),
        PriceFormulaKind::Old => Arc::new(AgePrice {
            prefer_older: true,
            age_threshold: ChronoDuration::from_std(settings.old_age).unwrap_or(ChronoDuration::zero()),
            age_price: settings.old_price,
            default_price: settings.default_price,
            clock: Arc::new(chrono::Utc::now),
        }),
        PriceFormulaKind::Young => Arc::new(AgePrice {
            prefer_older: false,
            age_threshold: ChronoDuration::from_std(settings.young_age).unwrap_or(ChronoDuration::zero()),
            age_price: settings.young_price,
            default_price: settings.default_price,
            clock: Arc::new(chrono::Utc::now),
        }),
    }
}

#[derive(Debug)]
pub struct DaemonRuntime {
    pub name: String,
    pub volume_root: PathBuf,
    pub http_addr: String,
    pub http_port: u16,
    pub bind_port: u16,
    pub debug: bool,
    /// peer name -> "host:port", resolved lazily by the transport on connect.
    pub peers: HashMap<String, String>,
    pub price: PriceSettings,
}

fn parse_price_formula(raw: &str) -> Result<PriceFormulaKind> {
    match raw {
        "static" => Ok(PriceFormulaKind::Static),
        "random" => Ok(PriceFormulaKind::Random),
        "old" => Ok(PriceFormulaKind::Old),
        "young" => Ok(PriceFormulaKind::Young),
        other => bail!("unknown price formula '{other}' (expected static, random, old, or young)"),
    }
}

fn parse_peer(raw: &str) -> Result<(String, String)> {
    let (name, addr) = raw
        .split_once('=')
        .ok_or_else(|| eyre!("malformed peer '{raw}', expected name=host:port"))?;
    if name.trim().is_empty() || addr.trim().is_empty() {
        bail!("malformed peer '{raw}', expected name=host:port");
    }
    Ok((name.to_string(), addr.to_string()))
}

pub async fn load_runtime(args: &DaemonArgs) -> Result<DaemonRuntime> {
    let config = match &args.config {
        Some(path) => DaemonConfig::load(path).await?,
        None => DaemonConfig::default(),
    };

    let name = args
        .name
        .clone()
        .or_else(|| config.name.clone())
        .ok_or_else(|| eyre!("node name is required: pass --name or set `name` in the config file"))?;

    let volume_root = args
        .volume
        .clone()
        .or_else(|| config.volume.clone().map(PathBuf::from))
        .ok_or_else(|| eyre!("volume directory is required: pass --volume or set `volume` in the config file"))?;

    let http_addr = args.http_addr.clone().or_else(|| config.http_addr.clone()).unwrap_or_else(|| "0.0.0.0".to_string());
    let http_port = args.http_port.or(config.http_port).unwrap_or(8080);
    let bind_port = args.bind_port.or(config.bind_port).unwrap_or(7070);
    let debug = args.debug || config.debug;

    let mut peers = HashMap::new();
    for raw in config.peers.iter().chain(args.peers.iter()) {
        let (name, addr) = parse_peer(raw).with_context(|| format!("parsing peer '{raw}'"))?;
        peers.insert(name, addr);
    }

    let price_cfg = config.price.unwrap_or_default();
    let mut price = PriceSettings::default();
    if let Some(formula) = &price_cfg.formula {
        price.formula = parse_price_formula(formula)?;
    }
    if let Some(v) = price_cfg.static_price {
        price.static_price = v;
    }
    if let Some(v) = price_cfg.default_price {
        price.default_price = v;
    }
    if let Some(v) = price_cfg.old_price {
        price.old_price = v;
    }
    if let Some(v) = price_cfg.young_price {
        price.young_price = v;
    }
    if let Some(v) = &price_cfg.old_age {
        price.old_age = humantime::parse_duration(v).with_context(|| format!("parsing price.old_age '{v}'"))?;
    }
    if let Some(v) = &price_cfg.young_age {
        price.young_age = humantime::parse_duration(v).with_context(|| format!("parsing price.young_age '{v}'"))?;
    }

    if let Some(formula) = args.price_formula {
        price.formula = formula;
    }
    if let Some(v) = args.price_static {
        price.static_price = v;
    }
    if let Some(v) = args.price_default {
        price.default_price = v;
    }
    if let Some(v) = args.price_old {
        price.old_price = v;
    }
    if let Some(v) = args.price_young {
        price.young_price = v;
    }
    if let Some(v) = args.price_old_age.clone() {
        price.old_age = v.into();
    }
    if let Some(v) = args.price_young_age.clone() {
        price.young_age = v.into();
    }

    Ok(DaemonRuntime {
        name,
        volume_root,
        http_addr,
        http_port,
        bind_port,
        debug,
        peers,
        price,
    })
}
