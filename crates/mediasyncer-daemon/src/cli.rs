use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[clap(rename_all = "lower")]
pub enum PriceFormulaKind {
    Static,
    Random,
    Old,
    Young,
}

/// Peer-to-peer media file synchronizer.
#[derive(Parser, Debug)]
#[command(name = "mediasyncerd", about = "Auction-based media file synchronizer")]
pub struct DaemonArgs {
    /// Path to an optional TOML config file layered beneath these flags.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Which price formula to use for this node's bids and reserve price.
    #[arg(long, value_enum)]
    pub price_formula: Option<PriceFormulaKind>,
    /// Price used by `--price-formula static`.
    #[arg(long)]
    pub price_static: Option<f32>,
    /// Default price for the `old`/`young` age formulas when the age condition doesn't hold.
    #[arg(long)]
    pub price_default: Option<f32>,
    /// Price bid/reserved for files on the "old" side of the age boundary.
    #[arg(long)]
    pub price_old: Option<f32>,
    /// Price bid/reserved for files on the "young" side of the age boundary.
    #[arg(long)]
    pub price_young: Option<f32>,
    /// Age boundary for `--price-formula old` (e.g. "720h", "30d").
    #[arg(long)]
    pub price_old_age: Option<humantime::Duration>,
    /// Age boundary for `--price-formula young` (e.g. "24h").
    #[arg(long)]
    pub price_young_age: Option<humantime::Duration>,

    /// Directory backing this node's volume.
    #[arg(long)]
    pub volume: Option<PathBuf>,

    /// Address the FileServer's HTTP listener binds to.
    #[arg(long)]
    pub http_addr: Option<String>,
    /// Port the FileServer's HTTP listener binds to.
    #[arg(long)]
    pub http_port: Option<u16>,

    /// Port the TCP transport listens on for peer connections.
    #[arg(long)]
    pub bind_port: Option<u16>,
    /// Unique name identifying this node to the rest of the cluster.
    #[arg(long)]
    pub name: Option<String>,

    /// Raise the default log level to debug.
    #[arg(long)]
    pub debug: bool,

    /// Initial peers to join, given as `name=host:port`.
    pub peers: Vec<String>,
}
