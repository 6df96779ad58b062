//! Daemon configuration.
//!
//! Flags and environment variables win over the optional TOML file, which
//! wins over built-in defaults. The resolved [`Config`] is built once at
//! startup and handed by reference into the store and enforcer constructors;
//! nothing reads configuration ambiently after that.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;

use keyserver_lib::token;

/// Route payments are submitted to.
pub const PAYMENT_URL: &str = "/payments";

/// Command line for the keyserver daemon.
#[derive(Debug, Parser)]
#[command(
    name = "keyserverd",
    version,
    about = "Payment-gated key and metadata server",
    long_about = "A key and metadata server for cryptocurrency addresses. Wallets \
publish signed capability and contact metadata under an address; reads are open, \
writes require the address's key and a proof-of-payment token."
)]
pub struct Cli {
    /// Bind address for the HTTP listener
    #[arg(short, long, env = "KEYSERVER_BIND")]
    pub bind: Option<String>,

    /// Directory for the embedded database
    #[arg(short, long, env = "KEYSERVER_DBPATH")]
    pub dbpath: Option<PathBuf>,

    /// Secret string for HMAC proof-of-payment tokens (random when unset)
    #[arg(short, long, env = "KEYSERVER_SECRET")]
    pub secret: Option<String>,

    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Optional TOML layer. Every field may be omitted.
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub bind: Option<String>,
    pub dbpath: Option<PathBuf>,
    pub secret: Option<String>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub dbpath: PathBuf,
    pub secret: String,
}

impl Config {
    /// Resolve flags, file, and defaults into a concrete configuration.
    pub fn resolve(cli: Cli) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                toml::from_str::<FileConfig>(&raw)?
            }
            None => FileConfig::default(),
        };

        Ok(Self {
            bind: cli
                .bind
                .or(file.bind)
                .unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            dbpath: cli
                .dbpath
                .or(file.dbpath)
                .unwrap_or_else(|| PathBuf::from("./data/keyserver")),
            secret: cli
                .secret
                .or(file.secret)
                .unwrap_or_else(|| token::random_secret(64)),
        })
    }
}
