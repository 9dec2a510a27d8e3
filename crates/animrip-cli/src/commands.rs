//! Command dispatch for the `animrip` binary.
//!
//! The binary covers the concrete half of the pipeline: it stages keys, the
//! decompression helper, and the schema overlay so an embedder wiring a
//! `PakBackend`/`AnimCodec` pair starts from a warm data directory. The
//! interactive export loop lives in `animrip_core::export::run_loop` and
//! needs those collaborators compiled in.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use animrip_core::config::ExportConfig;
use animrip_core::decompressor::{ensure_decompressor, DecompressorConfig};
use animrip_core::keys::{KeyClient, DEFAULT_KEY_ENDPOINT};
use animrip_core::mappings::{default_providers, MappingsResolver, ProviderEndpoint};

#[derive(Parser)]
#[command(name = "animrip", version, about = "Encrypted game-asset archive bootstrap")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch keys, stage the decompressor, and resolve mappings.
    Bootstrap {
        /// Local state directory for staged artifacts and config.
        #[arg(long, default_value = "./.data")]
        data_dir: PathBuf,

        /// Key-distribution endpoint override.
        #[arg(long, env = "ANIMRIP_KEY_URL")]
        key_url: Option<String>,

        /// Mappings provider URL(s), highest priority first. Repeatable.
        #[arg(long = "mappings-url")]
        mappings_urls: Vec<String>,
    },

    /// Print the effective config, writing a default file when absent.
    Config {
        /// Local state directory holding config.json.
        #[arg(long, default_value = "./.data")]
        data_dir: PathBuf,
    },
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Bootstrap {
            data_dir,
            key_url,
            mappings_urls,
        } => bootstrap(data_dir, key_url, mappings_urls).await,
        Command::Config { data_dir } => {
            let config = ExportConfig::load_or_create(&data_dir)
                .context("failed to load or create config")?;
            println!(
                "animFormat: {}\ngameVersion: {}",
                config.anim_format, config.game_version
            );
            Ok(())
        }
    }
}

async fn bootstrap(
    data_dir: PathBuf,
    key_url: Option<String>,
    mappings_urls: Vec<String>,
) -> Result<()> {
    let config = ExportConfig::load_or_create(&data_dir)
        .context("failed to load or create config")?;
    info!(format = %config.anim_format, version = %config.game_version, "config ready");

    let client = reqwest::Client::new();

    let key_endpoint = key_url.unwrap_or_else(|| DEFAULT_KEY_ENDPOINT.to_string());
    let keys = KeyClient::new(client.clone(), key_endpoint)
        .fetch_keys()
        .await
        .context("key acquisition failed")?;
    println!("keys: 1 primary + {} dynamic", keys.dynamic_count());

    let staged = ensure_decompressor(&client, &DecompressorConfig::new(&data_dir))
        .await
        .context("decompressor staging failed")?;
    println!("decompressor: {}", staged.display());

    let providers = if mappings_urls.is_empty() {
        default_providers()
    } else {
        mappings_urls
            .iter()
            .enumerate()
            .map(|(index, url)| ProviderEndpoint::new(format!("provider-{index}"), url))
            .collect()
    };
    let schema = MappingsResolver::new(client, providers, &data_dir)
        .resolve()
        .await
        .context("mappings resolution failed")?;
    println!("mappings: {}", schema.path().display());

    println!("bootstrap complete; data dir is warm");
    Ok(())
}
