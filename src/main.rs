//! Runs the haunted house in a window.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use haunted_house::{config::SceneConfig, flow::init_logging, resources::Assets, scene};

/// CLI options.
#[derive(Debug, Parser)]
#[command(version, about)]
struct CliOpt {
    /// TOML file overriding any subset of the scene parameters
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed for the grave layout; random when omitted
    #[arg(long)]
    seed: Option<u64>,
    /// Directory the textures are read from
    #[arg(long, default_value = "assets")]
    assets: PathBuf,
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let opt = CliOpt::parse();

    let config = match &opt.config {
        Some(path) => SceneConfig::load(path)?,
        None => SceneConfig::default(),
    };
    let assets_root = opt
        .assets
        .to_str()
        .context("the asset directory must be valid UTF-8")?;

    scene::launch(config, Assets::new(assets_root), opt.seed)
}
