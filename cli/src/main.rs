//! Command-line entry point: `edgerec <embed|neighbors> [config.toml]`.

mod commands;
mod config;
mod telemetry;

use std::path::PathBuf;

use anyhow::{Result, bail};

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(command) = args.next() else {
        bail!("usage: edgerec <embed|neighbors> [config.toml]");
    };
    let config_path = args.next().map(PathBuf::from);

    match command.as_str() {
        "embed" => commands::run_embed(config_path),
        "neighbors" => commands::run_neighbors(config_path),
        other => bail!("unknown command `{other}`, expected `embed` or `neighbors`"),
    }
}
