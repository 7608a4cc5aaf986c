use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use decl_e2e_runtime_config::load_or_default;

#[derive(Args)]
pub struct ConfigArgs {
    /// Config file (defaults to ./decl-e2e.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Print the effective configuration as TOML.
pub fn run(args: &ConfigArgs) -> Result<bool> {
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    let config = load_or_default(args.config.as_deref(), &cwd)?;
    let rendered = config
        .to_toml_string()
        .context("failed to render configuration")?;
    print!("{rendered}");
    Ok(true)
}
