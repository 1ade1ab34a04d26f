use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use weft_common::Config;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Directory containing weft.config.json
    #[arg(default_value = ".")]
    pub dir: PathBuf,
}

pub fn config(args: ConfigArgs, cwd: &Path) -> Result<()> {
    let dir = cwd.join(&args.dir);
    let config_path = Config::path_in(&dir);
    let config = Config::load(&dir)?;

    if config_path.exists() {
        println!("{} {}", "Loaded".green(), config_path.display());
    } else {
        println!("{} {} not found, using defaults", "⚠️".yellow(), config_path.display());
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
