//! `pressroom config`: show/path/init

use crate::config::ConfigLoader;
use crate::types::{PressError, Result};

pub fn show(as_json: bool) -> Result<()> {
    let config = ConfigLoader::load()?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!(
            "{}",
            toml::to_string_pretty(&config).map_err(|e| PressError::Config(e.to_string()))?
        );
    }
    Ok(())
}

pub fn path() -> Result<()> {
    println!("Configuration paths:");
    if let Some(global) = ConfigLoader::global_config_path() {
        let exists = if global.exists() { "✓" } else { "✗" };
        println!("  Global:  {} {}", exists, global.display());
    }
    let project = ConfigLoader::project_config_path();
    let exists = if project.exists() { "✓" } else { "✗" };
    println!("  Project: {} {}", exists, project.display());
    Ok(())
}

pub fn init(force: bool) -> Result<()> {
    let dir = ConfigLoader::init_project(force)?;
    println!("Project config initialized at {}", dir.display());
    Ok(())
}
