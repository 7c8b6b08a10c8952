use anyhow::Result;
use sift_config::Config;
use std::path::Path;

pub fn handle(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        println!("Config already exists: {}", config_path.display());
        println!("  Run 'sift init --force' to reset it to the defaults");
        return Ok(());
    }

    let config = Config::default();
    config.save_to(config_path)?;

    println!("✓ Created {}", config_path.display());
    println!("  Model: {}", config.model.name);
    println!(
        "  Set {} before running 'sift classify'",
        config.model.api_key_env
    );
    Ok(())
}
