use anyhow::Result;
use sift_config::Config;
use sift_storage::ResponseCache;

use crate::cli::CacheCommands;

pub async fn handle(config: &Config, cmd: CacheCommands) -> Result<()> {
    let cache = ResponseCache::new(config.paths.cache_dir.clone())?;

    match cmd {
        CacheCommands::Path => {
            println!("{}", cache.root().display());
        }
        CacheCommands::Clear => {
            let removed = cache.clear().await?;
            println!("✓ Removed {} cached responses", removed);
        }
    }

    Ok(())
}
