use anyhow::Result;
use sift_config::Config;
use std::path::{Path, PathBuf};

pub async fn columns(config: &Config, file: &Path) -> Result<()> {
    let tools = super::file_tools(config)?;
    let columns = tools.open_columns(file).await?;

    println!("Columns in {}:", file.display());
    for column in columns {
        println!("  {}", column);
    }
    Ok(())
}

pub async fn combine(config: &Config, base: &Path, extra: &Path) -> Result<()> {
    let tools = super::file_tools(config)?;
    let outcome = tools.combine_files(base, extra).await?;

    println!("✓ Combined {} rows", outcome.rows);
    println!("  Combined: {}", outcome.combined_path.display());
    println!("  Extra: {}", outcome.extra_path.display());
    if !outcome.mismatches.is_empty() {
        println!(
            "  {} rows differ in '{}', see {}",
            outcome.mismatches.len(),
            config.dataset.check_column,
            tools.audit().path().display()
        );
    }
    Ok(())
}

pub async fn concat(config: &Config, files: &[PathBuf]) -> Result<()> {
    let tools = super::file_tools(config)?;
    let output = tools.concat_files(files).await?;

    println!("✓ Concatenated {} files", files.len());
    println!("  Output: {}", output.display());
    Ok(())
}

pub async fn divide(config: &Config, file: &Path, column: &str) -> Result<()> {
    let tools = super::file_tools(config)?;
    let outputs = tools.divide_file(file, column).await?;

    println!("✓ Divided {} into {} files", file.display(), outputs.len());
    for output in outputs {
        println!("  {}", output.display());
    }
    Ok(())
}
