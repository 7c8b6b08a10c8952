//! Spreadsheet utilities that never call the model: column listing,
//! combine, concatenate and divide. The classification pipeline reads and
//! writes its tables through the same type.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sift_core::{Error, Frontend, Result};
use sift_sources::{Table, TableRegistry, combine, concatenate, divide, natural_sort_key};
use tracing::info;

use crate::pipeline::output_extension;
use crate::{AuditLog, PipelineSettings};

#[derive(Debug, Clone)]
pub struct CombineOutcome {
    pub combined_path: PathBuf,
    pub extra_path: PathBuf,
    pub rows: usize,
    /// Index values whose check column differed between the two files
    pub mismatches: Vec<String>,
}

/// Table I/O plus the file utilities, sharing one registry, output
/// directory and audit log
pub struct FileTools {
    settings: PipelineSettings,
    registry: Arc<TableRegistry>,
    audit: Arc<AuditLog>,
    frontend: Arc<dyn Frontend>,
}

impl FileTools {
    pub fn new(
        settings: PipelineSettings,
        audit: Arc<AuditLog>,
        frontend: Arc<dyn Frontend>,
    ) -> Self {
        Self {
            settings,
            registry: Arc::new(TableRegistry::new()),
            audit,
            frontend,
        }
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Read a source's header row and report it to the frontend
    pub async fn open_columns(&self, source: &Path) -> Result<Vec<String>> {
        let table = self.load_table(source).await?;
        self.audit
            .record(format!("Opened {} ({} rows)", source.display(), table.len()));
        self.frontend.set_column_names(&table.headers);
        Ok(table.headers)
    }

    /// Left-join `extra` onto `base` on the index column and save both the
    /// joined table and the extra-only columns.
    pub async fn combine_files(&self, base: &Path, extra: &Path) -> Result<CombineOutcome> {
        let settings = &self.settings;
        self.audit.record(format!(
            "Combining {} with {}",
            base.display(),
            extra.display()
        ));

        let base_table = self.load_table(base).await?;
        let extra_table = self.load_table(extra).await?;
        let result = combine(
            &base_table,
            &extra_table,
            &settings.index_column,
            &settings.check_column,
        )?;

        if !result.checked {
            self.audit.record(format!(
                "Column '{}' missing, skipped the mismatch check",
                settings.check_column
            ));
        }
        for index in &result.mismatches {
            self.audit
                .record(format!("Opinion mismatch at index {index}"));
        }

        let name = format!("{}_{}", stem_of(base), stem_of(extra));
        let ext = output_extension(base);
        let combined_path = settings.output_dir.join(format!("Combined({name}).{ext}"));
        let extra_path = settings.output_dir.join(format!("Extra({name}).{ext}"));
        let rows = result.combined.len();

        self.write_tables(vec![
            (result.combined, combined_path.clone()),
            (result.extra, extra_path.clone()),
        ])
        .await?;
        info!("Combined {} rows into {}", rows, combined_path.display());

        Ok(CombineOutcome {
            combined_path,
            extra_path,
            rows,
            mismatches: result.mismatches,
        })
    }

    /// Stack files in natural name order under one header row.
    pub async fn concat_files(&self, files: &[PathBuf]) -> Result<PathBuf> {
        if files.is_empty() {
            return Err(Error::InvalidSelection(
                "No files selected to concatenate".to_string(),
            ));
        }

        let mut ordered = files.to_vec();
        ordered.sort_by_key(|path| {
            natural_sort_key(&path.file_name().unwrap_or_default().to_string_lossy())
        });

        let mut tables = Vec::with_capacity(ordered.len());
        for path in &ordered {
            tables.push(self.load_table(path).await?);
        }
        let all = concatenate(&tables);

        let first = &ordered[0];
        let last = &ordered[ordered.len() - 1];
        let output = self.settings.output_dir.join(format!(
            "Concatenated({}_{}).{}",
            stem_of(first),
            stem_of(last),
            output_extension(first)
        ));

        self.audit.record(format!(
            "Concatenated {} files ({} rows) into {}",
            ordered.len(),
            all.len(),
            output.display()
        ));
        self.write_tables(vec![(all, output.clone())]).await?;
        Ok(output)
    }

    /// Write one `data_{value}` file per distinct value of `column`.
    pub async fn divide_file(&self, source: &Path, column: &str) -> Result<Vec<PathBuf>> {
        let table = self.load_table(source).await?;
        let groups = divide(&table, column)?;
        let ext = output_extension(source);

        let outputs: Vec<(_, PathBuf)> = groups
            .into_iter()
            .map(|(value, group)| {
                let path = self
                    .settings
                    .output_dir
                    .join(format!("data_{}.{}", file_safe(&value), ext));
                (group, path)
            })
            .collect();
        let paths: Vec<PathBuf> = outputs.iter().map(|(_, path)| path.clone()).collect();

        self.audit.record(format!(
            "Divided {} by '{}' into {} files",
            source.display(),
            column,
            paths.len()
        ));
        self.write_tables(outputs).await?;
        Ok(paths)
    }

    pub(crate) fn registry(&self) -> Arc<TableRegistry> {
        Arc::clone(&self.registry)
    }

    pub(crate) async fn load_table(&self, path: &Path) -> Result<Table> {
        let registry = self.registry();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || registry.read(&path))
            .await
            .map_err(|e| anyhow::anyhow!("table loading task failed: {e}"))?
    }

    pub(crate) async fn write_tables(&self, tables: Vec<(Table, PathBuf)>) -> Result<()> {
        let registry = self.registry();
        tokio::task::spawn_blocking(move || {
            for (table, path) in &tables {
                registry.write(table, path)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| anyhow::anyhow!("table writing task failed: {e}"))?
    }
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string())
}

fn file_safe(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    if cleaned.trim().is_empty() {
        "empty".to_string()
    } else {
        cleaned
    }
}
