//! Pipeline orchestrator
//!
//! Runs one classification task end to end: load and validate the source,
//! chunk the selected rows, dispatch, reconcile, check row counts, merge
//! the labels back into the full table and save. Only one task runs at a
//! time; transient state is reset after every save or abort.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sift_core::{
    ChunkBuilder, Error, Fingerprint, FingerprintParts, Frontend, LabelColumn, Result, RowFilter,
    RowId, RowRecord, TaskKind, reconcile,
};
use sift_llm::ChatModel;
use sift_sources::{Table, content_hash, merge_column};
use sift_storage::ResponseCache;
use sift_tokens::TokenEstimator;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::dispatch::{Dispatcher, TaskContext};
use crate::{AuditLog, FileTools, Progress};

/// Dataset conventions and limits a pipeline runs with
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Token budget of one request, prompt pair included
    pub max_context_tokens: usize,
    pub max_concurrency: usize,
    pub index_column: String,
    pub comparison_column: String,
    /// Comparison value selected by [`RowFilter::OpinionsOnly`]
    pub opinion_label: String,
    pub check_column: String,
    pub output_dir: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_context_tokens: 1500,
            max_concurrency: 8,
            index_column: "no".to_string(),
            comparison_column: "category".to_string(),
            opinion_label: "의견".to_string(),
            check_column: "opinion".to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

/// What the frontend selected for one classification run
#[derive(Debug, Clone)]
pub struct TaskRequest {
    pub source: PathBuf,
    pub target_column: String,
    pub task: TaskKind,
    /// Defaults to the task's own output column
    pub output_column: Option<String>,
}

/// Classified-row count before and after labels were joined back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCountMismatch {
    pub expected: usize,
    pub actual: usize,
}

#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub fingerprint: Fingerprint,
    pub output_column: String,
    pub num_rows: usize,
    pub num_chunks: usize,
    pub column: LabelColumn,
    pub failed_chunks: Vec<usize>,
    pub parse_warnings: usize,
    pub cache_hits: usize,
    pub model_calls: usize,
    pub row_count_mismatch: Option<RowCountMismatch>,
    pub combined_path: PathBuf,
    pub extra_path: PathBuf,
}

impl TaskOutcome {
    pub fn labelled(&self) -> usize {
        self.column.labelled_count()
    }

    pub fn unlabelled(&self) -> Vec<RowId> {
        self.column.unlabelled()
    }
}

pub struct Pipeline {
    settings: PipelineSettings,
    files: FileTools,
    frontend: Arc<dyn Frontend>,
    audit: Arc<AuditLog>,
    estimator: TokenEstimator,
    dispatcher: Dispatcher,
    cache: ResponseCache,
    progress: Arc<Progress>,
    run_lock: Mutex<()>,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        model: Arc<dyn ChatModel>,
        cache: ResponseCache,
        audit: Arc<AuditLog>,
        frontend: Arc<dyn Frontend>,
    ) -> Self {
        let estimator = TokenEstimator::for_model_or_default(model.name());
        let dispatcher = Dispatcher::new(model, estimator.clone(), settings.max_concurrency);
        let files = FileTools::new(settings.clone(), Arc::clone(&audit), Arc::clone(&frontend));
        Self {
            settings,
            files,
            frontend,
            audit,
            estimator,
            dispatcher,
            cache,
            progress: Arc::new(Progress::new()),
            run_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    pub fn model_name(&self) -> &str {
        self.dispatcher.model_name()
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Table I/O and file utilities sharing this pipeline's audit log
    pub fn files(&self) -> &FileTools {
        &self.files
    }

    /// Read a source's header row and report it to the frontend
    pub async fn open_columns(&self, source: &Path) -> Result<Vec<String>> {
        self.files.open_columns(source).await
    }

    /// Reset per-task counters, here and in the frontend
    pub fn clear(&self) {
        self.progress.reset();
        self.frontend.set_num_chunks(0);
        self.frontend.set_processed_chunks(0);
    }

    /// Run one classification task.
    ///
    /// Fails with [`Error::TaskInProgress`] if another task is running on
    /// this pipeline. Aborting errors are also shown through the frontend.
    pub async fn run(&self, request: TaskRequest) -> Result<TaskOutcome> {
        let result = match self.run_lock.try_lock() {
            Ok(_guard) => {
                let result = self.run_task(&request).await;
                self.clear();
                result
            }
            Err(_) => Err(Error::TaskInProgress),
        };

        if let Err(e) = &result
            && e.aborts_task()
        {
            self.audit.record(format!("Task {} aborted: {}", request.task, e));
            self.frontend.show_error(&e.to_string());
        }
        result
    }

    async fn run_task(&self, request: &TaskRequest) -> Result<TaskOutcome> {
        let settings = &self.settings;
        let task = request.task;
        let policy = task.policy();

        let source = request.source.clone();
        let registry = self.files.registry();
        let (mut table, source_hash) = tokio::task::spawn_blocking(move || {
            let table = registry.read(&source)?;
            let hash = content_hash(&source)?;
            Ok::<_, Error>((table, hash))
        })
        .await
        .map_err(|e| anyhow::anyhow!("source loading task failed: {e}"))??;

        self.frontend.set_column_names(&table.headers);
        self.audit.record(format!(
            "Opened {} ({} rows)",
            request.source.display(),
            table.len()
        ));

        let target_idx = table.require_column(&request.target_column)?;
        let index_idx = table.require_column(&settings.index_column)?;
        let comparison_idx = if policy.uses_comparison || policy.filter == RowFilter::OpinionsOnly {
            Some(table.require_column(&settings.comparison_column)?)
        } else {
            None
        };

        let output_column = request
            .output_column
            .clone()
            .unwrap_or_else(|| policy.default_output_column.to_string());
        if output_column == settings.index_column || output_column == request.target_column {
            return Err(Error::InvalidSelection(format!(
                "Output column '{}' would overwrite an input column",
                output_column
            )));
        }

        let selected: Vec<usize> = (0..table.len())
            .filter(|&row| match (policy.filter, comparison_idx) {
                (RowFilter::OpinionsOnly, Some(idx)) => {
                    table.cell(row, idx) == settings.opinion_label
                }
                _ => true,
            })
            .collect();
        if selected.is_empty() {
            return Err(Error::InvalidSelection(format!(
                "No rows to classify in column '{}'",
                request.target_column
            )));
        }

        let mut records = Vec::with_capacity(selected.len());
        for &row in &selected {
            let raw_id = table.cell(row, index_idx);
            let row_id = parse_row_id(raw_id).ok_or_else(|| {
                Error::InvalidSelection(format!(
                    "Row {} has a non-integer '{}' value: '{}'",
                    row + 2,
                    settings.index_column,
                    raw_id
                ))
            })?;
            let mut record = RowRecord::new(row_id, table.cell(row, target_idx));
            if policy.uses_comparison
                && let Some(idx) = comparison_idx
                && !table.cell(row, idx).is_empty()
            {
                record = record.with_comparison(table.cell(row, idx));
            }
            records.push(record);
        }

        let template = task.template();
        let chunks = ChunkBuilder::new(&self.estimator, settings.max_context_tokens)
            .build(&records, &template)?;
        let num_chunks = chunks.len();

        self.progress.start(num_chunks);
        self.frontend.set_num_chunks(num_chunks);

        let file_name = request
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let fingerprint = Fingerprint::new(FingerprintParts {
            file_name: &file_name,
            index_column: &settings.index_column,
            target_column: &request.target_column,
            comparison_column: policy
                .uses_comparison
                .then_some(settings.comparison_column.as_str()),
            row_filter_label: (policy.filter == RowFilter::OpinionsOnly)
                .then_some(settings.opinion_label.as_str()),
            output_column: &output_column,
            task,
            model: self.dispatcher.model_name(),
            max_context_tokens: settings.max_context_tokens,
            content_hash: &source_hash,
        });
        info!(
            "Running {} on {} rows of {} in {} chunks",
            task,
            records.len(),
            file_name,
            num_chunks
        );
        self.audit.record(format!(
            "Started {} on {} ({} rows, {} chunks, fingerprint {})",
            task,
            file_name,
            records.len(),
            num_chunks,
            fingerprint
        ));

        let ctx = TaskContext {
            fingerprint: fingerprint.clone(),
            cache: self.cache.clone(),
            progress: Arc::clone(&self.progress),
        };
        let frontend = Arc::clone(&self.frontend);
        let report = self
            .dispatcher
            .dispatch(&ctx, chunks, &template, move |processed| {
                frontend.set_processed_chunks(processed)
            })
            .await;

        for failure in &report.failures {
            self.audit.record(failure.to_string());
        }

        let reconciliation = reconcile(records.iter().map(|r| r.row_id), &report.responses);
        for warning in &reconciliation.warnings {
            self.audit.record(warning.to_string());
        }
        let column = reconciliation.column;

        let row_count_mismatch = check_row_count(&records);
        if let Some(mismatch) = row_count_mismatch {
            warn!(
                "Row count changed from {} to {} when joining labels",
                mismatch.expected, mismatch.actual
            );
            self.audit.record(format!(
                "Row count mismatch: {} rows classified, {} rows after merging",
                mismatch.expected, mismatch.actual
            ));
        }

        let unlabelled = column.unlabelled();
        if !unlabelled.is_empty() {
            self.audit.record(format!(
                "{} of {} rows received no label: {:?}",
                unlabelled.len(),
                column.len(),
                unlabelled
            ));
        }

        let extra = Table::new(
            vec![settings.index_column.clone(), output_column.clone()],
            selected
                .iter()
                .zip(column.iter())
                .map(|(&row, (_, label))| {
                    vec![
                        table.cell(row, index_idx).to_string(),
                        label.unwrap_or_default().to_string(),
                    ]
                })
                .collect(),
        );
        merge_column(&mut table, &extra, &settings.index_column, &output_column)?;

        let combined_path = output_path(&settings.output_dir, "Combined", &request.source);
        let extra_path = output_path(&settings.output_dir, "Extra", &request.source);
        self.files.write_tables(vec![
            (table, combined_path.clone()),
            (extra, extra_path.clone()),
        ])
        .await?;
        self.audit.record(format!(
            "Saved {} and {}",
            combined_path.display(),
            extra_path.display()
        ));

        Ok(TaskOutcome {
            fingerprint,
            output_column,
            num_rows: records.len(),
            num_chunks,
            failed_chunks: report.failed_positions(),
            parse_warnings: reconciliation.warnings.len(),
            cache_hits: report.cache_hits,
            model_calls: report.model_calls,
            row_count_mismatch,
            combined_path,
            extra_path,
            column,
        })
    }
}

/// Row ids are integers; spreadsheet cells may carry them as `12.0`.
pub(crate) fn parse_row_id(raw: &str) -> Option<RowId> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<RowId>() {
        return Some(id);
    }
    let float: f64 = raw.parse().ok()?;
    (float.is_finite() && float.fract() == 0.0 && float.abs() < RowId::MAX as f64)
        .then_some(float as RowId)
}

/// Rows a join on the row id produces, compared with the rows classified.
/// The two differ only when ids repeat.
fn check_row_count(records: &[RowRecord]) -> Option<RowCountMismatch> {
    let mut occurrences: HashMap<RowId, usize> = HashMap::new();
    for record in records {
        *occurrences.entry(record.row_id).or_default() += 1;
    }
    let expected = records.len();
    let actual = records
        .iter()
        .map(|record| occurrences[&record.row_id])
        .sum();

    (expected != actual).then_some(RowCountMismatch { expected, actual })
}

/// `{dir}/{label}({stem}).{ext}`; spreadsheets stay xlsx, anything else is
/// written as CSV.
pub(crate) fn output_path(dir: &Path, label: &str, source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "data".to_string());
    dir.join(format!("{}({}).{}", label, stem, output_extension(source)))
}

pub(crate) fn output_extension(source: &Path) -> &'static str {
    let extension = source
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" => "xlsx",
        _ => "csv",
    }
}
