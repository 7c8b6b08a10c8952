use anyhow::Result;
use sift_config::Config;
use sift_core::TaskKind;
use sift_engine::{TaskOutcome, TaskRequest};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::ClassifyArgs;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub async fn handle(config: &Config, args: ClassifyArgs) -> Result<()> {
    let task: TaskKind = args.task.parse()?;
    let pipeline = Arc::new(super::open_pipeline(config, super::chat_model(config)?)?);

    let request = TaskRequest {
        source: args.file,
        target_column: args.column,
        task,
        output_column: args.output,
    };

    let progress = pipeline.progress();
    let model_name = pipeline.model_name().to_string();
    let mut runner = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.run(request).await })
    };

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let mut last_status = String::new();
    let result = loop {
        tokio::select! {
            joined = &mut runner => break joined?,
            _ = ticker.tick() => {
                let status = progress.snapshot().status_line(&model_name);
                if status != last_status {
                    println!("{}", status);
                    last_status = status;
                }
            }
        }
    };

    match result {
        Ok(outcome) => {
            print_outcome(&outcome);
            println!("  Audit log: {}", pipeline.audit().path().display());
            Ok(())
        }
        Err(e) if e.aborts_task() => anyhow::bail!("{} aborted", task),
        Err(e) => Err(e.into()),
    }
}

fn print_outcome(outcome: &TaskOutcome) {
    println!("Completed the classification!");
    println!(
        "✓ Labelled {} of {} rows into '{}'",
        outcome.labelled(),
        outcome.num_rows,
        outcome.output_column
    );
    println!(
        "  Chunks: {} ({} cached, {} sent, {} failed)",
        outcome.num_chunks,
        outcome.cache_hits,
        outcome.model_calls,
        outcome.failed_chunks.len()
    );
    if outcome.parse_warnings > 0 {
        println!("  Skipped reply lines: {}", outcome.parse_warnings);
    }
    if let Some(mismatch) = outcome.row_count_mismatch {
        println!(
            "  Warning: {} rows classified but {} rows after merging",
            mismatch.expected, mismatch.actual
        );
    }
    let unlabelled = outcome.unlabelled();
    if !unlabelled.is_empty() {
        println!("  Rows without a label: {:?}", unlabelled);
    }
    println!("  Combined: {}", outcome.combined_path.display());
    println!("  Extra: {}", outcome.extra_path.display());
}

pub fn list_tasks() -> Result<()> {
    println!("Tasks:");
    for task in TaskKind::ALL {
        println!(
            "  {:<20} {} (writes '{}')",
            task.id(),
            task.display_name(),
            task.policy().default_output_column
        );
    }
    Ok(())
}
