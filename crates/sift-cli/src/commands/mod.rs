pub mod cache;
pub mod classify;
pub mod files;
pub mod init;

use anyhow::{Context, Result};
use sift_config::Config;
use sift_engine::{AuditLog, FileTools, Pipeline, PipelineSettings};
use sift_llm::{ChatModel, OpenAiChatModel, OpenAiSettings};
use sift_storage::ResponseCache;
use std::sync::Arc;

use crate::frontend::TerminalFrontend;

pub fn pipeline_settings(config: &Config) -> PipelineSettings {
    PipelineSettings {
        max_context_tokens: config.model.max_context_tokens,
        max_concurrency: config.dispatch.max_concurrency,
        index_column: config.dataset.index_column.clone(),
        comparison_column: config.dataset.comparison_column.clone(),
        opinion_label: config.dataset.opinion_label.clone(),
        check_column: config.dataset.check_column.clone(),
        output_dir: config.paths.output_dir.clone(),
    }
}

/// Chat model described by the `[model]` section; needs the API key
pub fn chat_model(config: &Config) -> Result<Arc<dyn ChatModel>> {
    let model = OpenAiChatModel::new(OpenAiSettings {
        api_key: config.model.api_key()?,
        base_url: config.model.base_url.clone(),
        model: config.model.name.clone(),
        timeout: config.model.request_timeout(),
        temperature: config.model.temperature,
    })?;
    Ok(Arc::new(model))
}

fn open_audit(config: &Config) -> Result<Arc<AuditLog>> {
    let audit = AuditLog::create(&config.paths.audit_dir).with_context(|| {
        format!(
            "failed to create audit log in {}",
            config.paths.audit_dir.display()
        )
    })?;
    Ok(Arc::new(audit))
}

/// File utilities for commands that never call the model
pub fn file_tools(config: &Config) -> Result<FileTools> {
    Ok(FileTools::new(
        pipeline_settings(config),
        open_audit(config)?,
        Arc::new(TerminalFrontend),
    ))
}

pub fn open_pipeline(config: &Config, model: Arc<dyn ChatModel>) -> Result<Pipeline> {
    let cache = ResponseCache::new(config.paths.cache_dir.clone()).with_context(|| {
        format!(
            "failed to open response cache at {}",
            config.paths.cache_dir.display()
        )
    })?;

    Ok(Pipeline::new(
        pipeline_settings(config),
        model,
        cache,
        open_audit(config)?,
        Arc::new(TerminalFrontend),
    ))
}
