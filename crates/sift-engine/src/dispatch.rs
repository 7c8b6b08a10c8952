//! Concurrent dispatcher
//!
//! One tokio task per chunk, at most `max_concurrency` of them holding a
//! semaphore permit at once. Each task consults the response cache before
//! calling the model and writes fresh replies back. Failures stay local to
//! their chunk. Results are collected under one lock together with the
//! processed counter, then sorted by chunk position once every task has
//! finished. A chunk whose task panicked is recorded as failed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use sift_core::{Chunk, ChunkResponse, Error, Fingerprint, PromptTemplate};
use sift_llm::{ChatModel, ChatPrompt};
use sift_storage::ResponseCache;
use sift_tokens::TokenEstimator;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::Progress;

/// Everything a dispatch run shares across its workers
#[derive(Clone)]
pub struct TaskContext {
    pub fingerprint: Fingerprint,
    pub cache: ResponseCache,
    pub progress: Arc<Progress>,
}

/// Where a chunk's reply came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Model,
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Replies sorted by chunk position; failed chunks are absent
    pub responses: Vec<ChunkResponse>,
    /// One [`Error::ModelCall`] per chunk that produced no reply
    pub failures: Vec<Error>,
    pub cache_hits: usize,
    pub model_calls: usize,
}

impl DispatchReport {
    pub fn failed_positions(&self) -> Vec<usize> {
        self.failures
            .iter()
            .filter_map(|failure| match failure {
                Error::ModelCall { position, .. } => Some(*position),
                _ => None,
            })
            .collect()
    }
}

#[derive(Default)]
struct Shared {
    report: DispatchReport,
    processed: usize,
}

pub struct Dispatcher {
    model: Arc<dyn ChatModel>,
    estimator: TokenEstimator,
    max_concurrency: usize,
}

impl Dispatcher {
    pub fn new(model: Arc<dyn ChatModel>, estimator: TokenEstimator, max_concurrency: usize) -> Self {
        Self {
            model,
            estimator,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Send every chunk and wait for all of them.
    ///
    /// `on_progress` is called with the new processed count while the result
    /// lock is held, so the values it sees never decrease.
    pub async fn dispatch<F>(
        &self,
        ctx: &TaskContext,
        chunks: Vec<Chunk>,
        template: &PromptTemplate,
        on_progress: F,
    ) -> DispatchReport
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let total = chunks.len();
        let positions: Vec<usize> = chunks.iter().map(|c| c.position).collect();
        info!(
            "Sending {} chunks to {} (max {} in flight)",
            total,
            self.model.name(),
            self.max_concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let shared = Arc::new(Mutex::new(Shared::default()));
        let template = Arc::new(template.clone());
        let on_progress = Arc::new(on_progress);

        let mut workers = JoinSet::new();
        for chunk in chunks {
            let worker = Worker {
                model: Arc::clone(&self.model),
                estimator: self.estimator.clone(),
                ctx: ctx.clone(),
                template: Arc::clone(&template),
            };
            let semaphore = Arc::clone(&semaphore);
            let shared = Arc::clone(&shared);
            let on_progress = Arc::clone(&on_progress);

            workers.spawn(async move {
                let position = chunk.position;
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => worker.fetch(&chunk).await,
                    Err(e) => Err(e.to_string()),
                };

                let mut state = shared.lock().unwrap_or_else(|e| e.into_inner());
                match outcome {
                    Ok((response, source)) => {
                        match source {
                            ResponseSource::Cache => state.report.cache_hits += 1,
                            ResponseSource::Model => state.report.model_calls += 1,
                        }
                        state.report.responses.push(ChunkResponse { position, response });
                    }
                    Err(reason) => {
                        error!("Chunk {} failed: {}", position, reason);
                        state
                            .report
                            .failures
                            .push(Error::ModelCall { position, reason });
                    }
                }
                state.processed += 1;
                let processed = state.processed;
                worker.ctx.progress.advance_to(processed);
                on_progress(processed);
                debug!("Processed {}/{} chunks", processed, total);
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Dispatch worker did not finish: {}", e);
            }
        }

        let mut report = {
            let mut state = shared.lock().unwrap_or_else(|e| e.into_inner());
            let finished: HashSet<usize> = state
                .report
                .responses
                .iter()
                .map(|r| r.position)
                .chain(state.report.failed_positions())
                .collect();
            for position in positions {
                if finished.contains(&position) {
                    continue;
                }
                state.report.failures.push(Error::ModelCall {
                    position,
                    reason: "worker stopped before producing a reply".to_string(),
                });
                state.processed += 1;
                ctx.progress.advance_to(state.processed);
                on_progress(state.processed);
            }
            std::mem::take(&mut state.report)
        };
        report.responses.sort_by_key(|r| r.position);
        report.failures.sort_by_key(|f| match f {
            Error::ModelCall { position, .. } => *position,
            _ => usize::MAX,
        });

        info!(
            "Dispatch finished: {} replies ({} cached, {} fresh), {} failed",
            report.responses.len(),
            report.cache_hits,
            report.model_calls,
            report.failures.len()
        );
        report
    }
}

struct Worker {
    model: Arc<dyn ChatModel>,
    estimator: TokenEstimator,
    ctx: TaskContext,
    template: Arc<PromptTemplate>,
}

impl Worker {
    async fn fetch(&self, chunk: &Chunk) -> std::result::Result<(String, ResponseSource), String> {
        let position = chunk.position;
        let fingerprint = &self.ctx.fingerprint;
        let digest = chunk.request_digest(&self.template, self.model.name());

        match self.ctx.cache.get(fingerprint, position, &digest).await {
            Ok(Some(response)) => {
                debug!("Chunk {} served from cache", position);
                return Ok((response, ResponseSource::Cache));
            }
            Ok(None) => {}
            Err(e) => warn!("Cache read failed for chunk {}, calling the model: {}", position, e),
        }

        let prompt = ChatPrompt {
            system: &self.template.system_instruction,
            format: &self.template.response_format_instruction,
            content: &chunk.content,
        };
        let response = self
            .model
            .complete(prompt)
            .await
            .map_err(|e| format!("{e:#}"))?;

        debug!(
            "Chunk {} answered by {} ({} tokens)",
            position,
            self.model.name(),
            self.estimator.count_tokens(&response)
        );

        if let Err(e) = self
            .ctx
            .cache
            .put(fingerprint, position, &digest, &response)
            .await
        {
            warn!("Failed to cache response for chunk {}: {}", position, e);
        }

        Ok((response, ResponseSource::Model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoModel {
        calls: AtomicUsize,
        fail_on: Option<&'static str>,
        panic_on: Option<&'static str>,
    }

    impl EchoModel {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: None,
                panic_on: None,
            }
        }
    }

    #[async_trait]
    impl ChatModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, prompt: ChatPrompt<'_>) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(marker) = self.fail_on
                && prompt.content.contains(marker)
            {
                anyhow::bail!("model unavailable");
            }
            if let Some(marker) = self.panic_on
                && prompt.content.contains(marker)
            {
                panic!("client bug on {marker}");
            }
            Ok(prompt
                .content
                .lines()
                .map(|line| format!("{}: seen", line.split(':').next().unwrap_or("")))
                .collect::<Vec<_>>()
                .join("\n"))
        }
    }

    fn chunk(position: usize, ids: &[i64]) -> Chunk {
        Chunk {
            position,
            row_ids: ids.to_vec(),
            content: ids
                .iter()
                .map(|id| format!("{id}:text {id}"))
                .collect::<Vec<_>>()
                .join("\n"),
            token_count: 0,
        }
    }

    fn context(dir: &std::path::Path) -> TaskContext {
        TaskContext {
            fingerprint: Fingerprint::from_raw("survey.csv|opinion||category|create_category|x"),
            cache: ResponseCache::new(dir.to_path_buf()).unwrap(),
            progress: Arc::new(Progress::new()),
        }
    }

    #[tokio::test]
    async fn test_failed_chunk_is_dropped_and_counted() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let model = Arc::new(EchoModel {
            fail_on: Some("text 3"),
            ..EchoModel::new()
        });
        let dispatcher = Dispatcher::new(model.clone(), TokenEstimator::new(), 2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        let report = dispatcher
            .dispatch(
                &ctx,
                vec![chunk(0, &[1, 2]), chunk(1, &[3]), chunk(2, &[4])],
                &PromptTemplate::new("system", "format"),
                move |n| seen_cb.lock().unwrap().push(n),
            )
            .await;

        let positions: Vec<_> = report.responses.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 2]);
        assert_eq!(report.failed_positions(), vec![1]);
        assert_eq!(report.model_calls, 2);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(ctx.progress.snapshot().processed_chunks, 3);
        assert!(!ctx.cache.exists(&ctx.fingerprint, 1));
    }

    #[tokio::test]
    async fn test_no_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let model = Arc::new(EchoModel::new());
        let dispatcher = Dispatcher::new(model, TokenEstimator::new(), 4);

        let report = dispatcher
            .dispatch(&ctx, Vec::new(), &PromptTemplate::new("s", "f"), |_| {})
            .await;
        assert!(report.responses.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_panicked_worker_counts_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let model = Arc::new(EchoModel {
            panic_on: Some("text 3"),
            ..EchoModel::new()
        });
        let dispatcher = Dispatcher::new(model, TokenEstimator::new(), 2);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_cb = Arc::clone(&seen);
        let report = dispatcher
            .dispatch(
                &ctx,
                vec![chunk(0, &[1, 2]), chunk(1, &[3]), chunk(2, &[4])],
                &PromptTemplate::new("system", "format"),
                move |n| seen_cb.lock().unwrap().push(n),
            )
            .await;

        let positions: Vec<_> = report.responses.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 2]);
        assert_eq!(report.failed_positions(), vec![1]);
        assert_eq!(seen.lock().unwrap().last(), Some(&3));
        assert_eq!(ctx.progress.snapshot().processed_chunks, 3);
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_is_refetched_and_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let model = Arc::new(EchoModel::new());
        let dispatcher = Dispatcher::new(model.clone(), TokenEstimator::new(), 2);
        let template = PromptTemplate::new("system", "format");
        let chunks = vec![chunk(0, &[1, 2])];
        let digest = chunks[0].request_digest(&template, "echo");

        let path = ctx.cache.path_for(&ctx.fingerprint, 0);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{ truncated").unwrap();

        let report = dispatcher.dispatch(&ctx, chunks, &template, |_| {}).await;

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.model_calls, 1);
        assert_eq!(report.cache_hits, 0);
        assert_eq!(report.responses[0].response, "1: seen\n2: seen");
        assert_eq!(
            ctx.cache.get(&ctx.fingerprint, 0, &digest).await.unwrap().as_deref(),
            Some("1: seen\n2: seen")
        );
    }

    #[tokio::test]
    async fn test_changed_chunk_content_is_not_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let model = Arc::new(EchoModel::new());
        let dispatcher = Dispatcher::new(model.clone(), TokenEstimator::new(), 2);
        let template = PromptTemplate::new("system", "format");

        dispatcher
            .dispatch(&ctx, vec![chunk(0, &[1, 2])], &template, |_| {})
            .await;
        let report = dispatcher
            .dispatch(&ctx, vec![chunk(0, &[1, 2, 3])], &template, |_| {})
            .await;

        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.cache_hits, 0);
        assert_eq!(report.responses[0].response, "1: seen\n2: seen\n3: seen");
    }
}
