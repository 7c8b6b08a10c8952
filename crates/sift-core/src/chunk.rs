//! Chunk builder - token-budgeted batching of rows
//!
//! Rows are packed greedily, in input order, into the fewest chunks whose
//! content fits the model budget left over after the prompt overhead. The
//! position assigned here is the only thing that recovers row order once
//! the chunks have been dispatched concurrently.

use serde::{Deserialize, Serialize};
use sift_tokens::TokenEstimator;
use tracing::debug;

use crate::{Error, PromptTemplate, Result, RowId, RowRecord};

const ROW_SEPARATOR: &str = "\n";

/// A batch of serialized rows sent as one model request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// 0-based index in build order
    pub position: usize,
    /// Ids of the rows in this chunk, in input order
    pub row_ids: Vec<RowId>,
    /// Serialized rows joined by newlines
    pub content: String,
    /// Sum of the per-row token counts
    pub token_count: usize,
}

impl Chunk {
    /// BLAKE3 hex of everything the model sees for this chunk, plus the
    /// model name. A cached reply is only reused while this is unchanged.
    pub fn request_digest(&self, template: &PromptTemplate, model: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        for part in [
            model,
            template.system_instruction.as_str(),
            template.response_format_instruction.as_str(),
            self.content.as_str(),
        ] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// Raw model reply for one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkResponse {
    pub position: usize,
    pub response: String,
}

pub struct ChunkBuilder<'a> {
    estimator: &'a TokenEstimator,
    max_tokens_for_model: usize,
}

impl<'a> ChunkBuilder<'a> {
    pub fn new(estimator: &'a TokenEstimator, max_tokens_for_model: usize) -> Self {
        Self {
            estimator,
            max_tokens_for_model,
        }
    }

    /// Tokens available for rows once the template's fixed overhead is paid.
    pub fn budget(&self, template: &PromptTemplate) -> Result<usize> {
        let overhead = self.estimator.count_tokens(&template.system_instruction)
            + self
                .estimator
                .count_tokens(&template.response_format_instruction);

        if overhead >= self.max_tokens_for_model {
            return Err(Error::Configuration(format!(
                "Prompt overhead of {} tokens leaves no room in the {}-token model budget",
                overhead, self.max_tokens_for_model
            )));
        }

        Ok(self.max_tokens_for_model - overhead)
    }

    /// Partition `rows` into chunks under the template's budget.
    ///
    /// A row that alone exceeds the budget still gets a chunk of its own;
    /// rows are never split.
    pub fn build(&self, rows: &[RowRecord], template: &PromptTemplate) -> Result<Vec<Chunk>> {
        let budget = self.budget(template)?;

        let mut chunks = Vec::new();
        let mut current = PendingChunk::default();

        for row in rows {
            let serialized = row.serialize();
            let token_count = self.estimator.count_tokens(&serialized);

            if !current.is_empty() && current.token_count + token_count > budget {
                let position = chunks.len();
                chunks.push(std::mem::take(&mut current).finish(position));
            }

            current.push(row.row_id, serialized, token_count);
        }

        if !current.is_empty() {
            let position = chunks.len();
            chunks.push(current.finish(position));
        }

        debug!(
            "Built {} chunks from {} rows (budget {} tokens)",
            chunks.len(),
            rows.len(),
            budget
        );

        Ok(chunks)
    }
}

#[derive(Default)]
struct PendingChunk {
    row_ids: Vec<RowId>,
    lines: Vec<String>,
    token_count: usize,
}

impl PendingChunk {
    fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    fn push(&mut self, row_id: RowId, line: String, token_count: usize) {
        self.row_ids.push(row_id);
        self.lines.push(line);
        self.token_count += token_count;
    }

    fn finish(self, position: usize) -> Chunk {
        Chunk {
            position,
            row_ids: self.row_ids,
            content: self.lines.join(ROW_SEPARATOR),
            token_count: self.token_count,
        }
    }
}
