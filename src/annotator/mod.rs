//! Batch annotator
//!
//! Sends parsed process records to a text generation model in fixed-size
//! batches and merges the per-process verdicts back onto the records.
//!
//! ```text
//! records ──► chunk(batch_size) ──► prompt ──► TextGenerator
//!                                                  │
//!   enriched records ◄── reconcile by pid ◄── unwrap fence + parse
//! ```
//!
//! A batch whose reply cannot be used is annotated with a fixed fallback;
//! other batches are unaffected. There are no retries.

pub mod gemini;
pub mod prompt;
pub mod response;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Annotation, ProcessRecord};

pub use gemini::GeminiClient;
use response::{parse_analysis_results, AnalysisResult};

pub const PARSE_FAILURE_DESCRIPTION: &str = "Analysis unavailable due to parsing error";
pub const PARSE_FAILURE_REASON: &str = "Could not parse AI response";

pub const MISSING_DESCRIPTION: &str = "Analysis not available";
pub const MISSING_REASON: &str = "No analysis data received";

pub const DEFAULT_DESCRIPTION: &str = "No description provided";
pub const DEFAULT_REASON: &str = "No reason provided";

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("Model request failed: {0}")]
    Request(String),

    #[error("Model returned HTTP {0}")]
    Status(u16),

    #[error("Model returned no text")]
    EmptyResponse,

    #[error("Could not parse model response: {0}")]
    Parse(String),
}

/// A text generation backend: prompt in, free-form text out
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Name of the backend, for logs
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, AnnotateError>;
}

/// Annotation applied to every record of a batch whose reply was unusable
pub fn parse_failure_annotation() -> Annotation {
    Annotation::new(PARSE_FAILURE_DESCRIPTION, false, PARSE_FAILURE_REASON)
}

/// Annotation for a record the model did not mention
pub fn missing_annotation() -> Annotation {
    Annotation::new(MISSING_DESCRIPTION, false, MISSING_REASON)
}

#[derive(Clone)]
pub struct Annotator {
    generator: Arc<dyn TextGenerator>,
    batch_size: usize,
}

impl Annotator {
    pub fn new(generator: Arc<dyn TextGenerator>, batch_size: usize) -> Self {
        Self {
            generator,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Annotate every record, preserving order and count.
    /// Batches are sent one after another.
    pub async fn annotate(&self, records: Vec<ProcessRecord>) -> Vec<ProcessRecord> {
        let total_batches = records.len().div_ceil(self.batch_size);
        let mut output = Vec::with_capacity(records.len());

        for (idx, batch) in records.chunks(self.batch_size).enumerate() {
            tracing::info!(
                "Annotating batch {}/{} ({} processes) via {}",
                idx + 1,
                total_batches,
                batch.len(),
                self.generator.name()
            );

            let results = match self.analyze_batch(batch).await {
                Ok(results) => Some(results),
                Err(e) => {
                    tracing::warn!("Batch {}/{} degraded: {}", idx + 1, total_batches, e);
                    None
                }
            };

            output.extend(reconcile(batch, results.as_deref()));
        }

        output
    }

    async fn analyze_batch(&self, batch: &[ProcessRecord]) -> Result<Vec<AnalysisResult>, AnnotateError> {
        let prompt = prompt::build_batch_prompt(batch)
            .map_err(|e| AnnotateError::Request(format!("failed to serialize batch: {}", e)))?;

        let reply = self.generator.generate(&prompt).await?;
        parse_analysis_results(&reply)
    }
}

/// Merge verdicts onto a batch by pid.
///
/// `None` means the batch reply was unusable and every record gets the
/// parse-failure annotation. When the model repeats a pid, the last
/// verdict wins.
pub fn reconcile(batch: &[ProcessRecord], results: Option<&[AnalysisResult]>) -> Vec<ProcessRecord> {
    let Some(results) = results else {
        return batch
            .iter()
            .cloned()
            .map(|mut record| {
                record.annotate(parse_failure_annotation());
                record
            })
            .collect();
    };

    let lookup: HashMap<String, &AnalysisResult> = results
        .iter()
        .filter_map(|r| r.pid.as_ref().map(|pid| (pid.lookup_key(), r)))
        .collect();

    batch
        .iter()
        .cloned()
        .map(|mut record| {
            let annotation = match lookup.get(&record.pid.lookup_key()) {
                Some(result) => Annotation {
                    description: result
                        .description
                        .clone()
                        .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
                    suspicious: result.suspicious.unwrap_or(false),
                    reason: result
                        .reason
                        .clone()
                        .unwrap_or_else(|| DEFAULT_REASON.to_string()),
                },
                None => missing_annotation(),
            };
            record.annotate(annotation);
            record
        })
        .collect()
}
