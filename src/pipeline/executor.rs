use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::config::EngineConfig;
use crate::docx::document::DocxDocument;
use crate::ir::{Batch, BatchResult};
use crate::llm::LlmClient;
use crate::progress::ProgressStore;

use super::prompts::{build_robust_prompt, build_standard_prompt};
use super::translator::{build_batch_result, parse_batch_reply};

/// Opaque strings forwarded to the client with every call.
pub struct CallParams<'a> {
    pub target_language: &'a str,
    pub model: &'a str,
    pub api_key: &'a str,
}

/// Drive all batches through a bounded worker pool.
///
/// Workers run `max_concurrent_batches` at a time in whatever order the pool
/// schedules them; results are re-sorted into batch order afterwards so the
/// applier's document mutations stay deterministic. A batch that exhausts
/// its retries comes back failed with its source texts echoed — peers keep
/// running, partial failure is a first-class outcome.
pub async fn execute_batches(
    client: &dyn LlmClient,
    doc: &DocxDocument,
    batches: &[Batch],
    cfg: &EngineConfig,
    params: &CallParams<'_>,
    progress: &ProgressStore,
    progress_id: &str,
) -> Vec<BatchResult> {
    let mut results: Vec<BatchResult> = stream::iter(batches.iter())
        .map(|batch| async move {
            let result = run_batch(client, doc, batch, cfg, params).await;
            progress.complete_one(progress_id);
            result
        })
        .buffer_unordered(cfg.max_concurrent_batches.max(1))
        .collect()
        .await;
    results.sort_by_key(|r| r.batch_id);
    results
}

async fn run_batch(
    client: &dyn LlmClient,
    doc: &DocxDocument,
    batch: &Batch,
    cfg: &EngineConfig,
    params: &CallParams<'_>,
) -> BatchResult {
    let prompt = if batch.use_robust {
        build_robust_prompt(doc, batch, params.target_language)
    } else {
        build_standard_prompt(batch, params.target_language)
    };

    let mut logs: Vec<String> = Vec::new();
    let attempts = cfg.max_retries + 1;
    for attempt in 1..=attempts {
        let call = client.translate(&prompt, params.model, params.api_key);
        match tokio::time::timeout(Duration::from_secs(cfg.per_attempt_timeout_s), call).await {
            Ok(Ok(reply)) => {
                let parsed = parse_batch_reply(batch, &reply.text);
                if parsed.recovered == 0 && !batch.members.is_empty() {
                    logs.push(format!(
                        "batch {}: attempt {attempt}/{attempts}: reply carried no items",
                        batch.id
                    ));
                } else {
                    let mut result = build_batch_result(batch, &reply, parsed);
                    if !logs.is_empty() {
                        let mut all = std::mem::take(&mut logs);
                        all.extend(result.logs);
                        result.logs = all;
                    }
                    return result;
                }
            }
            Ok(Err(err)) => {
                logs.push(format!(
                    "batch {}: attempt {attempt}/{attempts}: {err}",
                    batch.id
                ));
                if !err.is_retriable() {
                    break;
                }
            }
            Err(_) => {
                logs.push(format!(
                    "batch {}: attempt {attempt}/{attempts}: timed out after {}s",
                    batch.id, cfg.per_attempt_timeout_s
                ));
            }
        }
        if attempt < attempts {
            tokio::time::sleep(Duration::from_secs(cfg.retry_backoff_s)).await;
        }
    }

    logs.push(format!(
        "batch {}: retries exhausted; {} paragraph(s) will carry untranslated markers",
        batch.id,
        batch.members.len()
    ));
    BatchResult::failed_with_sources(batch, logs)
}
