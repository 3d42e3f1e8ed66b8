mod applier;
mod executor;
mod filter;
mod planner;
mod prompts;
mod translator;

pub use applier::apply_results;
pub use executor::{execute_batches, CallParams};
pub use filter::filter_document;
pub use planner::{estimate_tokens, paragraph_complexity, plan_batches};
pub use prompts::{build_robust_prompt, build_standard_prompt, encode_run_flags, render_template};
pub use translator::parse_batch_reply;

use crate::config::EngineConfig;
use crate::docx::document::DocxDocument;
use crate::error::EngineError;
use crate::ir::UsageTotals;
use crate::llm::LlmClient;
use crate::progress::ProgressStore;
use crate::runlog::RunLog;

/// What a finished document run hands back to the request layer.
pub struct TranslationOutcome {
    pub docx_bytes: Vec<u8>,
    pub paragraph_count: usize,
    pub batch_count: usize,
    pub failed_batches: usize,
    pub usage: UsageTotals,
    /// Translated text of each filtered paragraph, in document order.
    pub translated_texts: Vec<String>,
}

/// The request-scoped pipeline: load, filter, plan, execute, apply,
/// serialize. Sequential phases except the executor's worker pool; the
/// document is only ever mutated on this side of the await.
#[allow(clippy::too_many_arguments)]
pub async fn translate_docx(
    client: &dyn LlmClient,
    cfg: &EngineConfig,
    docx_bytes: &[u8],
    target_language: &str,
    model: &str,
    api_key: &str,
    progress: &ProgressStore,
    progress_id: &str,
    log: &RunLog,
) -> Result<TranslationOutcome, EngineError> {
    let mut doc = DocxDocument::from_bytes(docx_bytes).map_err(EngineError::Loader)?;
    log.push(format!(
        "loader: {} paragraph(s) in document",
        doc.paragraph_count()
    ));

    let filtered = filter_document(&mut doc, log);
    let batches = plan_batches(&doc, &filtered, cfg, log);
    progress.set_total(progress_id, batches.len());

    let params = CallParams {
        target_language,
        model,
        api_key,
    };
    let results = execute_batches(client, &doc, &batches, cfg, &params, progress, progress_id).await;

    let mut usage = UsageTotals::default();
    let mut failed_batches = 0usize;
    for result in &results {
        usage.absorb(result);
        if result.failed {
            failed_batches += 1;
        }
        log.extend(result.logs.iter().cloned());
    }
    if failed_batches > 0 {
        log.push(format!(
            "executor: {failed_batches}/{} batch(es) failed; their paragraphs carry untranslated markers",
            batches.len()
        ));
    }

    apply_results(&mut doc, &batches, &results, log);

    let translated_texts = filtered
        .iter()
        .filter_map(|fp| doc.paragraph(fp.index).map(|p| p.text()))
        .collect();

    let docx_bytes = doc.to_bytes().map_err(EngineError::Serializer)?;
    Ok(TranslationOutcome {
        docx_bytes,
        paragraph_count: filtered.len(),
        batch_count: batches.len(),
        failed_batches,
        usage,
        translated_texts,
    })
}
