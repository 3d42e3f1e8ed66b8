use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::llm::LlmClient;
use crate::pipeline::translate_docx;
use crate::progress::{ProgressRecord, ProgressStore};
use crate::runlog::RunLog;

/// One translation request. Everything the engine does not interpret —
/// target language, model id, credential, progress id — is an opaque
/// string chosen by the caller.
#[derive(Clone, Debug, Deserialize)]
pub struct TranslateRequest {
    pub file_base64: String,
    pub file_name: String,
    pub target_language: String,
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    pub progress_id: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TranslateResponse {
    pub translated_base64: String,
    pub file_name: String,
    /// Newline-separated diagnostics from the run.
    pub log: String,
    pub stats: RequestStats,
    pub preview: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct RequestStats {
    pub paragraph_count: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost: f64,
}

/// Request entry point: validate, decode, run the pipeline, package the
/// response. All state is request-scoped except the injected progress
/// store; nothing is written to disk.
pub async fn handle_translate(
    client: &dyn LlmClient,
    cfg: &EngineConfig,
    store: &ProgressStore,
    request: TranslateRequest,
) -> Result<TranslateResponse, EngineError> {
    validate(&request)?;
    let docx_bytes = BASE64
        .decode(request.file_base64.as_bytes())
        .map_err(|e| EngineError::Validation(format!("file_base64 is not valid base64: {e}")))?;

    store.start(&request.progress_id);
    let log = RunLog::new();
    log.push(format!(
        "request: file={} target={} model={}",
        request.file_name, request.target_language, request.model
    ));

    let outcome = match translate_docx(
        client,
        cfg,
        &docx_bytes,
        &request.target_language,
        &request.model,
        &request.api_key,
        store,
        &request.progress_id,
        &log,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            if err.is_catastrophic() {
                store.set_error(&request.progress_id);
            }
            store.finish(&request.progress_id);
            return Err(err);
        }
    };

    let stats = RequestStats {
        paragraph_count: outcome.paragraph_count,
        input_tokens: outcome.usage.input,
        output_tokens: outcome.usage.output,
        total_tokens: outcome.usage.total,
        estimated_cost: cfg.estimated_cost(outcome.usage.input, outcome.usage.output),
    };
    log.push(format!(
        "request: done; {} paragraph(s), {} batch(es), {} failed, {} token(s)",
        stats.paragraph_count, outcome.batch_count, outcome.failed_batches, stats.total_tokens
    ));

    let preview = build_preview(&outcome.translated_texts, cfg.preview_max_chars);
    let response = TranslateResponse {
        translated_base64: BASE64.encode(&outcome.docx_bytes),
        file_name: translated_file_name(&request.file_name),
        log: log.render(),
        stats,
        preview,
    };
    store.finish(&request.progress_id);
    Ok(response)
}

/// Status endpoint read. Unknown ids yield `None`, the caller's not-found.
pub fn read_progress(store: &ProgressStore, progress_id: &str) -> Option<ProgressRecord> {
    store.get(progress_id)
}

fn validate(request: &TranslateRequest) -> Result<(), EngineError> {
    let mut missing: Vec<&str> = Vec::new();
    if request.file_base64.trim().is_empty() {
        missing.push("file_base64");
    }
    if request.target_language.trim().is_empty() {
        missing.push("target_language");
    }
    if request.model.trim().is_empty() {
        missing.push("model");
    }
    if request.progress_id.trim().is_empty() {
        missing.push("progress_id");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Validation(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )))
    }
}

fn translated_file_name(original: &str) -> String {
    match original.strip_suffix(".docx") {
        Some(stem) if !stem.is_empty() => format!("{stem}_translated.docx"),
        _ => "translated.docx".to_string(),
    }
}

fn build_preview(texts: &[String], max_chars: usize) -> Option<String> {
    if texts.is_empty() || max_chars == 0 {
        return None;
    }
    let joined = texts.join("\n\n");
    if joined.chars().count() <= max_chars {
        Some(joined)
    } else {
        Some(joined.chars().take(max_chars).collect())
    }
}
