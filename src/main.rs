use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use manuscript_translator::config::{find_default_config, load_config, EngineConfig};
use manuscript_translator::docx::document::DocxDocument;
use manuscript_translator::llm::EchoClient;
use manuscript_translator::progress::ProgressStore;
use manuscript_translator::request::{handle_translate, TranslateRequest};

/// Structural verification harness for the translation engine.
///
/// Provider SDKs live outside this crate, so the binary drives the full
/// pipeline with the identity client: every paragraph is filtered, planned,
/// batched, "translated" to itself and written back. Useful for checking
/// that a given manuscript survives the round trip with formatting intact.
#[derive(Parser, Debug)]
#[command(name = "manuscript-translator")]
#[command(about = "DOCX translation engine (batch planner + format-preserving applier)", long_about = None)]
struct Args {
    /// Input .docx
    #[arg(value_name = "DOCX")]
    input: PathBuf,

    /// Output .docx (default: <input_stem>_translated.docx)
    #[arg(short, long, value_name = "DOCX")]
    output: Option<PathBuf>,

    /// Target language name forwarded to the client
    #[arg(long, default_value = "Spanish")]
    target_lang: String,

    /// Model identifier forwarded to the client
    #[arg(long, default_value = "echo")]
    model: String,

    /// Config file path (default: search for manuscript-translator.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Progress id to publish under while running
    #[arg(long, default_value = "cli")]
    progress_id: String,

    /// Only parse + re-serialize the DOCX (no translation pipeline)
    #[arg(long)]
    roundtrip_only: bool,

    /// Print the request log after the run
    #[arg(long)]
    print_log: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let output = args.output.clone().unwrap_or_else(|| {
        let stem = args
            .input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("output");
        args.input.with_file_name(format!("{stem}_translated.docx"))
    });

    let input_bytes = std::fs::read(&args.input)
        .with_context(|| format!("read input docx: {}", args.input.display()))?;

    if args.roundtrip_only {
        let doc = DocxDocument::from_bytes(&input_bytes).context("parse docx")?;
        let out = doc.to_bytes().context("serialize docx")?;
        std::fs::write(&output, out)
            .with_context(|| format!("write output docx: {}", output.display()))?;
        eprintln!("Roundtrip written: {}", output.display());
        return Ok(());
    }

    let cfg = match args
        .config
        .clone()
        .or_else(|| find_default_config("manuscript-translator.toml"))
    {
        Some(path) => {
            eprintln!("Config: {}", path.display());
            EngineConfig::from_app(&load_config(&path)?)
        }
        None => EngineConfig::default(),
    };

    let store = ProgressStore::new(Duration::from_secs(cfg.progress_linger_s));
    let request = TranslateRequest {
        file_base64: BASE64.encode(&input_bytes),
        file_name: args
            .input
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("input.docx")
            .to_string(),
        target_language: args.target_lang.clone(),
        model: args.model.clone(),
        api_key: std::env::var("MANUSCRIPT_TRANSLATOR_API_KEY").unwrap_or_default(),
        progress_id: args.progress_id.clone(),
    };

    let poller = {
        let store = store.clone();
        let progress_id = args.progress_id.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(2)).await;
                if let Some(rec) = store.get(&progress_id) {
                    eprintln!(
                        "progress: {}/{} batch(es){}",
                        rec.completed_batches,
                        rec.total_batches,
                        if rec.error { " [error]" } else { "" }
                    );
                }
            }
        })
    };

    let result = handle_translate(&EchoClient, &cfg, &store, request).await;
    poller.abort();

    let response = result?;
    let bytes = BASE64
        .decode(response.translated_base64.as_bytes())
        .context("decode response payload")?;
    std::fs::write(&output, bytes)
        .with_context(|| format!("write output docx: {}", output.display()))?;

    eprintln!(
        "Done: {} paragraph(s), {} token(s), est. cost ${:.4} -> {}",
        response.stats.paragraph_count,
        response.stats.total_tokens,
        response.stats.estimated_cost,
        output.display()
    );
    if args.print_log {
        eprintln!("{}", response.log);
    }
    Ok(())
}
