use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub pricing: PricingSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct EngineSection {
    /// Size of the executor worker pool.
    #[serde(default)]
    pub max_concurrent_batches: Option<usize>,

    /// LLM call timeout per attempt, in seconds.
    #[serde(default)]
    pub per_attempt_timeout_s: Option<u64>,

    /// Retry budget per batch (attempts = retries + 1).
    #[serde(default)]
    pub max_retries: Option<usize>,

    /// Fixed backoff between retries, in seconds.
    #[serde(default)]
    pub retry_backoff_s: Option<u64>,

    /// Planner look-ahead window for section analysis.
    #[serde(default)]
    pub window_size: Option<usize>,

    #[serde(default)]
    pub token_target_simple: Option<usize>,
    #[serde(default)]
    pub token_target_moderate: Option<usize>,
    #[serde(default)]
    pub token_target_complex: Option<usize>,

    /// Surfaced to status readers for their stuck detection; the engine
    /// itself never cancels on it.
    #[serde(default)]
    pub stuck_threshold_s: Option<u64>,

    /// How long finished progress records stay readable.
    #[serde(default)]
    pub progress_linger_s: Option<u64>,

    /// Plaintext preview cap in the translate response.
    #[serde(default)]
    pub preview_max_chars: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PricingSection {
    /// USD per million input tokens.
    #[serde(default)]
    pub input_per_mtok: Option<f64>,
    /// USD per million output tokens.
    #[serde(default)]
    pub output_per_mtok: Option<f64>,
}

/// Fully-resolved engine configuration with every default applied.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub max_concurrent_batches: usize,
    pub per_attempt_timeout_s: u64,
    pub max_retries: usize,
    pub retry_backoff_s: u64,
    pub window_size: usize,
    pub token_target_simple: usize,
    pub token_target_moderate: usize,
    pub token_target_complex: usize,
    pub stuck_threshold_s: u64,
    pub progress_linger_s: u64,
    pub preview_max_chars: usize,
    pub input_per_mtok: f64,
    pub output_per_mtok: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_batches: 4,
            per_attempt_timeout_s: 600,
            max_retries: 3,
            retry_backoff_s: 2,
            window_size: 100,
            token_target_simple: 5000,
            token_target_moderate: 3000,
            token_target_complex: 2000,
            stuck_threshold_s: 600,
            progress_linger_s: 300,
            preview_max_chars: 4000,
            input_per_mtok: 0.30,
            output_per_mtok: 2.50,
        }
    }
}

impl EngineConfig {
    pub fn from_app(cfg: &AppConfig) -> Self {
        let d = Self::default();
        let e = &cfg.engine;
        let p = &cfg.pricing;
        Self {
            max_concurrent_batches: e
                .max_concurrent_batches
                .unwrap_or(d.max_concurrent_batches)
                .max(1),
            per_attempt_timeout_s: e.per_attempt_timeout_s.unwrap_or(d.per_attempt_timeout_s),
            max_retries: e.max_retries.unwrap_or(d.max_retries),
            retry_backoff_s: e.retry_backoff_s.unwrap_or(d.retry_backoff_s),
            window_size: e.window_size.unwrap_or(d.window_size).max(1),
            token_target_simple: e.token_target_simple.unwrap_or(d.token_target_simple).max(1),
            token_target_moderate: e
                .token_target_moderate
                .unwrap_or(d.token_target_moderate)
                .max(1),
            token_target_complex: e
                .token_target_complex
                .unwrap_or(d.token_target_complex)
                .max(1),
            stuck_threshold_s: e.stuck_threshold_s.unwrap_or(d.stuck_threshold_s),
            progress_linger_s: e.progress_linger_s.unwrap_or(d.progress_linger_s),
            preview_max_chars: e.preview_max_chars.unwrap_or(d.preview_max_chars),
            input_per_mtok: p.input_per_mtok.unwrap_or(d.input_per_mtok),
            output_per_mtok: p.output_per_mtok.unwrap_or(d.output_per_mtok),
        }
    }

    pub fn estimated_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 * self.input_per_mtok + output_tokens as f64 * self.output_per_mtok)
            / 1_000_000.0
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

/// Search for the default config file upwards from the working directory,
/// then next to the executable.
pub fn find_default_config(filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 8) {
                return Some(p);
            }
        }
    }
    None
}

fn find_file_upwards(start: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    for _ in 0..max_levels {
        let candidate = dir.join(filename);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}
