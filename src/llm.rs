use async_trait::async_trait;

use crate::error::LlmError;

/// What a completion call returns. Providers that do not report usage leave
/// the counters at zero.
#[derive(Clone, Debug, Default)]
pub struct LlmReply {
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

/// The engine's one dependency on the outside world.
///
/// Implementations wrap a concrete provider (a Google-family completion
/// service, an aggregator, …) and must request plain-text output: JSON
/// object modes normalize whitespace and corrupt indentation. The engine
/// passes `model` and `api_key` through opaquely.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn translate(
        &self,
        prompt: &str,
        model: &str,
        api_key: &str,
    ) -> Result<LlmReply, LlmError>;
}

/// Identity client: replays the prompt unchanged.
///
/// The prompt embeds each source passage inside the same delimiter pair the
/// model is told to answer with, so replaying it makes the response parser
/// recover the source texts verbatim. That turns the full pipeline into a
/// structural round-trip harness without any network dependency.
pub struct EchoClient;

#[async_trait]
impl LlmClient for EchoClient {
    async fn translate(
        &self,
        prompt: &str,
        _model: &str,
        _api_key: &str,
    ) -> Result<LlmReply, LlmError> {
        Ok(LlmReply {
            text: prompt.to_string(),
            ..LlmReply::default()
        })
    }
}
