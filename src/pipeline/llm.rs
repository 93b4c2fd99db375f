//! Slide enhancement: the [`Enhancer`] seam and its LLM implementation.
//!
//! The assembler only sees the [`Enhancer`] trait. Three implementations
//! exist: [`LlmEnhancer`] (chat completion through `edgequake-llm`),
//! [`Passthrough`] (returns the raw text unchanged, used when enhancement is
//! disabled) and whatever a caller or test supplies.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 errors from LLM APIs are transient and frequent under
//! concurrent load. Each attempt is bounded by `api_timeout_secs`; failed
//! attempts back off exponentially (`retry_backoff_ms * 2^attempt`), so with
//! a 500 ms base and 2 retries the wait sequence is 500 ms → 1 s.

use crate::config::ConversionConfig;
use crate::error::{EbookError, EnhancementError};
use crate::prompts::{slide_prompt, DEFAULT_SYSTEM_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Default model when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Everything an enhancer knows about one slide.
#[derive(Debug, Clone, Copy)]
pub struct EnhanceRequest<'a> {
    /// 1-based slide index in the source deck.
    pub slide_index: usize,
    pub chapter_number: usize,
    /// 1-based position of the slide within its chapter.
    pub position: usize,
    pub chapter_len: usize,
    pub deck_title: &'a str,
    pub slide_title: &'a str,
    /// Slide body text; also the fallback when enhancement fails.
    pub text: &'a str,
    pub image_count: usize,
}

/// Enhanced slide text plus usage figures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enhancement {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Attempts that failed before this one succeeded.
    pub retries: u32,
}

impl Enhancement {
    /// An enhancement without usage figures.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Turns one slide's raw text into book prose.
///
/// Implementations must be safe to call concurrently; the assembler keeps
/// up to `concurrency` requests in flight.
pub trait Enhancer: Send + Sync {
    fn enhance(
        &self,
        req: &EnhanceRequest<'_>,
    ) -> impl Future<Output = Result<Enhancement, EnhancementError>> + Send;

    /// False for enhancers that return the input unchanged.
    fn is_active(&self) -> bool {
        true
    }
}

/// Returns the raw slide text unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Enhancer for Passthrough {
    async fn enhance(&self, req: &EnhanceRequest<'_>) -> Result<Enhancement, EnhancementError> {
        Ok(Enhancement::text(req.text))
    }

    fn is_active(&self) -> bool {
        false
    }
}

/// Longest wait between two attempts.
const MAX_BACKOFF_MS: u64 = 60_000;

/// Retry and timeout settings for one enhancement call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff_ms: config.retry_backoff_ms,
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Delay before retry `attempt` (1-based): `backoff_ms * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
    }
}

/// Chat-completion enhancer backed by an `edgequake-llm` provider.
pub struct LlmEnhancer {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    policy: RetryPolicy,
}

impl LlmEnhancer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ConversionConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            options: build_options(config),
            policy: RetryPolicy::from_config(config),
        }
    }
}

impl Enhancer for LlmEnhancer {
    async fn enhance(&self, req: &EnhanceRequest<'_>) -> Result<Enhancement, EnhancementError> {
        let messages = vec![
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(slide_prompt(req)),
        ];

        let messages = &messages;
        let provider = &self.provider;
        let options = &self.options;
        call_with_retries(req.slide_index, &self.policy, || async move {
            let response = provider
                .chat(messages, Some(options))
                .await
                .map_err(|e| e.to_string())?;
            debug!(
                "Slide {}: {} input tokens, {} output tokens",
                req.slide_index, response.prompt_tokens, response.completion_tokens
            );
            Ok(Enhancement {
                text: response.content,
                input_tokens: response.prompt_tokens,
                output_tokens: response.completion_tokens,
                retries: 0,
            })
        })
        .await
    }
}

/// Why the latest attempt failed.
enum AttemptFailure {
    Error(String),
    TimedOut,
    Empty,
}

/// Run `call` until it returns non-empty text or the retry budget is spent.
pub(crate) async fn call_with_retries<F, Fut>(
    slide: usize,
    policy: &RetryPolicy,
    mut call: F,
) -> Result<Enhancement, EnhancementError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Enhancement, String>>,
{
    let mut last = AttemptFailure::Error("no attempt made".to_string());

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let backoff = policy.backoff(attempt);
            warn!(
                "Slide {}: retry {}/{} after {}ms",
                slide,
                attempt,
                policy.max_retries,
                backoff.as_millis()
            );
            sleep(backoff).await;
        }

        last = match timeout(policy.timeout, call()).await {
            Ok(Ok(enhancement)) if !enhancement.text.trim().is_empty() => {
                return Ok(Enhancement {
                    retries: attempt,
                    ..enhancement
                });
            }
            Ok(Ok(_)) => {
                warn!("Slide {}: attempt {} returned empty text", slide, attempt + 1);
                AttemptFailure::Empty
            }
            Ok(Err(e)) => {
                warn!("Slide {}: attempt {} failed: {}", slide, attempt + 1, e);
                AttemptFailure::Error(e)
            }
            Err(_) => {
                warn!(
                    "Slide {}: attempt {} timed out after {:?}",
                    slide,
                    attempt + 1,
                    policy.timeout
                );
                AttemptFailure::TimedOut
            }
        };
    }

    Err(match last {
        AttemptFailure::Error(detail) => EnhancementError::Failed {
            slide,
            retries: policy.max_retries,
            detail,
        },
        AttemptFailure::TimedOut => EnhancementError::Timeout {
            slide,
            secs: policy.timeout.as_secs(),
        },
        AttemptFailure::Empty => EnhancementError::EmptyResponse { slide },
    })
}

/// Build `CompletionOptions` from the conversion config.
fn build_options(config: &ConversionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, EbookError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        EbookError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured even when several API keys are present.
/// 4. **`OPENAI_API_KEY`** present → OpenAI.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
///
/// Steps 2 and 3 are explicit requests, so their failure is an error.
/// When auto-detection finds nothing, `Ok(None)` is returned and the caller
/// converts without enhancement.
pub fn resolve_provider(
    config: &ConversionConfig,
) -> Result<Option<Arc<dyn LLMProvider>>, EbookError> {
    if let Some(ref provider) = config.provider {
        return Ok(Some(Arc::clone(provider)));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model).map(Some);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model).map(Some);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model).map(Some);
        }
    }

    match ProviderFactory::from_env() {
        Ok((llm_provider, _embedding)) => Ok(Some(llm_provider)),
        Err(e) => {
            warn!(
                "No LLM provider could be auto-detected ({}); slides will be used as written. \
                 Set OPENAI_API_KEY, ANTHROPIC_API_KEY or GEMINI_API_KEY to enable enhancement.",
                e
            );
            Ok(None)
        }
    }
}
