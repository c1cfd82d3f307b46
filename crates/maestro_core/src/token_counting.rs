/// Token counting and cost calculation for LLM operations.
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tiktoken_rs::CoreBPE;

use crate::GenerateRequest;

/// Fixed per-message overhead added to every estimate.
///
/// Providers wrap each message in role markers and separators; four tokens
/// per message keeps the estimate on the conservative side.
const MESSAGE_OVERHEAD_TOKENS: u64 = 4;

/// Token usage statistics for a single LLM operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_getters::Getters)]
pub struct TokenUsage {
    /// Tokens in the prompt/input.
    prompt_tokens: u64,
    /// Tokens in the response/output.
    completion_tokens: u64,
    /// Total tokens (prompt + completion).
    total_tokens: u64,
}

impl TokenUsage {
    /// Create a new token usage record.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Calculate cost in USD based on pricing per million tokens.
    ///
    /// # Arguments
    ///
    /// * `prompt_price_per_million` - Cost per million prompt tokens in USD
    /// * `completion_price_per_million` - Cost per million completion tokens in USD
    pub fn calculate_cost(
        &self,
        prompt_price_per_million: f64,
        completion_price_per_million: f64,
    ) -> f64 {
        let prompt_cost = (self.prompt_tokens as f64 / 1_000_000.0) * prompt_price_per_million;
        let completion_cost =
            (self.completion_tokens as f64 / 1_000_000.0) * completion_price_per_million;
        prompt_cost + completion_cost
    }
}

/// How to count tokens for a particular model.
///
/// Models with a known BPE encoding get an exact count; everything else
/// falls back to a byte heuristic that overestimates rather than under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenizerProfile {
    /// Use the tiktoken encoding registered for this model name.
    Bpe(String),
    /// Estimate from byte length: `ceil(bytes / 3)`.
    Heuristic,
}

impl TokenizerProfile {
    /// Profile for a model name, preferring an exact tokenizer when one
    /// is registered with tiktoken.
    pub fn for_model(model: &str) -> Self {
        if tiktoken_rs::get_bpe_from_model(model).is_ok() {
            TokenizerProfile::Bpe(model.to_string())
        } else {
            TokenizerProfile::Heuristic
        }
    }
}

/// Estimates token counts for prospective requests.
///
/// Estimates are deliberately conservative: an estimate at or above the
/// actual count is preferred so a provider never silently truncates the
/// payload. The sizer is a pure function of the payload text and the
/// per-model tokenizer profile; it performs no I/O and is safe to call
/// from any thread.
///
/// # Examples
///
/// ```
/// use maestro_core::{ContextSizer, GenerateRequest, Message, TokenizerProfile};
///
/// let sizer = ContextSizer::new();
/// let request = GenerateRequest::builder()
///     .messages(vec![Message::user("Hello, world!")])
///     .build()
///     .unwrap();
///
/// let tokens = sizer.estimate(&request, &TokenizerProfile::Heuristic);
/// assert!(tokens > 0);
/// ```
#[derive(Default)]
pub struct ContextSizer {
    /// Cached tokenizers by model name.
    encoders: RwLock<HashMap<String, Arc<CoreBPE>>>,
}

impl std::fmt::Debug for ContextSizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self.encoders.read().map(|cache| cache.len()).unwrap_or(0);
        f.debug_struct("ContextSizer")
            .field("cached_encoders", &cached)
            .finish()
    }
}

impl ContextSizer {
    /// Create a new context sizer with an empty tokenizer cache.
    pub fn new() -> Self {
        Self {
            encoders: RwLock::new(HashMap::new()),
        }
    }

    /// Estimate the token count of a full request.
    ///
    /// Sums the per-message estimates plus a fixed per-message overhead.
    pub fn estimate(&self, request: &GenerateRequest, profile: &TokenizerProfile) -> u64 {
        request
            .messages
            .iter()
            .map(|msg| self.estimate_text(&msg.content, profile) + MESSAGE_OVERHEAD_TOKENS)
            .sum()
    }

    /// Estimate the token count of a single text fragment.
    pub fn estimate_text(&self, text: &str, profile: &TokenizerProfile) -> u64 {
        match profile {
            TokenizerProfile::Bpe(model) => match self.encoder_for(model) {
                Some(encoder) => encoder.encode_with_special_tokens(text).len() as u64,
                None => heuristic_count(text),
            },
            TokenizerProfile::Heuristic => heuristic_count(text),
        }
    }

    /// Look up or load the tokenizer for a model.
    fn encoder_for(&self, model: &str) -> Option<Arc<CoreBPE>> {
        if let Ok(cache) = self.encoders.read() {
            if let Some(encoder) = cache.get(model) {
                return Some(Arc::clone(encoder));
            }
        }

        let encoder = tiktoken_rs::get_bpe_from_model(model).map(Arc::new).ok()?;

        if let Ok(mut cache) = self.encoders.write() {
            cache.insert(model.to_string(), Arc::clone(&encoder));
        }

        Some(encoder)
    }
}

/// Conservative byte-based token estimate.
///
/// English text averages ~4 bytes per token; dividing by 3 rounds the
/// estimate upward so it stays at or above the real count.
fn heuristic_count(text: &str) -> u64 {
    (text.len() as u64).div_ceil(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Message;

    #[test]
    fn test_token_usage_new() {
        let usage = TokenUsage::new(100, 50);
        assert_eq!(usage.prompt_tokens, 100);
        assert_eq!(usage.completion_tokens, 50);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn test_token_usage_calculate_cost() {
        let usage = TokenUsage::new(1_000_000, 500_000);
        // $1 per million prompt, $2 per million completion
        let cost = usage.calculate_cost(1.0, 2.0);
        assert!((cost - 2.0).abs() < 0.001); // 1.0 + 1.0 = 2.0
    }

    #[test]
    fn test_zero_token_cost() {
        let usage = TokenUsage::new(0, 0);
        assert_eq!(usage.calculate_cost(3.0, 15.0), 0.0);
    }

    #[test]
    fn test_heuristic_rounds_up() {
        assert_eq!(heuristic_count("abcd"), 2); // 4 bytes / 3, rounded up
        assert_eq!(heuristic_count(""), 0);
    }

    #[test]
    fn test_estimate_includes_message_overhead() {
        let sizer = ContextSizer::new();
        let request = GenerateRequest {
            messages: vec![Message::user("")],
            ..Default::default()
        };
        assert_eq!(
            sizer.estimate(&request, &TokenizerProfile::Heuristic),
            MESSAGE_OVERHEAD_TOKENS
        );
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let sizer = ContextSizer::new();
        let request = GenerateRequest {
            messages: vec![Message::user("The quick brown fox"), Message::system("Be terse.")],
            ..Default::default()
        };
        let first = sizer.estimate(&request, &TokenizerProfile::Heuristic);
        let second = sizer.estimate(&request, &TokenizerProfile::Heuristic);
        assert_eq!(first, second);
    }

    #[test]
    fn test_bpe_profile_counts_tokens() {
        let sizer = ContextSizer::new();
        let profile = TokenizerProfile::for_model("gpt-4");
        let tokens = sizer.estimate_text("Hello, world!", &profile);
        assert!(tokens > 0);
    }
}
