//! Token count estimation for LLM context windows

/// Token estimator using a character-based heuristic
///
/// Four characters per token approximates English prose well enough for
/// clients budgeting a context window; it is deliberately not a real
/// tokenizer. The count runs over the final output, front matter included.
pub struct TokenEstimator {
    chars_per_token: f32,
}

impl TokenEstimator {
    pub fn new() -> Self {
        Self {
            chars_per_token: 4.0,
        }
    }

    /// Custom divisor, for callers tuned to a specific tokenizer family.
    pub fn with_chars_per_token(chars_per_token: f32) -> Self {
        Self { chars_per_token }
    }

    /// Estimate the token count of the given Markdown text:
    /// `ceil(chars / chars_per_token)`.
    pub fn estimate(&self, markdown: &str) -> u32 {
        let char_count = markdown.chars().count();
        (char_count as f32 / self.chars_per_token).ceil() as u32
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new()
    }
}
