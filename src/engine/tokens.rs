//! Token counting
//!
//! The heuristic tokenizer approximates four characters per token and is
//! always available. When a model name is configured, the exact tiktoken
//! vocabulary for that model is used instead.

use crate::constants::{DEFAULT_TOKENIZER_MODEL, HEURISTIC_CHARS_PER_TOKEN};
use crate::domain::error::{Error, Result};
use crate::domain::ports::Tokenizer;
use tracing::warn;

/// Characters-per-token approximation
pub struct HeuristicTokenizer;

impl Tokenizer for HeuristicTokenizer {
    fn model(&self) -> &str {
        DEFAULT_TOKENIZER_MODEL
    }

    fn count(&self, text: &str) -> Result<usize> {
        if text.is_empty() {
            return Ok(0);
        }
        Ok((text.len() / HEURISTIC_CHARS_PER_TOKEN).max(1))
    }
}

/// Exact tokenizer backed by a model's BPE vocabulary
pub struct ModelTokenizer {
    model: String,
    bpe: tiktoken_rs::CoreBPE,
}

impl ModelTokenizer {
    /// Create a tokenizer for a model name (e.g. `gpt-4`)
    pub fn new(model: &str) -> Result<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| Error::InvalidArgument {
            message: format!("unknown tokenizer model '{model}': {e}"),
        })?;
        Ok(Self {
            model: model.to_owned(),
            bpe,
        })
    }
}

impl Tokenizer for ModelTokenizer {
    fn model(&self) -> &str {
        &self.model
    }

    fn count(&self, text: &str) -> Result<usize> {
        Ok(self.bpe.encode_with_special_tokens(text).len())
    }
}

/// Build the tokenizer for an optional model name.
///
/// An unknown model name degrades to the heuristic with a warning rather
/// than failing the whole chunking run.
pub fn tokenizer_for(model: Option<&str>) -> Box<dyn Tokenizer> {
    match model {
        None => Box::new(HeuristicTokenizer),
        Some(name) => match ModelTokenizer::new(name) {
            Ok(tokenizer) => Box::new(tokenizer),
            Err(err) => {
                warn!(model = name, %err, "falling back to heuristic tokenizer");
                Box::new(HeuristicTokenizer)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_is_len_over_four() {
        let tokenizer = HeuristicTokenizer;
        assert_eq!(tokenizer.count("").unwrap(), 0);
        assert_eq!(tokenizer.count("abcd").unwrap(), 1);
        assert_eq!(tokenizer.count("a".repeat(400).as_str()).unwrap(), 100);
    }

    #[test]
    fn model_tokenizer_counts_exactly() {
        let tokenizer = ModelTokenizer::new("gpt-4").expect("gpt-4 vocabulary");
        let count = tokenizer.count("hello world").unwrap();
        assert!(count >= 2);
        assert!(count < 10);
    }

    #[test]
    fn unknown_model_degrades_to_heuristic() {
        let tokenizer = tokenizer_for(Some("model-that-does-not-exist"));
        assert_eq!(tokenizer.model(), DEFAULT_TOKENIZER_MODEL);
    }
}
