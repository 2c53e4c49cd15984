//! Locale-aware sentence boundary detection
//!
//! Handles the usual traps: abbreviations, initials, decimals, ellipses,
//! URLs and email addresses, and unbalanced quotes. Terminator classes can
//! be overridden per language (CJK, Arabic, Hindi).

use crate::constants::{SENTENCE_BASE_CONFIDENCE, SENTENCE_MIN_LENGTH};
use crate::fallback::boundaries::{BoundaryType, TextBoundary};
use std::collections::HashSet;

/// English abbreviations that end with a period without ending a sentence
const EN_ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "etc", "vs", "e.g", "i.e", "cf", "inc",
    "ltd", "co", "corp", "dept", "est", "fig", "no", "vol", "approx",
];

/// Sentence boundary detector
pub struct SentenceDetector {
    terminators: Vec<char>,
    abbreviations: HashSet<String>,
}

impl Default for SentenceDetector {
    fn default() -> Self {
        Self::new("en")
    }
}

impl SentenceDetector {
    /// Create a detector for an ISO 639-1 language code
    pub fn new(language: &str) -> Self {
        let terminators = match language {
            "zh" | "ja" | "ko" => vec!['。', '！', '？', '.', '!', '?'],
            "ar" => vec!['؟', '۔', '.', '!'],
            "hi" => vec!['।', '.', '!', '?'],
            _ => vec!['.', '!', '?'],
        };

        let abbreviations = EN_ABBREVIATIONS
            .iter()
            .map(|a| (*a).to_owned())
            .collect();

        Self {
            terminators,
            abbreviations,
        }
    }

    /// Extend the abbreviation lexicon with custom entries
    pub fn with_abbreviations<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.abbreviations
            .extend(extra.into_iter().map(|s| s.into().to_lowercase()));
        self
    }

    /// Detect sentence boundaries in a text
    pub fn detect_boundaries(&self, text: &str) -> Vec<TextBoundary> {
        let chars: Vec<(usize, char)> = text.char_indices().collect();
        let mut boundaries = Vec::new();
        let mut sentence_start = 0usize;

        let mut i = 0usize;
        while i < chars.len() {
            let (offset, ch) = chars[i];

            if !self.terminators.contains(&ch) {
                i += 1;
                continue;
            }

            // Ellipsis: consume the run, boundary after the last period
            if ch == '.' && matches!(chars.get(i + 1), Some((_, '.'))) {
                while matches!(chars.get(i + 1), Some((_, '.'))) {
                    i += 1;
                }
                i += 1;
                continue;
            }

            if ch == '.' && (self.is_non_terminal_period(text, &chars, i)) {
                i += 1;
                continue;
            }

            // Include closing quotes/brackets that trail the terminator
            let mut end_index = i + 1;
            while matches!(
                chars.get(end_index),
                Some((_, '"' | '\'' | '\u{201d}' | '\u{2019}' | ')' | ']'))
            ) {
                end_index += 1;
            }
            let end = chars
                .get(end_index)
                .map_or(text.len(), |(offset, _)| *offset);

            let confidence = self.score(text, sentence_start, offset, end);
            boundaries.push(TextBoundary::new(
                sentence_start,
                end,
                BoundaryType::Sentence,
                confidence,
            ));

            // Skip whitespace to the start of the next sentence
            let mut next = end_index;
            while matches!(chars.get(next), Some((_, c)) if c.is_whitespace()) {
                next += 1;
            }
            sentence_start = chars.get(next).map_or(text.len(), |(offset, _)| *offset);
            i = next.max(i + 1);
        }

        boundaries
    }

    /// Segment text into sentences using detected boundaries
    pub fn segment<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.detect_boundaries(text)
            .into_iter()
            .filter_map(|b| text.get(b.start..b.end))
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Whether a period at `chars[index]` does not terminate a sentence
    fn is_non_terminal_period(&self, text: &str, chars: &[(usize, char)], index: usize) -> bool {
        let offset = chars[index].0;

        // Decimal number: digit on both sides
        let prev_digit = index > 0 && chars[index - 1].1.is_ascii_digit();
        let next_digit = matches!(chars.get(index + 1), Some((_, c)) if c.is_ascii_digit());
        if prev_digit && next_digit {
            return true;
        }

        // The token containing the period is a URL or an email address
        let token_start = text[..offset]
            .rfind(char::is_whitespace)
            .map_or(0, |p| p + 1);
        let token_end = text[offset..]
            .find(char::is_whitespace)
            .map_or(text.len(), |p| offset + p);
        let token = &text[token_start..token_end];
        if token.contains("://") || token.contains('@') || token.starts_with("www.") {
            return true;
        }

        // Word before the period: known abbreviation or a single-capital initial
        let word = text[..offset]
            .rsplit(|c: char| c.is_whitespace())
            .next()
            .unwrap_or("")
            .trim_end_matches('.');
        if self.abbreviations.contains(&word.to_lowercase()) {
            return true;
        }
        if word.len() == 1 && word.chars().all(|c| c.is_uppercase()) {
            return true;
        }

        false
    }

    /// Confidence for a candidate sentence span
    fn score(&self, text: &str, start: usize, terminator_offset: usize, end: usize) -> f64 {
        let mut confidence = SENTENCE_BASE_CONFIDENCE;
        let sentence = text.get(start..end).unwrap_or("").trim();

        if sentence.len() < SENTENCE_MIN_LENGTH {
            confidence -= 0.2;
        }
        if sentence.chars().next().is_some_and(char::is_lowercase) {
            confidence -= 0.1;
        }

        // Unbalanced quotes inside the sentence suggest a bad split
        let quotes = sentence.chars().filter(|c| *c == '"' || *c == '\'').count();
        if quotes % 2 != 0 {
            confidence -= 0.2;
        }

        // Terminal punctuation followed by a capitalized word is the
        // classic sentence shape
        let terminal = text[terminator_offset..].chars().next();
        let follower = text[end..].trim_start().chars().next();
        if matches!(terminal, Some('.' | '!' | '?'))
            && follower.is_some_and(char::is_uppercase)
        {
            confidence += 0.05;
        }

        confidence.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_sentences_split() {
        let detector = SentenceDetector::default();
        let sentences = detector.segment("Hello world. How are you? Fine thanks!");
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0], "Hello world.");
    }

    #[test]
    fn abbreviations_do_not_split() {
        let detector = SentenceDetector::default();
        let sentences = detector.segment("Dr. Smith arrived. He was late.");
        assert_eq!(sentences.len(), 2);
        assert!(sentences[0].starts_with("Dr. Smith"));
    }

    #[test]
    fn decimals_and_urls_do_not_split() {
        let detector = SentenceDetector::default();
        let sentences =
            detector.segment("Pi is 3.14 exactly. See https://example.com/a.b for details.");
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn initials_do_not_split() {
        let detector = SentenceDetector::default();
        let sentences = detector.segment("J. R. R. Tolkien wrote it. It was long.");
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn custom_abbreviations_extend_lexicon() {
        let detector = SentenceDetector::default().with_abbreviations(["approx", "misc"]);
        let sentences = detector.segment("The misc. items arrived. All good.");
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn short_sentences_get_lower_confidence() {
        let detector = SentenceDetector::default();
        let boundaries = detector.detect_boundaries("Hi. This is a longer, proper sentence.");
        assert!(boundaries[0].confidence < boundaries[1].confidence);
    }

    #[test]
    fn cjk_terminators_are_honored() {
        let detector = SentenceDetector::new("ja");
        let boundaries = detector.detect_boundaries("これはテストです。次の文です。");
        assert_eq!(boundaries.len(), 2);
    }
}
