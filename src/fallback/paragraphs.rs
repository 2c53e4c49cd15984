//! Paragraph and structural boundary detection
//!
//! Blank lines are the primary signal. Markdown structure (headers, list
//! items, block quotes, fenced code blocks, horizontal rules) and
//! indentation changes contribute additional boundaries.

use crate::fallback::boundaries::{BoundaryType, TextBoundary};

/// Paragraph detector with optional indentation sensitivity
pub struct ParagraphDetector {
    use_indentation: bool,
}

impl Default for ParagraphDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ParagraphDetector {
    /// Create a detector with blank-line and structural signals only
    pub fn new() -> Self {
        Self {
            use_indentation: false,
        }
    }

    /// Also treat indentation changes as paragraph signals
    pub fn with_indentation(mut self, enabled: bool) -> Self {
        self.use_indentation = enabled;
        self
    }

    /// Detect paragraph and structural boundaries in a text
    pub fn detect_boundaries(&self, text: &str) -> Vec<TextBoundary> {
        let mut boundaries = Vec::new();

        let mut offset = 0usize;
        let mut paragraph_start = 0usize;
        let mut paragraph_end = 0usize;
        let mut blank_run = 0usize;
        let mut in_fence = false;
        let mut fence_start = 0usize;
        let mut previous_indent: Option<usize> = None;

        for line in text.split_inclusive('\n') {
            let trimmed = line.trim();
            let line_start = offset;
            offset += line.len();

            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                if in_fence {
                    boundaries.push(TextBoundary::new(
                        fence_start,
                        offset,
                        BoundaryType::CodeBlock,
                        0.9,
                    ));
                    in_fence = false;
                    paragraph_start = offset;
                } else {
                    self.close_paragraph(
                        &mut boundaries,
                        paragraph_start,
                        paragraph_end,
                        blank_run,
                    );
                    paragraph_start = offset;
                    in_fence = true;
                    fence_start = line_start;
                }
                blank_run = 0;
                continue;
            }

            if in_fence {
                continue;
            }

            if trimmed.is_empty() {
                if blank_run == 0 {
                    paragraph_end = line_start;
                }
                blank_run += 1;
                continue;
            }

            if blank_run > 0 {
                self.close_paragraph(&mut boundaries, paragraph_start, paragraph_end, blank_run);
                paragraph_start = line_start;
                blank_run = 0;
                previous_indent = None;
            }

            if is_header(trimmed) || is_horizontal_rule(trimmed) {
                boundaries.push(TextBoundary::new(
                    line_start,
                    offset,
                    BoundaryType::Section,
                    0.9,
                ));
            } else if is_list_item(trimmed) || is_block_quote(trimmed) {
                boundaries.push(TextBoundary::new(
                    line_start,
                    offset,
                    BoundaryType::Paragraph,
                    0.6,
                ));
            } else if self.use_indentation {
                let indent = line.len() - line.trim_start().len();
                if previous_indent.is_some_and(|prev| indent != prev) {
                    boundaries.push(TextBoundary::new(
                        paragraph_start,
                        line_start,
                        BoundaryType::Paragraph,
                        0.5,
                    ));
                    paragraph_start = line_start;
                }
                previous_indent = Some(indent);
            }
        }

        if paragraph_start < text.len() && blank_run == 0 {
            paragraph_end = text.len();
        }
        self.close_paragraph(&mut boundaries, paragraph_start, paragraph_end, blank_run.max(1));

        boundaries.sort_by_key(|b| (b.start, b.end));
        boundaries.dedup_by_key(|b| (b.start, b.end));
        boundaries
    }

    /// Emit a paragraph boundary; confidence grows with the size of the
    /// blank-line separator.
    fn close_paragraph(
        &self,
        boundaries: &mut Vec<TextBoundary>,
        start: usize,
        end: usize,
        blank_run: usize,
    ) {
        if end <= start {
            return;
        }
        let confidence = (0.7 + 0.1 * blank_run.saturating_sub(1) as f64).min(0.95);
        boundaries.push(TextBoundary::new(
            start,
            end,
            BoundaryType::Paragraph,
            confidence,
        ));
    }
}

fn is_header(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    (1..=6).contains(&hashes) && line.chars().nth(hashes) == Some(' ')
}

fn is_horizontal_rule(line: &str) -> bool {
    line.len() >= 3
        && (line.chars().all(|c| c == '-')
            || line.chars().all(|c| c == '*')
            || line.chars().all(|c| c == '_'))
}

fn is_list_item(line: &str) -> bool {
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))
    {
        return !rest.is_empty();
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && line[digits..].starts_with(". ")
}

fn is_block_quote(line: &str) -> bool {
    line.starts_with('>')
}
