//! Markdown section splitter
//!
//! Splits a markdown document into one chunk per heading-led section,
//! using the parser's byte offsets so chunk contents are exact source
//! slices.

use crate::domain::error::Result;
use crate::domain::types::Chunk;
use crate::fallback::detect::FileType;
use crate::fallback::processors::TextProcessor;
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag};

/// Splits markdown documents at their headings
pub struct MarkdownProcessor;

impl Default for MarkdownProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownProcessor {
    /// Create the markdown section splitter
    pub fn new() -> Self {
        Self
    }

    fn heading_starts(content: &str) -> Vec<(usize, HeadingLevel)> {
        let parser = Parser::new_ext(content, Options::empty());
        parser
            .into_offset_iter()
            .filter_map(|(event, range)| match event {
                Event::Start(Tag::Heading { level, .. }) => Some((range.start, level)),
                _ => None,
            })
            .collect()
    }

    fn section_chunk(
        content: &str,
        file_path: &str,
        byte_start: usize,
        byte_end: usize,
        level: Option<HeadingLevel>,
    ) -> Option<Chunk> {
        let text = content.get(byte_start..byte_end)?;
        if text.trim().is_empty() {
            return None;
        }

        let start_line = content[..byte_start].matches('\n').count() + 1;
        let end_line = start_line + text.matches('\n').count()
            - usize::from(text.ends_with('\n'));

        let mut chunk = Chunk::new(
            "markdown",
            file_path,
            "markdown_section",
            text,
            byte_start,
            byte_end,
            start_line,
            end_line.max(start_line),
        );

        if let Some(level) = level {
            chunk.set_metadata("heading_level", serde_json::json!(heading_number(level)));
            let heading = text.lines().next().unwrap_or("").trim_start_matches('#');
            chunk.set_metadata("heading", serde_json::json!(heading.trim()));
        }
        chunk.set_metadata("processor", serde_json::json!("markdown_sections"));
        Some(chunk)
    }
}

fn heading_number(level: HeadingLevel) -> usize {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

impl TextProcessor for MarkdownProcessor {
    fn name(&self) -> &'static str {
        "markdown_sections"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn supported_file_types(&self) -> &'static [FileType] {
        &[FileType::Markdown]
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["md", "markdown", "mdown", "mkd"]
    }

    fn can_process(&self, _file_path: &str, content: &str) -> bool {
        !content.trim().is_empty()
    }

    fn process(&self, content: &str, file_path: &str) -> Result<Vec<Chunk>> {
        let headings = Self::heading_starts(content);
        let mut chunks = Vec::new();

        if headings.is_empty() {
            if let Some(chunk) = Self::section_chunk(content, file_path, 0, content.len(), None) {
                chunks.push(chunk);
            }
            return Ok(chunks);
        }

        // Prologue before the first heading
        if headings[0].0 > 0 {
            if let Some(chunk) = Self::section_chunk(content, file_path, 0, headings[0].0, None) {
                chunks.push(chunk);
            }
        }

        for (index, (start, level)) in headings.iter().enumerate() {
            let end = headings
                .get(index + 1)
                .map_or(content.len(), |(next, _)| *next);
            if let Some(chunk) =
                Self::section_chunk(content, file_path, *start, end, Some(*level))
            {
                chunks.push(chunk);
            }
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_headings() {
        let md = "intro text\n\n# First\n\nbody one\n\n## Second\n\nbody two\n";
        let chunks = MarkdownProcessor::new().process(md, "doc.md").unwrap();

        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].content.starts_with("intro"));
        assert!(chunks[1].content.starts_with("# First"));
        assert!(chunks[2].content.starts_with("## Second"));
        assert_eq!(
            chunks[2].metadata.get("heading").unwrap(),
            &serde_json::json!("Second")
        );
    }

    #[test]
    fn content_is_exact_slice() {
        let md = "# A\n\ntext\n\n# B\n\nmore\n";
        for chunk in MarkdownProcessor::new().process(md, "doc.md").unwrap() {
            assert_eq!(chunk.content, &md[chunk.byte_start..chunk.byte_end]);
        }
    }

    #[test]
    fn headingless_document_is_one_section() {
        let md = "just a paragraph\nwith two lines\n";
        let chunks = MarkdownProcessor::new().process(md, "doc.md").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].node_type, "markdown_section");
    }
}
