//! Tests for the fallback tiers: overlap rejection, sliding windows,
//! natural-break selection, and the specialist processors.

use code_chunker::fallback::{
    NaturalBreakFinder, OverlapChunker, OverlapStrategy, ProcessorRegistry, SlidingWindowChunker,
    WindowUnit,
};
use code_chunker::grammar::GrammarRegistry;
use code_chunker::Error;
use std::sync::Arc;

fn registry() -> Arc<GrammarRegistry> {
    let dir = tempfile::TempDir::new().expect("temp dir");
    Arc::new(GrammarRegistry::with_cache_dir(dir.keep()).expect("registry"))
}

#[test]
fn overlap_on_grammar_supported_extension_is_rejected() {
    let chunker = OverlapChunker::new(registry());
    let err = chunker
        .chunk_with_overlap(
            "package main\n\nfunc main() {}\n",
            "main.go",
            100,
            20,
            OverlapStrategy::Fixed,
            WindowUnit::Characters,
            None,
        )
        .expect_err("go files must be refused");

    match err {
        Error::TreeSitterOverlap { language } => assert_eq!(language, "go"),
        other => panic!("expected TreeSitterOverlap, got {other}"),
    }
}

#[test]
fn overlap_rejection_covers_every_builtin_extension() {
    let chunker = OverlapChunker::new(registry());
    for file in ["a.rs", "b.py", "c.js", "d.java", "e.cpp", "f.rb"] {
        let result = chunker.chunk_with_overlap(
            "content",
            file,
            100,
            10,
            OverlapStrategy::Fixed,
            WindowUnit::Characters,
            None,
        );
        assert!(
            matches!(result, Err(Error::TreeSitterOverlap { .. })),
            "{file} should be refused"
        );
    }
}

#[test]
fn fixed_character_overlap_produces_expected_spans() {
    let content = "abcdefghijklmnopqrstuvwxyz";
    let chunks = OverlapChunker::new(registry())
        .chunk_with_overlap(
            content,
            "alpha.txt",
            10,
            3,
            OverlapStrategy::Fixed,
            WindowUnit::Characters,
            None,
        )
        .expect("plain text is chunkable");

    let spans: Vec<(usize, usize)> = chunks.iter().map(|c| (c.byte_start, c.byte_end)).collect();
    assert_eq!(spans, vec![(0, 10), (7, 17), (14, 24), (21, 26)]);

    // Overlapping output advances monotonically and slices exactly
    for pair in chunks.windows(2) {
        assert!(pair[1].byte_start > pair[0].byte_start);
    }
    for chunk in &chunks {
        assert_eq!(chunk.content, &content[chunk.byte_start..chunk.byte_end]);
    }
}

#[test]
fn natural_break_prefers_paragraph_over_sentence() {
    let section_one = "## First\n\nThe first section talks about one thing. It has two sentences.\n\n";
    let section_two = "## Second\n\nThe second section is also here. It wraps up the thought.\n\n";
    let section_three = "## Third\n\nThe third section should fall past the budget.\n";
    let text = format!("{section_one}{section_two}{section_three}");

    // Budget covers the first two sections but not all three
    let max_length = section_one.len() + section_two.len() + 8;
    let finder = NaturalBreakFinder::new("en").with_min_chunk_size(30);
    let breaks = finder.find_natural_breaks(&text, max_length);

    assert!(!breaks.is_empty());
    let first = breaks[0];
    assert!(first <= section_one.len() + section_two.len());
    // The break lands on a line edge, not inside a sentence
    assert_eq!(text.as_bytes()[first - 1], b'\n');
}

#[test]
fn sliding_window_lines_and_characters_agree_on_coverage() {
    let content = "alpha\nbravo\ncharlie\ndelta\necho\n";
    let window = SlidingWindowChunker::new("text");

    let by_lines = window
        .chunk(content, "w.txt", 2, 0, WindowUnit::Lines)
        .unwrap();
    let by_chars = window
        .chunk(content, "w.txt", 10, 0, WindowUnit::Characters)
        .unwrap();

    let covered_by_lines: usize = by_lines.iter().map(|c| c.byte_end - c.byte_start).sum();
    let covered_by_chars: usize = by_chars.iter().map(|c| c.byte_end - c.byte_start).sum();
    assert_eq!(covered_by_lines, content.len());
    assert_eq!(covered_by_chars, content.len());
}

#[test]
fn processor_registry_finds_specialists_by_path() {
    let registry = ProcessorRegistry::with_builtins();

    let markdown = registry.find_processors(
        "doc.md",
        code_chunker::fallback::FileType::Markdown,
    );
    assert_eq!(markdown, vec!["markdown_sections".to_owned()]);

    let none = registry.find_processors("data.bin", code_chunker::fallback::FileType::Unknown);
    assert!(none.is_empty());
}

#[test]
fn markdown_sections_split_at_headings() {
    let registry = ProcessorRegistry::with_builtins();
    let processor = registry.get("markdown_sections").expect("builtin");

    let md = "# One\n\nfirst body\n\n# Two\n\nsecond body\n";
    let chunks = processor.process(md, "doc.md").unwrap();

    assert_eq!(chunks.len(), 2);
    assert_eq!(
        chunks[0].metadata.get("heading").unwrap(),
        &serde_json::json!("One")
    );
    assert_eq!(
        chunks[1].metadata.get("heading").unwrap(),
        &serde_json::json!("Two")
    );
    for chunk in &chunks {
        assert_eq!(chunk.content, &md[chunk.byte_start..chunk.byte_end]);
    }
}

#[test]
fn dynamic_overlap_respects_configured_bounds() {
    let content = "One sentence here. Another sentence there.\n\nA second paragraph with more words. And another line.\n\nThe final paragraph closes the file with some trailing text.\n";
    let chunks = OverlapChunker::new(registry())
        .chunk_with_dynamic_overlap(content, "prose.txt", 40, 5, 20, WindowUnit::Characters)
        .unwrap();

    assert!(chunks.len() >= 3);
    for pair in chunks.windows(2) {
        let overlap = pair[0].byte_end.saturating_sub(pair[1].byte_start);
        assert!(overlap <= 20, "overlap {overlap} exceeds the maximum");
        assert!(pair[1].byte_start > pair[0].byte_start);
    }
}
