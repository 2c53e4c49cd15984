//! Property-based tests over the universal chunking invariants

use code_chunker::engine::IntelligentChunker;
use code_chunker::fallback::{SlidingWindowChunker, WindowUnit};
use code_chunker::grammar::GrammarRegistry;
use code_chunker::Chunk;
use proptest::prelude::*;
use std::sync::Arc;

fn engine() -> IntelligentChunker {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let registry = GrammarRegistry::with_cache_dir(dir.keep()).expect("registry");
    IntelligentChunker::new(Arc::new(registry))
}

fn assert_exact_slices(chunks: &[Chunk], source: &str) {
    for chunk in chunks {
        assert!(chunk.byte_end > chunk.byte_start);
        assert!(chunk.end_line >= chunk.start_line);
        assert!(chunk.start_line >= 1);
        assert_eq!(
            chunk.content,
            &source[chunk.byte_start..chunk.byte_end],
            "content must equal the byte range slice"
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn window_chunks_are_exact_slices(
        text in "[ -~\n]{1,400}",
        size in 1usize..64,
        overlap in 0usize..16,
    ) {
        let chunks = SlidingWindowChunker::new("text")
            .chunk(&text, "prop.txt", size, overlap, WindowUnit::Characters)
            .unwrap();

        assert_exact_slices(&chunks, &text);

        // Overlapping output still advances monotonically
        for pair in chunks.windows(2) {
            prop_assert!(pair[1].byte_start > pair[0].byte_start);
        }
    }

    #[test]
    fn chunk_ids_are_pure_functions(
        path in "[a-z]{1,12}\\.txt",
        start in 0usize..1000,
        len in 1usize..1000,
        content in "[ -~]{0,64}",
    ) {
        let a = Chunk::stable_id(&path, start, start + len, &content);
        let b = Chunk::stable_id(&path, start, start + len, &content);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn python_chunking_is_deterministic(function_count in 1usize..6) {
        let mut source = String::new();
        for i in 0..function_count {
            source.push_str(&format!("def fn_{i}(x):\n    return x + {i}\n\n"));
        }

        let chunker = engine();
        let first = chunker.chunk_text(&source, "gen.py", Some("python")).unwrap();
        let second = chunker.chunk_text(&source, "gen.py", Some("python")).unwrap();

        prop_assert_eq!(&first.chunks, &second.chunks);
        assert_exact_slices(&first.chunks, &source);

        // Non-overlapping parser output is disjoint in byte space
        for pair in first.chunks.windows(2) {
            prop_assert!(pair[1].byte_start >= pair[0].byte_end);
        }
    }
}
