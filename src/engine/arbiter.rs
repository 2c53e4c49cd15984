//! Per-file chunking decisions
//!
//! The arbiter routes every file to one of four tiers: parser-based
//! chunking, parser-based chunking with oversize splitting, a specialist
//! text processor, or the generic sliding window. Recoverable failures
//! downshift to the next tier with a warning and a `fallback_reason`
//! annotation on the emitted chunks.

use crate::constants::{DEFAULT_WINDOW_SIZE, HEURISTIC_CHARS_PER_TOKEN};
use crate::domain::error::{Error, Result};
use crate::domain::ports::{ChunkingStrategy, Tokenizer};
use crate::domain::types::{Chunk, ChunkingDecision, DecisionMetrics};
use crate::engine::tokens::tokenizer_for;
use crate::fallback::breaks::NaturalBreakFinder;
use crate::fallback::detect::{decode_text, detect_file_type, FileType};
use crate::fallback::processors::ProcessorRegistry;
use crate::fallback::window::{SlidingWindowChunker, WindowUnit};
use crate::grammar::{language_for_extension, GrammarRegistry};
use crate::strategies::common::{chunk_from_node, chunk_from_span};
use crate::strategies::CompositeChunker;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};
use tree_sitter::{Node, Tree};

/// Result of chunking one file
#[derive(Debug)]
pub struct ChunkingOutcome {
    /// Emitted chunks in ascending `byte_start` order
    pub chunks: Vec<Chunk>,
    /// The routing decision that produced the chunks
    pub decision: ChunkingDecision,
    /// Facts the decision was based on
    pub metrics: DecisionMetrics,
}

/// The intelligent chunking engine
///
/// ## Example
///
/// ```rust,no_run
/// use code_chunker::engine::IntelligentChunker;
/// use code_chunker::grammar::GrammarRegistry;
/// use std::sync::Arc;
///
/// let registry = Arc::new(GrammarRegistry::new().unwrap());
/// let chunker = IntelligentChunker::new(registry).with_token_limit(512);
/// let outcome = chunker.chunk_file("src/lib.rs").unwrap();
/// println!("{} chunks via {:?}", outcome.chunks.len(), outcome.decision);
/// ```
pub struct IntelligentChunker {
    registry: Arc<GrammarRegistry>,
    processors: ProcessorRegistry,
    strategy: Box<dyn ChunkingStrategy>,
    tokenizer: Box<dyn Tokenizer>,
    token_limit: Option<usize>,
    window_size: usize,
}

impl IntelligentChunker {
    /// Create an engine over a grammar registry with the composite
    /// strategy and the heuristic tokenizer.
    pub fn new(registry: Arc<GrammarRegistry>) -> Self {
        Self {
            registry,
            processors: ProcessorRegistry::with_builtins(),
            strategy: Box::new(CompositeChunker::new()),
            tokenizer: tokenizer_for(None),
            token_limit: None,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }

    /// Enforce a token-count ceiling per chunk
    pub fn with_token_limit(mut self, limit: usize) -> Self {
        self.token_limit = Some(limit);
        self
    }

    /// Count tokens with the exact vocabulary of a model
    pub fn with_model(mut self, model: &str) -> Self {
        self.tokenizer = tokenizer_for(Some(model));
        self
    }

    /// Replace the AST chunking strategy
    pub fn with_strategy(mut self, strategy: Box<dyn ChunkingStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Replace the processor registry
    pub fn with_processors(mut self, processors: ProcessorRegistry) -> Self {
        self.processors = processors;
        self
    }

    /// The grammar registry this engine consults
    pub fn registry(&self) -> &Arc<GrammarRegistry> {
        &self.registry
    }

    /// Chunk a file from disk.
    ///
    /// Binary files recover to an empty outcome with a diagnostic rather
    /// than an error, so batch runs keep going.
    pub fn chunk_file(&self, path: impl AsRef<Path>) -> Result<ChunkingOutcome> {
        let path = path.as_ref();
        let file_path = path.to_string_lossy().into_owned();
        let bytes = std::fs::read(path)?;

        let (content, recovered) = match decode_text(&file_path, &bytes) {
            Ok(decoded) => decoded,
            Err(Error::BinaryFile { .. }) => {
                warn!(file = %file_path, "binary file skipped");
                return Ok(ChunkingOutcome {
                    chunks: Vec::new(),
                    decision: ChunkingDecision::SlidingWindow,
                    metrics: DecisionMetrics::default(),
                });
            }
            Err(err) => return Err(err),
        };

        let mut outcome = self.chunk_text(&content, &file_path, None)?;
        if recovered {
            for chunk in &mut outcome.chunks {
                chunk.set_metadata("encoding_recovered", serde_json::json!(true));
            }
        }
        Ok(outcome)
    }

    /// Chunk in-memory text, optionally with an explicitly declared
    /// language.
    pub fn chunk_text(
        &self,
        content: &str,
        file_path: &str,
        language: Option<&str>,
    ) -> Result<ChunkingOutcome> {
        let language = language
            .map(|l| l.to_lowercase())
            .or_else(|| self.detect_language(file_path, content));

        let mut metrics = DecisionMetrics {
            has_grammar: language
                .as_deref()
                .is_some_and(|l| self.registry.is_installed(l)),
            is_code_file: language.is_some(),
            ..DecisionMetrics::default()
        };

        let mut fallback_reason: Option<&str> = None;

        if let Some(lang) = language
            .as_deref()
            .filter(|l| self.registry.is_installed(l))
        {
            match self.parse_and_chunk(lang, content, file_path) {
                Ok((tree, chunks)) if !chunks.is_empty() => {
                    metrics.parse_success = true;
                    return self.finish_tree_sitter(&tree, content, chunks, metrics);
                }
                Ok(_) => {
                    warn!(file = file_path, language = lang, "parser produced zero chunks");
                    fallback_reason = Some("zero_chunks");
                }
                Err(err) if err.is_recoverable() => {
                    warn!(file = file_path, language = lang, %err, "parse failed, downshifting");
                    fallback_reason = Some("parse_failure");
                }
                Err(err) => return Err(err),
            }
        }

        // Specialist tier
        let file_type = detect_file_type(file_path, Some(content.as_bytes()));
        for name in self.processors.find_processors(file_path, file_type) {
            let Some(processor) = self.processors.get(&name) else {
                continue;
            };
            if !processor.can_process(file_path, content) {
                continue;
            }
            metrics.has_specialized_processor = true;

            let mut chunks = processor.process(content, file_path)?;
            if chunks.is_empty() {
                continue;
            }
            debug!(file = file_path, processor = %name, "specialist processor selected");
            self.stamp(
                &mut chunks,
                ChunkingDecision::SpecializedProcessor,
                fallback_reason,
            )?;
            metrics.chunk_count = chunks.len();
            return Ok(ChunkingOutcome {
                chunks,
                decision: ChunkingDecision::SpecializedProcessor,
                metrics,
            });
        }

        // Generic sliding window
        let tag = match file_type {
            FileType::Unknown | FileType::Binary => "text",
            other => other.as_str(),
        };
        let mut chunks = SlidingWindowChunker::new(tag).chunk(
            content,
            file_path,
            self.window_size,
            0,
            WindowUnit::Characters,
        )?;
        self.stamp(&mut chunks, ChunkingDecision::SlidingWindow, fallback_reason)?;
        metrics.chunk_count = chunks.len();

        Ok(ChunkingOutcome {
            chunks,
            decision: ChunkingDecision::SlidingWindow,
            metrics,
        })
    }

    /// Chunk a batch of files, continuing past per-file failures
    pub fn chunk_files(
        &self,
        paths: &[std::path::PathBuf],
    ) -> Vec<(std::path::PathBuf, Result<ChunkingOutcome>)> {
        paths
            .iter()
            .map(|path| (path.clone(), self.chunk_file(path)))
            .collect()
    }

    /// Parallel batch chunking over a bounded worker pool
    pub fn chunk_files_parallel(
        &self,
        paths: &[std::path::PathBuf],
    ) -> Vec<(std::path::PathBuf, Result<ChunkingOutcome>)> {
        use rayon::prelude::*;
        paths
            .par_iter()
            .map(|path| (path.clone(), self.chunk_file(path)))
            .collect()
    }

    /// Language detection order: extension, shebang, content sniff
    pub fn detect_language(&self, file_path: &str, content: &str) -> Option<String> {
        let ext = Path::new(file_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        if let Some(language) = language_for_extension(ext) {
            return Some(language.to_owned());
        }

        if let Some(language) = shebang_language(content) {
            return Some(language.to_owned());
        }

        sniff_language(content).map(str::to_owned)
    }

    fn parse_and_chunk(
        &self,
        language: &str,
        content: &str,
        file_path: &str,
    ) -> Result<(Tree, Vec<Chunk>)> {
        let mut parser = self.registry.parser(language)?;
        let tree = parser
            .parse(content, None)
            .ok_or_else(|| Error::parse_failure(file_path, "parser returned no tree"))?;

        let chunks = self.strategy.chunk(&tree, content, file_path, language)?;
        Ok((tree, chunks))
    }

    fn finish_tree_sitter(
        &self,
        tree: &Tree,
        content: &str,
        mut chunks: Vec<Chunk>,
        mut metrics: DecisionMetrics,
    ) -> Result<ChunkingOutcome> {
        let mut largest = 0usize;
        for chunk in &chunks {
            largest = largest.max(self.tokenizer.count(&chunk.content)?);
        }
        metrics.largest_chunk_tokens = largest;

        let decision = match self.token_limit {
            Some(limit) if largest > limit => {
                metrics.token_limit_exceeded = true;
                let mut split = Vec::with_capacity(chunks.len());
                for chunk in chunks {
                    self.split_chunk(tree, content, chunk, limit, &mut split)?;
                }
                chunks = split;
                ChunkingDecision::TreeSitterWithSplit
            }
            _ => ChunkingDecision::TreeSitter,
        };

        self.stamp(&mut chunks, decision, None)?;
        metrics.chunk_count = chunks.len();

        Ok(ChunkingOutcome {
            chunks,
            decision,
            metrics,
        })
    }

    /// Recursively divide an oversize chunk along child boundaries until
    /// every piece fits, then tail-split at natural breaks.
    fn split_chunk(
        &self,
        tree: &Tree,
        source: &str,
        chunk: Chunk,
        limit: usize,
        out: &mut Vec<Chunk>,
    ) -> Result<()> {
        if self.tokenizer.count(&chunk.content)? <= limit {
            out.push(chunk);
            return Ok(());
        }

        if let Some(node) = tree
            .root_node()
            .descendant_for_byte_range(chunk.byte_start, chunk.byte_end)
        {
            let children = structural_children(node, chunk.byte_start, chunk.byte_end);
            if !children.is_empty() {
                for child in children {
                    let sub = chunk_from_node(
                        child,
                        source,
                        &chunk.file_path,
                        &chunk.language,
                        &chunk.parent_context,
                    )?;
                    self.split_chunk(tree, source, sub, limit, out)?;
                }
                return Ok(());
            }
        }

        // No further structural division: split at natural breaks sized
        // to the token limit
        let finder = NaturalBreakFinder::new("en")
            .with_min_chunk_size(1)
            .with_max_chunk_size(limit.saturating_mul(HEURISTIC_CHARS_PER_TOKEN).max(1));
        for (start, end) in finder.segment_spans(&chunk.content) {
            let sub = chunk_from_span(
                source,
                &chunk.file_path,
                &chunk.language,
                "split_segment",
                chunk.byte_start + start,
                chunk.byte_start + end,
            )?;
            self.push_bounded(source, sub, limit, out)?;
        }

        Ok(())
    }

    /// Bisect a chunk until the exact tokenizer accepts every piece
    fn push_bounded(
        &self,
        source: &str,
        chunk: Chunk,
        limit: usize,
        out: &mut Vec<Chunk>,
    ) -> Result<()> {
        if self.tokenizer.count(&chunk.content)? <= limit || chunk.content.chars().count() <= 1 {
            out.push(chunk);
            return Ok(());
        }

        let mut mid = chunk.byte_start + (chunk.byte_end - chunk.byte_start) / 2;
        while mid > chunk.byte_start && !source.is_char_boundary(mid) {
            mid -= 1;
        }
        if mid == chunk.byte_start {
            out.push(chunk);
            return Ok(());
        }

        let left = chunk_from_span(
            source,
            &chunk.file_path,
            &chunk.language,
            "split_segment",
            chunk.byte_start,
            mid,
        )?;
        let right = chunk_from_span(
            source,
            &chunk.file_path,
            &chunk.language,
            "split_segment",
            mid,
            chunk.byte_end,
        )?;
        self.push_bounded(source, left, limit, out)?;
        self.push_bounded(source, right, limit, out)
    }

    /// Stamp decision metadata (and token counts) onto emitted chunks
    fn stamp(
        &self,
        chunks: &mut [Chunk],
        decision: ChunkingDecision,
        fallback_reason: Option<&str>,
    ) -> Result<()> {
        for chunk in chunks {
            chunk.set_metadata("chunking_decision", serde_json::json!(decision.as_str()));
            chunk.set_metadata(
                "token_count",
                serde_json::json!(self.tokenizer.count(&chunk.content)?),
            );
            if let Some(reason) = fallback_reason {
                chunk.set_metadata("fallback_reason", serde_json::json!(reason));
            }
        }
        Ok(())
    }
}

/// Named children of `node` lying strictly inside the byte range
fn structural_children(node: Node<'_>, byte_start: usize, byte_end: usize) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| {
            child.start_byte() >= byte_start
                && child.end_byte() <= byte_end
                && child.end_byte() - child.start_byte() < byte_end - byte_start
        })
        .collect()
}

fn shebang_language(content: &str) -> Option<&'static str> {
    let first_line = content.lines().next()?;
    if !first_line.starts_with("#!") {
        return None;
    }
    if first_line.contains("python") {
        Some("python")
    } else if first_line.contains("node") {
        Some("javascript")
    } else if first_line.contains("ruby") {
        Some("ruby")
    } else {
        None
    }
}

fn sniff_language(content: &str) -> Option<&'static str> {
    let head: String = content.lines().take(30).collect::<Vec<_>>().join("\n");

    if head.contains("def ") && (head.contains("import ") || head.contains(":")) {
        Some("python")
    } else if head.contains("fn ") && head.contains("{") {
        Some("rust")
    } else if head.contains("package main") || head.contains("func ") {
        Some("go")
    } else if head.contains("#include") {
        Some("c")
    } else if head.contains("function ") || head.contains("const ") || head.contains("=>") {
        Some("javascript")
    } else {
        None
    }
}
