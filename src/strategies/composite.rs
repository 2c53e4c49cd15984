//! Composite chunking strategy
//!
//! Runs several strategies over the same tree and fuses their results.
//! Four fusion modes are supported (union, intersection, consensus,
//! weighted); fusion is followed by consensus filtering, overlap merging,
//! and a final quality gate.

use crate::constants::{
    COMPOSITE_CONSENSUS_THRESHOLD, COMPOSITE_MIN_CHUNK_QUALITY, COMPOSITE_MIN_CONSENSUS,
    COMPOSITE_OVERLAP_THRESHOLD, COMPOSITE_POSITION_BUCKET,
};
use crate::domain::error::Result;
use crate::domain::ports::{ChunkingStrategy, StrategyOptions};
use crate::domain::types::Chunk;
use crate::strategies::adaptive::AdaptiveChunker;
use crate::strategies::common::{chunk_from_span, sort_chunks};
use crate::strategies::hierarchical::HierarchicalChunker;
use crate::strategies::semantic::SemanticChunker;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// How strategy results are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionMethod {
    /// All chunks from all strategies, tagged by origin
    Union,
    /// Only positions that a majority of strategies produced
    Intersection,
    /// Agreement-and-weight scored candidates above a threshold
    Consensus,
    /// All candidates ranked by summed strategy weight
    Weighted,
}

/// A candidate position produced by one or more strategies
struct ChunkCandidate {
    chunk: Chunk,
    strategies: Vec<String>,
}

/// Strategy that combines several member strategies
pub struct CompositeChunker {
    strategies: Vec<Box<dyn ChunkingStrategy>>,
    weights: BTreeMap<String, f64>,
    fusion_method: FusionMethod,
    min_consensus_strategies: usize,
    consensus_threshold: f64,
    merge_overlaps: bool,
    overlap_threshold: f64,
    apply_filters: bool,
    min_chunk_quality: f64,
    position_bucket: usize,
}

impl Default for CompositeChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeChunker {
    /// Create a composite over the three built-in strategies
    pub fn new() -> Self {
        let mut weights = BTreeMap::new();
        weights.insert("semantic".to_owned(), 1.0);
        weights.insert("hierarchical".to_owned(), 0.8);
        weights.insert("adaptive".to_owned(), 0.9);

        Self {
            strategies: vec![
                Box::new(SemanticChunker::new()),
                Box::new(HierarchicalChunker::new()),
                Box::new(AdaptiveChunker::new()),
            ],
            weights,
            fusion_method: FusionMethod::Consensus,
            min_consensus_strategies: COMPOSITE_MIN_CONSENSUS,
            consensus_threshold: COMPOSITE_CONSENSUS_THRESHOLD,
            merge_overlaps: true,
            overlap_threshold: COMPOSITE_OVERLAP_THRESHOLD,
            apply_filters: true,
            min_chunk_quality: COMPOSITE_MIN_CHUNK_QUALITY,
            position_bucket: COMPOSITE_POSITION_BUCKET,
        }
    }

    /// Create a composite over explicit member strategies
    pub fn with_strategies(strategies: Vec<Box<dyn ChunkingStrategy>>) -> Self {
        let mut composite = Self::new();
        composite.weights = strategies
            .iter()
            .map(|s| (s.name().to_owned(), 1.0))
            .collect();
        composite.strategies = strategies;
        composite
    }

    /// Override the fusion method
    pub fn with_fusion(mut self, method: FusionMethod) -> Self {
        self.fusion_method = method;
        self
    }

    fn weight(&self, strategy: &str) -> f64 {
        self.weights.get(strategy).copied().unwrap_or(1.0)
    }

    /// Bucketized position key used to compare chunks across strategies
    fn chunk_key(&self, chunk: &Chunk) -> (usize, usize, String) {
        let bucket = self.position_bucket.max(1);
        (
            chunk.start_line / bucket * bucket,
            chunk.end_line / bucket * bucket,
            chunk.node_type.clone(),
        )
    }

    /// Tie-break when two strategies produce the same position: prefer
    /// richer metadata, then the smaller span.
    fn is_better_chunk(a: &Chunk, b: &Chunk) -> bool {
        if a.metadata.len() != b.metadata.len() {
            return a.metadata.len() > b.metadata.len();
        }
        a.line_count() < b.line_count()
    }

    fn run_strategies(
        &self,
        tree: &tree_sitter::Tree,
        source: &str,
        file_path: &str,
        language: &str,
    ) -> Vec<(String, Vec<Chunk>)> {
        let mut results = Vec::new();

        for strategy in &self.strategies {
            if !strategy.can_handle(file_path, language) {
                continue;
            }
            match strategy.chunk(tree, source, file_path, language) {
                Ok(chunks) => results.push((strategy.name().to_owned(), chunks)),
                Err(err) => {
                    warn!(strategy = strategy.name(), %err, "member strategy failed");
                    results.push((strategy.name().to_owned(), Vec::new()));
                }
            }
        }

        results
    }

    fn build_candidates(&self, results: &[(String, Vec<Chunk>)]) -> Vec<ChunkCandidate> {
        let mut candidates: BTreeMap<(usize, usize, String), ChunkCandidate> = BTreeMap::new();

        for (strategy, chunks) in results {
            for chunk in chunks {
                let key = self.chunk_key(chunk);
                match candidates.get_mut(&key) {
                    None => {
                        candidates.insert(
                            key,
                            ChunkCandidate {
                                chunk: chunk.clone(),
                                strategies: vec![strategy.clone()],
                            },
                        );
                    }
                    Some(candidate) => {
                        if !candidate.strategies.contains(strategy) {
                            candidate.strategies.push(strategy.clone());
                        }
                        if Self::is_better_chunk(chunk, &candidate.chunk) {
                            candidate.chunk = chunk.clone();
                        }
                    }
                }
            }
        }

        candidates.into_values().collect()
    }

    fn fusion_union(&self, results: Vec<(String, Vec<Chunk>)>) -> Vec<Chunk> {
        let mut all = Vec::new();
        for (strategy, chunks) in results {
            for mut chunk in chunks {
                chunk.set_metadata("strategy", serde_json::json!(strategy));
                all.push(chunk);
            }
        }
        all
    }

    fn fusion_intersection(&self, results: &[(String, Vec<Chunk>)]) -> Vec<Chunk> {
        let total = results.len();
        if total == 0 {
            return Vec::new();
        }
        let required = self.min_consensus_strategies.max(total.div_ceil(2));

        self.build_candidates(results)
            .into_iter()
            .filter(|candidate| candidate.strategies.len() >= required)
            .map(|candidate| {
                let agreement = candidate.strategies.len() as f64 / total as f64;
                let mut chunk = candidate.chunk;
                chunk.set_metadata("strategies", serde_json::json!(candidate.strategies));
                chunk.set_metadata("agreement_score", serde_json::json!(agreement));
                chunk
            })
            .collect()
    }

    fn fusion_consensus(&self, results: &[(String, Vec<Chunk>)]) -> Vec<Chunk> {
        let total = results.len();
        if total == 0 {
            return Vec::new();
        }

        self.build_candidates(results)
            .into_iter()
            .filter_map(|candidate| {
                let consensus = candidate.strategies.len() as f64 / total as f64;
                let quality = candidate
                    .strategies
                    .iter()
                    .map(|s| self.weight(s))
                    .sum::<f64>()
                    / candidate.strategies.len() as f64;
                let combined = (consensus + quality) / 2.0;

                if combined < self.consensus_threshold {
                    return None;
                }

                let mut chunk = candidate.chunk;
                chunk.set_metadata("strategies", serde_json::json!(candidate.strategies));
                chunk.set_metadata("consensus_score", serde_json::json!(consensus));
                chunk.set_metadata("consensus_combined", serde_json::json!(combined));
                Some(chunk)
            })
            .collect()
    }

    fn fusion_weighted(&self, results: &[(String, Vec<Chunk>)]) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = self
            .build_candidates(results)
            .into_iter()
            .map(|candidate| {
                let total_weight: f64 = candidate.strategies.iter().map(|s| self.weight(s)).sum();
                let score = total_weight / candidate.strategies.len() as f64;

                let mut chunk = candidate.chunk;
                chunk.set_metadata("strategies", serde_json::json!(candidate.strategies));
                chunk.set_metadata("weight_score", serde_json::json!(score));
                chunk
            })
            .collect();

        chunks.sort_by(|a, b| {
            let score = |c: &Chunk| {
                c.metadata
                    .get("weight_score")
                    .and_then(serde_json::Value::as_f64)
                    .unwrap_or(0.0)
            };
            score(b).partial_cmp(&score(a)).unwrap_or(std::cmp::Ordering::Equal)
        });
        chunks
    }

    /// Consensus filter: applies only to chunks carrying a combined
    /// consensus score.
    fn apply_consensus_filter(&self, chunks: Vec<Chunk>) -> Vec<Chunk> {
        chunks
            .into_iter()
            .filter(|chunk| {
                let Some(combined) = chunk
                    .metadata
                    .get("consensus_combined")
                    .and_then(serde_json::Value::as_f64)
                else {
                    return true;
                };
                let agreeing = chunk
                    .metadata
                    .get("strategies")
                    .and_then(serde_json::Value::as_array)
                    .map_or(0, Vec::len);
                agreeing >= self.min_consensus_strategies && combined >= 0.5
            })
            .collect()
    }

    /// Pairwise overlap ratio measured over the smaller chunk
    fn overlap_ratio(a: &Chunk, b: &Chunk) -> f64 {
        let overlap_start = a.start_line.max(b.start_line);
        let overlap_end = a.end_line.min(b.end_line);
        if overlap_start > overlap_end {
            return 0.0;
        }
        let overlap = (overlap_end - overlap_start + 1) as f64;
        let smaller = a.line_count().min(b.line_count()) as f64;
        overlap / smaller
    }

    fn merge_overlapping(&self, mut chunks: Vec<Chunk>, source: &str) -> Result<Vec<Chunk>> {
        if chunks.is_empty() {
            return Ok(chunks);
        }

        chunks.sort_by(|a, b| {
            a.start_line
                .cmp(&b.start_line)
                .then(a.end_line.cmp(&b.end_line))
        });

        let mut groups: Vec<Vec<Chunk>> = Vec::new();
        for chunk in chunks {
            let joined = groups.last_mut().is_some_and(|group| {
                group
                    .iter()
                    .any(|member| Self::overlap_ratio(member, &chunk) >= self.overlap_threshold)
            });
            if joined {
                if let Some(group) = groups.last_mut() {
                    group.push(chunk);
                    continue;
                }
            }
            groups.push(vec![chunk]);
        }

        let mut merged = Vec::with_capacity(groups.len());
        for group in groups {
            if group.len() == 1 {
                merged.extend(group);
                continue;
            }
            merged.push(self.merge_group(group, source)?);
        }

        Ok(merged)
    }

    /// Merge a group into its smallest bounding span, unioning metadata,
    /// dependencies and references.
    fn merge_group(&self, group: Vec<Chunk>, source: &str) -> Result<Chunk> {
        let byte_start = group
            .iter()
            .map(|c| c.byte_start)
            .min()
            .ok_or_else(|| crate::domain::Error::internal("empty merge group"))?;
        let byte_end = group
            .iter()
            .map(|c| c.byte_end)
            .max()
            .ok_or_else(|| crate::domain::Error::internal("empty merge group"))?;

        let largest = group
            .iter()
            .max_by_key(|c| c.line_count())
            .ok_or_else(|| crate::domain::Error::internal("empty merge group"))?;

        let mut chunk = chunk_from_span(
            source,
            &largest.file_path,
            &largest.language,
            &largest.node_type,
            byte_start,
            byte_end,
        )?;
        chunk.parent_context = largest.parent_context.clone();
        chunk.metadata = largest.metadata.clone();

        let merged_strategies: Vec<String> = group
            .iter()
            .flat_map(|c| {
                c.metadata
                    .get("strategies")
                    .and_then(serde_json::Value::as_array)
                    .map(|a| {
                        a.iter()
                            .filter_map(|v| v.as_str().map(str::to_owned))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_else(|| {
                        c.metadata
                            .get("strategy")
                            .and_then(serde_json::Value::as_str)
                            .map(str::to_owned)
                            .into_iter()
                            .collect()
                    })
            })
            .unique()
            .collect();
        chunk.set_metadata("merged_strategies", serde_json::json!(merged_strategies));

        for member in &group {
            for reference in &member.references {
                if !chunk.references.contains(reference) {
                    chunk.references.push(reference.clone());
                }
            }
            for dependency in &member.dependencies {
                if !chunk.dependencies.contains(dependency) {
                    chunk.dependencies.push(dependency.clone());
                }
            }
        }

        Ok(chunk)
    }

    /// Quality = mean of size, content-density, metadata-richness, and
    /// strategy-agreement scores.
    fn chunk_quality(&self, chunk: &Chunk) -> f64 {
        let lines = chunk.line_count();
        let size_score = if lines < 5 {
            0.5
        } else if lines > 200 {
            0.7
        } else {
            1.0
        };

        let content_lines = chunk.content.lines().filter(|l| !l.trim().is_empty()).count();
        let content_score = if lines > 0 {
            (content_lines as f64 / lines as f64).min(1.0)
        } else {
            0.0
        };

        let metadata_score = if chunk.metadata.is_empty() {
            0.5
        } else {
            (chunk.metadata.len() as f64 / 5.0).min(1.0)
        };

        let agreement_score = chunk
            .metadata
            .get("strategies")
            .and_then(serde_json::Value::as_array)
            .map_or(0.5, |a| a.len() as f64 / self.strategies.len() as f64);

        (size_score + content_score + metadata_score + agreement_score) / 4.0
    }

    fn ensure_quality(&self, chunks: Vec<Chunk>) -> Vec<Chunk> {
        chunks
            .into_iter()
            .filter(|c| !c.content.trim().is_empty())
            .filter_map(|mut chunk| {
                let quality = self.chunk_quality(&chunk);
                chunk.set_metadata("quality_score", serde_json::json!(quality));
                (quality >= self.min_chunk_quality).then_some(chunk)
            })
            .collect()
    }
}

impl ChunkingStrategy for CompositeChunker {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn can_handle(&self, file_path: &str, language: &str) -> bool {
        self.strategies
            .iter()
            .any(|s| s.can_handle(file_path, language))
    }

    fn chunk(
        &self,
        tree: &tree_sitter::Tree,
        source: &str,
        file_path: &str,
        language: &str,
    ) -> Result<Vec<Chunk>> {
        let results = self.run_strategies(tree, source, file_path, language);

        let mut combined = match self.fusion_method {
            FusionMethod::Union => self.fusion_union(results),
            FusionMethod::Intersection => self.fusion_intersection(&results),
            FusionMethod::Consensus => self.fusion_consensus(&results),
            FusionMethod::Weighted => self.fusion_weighted(&results),
        };

        if self.apply_filters {
            combined = self.apply_consensus_filter(combined);
        }

        if self.merge_overlaps && self.fusion_method != FusionMethod::Union {
            combined = self.merge_overlapping(combined, source)?;
        }

        combined = self.ensure_quality(combined);

        // Union preserves per-strategy order; all other modes emit in
        // ascending byte order
        if self.fusion_method != FusionMethod::Union {
            sort_chunks(&mut combined);
        }

        Ok(combined)
    }

    fn configure(&mut self, options: &StrategyOptions) {
        if let Some(value) = options.get("fusion_method") {
            if let Ok(method) = serde_json::from_value(value.clone()) {
                self.fusion_method = method;
            }
        }
        if let Some(value) = options
            .get("min_consensus_strategies")
            .and_then(|v| v.as_u64())
        {
            self.min_consensus_strategies = value as usize;
        }
        if let Some(value) = options.get("consensus_threshold").and_then(|v| v.as_f64()) {
            self.consensus_threshold = value;
        }
        if let Some(value) = options.get("merge_overlaps").and_then(|v| v.as_bool()) {
            self.merge_overlaps = value;
        }
        if let Some(value) = options.get("overlap_threshold").and_then(|v| v.as_f64()) {
            self.overlap_threshold = value;
        }
        if let Some(value) = options.get("apply_filters").and_then(|v| v.as_bool()) {
            self.apply_filters = value;
        }
        if let Some(value) = options.get("min_chunk_quality").and_then(|v| v.as_f64()) {
            self.min_chunk_quality = value;
        }
        if let Some(value) = options.get("position_bucket").and_then(|v| v.as_u64()) {
            self.position_bucket = (value as usize).max(1);
        }
        if let Some(weights) = options.get("strategy_weights").and_then(|v| v.as_object()) {
            for (name, weight) in weights {
                if let Some(weight) = weight.as_f64() {
                    self.weights.insert(name.clone(), weight);
                }
            }
        }
        if let Some(configs) = options.get("strategy_configs").and_then(|v| v.as_object()) {
            for strategy in &mut self.strategies {
                if let Some(config) = configs.get(strategy.name()).and_then(|v| v.as_object()) {
                    let nested: StrategyOptions =
                        config.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                    strategy.configure(&nested);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_python(code: &str) -> tree_sitter::Tree {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("python grammar");
        parser.parse(code, None).expect("parse")
    }

    const CODE: &str = "def hello():\n    print(\"hi\")\n\ndef goodbye():\n    print(\"bye\")\n";

    #[test]
    fn union_tags_chunks_with_origin() {
        let tree = parse_python(CODE);
        let chunker = CompositeChunker::new().with_fusion(FusionMethod::Union);
        let chunks = chunker.chunk(&tree, CODE, "test.py", "python").unwrap();

        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.metadata.contains_key("strategy")));
    }

    #[test]
    fn intersection_requires_majority() {
        let tree = parse_python(CODE);
        let chunker = CompositeChunker::new().with_fusion(FusionMethod::Intersection);
        let chunks = chunker.chunk(&tree, CODE, "test.py", "python").unwrap();

        for chunk in &chunks {
            let strategies = chunk
                .metadata
                .get("strategies")
                .and_then(serde_json::Value::as_array)
                .expect("strategies metadata");
            assert!(strategies.len() >= 2);

            let agreement = chunk
                .metadata
                .get("agreement_score")
                .and_then(serde_json::Value::as_f64)
                .expect("agreement score");
            assert!(agreement >= 2.0 / 3.0 - 1e-9);
        }
    }

    #[test]
    fn consensus_emits_scored_chunks() {
        let tree = parse_python(CODE);
        let chunker = CompositeChunker::new().with_fusion(FusionMethod::Consensus);
        let chunks = chunker.chunk(&tree, CODE, "test.py", "python").unwrap();

        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.metadata.contains_key("consensus_combined"));
            assert!(chunk.metadata.contains_key("quality_score"));
        }
    }

    #[test]
    fn weighted_ranks_by_weight() {
        let tree = parse_python(CODE);
        let chunker = CompositeChunker::new().with_fusion(FusionMethod::Weighted);
        let chunks = chunker.chunk(&tree, CODE, "test.py", "python").unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.metadata.contains_key("weight_score")));
    }

    #[test]
    fn configure_updates_bucket_and_threshold() {
        let mut chunker = CompositeChunker::new();
        let mut options = StrategyOptions::new();
        options.insert("position_bucket".to_owned(), serde_json::json!(10));
        options.insert("consensus_threshold".to_owned(), serde_json::json!(0.9));
        chunker.configure(&options);

        assert_eq!(chunker.position_bucket, 10);
        assert!((chunker.consensus_threshold - 0.9).abs() < 1e-9);
    }
}
