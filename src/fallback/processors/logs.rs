//! Log record splitter
//!
//! Groups log lines into records (a record starts at a timestamp or a
//! level marker; continuation lines such as stack traces stay attached)
//! and emits one chunk per run of records sharing a level.

use crate::domain::error::Result;
use crate::domain::types::Chunk;
use crate::fallback::detect::FileType;
use crate::fallback::processors::TextProcessor;
use regex::Regex;
use std::sync::LazyLock;

static RECORD_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\[?\d{4}[-/]\d{2}[-/]\d{2}|\[?\d{2}:\d{2}:\d{2}|\[?(TRACE|DEBUG|INFO|WARN|WARNING|ERROR|FATAL|CRITICAL)\b)",
    )
    .expect("static regex")
});

static LEVEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(TRACE|DEBUG|INFO|WARN|WARNING|ERROR|FATAL|CRITICAL)\b").expect("static regex")
});

/// Splits log files into level-tagged record chunks
pub struct LogProcessor {
    max_records_per_chunk: usize,
}

impl Default for LogProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl LogProcessor {
    /// Create the log record splitter
    pub fn new() -> Self {
        Self {
            max_records_per_chunk: 50,
        }
    }

    fn level_of(line: &str) -> Option<&str> {
        LEVEL.find(line).map(|m| m.as_str())
    }
}

impl TextProcessor for LogProcessor {
    fn name(&self) -> &'static str {
        "log_records"
    }

    fn priority(&self) -> i32 {
        5
    }

    fn supported_file_types(&self) -> &'static [FileType] {
        &[FileType::Log]
    }

    fn supported_extensions(&self) -> &'static [&'static str] {
        &["log", "logs", "out", "err"]
    }

    fn can_process(&self, _file_path: &str, content: &str) -> bool {
        content
            .lines()
            .take(20)
            .any(|line| RECORD_START.is_match(line))
    }

    fn process(&self, content: &str, file_path: &str) -> Result<Vec<Chunk>> {
        // Byte span and level of each record
        let mut records: Vec<(usize, usize, Option<String>)> = Vec::new();
        let mut offset = 0usize;

        for line in content.split_inclusive('\n') {
            let line_start = offset;
            offset += line.len();
            let is_start = RECORD_START.is_match(line.trim_end());

            if is_start || records.is_empty() {
                let level = Self::level_of(line).map(str::to_owned);
                records.push((line_start, offset, level));
            } else if let Some(last) = records.last_mut() {
                last.1 = offset;
            }
        }

        // Group consecutive records sharing a level
        let mut chunks = Vec::new();
        let mut group: Vec<&(usize, usize, Option<String>)> = Vec::new();

        let flush =
            |group: &mut Vec<&(usize, usize, Option<String>)>, chunks: &mut Vec<Chunk>| {
                let (Some(first), Some(last)) = (group.first(), group.last()) else {
                    return;
                };
                let byte_start = first.0;
                let byte_end = last.1;
                let text = &content[byte_start..byte_end];

                let start_line = content[..byte_start].matches('\n').count() + 1;
                let end_line =
                    start_line + text.matches('\n').count() - usize::from(text.ends_with('\n'));

                let mut chunk = Chunk::new(
                    "log",
                    file_path,
                    "log_records",
                    text,
                    byte_start,
                    byte_end,
                    start_line,
                    end_line.max(start_line),
                );
                if let Some(level) = &first.2 {
                    chunk.set_metadata("log_level", serde_json::json!(level));
                }
                chunk.set_metadata("record_count", serde_json::json!(group.len()));
                chunk.set_metadata("processor", serde_json::json!("log_records"));
                chunks.push(chunk);
                group.clear();
            };

        for record in &records {
            let same_level = group
                .last()
                .is_some_and(|last| last.2 == record.2 && group.len() < self.max_records_per_chunk);
            if !group.is_empty() && !same_level {
                flush(&mut group, &mut chunks);
            }
            group.push(record);
        }
        flush(&mut group, &mut chunks);

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_group_by_level() {
        let log = "2024-01-01 INFO started\n2024-01-01 INFO listening\n2024-01-01 ERROR boom\n  at main.rs:10\n2024-01-01 INFO recovered\n";
        let chunks = LogProcessor::new().process(log, "app.log").unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks[0].metadata.get("log_level").unwrap(),
            &serde_json::json!("INFO")
        );
        assert_eq!(
            chunks[1].metadata.get("log_level").unwrap(),
            &serde_json::json!("ERROR")
        );
        // Stack trace stays attached to its record
        assert!(chunks[1].content.contains("at main.rs:10"));
    }

    #[test]
    fn chunks_are_exact_slices() {
        let log = "INFO one\nINFO two\nWARN three\n";
        let chunks = LogProcessor::new().process(log, "app.log").unwrap();
        for chunk in &chunks {
            assert_eq!(chunk.content, &log[chunk.byte_start..chunk.byte_end]);
        }
    }

    #[test]
    fn can_process_requires_record_markers() {
        let processor = LogProcessor::new();
        assert!(processor.can_process("x.log", "2024-01-01 INFO hello\n"));
        assert!(!processor.can_process("x.log", "just plain prose\n"));
    }
}
