use std::path::Path;

use ignore::WalkBuilder;
use tracing::{debug, warn};

use crate::domain::{Chunk, Config};

/// Path fragments that exclude a file from chunking.
const SKIP_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "venv",
    "__pycache__",
    "dist",
    "build",
    "vendor",
];

/// Extensions worth embedding (code plus prose docs).
const CHUNKABLE_EXTENSIONS: &[&str] = &[
    "py", "js", "jsx", "ts", "tsx", "go", "rs", "java", "c", "h", "cpp", "cc", "hpp", "rb",
    "php", "swift", "kt", "md", "txt",
];

/// Splits source files into overlapping line windows.
///
/// Chunking is language-independent beyond the skip list; each window is
/// prefixed with a one-line provenance header so retrieval surfaces the
/// file to the generator. Whitespace-only windows are dropped.
pub struct Chunker {
    window_lines: usize,
    stride: usize,
    max_file_bytes: u64,
}

impl Chunker {
    pub fn new(config: &Config) -> Self {
        Self {
            window_lines: config.chunk_window_lines,
            stride: config.chunk_stride(),
            max_file_bytes: config.max_file_bytes,
        }
    }

    /// Walk a checked-out tree and chunk every eligible file.
    pub fn chunk_tree(&self, root: &Path, repo_id: &str, commit_sha: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .build();

        for entry in walker.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let rel_path = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");

            if !self.is_chunkable(&rel_path) {
                continue;
            }

            match entry.metadata() {
                Ok(meta) if meta.len() > self.max_file_bytes => {
                    debug!("Skipping oversized file {} ({} bytes)", rel_path, meta.len());
                    continue;
                }
                Err(e) => {
                    warn!("Failed to stat {}: {}", rel_path, e);
                    continue;
                }
                _ => {}
            }

            let content = match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(e) => {
                    debug!("Skipping unreadable file {}: {}", rel_path, e);
                    continue;
                }
            };

            chunks.extend(self.chunk_file(&rel_path, &content, repo_id, commit_sha));
        }

        debug!("Chunked tree into {} chunks", chunks.len());
        chunks
    }

    /// Split one file into windows. Lines are 1-based and inclusive.
    pub fn chunk_file(
        &self,
        rel_path: &str,
        content: &str,
        repo_id: &str,
        commit_sha: &str,
    ) -> Vec<Chunk> {
        let lines: Vec<&str> = content.lines().collect();
        if lines.is_empty() {
            return vec![];
        }

        let mut chunks = Vec::new();

        // Files that fit in one window become a single chunk.
        if lines.len() <= self.window_lines {
            if let Some(chunk) = self.window_chunk(rel_path, &lines, 0, repo_id, commit_sha) {
                chunks.push(chunk);
            }
            return chunks;
        }

        let mut start = 0usize;
        while start < lines.len() {
            if let Some(chunk) = self.window_chunk(rel_path, &lines, start, repo_id, commit_sha) {
                chunks.push(chunk);
            }
            start += self.stride;
        }

        chunks
    }

    fn window_chunk(
        &self,
        rel_path: &str,
        lines: &[&str],
        start: usize,
        repo_id: &str,
        commit_sha: &str,
    ) -> Option<Chunk> {
        let window = &lines[start..(start + self.window_lines).min(lines.len())];
        let body = window.join("\n");
        if body.trim().is_empty() {
            return None;
        }

        let start_line = (start + 1) as u32;
        let end_line = (start + window.len()) as u32;
        let content = format!(
            "// File: {} (Lines {}-{})\n{}",
            rel_path, start_line, end_line, body
        );
        Some(Chunk::new(
            repo_id.to_string(),
            commit_sha.to_string(),
            rel_path.to_string(),
            start_line,
            end_line,
            content,
        ))
    }

    fn is_chunkable(&self, rel_path: &str) -> bool {
        if rel_path
            .split('/')
            .any(|segment| SKIP_DIRS.contains(&segment))
        {
            return false;
        }

        Path::new(rel_path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| CHUNKABLE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> Chunker {
        Chunker::new(&Config::default())
    }

    fn numbered_lines(n: usize) -> String {
        (1..=n)
            .map(|i| format!("line {}", i))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_small_file_single_chunk() {
        let chunks = chunker().chunk_file("main.py", &numbered_lines(40), "repo", "sha");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_line(), 1);
        assert_eq!(chunks[0].end_line(), 40);
        assert!(chunks[0]
            .content()
            .starts_with("// File: main.py (Lines 1-40)"));
    }

    #[test]
    fn test_window_and_overlap() {
        let chunks = chunker().chunk_file("big.py", &numbered_lines(550), "repo", "sha");

        assert_eq!(chunks.len(), 3);
        assert_eq!((chunks[0].start_line(), chunks[0].end_line()), (1, 300));
        assert_eq!((chunks[1].start_line(), chunks[1].end_line()), (251, 550));
        assert_eq!((chunks[2].start_line(), chunks[2].end_line()), (501, 550));
        // 50 lines of overlap between adjacent windows.
        assert_eq!(chunks[0].end_line() - chunks[1].start_line() + 1, 50);
    }

    #[test]
    fn test_exact_window_no_trailing_chunk() {
        let chunks = chunker().chunk_file("f.py", &numbered_lines(300), "repo", "sha");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].end_line(), 300);
    }

    #[test]
    fn test_whitespace_windows_dropped() {
        let content = "\n\n\n   \n\t\n";
        let chunks = chunker().chunk_file("empty.py", content, "repo", "sha");
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_deterministic_ids_across_runs() {
        let a = chunker().chunk_file("f.py", &numbered_lines(550), "repo", "sha");
        let b = chunker().chunk_file("f.py", &numbered_lines(550), "repo", "sha");

        let ids_a: Vec<&str> = a.iter().map(|c| c.id()).collect();
        let ids_b: Vec<&str> = b.iter().map(|c| c.id()).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn test_skip_list() {
        let c = chunker();
        assert!(!c.is_chunkable("node_modules/react/index.js"));
        assert!(!c.is_chunkable("app/__pycache__/mod.py"));
        assert!(!c.is_chunkable("vendor/lib.go"));
        assert!(!c.is_chunkable("dist/bundle.js"));
        assert!(c.is_chunkable("src/distributed/worker.py"));
        assert!(c.is_chunkable("app/main.py"));
    }

    #[test]
    fn test_non_code_extensions_skipped() {
        let c = chunker();
        assert!(!c.is_chunkable("image.png"));
        assert!(!c.is_chunkable("data.bin"));
        assert!(c.is_chunkable("README.md"));
    }

    #[test]
    fn test_chunk_tree_respects_size_cap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("small.py"), "print('hi')\n").unwrap();
        std::fs::write(dir.path().join("big.py"), "x".repeat(2 * 1024 * 1024)).unwrap();

        let chunks = chunker().chunk_tree(dir.path(), "repo", "sha");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].file_path(), "small.py");
    }
}
