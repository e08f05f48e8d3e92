//! Directory chunker: groups file structures by top-level directory and
//! balances the groups into chunks sized for one LLM call each.

use std::collections::BTreeMap;

use quickdocs_model::{DirectoryChunk, FileStructure};

pub const MIN_CHUNK_TOKENS: usize = 2_000;
pub const MAX_CHUNK_TOKENS: usize = 8_000;

/// Crude but serviceable: roughly four characters of serialized JSON per
/// token.
const CHARS_PER_TOKEN: usize = 4;

/// Groups file structures by top-level directory and returns balanced chunks.
///
/// Chunks under [`MIN_CHUNK_TOKENS`] are merged together; chunks over
/// [`MAX_CHUNK_TOKENS`] are split by second-level directory. A single file
/// larger than the maximum stays as one oversized chunk, and a trailing merge
/// may stay under the minimum. Output order is deterministic: entry-point
/// directories first, then by name.
pub fn chunk_by_directory(structures: Vec<FileStructure>) -> Vec<DirectoryChunk> {
    let mut groups: BTreeMap<String, Vec<FileStructure>> = BTreeMap::new();
    for file in structures {
        groups
            .entry(top_level_dir(&file.path).to_string())
            .or_default()
            .push(file);
    }

    let chunks: Vec<DirectoryChunk> = groups
        .into_iter()
        .map(|(dir_path, files)| {
            let token_estimate = estimate_tokens(&files);
            DirectoryChunk {
                dir_path,
                files,
                token_estimate,
            }
        })
        .collect();

    let chunks = merge_small_chunks(chunks);
    let mut chunks = split_large_chunks(chunks);

    chunks.sort_by(|a, b| {
        dir_priority(&a.dir_path)
            .cmp(&dir_priority(&b.dir_path))
            .then_with(|| a.dir_path.cmp(&b.dir_path))
    });

    chunks
}

/// First path component, or `"root"` for top-level files.
fn top_level_dir(path: &str) -> &str {
    match path.split_once('/') {
        Some((first, _)) => first,
        None => "root",
    }
}

/// Token estimate for a set of file structures, from their serialized size.
fn estimate_tokens(files: &[FileStructure]) -> usize {
    let len = serde_json::to_vec(files).map(|d| d.len()).unwrap_or(0);
    len.div_ceil(CHARS_PER_TOKEN)
}

/// Combines chunks smaller than the minimum. Deferred chunks accumulate until
/// they reach the threshold, then flush as one chunk named `a+b+c`. Whatever
/// is left at the end flushes regardless.
fn merge_small_chunks(chunks: Vec<DirectoryChunk>) -> Vec<DirectoryChunk> {
    let mut result = Vec::with_capacity(chunks.len());
    let mut pending_files: Vec<FileStructure> = Vec::new();
    let mut pending_dirs: Vec<String> = Vec::new();
    let mut pending_tokens = 0usize;

    for chunk in chunks {
        if chunk.token_estimate >= MIN_CHUNK_TOKENS {
            result.push(chunk);
            continue;
        }

        pending_files.extend(chunk.files);
        pending_dirs.push(chunk.dir_path);
        pending_tokens += chunk.token_estimate;

        if pending_tokens >= MIN_CHUNK_TOKENS {
            result.push(DirectoryChunk {
                dir_path: pending_dirs.join("+"),
                files: std::mem::take(&mut pending_files),
                token_estimate: pending_tokens,
            });
            pending_dirs.clear();
            pending_tokens = 0;
        }
    }

    if !pending_files.is_empty() {
        result.push(DirectoryChunk {
            dir_path: pending_dirs.join("+"),
            files: pending_files,
            token_estimate: pending_tokens,
        });
    }

    result
}

/// Breaks chunks exceeding the maximum into parts along second-level
/// directory boundaries. Never splits below a single file.
fn split_large_chunks(chunks: Vec<DirectoryChunk>) -> Vec<DirectoryChunk> {
    let mut result = Vec::with_capacity(chunks.len());

    for chunk in chunks {
        if chunk.token_estimate <= MAX_CHUNK_TOKENS {
            result.push(chunk);
            continue;
        }

        let mut sub_groups: BTreeMap<String, Vec<FileStructure>> = BTreeMap::new();
        for file in chunk.files {
            let sub = second_level_dir(&file.path, &chunk.dir_path);
            sub_groups.entry(sub).or_default().push(file);
        }

        let mut current: Vec<FileStructure> = Vec::new();
        let mut current_tokens = 0usize;
        let mut part_idx = 0usize;

        for (_, files) in sub_groups {
            let est = estimate_tokens(&files);
            if current_tokens + est > MAX_CHUNK_TOKENS && !current.is_empty() {
                result.push(DirectoryChunk {
                    dir_path: format!("{} (part {part_idx})", chunk.dir_path),
                    files: std::mem::take(&mut current),
                    token_estimate: current_tokens,
                });
                current_tokens = 0;
                part_idx += 1;
            }
            current.extend(files);
            current_tokens += est;
        }

        if !current.is_empty() {
            let dir_path = if part_idx > 0 {
                format!("{} (part {part_idx})", chunk.dir_path)
            } else {
                chunk.dir_path
            };
            result.push(DirectoryChunk {
                dir_path,
                files: current,
                token_estimate: current_tokens,
            });
        }
    }

    result
}

/// Subdirectory under a top-level directory, e.g. `src/auth` for
/// `src/auth/login.ts`.
fn second_level_dir(path: &str, top_dir: &str) -> String {
    let rel = path.strip_prefix(&format!("{top_dir}/")).unwrap_or(path);
    match rel.split_once('/') {
        Some((sub, _)) => format!("{top_dir}/{sub}"),
        None => top_dir.to_string(),
    }
}

/// Priority score for directory names; lower analyzes earlier. Entry points
/// and primary sources go first so their analyses exist by the time the
/// synthesis stage reads them.
fn dir_priority(dir: &str) -> u8 {
    let d = dir.to_lowercase();
    if d == "root" {
        0
    } else if d.contains("cmd") || d.contains("bin") {
        1
    } else if d.contains("src") || d.contains("lib") || d.contains("pkg") || d.contains("app") {
        2
    } else if d.contains("internal") || d.contains("core") {
        3
    } else if d.contains("api") || d.contains("server") {
        4
    } else if d.contains("test") || d.contains("spec") {
        8
    } else if d.contains("doc") || d.contains("example") {
        9
    } else {
        5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A file whose serialized JSON is roughly `token_estimate * 4` bytes.
    fn file_with_tokens(path: &str, tokens: usize) -> FileStructure {
        FileStructure {
            path: path.to_string(),
            language: "go".to_string(),
            source_code: Some("x".repeat(tokens * CHARS_PER_TOKEN)),
            ..FileStructure::default()
        }
    }

    fn small_file(path: &str) -> FileStructure {
        file_with_tokens(path, 100)
    }

    fn all_paths(chunks: &[DirectoryChunk]) -> Vec<String> {
        let mut paths: Vec<String> = chunks
            .iter()
            .flat_map(|c| c.files.iter().map(|f| f.path.clone()))
            .collect();
        paths.sort();
        paths
    }

    #[test]
    fn every_input_file_lands_in_exactly_one_chunk() {
        let files = vec![
            file_with_tokens("src/a.go", 1500),
            file_with_tokens("src/b.go", 1500),
            file_with_tokens("pkg/c.go", 2500),
            small_file("docs/readme.md"),
            small_file("main.go"),
        ];
        let mut expected: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
        expected.sort();

        let chunks = chunk_by_directory(files);
        assert_eq!(all_paths(&chunks), expected);
    }

    #[test]
    fn small_directories_merge_until_the_threshold() {
        let chunks = chunk_by_directory(vec![
            file_with_tokens("aaa/one.go", 1100),
            file_with_tokens("bbb/two.go", 1100),
            file_with_tokens("ccc/three.go", 1100),
        ]);

        // aaa and bbb merge past 2000; ccc flushes as the trailing remainder
        // below the minimum.
        assert_eq!(chunks.len(), 2);
        let names: Vec<&str> = chunks.iter().map(|c| c.dir_path.as_str()).collect();
        assert!(names.contains(&"aaa+bbb"), "{names:?}");
        assert!(names.contains(&"ccc"), "{names:?}");
    }

    #[test]
    fn oversized_directories_split_by_subdirectory() {
        let chunks = chunk_by_directory(vec![
            file_with_tokens("src/auth/a.go", 5000),
            file_with_tokens("src/db/b.go", 5000),
            file_with_tokens("src/web/c.go", 5000),
        ]);

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.dir_path.starts_with("src (part "), "{}", chunk.dir_path);
            assert_eq!(chunk.files.len(), 1);
        }
    }

    #[test]
    fn single_oversized_file_stays_whole() {
        let chunks = chunk_by_directory(vec![file_with_tokens("src/huge.go", 20_000)]);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].dir_path, "src");
        assert_eq!(chunks[0].files.len(), 1);
        assert!(chunks[0].token_estimate > MAX_CHUNK_TOKENS);
    }

    #[test]
    fn chunk_sizes_stay_within_bounds_except_allowed_cases() {
        let mut files = Vec::new();
        for dir in ["alpha", "beta", "gamma", "delta"] {
            for i in 0..6 {
                files.push(file_with_tokens(&format!("{dir}/sub{i}/f.go"), 1200));
            }
        }
        files.push(small_file("tail/last.go"));

        let chunks = chunk_by_directory(files);
        let out_of_bounds: Vec<&DirectoryChunk> = chunks
            .iter()
            .filter(|c| c.token_estimate < MIN_CHUNK_TOKENS || c.token_estimate > MAX_CHUNK_TOKENS)
            .collect();
        // Only a trailing merge remainder may fall outside the window here.
        assert!(out_of_bounds.len() <= 1, "{:?}", chunks.iter().map(|c| (&c.dir_path, c.token_estimate)).collect::<Vec<_>>());
    }

    #[test]
    fn entry_point_directories_analyze_first() {
        let chunks = chunk_by_directory(vec![
            file_with_tokens("docs/guide.md", 2500),
            file_with_tokens("cmd/main.go", 2500),
            file_with_tokens("main.go", 2500),
            file_with_tokens("internal/core.go", 2500),
            file_with_tokens("tests/all.go", 2500),
        ]);

        let names: Vec<&str> = chunks.iter().map(|c| c.dir_path.as_str()).collect();
        assert_eq!(names, vec!["root", "cmd", "internal", "tests", "docs"]);
    }

    #[test]
    fn deterministic_across_runs() {
        let build = || {
            chunk_by_directory(vec![
                file_with_tokens("one/a.go", 700),
                file_with_tokens("two/b.go", 700),
                file_with_tokens("three/c.go", 700),
                file_with_tokens("four/d.go", 700),
            ])
        };
        let first: Vec<String> = build().into_iter().map(|c| c.dir_path).collect();
        let second: Vec<String> = build().into_iter().map(|c| c.dir_path).collect();
        assert_eq!(first, second);
    }
}
