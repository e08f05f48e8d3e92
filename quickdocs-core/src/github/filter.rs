//! File selection: narrows a repository tree to the entries worth parsing
//! and documenting, with priority tiers and monorepo-aware capping.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

use quickdocs_model::TreeEntry;

/// Directories that never contain documentation-worthy sources. Entries with
/// a `/` are matched against two adjacent path components.
static EXCLUDED_DIRS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "node_modules",
        "vendor",
        ".git",
        "dist",
        "build",
        "__pycache__",
        "target",
        ".next",
        "coverage",
        "venv",
        ".venv",
        "test_data",
        "testdata",
        ".github/workflows",
        ".circleci",
        ".husky",
        ".vscode",
        ".idea",
        ".terraform",
        ".cache",
        ".parcel-cache",
        ".sass-cache",
        ".turbo",
        ".vercel",
        ".netlify",
        ".serverless",
        "__snapshots__",
        ".nyc_output",
        ".pytest_cache",
        ".mypy_cache",
        ".tox",
        ".eggs",
        "htmlcov",
        ".gradle",
        ".mvn",
        "out",
        "obj",
        ".angular",
    ])
});

/// Binary and other non-text extensions, lowercased.
static EXCLUDED_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        // Images
        ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".ico", ".svg", ".webp", ".tiff", ".tif",
        // Fonts
        ".woff", ".woff2", ".ttf", ".otf", ".eot",
        // Audio/Video
        ".mp3", ".mp4", ".wav", ".ogg", ".webm", ".avi", ".mov", ".flac",
        // Archives
        ".zip", ".tar", ".gz", ".bz2", ".xz", ".rar", ".7z", ".jar",
        // Compiled/Binary
        ".exe", ".dll", ".so", ".dylib", ".a", ".o", ".obj", ".class", ".pyc", ".pyo", ".wasm",
        ".beam",
        // Data/DB
        ".sqlite", ".db", ".bin", ".dat",
        // Documents
        ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx",
        // Misc non-text
        ".ds_store", ".lock",
    ])
});

/// Filenames always included regardless of extension.
static ALWAYS_INCLUDE: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "Dockerfile",
        "Makefile",
        "package.json",
        "go.mod",
        "Cargo.toml",
        "pyproject.toml",
        "setup.py",
        "requirements.txt",
        "Gemfile",
        "README.md",
        "README",
        "LICENSE",
    ])
});

/// Path suffixes always skipped (lockfiles, minified and generated output).
const SKIP_SUFFIXES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Cargo.lock",
    "go.sum",
    "Gemfile.lock",
    "poetry.lock",
    ".min.js",
    ".min.css",
    ".map",
    ".snap",
    ".pb.go",
    ".d.ts",
];

/// Basename substrings that mark generated files.
const SKIP_CONTAINS: &[&str] = &[".generated.", "_generated."];

/// Files that deserve the higher `max_critical_size_bytes` limit, lowercased.
static CRITICAL_FILES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "readme.md",
        "readme",
        "readme.rst",
        "readme.txt",
        "package.json",
        "go.mod",
        "cargo.toml",
        "pyproject.toml",
        "setup.py",
        "requirements.txt",
        "gemfile",
        "pom.xml",
        "build.gradle",
        "composer.json",
    ])
});

/// Tier-0 project files: the critical set plus container/build entrypoints.
static TIER0_FILES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    let mut set: HashSet<&'static str> = CRITICAL_FILES.clone();
    set.extend(["dockerfile", "makefile", "docker-compose.yml", "docker-compose.yaml"]);
    set
});

/// Extensionless basenames that mark entry points.
static ENTRY_POINT_NAMES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| HashSet::from(["main", "index", "app", "server", "cli"]));

/// Recognized source directory components, lowercased.
static SOURCE_DIRS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "src",
        "lib",
        "pkg",
        "cmd",
        "app",
        "internal",
        "core",
        "api",
        "server",
        "services",
        "handlers",
        "controllers",
        "models",
        "routes",
        "middleware",
        "components",
        "pages",
    ])
});

/// Directory components marking tests, examples, docs, and fixtures.
static AUX_DIRS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "examples",
        "example",
        "docs",
        "doc",
        "fixtures",
        "fixture",
        "mocks",
        "mock",
        "stubs",
        "samples",
        "sample",
        "demo",
        "demos",
        "benchmarks",
        "benchmark",
        "e2e",
        "cypress",
        "playwright",
        "stories",
        "storybook",
        ".storybook",
    ])
});

/// Manifest basenames used to detect monorepo package roots, lowercased.
static MANIFEST_FILES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "package.json",
        "go.mod",
        "cargo.toml",
        "pyproject.toml",
        "setup.py",
        "pom.xml",
        "build.gradle",
        "composer.json",
        "gemfile",
    ])
});

/// Filters tree entries to the most relevant files for documentation.
///
/// `max_critical_size_bytes` is a higher size limit for critical files
/// (READMEs, manifests); zero means "same as `max_size_bytes`". When more
/// files survive filtering than `max_files`, entries are ranked by priority
/// tier with monorepo-aware per-package floors.
pub fn filter_tree(
    entries: Vec<TreeEntry>,
    max_files: usize,
    max_size_bytes: u64,
    max_critical_size_bytes: u64,
) -> Vec<TreeEntry> {
    let critical_size = if max_critical_size_bytes > 0 {
        max_critical_size_bytes
    } else {
        max_size_bytes
    };

    let filtered: Vec<TreeEntry> = entries
        .into_iter()
        .filter(|e| should_include(e, max_size_bytes, critical_size))
        .collect();

    if filtered.len() <= max_files {
        return filtered;
    }

    prioritize(filtered, max_files)
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Extension including the leading dot, lowercased. Dotfiles with no other
/// dot report their whole name, matching `filepath.Ext` semantics.
fn extension_lower(base: &str) -> String {
    match base.rfind('.') {
        Some(i) => base[i..].to_lowercase(),
        None => String::new(),
    }
}

fn is_critical_file(base_lower: &str) -> bool {
    CRITICAL_FILES.contains(base_lower)
}

fn should_include(entry: &TreeEntry, max_size_bytes: u64, max_critical_size_bytes: u64) -> bool {
    let base = basename(&entry.path);

    // Critical files get a higher size limit.
    let size_limit = if is_critical_file(&base.to_lowercase()) {
        max_critical_size_bytes
    } else {
        max_size_bytes
    };
    if entry.size > size_limit {
        return false;
    }

    // Always-skip patterns.
    if SKIP_SUFFIXES.iter().any(|s| entry.path.ends_with(s)) {
        return false;
    }
    if SKIP_CONTAINS.iter().any(|s| base.contains(s)) {
        return false;
    }

    // Excluded directories: each component, and adjacent pairs so entries
    // like ".github/workflows" match.
    let parts: Vec<&str> = entry.path.split('/').collect();
    let dirs = &parts[..parts.len().saturating_sub(1)];
    if dirs.iter().any(|d| EXCLUDED_DIRS.contains(*d)) {
        return false;
    }
    for pair in dirs.windows(2) {
        let combined = format!("{}/{}", pair[0], pair[1]);
        if EXCLUDED_DIRS.contains(combined.as_str()) {
            return false;
        }
    }

    // Always-include files.
    if ALWAYS_INCLUDE.contains(base) {
        return true;
    }

    // Known binary/non-text extensions.
    let ext = extension_lower(base);
    if !ext.is_empty() && EXCLUDED_EXTENSIONS.contains(ext.as_str()) {
        return false;
    }

    // Everything else that passed the checks above, including extensionless
    // files (scripts, Dockerfiles), is kept.
    true
}

/// Priority tier for selection when the accepted set exceeds the cap.
///
/// 0: critical project files. 1: entry points. 2: files in recognized source
/// directories. 3: other source files. 4: tests, examples, docs, fixtures —
/// evaluated before tiers 1-3 so they can demote source-like paths.
fn tier(entry: &TreeEntry) -> u8 {
    let base = basename(&entry.path);
    let base_lower = base.to_lowercase();
    let path_lower = entry.path.to_lowercase();
    let parts: Vec<&str> = entry.path.split('/').collect();
    let dirs = &parts[..parts.len().saturating_sub(1)];

    if TIER0_FILES.contains(base_lower.as_str()) {
        return 0;
    }

    if is_test_or_aux_file(&path_lower, &base_lower) {
        return 4;
    }

    let name_no_ext = match base_lower.rsplit_once('.') {
        Some((name, _)) => name,
        None => base_lower.as_str(),
    };
    if ENTRY_POINT_NAMES.contains(name_no_ext) {
        return 1;
    }
    if parts.len() >= 2 && parts[0].eq_ignore_ascii_case("cmd") {
        return 1;
    }
    if dirs.iter().any(|d| d.eq_ignore_ascii_case("bin")) {
        return 1;
    }

    if dirs
        .iter()
        .any(|d| SOURCE_DIRS.contains(d.to_lowercase().as_str()))
    {
        return 2;
    }

    3
}

fn is_test_or_aux_file(path_lower: &str, base_lower: &str) -> bool {
    if base_lower.contains("_test.")
        || base_lower.contains(".test.")
        || base_lower.contains(".spec.")
        || base_lower.starts_with("test_")
    {
        return true;
    }

    let parts: Vec<&str> = path_lower.split('/').collect();
    parts[..parts.len().saturating_sub(1)]
        .iter()
        .any(|d| AUX_DIRS.contains(*d))
}

/// Package roots are directories holding a manifest, excluding the repository
/// root itself.
fn detect_packages(entries: &[TreeEntry]) -> HashSet<String> {
    let mut roots = HashSet::new();
    for entry in entries {
        let base = basename(&entry.path).to_lowercase();
        if !MANIFEST_FILES.contains(base.as_str()) {
            continue;
        }
        if let Some((dir, _)) = entry.path.rsplit_once('/') {
            roots.insert(dir.to_string());
        }
    }
    roots
}

/// Nearest detected package root containing `path`, if any.
fn package_root<'a>(path: &str, roots: &'a HashSet<String>) -> Option<&'a str> {
    let mut dir = path.rsplit_once('/')?.0;
    loop {
        if let Some(found) = roots.get(dir) {
            return Some(found.as_str());
        }
        dir = dir.rsplit_once('/')?.0;
    }
}

fn prioritize(mut entries: Vec<TreeEntry>, max_files: usize) -> Vec<TreeEntry> {
    let pkg_roots = detect_packages(&entries);
    let is_monorepo = pkg_roots.len() > 1;

    // Sort by tier, then alphabetically within each tier.
    entries.sort_by(|a, b| tier(a).cmp(&tier(b)).then_with(|| a.path.cmp(&b.path)));

    if !is_monorepo {
        entries.truncate(max_files);
        return entries;
    }

    // Monorepo-aware selection: reserve a floor of slots per package from its
    // highest-priority files, then fill the rest by global priority order.
    let min_per_pkg = (max_files / (pkg_roots.len() + 1)).clamp(5, 100);

    let mut selected = vec![false; entries.len()];
    let mut selected_count = 0usize;
    let mut pkg_counts: HashMap<&str, usize> = HashMap::new();

    for (i, entry) in entries.iter().enumerate() {
        let Some(pkg) = package_root(&entry.path, &pkg_roots) else {
            continue;
        };
        let count = pkg_counts.entry(pkg).or_insert(0);
        if *count < min_per_pkg {
            selected[i] = true;
            *count += 1;
            selected_count += 1;
        }
    }

    for flag in selected.iter_mut() {
        if selected_count >= max_files {
            break;
        }
        if !*flag {
            *flag = true;
            selected_count += 1;
        }
    }

    let mut result: Vec<TreeEntry> = entries
        .into_iter()
        .zip(selected)
        .filter_map(|(entry, keep)| keep.then_some(entry))
        .collect();
    // The per-package floor can overshoot the cap when packages are numerous;
    // the cap wins.
    result.truncate(max_files);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickdocs_model::EntryKind;

    fn entry(path: &str, size: u64) -> TreeEntry {
        TreeEntry {
            path: path.to_string(),
            kind: EntryKind::Blob,
            size,
            sha: format!("sha-{path}"),
        }
    }

    #[test]
    fn drops_skip_suffixes_and_generated_files() {
        let out = filter_tree(
            vec![
                entry("package-lock.json", 10),
                entry("src/app.min.js", 10),
                entry("proto/service.pb.go", 10),
                entry("types/api.d.ts", 10),
                entry("src/models_generated.ts", 10),
                entry("src/app.ts", 10),
            ],
            100,
            102_400,
            512_000,
        );
        let paths: Vec<&str> = out.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["src/app.ts"]);
    }

    #[test]
    fn drops_excluded_directories_including_combined_prefixes() {
        let out = filter_tree(
            vec![
                entry("node_modules/lodash/index.js", 10),
                entry(".github/workflows/ci.yml", 10),
                entry(".github/FUNDING.yml", 10),
                entry("vendor/lib.go", 10),
                entry("src/ok.go", 10),
            ],
            100,
            102_400,
            512_000,
        );
        let paths: Vec<&str> = out.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec![".github/FUNDING.yml", "src/ok.go"]);
    }

    #[test]
    fn drops_binary_extensions_but_keeps_always_include() {
        let out = filter_tree(
            vec![
                entry("logo.png", 10),
                entry("demo.mp4", 10),
                entry("Dockerfile", 10),
                entry("Makefile", 10),
                entry("run.sh", 10),
            ],
            100,
            102_400,
            512_000,
        );
        let paths: Vec<&str> = out.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["Dockerfile", "Makefile", "run.sh"]);
    }

    #[test]
    fn critical_files_get_the_larger_size_budget() {
        let out = filter_tree(
            vec![
                entry("README.md", 400 * 1024),
                entry("big_source.go", 200 * 1024),
                entry("small.go", 10),
            ],
            100,
            102_400,
            512_000,
        );
        let paths: Vec<&str> = out.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "small.go"]);
    }

    #[test]
    fn at_most_max_files_and_stable_order_when_under_cap() {
        let input = vec![
            entry("zeta.go", 10),
            entry("alpha.go", 10),
            entry("src/main.go", 10),
        ];
        // Exactly at the cap: no prioritization, input order preserved.
        let out = filter_tree(input.clone(), 3, 102_400, 512_000);
        let paths: Vec<&str> = out.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["zeta.go", "alpha.go", "src/main.go"]);

        // One over: prioritization kicks in and sorts by (tier, path).
        let mut over = input;
        over.push(entry("util.go", 10));
        let out = filter_tree(over, 3, 102_400, 512_000);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].path, "src/main.go"); // tier 1 entry point first
    }

    #[test]
    fn tests_are_demoted_below_other_sources() {
        let out = filter_tree(
            vec![
                entry("src/engine_test.go", 10),
                entry("src/engine.go", 10),
                entry("web/Button.spec.tsx", 10),
                entry("web/Button.tsx", 10),
                entry("scripts/test_runner.py", 10),
            ],
            3,
            102_400,
            512_000,
        );
        let paths: Vec<&str> = out.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["src/engine.go", "web/Button.tsx", "scripts/test_runner.py"]);
    }

    #[test]
    fn monorepo_packages_each_get_their_floor() {
        let mut entries = Vec::new();
        for pkg in ["a", "b", "c"] {
            entries.push(entry(&format!("packages/{pkg}/package.json"), 100));
            for i in 0..3000 {
                entries.push(entry(&format!("packages/{pkg}/src/file{i:04}.ts"), 100));
            }
        }
        for i in 0..1000 {
            entries.push(entry(&format!("tools/script{i:04}.ts"), 100));
        }

        let out = filter_tree(entries, 2000, 102_400, 512_000);
        assert_eq!(out.len(), 2000);

        // clamp(2000 / (3 + 1), 5, 100) = 100 guaranteed slots per package.
        for pkg in ["a", "b", "c"] {
            let prefix = format!("packages/{pkg}/");
            let count = out.iter().filter(|e| e.path.starts_with(&prefix)).count();
            assert!(count >= 100, "package {pkg} got {count} slots");
        }
    }

    #[test]
    fn selector_invariants_hold() {
        let entries: Vec<TreeEntry> = (0..500)
            .map(|i| entry(&format!("src/mod{}/file{i}.rs", i % 7), (i as u64) * 10))
            .chain([
                entry("node_modules/x/y.js", 10),
                entry("a.min.js", 10),
                entry("huge.rs", 10_000_000),
            ])
            .collect();

        let out = filter_tree(entries, 100, 102_400, 512_000);
        assert!(out.len() <= 100);
        for e in &out {
            assert!(e.size <= 102_400);
            assert!(!e.path.contains("node_modules"));
            assert!(!SKIP_SUFFIXES.iter().any(|s| e.path.ends_with(s)));
        }
    }
}
