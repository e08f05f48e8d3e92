use tree_sitter::Language;

/// Maps a lowercased file extension (with leading dot) to its tree-sitter
/// grammar and canonical language name.
pub(super) fn language_for(ext: &str) -> Option<(Language, &'static str)> {
    match ext {
        ".go" => Some((tree_sitter_go::language(), "go")),
        ".ts" => Some((tree_sitter_typescript::language_typescript(), "typescript")),
        ".tsx" => Some((tree_sitter_typescript::language_tsx(), "tsx")),
        ".js" => Some((tree_sitter_javascript::language(), "javascript")),
        ".jsx" => Some((tree_sitter_typescript::language_tsx(), "jsx")),
        ".py" => Some((tree_sitter_python::language(), "python")),
        ".rs" => Some((tree_sitter_rust::language(), "rust")),
        ".java" => Some((tree_sitter_java::language(), "java")),
        _ => None,
    }
}

/// Canonical language name for an extension, or empty when unsupported.
pub fn language_name(ext: &str) -> &'static str {
    language_for(ext).map(|(_, name)| name).unwrap_or("")
}
