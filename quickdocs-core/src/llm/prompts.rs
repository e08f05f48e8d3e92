//! System prompts and user-message builders for the four pipeline stages.

use std::fmt::Write as _;

use quickdocs_model::FileStructure;

pub(super) const SYSTEM_OVERVIEW: &str = "You are a senior engineer writing documentation for a \
source repository. You are given its README, file tree, and package manifests. Produce an \
accurate, concrete system overview. Prefer information stated in the repository over guesses; \
when you must infer, stay conservative. Always answer through the provided tool.";

pub(super) const MODULE_ANALYSIS: &str = "You are a senior engineer documenting one module of a \
source repository. You are given structural summaries (imports, exports, signatures) of its \
files, plus full source for a few key files. Describe what the module does, its key exports, and \
its role in the project. Be specific and avoid boilerplate. Always answer through the provided \
tool.";

pub(super) const SYNTHESIS: &str = "You are a software architect synthesizing repository \
documentation. You are given a system overview and per-module analyses. Derive the architecture, \
technology stack, entry points, and dependency overview of the whole project. Mermaid diagrams \
are welcome where they clarify structure. Always answer through the provided tool.";

pub(super) const CONTEXT_GENERATION: &str = "You compress repository documentation into a dense \
context paragraph used to answer questions about the codebase later. Keep every load-bearing \
fact (purpose, architecture, modules, stack, entry points); drop marketing language. Plain text \
only.";

/// User message for the overview stage.
pub(super) fn overview_user(readme: &str, file_tree: &str, package_files: &str) -> String {
    format!(
        "Analyze this repository and generate a system overview.\n\n\
         ## README\n{readme}\n\n\
         ## File Tree\n{file_tree}\n\n\
         ## Package/Config Files\n{package_files}\n\n\
         Use the generate_system_overview tool to provide the structured overview."
    )
}

/// User message for one module-analysis chunk: a compact structural rendering
/// of every file, with full source attached for key files.
pub(super) fn module_user(module_path: &str, files: &[FileStructure]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "## Module: {module_path}\n");

    for file in files {
        let _ = writeln!(out, "### File: {} ({})", file.path, file.language);

        if !file.imports.is_empty() {
            let _ = writeln!(out, "**Imports:** {}", file.imports.join(", "));
        }
        if !file.exports.is_empty() {
            let _ = writeln!(out, "**Exports:** {}", file.exports.join(", "));
        }

        if !file.functions.is_empty() {
            let _ = writeln!(out, "**Functions:**");
            for func in &file.functions {
                let exported = if func.is_exported { " [exported]" } else { "" };
                let _ = writeln!(
                    out,
                    "- {}({}) -> {}{}",
                    func.name, func.params, func.return_type, exported
                );
                if !func.doc_comment.is_empty() {
                    let _ = writeln!(out, "  // {}", func.doc_comment);
                }
            }
        }

        if !file.classes.is_empty() {
            let _ = writeln!(out, "**Classes/Structs:**");
            for class in &file.classes {
                let exported = if class.is_exported { " [exported]" } else { "" };
                let _ = writeln!(out, "- {}{}", class.name, exported);
                if !class.fields.is_empty() {
                    let _ = writeln!(out, "  Fields: {}", class.fields.join(", "));
                }
                for method in &class.methods {
                    let _ = writeln!(
                        out,
                        "  - {}({}) -> {}",
                        method.name, method.params, method.return_type
                    );
                }
            }
        }

        if !file.type_defs.is_empty() {
            let _ = writeln!(out, "**Type Definitions:** {}", file.type_defs.join(", "));
        }
        if !file.constants.is_empty() {
            let _ = writeln!(out, "**Constants:** {}", file.constants.join(", "));
        }

        if let Some(source) = file.source_code.as_deref() {
            let _ = writeln!(out, "**Source:**\n```{}\n{}\n```", file.language, source);
        }

        out.push('\n');
    }

    out.push_str("\nUse the analyze_module tool to provide the structured module analysis.");
    out
}

/// User message for the synthesis stage.
pub(super) fn synthesis_user(overview_json: &str, modules_json: &str) -> String {
    format!(
        "## System Overview\n{overview_json}\n\n\
         ## Module Analyses\n{modules_json}\n\n\
         Use the synthesize_documentation tool to provide the structured cross-cutting \
         documentation."
    )
}

/// User message for the Q&A context stage.
pub(super) fn context_user(full_documentation: &str) -> String {
    format!("Generate a Q&A context summary from this documentation:\n\n{full_documentation}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickdocs_model::FunctionSig;

    #[test]
    fn module_user_renders_signatures_and_key_file_source() {
        let files = vec![FileStructure {
            path: "src/auth.go".to_string(),
            language: "go".to_string(),
            imports: vec!["fmt".to_string()],
            functions: vec![FunctionSig {
                name: "Login".to_string(),
                params: "user string".to_string(),
                return_type: "error".to_string(),
                is_exported: true,
                doc_comment: "Login authenticates a user.".to_string(),
            }],
            is_key_file: true,
            source_code: Some("package auth".to_string()),
            ..FileStructure::default()
        }];

        let text = module_user("src", &files);
        assert!(text.contains("## Module: src"));
        assert!(text.contains("- Login(user string) -> error [exported]"));
        assert!(text.contains("// Login authenticates a user."));
        assert!(text.contains("package auth"));
        assert!(text.contains("analyze_module"));
    }
}
