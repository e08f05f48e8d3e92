//! Per-language AST walkers plus the regex fallback.

use once_cell::sync::Lazy;
use regex::bytes::Regex;
use tree_sitter::Node;

use quickdocs_model::{ClassSig, FileStructure, FunctionSig};

pub(super) fn extract(language: &str, root: Node, source: &[u8], fs: &mut FileStructure) {
    match language {
        "go" => extract_go(root, source, fs),
        "typescript" | "tsx" | "jsx" => extract_typescript(root, source, fs),
        "javascript" => extract_javascript(root, source, fs),
        "python" => extract_python(root, source, fs),
        "rust" => extract_rust(root, source, fs),
        "java" => extract_java(root, source, fs),
        _ => fallback(source, fs),
    }
}

// --- Helpers ---

fn node_text<'a>(node: Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// First child of the given kind: named children take priority, then unnamed
/// ones (visibility modifiers and the like).
fn find_child<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
    for i in 0..node.named_child_count() {
        if let Some(child) = node.named_child(i) {
            if child.kind() == kind {
                return Some(child);
            }
        }
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if child.kind() == kind {
                return Some(child);
            }
        }
    }
    None
}

fn each_named_child<'a>(node: Node<'a>, mut f: impl FnMut(Node<'a>)) {
    for i in 0..node.named_child_count() {
        if let Some(child) = node.named_child(i) {
            f(child);
        }
    }
}

/// Keeps only the first two lines of a doc comment.
fn truncate_doc(comment: &str) -> String {
    let mut lines = comment.splitn(3, '\n');
    let first = lines.next().unwrap_or("");
    match lines.next() {
        Some(second) if lines.next().is_some() => format!("{first}\n{second}").trim().to_string(),
        _ => comment.trim().to_string(),
    }
}

/// The comment node directly above `node`, if any.
fn preceding_comment(node: Node, source: &[u8]) -> String {
    let Some(prev) = node.prev_named_sibling() else {
        return String::new();
    };
    match prev.kind() {
        "comment" | "block_comment" | "line_comment" => truncate_doc(node_text(prev, source)),
        _ => String::new(),
    }
}

fn clean_import(text: &str) -> String {
    text.trim().trim_end_matches(';').to_string()
}

// --- Go ---

fn extract_go(root: Node, source: &[u8], fs: &mut FileStructure) {
    each_named_child(root, |child| match child.kind() {
        "import_declaration" => extract_go_imports(child, source, fs),
        "function_declaration" | "method_declaration" => extract_go_func(child, source, fs),
        "type_declaration" => extract_go_type(child, source, fs),
        "const_declaration" => extract_go_consts(child, source, fs),
        _ => {}
    });
}

fn extract_go_imports(node: Node, source: &[u8], fs: &mut FileStructure) {
    each_named_child(node, |child| {
        if child.kind() == "import_spec_list" {
            each_named_child(child, |spec| {
                if let Some(path) = find_child(spec, "interpreted_string_literal") {
                    fs.imports
                        .push(node_text(path, source).trim_matches('"').to_string());
                }
            });
        } else if child.kind() == "import_spec" {
            if let Some(path) = find_child(child, "interpreted_string_literal") {
                fs.imports
                    .push(node_text(path, source).trim_matches('"').to_string());
            }
        }
    });
}

fn extract_go_func(node: Node, source: &[u8], fs: &mut FileStructure) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(name_node, source).to_string();

    let params = node
        .child_by_field_name("parameters")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();
    let return_type = node
        .child_by_field_name("result")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();

    let is_exported = go_exported(&name);
    let doc_comment = preceding_comment(node, source);

    fs.functions.push(FunctionSig {
        name,
        params,
        return_type,
        is_exported,
        doc_comment,
    });
}

fn extract_go_type(node: Node, source: &[u8], fs: &mut FileStructure) {
    each_named_child(node, |spec| {
        if spec.kind() != "type_spec" {
            return;
        }
        let Some(name_node) = find_child(spec, "type_identifier") else {
            return;
        };
        let name = node_text(name_node, source).to_string();

        if let Some(body) = find_child(spec, "struct_type") {
            let mut class = ClassSig {
                is_exported: go_exported(&name),
                name,
                ..ClassSig::default()
            };
            if let Some(field_list) = find_child(body, "field_declaration_list") {
                each_named_child(field_list, |field| {
                    if field.kind() == "field_declaration" {
                        class.fields.push(node_text(field, source).trim().to_string());
                    }
                });
            }
            fs.classes.push(class);
        } else {
            fs.type_defs.push(name);
        }
    });
}

fn extract_go_consts(node: Node, source: &[u8], fs: &mut FileStructure) {
    each_named_child(node, |child| {
        if child.kind() == "const_spec" {
            if let Some(name) = find_child(child, "identifier") {
                fs.constants.push(node_text(name, source).to_string());
            }
        }
    });
}

fn go_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

// --- TypeScript / TSX ---

fn extract_typescript(root: Node, source: &[u8], fs: &mut FileStructure) {
    each_named_child(root, |child| match child.kind() {
        "import_statement" => fs.imports.push(clean_import(node_text(child, source))),
        "export_statement" => extract_ts_export(child, source, fs),
        "function_declaration" => extract_ts_func(child, source, fs, false),
        "class_declaration" => extract_ts_class(child, source, fs, false),
        "lexical_declaration" => extract_ts_arrow_func(child, source, fs, false),
        "type_alias_declaration" | "interface_declaration" => {
            if let Some(name) = find_child(child, "type_identifier") {
                fs.type_defs.push(node_text(name, source).to_string());
            }
        }
        _ => {}
    });
}

fn extract_ts_export(node: Node, source: &[u8], fs: &mut FileStructure) {
    let mut handled = false;
    each_named_child(node, |child| match child.kind() {
        "function_declaration" => {
            handled = true;
            extract_ts_func(child, source, fs, true);
        }
        "class_declaration" => {
            handled = true;
            extract_ts_class(child, source, fs, true);
        }
        "lexical_declaration" => {
            handled = true;
            extract_ts_arrow_func(child, source, fs, true);
        }
        "type_alias_declaration" | "interface_declaration" => {
            handled = true;
            if let Some(name_node) = find_child(child, "type_identifier") {
                let name = node_text(name_node, source).to_string();
                fs.type_defs.push(name.clone());
                fs.exports.push(name);
            }
        }
        _ => {}
    });

    // Bare re-exports and default exports keep their raw text.
    if !handled {
        let text = node_text(node, source).trim().to_string();
        if text.starts_with("export {") || text.starts_with("export default") {
            fs.exports.push(clean_import(&text));
        }
    }
}

fn extract_ts_func(node: Node, source: &[u8], fs: &mut FileStructure, exported: bool) {
    let Some(name_node) = find_child(node, "identifier") else {
        return;
    };
    let name = node_text(name_node, source).to_string();

    let params = find_child(node, "formal_parameters")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();
    let return_type = find_child(node, "type_annotation")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();
    let doc_comment = preceding_comment(node, source);

    fs.functions.push(FunctionSig {
        name: name.clone(),
        params,
        return_type,
        is_exported: exported,
        doc_comment,
    });
    if exported {
        fs.exports.push(name);
    }
}

fn extract_ts_class(node: Node, source: &[u8], fs: &mut FileStructure, exported: bool) {
    let Some(name_node) =
        find_child(node, "type_identifier").or_else(|| find_child(node, "identifier"))
    else {
        return;
    };
    let name = node_text(name_node, source).to_string();
    let mut class = ClassSig {
        name: name.clone(),
        is_exported: exported,
        ..ClassSig::default()
    };

    if let Some(body) = find_child(node, "class_body") {
        each_named_child(body, |member| match member.kind() {
            "method_definition" => {
                if let Some(method_name) = find_child(member, "property_identifier") {
                    let params = find_child(member, "formal_parameters")
                        .map(|n| node_text(n, source).to_string())
                        .unwrap_or_default();
                    class.methods.push(FunctionSig {
                        name: node_text(method_name, source).to_string(),
                        params,
                        ..FunctionSig::default()
                    });
                }
            }
            "public_field_definition" => {
                class.fields.push(node_text(member, source).trim().to_string());
            }
            _ => {}
        });
    }

    fs.classes.push(class);
    if exported {
        fs.exports.push(name);
    }
}

fn extract_ts_arrow_func(node: Node, source: &[u8], fs: &mut FileStructure, exported: bool) {
    each_named_child(node, |decl| {
        if decl.kind() != "variable_declarator" {
            return;
        }
        let Some(name_node) = find_child(decl, "identifier") else {
            return;
        };
        let Some(arrow) = find_child(decl, "arrow_function") else {
            return;
        };

        let name = node_text(name_node, source).to_string();
        let params = find_child(arrow, "formal_parameters")
            .map(|n| node_text(n, source).to_string())
            .unwrap_or_default();
        let return_type = find_child(arrow, "type_annotation")
            .map(|n| node_text(n, source).to_string())
            .unwrap_or_default();
        let doc_comment = preceding_comment(node, source);

        fs.functions.push(FunctionSig {
            name: name.clone(),
            params,
            return_type,
            is_exported: exported,
            doc_comment,
        });
        if exported {
            fs.exports.push(name);
        }
    });
}

// --- JavaScript / JSX (shares the TS walkers; the grammars are compatible) ---

fn extract_javascript(root: Node, source: &[u8], fs: &mut FileStructure) {
    each_named_child(root, |child| match child.kind() {
        "import_statement" => fs.imports.push(clean_import(node_text(child, source))),
        "export_statement" => extract_ts_export(child, source, fs),
        "function_declaration" => extract_ts_func(child, source, fs, false),
        "class_declaration" => extract_ts_class(child, source, fs, false),
        "lexical_declaration" => extract_ts_arrow_func(child, source, fs, false),
        _ => {}
    });
}

// --- Python ---

fn extract_python(root: Node, source: &[u8], fs: &mut FileStructure) {
    each_named_child(root, |child| match child.kind() {
        "import_statement" | "import_from_statement" => {
            fs.imports.push(node_text(child, source).trim().to_string());
        }
        "function_definition" => extract_py_func(child, source, fs),
        "class_definition" => extract_py_class(child, source, fs),
        "expression_statement" => extract_py_all_export(child, source, fs),
        _ => {}
    });
}

fn extract_py_func(node: Node, source: &[u8], fs: &mut FileStructure) {
    let Some(name_node) = find_child(node, "identifier") else {
        return;
    };
    let name = node_text(name_node, source).to_string();

    let params = find_child(node, "parameters")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();
    let return_type = node
        .child_by_field_name("return_type")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();

    // A leading string expression in the body is the docstring.
    let mut doc_comment = String::new();
    if let Some(body) = find_child(node, "block") {
        if let Some(first) = body.named_child(0) {
            if first.kind() == "expression_statement" {
                if let Some(docstring) = find_child(first, "string") {
                    doc_comment = truncate_doc(node_text(docstring, source));
                }
            }
        }
    }

    fs.functions.push(FunctionSig {
        is_exported: !name.starts_with('_'),
        name,
        params,
        return_type,
        doc_comment,
    });
}

fn extract_py_class(node: Node, source: &[u8], fs: &mut FileStructure) {
    let Some(name_node) = find_child(node, "identifier") else {
        return;
    };
    let name = node_text(name_node, source).to_string();
    let mut class = ClassSig {
        is_exported: !name.starts_with('_'),
        name,
        ..ClassSig::default()
    };

    if let Some(body) = find_child(node, "block") {
        each_named_child(body, |member| {
            if member.kind() == "function_definition" {
                if let Some(method_name) = find_child(member, "identifier") {
                    let params = find_child(member, "parameters")
                        .map(|n| node_text(n, source).to_string())
                        .unwrap_or_default();
                    class.methods.push(FunctionSig {
                        name: node_text(method_name, source).to_string(),
                        params,
                        ..FunctionSig::default()
                    });
                }
            }
        });
    }

    fs.classes.push(class);
}

static PY_ALL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["'](\w+)["']"#).expect("__all__ regex should compile"));

fn extract_py_all_export(node: Node, source: &[u8], fs: &mut FileStructure) {
    let text = node_text(node, source);
    if !text.contains("__all__") {
        return;
    }
    for capture in PY_ALL_NAME.captures_iter(text.as_bytes()) {
        if let Some(name) = capture.get(1) {
            fs.exports
                .push(String::from_utf8_lossy(name.as_bytes()).into_owned());
        }
    }
}

// --- Rust ---

fn extract_rust(root: Node, source: &[u8], fs: &mut FileStructure) {
    each_named_child(root, |child| match child.kind() {
        "use_declaration" => fs.imports.push(node_text(child, source).trim().to_string()),
        "function_item" => extract_rust_func(child, source, fs),
        "struct_item" => extract_rust_struct(child, source, fs),
        "impl_item" => extract_rust_impl(child, source, fs),
        "const_item" => {
            if let Some(name) = find_child(child, "identifier") {
                fs.constants.push(node_text(name, source).to_string());
            }
        }
        "type_item" | "enum_item" => {
            if let Some(name) = find_child(child, "type_identifier") {
                fs.type_defs.push(node_text(name, source).to_string());
            }
        }
        _ => {}
    });
}

fn extract_rust_func(node: Node, source: &[u8], fs: &mut FileStructure) {
    let Some(name_node) = find_child(node, "identifier") else {
        return;
    };

    let params = find_child(node, "parameters")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();
    let return_type = node
        .child_by_field_name("return_type")
        .map(|n| node_text(n, source).to_string())
        .unwrap_or_default();

    fs.functions.push(FunctionSig {
        name: node_text(name_node, source).to_string(),
        params,
        return_type,
        is_exported: has_visibility_modifier(node),
        doc_comment: preceding_comment(node, source),
    });
}

fn extract_rust_struct(node: Node, source: &[u8], fs: &mut FileStructure) {
    let Some(name_node) = find_child(node, "type_identifier") else {
        return;
    };
    let mut class = ClassSig {
        name: node_text(name_node, source).to_string(),
        is_exported: has_visibility_modifier(node),
        ..ClassSig::default()
    };

    if let Some(field_list) = find_child(node, "field_declaration_list") {
        each_named_child(field_list, |field| {
            if field.kind() == "field_declaration" {
                if let Some(field_name) = find_child(field, "field_identifier") {
                    class.fields.push(node_text(field_name, source).to_string());
                }
            }
        });
    }

    fs.classes.push(class);
}

/// Methods from `impl` blocks attach to the struct's existing entry, so one
/// class record carries both fields and methods.
fn extract_rust_impl(node: Node, source: &[u8], fs: &mut FileStructure) {
    let Some(type_node) = find_child(node, "type_identifier") else {
        return;
    };
    let type_name = node_text(type_node, source).to_string();

    let Some(body) = find_child(node, "declaration_list") else {
        return;
    };

    each_named_child(body, |member| {
        if member.kind() != "function_item" {
            return;
        }
        let Some(name_node) = find_child(member, "identifier") else {
            return;
        };
        let method = FunctionSig {
            name: node_text(name_node, source).to_string(),
            params: find_child(member, "parameters")
                .map(|n| node_text(n, source).to_string())
                .unwrap_or_default(),
            is_exported: has_visibility_modifier(member),
            ..FunctionSig::default()
        };

        match fs.classes.iter().position(|c| c.name == type_name) {
            Some(idx) => fs.classes[idx].methods.push(method),
            None => fs.classes.push(ClassSig {
                name: type_name.clone(),
                methods: vec![method],
                ..ClassSig::default()
            }),
        }
    });
}

fn has_visibility_modifier(node: Node) -> bool {
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if child.kind() == "visibility_modifier" {
                return true;
            }
        }
    }
    false
}

// --- Java ---

fn extract_java(root: Node, source: &[u8], fs: &mut FileStructure) {
    each_named_child(root, |child| match child.kind() {
        "import_declaration" => fs.imports.push(clean_import(node_text(child, source))),
        "class_declaration" => extract_java_class(child, source, fs),
        _ => {}
    });
}

fn extract_java_class(node: Node, source: &[u8], fs: &mut FileStructure) {
    let Some(name_node) = find_child(node, "identifier") else {
        return;
    };
    let name = node_text(name_node, source).to_string();
    let exported = has_modifier(node, source, "public");
    let mut class = ClassSig {
        name: name.clone(),
        is_exported: exported,
        ..ClassSig::default()
    };

    if let Some(body) = find_child(node, "class_body") {
        each_named_child(body, |member| match member.kind() {
            "method_declaration" => {
                if let Some(method_name) = find_child(member, "identifier") {
                    class.methods.push(FunctionSig {
                        name: node_text(method_name, source).to_string(),
                        params: find_child(member, "formal_parameters")
                            .map(|n| node_text(n, source).to_string())
                            .unwrap_or_default(),
                        is_exported: has_modifier(member, source, "public"),
                        ..FunctionSig::default()
                    });
                }
            }
            "field_declaration" => {
                class.fields.push(node_text(member, source).trim().to_string());
            }
            _ => {}
        });
    }

    fs.classes.push(class);
    if exported {
        fs.exports.push(name);
    }
}

fn has_modifier(node: Node, source: &[u8], modifier: &str) -> bool {
    find_child(node, "modifiers")
        .map(|mods| node_text(mods, source).contains(modifier))
        .unwrap_or(false)
}

// --- Fallback (regex-based) ---

static FALLBACK_FUNC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:export\s+)?(?:async\s+)?(?:pub\s+)?(?:fn|func|function|def)\s+(\w+)")
        .expect("fallback function regex should compile")
});

static FALLBACK_CLASS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^(?:export\s+)?(?:pub\s+)?(?:class|struct|interface|trait)\s+(\w+)")
        .expect("fallback class regex should compile")
});

/// Regex scan for unsupported languages and unparseable files.
pub(super) fn fallback(source: &[u8], fs: &mut FileStructure) {
    for capture in FALLBACK_FUNC.captures_iter(source) {
        if let Some(name) = capture.get(1) {
            fs.functions.push(FunctionSig {
                name: String::from_utf8_lossy(name.as_bytes()).into_owned(),
                ..FunctionSig::default()
            });
        }
    }
    for capture in FALLBACK_CLASS.captures_iter(source) {
        if let Some(name) = capture.get(1) {
            fs.classes.push(ClassSig {
                name: String::from_utf8_lossy(name.as_bytes()).into_owned(),
                ..ClassSig::default()
            });
        }
    }
}
