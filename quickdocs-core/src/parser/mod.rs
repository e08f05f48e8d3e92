//! Best-effort structural extraction of source files.
//!
//! Supported languages go through tree-sitter; anything else (or any parse
//! failure) falls back to a regex scan for function and type names. Signature
//! fidelity beyond that is explicitly not a goal — the pipeline wants a
//! cheap, language-agnostic sketch, not a compiler front end.

mod extract;
mod languages;

use quickdocs_model::FileStructure;
use tracing::debug;

pub use languages::language_name;

/// Extracts the structural summary of one source file.
pub fn extract_structure(path: &str, source: &[u8]) -> FileStructure {
    let ext = extension_lower(path);
    let mut fs = FileStructure {
        path: path.to_string(),
        ..FileStructure::default()
    };

    let Some((language, name)) = languages::language_for(&ext) else {
        extract::fallback(source, &mut fs);
        return fs;
    };
    fs.language = name.to_string();

    let mut parser = tree_sitter::Parser::new();
    if parser.set_language(&language).is_err() {
        extract::fallback(source, &mut fs);
        return fs;
    }

    match parser.parse(source, None) {
        Some(tree) => extract::extract(name, tree.root_node(), source, &mut fs),
        None => {
            debug!("tree-sitter parse failed for {path}, using regex fallback");
            extract::fallback(source, &mut fs);
        }
    }

    fs
}

fn extension_lower(path: &str) -> String {
    let base = path.rsplit('/').next().unwrap_or(path);
    match base.rfind('.') {
        Some(i) => base[i..].to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_file_structure() {
        let source = br#"package auth

import (
    "fmt"
    "strings"
)

const MaxAttempts = 5

// Login authenticates a user against the store.
func Login(user string, password string) error {
    return nil
}

func helper() {}

type Session struct {
    ID        string
    ExpiresAt int64
}

type Token string
"#;

        let fs = extract_structure("internal/auth/auth.go", source);
        assert_eq!(fs.language, "go");
        assert_eq!(fs.imports, vec!["fmt", "strings"]);
        assert_eq!(fs.constants, vec!["MaxAttempts"]);
        assert_eq!(fs.type_defs, vec!["Token"]);

        assert_eq!(fs.functions.len(), 2);
        let login = &fs.functions[0];
        assert_eq!(login.name, "Login");
        assert_eq!(login.params, "(user string, password string)");
        assert_eq!(login.return_type, "error");
        assert!(login.is_exported);
        assert!(login.doc_comment.contains("Login authenticates"));
        assert!(!fs.functions[1].is_exported);

        assert_eq!(fs.classes.len(), 1);
        assert_eq!(fs.classes[0].name, "Session");
        assert_eq!(fs.classes[0].fields.len(), 2);
    }

    #[test]
    fn typescript_exports_and_classes() {
        let source = br#"import { db } from "./db";

export function createUser(name: string): Promise<User> {
    return db.insert(name);
}

export const listUsers = async (): Promise<User[]> => {
    return db.all();
};

export interface User {
    id: string;
}

export class UserService {
    private cache: Map<string, User>;

    get(id: string) {
        return this.cache.get(id);
    }
}
"#;

        let fs = extract_structure("src/users.ts", source);
        assert_eq!(fs.language, "typescript");
        assert_eq!(fs.imports.len(), 1);

        let fn_names: Vec<&str> = fs.functions.iter().map(|f| f.name.as_str()).collect();
        assert!(fn_names.contains(&"createUser"), "{fn_names:?}");
        assert!(fn_names.contains(&"listUsers"), "{fn_names:?}");
        assert!(fs.exports.contains(&"createUser".to_string()));
        assert!(fs.exports.contains(&"User".to_string()));
        assert!(fs.type_defs.contains(&"User".to_string()));

        assert_eq!(fs.classes.len(), 1);
        assert_eq!(fs.classes[0].name, "UserService");
        assert_eq!(fs.classes[0].methods.len(), 1);
        assert_eq!(fs.classes[0].methods[0].name, "get");
    }

    #[test]
    fn python_docstrings_and_dunder_all() {
        let source = br#"import os
from typing import Optional

__all__ = ["fetch", "Store"]

def fetch(url: str) -> Optional[str]:
    """Fetch a URL.

    Longer explanation that gets truncated.
    """
    return None

def _private():
    pass

class Store:
    def get(self, key):
        return self.data[key]
"#;

        let fs = extract_structure("lib/store.py", source);
        assert_eq!(fs.language, "python");
        assert_eq!(fs.imports.len(), 2);
        assert_eq!(fs.exports, vec!["fetch", "Store"]);

        let fetch = &fs.functions[0];
        assert_eq!(fetch.name, "fetch");
        assert_eq!(fetch.params, "(url: str)");
        assert!(fetch.is_exported);
        assert!(fetch.doc_comment.contains("Fetch a URL"));
        assert!(!fs.functions[1].is_exported);

        assert_eq!(fs.classes.len(), 1);
        assert_eq!(fs.classes[0].methods[0].name, "get");
    }

    #[test]
    fn rust_impl_methods_attach_to_their_struct() {
        let source = br#"use std::collections::HashMap;

pub const LIMIT: usize = 10;

pub struct Cache {
    entries: HashMap<String, String>,
}

impl Cache {
    pub fn get(&self, key: &str) -> Option<&String> {
        self.entries.get(key)
    }

    fn evict(&mut self) {}
}

pub fn shared() -> Cache {
    Cache { entries: HashMap::new() }
}

pub enum Mode { On, Off }
"#;

        let fs = extract_structure("src/cache.rs", source);
        assert_eq!(fs.language, "rust");
        assert_eq!(fs.imports, vec!["use std::collections::HashMap;"]);
        assert_eq!(fs.constants, vec!["LIMIT"]);
        assert!(fs.type_defs.contains(&"Mode".to_string()));

        assert_eq!(fs.classes.len(), 1);
        let cache = &fs.classes[0];
        assert_eq!(cache.name, "Cache");
        assert!(cache.is_exported);
        assert_eq!(cache.fields, vec!["entries"]);
        let methods: Vec<&str> = cache.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["get", "evict"]);
        assert!(cache.methods[0].is_exported);
        assert!(!cache.methods[1].is_exported);

        assert_eq!(fs.functions.len(), 1);
        assert_eq!(fs.functions[0].name, "shared");
    }

    #[test]
    fn java_class_members() {
        let source = br#"import java.util.List;

public class Billing {
    private List<String> invoices;

    public void charge(String account) {
    }

    void internalAudit() {
    }
}
"#;

        let fs = extract_structure("src/main/java/Billing.java", source);
        assert_eq!(fs.language, "java");
        assert_eq!(fs.classes.len(), 1);
        let billing = &fs.classes[0];
        assert_eq!(billing.name, "Billing");
        assert!(billing.is_exported);
        assert!(fs.exports.contains(&"Billing".to_string()));
        assert_eq!(billing.methods.len(), 2);
        assert!(billing.methods[0].is_exported);
        assert!(!billing.methods[1].is_exported);
    }

    #[test]
    fn unknown_language_uses_regex_fallback() {
        let source = br#"def greet(name)
  puts "hi"
end

class Greeter
end
"#;

        let fs = extract_structure("app/greet.rb", source);
        assert!(fs.language.is_empty());
        assert_eq!(fs.functions.len(), 1);
        assert_eq!(fs.functions[0].name, "greet");
        assert_eq!(fs.classes.len(), 1);
        assert_eq!(fs.classes[0].name, "Greeter");
    }
}
