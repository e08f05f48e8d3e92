use serde::{Deserialize, Serialize};

/// A function or method signature extracted from source code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSig {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub params: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub return_type: String,
    #[serde(default)]
    pub is_exported: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub doc_comment: String,
}

/// A class, struct, or interface with its members.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<FunctionSig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(default)]
    pub is_exported: bool,
}

/// Language-agnostic structural summary of one source file. This is what the
/// LLM pipeline sees instead of raw source, except for key files which also
/// carry their full text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStructure {
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub language: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionSig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<ClassSig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constants: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_defs: Vec<String>,
    #[serde(default)]
    pub is_key_file: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code: Option<String>,
}

/// A batch of file structures grouped by directory and sized for one LLM call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryChunk {
    pub dir_path: String,
    pub files: Vec<FileStructure>,
    pub token_estimate: usize,
}
