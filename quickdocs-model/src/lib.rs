//! Core data model definitions shared across QuickDocs crates.
#![allow(missing_docs)]

pub mod docs;
pub mod job;
pub mod status;
pub mod structure;
pub mod tree;

// Intentionally curated re-exports for downstream consumers.
pub use docs::{
    Architecture, Component, Dependencies, Diagram, Documentation, EntryPointItem, EntryPoints,
    KeyDependency, KeyExport, ModuleAnalysis, SetupGuide, SynthesisResult, SystemOverview,
    TechStack,
};
pub use job::{IndexJob, TASK_TYPE_INDEX_REPO, is_valid_slug};
pub use status::{IndexingStatus, RepoStatus};
pub use structure::{ClassSig, DirectoryChunk, FileStructure, FunctionSig};
pub use tree::{EntryKind, TreeEntry};
