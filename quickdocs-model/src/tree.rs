use serde::{Deserialize, Serialize};

/// Entry kind reported by the GitHub Git Trees API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A regular file.
    Blob,
    /// A directory.
    Tree,
    /// A submodule pointer; never downloaded.
    Commit,
}

/// A single entry from a recursive repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Size in bytes; the API omits it for trees.
    #[serde(default)]
    pub size: u64,
    /// Content hash of the object.
    pub sha: String,
}

impl TreeEntry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::Blob
    }
}
