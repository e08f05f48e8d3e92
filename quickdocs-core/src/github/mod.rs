//! GitHub ingestion: tree listing, raw file downloads, and the file selector
//! that narrows a repository to the files worth documenting.

mod client;
mod files;
mod filter;
mod tree;

pub use client::GithubClient;
pub use filter::filter_tree;
