//! Small shared helpers: stable identifiers for documents and store points,
//! and git-driven change discovery for incremental rebuilds.

pub mod doc_id;
pub mod git;
pub mod uuid;
