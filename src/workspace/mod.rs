// ABOUTME: Workspace module — incremental file extraction and the merge policy.
// ABOUTME: The extractor re-derives the file set from full text; merge folds it in.

pub mod extract;
pub mod files;

pub use extract::{extract_files, ExtractedFile};
pub use files::{detect_language, Workspace, WorkspaceFile};
