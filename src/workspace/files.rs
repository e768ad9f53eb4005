// ABOUTME: Workspace — the durable, user-visible set of extracted project files.
// ABOUTME: Merge policy: overwrite in place or append, never delete, keep user edits.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::workspace::extract::ExtractedFile;

/// One materialized project file. `path` is the unique key within a
/// workspace; `language` is derived from the extension when the file is
/// first created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceFile {
    pub path: String,
    pub content: String,
    pub language: String,
}

/// Map a file path to a display language by extension.
pub fn detect_language(path: &str) -> String {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");
    match ext {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "html" | "htm" => "html",
        "css" => "css",
        "json" => "json",
        "md" => "markdown",
        "toml" => "toml",
        "yml" | "yaml" => "yaml",
        "sh" => "shell",
        "sql" => "sql",
        "go" => "go",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "java" => "java",
        _ => "text",
    }
    .to_string()
}

/// The extracted-file set for the active session.
#[derive(Debug, Default)]
pub struct Workspace {
    files: Vec<WorkspaceFile>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files(&self) -> &[WorkspaceFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file(&self, path: &str) -> Option<&WorkspaceFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Fold one extractor pass into the workspace: overwrite content in place
    /// where the path exists, append new files at the end. Files absent from
    /// the pass are left alone — the model omitting a file in a later message
    /// does not mean removal.
    pub fn merge(&mut self, extracted: &[ExtractedFile]) {
        for file in extracted {
            match self.files.iter_mut().find(|f| f.path == file.path) {
                Some(existing) => existing.content = file.content.clone(),
                None => self.files.push(WorkspaceFile {
                    path: file.path.clone(),
                    content: file.content.clone(),
                    language: detect_language(&file.path),
                }),
            }
        }
    }

    /// User-initiated overwrite of one file's content. Last writer wins.
    /// Returns false if the path is not in the workspace.
    pub fn edit_file(&mut self, path: &str, content: &str) -> bool {
        match self.files.iter_mut().find(|f| f.path == path) {
            Some(file) => {
                file.content = content.to_string();
                true
            }
            None => false,
        }
    }

    /// Drop every file (used when switching sessions).
    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Ordered `(path, content)` pairs for the packaging collaborator, with
    /// any leading `/` stripped so each path is archive-relative.
    pub fn archive_entries(&self) -> Vec<(String, String)> {
        self.files
            .iter()
            .map(|f| {
                (
                    f.path.trim_start_matches('/').to_string(),
                    f.content.clone(),
                )
            })
            .collect()
    }
}
