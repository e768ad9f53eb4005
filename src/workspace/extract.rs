// ABOUTME: Incremental file extractor — recovers <file path="..."> blocks from model output.
// ABOUTME: Total function over any input; re-derives the full file set on every call.

use std::sync::OnceLock;

use regex::Regex;

const OPEN_TAG_PREFIX: &str = "<file path=\"";
const CLOSE_TAG: &str = "</file>";

/// One file discerned in the text so far. `complete` is false while the block
/// is still waiting for its close tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    pub path: String,
    pub content: String,
    pub complete: bool,
}

fn file_block_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r#"(?s)<file path="([^"]*)">(.*?)</file>"#)
            .expect("file block regex must compile")
    })
}

fn open_tag_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r#"^<file path="([^"]*)">"#).expect("open tag regex must compile")
    })
}

/// Extract every file block discernible in `text`.
///
/// Two passes over the full text:
/// 1. every closed `<file path="...">...</file>` span, non-greedy (a body ends
///    at the nearest close tag), content trimmed;
/// 2. a trailing opening tag with no close tag anywhere after it becomes an
///    in-progress file whose content (everything after the opening tag) is
///    left untrimmed while it streams.
///
/// Duplicate paths collapse in place: the later occurrence in text order wins
/// while the entry keeps the position where the path was first introduced. An
/// opening tag whose `path` attribute has not fully arrived yields nothing;
/// it resolves on a later pass once more characters stream in.
pub fn extract_files(text: &str) -> Vec<ExtractedFile> {
    let mut files: Vec<ExtractedFile> = Vec::new();

    for caps in file_block_regex().captures_iter(text) {
        upsert(
            &mut files,
            ExtractedFile {
                path: caps[1].to_string(),
                content: caps[2].trim().to_string(),
                complete: true,
            },
        );
    }

    if let Some(open_idx) = text.rfind(OPEN_TAG_PREFIX) {
        let last_close = text.rfind(CLOSE_TAG);
        if last_close.is_none_or(|close_idx| open_idx > close_idx) {
            let tail = &text[open_idx..];
            if let Some(caps) = open_tag_regex().captures(tail) {
                let tag_end = caps.get(0).map_or(0, |m| m.end());
                upsert(
                    &mut files,
                    ExtractedFile {
                        path: caps[1].to_string(),
                        content: tail[tag_end..].to_string(),
                        complete: false,
                    },
                );
            }
        }
    }

    files
}

fn upsert(files: &mut Vec<ExtractedFile>, file: ExtractedFile) {
    match files.iter_mut().find(|f| f.path == file.path) {
        Some(existing) => {
            existing.content = file.content;
            existing.complete = file.complete;
        }
        None => files.push(file),
    }
}
