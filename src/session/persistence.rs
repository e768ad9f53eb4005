// ABOUTME: Sessions persistence — save and load the sessions list as JSON.
// ABOUTME: Atomic file writes (tmp + rename) so a crash never leaves a torn list.

use std::path::Path;

use crate::config::sessions_path;
use crate::session::store::Session;

/// Load the persisted sessions list, newest first. A missing file is an empty
/// list, not an error.
pub fn load_sessions() -> anyhow::Result<Vec<Session>> {
    load_sessions_from(&sessions_path())
}

/// Load sessions from an explicit file path (for testing).
pub fn load_sessions_from(path: &Path) -> anyhow::Result<Vec<Session>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)?;
    let sessions: Vec<Session> = serde_json::from_str(&content)?;
    Ok(sessions)
}

/// Save the sessions list to the given file (atomic write via tmp + rename).
pub fn save_sessions_to(path: &Path, sessions: &[Session]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(sessions)?;
    std::fs::write(&tmp_path, &content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::{Message, Session};

    fn sample_sessions() -> Vec<Session> {
        vec![
            Session {
                id: "1754400000000".to_string(),
                title: "build a snake game".to_string(),
                messages: vec![
                    Message::user("build a snake game"),
                    Message::assistant("Here you go:\n<file path=\"snake.py\">pass</file>"),
                ],
                created_at: "2026-08-05T12:00:00+00:00".to_string(),
            },
            Session {
                id: "1754300000000".to_string(),
                title: "New Chat".to_string(),
                messages: vec![],
                created_at: "2026-08-04T09:30:00+00:00".to_string(),
            },
        ]
    }

    #[test]
    fn sessions_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("state").join("sessions.json");

        let original = sample_sessions();
        save_sessions_to(&path, &original).unwrap();

        let loaded = load_sessions_from(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, original[0].id);
        assert_eq!(loaded[0].title, original[0].title);
        assert_eq!(loaded[0].messages.len(), 2);
        assert_eq!(loaded[0].messages[1].content, original[0].messages[1].content);
        assert_eq!(loaded[1].created_at, original[1].created_at);
    }

    #[test]
    fn load_missing_file_is_empty_list() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nope").join("sessions.json");
        let loaded = load_sessions_from(&path).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn save_is_atomic() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sessions.json");

        save_sessions_to(&path, &sample_sessions()).unwrap();

        assert!(path.exists());
        assert!(
            !path.with_extension("json.tmp").exists(),
            "tmp file should not survive a successful save"
        );
    }

    #[test]
    fn save_overwrites_previous_list() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sessions.json");

        save_sessions_to(&path, &sample_sessions()).unwrap();
        let mut shorter = sample_sessions();
        shorter.truncate(1);
        save_sessions_to(&path, &shorter).unwrap();

        let loaded = load_sessions_from(&path).unwrap();
        assert_eq!(loaded.len(), 1);
    }
}
