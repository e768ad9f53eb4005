// ABOUTME: Integration tests for the delta → extract → merge pipeline.
// ABOUTME: Drives full turns through the controller without a server.

use atelier::app::{App, TurnEvent, TurnOutcome};
use atelier::config::Settings;
use atelier::workspace::extract_files;

fn test_app(tmp: &tempfile::TempDir) -> App {
    let mut settings = Settings::default();
    settings.model = "llama3:8b".to_string();
    App::new(settings, Vec::new(), tmp.path().join("sessions.json"))
}

fn feed(app: &mut App, session_id: &str, text: &str) -> TurnOutcome {
    app.handle_turn_event(TurnEvent::Delta {
        session_id: session_id.to_string(),
        text: text.to_string(),
    })
}

fn complete(app: &mut App, session_id: &str) -> TurnOutcome {
    app.handle_turn_event(TurnEvent::Completed {
        session_id: session_id.to_string(),
    })
}

#[test]
fn chunked_stream_converges_to_direct_extraction() {
    let tmp = tempfile::tempdir().unwrap();
    let mut app = test_app(&tmp);

    let document = "Here are your files:\n\
        <file path=\"index.html\">\n<html><body>hi</body></html>\n</file>\n\
        Some commentary.\n\
        <file path=\"app.js\">\nconsole.log('hi');\n</file>\n\
        Done!";

    let (sid, _) = app.start_turn("make a tiny site").unwrap();

    // Deliver the document in awkward little chunks, as a model would.
    let chunks: Vec<String> = document
        .as_bytes()
        .chunks(7)
        .map(|c| String::from_utf8(c.to_vec()).unwrap())
        .collect();
    for chunk in &chunks {
        feed(&mut app, &sid, chunk);
    }
    complete(&mut app, &sid);

    // The workspace must equal a direct extraction of the whole document.
    let direct = extract_files(document);
    assert_eq!(app.workspace().files().len(), direct.len());
    for expected in &direct {
        let actual = app.workspace().file(&expected.path).unwrap();
        assert_eq!(actual.content, expected.content);
    }
    assert_eq!(
        app.workspace().file("index.html").unwrap().content,
        "<html><body>hi</body></html>"
    );
    assert_eq!(app.workspace().file("index.html").unwrap().language, "html");
}

#[test]
fn in_progress_file_is_visible_mid_stream() {
    let tmp = tempfile::tempdir().unwrap();
    let mut app = test_app(&tmp);

    let (sid, _) = app.start_turn("make x.js").unwrap();
    feed(&mut app, &sid, "<file path=\"x.js\">cons");

    // Visible live, content untrimmed and provisional.
    assert_eq!(app.workspace().file("x.js").unwrap().content, "cons");

    feed(&mut app, &sid, "ole.log(1)</file>");
    assert_eq!(
        app.workspace().file("x.js").unwrap().content,
        "console.log(1)"
    );
}

#[test]
fn workspace_files_survive_across_turns_in_one_session() {
    let tmp = tempfile::tempdir().unwrap();
    let mut app = test_app(&tmp);

    let (sid, _) = app.start_turn("make two files").unwrap();
    feed(
        &mut app,
        &sid,
        "<file path=\"a.py\">print(1)</file><file path=\"b.py\">print(2)</file>",
    );
    complete(&mut app, &sid);

    // Second turn only re-emits a.py; b.py must survive untouched.
    let (sid, _) = app.start_turn("tweak a.py").unwrap();
    feed(&mut app, &sid, "<file path=\"a.py\">print(\"one\")</file>");
    complete(&mut app, &sid);

    let paths: Vec<&str> = app
        .workspace()
        .files()
        .iter()
        .map(|f| f.path.as_str())
        .collect();
    assert_eq!(paths, vec!["a.py", "b.py"]);
    assert_eq!(app.workspace().file("a.py").unwrap().content, "print(\"one\")");
    assert_eq!(app.workspace().file("b.py").unwrap().content, "print(2)");
}

#[test]
fn stale_deltas_after_session_switch_do_not_corrupt_state() {
    let tmp = tempfile::tempdir().unwrap();
    let mut app = test_app(&tmp);

    let (old_sid, _) = app.start_turn("make a.py").unwrap();
    feed(&mut app, &old_sid, "<file path=\"a.py\">print(");

    // User opens a fresh chat while the old stream is still producing.
    app.new_chat();
    let new_sid = app.store().active_id().unwrap().to_string();

    // Late deltas from the old stream arrive and must change nothing.
    assert_eq!(
        feed(&mut app, &old_sid, "1)</file>"),
        TurnOutcome::Discarded
    );
    assert!(app.workspace().is_empty());
    assert!(app.store().session(&new_sid).unwrap().messages.is_empty());

    // The old session keeps exactly what had streamed before the switch.
    let old = app.store().session(&old_sid).unwrap();
    assert_eq!(old.messages[1].content, "<file path=\"a.py\">print(");
}

#[test]
fn failed_stream_keeps_partial_content_and_appends_notice() {
    let tmp = tempfile::tempdir().unwrap();
    let mut app = test_app(&tmp);

    let (sid, _) = app.start_turn("hello").unwrap();
    feed(&mut app, &sid, "The answer is");

    let outcome = app.handle_turn_event(TurnEvent::Failed {
        session_id: sid.clone(),
        error: "connection reset by peer".to_string(),
    });
    assert_eq!(
        outcome,
        TurnOutcome::Failed("connection reset by peer".to_string())
    );

    let session = app.store().session(&sid).unwrap();
    assert_eq!(session.messages[1].content, "The answer is");
    assert_eq!(
        session.messages[2].content,
        atelier::session::STREAM_FAILURE_NOTICE
    );
    assert!(!app.is_streaming());
}

#[test]
fn persisted_sessions_reload_into_a_fresh_app() {
    let tmp = tempfile::tempdir().unwrap();
    let sessions_file = tmp.path().join("sessions.json");

    {
        let mut app = test_app(&tmp);
        let (sid, _) = app.start_turn("make a.py").unwrap();
        feed(&mut app, &sid, "<file path=\"a.py\">print(1)</file>");
        complete(&mut app, &sid);
    }

    let sessions = atelier::session::persistence::load_sessions_from(&sessions_file).unwrap();
    assert_eq!(sessions.len(), 1);

    let mut settings = Settings::default();
    settings.model = "llama3:8b".to_string();
    let mut app = App::new(settings, sessions, sessions_file);

    // Nothing active after a reload; selecting and rescanning re-derives the
    // workspace from the stored assistant message.
    assert!(app.store().active_id().is_none());
    let sid = app.store().sessions()[0].id.clone();
    assert!(app.switch_session(&sid));
    assert_eq!(app.rescan(), 1);
    assert_eq!(app.workspace().file("a.py").unwrap().content, "print(1)");
}

#[test]
fn archive_entries_are_ordered_and_relative() {
    let tmp = tempfile::tempdir().unwrap();
    let mut app = test_app(&tmp);

    let (sid, _) = app.start_turn("make files").unwrap();
    feed(
        &mut app,
        &sid,
        "<file path=\"/src/main.rs\">fn main() {}</file><file path=\"README.md\"># demo</file>",
    );
    complete(&mut app, &sid);

    let entries = app.workspace().archive_entries();
    assert_eq!(
        entries,
        vec![
            ("src/main.rs".to_string(), "fn main() {}".to_string()),
            ("README.md".to_string(), "# demo".to_string()),
        ]
    );
}
