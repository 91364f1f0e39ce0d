/// Interpreter integration tests: document in, typed input and ticks through, rendered slices out.

use phosphor_engine::core::dispatch::LAST_COMMAND;
use phosphor_engine::core::executor::{ActionError, Signal};
use phosphor_engine::core::format::{FormatError, MissingPolicy};
use phosphor_engine::core::reveal::LifecycleEvent;
use phosphor_engine::core::rule::UNAMBIGUOUS;
use phosphor_engine::core::store::{Snapshot, StoreError};
use phosphor_engine::schema::action::{Command, SingleAction};
use phosphor_engine::schema::content::LoadState;
use phosphor_engine::schema::document::{DialogType, Document};
use phosphor_engine::schema::value::Value;
use phosphor_engine::{Interpreter, InterpreterError};
use std::time::Duration;

const DOCUMENT: &str = "tests/fixtures/airlock.json";
const CONFIG: &str = "tests/fixtures/interpreter.ron";

fn airlock() -> Interpreter {
    let mut interpreter = Interpreter::builder()
        .document_file(DOCUMENT)
        .config_file(CONFIG)
        .build()
        .unwrap();
    interpreter.start().unwrap();
    interpreter
}

/// Log in as `name` and land on the fully revealed menu.
fn logged_in(name: &str) -> Interpreter {
    let mut interpreter = airlock();
    interpreter.skip_reveal().unwrap();
    let outcome = interpreter.submit(name).unwrap();
    assert_eq!(outcome.target(), Some("menu"));
    interpreter
}

fn text(interpreter: &Interpreter, id: &str) -> String {
    interpreter.render(id).unwrap().slice.revealed
}

#[test]
fn builds_from_fixture_files() {
    let interpreter = airlock();
    assert_eq!(interpreter.document().metadata.title, "Airlock Terminal");
    assert_eq!(interpreter.columns(), 40);
    assert_eq!(interpreter.cursor_glyph(), '_');
    assert_eq!(interpreter.current_screen_id(), Some("login"));

    // declared defaults are in place
    assert_eq!(interpreter.store().get("attempts"), Some(&Value::Number(0.0)));
    assert_eq!(interpreter.store().get("sealed"), Some(&Value::Bool(true)));
}

#[test]
fn load_time_variable_item_mints_a_passphrase() {
    let interpreter = airlock();
    assert_eq!(interpreter.state("mint"), Some(LoadState::Done));

    let passphrase = interpreter
        .store()
        .get("passphrase")
        .and_then(Value::as_str)
        .unwrap()
        .to_string();
    assert_eq!(passphrase.len(), 9);
    assert_ne!(passphrase, "EEEE-EEEE");
    assert_eq!(passphrase.chars().nth(4), Some('-'));
    assert!(passphrase
        .chars()
        .filter(|&c| c != '-')
        .all(|c| UNAMBIGUOUS.contains(&(c as u8))));
}

#[test]
fn seeded_interpreters_agree() {
    let a = airlock();
    let b = airlock();
    assert_eq!(a.store().get("passphrase"), b.store().get("passphrase"));
}

#[test]
fn banner_reveals_over_ticks_then_the_rest_follows() {
    let mut interpreter = airlock();
    assert_eq!(interpreter.state("banner"), Some(LoadState::Active));
    assert_eq!(interpreter.state("rule"), Some(LoadState::Ready));
    assert_eq!(interpreter.state("login-prompt"), Some(LoadState::Ready));

    // centered in 40 columns: 12 leading blanks, then the 15 letters
    let first = interpreter.render("banner").unwrap();
    assert_eq!(first.slice.revealed, "");
    assert_eq!(first.slice.cursor, ' ');

    let events = interpreter.tick().unwrap();
    assert_eq!(
        events,
        vec![LifecycleEvent::Revealed {
            id: "banner".into(),
            count: 4
        }]
    );
    for _ in 0..5 {
        interpreter.tick().unwrap();
    }
    assert_eq!(interpreter.render("banner").unwrap().slice.cursor, 'R');

    let events = interpreter.tick().unwrap();
    assert!(events.contains(&LifecycleEvent::Done("banner".into())));
    assert!(events.contains(&LifecycleEvent::Done("login-prompt".into())));

    let banner = interpreter.render("banner").unwrap();
    assert_eq!(banner.slice.revealed, "            AIRLOCK CONTROL");
    assert_eq!(banner.slice.cursor, '_');
    assert_eq!(banner.slice.hidden, "");
    assert_eq!(text(&interpreter, "rule"), "=".repeat(40));
    assert_eq!(text(&interpreter, "login-3"), "Enter your name.");
}

#[test]
fn skip_reveal_finishes_everything() {
    let mut interpreter = airlock();
    interpreter.skip_reveal().unwrap();
    for item in interpreter.render_screen().unwrap() {
        assert_eq!(item.state, LoadState::Done, "{} not done", item.id);
    }
    // the variable item is not rendered
    let ids: Vec<_> = interpreter
        .render_screen()
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["banner", "rule", "login-3", "login-prompt"]);
}

#[test]
fn typed_name_is_stored_and_greeted() {
    let interpreter = logged_in("Sonya");
    assert_eq!(interpreter.current_screen_id(), Some("menu"));
    assert_eq!(interpreter.store().get("username"), Some(&Value::from("Sonya")));
    assert_eq!(interpreter.store().get(LAST_COMMAND), Some(&Value::from("Sonya")));
    assert_eq!(text(&interpreter, "greeting"), "Welcome, Sonya.");
}

#[test]
fn help_opens_a_dialog_without_leaving_the_screen() {
    let mut interpreter = airlock();
    let outcome = interpreter.submit("HELP").unwrap();
    assert!(outcome.matched);
    assert_eq!(outcome.signals, vec![Signal::Dialog("help".into())]);
    assert_eq!(interpreter.current_screen_id(), Some("login"));
    // literal commands win over the catch-all regex after them
    assert!(interpreter.store().get("username").and_then(Value::as_str) == Some(""));

    let dialog = interpreter.dialog().unwrap();
    assert_eq!(dialog.kind, DialogType::Alert);
    assert_eq!(dialog.content, vec!["Type your name to log in."]);
    assert_eq!(interpreter.dismiss_dialog(), Some("help".to_string()));
    assert!(interpreter.dialog().is_none());
}

#[test]
fn back_returns_to_login() {
    let mut interpreter = logged_in("Sonya");
    let outcome = interpreter.dispatch("menu", "  BACK ").unwrap();
    assert_eq!(outcome.target(), Some("login"));
    assert_eq!(interpreter.current_screen_id(), Some("login"));
}

#[test]
fn sealed_door_opens_for_sonya_in_any_case() {
    let mut interpreter = logged_in("SONYA");
    let outcome = interpreter.submit("open").unwrap();
    assert_eq!(outcome.target(), Some("open"));
    assert_eq!(interpreter.store().get("sealed"), Some(&Value::Bool(false)));

    let passphrase = interpreter.store().get("passphrase").unwrap().to_string();
    assert_eq!(text(&interpreter, "pass"), format!("PASS {}", passphrase));
}

#[test]
fn door_stays_shut_for_anyone_else() {
    let mut interpreter = logged_in("bob");
    let outcome = interpreter.submit("open").unwrap();
    assert_eq!(outcome.target(), Some("denied"));
    assert_eq!(interpreter.current_screen_id(), Some("menu"));
    assert_eq!(interpreter.store().get("attempts"), Some(&Value::Number(1.0)));
    assert_eq!(interpreter.store().get("sealed"), Some(&Value::Bool(true)));
    assert_eq!(interpreter.dialog().unwrap().content, vec!["ACCESS DENIED"]);
}

#[test]
fn failing_chain_keeps_earlier_writes_and_the_screen() {
    let mut interpreter = logged_in("Sonya");
    let err = interpreter.submit("break").unwrap_err();
    assert!(matches!(
        err,
        InterpreterError::Action(ActionError::Store(StoreError::InvalidOperand { .. }))
    ));
    assert_eq!(interpreter.store().get("attempts"), Some(&Value::Number(9.0)));
    assert_eq!(interpreter.current_screen_id(), Some("menu"));
}

#[test]
fn unmatched_input_changes_nothing() {
    let mut interpreter = logged_in("Sonya");
    let outcome = interpreter.submit("dance").unwrap();
    assert!(!outcome.matched);
    assert!(outcome.target().is_none());
    assert_eq!(interpreter.store().get(LAST_COMMAND), Some(&Value::from("Sonya")));
    assert_eq!(interpreter.current_screen_id(), Some("menu"));
}

#[test]
fn regex_command_concatenates_the_typed_line() {
    let mut interpreter = logged_in("Sonya");
    interpreter.submit("NOTE hatch stuck").unwrap();
    assert_eq!(
        interpreter.store().get("log"),
        Some(&Value::from("NOTE hatch stuck"))
    );
    // full match only
    assert!(!interpreter.submit("notes").unwrap().matched);
}

#[test]
fn toggle_command_cycles_state_text() {
    let mut interpreter = logged_in("Sonya");
    assert_eq!(text(&interpreter, "pressure"), "[ ] PRESSURIZE");
    interpreter.submit("pressure").unwrap();
    assert_eq!(interpreter.toggles().active("pressure"), Some(1));
    assert_eq!(text(&interpreter, "pressure"), "[x] PRESSURIZE");
    assert_eq!(interpreter.flip_toggle("pressure"), Some(0));
    assert_eq!(text(&interpreter, "pressure"), "[ ] PRESSURIZE");
    assert_eq!(interpreter.flip_toggle("nope"), None);
}

#[test]
fn link_and_shift_link() {
    let mut interpreter = logged_in("Sonya");

    let signals = interpreter.follow_link("to-logs", true).unwrap();
    assert_eq!(signals, vec![Signal::Dialog("restricted".into())]);
    assert_eq!(interpreter.current_screen_id(), Some("menu"));
    assert_eq!(interpreter.dialog().unwrap().kind, DialogType::Dialog);

    let signals = interpreter.follow_link("to-logs", false).unwrap();
    assert_eq!(signals, vec![Signal::Navigate("logs".into())]);
    assert_eq!(interpreter.current_screen_id(), Some("logs"));

    assert!(matches!(
        interpreter.follow_link("greeting", false),
        Err(InterpreterError::UnknownItem { .. })
    ));
}

#[test]
fn styled_runs_reveal_inside_spans() {
    let mut interpreter = logged_in("Sonya");
    interpreter.follow_link("to-logs", false).unwrap();
    assert_eq!(interpreter.state("entry"), Some(LoadState::Active));
    assert_eq!(interpreter.state("logs-back"), Some(LoadState::Ready));

    interpreter.tick().unwrap();
    let entry = interpreter.render("entry").unwrap();
    assert_eq!(entry.slice.revealed, "<span class=\"warn\">NO </span>");
    assert_eq!(entry.slice.cursor, 'L');
    assert_eq!(entry.slice.hidden, "OGS since Sonya");

    interpreter.skip_reveal().unwrap();
    assert_eq!(
        text(&interpreter, "entry"),
        "<span class=\"warn\">NO LOGS</span> since Sonya"
    );
    assert_eq!(text(&interpreter, "logs-back"), "&lt; BACK");
}

#[test]
fn snapshot_survives_ron_and_restores() {
    let mut interpreter = logged_in("Sonya");
    let saved = interpreter.snapshot().to_ron().unwrap();

    interpreter.store_mut().set("username", "mallory");
    interpreter.store_mut().set("attempts", 3.0);

    let snapshot = Snapshot::from_ron(&saved).unwrap();
    interpreter.restore(&snapshot);
    assert_eq!(interpreter.store().get("username"), Some(&Value::from("Sonya")));
    assert_eq!(interpreter.store().get("attempts"), Some(&Value::Number(0.0)));
}

#[test]
fn columns_clamp_to_document_bounds() {
    let mut interpreter = Interpreter::builder()
        .document_file(DOCUMENT)
        .config_file(CONFIG)
        .columns(10)
        .build()
        .unwrap();
    assert_eq!(interpreter.columns(), 20);
    assert_eq!(interpreter.set_columns(100), 60);
    assert_eq!(interpreter.set_columns(33), 33);

    interpreter.start().unwrap();
    interpreter.skip_reveal().unwrap();
    assert_eq!(text(&interpreter, "rule"), "=".repeat(33));
}

#[test]
fn countdown_shows_remaining_time() {
    let interpreter = logged_in("Sonya");
    assert_eq!(
        interpreter.countdown("timer", Duration::from_secs(90)).unwrap(),
        "T-MINUS 08:30"
    );
    assert!(interpreter.countdown("greeting", Duration::ZERO).is_err());
}

#[test]
fn meta_commands_run_before_the_screen_table() {
    let mut interpreter = Interpreter::builder()
        .document_file(DOCUMENT)
        .seed(5)
        .meta_commands(vec![Command::literal(
            &["sudo"],
            SingleAction::set("admin", true),
        )])
        .build()
        .unwrap();
    interpreter.start().unwrap();

    let outcome = interpreter.submit("sudo").unwrap();
    assert!(outcome.matched);
    assert_eq!(interpreter.store().get("admin"), Some(&Value::Bool(true)));
    assert_eq!(interpreter.current_screen_id(), Some("login"));

    // the menu prompt does not allow them
    interpreter.submit("Sonya").unwrap();
    assert!(!interpreter.submit("sudo").unwrap().matched);
}

#[test]
fn missing_variables_follow_the_configured_policy() {
    let doc = r#"{ "screens": [ { "id": "s", "content": [
        { "type": "text", "id": "t", "text": "[{{ghost}}]" }
    ] } ] }"#;

    // the fixture config asks for empty substitution
    let mut interpreter = Interpreter::builder()
        .document(Document::parse_json(doc).unwrap())
        .config_file(CONFIG)
        .build()
        .unwrap();
    interpreter.start().unwrap();
    assert_eq!(text(&interpreter, "t"), "[]");

    let mut interpreter = Interpreter::builder()
        .document(Document::parse_json(doc).unwrap())
        .build()
        .unwrap();
    interpreter.start().unwrap();
    assert_eq!(text(&interpreter, "t"), "[{{ghost}}]");

    let mut interpreter = Interpreter::builder()
        .document(Document::parse_json(doc).unwrap())
        .missing_variables(MissingPolicy::Fail)
        .build()
        .unwrap();
    assert!(matches!(
        interpreter.start(),
        Err(InterpreterError::Format(FormatError::MissingVariable(name))) if name == "ghost"
    ));
}

#[test]
fn password_items_are_masked() {
    let doc = r#"{ "screens": [ { "id": "s", "content": [
        { "type": "text", "id": "pw", "text": "hunter2", "textOpts": { "isPassword": true } }
    ] } ] }"#;
    let mut interpreter = Interpreter::builder()
        .document(Document::parse_json(doc).unwrap())
        .build()
        .unwrap();
    interpreter.start().unwrap();
    assert_eq!(text(&interpreter, "pw"), "*******");
}

#[test]
fn builder_rejects_bad_setups() {
    assert!(matches!(
        Interpreter::builder().build(),
        Err(InterpreterError::NoDocument)
    ));

    let empty = Document::parse_json(r#"{ "screens": [] }"#).unwrap();
    assert!(matches!(
        Interpreter::builder().document(empty).build(),
        Err(InterpreterError::NoScreens)
    ));

    let mut interpreter = airlock();
    assert!(matches!(
        interpreter.activate("nowhere"),
        Err(InterpreterError::UnknownScreen(id)) if id == "nowhere"
    ));
    assert_eq!(interpreter.current_screen_id(), Some("login"));
}
