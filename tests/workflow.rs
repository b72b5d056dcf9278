#![cfg(unix)]

use sedshell::config::{CorruptPolicy, open_store};
use sedshell::env::Environment;
use sedshell::io_adapters::ScriptedOperator;
use sedshell::{BindingStore, FileStore, Session, SessionEnd, ShellExecutor};
use std::fs;
use std::io::Cursor;
use std::path::Path;

fn executor() -> ShellExecutor {
    ShellExecutor::new(Environment::new(), None).expect("sh on PATH")
}

fn touch(dir: &Path, names: &[&str]) -> String {
    let mut input = String::new();
    for name in names {
        let path = dir.join(name);
        fs::write(&path, name).unwrap();
        input.push_str(&format!("{}\n", path.display()));
    }
    input
}

#[test]
fn run_once_promote_to_key_and_reuse_across_runs() {
    let work = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let bindings = config.path().join("bindings");

    let input = touch(work.path(), &["a.jpg", "b.jpg"]);
    let operator = ScriptedOperator::new().key('!').text("rm").keys(">dd");
    let mut session = Session::new(FileStore::load(&bindings).unwrap(), executor(), operator);
    let summary = session.run(Cursor::new(input)).unwrap();

    assert_eq!(summary.end, SessionEnd::Exhausted);
    assert_eq!(summary.commands_run, 2);
    assert!(!work.path().join("a.jpg").exists());
    assert!(!work.path().join("b.jpg").exists());
    assert_eq!(session.operator().remaining(), 0);

    // a later run knows `d` without being taught again
    let input = touch(work.path(), &["c.jpg", "keep me.jpg"]);
    let operator = ScriptedOperator::new().keys("d ");
    let store = FileStore::load(&bindings).unwrap();
    assert_eq!(store.get('d').unwrap().template.as_str(), "rm");
    let mut session = Session::new(store, executor(), operator);
    session.run(Cursor::new(input)).unwrap();

    assert!(!work.path().join("c.jpg").exists());
    assert!(work.path().join("keep me.jpg").exists());
}

#[test]
fn placeholder_and_awkward_names() {
    let work = tempfile::tempdir().unwrap();
    let done = work.path().join("done");
    fs::create_dir(&done).unwrap();
    let input = touch(work.path(), &["it's a \"photo\".jpg"]);

    let template = format!("mv {{}} '{}'/", done.display());
    let operator = ScriptedOperator::new().key('!').text(template);
    let mut session = Session::new(sedshell::MemoryStore::new(), executor(), operator);
    session.run(Cursor::new(input)).unwrap();

    assert!(done.join("it's a \"photo\".jpg").exists());
}

#[test]
fn unbound_key_spawns_nothing() {
    let work = tempfile::tempdir().unwrap();
    let config = tempfile::tempdir().unwrap();
    let bindings = config.path().join("bindings");
    let input = touch(work.path(), &["a.jpg"]);

    let operator = ScriptedOperator::new().keys("x ");
    let mut session = Session::new(FileStore::load(&bindings).unwrap(), executor(), operator);
    let summary = session.run(Cursor::new(input)).unwrap();

    assert_eq!(summary.commands_run, 0);
    assert!(work.path().join("a.jpg").exists());
    assert!(!bindings.exists());
    assert!(session.operator().transcript().contains("No binding for x"));
}

#[test]
fn failing_command_is_reported_and_session_continues() {
    let operator = ScriptedOperator::new().key('!').text("ls /no/such/dir").key(' ');
    let mut session = Session::new(sedshell::MemoryStore::new(), executor(), operator);
    let summary = session.run(Cursor::new("one\ntwo\n")).unwrap();

    assert_eq!(summary.end, SessionEnd::Exhausted);
    assert_eq!(summary.lines_prompted, 2);
    assert!(session.operator().transcript().contains("[exit status"));
}

#[test]
fn corrupt_binding_file_starts_empty_and_keeps_old_file() {
    let config = tempfile::tempdir().unwrap();
    let bindings = config.path().join("bindings");
    fs::write(&bindings, "d\t!\trm\nbroken record\n").unwrap();

    assert!(open_store(&bindings, CorruptPolicy::Abort).is_err());

    let opened = open_store(&bindings, CorruptPolicy::Empty).unwrap();
    let recovered = opened.recovered.expect("corruption is reported");
    assert!(recovered.error.to_string().contains(":2:"));

    let operator = ScriptedOperator::new().key('&').text("true").keys(">t ");
    let mut session = Session::new(opened.store, executor(), operator);
    session.run(Cursor::new("line\n")).unwrap();

    assert_eq!(fs::read_to_string(&bindings).unwrap(), "t\t&\ttrue\n");
    assert_eq!(
        fs::read_to_string(recovered.moved_to).unwrap(),
        "d\t!\trm\nbroken record\n"
    );
}
