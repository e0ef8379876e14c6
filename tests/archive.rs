//! Tests for log directory archiving.

use flate2::read::GzDecoder;
use relaylog::archive::ARCHIVE_FILE_MODE;
use relaylog::{ArchiveOutcome, ArchiveRequest, Error, LogArchiver};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::sync::mpsc;
use std::time::Duration;
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(10);

/// Archive entries by name, with contents and mode.
fn read_archive(path: &Path) -> BTreeMap<String, (String, u32)> {
    let mut archive = tar::Archive::new(GzDecoder::new(File::open(path).unwrap()));
    let mut entries = BTreeMap::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let name = entry.path().unwrap().to_string_lossy().into_owned();
        let mode = entry.header().mode().unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        entries.insert(name, (content, mode));
    }
    entries
}

fn run(archiver: &LogArchiver, request: ArchiveRequest) -> ArchiveOutcome {
    let (tx, rx) = mpsc::channel();
    let started = archiver.archive(request.on_complete(move |outcome| {
        let _ = tx.send(outcome);
    }));
    let outcome = rx.recv_timeout(WAIT).unwrap();
    assert_eq!(started, !matches!(outcome, ArchiveOutcome::Busy));
    outcome
}

fn log_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("app.2024-03-10.1.00.log"), "a1\na2\n").unwrap();
    fs::write(temp.path().join("app.2024-03-10.1.01.log"), "b1\n").unwrap();
    fs::write(temp.path().join("err.log"), "boom\n").unwrap();
    fs::write(temp.path().join("old.tar.gz"), "not really gzip").unwrap();
    temp
}

#[test]
fn archives_then_deletes_and_clears() {
    let source = log_dir();
    let out = TempDir::new().unwrap();
    let target = out.path().join("archive.tar.gz");

    let request = ArchiveRequest::new(&target, true)
        .source_dir(source.path())
        .ignore(|p| p.extension().is_some_and(|ext| ext == "gz"))
        .clear(|p| p.ends_with("err.log"));
    let outcome = run(&LogArchiver::new(), request);
    assert!(outcome.is_done(), "{outcome:?}");

    let entries = read_archive(&target);
    assert_eq!(
        entries.keys().cloned().collect::<Vec<_>>(),
        vec![
            "app.2024-03-10.1.00.log",
            "app.2024-03-10.1.01.log",
            "err.log",
        ]
    );
    assert_eq!(entries["app.2024-03-10.1.00.log"].0, "a1\na2\n");
    assert_eq!(entries["err.log"].0, "boom\n");
    assert!(entries.values().all(|(_, mode)| *mode == ARCHIVE_FILE_MODE));

    assert!(!source.path().join("app.2024-03-10.1.00.log").exists());
    assert!(!source.path().join("app.2024-03-10.1.01.log").exists());
    assert_eq!(fs::read_to_string(source.path().join("err.log")).unwrap(), "");
    assert!(source.path().join("old.tar.gz").exists());
}

#[test]
fn keep_leaves_sources_in_place() {
    let source = log_dir();
    let out = TempDir::new().unwrap();
    let target = out.path().join("keep.tar.gz");

    let request = ArchiveRequest::new(&target, false).source_dir(source.path());
    assert!(run(&LogArchiver::new(), request).is_done());

    assert_eq!(read_archive(&target).len(), 4);
    assert_eq!(
        fs::read_to_string(source.path().join("app.2024-03-10.1.00.log")).unwrap(),
        "a1\na2\n"
    );
}

#[test]
fn delete_predicate_overrides_default() {
    let source = log_dir();
    let out = TempDir::new().unwrap();
    let target = out.path().join("partial.tar.gz");

    let request = ArchiveRequest::new(&target, true)
        .source_dir(source.path())
        .ignore(|p| p.ends_with("old.tar.gz"))
        .delete(|p| p.ends_with("err.log").then_some(false));
    assert!(run(&LogArchiver::new(), request).is_done());

    assert!(source.path().join("err.log").exists());
    assert!(!source.path().join("app.2024-03-10.1.01.log").exists());
}

#[test]
fn nested_directories_keep_relative_names() {
    let source = TempDir::new().unwrap();
    fs::create_dir_all(source.path().join("worker")).unwrap();
    fs::write(source.path().join("worker").join("w.log"), "w\n").unwrap();
    fs::write(source.path().join("main.log"), "m\n").unwrap();
    let out = TempDir::new().unwrap();
    let target = out.path().join("nested.tar.gz");

    let request = ArchiveRequest::new(&target, false).source_dir(source.path());
    assert!(run(&LogArchiver::new(), request).is_done());

    let names: Vec<String> = read_archive(&target).into_keys().collect();
    assert_eq!(names, vec!["main.log", "worker/w.log"]);
}

#[test]
fn entries_whitelist_replaces_walk() {
    let source = log_dir();
    let out = TempDir::new().unwrap();
    let target = out.path().join("listed.tar.gz");

    let request = ArchiveRequest::new(&target, false)
        .source_dir(source.path())
        .entries(["err.log"]);
    assert!(run(&LogArchiver::new(), request).is_done());

    let names: Vec<String> = read_archive(&target).into_keys().collect();
    assert_eq!(names, vec!["err.log"]);
}

#[test]
fn target_inside_source_is_not_packed_into_itself() {
    let source = log_dir();
    let target = source.path().join("self.tar.gz");

    let request = ArchiveRequest::new(&target, false)
        .source_dir(source.path())
        .ignore(|p| p.ends_with("old.tar.gz"));
    assert!(run(&LogArchiver::new(), request).is_done());

    assert!(!read_archive(&target).contains_key("self.tar.gz"));
}

#[test]
fn missing_source_fails_without_leaving_target() {
    let out = TempDir::new().unwrap();
    let target = out.path().join("broken.tar.gz");

    let request = ArchiveRequest::new(&target, true).source_dir(out.path().join("nope"));
    let outcome = run(&LogArchiver::new(), request);

    assert!(matches!(outcome, ArchiveOutcome::Failed(Error::Archive(..))));
    assert!(!target.exists());
}

#[test]
fn second_request_while_busy_is_refused() {
    let source = log_dir();
    let out = TempDir::new().unwrap();
    let archiver = LogArchiver::new();

    let (release_tx, release_rx) = mpsc::channel::<()>();
    let (entered_tx, entered_rx) = mpsc::channel::<()>();
    let (done_tx, done_rx) = mpsc::channel();
    let blocking = ArchiveRequest::new(out.path().join("first.tar.gz"), false)
        .source_dir(source.path())
        .ignore(move |_| {
            let _ = entered_tx.send(());
            let _ = release_rx.recv_timeout(WAIT);
            false
        })
        .on_complete(move |outcome| {
            let _ = done_tx.send(outcome);
        });
    assert!(archiver.archive(blocking));
    entered_rx.recv_timeout(WAIT).unwrap();
    assert!(archiver.is_busy());

    let second = ArchiveRequest::new(out.path().join("second.tar.gz"), false)
        .source_dir(source.path());
    assert!(matches!(run(&archiver, second), ArchiveOutcome::Busy));
    assert!(!out.path().join("second.tar.gz").exists());

    drop(release_tx);
    assert!(done_rx.recv_timeout(WAIT).unwrap().is_done());
    assert!(!archiver.is_busy());

    let third = ArchiveRequest::new(out.path().join("third.tar.gz"), false)
        .source_dir(source.path());
    assert!(run(&archiver, third).is_done());
}
