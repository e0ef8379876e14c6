//! `relaylog archive`: one-shot archive of a log directory, blocking until done.

use crate::archive::{ArchiveOutcome, ArchiveRequest, LogArchiver};
use crate::config::Config;
use crate::internal;
use crate::record::now_ms;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc;

#[must_use]
pub fn cmd_archive(
    config: &Config,
    source: Option<PathBuf>,
    target: Option<PathBuf>,
    keep: bool,
) -> ExitCode {
    let source = source.unwrap_or_else(|| {
        PathBuf::from(shellexpand::tilde(&config.archive.source_dir).as_ref())
    });
    if !source.is_dir() {
        internal::error(
            "ARCHIVE",
            &format!("Not a directory: {}", source.display()),
        );
        return ExitCode::FAILURE;
    }
    let target = target.unwrap_or_else(|| {
        let ymd = chrono::Utc::now().format("%Y-%m-%d");
        source.join(format!("archive.{ymd}.{}.tar.gz", now_ms()))
    });
    let should_delete = config.archive.should_delete_logs && !keep;

    let (tx, rx) = mpsc::channel();
    let request = ArchiveRequest::new(&target, should_delete)
        .source_dir(&source)
        .ignore(|path| path.extension().is_some_and(|ext| ext == "gz"))
        .on_complete(move |outcome| {
            let _ = tx.send(outcome);
        });

    LogArchiver::new().archive(request);

    match rx.recv() {
        Ok(ArchiveOutcome::Done) => {
            println!("{}", target.display());
            ExitCode::SUCCESS
        }
        Ok(ArchiveOutcome::Busy) => {
            internal::warn("ARCHIVE", "Archiver busy");
            ExitCode::FAILURE
        }
        Ok(ArchiveOutcome::Failed(e)) => {
            internal::error("ARCHIVE", &format!("{e}"));
            ExitCode::FAILURE
        }
        Err(_) => {
            internal::error("ARCHIVE", "Archive worker exited without a result");
            ExitCode::FAILURE
        }
    }
}
