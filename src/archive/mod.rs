//! Packs a log directory into a `.tar.gz` and then prunes it.
//!
//! One archive runs at a time per archiver; a second request while one is in
//! flight is refused with [`ArchiveOutcome::Busy`] instead of queueing.

use crate::Error;
use crate::internal;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Permission bits of every archived file.
pub const ARCHIVE_FILE_MODE: u32 = 0o444;

pub type PathPredicate = Box<dyn Fn(&Path) -> bool + Send>;
/// `Some(true)` delete, `Some(false)` keep, `None` fall back to the request default.
pub type DeletePredicate = Box<dyn Fn(&Path) -> Option<bool> + Send>;
pub type ArchiveCallback = Box<dyn FnOnce(ArchiveOutcome) + Send>;

/// How an archive request ended.
#[derive(Debug)]
pub enum ArchiveOutcome {
    Done,
    /// Another archive was already running; nothing was done.
    Busy,
    /// Packing failed; no source file was touched.
    Failed(Error),
}

impl ArchiveOutcome {
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// One archive job. Predicates receive the full path of each source file.
pub struct ArchiveRequest {
    pub target_file: PathBuf,
    pub should_delete_logs: bool,
    pub source_dir: PathBuf,
    pub ignore: Option<PathPredicate>,
    pub delete: Option<DeletePredicate>,
    pub clear: Option<PathPredicate>,
    /// Whitelist of paths relative to `source_dir`; replaces the directory walk.
    pub entries: Option<Vec<PathBuf>>,
    pub callback: Option<ArchiveCallback>,
}

impl ArchiveRequest {
    #[must_use]
    pub fn new(target_file: impl Into<PathBuf>, should_delete_logs: bool) -> Self {
        Self {
            target_file: target_file.into(),
            should_delete_logs,
            source_dir: PathBuf::from("./logs"),
            ignore: None,
            delete: None,
            clear: None,
            entries: None,
            callback: None,
        }
    }

    #[must_use]
    pub fn source_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.source_dir = dir.into();
        self
    }

    /// Files matching are neither archived nor touched.
    #[must_use]
    pub fn ignore(mut self, f: impl Fn(&Path) -> bool + Send + 'static) -> Self {
        self.ignore = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn delete(mut self, f: impl Fn(&Path) -> Option<bool> + Send + 'static) -> Self {
        self.delete = Some(Box::new(f));
        self
    }

    /// Files matching are archived, then truncated instead of deleted.
    #[must_use]
    pub fn clear(mut self, f: impl Fn(&Path) -> bool + Send + 'static) -> Self {
        self.clear = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn entries<I, P>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.entries = Some(entries.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn on_complete(mut self, f: impl FnOnce(ArchiveOutcome) + Send + 'static) -> Self {
        self.callback = Some(Box::new(f));
        self
    }

    fn notify(&mut self, outcome: ArchiveOutcome) {
        if let Some(callback) = self.callback.take() {
            callback(outcome);
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Disposition {
    Skip,
    Keep,
    Delete,
    Clear,
}

impl ArchiveRequest {
    /// ignore, then clear, then the delete predicate, then the default.
    fn disposition(&self, path: &Path) -> Disposition {
        if self.ignore.as_ref().is_some_and(|f| f(path)) {
            return Disposition::Skip;
        }
        if self.clear.as_ref().is_some_and(|f| f(path)) {
            return Disposition::Clear;
        }
        match self.delete.as_ref().and_then(|f| f(path)) {
            Some(true) => Disposition::Delete,
            Some(false) => Disposition::Keep,
            None if self.should_delete_logs => Disposition::Delete,
            None => Disposition::Keep,
        }
    }
}

/// Single-flight archiver. Clones share the busy flag.
#[derive(Debug, Clone, Default)]
pub struct LogArchiver {
    busy: Arc<AtomicBool>,
}

impl LogArchiver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Starts archiving on a worker thread. Returns `false`, after reporting
    /// `Busy` to the callback, when an archive is already running.
    pub fn archive(&self, mut request: ArchiveRequest) -> bool {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            internal::debug("ARCHIVE", "Archiver busy, request refused");
            request.notify(ArchiveOutcome::Busy);
            return false;
        }

        let busy = Arc::clone(&self.busy);
        // Sent after the spawn succeeds so a failed spawn can still notify the request.
        let (tx, rx) = std::sync::mpsc::channel::<ArchiveRequest>();
        let spawned = thread::Builder::new()
            .name("relaylog-archiver".into())
            .spawn(move || {
                if let Ok(request) = rx.recv() {
                    run_job(request, &busy);
                }
            });

        match spawned {
            Ok(_) => {
                // The worker owns the request from here on.
                let _ = tx.send(request);
                true
            }
            Err(e) => {
                self.busy.store(false, Ordering::Release);
                internal::error("ARCHIVE", &format!("Failed to start archive worker: {e}"));
                request.notify(ArchiveOutcome::Failed(e.into()));
                false
            }
        }
    }
}

fn run_job(mut request: ArchiveRequest, busy: &AtomicBool) {
    let target = request.target_file.clone();
    internal::debug(
        "ARCHIVE",
        &format!(
            "Archiving {} to {}",
            request.source_dir.display(),
            target.display()
        ),
    );

    let outcome = match pack(&request) {
        Ok(plan) => {
            for path in &plan.delete {
                if let Err(e) = fs::remove_file(path) {
                    internal::error(
                        "ARCHIVE",
                        &format!("Error deleting log file \"{}\": {e}", path.display()),
                    );
                }
            }
            for path in &plan.clear {
                if let Err(e) = File::create(path) {
                    internal::error(
                        "ARCHIVE",
                        &format!("Error clearing log file \"{}\": {e}", path.display()),
                    );
                }
            }
            internal::info(
                "ARCHIVE",
                &format!("Archived {} files to {}", plan.archived, target.display()),
            );
            ArchiveOutcome::Done
        }
        Err(e) => {
            internal::error("ARCHIVE", &format!("{e}"));
            let _ = fs::remove_file(&target);
            ArchiveOutcome::Failed(e)
        }
    };

    busy.store(false, Ordering::Release);
    request.notify(outcome);
}

#[derive(Debug, Default)]
struct Plan {
    archived: usize,
    delete: Vec<PathBuf>,
    clear: Vec<PathBuf>,
}

fn pack(request: &ArchiveRequest) -> Result<Plan, Error> {
    let target = &request.target_file;
    let wrap = |e: std::io::Error| Error::Archive(target.clone(), e.to_string());

    if let Some(parent) = target.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(wrap)?;
    }
    let output = File::create(target).map_err(wrap)?;
    let target_canonical = fs::canonicalize(target).map_err(wrap)?;

    let sources = match &request.entries {
        Some(entries) => entries.iter().map(|e| request.source_dir.join(e)).collect(),
        None => collect_files(&request.source_dir).map_err(wrap)?,
    };

    let encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let mut plan = Plan::default();

    for path in sources {
        if fs::canonicalize(&path).is_ok_and(|p| p == target_canonical) {
            continue;
        }
        let disposition = request.disposition(&path);
        if disposition == Disposition::Skip {
            continue;
        }

        // Read whole: the file may still be growing while it is packed.
        let data = fs::read(&path).map_err(wrap)?;
        let name = path.strip_prefix(&request.source_dir).unwrap_or(&path);
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(ARCHIVE_FILE_MODE);
        header.set_entry_type(tar::EntryType::Regular);
        if let Ok(modified) = fs::metadata(&path).and_then(|m| m.modified())
            && let Ok(since_epoch) = modified.duration_since(std::time::UNIX_EPOCH)
        {
            header.set_mtime(since_epoch.as_secs());
        }
        builder
            .append_data(&mut header, name, data.as_slice())
            .map_err(wrap)?;
        plan.archived += 1;

        match disposition {
            Disposition::Delete => plan.delete.push(path),
            Disposition::Clear => plan.clear.push(path),
            Disposition::Keep | Disposition::Skip => {}
        }
    }

    let mut writer = builder
        .into_inner()
        .and_then(GzEncoder::finish)
        .map_err(wrap)?;
    writer.flush().map_err(wrap)?;
    Ok(plan)
}

/// Regular files under `dir`, depth first, sorted by name at every level.
fn collect_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    entries.sort();

    let mut files = Vec::new();
    for path in entries {
        if path.is_dir() {
            files.extend(collect_files(&path)?);
        } else if path.is_file() {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_precedence() {
        let request = ArchiveRequest::new("out.tar.gz", true)
            .ignore(|p| p.ends_with("skip.log"))
            .clear(|p| p.ends_with("err.log") || p.ends_with("skip.log"))
            .delete(|p| p.ends_with("keep.log").then_some(false));

        assert_eq!(request.disposition(Path::new("skip.log")), Disposition::Skip);
        assert_eq!(request.disposition(Path::new("err.log")), Disposition::Clear);
        assert_eq!(request.disposition(Path::new("keep.log")), Disposition::Keep);
        assert_eq!(request.disposition(Path::new("other.log")), Disposition::Delete);

        let keep_all = ArchiveRequest::new("out.tar.gz", false);
        assert_eq!(keep_all.disposition(Path::new("other.log")), Disposition::Keep);
    }
}
