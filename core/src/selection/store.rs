use fs2::FileExt;
use log::{debug, info};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use super::record::DecisionRecord;
use crate::error::{NeuroselError, Result};

/// File name of the persisted record inside a subject directory
pub const RECORD_FILE_NAME: &str = "decision.txt";

const LOCK_FILE_NAME: &str = ".decision.lock";
const LOCK_RETRIES: u32 = 5;
const LOCK_RETRY_SLEEP: Duration = Duration::from_millis(50);

/// Writes one decision record per subject under `<root>/<subject>/`
///
/// A store represents one run: each subject may be persisted once. Writes
/// hold an exclusive file lock so concurrent runs over the same root never
/// interleave on a subject.
#[derive(Debug)]
pub struct DecisionStore {
    root: PathBuf,
    persisted: HashSet<String>,
}

impl DecisionStore {
    /// Creates a store rooted at `root`; nothing is touched until a write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            persisted: HashSet::new(),
        }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path the record for `subject` is written to
    pub fn record_path(&self, subject: &str) -> PathBuf {
        self.root.join(subject).join(RECORD_FILE_NAME)
    }

    /// Whether `subject` was already persisted through this store
    pub fn is_persisted(&self, subject: &str) -> bool {
        self.persisted.contains(subject)
    }

    /// Writes the record, returning its path
    ///
    /// # Errors
    ///
    /// `NeuroselError::Store` when the subject id is not a plain directory
    /// name, when the subject was already persisted by this store, when the
    /// lock is held elsewhere, or on I/O failure.
    pub fn persist(&mut self, record: &DecisionRecord) -> Result<PathBuf> {
        let subject = record.subject.as_str();
        check_subject(subject)?;
        if self.is_persisted(subject) {
            return Err(store_error(subject, "decision already persisted in this run"));
        }

        let dir = self.root.join(subject);
        fs::create_dir_all(&dir).map_err(|e| store_error(subject, e.to_string()))?;

        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE_NAME))
            .map_err(|e| store_error(subject, e.to_string()))?;
        acquire(&lock, subject)?;

        let written = write_atomically(&dir, &record.to_string());
        // Closing the file releases the lock as well
        let _ = FileExt::unlock(&lock);
        let path = written.map_err(|e| store_error(subject, e.to_string()))?;

        self.persisted.insert(subject.to_string());
        info!("Persisted decision for {} to {}", subject, path.display());
        Ok(path)
    }

    /// Reads back the record for `subject`
    pub fn load(&self, subject: &str) -> Result<DecisionRecord> {
        check_subject(subject)?;
        DecisionRecord::load(&self.record_path(subject))
    }
}

fn acquire(lock: &File, subject: &str) -> Result<()> {
    for attempt in 0..LOCK_RETRIES {
        match lock.try_lock_exclusive() {
            Ok(()) => return Ok(()),
            Err(_) => {
                debug!("Decision lock for {} busy (attempt {})", subject, attempt + 1);
                thread::sleep(LOCK_RETRY_SLEEP);
            }
        }
    }
    Err(store_error(subject, "another writer holds the decision lock"))
}

fn write_atomically(dir: &Path, content: &str) -> std::io::Result<PathBuf> {
    let tmp = dir.join(format!("{}.tmp", RECORD_FILE_NAME));
    let path = dir.join(RECORD_FILE_NAME);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, &path)?;
    Ok(path)
}

fn check_subject(subject: &str) -> Result<()> {
    let plain = !subject.is_empty()
        && subject != "."
        && subject != ".."
        && !subject.contains(['/', '\\', '\n']);
    if plain {
        Ok(())
    } else {
        Err(store_error(subject, "subject id must be a plain directory name"))
    }
}

fn store_error(subject: &str, reason: impl Into<String>) -> NeuroselError {
    NeuroselError::Store {
        subject: subject.to_string(),
        reason: reason.into(),
    }
}
