//! Filesystem reference backend.
//!
//! Layout under the root directory:
//! ```text
//! HEAD                     one-level refs live at the top
//! refs/heads/main          "<hex>\n" or "ref: <name>\n", optional "^<hex>\n"
//! logs/refs/heads/main     framed reflog (see [`crate::reflog`])
//! ```
//! Every write goes through a `<name>.lock` file created with `create_new`,
//! so writers in other processes serialize on the same name. The new value is
//! written to the lock file and renamed over the ref, which makes the ref
//! switch atomically. Once the lock is held the stored value is compared with
//! the update's expected value, so a writer in another process that got there
//! first turns this update into a conflict instead of being overwritten. Log
//! appends happen before the rename and are rolled back if anything after
//! them fails.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use refdb_types::ObjectId;

use crate::backend::{check_expected, LogAppend, RefBackend, RefUpdate};
use crate::error::{RefError, Result};
use crate::names::is_valid_name;
use crate::reflog::{self, AppendUndo};
use crate::types::{RefLogEntry, Reference, Target};

const LOGS_DIR: &str = "logs";
const REFS_DIR: &str = "refs";
const LOCK_SUFFIX: &str = ".lock";
const SYMREF_PREFIX: &str = "ref: ";

/// Flush/sync strategy for ref and reflog writes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every write (safest, highest latency).
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    #[default]
    OsDefault,
}

/// Configuration for the [`FileBackend`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBackendConfig {
    pub sync_mode: SyncMode,
}

/// Held `<name>.lock` file. Removed on drop unless committed.
struct LockFile {
    lock_path: PathBuf,
    target: PathBuf,
    file: Option<File>,
    committed: bool,
}

impl LockFile {
    fn acquire(target: &Path, name: &str) -> Result<Self> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut lock_name = target
            .file_name()
            .map(|n| n.to_os_string())
            .ok_or_else(|| RefError::InvalidName {
                name: name.to_string(),
                reason: "name has no final component".into(),
            })?;
        lock_name.push(LOCK_SUFFIX);
        let lock_path = target.with_file_name(lock_name);

        let file = match OpenOptions::new().write(true).create_new(true).open(&lock_path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(RefError::Locked {
                    name: name.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            lock_path,
            target: target.to_path_buf(),
            file: Some(file),
            committed: false,
        })
    }

    fn write(&mut self, contents: &[u8], sync: &SyncMode) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.write_all(contents)?;
            if matches!(sync, SyncMode::EveryWrite) {
                file.sync_all()?;
            }
        }
        Ok(())
    }

    /// Atomically move the lock file over the target.
    fn commit(&mut self) -> Result<()> {
        self.file.take();
        // An empty directory left behind by a deleted ref hierarchy.
        if self.target.is_dir() {
            fs::remove_dir(&self.target)?;
        }
        fs::rename(&self.lock_path, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if !self.committed {
            self.file.take();
            let _ = fs::remove_file(&self.lock_path);
        }
    }
}

/// A compensating action recorded while applying an update.
enum Undo {
    Append(AppendUndo),
    /// Put `data` back at `path`, or remove `path` if there was nothing.
    Restore { path: PathBuf, data: Option<Vec<u8>> },
    /// Move `to` back to `from`.
    Move { from: PathBuf, to: PathBuf },
}

impl Undo {
    fn run(self) {
        let result = match self {
            Undo::Append(undo) => {
                undo.rollback();
                Ok(())
            }
            Undo::Restore { path, data: Some(data) } => fs::write(&path, data),
            Undo::Restore { path, data: None } => match fs::remove_file(&path) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
            Undo::Move { from, to } => fs::rename(&to, &from),
        };
        if let Err(e) = result {
            warn!(error = %e, "rollback step failed");
        }
    }
}

fn rollback(undos: Vec<Undo>) {
    if !undos.is_empty() {
        warn!(steps = undos.len(), "rolling back partial ref update");
    }
    for undo in undos.into_iter().rev() {
        undo.run();
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn encode_ref(reference: &Reference) -> String {
    let mut out = match reference.target() {
        Target::Direct(id) => format!("{id}\n"),
        Target::Symbolic(name) => format!("{SYMREF_PREFIX}{name}\n"),
    };
    if let Some(peeled) = reference.peeled() {
        out.push_str(&format!("^{peeled}\n"));
    }
    out
}

fn decode_ref(name: &str, text: &str) -> Result<Reference> {
    let corrupt = |reason: String| RefError::Corrupt {
        name: name.to_string(),
        reason,
    };
    let mut lines = text.lines();
    let first = lines.next().ok_or_else(|| corrupt("empty ref file".into()))?.trim_end();

    let reference = match first.strip_prefix(SYMREF_PREFIX) {
        Some(target) => Reference::symbolic(name, target.trim()),
        None => {
            let id = ObjectId::from_hex(first).map_err(|e| corrupt(e.to_string()))?;
            Reference::direct(name, id)
        }
    };

    match lines.next().and_then(|l| l.strip_prefix('^')) {
        Some(peeled) => {
            let peeled = ObjectId::from_hex(peeled.trim_end()).map_err(|e| corrupt(e.to_string()))?;
            Ok(reference.with_peeled(Some(peeled)))
        }
        None => Ok(reference),
    }
}

/// A [`RefBackend`] storing loose ref files and framed reflogs in a directory.
#[derive(Debug)]
pub struct FileBackend {
    root: PathBuf,
    config: FileBackendConfig,
}

impl FileBackend {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: &Path, config: FileBackendConfig) -> Result<Self> {
        fs::create_dir_all(root.join(REFS_DIR))?;
        fs::create_dir_all(root.join(LOGS_DIR))?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
        })
    }

    /// The directory this backend lives in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn log_path(&self, name: &str) -> PathBuf {
        self.root.join(LOGS_DIR).join(name)
    }

    /// Append `logs`, undoing every earlier append if one fails.
    fn append_logs(&self, logs: &[LogAppend], undos: &mut Vec<Undo>) -> Result<()> {
        for LogAppend { name, entry } in logs {
            let undo = reflog::append_entry(&self.log_path(name), entry, &self.config.sync_mode)?;
            undos.push(Undo::Append(undo));
        }
        Ok(())
    }

    /// Remove empty directories from `start` upwards, stopping at `stop`.
    fn prune_empty_dirs(&self, start: Option<&Path>, stop: &Path) {
        let mut dir = start.map(Path::to_path_buf);
        while let Some(current) = dir {
            if current == stop || !current.starts_with(stop) {
                break;
            }
            if fs::remove_dir(&current).is_err() {
                break;
            }
            dir = current.parent().map(Path::to_path_buf);
        }
    }

    fn write(&self, reference: Reference, expected: Option<Target>, logs: Vec<LogAppend>) -> Result<()> {
        let name = reference.name().to_string();
        let mut lock = LockFile::acquire(&self.ref_path(&name), &name)?;
        check_expected(&name, expected.as_ref(), self.read(&name)?.as_ref())?;
        lock.write(encode_ref(&reference).as_bytes(), &self.config.sync_mode)?;

        let mut undos = Vec::new();
        let result = self
            .append_logs(&logs, &mut undos)
            .and_then(|()| lock.commit());
        if let Err(e) = result {
            rollback(undos);
            return Err(e);
        }

        debug!(name = %name, target = %reference.target(), "wrote ref");
        Ok(())
    }

    fn delete(&self, name: &str, expected: Target) -> Result<()> {
        let path = self.ref_path(name);
        let lock = LockFile::acquire(&path, name)?;
        check_expected(name, Some(&expected), self.read(name)?.as_ref())?;

        let log_path = self.log_path(name);
        let saved_log = read_optional(&log_path)?;
        if saved_log.is_some() {
            fs::remove_file(&log_path)?;
        }
        if let Err(e) = fs::remove_file(&path) {
            if let Some(data) = saved_log {
                rollback(vec![Undo::Restore {
                    path: log_path,
                    data: Some(data),
                }]);
            }
            return Err(e.into());
        }
        drop(lock);

        self.prune_empty_dirs(path.parent(), &self.root.join(REFS_DIR));
        self.prune_empty_dirs(log_path.parent(), &self.root.join(LOGS_DIR));
        debug!(name, "deleted ref");
        Ok(())
    }

    fn rename(
        &self,
        from: &str,
        expected: Target,
        reference: Reference,
        displaced: Option<Target>,
        follow: Option<Reference>,
        logs: Vec<LogAppend>,
    ) -> Result<()> {
        let to = reference.name().to_string();
        let from_path = self.ref_path(from);
        let to_path = self.ref_path(&to);

        // Sorted, so concurrent multi-ref updates contend in the same order.
        let names: BTreeSet<&str> = [from, to.as_str()]
            .into_iter()
            .chain(follow.as_ref().map(Reference::name))
            .collect();
        let mut locks: BTreeMap<&str, LockFile> = BTreeMap::new();
        for name in names {
            locks.insert(name, LockFile::acquire(&self.ref_path(name), name)?);
        }

        check_expected(from, Some(&expected), self.read(from)?.as_ref())?;
        check_expected(&to, displaced.as_ref(), self.read(&to)?.as_ref())?;
        if let Some(follow) = &follow {
            let points_at_from = Target::Symbolic(from.to_string());
            check_expected(follow.name(), Some(&points_at_from), self.read(follow.name())?.as_ref())?;
        }

        if let Some(lock) = locks.get_mut(to.as_str()) {
            lock.write(encode_ref(&reference).as_bytes(), &self.config.sync_mode)?;
        }
        let mut follow_restore = None;
        if let Some(follow) = &follow {
            let path = self.ref_path(follow.name());
            follow_restore = Some(Undo::Restore {
                data: read_optional(&path)?,
                path,
            });
            if let Some(lock) = locks.get_mut(follow.name()) {
                lock.write(encode_ref(follow).as_bytes(), &self.config.sync_mode)?;
            }
        }

        let from_log = self.log_path(from);
        let to_log = self.log_path(&to);
        let displaced_ref = if to_path.is_file() {
            read_optional(&to_path)?
        } else {
            None
        };
        let displaced_log = read_optional(&to_log)?;

        let mut undos = Vec::new();
        let result = (|| -> Result<()> {
            if displaced_log.is_some() {
                fs::remove_file(&to_log)?;
                undos.push(Undo::Restore {
                    path: to_log.clone(),
                    data: displaced_log.clone(),
                });
            }
            if from_log.is_file() {
                if let Some(parent) = to_log.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::rename(&from_log, &to_log)?;
                undos.push(Undo::Move {
                    from: from_log.clone(),
                    to: to_log.clone(),
                });
            }
            self.append_logs(&logs, &mut undos)?;
            if let Some(lock) = locks.get_mut(to.as_str()) {
                lock.commit()?;
                undos.push(Undo::Restore {
                    path: to_path.clone(),
                    data: displaced_ref.clone(),
                });
            }
            if let Some(follow) = &follow {
                if let Some(lock) = locks.get_mut(follow.name()) {
                    lock.commit()?;
                    undos.extend(follow_restore.take());
                }
            }
            fs::remove_file(&from_path)?;
            Ok(())
        })();

        if let Err(e) = result {
            rollback(undos);
            return Err(e);
        }
        drop(locks);

        self.prune_empty_dirs(from_path.parent(), &self.root.join(REFS_DIR));
        self.prune_empty_dirs(from_log.parent(), &self.root.join(LOGS_DIR));
        debug!(from, to = %to, "renamed ref");
        Ok(())
    }

    /// Convert a path under the root into a ref name with `/` separators.
    fn path_to_name(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
        Some(parts?.join("/"))
    }
}

impl RefBackend for FileBackend {
    fn read(&self, name: &str) -> Result<Option<Reference>> {
        let path = self.ref_path(name);
        if path.is_dir() {
            return Ok(None);
        }
        match fs::read_to_string(&path) {
            Ok(text) => decode_ref(name, &text).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in WalkDir::new(self.root.join(REFS_DIR)).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                // Removed by a concurrent delete while walking.
                Err(e) if e.io_error().map(|io| io.kind()) == Some(io::ErrorKind::NotFound) => continue,
                Err(e) => return Err(RefError::Io(e.into())),
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some(name) = self.path_to_name(entry.path()) {
                if !name.ends_with(LOCK_SUFFIX) {
                    names.push(name);
                }
            }
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if is_valid_name(name) {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    fn apply(&self, update: RefUpdate) -> Result<()> {
        match update {
            RefUpdate::Write {
                reference,
                expected,
                logs,
            } => self.write(reference, expected, logs),
            RefUpdate::Delete { name, expected } => self.delete(&name, expected),
            RefUpdate::Rename {
                from,
                expected,
                reference,
                displaced,
                follow,
                logs,
            } => self.rename(&from, expected, reference, displaced, follow, logs),
        }
    }

    fn read_log(&self, name: &str) -> Result<Vec<RefLogEntry>> {
        reflog::read_log_file(name, &self.log_path(name))
    }

    fn has_log(&self, name: &str) -> Result<bool> {
        Ok(self.log_path(name).is_file())
    }

    fn create_log(&self, name: &str) -> Result<()> {
        let path = self.log_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refdb_types::{Signature, Time};

    fn id(byte: u8) -> ObjectId {
        ObjectId::from_hash([byte; 32])
    }

    fn entry(old: u8, new: u8) -> RefLogEntry {
        RefLogEntry {
            old: id(old),
            new: id(new),
            committer: Signature::new("t", "t@example.com", Time::new(0, 0)),
            message: "test".into(),
        }
    }

    fn open(dir: &Path) -> FileBackend {
        FileBackend::open(dir, FileBackendConfig::default()).unwrap()
    }

    /// Create a reference that does not exist yet.
    fn write(backend: &FileBackend, reference: Reference, logs: Vec<LogAppend>) {
        backend
            .apply(RefUpdate::Write {
                reference,
                expected: None,
                logs,
            })
            .unwrap();
    }

    fn rename(from: &str, to: &str, follow: Option<Reference>, logs: Vec<LogAppend>) -> RefUpdate {
        RefUpdate::Rename {
            from: from.into(),
            expected: Target::Direct(id(1)),
            reference: Reference::direct(to, id(1)),
            displaced: None,
            follow,
            logs,
        }
    }

    #[test]
    fn direct_and_symbolic_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        write(&backend, Reference::direct("refs/heads/main", id(1)), vec![]);
        write(&backend, Reference::symbolic("HEAD", "refs/heads/main"), vec![]);

        let on_disk = fs::read_to_string(dir.path().join("HEAD")).unwrap();
        assert_eq!(on_disk, "ref: refs/heads/main\n");
        let on_disk = fs::read_to_string(dir.path().join("refs/heads/main")).unwrap();
        assert_eq!(on_disk, format!("{}\n", id(1)));

        assert_eq!(
            backend.read("HEAD").unwrap().unwrap().symbolic_target(),
            Some("refs/heads/main")
        );
    }

    #[test]
    fn peeled_line_is_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        let tag = Reference::direct("refs/tags/v1", id(1)).with_peeled(Some(id(2)));
        write(&backend, tag.clone(), vec![]);
        assert_eq!(backend.read("refs/tags/v1").unwrap().unwrap(), tag);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = open(dir.path());
            let log = LogAppend {
                name: "refs/heads/main".into(),
                entry: entry(0, 1),
            };
            write(&backend, Reference::direct("refs/heads/main", id(1)), vec![log]);
        }
        let backend = open(dir.path());
        assert_eq!(
            backend.read("refs/heads/main").unwrap().unwrap().target_id(),
            Some(id(1))
        );
        assert_eq!(backend.read_log("refs/heads/main").unwrap(), vec![entry(0, 1)]);
    }

    #[test]
    fn names_lists_nested_and_top_level_refs() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        write(&backend, Reference::direct("refs/heads/feature/x", id(1)), vec![]);
        write(&backend, Reference::direct("refs/tags/v1", id(2)), vec![]);
        write(&backend, Reference::symbolic("HEAD", "refs/heads/feature/x"), vec![]);
        fs::write(dir.path().join("config"), "not a ref").unwrap();

        assert_eq!(
            backend.names().unwrap(),
            vec!["HEAD", "refs/heads/feature/x", "refs/tags/v1"]
        );
    }

    #[test]
    fn held_lock_reports_locked() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
        fs::write(dir.path().join("refs/heads/main.lock"), "").unwrap();

        let err = backend
            .apply(RefUpdate::Write {
                reference: Reference::direct("refs/heads/main", id(1)),
                expected: None,
                logs: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, RefError::Locked { .. }));
        assert!(backend.read("refs/heads/main").unwrap().is_none());
        assert!(backend.names().unwrap().is_empty());
    }

    #[test]
    fn failed_commit_rolls_back_log() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        let log = LogAppend {
            name: "refs/heads/main".into(),
            entry: entry(0, 1),
        };
        write(&backend, Reference::direct("refs/heads/main", id(1)), vec![log]);

        // A non-empty directory where the ref should go makes the rename fail.
        let blocker = dir.path().join("refs/heads/blocked");
        fs::create_dir_all(blocker.join("child")).unwrap();
        let err = backend.apply(RefUpdate::Write {
            reference: Reference::direct("refs/heads/blocked", id(2)),
            expected: None,
            logs: vec![
                LogAppend {
                    name: "refs/heads/blocked".into(),
                    entry: entry(0, 2),
                },
                LogAppend {
                    name: "refs/heads/main".into(),
                    entry: entry(1, 2),
                },
            ],
        });
        assert!(err.is_err());
        assert_eq!(backend.read_log("refs/heads/main").unwrap(), vec![entry(0, 1)]);
        assert!(!backend.has_log("refs/heads/blocked").unwrap());
        assert!(!dir.path().join("refs/heads/blocked.lock").exists());
    }

    #[test]
    fn delete_removes_file_log_and_empty_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        let log = LogAppend {
            name: "refs/heads/feature/x".into(),
            entry: entry(0, 1),
        };
        write(&backend, Reference::direct("refs/heads/feature/x", id(1)), vec![log]);
        backend
            .apply(RefUpdate::Delete {
                name: "refs/heads/feature/x".into(),
                expected: Target::Direct(id(1)),
            })
            .unwrap();

        assert!(backend.read("refs/heads/feature/x").unwrap().is_none());
        assert!(!backend.has_log("refs/heads/feature/x").unwrap());
        assert!(!dir.path().join("refs/heads/feature").exists());
        assert!(dir.path().join("refs").exists());
    }

    #[test]
    fn rename_moves_ref_and_log() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        let log = LogAppend {
            name: "refs/heads/old".into(),
            entry: entry(0, 1),
        };
        write(&backend, Reference::direct("refs/heads/old", id(1)), vec![log]);

        let logs = vec![LogAppend {
            name: "refs/heads/new/name".into(),
            entry: entry(1, 1),
        }];
        backend
            .apply(rename("refs/heads/old", "refs/heads/new/name", None, logs))
            .unwrap();

        assert!(backend.read("refs/heads/old").unwrap().is_none());
        assert!(!backend.has_log("refs/heads/old").unwrap());
        assert_eq!(backend.read_log("refs/heads/new/name").unwrap().len(), 2);
        assert_eq!(
            backend.read("refs/heads/new/name").unwrap().unwrap().target_id(),
            Some(id(1))
        );
    }

    #[test]
    fn rename_missing_source_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        let err = backend
            .apply(rename("refs/heads/ghost", "refs/heads/new", None, vec![]))
            .unwrap_err();
        assert!(matches!(err, RefError::NotFound { .. }));
        assert!(backend.read("refs/heads/new").unwrap().is_none());
    }

    #[test]
    fn stale_expected_value_is_a_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        write(&backend, Reference::direct("refs/heads/main", id(1)), vec![]);

        let err = backend
            .apply(RefUpdate::Write {
                reference: Reference::direct("refs/heads/main", id(3)),
                expected: Some(Target::Direct(id(2))),
                logs: vec![LogAppend {
                    name: "refs/heads/main".into(),
                    entry: entry(2, 3),
                }],
            })
            .unwrap_err();
        assert!(matches!(err, RefError::Conflict { .. }));
        assert_eq!(
            backend.read("refs/heads/main").unwrap().unwrap().target_id(),
            Some(id(1))
        );
        assert!(!backend.has_log("refs/heads/main").unwrap());
        assert!(!dir.path().join("refs/heads/main.lock").exists());

        let err = backend
            .apply(RefUpdate::Delete {
                name: "refs/heads/main".into(),
                expected: Target::Direct(id(2)),
            })
            .unwrap_err();
        assert!(matches!(err, RefError::Conflict { .. }));
        assert!(backend.read("refs/heads/main").unwrap().is_some());
    }

    #[test]
    fn failed_rename_restores_source_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        let log = LogAppend {
            name: "refs/heads/old".into(),
            entry: entry(0, 1),
        };
        write(&backend, Reference::direct("refs/heads/old", id(1)), vec![log]);

        // The log moves and gets appended to before the destination commit
        // fails on a non-empty directory.
        fs::create_dir_all(dir.path().join("refs/heads/dest/child")).unwrap();
        let logs = vec![LogAppend {
            name: "refs/heads/dest".into(),
            entry: entry(1, 1),
        }];
        let err = backend.apply(rename("refs/heads/old", "refs/heads/dest", None, logs));
        assert!(err.is_err());

        assert_eq!(
            backend.read("refs/heads/old").unwrap().unwrap().target_id(),
            Some(id(1))
        );
        assert_eq!(backend.read_log("refs/heads/old").unwrap(), vec![entry(0, 1)]);
        assert!(!backend.has_log("refs/heads/dest").unwrap());
        assert!(backend.read("refs/heads/dest").unwrap().is_none());
        assert!(!dir.path().join("refs/heads/old.lock").exists());
        assert!(!dir.path().join("refs/heads/dest.lock").exists());
    }

    #[test]
    fn rename_rewrites_head_in_the_same_update() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        write(&backend, Reference::direct("refs/heads/old", id(1)), vec![]);
        write(&backend, Reference::symbolic("HEAD", "refs/heads/old"), vec![]);

        let follow = Reference::symbolic("HEAD", "refs/heads/new");
        backend
            .apply(rename("refs/heads/old", "refs/heads/new", Some(follow), vec![]))
            .unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("HEAD")).unwrap(),
            "ref: refs/heads/new\n"
        );
        assert!(backend.read("refs/heads/old").unwrap().is_none());
    }

    #[test]
    fn locked_head_leaves_rename_undone() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        write(&backend, Reference::direct("refs/heads/old", id(1)), vec![]);
        write(&backend, Reference::symbolic("HEAD", "refs/heads/old"), vec![]);
        fs::write(dir.path().join("HEAD.lock"), "").unwrap();

        let follow = Reference::symbolic("HEAD", "refs/heads/new");
        let err = backend
            .apply(rename("refs/heads/old", "refs/heads/new", Some(follow), vec![]))
            .unwrap_err();
        assert!(matches!(err, RefError::Locked { .. }));
        assert!(backend.read("refs/heads/old").unwrap().is_some());
        assert!(backend.read("refs/heads/new").unwrap().is_none());
        assert_eq!(
            backend.read("HEAD").unwrap().unwrap().symbolic_target(),
            Some("refs/heads/old")
        );
    }

    #[test]
    fn corrupt_ref_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let backend = open(dir.path());
        fs::create_dir_all(dir.path().join("refs/heads")).unwrap();
        fs::write(dir.path().join("refs/heads/bad"), "not-hex\n").unwrap();
        let err = backend.read("refs/heads/bad").unwrap_err();
        assert!(matches!(err, RefError::Corrupt { .. }));
    }
}
