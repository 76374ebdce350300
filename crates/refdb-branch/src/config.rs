//! Key/value configuration holding branch upstream settings.
//!
//! Keys are dotted: `branch.main.remote`. Everything before the last `.` is
//! the section (`branch.main`), the rest is the variable name. Branch names
//! may themselves contain dots and slashes, so the section is never split
//! further.
//!
//! [`FileConfig`] stores sections as TOML tables:
//! ```toml
//! ["branch.feature/x"]
//! remote = "origin"
//! merge = "refs/heads/x"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use crate::error::ConfigError;

type Sections = BTreeMap<String, BTreeMap<String, String>>;

/// Read/write access to configuration values.
pub trait ConfigStore: Send + Sync {
    /// The value of `key`, if set.
    fn get(&self, key: &str) -> Result<Option<String>, ConfigError>;

    /// Set `key` to `value`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), ConfigError>;

    /// Remove `key`. Returns whether it was set.
    fn remove(&self, key: &str) -> Result<bool, ConfigError>;

    /// Remove every variable in `section`. Returns whether it existed.
    fn remove_section(&self, section: &str) -> Result<bool, ConfigError>;

    /// Move every variable of `from` into `to`, replacing `to`.
    /// Returns whether `from` existed.
    fn rename_section(&self, from: &str, to: &str) -> Result<bool, ConfigError>;
}

fn split_key(key: &str) -> Result<(&str, &str), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    let (section, name) = key.rsplit_once('.').ok_or_else(|| invalid("missing section"))?;
    if section.is_empty() {
        return Err(invalid("empty section"));
    }
    if name.is_empty() {
        return Err(invalid("empty variable name"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid("variable names are alphanumeric or '-'"));
    }
    Ok((section, name))
}

fn get_in(sections: &Sections, key: &str) -> Result<Option<String>, ConfigError> {
    let (section, name) = split_key(key)?;
    Ok(sections.get(section).and_then(|vars| vars.get(name)).cloned())
}

fn set_in(sections: &mut Sections, key: &str, value: &str) -> Result<(), ConfigError> {
    let (section, name) = split_key(key)?;
    sections
        .entry(section.to_string())
        .or_default()
        .insert(name.to_string(), value.to_string());
    Ok(())
}

fn remove_in(sections: &mut Sections, key: &str) -> Result<bool, ConfigError> {
    let (section, name) = split_key(key)?;
    let Some(vars) = sections.get_mut(section) else {
        return Ok(false);
    };
    let removed = vars.remove(name).is_some();
    if vars.is_empty() {
        sections.remove(section);
    }
    Ok(removed)
}

fn rename_in(sections: &mut Sections, from: &str, to: &str) -> bool {
    match sections.remove(from) {
        Some(vars) => {
            sections.insert(to.to_string(), vars);
            true
        }
        None => false,
    }
}

fn poisoned(e: impl std::fmt::Display) -> ConfigError {
    ConfigError::Storage(format!("lock poisoned: {e}"))
}

/// Configuration held in memory.
#[derive(Debug, Default)]
pub struct InMemoryConfig {
    sections: RwLock<Sections>,
}

impl InMemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for InMemoryConfig {
    fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let sections = self.sections.read().map_err(poisoned)?;
        get_in(&sections, key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut sections = self.sections.write().map_err(poisoned)?;
        set_in(&mut sections, key, value)
    }

    fn remove(&self, key: &str) -> Result<bool, ConfigError> {
        let mut sections = self.sections.write().map_err(poisoned)?;
        remove_in(&mut sections, key)
    }

    fn remove_section(&self, section: &str) -> Result<bool, ConfigError> {
        let mut sections = self.sections.write().map_err(poisoned)?;
        Ok(sections.remove(section).is_some())
    }

    fn rename_section(&self, from: &str, to: &str) -> Result<bool, ConfigError> {
        let mut sections = self.sections.write().map_err(poisoned)?;
        Ok(rename_in(&mut sections, from, to))
    }
}

/// Configuration persisted to a TOML file.
///
/// The whole file is rewritten on every change: serialized to a temporary
/// file in the same directory, then renamed over the original.
#[derive(Debug)]
pub struct FileConfig {
    path: PathBuf,
    sections: RwLock<Sections>,
}

impl FileConfig {
    /// Load `path`, or start empty if it does not exist.
    pub fn open(path: &Path) -> Result<Self, ConfigError> {
        let sections = match fs::read_to_string(path) {
            Ok(text) => toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Sections::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path: path.to_path_buf(),
            sections: RwLock::new(sections),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, sections: &Sections) -> Result<(), ConfigError> {
        let text = toml::to_string(sections).map_err(|e| ConfigError::Serialization(e.to_string()))?;
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| ConfigError::Io(e.error))?;
        debug!(path = %self.path.display(), sections = sections.len(), "saved config");
        Ok(())
    }

    /// Apply `change` to a copy of the sections, persist it, then publish it.
    fn modify<T>(&self, change: impl FnOnce(&mut Sections) -> Result<T, ConfigError>) -> Result<T, ConfigError> {
        let mut sections = self.sections.write().map_err(poisoned)?;
        let mut updated = sections.clone();
        let result = change(&mut updated)?;
        if updated != *sections {
            self.save(&updated)?;
            *sections = updated;
        }
        Ok(result)
    }
}

impl ConfigStore for FileConfig {
    fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let sections = self.sections.read().map_err(poisoned)?;
        get_in(&sections, key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.modify(|sections| set_in(sections, key, value))
    }

    fn remove(&self, key: &str) -> Result<bool, ConfigError> {
        self.modify(|sections| remove_in(sections, key))
    }

    fn remove_section(&self, section: &str) -> Result<bool, ConfigError> {
        self.modify(|sections| Ok(sections.remove(section).is_some()))
    }

    fn rename_section(&self, from: &str, to: &str) -> Result<bool, ConfigError> {
        self.modify(|sections| Ok(rename_in(sections, from, to)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(config: &dyn ConfigStore) {
        config.set("branch.feature/v1.2.remote", "origin").unwrap();
        config.set("branch.feature/v1.2.merge", "refs/heads/main").unwrap();
        assert_eq!(
            config.get("branch.feature/v1.2.remote").unwrap().as_deref(),
            Some("origin")
        );
        assert_eq!(config.get("branch.other.remote").unwrap(), None);

        assert!(config.rename_section("branch.feature/v1.2", "branch.topic").unwrap());
        assert_eq!(config.get("branch.topic.merge").unwrap().as_deref(), Some("refs/heads/main"));
        assert_eq!(config.get("branch.feature/v1.2.merge").unwrap(), None);

        assert!(config.remove("branch.topic.remote").unwrap());
        assert!(!config.remove("branch.topic.remote").unwrap());
        assert!(config.remove_section("branch.topic").unwrap());
        assert!(!config.remove_section("branch.topic").unwrap());
    }

    #[test]
    fn in_memory_operations() {
        exercise(&InMemoryConfig::new());
    }

    #[test]
    fn file_operations() {
        let dir = tempfile::tempdir().unwrap();
        exercise(&FileConfig::open(&dir.path().join("config.toml")).unwrap());
    }

    #[test]
    fn invalid_keys_are_rejected() {
        let config = InMemoryConfig::new();
        for key in ["remote", ".remote", "branch.", "branch.main.re mote"] {
            let err = config.set(key, "x").unwrap_err();
            assert!(matches!(err, ConfigError::InvalidKey { .. }), "{key}");
        }
    }

    #[test]
    fn file_config_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        {
            let config = FileConfig::open(&path).unwrap();
            config.set("branch.main.remote", "origin").unwrap();
            config.set("branch.main.merge", "refs/heads/main").unwrap();
        }
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("branch.main"));

        let config = FileConfig::open(&path).unwrap();
        assert_eq!(config.get("branch.main.remote").unwrap().as_deref(), Some("origin"));
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "not = [valid").unwrap();
        assert!(matches!(FileConfig::open(&path).unwrap_err(), ConfigError::Parse(_)));
    }
}
