//! Persistent key bindings.
//!
//! The binding file holds one record per line:
//!
//! ```text
//! <key> TAB <mode> TAB <template>
//! ```
//!
//! `mode` is `!` (finish the line) or `&` (keep the line). The template is
//! the remainder of the line and may itself contain tabs. Blank lines are
//! ignored. Every save rewrites the whole file through a temporary file and
//! a rename, so an interrupted write leaves the previous file intact.

use crate::binding::{Binding, Mode, Template};
use crate::error::StoreError;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const FIELD_SEPARATOR: char = '\t';

/// Ordered mapping from a key to the command bound to it.
///
/// Implemented by [`FileStore`] for real sessions and by [`MemoryStore`]
/// where nothing should touch the disk.
pub trait BindingStore {
    /// Look up the binding for `key`.
    fn get(&self, key: char) -> Option<&Binding>;

    /// Insert or overwrite a binding and make it durable.
    ///
    /// Returns the binding that was replaced, if any.
    fn set(&mut self, binding: Binding) -> Result<Option<Binding>, StoreError>;

    /// All bindings ordered by key.
    fn bindings(&self) -> Vec<&Binding>;
}

/// Check that a binding survives the record format unchanged.
pub fn validate(binding: &Binding) -> Result<(), StoreError> {
    let refuse = |reason: &str| StoreError::TemplateEncoding {
        key: binding.key,
        reason: reason.to_string(),
    };
    if matches!(binding.key, '\n' | '\r' | FIELD_SEPARATOR) {
        return Err(refuse("key cannot be a line break or tab"));
    }
    let text = binding.template.as_str();
    if text.contains('\n') || text.contains('\r') {
        return Err(refuse("template contains a line break"));
    }
    if text.trim().is_empty() {
        return Err(refuse("template is empty"));
    }
    Ok(())
}

/// Render bindings in the file format.
pub fn encode<'a>(bindings: impl IntoIterator<Item = &'a Binding>) -> String {
    let mut out = String::new();
    for b in bindings {
        out.push(b.key);
        out.push(FIELD_SEPARATOR);
        out.push(b.mode.symbol());
        out.push(FIELD_SEPARATOR);
        out.push_str(b.template.as_str());
        out.push('\n');
    }
    out
}

/// Parse the file format. `path` is only used for error messages.
pub fn decode(path: &Path, text: &str) -> Result<BTreeMap<char, Binding>, StoreError> {
    let mut bindings = BTreeMap::new();
    for (idx, record) in text.split('\n').enumerate() {
        if record.is_empty() {
            continue;
        }
        let corrupt = |reason: String| StoreError::Corrupt {
            path: path.to_path_buf(),
            line: idx + 1,
            reason,
        };

        let mut fields = record.splitn(3, FIELD_SEPARATOR);
        let key_field = fields.next().unwrap_or_default();
        let mode_field = fields
            .next()
            .ok_or_else(|| corrupt("missing mode field".to_string()))?;
        let template = fields
            .next()
            .ok_or_else(|| corrupt("missing template field".to_string()))?;

        let mut key_chars = key_field.chars();
        let key = match (key_chars.next(), key_chars.next()) {
            (Some(k), None) => k,
            _ => return Err(corrupt(format!("key must be one character, got {key_field:?}"))),
        };

        let mut mode_chars = mode_field.chars();
        let mode = match (mode_chars.next().and_then(Mode::from_symbol), mode_chars.next()) {
            (Some(m), None) => m,
            _ => return Err(corrupt(format!("unknown mode {mode_field:?}"))),
        };

        if template.trim().is_empty() || template.contains('\r') {
            return Err(corrupt("empty or malformed template".to_string()));
        }
        if bindings.contains_key(&key) {
            return Err(corrupt(format!("duplicate binding for key {key:?}")));
        }
        bindings.insert(key, Binding::new(key, Template::new(template), mode));
    }
    Ok(bindings)
}

/// Bindings kept in a file on disk.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    bindings: BTreeMap<char, Binding>,
}

impl FileStore {
    /// Load the store at `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let bindings = match fs::read_to_string(&path) {
            Ok(text) => decode(&path, &text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no binding file yet");
                BTreeMap::new()
            }
            Err(e) => return Err(StoreError::Io { path, source: e }),
        };
        debug!(path = %path.display(), count = bindings.len(), "loaded bindings");
        Ok(Self { path, bindings })
    }

    /// An empty store that will write to `path` on the first save.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            bindings: BTreeMap::new(),
        }
    }

    /// Move an unreadable binding file out of the way so later saves do not
    /// overwrite it. Returns where it was moved.
    pub fn quarantine(path: &Path) -> Result<PathBuf, StoreError> {
        let mut name = path.as_os_str().to_owned();
        name.push(".corrupt");
        let target = PathBuf::from(name);
        fs::rename(path, &target).map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        warn!(from = %path.display(), to = %target.display(), "moved corrupt binding file aside");
        Ok(target)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_owned())
            .unwrap_or_else(|| "bindings".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        let tmp_path = self.temp_path();
        let mut tmp = File::create(&tmp_path).map_err(io_err)?;
        tmp.write_all(encode(self.bindings.values()).as_bytes())
            .map_err(io_err)?;
        tmp.sync_all().map_err(io_err)?;
        drop(tmp);

        fs::rename(&tmp_path, &self.path).map_err(io_err)
    }
}

impl BindingStore for FileStore {
    fn get(&self, key: char) -> Option<&Binding> {
        self.bindings.get(&key)
    }

    fn set(&mut self, binding: Binding) -> Result<Option<Binding>, StoreError> {
        validate(&binding)?;
        let key = binding.key;
        let previous = self.bindings.insert(key, binding);
        if let Err(e) = self.persist() {
            // keep memory in line with what is on disk
            match &previous {
                Some(old) => self.bindings.insert(key, old.clone()),
                None => self.bindings.remove(&key),
            };
            return Err(e);
        }
        info!(key = %key, path = %self.path.display(), "saved binding");
        Ok(previous)
    }

    fn bindings(&self) -> Vec<&Binding> {
        self.bindings.values().collect()
    }
}

/// Bindings that live only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    bindings: BTreeMap<char, Binding>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BindingStore for MemoryStore {
    fn get(&self, key: char) -> Option<&Binding> {
        self.bindings.get(&key)
    }

    fn set(&mut self, binding: Binding) -> Result<Option<Binding>, StoreError> {
        validate(&binding)?;
        Ok(self.bindings.insert(binding.key, binding))
    }

    fn bindings(&self) -> Vec<&Binding> {
        self.bindings.values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(key: char, template: &str) -> Binding {
        Binding::new(key, Template::new(template), Mode::Consume)
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::load(dir.path().join("bindings")).unwrap();
        assert!(store.bindings().is_empty());
    }

    #[test]
    fn set_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("bindings");

        let mut store = FileStore::load(&path).unwrap();
        store.set(binding('d', "rm")).unwrap();
        store
            .set(Binding::new('v', Template::new("feh {}\t--zoom"), Mode::Keep))
            .unwrap();

        let reloaded = FileStore::load(&path).unwrap();
        assert_eq!(reloaded.get('d'), Some(&binding('d', "rm")));
        let v = reloaded.get('v').unwrap();
        assert_eq!(v.template.as_str(), "feh {}\t--zoom");
        assert_eq!(v.mode, Mode::Keep);
        assert!(!dir.path().join("nested").join("bindings.tmp").exists());
    }

    #[test]
    fn overwrite_leaves_single_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings");

        let mut store = FileStore::load(&path).unwrap();
        assert_eq!(store.set(binding('d', "rm")).unwrap(), None);
        let replaced = store.set(binding('d', "trash-put")).unwrap();
        assert_eq!(replaced, Some(binding('d', "rm")));

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "d\t!\ttrash-put\n");
        let reloaded = FileStore::load(&path).unwrap();
        assert_eq!(reloaded.get('d').unwrap().template.as_str(), "trash-put");
    }

    #[test]
    fn templates_round_trip_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings");
        let templates = [
            "echo 'a  b' \"$HOME\" | tr a-z A-Z",
            "  leading and trailing spaces  ",
            "mv {} \"$(dirname {})/done/\"",
            "printf '%s\\n' {}",
            "ünïcødé ✓",
        ];

        let mut store = FileStore::load(&path).unwrap();
        for (i, t) in templates.iter().enumerate() {
            let key = (b'a' + i as u8) as char;
            store.set(binding(key, t)).unwrap();
        }

        let reloaded = FileStore::load(&path).unwrap();
        for (i, t) in templates.iter().enumerate() {
            let key = (b'a' + i as u8) as char;
            assert_eq!(reloaded.get(key).unwrap().template.as_str(), *t);
        }
    }

    #[test]
    fn line_breaks_are_refused_and_not_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings");
        let mut store = FileStore::load(&path).unwrap();

        let err = store.set(binding('x', "echo a\necho b")).unwrap_err();
        assert!(matches!(err, StoreError::TemplateEncoding { key: 'x', .. }));
        let err = store.set(binding('\t', "echo")).unwrap_err();
        assert!(matches!(err, StoreError::TemplateEncoding { .. }));

        assert!(store.get('x').is_none());
        assert!(!path.exists());
    }

    #[test]
    fn failed_save_leaves_memory_as_it_was() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("plain-file");
        fs::write(&not_a_dir, "").unwrap();

        let mut store = FileStore::empty(not_a_dir.join("bindings"));
        let err = store.set(binding('k', "rm")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(store.get('k').is_none());
        assert!(store.bindings().is_empty());

        // an overwrite that cannot be written keeps the old command
        let path = dir.path().join("bindings");
        let mut store = FileStore::load(&path).unwrap();
        store.set(binding('d', "rm")).unwrap();
        fs::create_dir(dir.path().join("bindings.tmp")).unwrap();
        let err = store.set(binding('d', "trash-put")).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert_eq!(store.get('d').unwrap().template.as_str(), "rm");
        assert_eq!(fs::read_to_string(&path).unwrap(), "d\t!\trm\n");
    }

    #[test]
    fn corrupt_files_are_reported_with_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings");
        let cases = [
            ("d\t!\trm\nnot a record\n", 2),
            ("dd\t!\trm\n", 1),
            ("d\t?\trm\n", 1),
            ("d\t!\t\n", 1),
            ("d\t!\trm\n\nd\t&\tls\n", 3),
        ];
        for (text, line) in cases {
            fs::write(&path, text).unwrap();
            match FileStore::load(&path) {
                Err(StoreError::Corrupt { line: l, .. }) => assert_eq!(l, line, "{text:?}"),
                other => panic!("expected corrupt store for {text:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn quarantine_moves_file_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bindings");
        fs::write(&path, "garbage").unwrap();

        let moved = FileStore::quarantine(&path).unwrap();
        assert_eq!(moved, dir.path().join("bindings.corrupt"));
        assert!(!path.exists());
        assert_eq!(fs::read_to_string(moved).unwrap(), "garbage");
    }

    #[test]
    fn memory_store_overwrites() {
        let mut store = MemoryStore::new();
        store.set(binding('d', "rm")).unwrap();
        store.set(binding('d', "rm -f")).unwrap();
        assert_eq!(store.bindings().len(), 1);
        assert_eq!(store.get('d').unwrap().template.as_str(), "rm -f");
    }
}
