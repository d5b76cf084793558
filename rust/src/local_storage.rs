use anyhow::{anyhow, Context, Result};
use chrono::Local;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// String-keyed persisted storage with the semantics of a browser's
/// `localStorage`: reads never fail, every write is persisted immediately.
pub trait KeyValueStore: Send {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove_item(&mut self, key: &str) -> Result<()>;
}

/// Storage backed by a single JSON object file. The whole file is rewritten
/// on every mutation.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: BTreeMap<String, String>,
}

impl FileStorage {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create storage dir: {}", parent.display()))?;
        }

        if !path.exists() {
            let storage = Self {
                path,
                items: BTreeMap::new(),
            };
            storage.flush()?;
            return Ok(storage);
        }

        match read_items(&path) {
            Ok(items) => Ok(Self { path, items }),
            Err(err) => {
                let now_tag = Local::now().format("%Y%m%d_%H%M%S").to_string();
                let backup = path.with_file_name(format!("storage.broken.{now_tag}.json"));
                tracing::warn!(
                    "storage file {} is unreadable ({err:#}); moving it to {}",
                    path.display(),
                    backup.display()
                );
                fs::rename(&path, &backup).with_context(|| {
                    format!("failed to backup broken storage: {}", path.display())
                })?;
                let storage = Self {
                    path,
                    items: BTreeMap::new(),
                };
                storage.flush()?;
                Ok(storage)
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let payload =
            serde_json::to_string_pretty(&self.items).context("failed to serialize storage")?;
        let tmp_path = self.path.with_extension("json.tmp");

        fs::write(&tmp_path, payload)
            .with_context(|| format!("failed to write temp storage: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to replace storage: {}", self.path.display()))
    }
}

impl KeyValueStore for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        if self.items.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        self.items.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        if self.items.remove(key).is_none() {
            return Ok(());
        }
        self.flush()
    }
}

fn read_items(path: &Path) -> Result<BTreeMap<String, String>> {
    let raw_text = fs::read_to_string(path)
        .with_context(|| format!("failed to read storage: {}", path.display()))?;
    let raw: Value = serde_json::from_str(&raw_text)
        .with_context(|| format!("failed to parse storage: {}", path.display()))?;
    let Some(object) = raw.as_object() else {
        return Err(anyhow!("storage is not an object: {}", path.display()));
    };
    Ok(string_entries(object))
}

// Non-string values are kept as their JSON text, the way a browser coerces
// anything written to localStorage.
fn string_entries(object: &Map<String, Value>) -> BTreeMap<String, String> {
    object
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

/// Volatile storage, used by tests and as a fallback when no file is wanted.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    items: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&mut self, key: &str) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{FileStorage, KeyValueStore};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static NEXT_FIXTURE_ID: AtomicU64 = AtomicU64::new(1);

    pub(crate) fn fixture_dir(name: &str) -> PathBuf {
        let mut base = std::env::temp_dir();
        let sequence = NEXT_FIXTURE_ID.fetch_add(1, Ordering::Relaxed);
        base.push(format!(
            "promptforge_{}_test_{}_{}",
            name,
            std::process::id(),
            sequence
        ));
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).expect("mkdir fixture");
        base
    }

    #[test]
    fn values_survive_reopen() {
        let base = fixture_dir("storage");
        let path = base.join("storage.json");

        {
            let mut storage = FileStorage::open(path.clone()).expect("open storage");
            storage.set_item("promptforge.last.title", "T").expect("set");
            storage.set_item("promptforge.last.context", "C").expect("set");
            storage.remove_item("promptforge.last.context").expect("remove");
        }

        let storage = FileStorage::open(path).expect("reopen storage");
        assert_eq!(
            storage.get_item("promptforge.last.title").as_deref(),
            Some("T")
        );
        assert_eq!(storage.get_item("promptforge.last.context"), None);

        fs::remove_dir_all(base).ok();
    }

    #[test]
    fn broken_file_is_moved_aside() {
        let base = fixture_dir("storage_broken");
        let path = base.join("storage.json");
        fs::write(&path, "{ not json").expect("write broken");

        let storage = FileStorage::open(path.clone()).expect("open storage");
        assert_eq!(storage.get_item("anything"), None);

        let backups: Vec<_> = fs::read_dir(&base)
            .expect("list fixture")
            .filter_map(Result::ok)
            .filter(|item| {
                item.file_name()
                    .to_string_lossy()
                    .starts_with("storage.broken.")
            })
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(fs::read_to_string(&path).expect("read reset"), "{}");

        fs::remove_dir_all(base).ok();
    }

    #[test]
    fn non_string_values_are_read_as_json_text() {
        let base = fixture_dir("storage_coerce");
        let path = base.join("storage.json");
        fs::write(&path, r#"{"count": 3, "flag": true, "name": "x"}"#).expect("write");

        let storage = FileStorage::open(path).expect("open storage");
        assert_eq!(storage.get_item("count").as_deref(), Some("3"));
        assert_eq!(storage.get_item("flag").as_deref(), Some("true"));
        assert_eq!(storage.get_item("name").as_deref(), Some("x"));

        fs::remove_dir_all(base).ok();
    }
}
