//! Durable storage for design snapshots

use crate::document::DesignDocument;
use crate::error::Result;
use crate::migration::{self, LoadedDesign};
use crate::model::CodeLanguage;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Storage directory: .skyplan/
pub const STORAGE_DIR: &str = ".skyplan";

/// Record name used when none is configured
pub const DEFAULT_RECORD: &str = "design";

/// Version written into every snapshot. Anything older is discarded on load.
pub const SCHEMA_VERSION: u32 = 3;

/// A keyed store of serialized records.
pub trait DesignStorage: Send + Sync {
    /// `Ok(None)` when the record does not exist.
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, contents: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

impl<S: DesignStorage + ?Sized> DesignStorage for Arc<S> {
    fn read(&self, key: &str) -> Result<Option<String>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        (**self).write(key, contents)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// One JSON file per record inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStorage { dir: dir.into() }
    }

    /// Storage rooted at `<root>/.skyplan`.
    pub fn in_root(root: &Path) -> Self {
        Self::new(root.join(STORAGE_DIR))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl DesignStorage for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(&path)?))
    }

    /// Temp file + rename, so a crash mid-write leaves the previous snapshot intact.
    fn write(&self, key: &str, contents: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, self.record_path(key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.record_path(key);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// In-process storage, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: DashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(key: &str, contents: &str) -> Self {
        let storage = Self::new();
        storage.records.insert(key.to_string(), contents.to_string());
        storage
    }
}

impl DesignStorage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        self.records.insert(key.to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.records.remove(key);
        Ok(())
    }
}

/// The persisted subset of a design. Nodes and edges stay as raw JSON so one
/// corrupt entry can be dropped without losing the rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDesign {
    #[serde(default)]
    pub nodes: Vec<serde_json::Value>,
    #[serde(default)]
    pub edges: Vec<serde_json::Value>,
    #[serde(default)]
    pub design_name: Option<String>,
    #[serde(default)]
    pub design_id: Option<String>,
    #[serde(default)]
    pub language_preference: Option<CodeLanguage>,
    #[serde(default)]
    pub schema_version: Option<u32>,
}

impl StoredDesign {
    /// Snapshot a document at the current schema version.
    pub fn capture(document: &DesignDocument, language: CodeLanguage) -> Result<Self> {
        let graph = document.graph();
        let nodes = graph
            .nodes()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()?;
        let edges = graph
            .edges()
            .map(serde_json::to_value)
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(StoredDesign {
            nodes,
            edges,
            design_name: Some(document.name().to_string()),
            design_id: document.design_id().map(str::to_string),
            language_preference: Some(language),
            schema_version: Some(SCHEMA_VERSION),
        })
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A storage backend bound to one record name.
pub struct DesignStore {
    storage: Box<dyn DesignStorage>,
    record: String,
}

impl std::fmt::Debug for DesignStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DesignStore")
            .field("record", &self.record)
            .finish()
    }
}

impl DesignStore {
    pub fn new(storage: impl DesignStorage + 'static, record: impl Into<String>) -> Self {
        DesignStore {
            storage: Box::new(storage),
            record: record.into(),
        }
    }

    pub fn record(&self) -> &str {
        &self.record
    }

    /// Serialize the document and write it under this store's record.
    pub fn save(&self, document: &DesignDocument, language: CodeLanguage) -> Result<()> {
        let json = StoredDesign::capture(document, language)?.to_json()?;
        self.storage.write(&self.record, &json)?;
        tracing::debug!(
            "Design snapshot saved to record '{}' ({} nodes)",
            self.record,
            document.graph().node_count()
        );
        Ok(())
    }

    /// Read the raw record. Missing, unreadable and unparsable records all
    /// come back as `Ok(None)`/`Err` for the caller to decide on.
    pub fn load_stored(&self) -> Result<Option<StoredDesign>> {
        match self.storage.read(&self.record)? {
            Some(raw) => Ok(Some(StoredDesign::from_json(&raw)?)),
            None => Ok(None),
        }
    }

    /// Load and repair. Never fails: anything unusable yields an empty design.
    pub fn load(&self) -> LoadedDesign {
        match self.load_stored() {
            Ok(Some(stored)) => migration::migrate(stored),
            Ok(None) => {
                tracing::debug!("No stored design under record '{}'", self.record);
                LoadedDesign::empty()
            }
            Err(e) => {
                tracing::warn!(
                    "Stored design '{}' is unreadable, starting empty: {}",
                    self.record,
                    e
                );
                let mut loaded = LoadedDesign::empty();
                loaded.report.unreadable_record = true;
                loaded
            }
        }
    }

    /// Delete the record.
    pub fn clear(&self) -> Result<()> {
        self.storage.remove(&self.record)
    }
}

/// Where the CLI and server keep their design.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub record: String,
}

impl StorageConfig {
    pub fn new(root: impl Into<PathBuf>, record: impl Into<String>) -> Self {
        StorageConfig {
            root: root.into(),
            record: record.into(),
        }
    }

    pub fn file_storage(&self) -> FileStorage {
        FileStorage::in_root(&self.root)
    }

    pub fn open(&self) -> DesignStore {
        DesignStore::new(self.file_storage(), self.record.clone())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(".", DEFAULT_RECORD)
    }
}
