// Record store: the single owner of the collection and credential

use crate::backend::{Backend, FileBackend};
use crate::record::{Book, NewBook};
use eyre::{Context, Result, eyre};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Storage key holding the JSON array of books
pub const COLLECTION_KEY: &str = "booker.collection.v1";

/// Storage key holding the raw credential string
pub const CREDENTIAL_KEY: &str = "booker.api_key.v1";

const CURRENT_VERSION: u32 = 1;

/// Book collection plus credential, persisted after every mutation
pub struct Store<B: Backend = FileBackend> {
    backend: B,
    items: Vec<Book>,
    credential: String,
}

impl Store<FileBackend> {
    /// Open or create a store in the given directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let backend = FileBackend::new(path.as_ref())?;
        Self::check_version(backend.dir())?;

        let store = Self::with_backend(backend);
        info!(
            path = ?path.as_ref(),
            count = store.items.len(),
            has_credential = store.credential().is_some(),
            "Opened store"
        );
        Ok(store)
    }

    /// Directory the store lives in
    pub fn base_path(&self) -> &Path {
        self.backend.dir()
    }

    /// Write the version file on first open; refuse stores written by a newer version
    fn check_version(dir: &Path) -> Result<()> {
        let version_path = dir.join(".version");
        if !version_path.exists() {
            fs::write(version_path, CURRENT_VERSION.to_string()).context("Failed to write version file")?;
            return Ok(());
        }

        let content = fs::read_to_string(&version_path).context("Failed to read version file")?;
        match content.trim().parse::<u32>() {
            Ok(version) if version > CURRENT_VERSION => Err(eyre!(
                "Store at {:?} has version {} (this build supports up to {})",
                dir,
                version,
                CURRENT_VERSION
            )),
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(path = ?version_path, error = ?e, "Unreadable version file, rewriting");
                fs::write(version_path, CURRENT_VERSION.to_string()).context("Failed to write version file")?;
                Ok(())
            }
        }
    }
}

impl<B: Backend> Store<B> {
    /// Build a store on top of any backend, loading existing state
    pub fn with_backend(backend: B) -> Self {
        let items = Self::load_items(&backend);
        let credential = Self::load_credential(&backend);
        Self {
            backend,
            items,
            credential,
        }
    }

    /// Re-read collection and credential from the backend
    pub fn load(&mut self) {
        self.items = Self::load_items(&self.backend);
        self.credential = Self::load_credential(&self.backend);
    }

    /// All books in insertion order
    pub fn items(&self) -> &[Book] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current credential, `None` when unset
    pub fn credential(&self) -> Option<&str> {
        if self.credential.is_empty() {
            None
        } else {
            Some(&self.credential)
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ========================================================================
    // Collection mutations
    // ========================================================================

    /// Add a book from raw input
    ///
    /// Returns the new id, or `None` when the title is blank (nothing stored).
    pub fn add(&mut self, input: &NewBook) -> Result<Option<String>> {
        let book = match Book::from_input(input) {
            Some(b) => b,
            None => {
                debug!("add: blank title, ignoring");
                return Ok(None);
            }
        };

        let id = book.id.clone();
        self.items.push(book);
        self.persist_items()?;

        debug!(id = %id, count = self.items.len(), "add: stored book");
        Ok(Some(id))
    }

    /// Remove the book with `id`; returns whether anything was removed
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let before = self.items.len();
        self.items.retain(|b| b.id != id);
        let removed = self.items.len() != before;

        self.persist_items()?;

        debug!(id, removed, "remove: done");
        Ok(removed)
    }

    /// Swap the entire collection
    pub fn replace_all(&mut self, records: Vec<Book>) -> Result<()> {
        self.items = records;
        self.persist_items()?;
        info!(count = self.items.len(), "Replaced collection");
        Ok(())
    }

    /// Drop every book
    pub fn clear_all(&mut self) -> Result<()> {
        self.replace_all(Vec::new())
    }

    // ========================================================================
    // Credential
    // ========================================================================

    /// Store a credential; an empty value clears it
    pub fn set_credential(&mut self, value: &str) -> Result<()> {
        if value.is_empty() {
            return self.clear_credential();
        }
        self.backend
            .set(CREDENTIAL_KEY, value)
            .context("Failed to persist credential")?;
        self.credential = value.to_string();
        Ok(())
    }

    pub fn clear_credential(&mut self) -> Result<()> {
        self.backend
            .remove(CREDENTIAL_KEY)
            .context("Failed to remove credential")?;
        self.credential.clear();
        Ok(())
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    fn persist_items(&mut self) -> Result<()> {
        let json = serde_json::to_string(&self.items).context("Failed to serialize collection")?;
        self.backend
            .set(COLLECTION_KEY, &json)
            .context("Failed to persist collection")
    }

    fn load_items(backend: &B) -> Vec<Book> {
        let raw = match backend.get(COLLECTION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = ?e, "Failed to read stored collection, starting empty");
                return Vec::new();
            }
        };

        let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(serde_json::Value::Array(values)) => values,
            Ok(_) => {
                warn!("Stored collection is not an array, starting empty");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = ?e, "Stored collection is not valid JSON, starting empty");
                return Vec::new();
            }
        };

        let mut items = Vec::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<Book>(value) {
                Ok(book) => items.push(book),
                Err(e) => {
                    warn!(index, error = ?e, "Failed to parse stored book, skipping");
                }
            }
        }

        debug!(count = items.len(), "Loaded collection");
        items
    }

    fn load_credential(backend: &B) -> String {
        match backend.get(CREDENTIAL_KEY) {
            Ok(Some(value)) => value,
            Ok(None) => String::new(),
            Err(e) => {
                warn!(error = ?e, "Failed to read stored credential, ignoring");
                String::new()
            }
        }
    }
}
