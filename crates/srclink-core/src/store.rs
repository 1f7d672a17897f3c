//! Registry of open documents keyed by normalized location.
//!
//! The store is the single source of truth for "is this file open". It is
//! shared across concurrently dispatched requests: per-entry locking means
//! edits to one document never block work on another, and a reader can never
//! observe a half-applied edit batch.

use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;
use dashmap::mapref::one::Ref;
use tokio::sync::Mutex;
use tower_lsp_server::ls_types::{
    PositionEncodingKind, TextDocumentContentChangeEvent, Uri,
};

use crate::document::Document;
use crate::error::{Result, SrclinkError};

/// Maps a location identifier to the store's lookup key.
///
/// File-backed URIs carry a hierarchical path; unsaved buffers (e.g.
/// `untitled:Untitled-1`) carry an opaque identifier in the same component.
/// Both are percent-decoded by the one rule used everywhere, so two
/// differently-encoded spellings of a location land on the same entry.
pub fn normalized_location(uri: &Uri) -> String {
    percent_decode(uri.path().as_str())
}

pub(crate) fn percent_decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| s.to_owned())
}

/// Registry of open documents, one per normalized location.
///
/// Documents enter the registry either explicitly (`set`, on open) or by a
/// load-on-miss disk read (`get`). Concurrent first-time loads of the same
/// location collapse into a single in-flight read.
///
/// # Examples
///
/// ```no_run
/// use srclink_core::DocumentStore;
/// use tower_lsp_server::ls_types::Uri;
///
/// # async fn example() -> srclink_core::Result<()> {
/// let store = DocumentStore::new();
/// let uri = Uri::from_file_path("/workspace/app.rb").unwrap();
///
/// store.set(&uri, "puts 1\n".into(), 0);
/// let document = store.get(&uri).await?;
/// assert_eq!(document.version(), 0);
/// # Ok(())
/// # }
/// ```
pub struct DocumentStore {
    documents: DashMap<String, Document>,
    /// Per-location guards serializing load-on-miss disk reads.
    loads: DashMap<String, Arc<Mutex<()>>>,
    encoding: RwLock<PositionEncodingKind>,
    disk_loads: AtomicUsize,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            loads: DashMap::new(),
            encoding: RwLock::new(PositionEncodingKind::UTF16),
            disk_loads: AtomicUsize::new(0),
        }
    }

    /// Sets the position encoding negotiated with the client.
    ///
    /// Applies to documents created after the call; encoding is negotiated
    /// once during initialization, before any document is opened.
    pub fn set_encoding(&self, encoding: PositionEncodingKind) {
        *self.encoding.write().expect("encoding lock poisoned") = encoding;
    }

    pub fn encoding(&self) -> PositionEncodingKind {
        self.encoding.read().expect("encoding lock poisoned").clone()
    }

    /// Returns the document for `uri`, loading it from disk on a miss.
    ///
    /// A missing entry triggers a binary read of the file's bytes (invalid
    /// UTF-8 is replaced, never an error) and registers the result at
    /// version 0. Read failures propagate to the caller; there is no retry.
    /// Locations without a file behind them (unsaved buffers) can only be
    /// reached through `set` first.
    ///
    /// The returned guard holds a lock on the entry; drop it before calling
    /// any mutating method for the same location.
    pub async fn get(&self, uri: &Uri) -> Result<Ref<'_, String, Document>> {
        let location = normalized_location(uri);

        if let Some(document) = self.documents.get(&location) {
            return Ok(document);
        }

        let guard = Arc::clone(self.loads.entry(location.clone()).or_default().value());
        let _in_flight = guard.lock().await;

        // A concurrent caller may have finished the load while we waited.
        if let Some(document) = self.documents.get(&location) {
            return Ok(document);
        }

        let path: std::path::PathBuf = uri
            .to_file_path()
            .ok_or_else(|| SrclinkError::NotFileBacked(location.clone()))?
            .into();
        let bytes = tokio::fs::read(&path).await?;
        self.disk_loads.fetch_add(1, Ordering::Relaxed);
        let text = String::from_utf8_lossy(&bytes).into_owned();
        tracing::debug!("loaded {} from disk ({} bytes)", location, bytes.len());

        self.documents.insert(
            location.clone(),
            Document::new(uri.clone(), text, 0, self.encoding()),
        );
        // On failure the guard entry stays registered so retries still
        // serialize; success removes it since the fast path now hits.
        self.loads.remove(&location);

        self.documents
            .get(&location)
            .ok_or(SrclinkError::DocumentNotFound { location })
    }

    /// Registers a fresh document for `uri`, replacing any prior entry and
    /// its cached computations. Used when a file is (re)opened with known
    /// full content and version.
    pub fn set(&self, uri: &Uri, text: String, version: i32) {
        let document = Document::new(uri.clone(), text, version, self.encoding());
        self.documents.insert(normalized_location(uri), document);
    }

    /// Applies an edit batch to an already-registered document.
    ///
    /// An unknown location is a protocol desynchronization and fails with
    /// [`SrclinkError::DocumentNotFound`] rather than silently dropping the
    /// batch. The batch applies atomically with respect to readers, and a
    /// version that does not strictly increase is rejected without applying
    /// anything.
    pub fn push_edits(
        &self,
        uri: &Uri,
        edits: &[TextDocumentContentChangeEvent],
        version: i32,
    ) -> Result<()> {
        let location = normalized_location(uri);
        let mut document = self
            .documents
            .get_mut(&location)
            .ok_or(SrclinkError::DocumentNotFound { location })?;
        document.push_edits(edits, version)
    }

    /// Removes the entry for `uri`. No error if absent.
    pub fn delete(&self, uri: &Uri) {
        self.documents.remove(&normalized_location(uri));
    }

    /// Empties the registry (session reset / shutdown).
    pub fn clear(&self) {
        self.documents.clear();
        self.loads.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns the memoized result of `compute` for the document at `uri`,
    /// loading the document first if necessary.
    ///
    /// `compute` must be pure with respect to the document's current text
    /// and version; its result is cached on the document until the next
    /// edit invalidates it.
    pub async fn cache_fetch<T, F>(&self, uri: &Uri, key: &str, compute: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(&Document) -> T,
    {
        let location = normalized_location(uri);
        {
            let _ = self.get(uri).await?;
        }
        let mut document = self
            .documents
            .get_mut(&location)
            .ok_or(SrclinkError::DocumentNotFound { location })?;
        Ok(document.cache_fetch(key, compute))
    }

    #[cfg(test)]
    fn disk_load_count(&self) -> usize {
        self.disk_loads.load(Ordering::Relaxed)
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}
