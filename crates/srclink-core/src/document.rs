//! A single open text buffer with version tracking and request memoization.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use tower_lsp_server::ls_types::{
    Position, PositionEncodingKind, TextDocumentContentChangeEvent, Uri,
};

use crate::error::{Result, SrclinkError};

/// One open document: its live text, its synchronization version, and a
/// per-request cache of derived computations.
///
/// The version only moves forward. Edit batches carrying a version that is
/// not strictly greater than the current one are rejected without touching
/// the text, since an out-of-order batch means the client and server have
/// desynchronized.
///
/// The cache maps an arbitrary request key to the last value computed for it.
/// Any text mutation drops the whole cache; entries are only valid for the
/// exact text they were computed against.
///
/// # Examples
///
/// ```
/// use srclink_core::Document;
/// use tower_lsp_server::ls_types::{PositionEncodingKind, Uri};
///
/// let uri = Uri::from_file_path("/workspace/app.rb").unwrap();
/// let mut document = Document::new(uri, "puts 1\n".into(), 0, PositionEncodingKind::UTF16);
///
/// let lines = document.cache_fetch("line_count", |doc| doc.text().lines().count());
/// assert_eq!(lines, 1);
/// ```
pub struct Document {
    uri: Uri,
    text: String,
    version: i32,
    encoding: PositionEncodingKind,
    cache: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Document {
    pub fn new(uri: Uri, text: String, version: i32, encoding: PositionEncodingKind) -> Self {
        Self {
            uri,
            text,
            version,
            encoding,
            cache: HashMap::new(),
        }
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn encoding(&self) -> &PositionEncodingKind {
        &self.encoding
    }

    /// Applies an edit batch in arrival order, then advances to `version`.
    ///
    /// The whole batch is validated before any mutation: a version that is
    /// not strictly greater than the current one leaves both the text and
    /// the version untouched and returns [`SrclinkError::StaleVersion`].
    ///
    /// A change event without a range replaces the full text; ranged events
    /// splice into the current text at positions interpreted in this
    /// document's negotiated position encoding. Applying any batch
    /// invalidates every cached computation.
    pub fn push_edits(
        &mut self,
        edits: &[TextDocumentContentChangeEvent],
        version: i32,
    ) -> Result<()> {
        if version <= self.version {
            return Err(SrclinkError::StaleVersion {
                location: self.uri.path().as_str().to_owned(),
                current: self.version,
                received: version,
            });
        }

        for edit in edits {
            match edit.range {
                Some(range) => {
                    let start = position_to_offset(&self.text, range.start, &self.encoding);
                    let end = position_to_offset(&self.text, range.end, &self.encoding);
                    let (start, end) = if start <= end { (start, end) } else { (end, start) };
                    self.text.replace_range(start..end, &edit.text);
                }
                None => self.text = edit.text.clone(),
            }
        }

        self.version = version;
        self.cache.clear();
        Ok(())
    }

    /// Returns the memoized value for `key`, running `compute` only when the
    /// cache holds no value for it.
    ///
    /// `compute` must depend only on the document's current text and version;
    /// its result stays cached until the next edit batch invalidates it.
    pub fn cache_fetch<T, F>(&mut self, key: &str, compute: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce(&Self) -> T,
    {
        if let Some(hit) = self.cache.get(key).and_then(|value| value.downcast_ref::<T>()) {
            return hit.clone();
        }

        let value = compute(self);
        self.cache.insert(key.to_owned(), Arc::new(value.clone()));
        value
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("uri", &self.uri)
            .field("text_len", &self.text.len())
            .field("version", &self.version)
            .field("encoding", &self.encoding)
            .field("cached_entries", &self.cache.len())
            .finish()
    }
}

/// Width of one character in the given position encoding's code units.
fn char_width(c: char, encoding: &PositionEncodingKind) -> u32 {
    if *encoding == PositionEncodingKind::UTF8 {
        c.len_utf8() as u32
    } else if *encoding == PositionEncodingKind::UTF32 {
        1
    } else {
        c.len_utf16() as u32
    }
}

/// Length of `s` in code units of the given position encoding.
pub(crate) fn encoded_len(s: &str, encoding: &PositionEncodingKind) -> u32 {
    s.chars().map(|c| char_width(c, encoding)).sum()
}

/// Converts an LSP position to a byte offset into `text`.
///
/// Out-of-range positions clamp: a line past the end maps to the end of the
/// text, a column past the end of its line maps to the end of that line.
pub(crate) fn position_to_offset(
    text: &str,
    position: Position,
    encoding: &PositionEncodingKind,
) -> usize {
    let mut offset = 0;

    if position.line > 0 {
        let mut line = 0u32;
        let mut found = false;
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line += 1;
                if line == position.line {
                    offset = i + 1;
                    found = true;
                    break;
                }
            }
        }
        if !found {
            return text.len();
        }
    }

    let mut column = 0u32;
    for c in text[offset..].chars() {
        if column >= position.character || c == '\n' {
            break;
        }
        column += char_width(c, encoding);
        offset += c.len_utf8();
    }

    offset
}
