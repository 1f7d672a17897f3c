//! Resolution of comment references into clickable link targets.

use std::collections::HashMap;

use tower_lsp_server::ls_types::{Position, Range, Uri};

use crate::document::{Document, encoded_len};
use crate::index::PackageIndex;
use crate::source_ref::{SourceRef, parse_trailing_reference};
use crate::store::percent_decode;

/// One resolved link: where it sits in the document, where it points, and
/// what to show on hover. Produced transiently per scan, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLink {
    pub range: Range,
    pub target: String,
    pub tooltip: String,
}

/// Per-document scanner turning `source://` comments into [`SourceLink`]s.
///
/// Constructed once per document; construction parses the optional version
/// hint out of the document's own filename. Versioned type-signature files
/// are named `<something>@<version>.rbi`, and references inside them
/// usually omit the inline version.
///
/// The effective version for each reference follows strict precedence:
/// the reference's own inline version, then the filename hint, then the
/// installed version of the named package. A reference that falls through
/// all three is dropped.
pub struct SourceLinkResolver<'a> {
    filename_version: Option<String>,
    installed_versions: &'a HashMap<String, String>,
    index: &'a PackageIndex,
}

impl<'a> SourceLinkResolver<'a> {
    pub fn new(
        uri: &Uri,
        installed_versions: &'a HashMap<String, String>,
        index: &'a PackageIndex,
    ) -> Self {
        Self {
            filename_version: filename_version_hint(uri),
            installed_versions,
            index,
        }
    }

    /// Scans the document top to bottom and returns every resolvable link
    /// in scan order. Each invocation re-scans from scratch; results are
    /// meant to be memoized per document via the store's cache.
    ///
    /// Comments that carry no reference, references whose version cannot be
    /// determined, and references the index does not know are all skipped
    /// silently; stale or unresolvable references are the common case.
    pub fn resolve(&self, document: &Document) -> Vec<SourceLink> {
        let encoding = document.encoding();
        let mut links = Vec::new();

        for (line_number, line) in document.text().lines().enumerate() {
            let trimmed = line.trim_start();
            if !trimmed.starts_with('#') {
                continue;
            }
            let comment = trimmed.trim_end();

            let Some(reference) = parse_trailing_reference(comment) else {
                continue;
            };
            let Some(version) = self.effective_version(&reference) else {
                continue;
            };
            let Some(absolute) = self.index.lookup(&reference.name, &version, &reference.path)
            else {
                continue;
            };

            let indent = &line[..line.len() - trimmed.len()];
            let start = encoded_len(indent, encoding);
            let range = Range::new(
                Position::new(line_number as u32, start),
                Position::new(line_number as u32, start + encoded_len(comment, encoding)),
            );

            let absolute = absolute.display();
            links.push(SourceLink {
                range,
                target: format!("file://{absolute}#{}", reference.line),
                tooltip: format!("Jump to {absolute}#{}", reference.line),
            });
        }

        links
    }

    fn effective_version(&self, reference: &SourceRef) -> Option<String> {
        if let Some(version) = &reference.version
            && !version.is_empty()
        {
            return Some(version.clone());
        }
        if let Some(version) = &self.filename_version
            && !version.is_empty()
        {
            return Some(version.clone());
        }
        self.installed_versions
            .get(&reference.name)
            .filter(|version| !version.is_empty())
            .cloned()
    }
}

/// Pulls the version tag out of a versioned type-signature filename,
/// e.g. `demo@1.0.0.rbi`.
fn filename_version_hint(uri: &Uri) -> Option<String> {
    let path = percent_decode(uri.path().as_str());
    let filename = path.rsplit('/').next()?;
    let stem = filename.strip_suffix(".rbi")?;
    let (_, version) = stem.rsplit_once('@')?;
    (!version.is_empty() && version.bytes().all(|b| b.is_ascii_digit() || b == b'.'))
        .then(|| version.to_owned())
}
