//! `textDocument/documentLink`: make `source://` comments clickable.

use crate::state::ServerState;
use srclink_core::{SourceLink, SourceLinkResolver};
use std::str::FromStr;
use std::sync::Arc;
use tower_lsp_server::ls_types::{DocumentLink, DocumentLinkParams, Uri};

/// Cache key for resolved links on a document; entries live until the next
/// edit invalidates them.
const CACHE_KEY: &str = "document_link";

/// Resolves every `source://` comment reference in the requested document.
///
/// The document is loaded from disk if the client never opened it, and the
/// resolved links are memoized on the document until its text changes.
/// Returns an empty list when the server has no configuration yet or the
/// document cannot be loaded.
pub async fn handle_document_link(
    state: Arc<ServerState>,
    params: DocumentLinkParams,
) -> Vec<DocumentLink> {
    let uri = params.text_document.uri;

    let Some(ctx) = state.links.get().cloned() else {
        tracing::debug!("document link requested before initialization: {:?}", uri);
        return Vec::new();
    };

    ctx.index.ensure_built().await;

    let resolved = state
        .store
        .cache_fetch(&uri, CACHE_KEY, |document| {
            SourceLinkResolver::new(document.uri(), &ctx.installed_versions, &ctx.index)
                .resolve(document)
        })
        .await;

    match resolved {
        Ok(links) => links.into_iter().filter_map(into_document_link).collect(),
        Err(e) => {
            tracing::warn!("document link resolution failed for {:?}: {}", uri, e);
            Vec::new()
        }
    }
}

fn into_document_link(link: SourceLink) -> Option<DocumentLink> {
    let target = match Uri::from_str(&link.target) {
        Ok(target) => target,
        Err(e) => {
            tracing::warn!("dropping unparsable link target {}: {}", link.target, e);
            return None;
        }
    };

    Some(DocumentLink {
        range: link.range,
        target: Some(target),
        tooltip: Some(link.tooltip),
        data: None,
    })
}
