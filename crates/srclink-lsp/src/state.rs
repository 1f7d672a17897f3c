//! Shared server state.

use once_cell::sync::OnceCell;
use srclink_core::{DocumentStore, PackageIndex};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything link resolution needs besides the document itself.
///
/// Built once during initialization, after the client's configuration is
/// known: the package index (still lazy, built on first use) and the flat
/// installed-version map. Handlers receive it explicitly instead of
/// reaching for global state.
pub struct LinkContext {
    pub index: PackageIndex,
    pub installed_versions: HashMap<String, String>,
}

/// Global LSP server state.
///
/// Shared across all handlers via `Arc`. The store carries every open
/// document; `links` stays unset until `initialize` has loaded the client
/// configuration.
pub struct ServerState {
    pub store: DocumentStore,
    pub links: OnceCell<Arc<LinkContext>>,
}

impl ServerState {
    pub fn new() -> Self {
        Self {
            store: DocumentStore::new(),
            links: OnceCell::new(),
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}
