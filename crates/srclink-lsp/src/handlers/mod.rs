//! LSP protocol handlers.
//!
//! Each handler extracts what it needs from [`crate::state::ServerState`]
//! and degrades gracefully on errors; a request must never crash the
//! server.

pub mod document_link;
