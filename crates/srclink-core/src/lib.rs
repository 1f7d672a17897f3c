//! Session state for srclink-lsp.
//!
//! This crate owns the pieces of the server with real invariants:
//!
//! - **Document / DocumentStore**: versioned text buffers for every open
//!   file, with edit application, per-document memoization, and load-on-miss
//!   from disk. One document per normalized location, versions only move
//!   forward, and concurrent first loads collapse into a single disk read.
//! - **PackageCatalog / PackageIndex**: a cheap listing of installed
//!   packages, and a build-once immutable index from (name, version,
//!   relative path) to the file's absolute location.
//! - **SourceLinkResolver**: a per-document scanner that turns trailing
//!   `source://` comment references into resolved link targets, choosing the
//!   package version by inline tag, filename hint, or installed fallback.
//!
//! Transport, syntax trees, and the rest of the request surface live in the
//! `srclink-lsp` crate; everything here is callable without a running
//! server.

pub mod catalog;
pub mod document;
pub mod error;
pub mod index;
pub mod resolver;
pub mod source_ref;
pub mod store;

// Re-export commonly used types
pub use catalog::{DirCatalog, InstalledPackage, PackageCatalog, PackageLayout, installed_versions};
pub use document::Document;
pub use error::{Result, SrclinkError};
pub use index::PackageIndex;
pub use resolver::{SourceLink, SourceLinkResolver};
pub use source_ref::SourceRef;
pub use store::{DocumentStore, normalized_location};
