//! Process-wide index of installed package contents.
//!
//! Maps the (package name, version, relative file path) triple to the file's
//! absolute location on disk. The nested name/version/path shape is
//! flattened into one map keyed by the triple; lookup semantics are the
//! same, without the multi-level traversal.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::OnceCell;
use walkdir::WalkDir;

use crate::catalog::{PackageCatalog, PackageLayout};

type IndexTable = HashMap<(String, String, String), PathBuf>;

/// Build-once mapping from package file coordinates to absolute paths.
///
/// The build is lazy and happens at most once per process: the first caller
/// triggers it, concurrent first callers share the single execution, and
/// the result is immutable afterwards. Packages that change on disk during
/// the server's lifetime are deliberately not picked up; rebuilding means a
/// full directory walk per installed package, and installed packages are
/// assumed stable while the server runs.
///
/// # Examples
///
/// ```no_run
/// use srclink_core::{DirCatalog, PackageIndex};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let catalog = Arc::new(DirCatalog::new(vec!["/pkgs".into()], Vec::new()));
/// let index = PackageIndex::new(catalog);
///
/// index.ensure_built().await;
/// let path = index.lookup("demo", "1.0.0", "lib/demo.rb");
/// # let _ = path;
/// # }
/// ```
pub struct PackageIndex {
    catalog: Arc<dyn PackageCatalog>,
    table: OnceCell<IndexTable>,
}

impl PackageIndex {
    pub fn new(catalog: Arc<dyn PackageCatalog>) -> Self {
        Self {
            catalog,
            table: OnceCell::new(),
        }
    }

    /// Builds the index if no caller has built it yet.
    ///
    /// Concurrent callers collapse into one execution; the walk runs on the
    /// blocking pool since it is the only expensive I/O in this crate.
    /// A caller that stops waiting leaves the build running to completion,
    /// so the table is never observed half-filled.
    pub async fn ensure_built(&self) {
        self.table
            .get_or_init(|| async {
                let catalog = Arc::clone(&self.catalog);
                match tokio::task::spawn_blocking(move || build_table(catalog.as_ref())).await {
                    Ok(table) => {
                        tracing::info!("package index built: {} files", table.len());
                        table
                    }
                    Err(e) => {
                        tracing::error!("package index build task failed: {}", e);
                        IndexTable::new()
                    }
                }
            })
            .await;
    }

    /// Pure read: the absolute path for a package file, or `None` for any
    /// unmatched combination (including an index that has not been built).
    pub fn lookup(&self, name: &str, version: &str, relative_path: &str) -> Option<&Path> {
        self.table
            .get()?
            .get(&(name.to_owned(), version.to_owned(), relative_path.to_owned()))
            .map(PathBuf::as_path)
    }
}

fn build_table(catalog: &dyn PackageCatalog) -> IndexTable {
    let mut table = IndexTable::new();

    for package in catalog.installed() {
        match &package.layout {
            PackageLayout::Rooted { root } => {
                index_rooted(&mut table, &package.name, &package.version, root);
            }
            PackageLayout::Shared {
                lib_dir,
                load_paths,
                files,
            } => {
                for file in files {
                    let stripped = strip_load_path(file, load_paths);
                    table.insert(
                        (package.name.clone(), package.version.clone(), stripped.clone()),
                        lib_dir.join(&stripped),
                    );
                }
            }
        }
    }

    table
}

fn index_rooted(table: &mut IndexTable, name: &str, version: &str, root: &Path) {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry under {:?}: {}", root, e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        table.insert(
            (name.to_owned(), version.to_owned(), relative_key(relative)),
            entry.into_path(),
        );
    }
}

/// Joins path components with `/` so index keys match require-time paths on
/// every platform.
fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Strips the first matching load-path prefix, so a file listed as
/// `lib/demo.rb` under the `lib` load path is keyed as `demo.rb`.
fn strip_load_path(file: &str, load_paths: &[String]) -> String {
    for load_path in load_paths {
        let prefix = format!("{}/", load_path.trim_end_matches('/'));
        if let Some(rest) = file.strip_prefix(&prefix) {
            return rest.to_owned();
        }
    }
    file.to_owned()
}
