//! Enumeration of installed packages.
//!
//! The catalog answers one question cheaply: which packages are installed,
//! at which version, and where do their files live. It never walks package
//! contents; that is the index's job.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Where an installed package keeps its files.
#[derive(Debug, Clone)]
pub enum PackageLayout {
    /// The package owns a filesystem root; every file under it belongs to
    /// the package, keyed by its root-relative path.
    Rooted { root: PathBuf },
    /// A bundled/standard package whose files sit in a shared library
    /// directory. Each listed file is keyed by its path with any load-path
    /// prefix stripped, so lookups by require-time path match regardless of
    /// where the file physically sits.
    Shared {
        lib_dir: PathBuf,
        load_paths: Vec<String>,
        files: Vec<String>,
    },
}

/// One installed package as reported by a catalog.
#[derive(Debug, Clone)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    pub layout: PackageLayout,
}

/// Source of installed-package listings.
///
/// Listing must be cheap (no recursive walk); it runs during server startup
/// to build the flat name-to-version map and once more when the package
/// index is first built.
pub trait PackageCatalog: Send + Sync {
    fn installed(&self) -> Vec<InstalledPackage>;
}

/// Catalog backed by package-root directories on disk.
///
/// Each configured root holds one subdirectory per installed package, named
/// `<name>-<version>`. Bundled packages (shared-root layout) are supplied
/// up front by the server configuration since their files are not
/// discoverable from a directory name alone.
///
/// Unreadable roots and unparsable directory names are skipped with a log
/// line; a half-installed environment should degrade, not fail.
pub struct DirCatalog {
    package_roots: Vec<PathBuf>,
    bundled: Vec<InstalledPackage>,
}

impl DirCatalog {
    pub fn new(package_roots: Vec<PathBuf>, bundled: Vec<InstalledPackage>) -> Self {
        Self {
            package_roots,
            bundled,
        }
    }
}

impl PackageCatalog for DirCatalog {
    fn installed(&self) -> Vec<InstalledPackage> {
        let mut packages = Vec::new();

        for root in &self.package_roots {
            let entries = match fs::read_dir(root) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("skipping unreadable package root {:?}: {}", root, e);
                    continue;
                }
            };

            for entry in entries.flatten() {
                if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    continue;
                }
                let dir_name = entry.file_name().to_string_lossy().into_owned();
                let Some((name, version)) = split_versioned_dir_name(&dir_name) else {
                    tracing::debug!("ignoring non-package directory {:?}", dir_name);
                    continue;
                };
                packages.push(InstalledPackage {
                    name,
                    version,
                    layout: PackageLayout::Rooted { root: entry.path() },
                });
            }
        }

        packages.extend(self.bundled.iter().cloned());
        packages
    }
}

/// Builds the flat name-to-version map used for installed-version fallback
/// during link resolution. One listing, no walk; the first entry wins when
/// a name appears in several roots.
pub fn installed_versions(catalog: &dyn PackageCatalog) -> HashMap<String, String> {
    let mut versions = HashMap::new();
    for package in catalog.installed() {
        versions.entry(package.name).or_insert(package.version);
    }
    versions
}

/// Splits a `<name>-<version>` directory name at the last `-` that is
/// followed by an ASCII digit, so names containing `-` and versions
/// containing `.` or pre-release tags both parse.
fn split_versioned_dir_name(dir_name: &str) -> Option<(String, String)> {
    let split_at = dir_name
        .match_indices('-')
        .filter(|(i, _)| {
            dir_name.as_bytes().get(i + 1).is_some_and(u8::is_ascii_digit)
        })
        .map(|(i, _)| i)
        .last()?;

    let name = &dir_name[..split_at];
    let version = &dir_name[split_at + 1..];
    (!name.is_empty() && !version.is_empty()).then(|| (name.to_owned(), version.to_owned()))
}
