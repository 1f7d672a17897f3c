use serde::Deserialize;
use srclink_core::{InstalledPackage, PackageLayout};
use std::path::PathBuf;

/// Root configuration for the srclink-lsp server.
///
/// Provided by the LSP client via initialization options. All fields
/// default to empty, in which case the server runs with no installed
/// packages and resolves no links.
///
/// # Examples
///
/// ```
/// use srclink_lsp::config::SrclinkConfig;
///
/// let json = r#"{
///     "package_roots": ["/pkgs"],
///     "bundled_packages": [{
///         "name": "stdkit",
///         "version": "3.1.0",
///         "lib_dir": "/lang/lib",
///         "load_paths": ["lib"],
///         "files": ["lib/stdkit.rb"]
///     }]
/// }"#;
///
/// let config: SrclinkConfig = serde_json::from_str(json).unwrap();
/// assert_eq!(config.package_roots.len(), 1);
/// assert_eq!(config.bundled_packages[0].name, "stdkit");
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SrclinkConfig {
    /// Directories holding one `<name>-<version>` directory per installed
    /// package.
    #[serde(default)]
    pub package_roots: Vec<PathBuf>,
    /// Bundled packages whose files live under a shared library directory.
    #[serde(default)]
    pub bundled_packages: Vec<BundledPackageConfig>,
}

/// One bundled package declared by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct BundledPackageConfig {
    pub name: String,
    pub version: String,
    pub lib_dir: PathBuf,
    #[serde(default)]
    pub load_paths: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

impl SrclinkConfig {
    /// Maps the bundled-package section into catalog entries.
    pub fn bundled(&self) -> Vec<InstalledPackage> {
        self.bundled_packages
            .iter()
            .map(|package| InstalledPackage {
                name: package.name.clone(),
                version: package.version.clone(),
                layout: PackageLayout::Shared {
                    lib_dir: package.lib_dir.clone(),
                    load_paths: package.load_paths.clone(),
                    files: package.files.clone(),
                },
            })
            .collect()
    }
}
