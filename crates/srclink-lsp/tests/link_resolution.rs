//! End-to-end tests for source link resolution through the LSP surface.
//!
//! These tests drive the backend the way a client would: initialize with a
//! package environment on disk, open and edit documents, and request
//! document links.

use std::fs;

use tempfile::TempDir;
use tower_lsp_server::ls_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DocumentLink, DocumentLinkParams, InitializeParams, Position, Range,
    TextDocumentContentChangeEvent, TextDocumentIdentifier, TextDocumentItem, Uri,
    VersionedTextDocumentIdentifier,
};
use tower_lsp_server::{LanguageServer, LspService};

use srclink_lsp::Backend;

/// Creates an installed package tree: `<root>/pkgs/demo-1.0.0/lib/demo.rb`.
fn package_fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    let package_root = dir.path().join("pkgs/demo-1.0.0/lib");
    fs::create_dir_all(&package_root).unwrap();
    fs::write(package_root.join("demo.rb"), "module Demo\nend\n").unwrap();
    dir
}

async fn initialized_backend(
    fixture: &TempDir,
) -> (tower_lsp_server::LspService<Backend>, tower_lsp_server::ClientSocket) {
    let (service, socket) = LspService::build(Backend::new).finish();

    let params = InitializeParams {
        initialization_options: Some(serde_json::json!({
            "package_roots": [fixture.path().join("pkgs")]
        })),
        ..Default::default()
    };
    service.inner().initialize(params).await.unwrap();

    (service, socket)
}

fn document_uri(fixture: &TempDir, name: &str) -> Uri {
    Uri::from_file_path(fixture.path().join(name)).unwrap()
}

async fn open(service: &LspService<Backend>, uri: &Uri, text: &str) {
    service
        .inner()
        .did_open(DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: uri.clone(),
                language_id: "ruby".into(),
                version: 1,
                text: text.into(),
            },
        })
        .await;
}

async fn links_for(service: &LspService<Backend>, uri: &Uri) -> Vec<DocumentLink> {
    service
        .inner()
        .document_link(DocumentLinkParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        })
        .await
        .unwrap()
        .unwrap_or_default()
}

fn target_string(link: &DocumentLink) -> String {
    match serde_json::to_value(link.target.clone().unwrap()).unwrap() {
        serde_json::Value::String(target) => target,
        other => panic!("expected string target, got {other:?}"),
    }
}

fn expected_target(fixture: &TempDir, line: u32) -> String {
    format!(
        "file://{}#{}",
        fixture.path().join("pkgs/demo-1.0.0/lib/demo.rb").display(),
        line
    )
}

#[tokio::test]
async fn test_resolves_inline_versioned_reference() {
    let fixture = package_fixture();
    let (service, _socket) = initialized_backend(&fixture).await;
    let uri = document_uri(&fixture, "app.rb");

    open(
        &service,
        &uri,
        "# source://demo@1.0.0/lib/demo.rb#42\ndef run; end\n",
    )
    .await;
    let links = links_for(&service, &uri).await;

    assert_eq!(links.len(), 1);
    assert_eq!(target_string(&links[0]), expected_target(&fixture, 42));
    assert_eq!(
        links[0].tooltip.as_deref(),
        Some(
            format!(
                "Jump to {}#42",
                fixture.path().join("pkgs/demo-1.0.0/lib/demo.rb").display()
            )
            .as_str()
        )
    );
    assert_eq!(
        links[0].range,
        Range::new(Position::new(0, 0), Position::new(0, 36))
    );
}

#[tokio::test]
async fn test_resolves_installed_version_fallback() {
    let fixture = package_fixture();
    let (service, _socket) = initialized_backend(&fixture).await;
    let uri = document_uri(&fixture, "app.rb");

    open(&service, &uri, "# source://demo/lib/demo.rb#7\n").await;
    let links = links_for(&service, &uri).await;

    assert_eq!(links.len(), 1);
    assert_eq!(target_string(&links[0]), expected_target(&fixture, 7));
}

#[tokio::test]
async fn test_unresolvable_reference_yields_no_links() {
    let fixture = package_fixture();
    let (service, _socket) = initialized_backend(&fixture).await;
    let uri = document_uri(&fixture, "app.rb");

    open(
        &service,
        &uri,
        "# source://not_installed@1.0.0/lib/gone.rb#1\n",
    )
    .await;

    assert!(links_for(&service, &uri).await.is_empty());
}

#[tokio::test]
async fn test_edits_invalidate_cached_links() {
    let fixture = package_fixture();
    let (service, _socket) = initialized_backend(&fixture).await;
    let uri = document_uri(&fixture, "app.rb");

    open(&service, &uri, "# source://demo@1.0.0/lib/demo.rb#42\n").await;
    assert_eq!(links_for(&service, &uri).await.len(), 1);

    // Replace the comment line with plain code.
    service
        .inner()
        .did_change(DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: uri.clone(),
                version: 2,
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                range: Some(Range::new(Position::new(0, 0), Position::new(0, 36))),
                range_length: None,
                text: "def run; end".into(),
            }],
        })
        .await;

    assert!(links_for(&service, &uri).await.is_empty());
}

#[tokio::test]
async fn test_closed_document_is_reloaded_from_disk() {
    let fixture = package_fixture();
    let (service, _socket) = initialized_backend(&fixture).await;

    let on_disk = fixture.path().join("checked_in.rb");
    fs::write(&on_disk, "# source://demo@1.0.0/lib/demo.rb#3\n").unwrap();
    let uri = Uri::from_file_path(&on_disk).unwrap();

    // Never opened by the client: the store loads it on demand.
    let links = links_for(&service, &uri).await;
    assert_eq!(links.len(), 1);
    assert_eq!(target_string(&links[0]), expected_target(&fixture, 3));

    // Closing drops the entry; the next request loads fresh from disk.
    open(&service, &uri, "# source://demo@1.0.0/lib/demo.rb#3\n").await;
    service
        .inner()
        .did_close(DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier { uri: uri.clone() },
        })
        .await;
    assert!(service.inner().state().store.is_empty());

    fs::write(&on_disk, "# no reference anymore\n").unwrap();
    assert!(links_for(&service, &uri).await.is_empty());
}

#[tokio::test]
async fn test_filename_hint_resolves_signature_files() {
    let fixture = package_fixture();
    // A second installed version so the hint has something distinct to pick.
    let newer = fixture.path().join("pkgs/demo-2.0.0/lib");
    fs::create_dir_all(&newer).unwrap();
    fs::write(newer.join("demo.rb"), "module Demo\nend\n").unwrap();

    let (service, _socket) = initialized_backend(&fixture).await;
    let uri = document_uri(&fixture, "demo@2.0.0.rbi");

    open(&service, &uri, "# source://demo/lib/demo.rb#12\n").await;
    let links = links_for(&service, &uri).await;

    assert_eq!(links.len(), 1);
    let target = target_string(&links[0]);
    assert!(
        target.contains("demo-2.0.0"),
        "filename hint must beat the installed fallback: {target}"
    );
}

#[tokio::test]
async fn test_stale_edit_batches_do_not_corrupt_state() {
    let fixture = package_fixture();
    let (service, _socket) = initialized_backend(&fixture).await;
    let uri = document_uri(&fixture, "app.rb");

    open(&service, &uri, "# source://demo@1.0.0/lib/demo.rb#42\n").await;

    // Same version as the open: a protocol violation, rejected wholesale.
    service
        .inner()
        .did_change(DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier {
                uri: uri.clone(),
                version: 1,
            },
            content_changes: vec![TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text: "clobbered\n".into(),
            }],
        })
        .await;

    let links = links_for(&service, &uri).await;
    assert_eq!(links.len(), 1, "rejected batch must leave the text intact");
}

#[tokio::test]
async fn test_bundled_package_resolution() {
    let fixture = package_fixture();
    let lib_dir = fixture.path().join("lang/lib");
    fs::create_dir_all(&lib_dir).unwrap();
    fs::write(lib_dir.join("stdkit.rb"), "module Stdkit\nend\n").unwrap();

    let (service, _socket) = LspService::build(Backend::new).finish();
    let params = InitializeParams {
        initialization_options: Some(serde_json::json!({
            "bundled_packages": [{
                "name": "stdkit",
                "version": "3.1.0",
                "lib_dir": &lib_dir,
                "load_paths": ["lib"],
                "files": ["lib/stdkit.rb"]
            }]
        })),
        ..Default::default()
    };
    service.inner().initialize(params).await.unwrap();

    let uri = document_uri(&fixture, "app.rb");
    open(&service, &uri, "# source://stdkit/stdkit.rb#4\n").await;

    let links = links_for(&service, &uri).await;
    assert_eq!(links.len(), 1);
    assert_eq!(
        target_string(&links[0]),
        format!("file://{}#4", lib_dir.join("stdkit.rb").display())
    );
}
