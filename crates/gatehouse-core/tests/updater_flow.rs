//! End-to-end tests of the build updater against a mock update server.

use sha2::{Digest, Sha256};

use gatehouse_core::{BuildUpdater, GatehouseConfig, Layout, UpdateError, UNKNOWN_BUILD};
use gatehouse_schema::{Manifest, ManifestFile, Sha256Digest};

fn sha256_of(bytes: &[u8]) -> Sha256Digest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Sha256Digest::from_bytes(&hasher.finalize())
}

fn updater_for(base_url: &str, home: &std::path::Path) -> BuildUpdater {
    let config = GatehouseConfig {
        update_base_url: base_url.to_string(),
        ..GatehouseConfig::default()
    };
    BuildUpdater::new(Layout::new(home), config)
}

fn manifest(build_id: &str, files: Vec<ManifestFile>) -> Manifest {
    Manifest {
        build_id: build_id.into(),
        runtime_version: "6000.0.23f1".into(),
        channel: "stable".into(),
        files,
        signature: "c2lnbmVkCg==".into(),
    }
}

fn file_entry(path: &str, body: &[u8]) -> ManifestFile {
    ManifestFile {
        path: path.into(),
        sha256: sha256_of(body),
        size: body.len() as u64,
        url: None,
    }
}

#[tokio::test]
async fn remote_manifest_parses_the_channel_document() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("GET", "/stable/manifest.json")
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "build_id": "2026-07-beta12",
                "runtime_version": "6000.0.23f1",
                "channel": "stable",
                "files": [],
                "signature": "c2lnbmVkCg=="
            }"#,
        )
        .create_async()
        .await;

    let home = tempfile::tempdir().unwrap();
    let updater = updater_for(&server.url(), home.path());

    let manifest = updater.remote_manifest("stable").await.unwrap();
    assert_eq!(manifest.build_id, "2026-07-beta12");
    assert_eq!(manifest.channel, "stable");
}

#[tokio::test]
async fn remote_manifest_is_absent_on_failure() {
    let mut server = mockito::Server::new_async().await;
    let _gone = server
        .mock("GET", "/stable/manifest.json")
        .with_status(500)
        .create_async()
        .await;
    let _bad = server
        .mock("GET", "/nightly/manifest.json")
        .with_body("{ not json")
        .create_async()
        .await;

    let home = tempfile::tempdir().unwrap();
    let updater = updater_for(&server.url(), home.path());

    assert!(updater.remote_manifest("stable").await.is_none());
    assert!(updater.remote_manifest("nightly").await.is_none());
}

#[tokio::test]
async fn apply_installs_every_file_and_flips_the_marker() {
    let exe = b"binary contents of the game";
    let pak = b"level data";

    let mut server = mockito::Server::new_async().await;
    let _exe = server
        .mock("GET", "/stable/Game.exe")
        .with_body(exe)
        .create_async()
        .await;
    let _pak = server
        .mock("GET", "/stable/data/level0.pak")
        .with_body(pak)
        .create_async()
        .await;

    let home = tempfile::tempdir().unwrap();
    let layout = Layout::new(home.path());
    let updater = updater_for(&server.url(), home.path());
    assert_eq!(updater.local_build("stable"), UNKNOWN_BUILD);

    let manifest = manifest(
        "2026-07-beta12",
        vec![
            file_entry("Game.exe", exe),
            file_entry("data/level0.pak", pak),
        ],
    );

    updater.apply(&manifest).await.unwrap();

    assert_eq!(updater.local_build("stable"), "2026-07-beta12");

    let build_dir = layout.build_path("2026-07-beta12");
    assert_eq!(std::fs::read(build_dir.join("Game.exe")).unwrap(), exe);
    assert_eq!(
        std::fs::read(build_dir.join("data/level0.pak")).unwrap(),
        pak
    );
    // every installed file hashes to its manifest entry
    for file in &manifest.files {
        assert_eq!(
            gatehouse_core::hash::hash_file(&build_dir.join(&file.path)).unwrap(),
            file.sha256
        );
    }
    // no stray temp files
    assert!(!build_dir.join("Game.exe.part").exists());

    // the manifest snapshot sits alongside the build
    let snapshot: Manifest =
        serde_json::from_str(&std::fs::read_to_string(build_dir.join("manifest.json")).unwrap())
            .unwrap();
    assert_eq!(snapshot, manifest);
}

#[tokio::test]
async fn failed_apply_leaves_the_marker_untouched() {
    let good = b"good file";

    let mut server = mockito::Server::new_async().await;
    let _good = server
        .mock("GET", "/stable/good.pak")
        .with_body(good)
        .create_async()
        .await;
    let _bad = server
        .mock("GET", "/stable/bad.pak")
        .with_body(b"not what the manifest promised")
        .create_async()
        .await;

    let home = tempfile::tempdir().unwrap();
    let layout = Layout::new(home.path());
    let updater = updater_for(&server.url(), home.path());

    // a known-good build is already active
    std::fs::create_dir_all(layout.builds_dir()).unwrap();
    std::fs::write(layout.marker_path("stable"), "2026-06-beta11").unwrap();

    let manifest = manifest(
        "2026-07-beta12",
        vec![
            file_entry("good.pak", good),
            file_entry("bad.pak", b"the expected contents"),
        ],
    );

    let err = updater.apply(&manifest).await.unwrap_err();
    assert!(matches!(err, UpdateError::Integrity { ref path, .. } if path == "bad.pak"));

    // the launcher keeps using the previous build
    assert_eq!(updater.local_build("stable"), "2026-06-beta11");
    // the mismatching file was never promoted into the build directory
    assert!(!layout.build_path("2026-07-beta12").join("bad.pak").exists());
}

#[tokio::test]
async fn transport_failure_fails_the_whole_apply() {
    let mut server = mockito::Server::new_async().await;
    let _gone = server
        .mock("GET", "/stable/missing.pak")
        .with_status(404)
        .create_async()
        .await;

    let home = tempfile::tempdir().unwrap();
    let updater = updater_for(&server.url(), home.path());

    let manifest = manifest(
        "2026-07-beta12",
        vec![file_entry("missing.pak", b"never arrives")],
    );

    let err = updater.apply(&manifest).await.unwrap_err();
    assert!(matches!(err, UpdateError::Download { .. }));
    assert_eq!(updater.local_build("stable"), UNKNOWN_BUILD);
}

#[tokio::test]
async fn manifest_paths_may_not_escape_the_build_directory() {
    let home = tempfile::tempdir().unwrap();
    // base URL never contacted; traversal is rejected before any transfer
    let updater = updater_for("http://127.0.0.1:1", home.path());

    let manifest = manifest(
        "2026-07-beta12",
        vec![file_entry("../outside.dll", b"escape attempt")],
    );

    let err = updater.apply(&manifest).await.unwrap_err();
    assert!(matches!(err, UpdateError::UnsafePath { ref path } if path == "../outside.dll"));
    assert_eq!(updater.local_build("stable"), UNKNOWN_BUILD);
}
