//! End-to-end batches against a mock registry.

mod test_utils;

use mockito::{Mock, Server, ServerGuard};
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;
use test_utils::{build_zip, mod_archive, package_record, page_url};
use webloader::{
    spawn_batch, BatchEvent, BatchOptions, BatchOrchestrator, Cascade, InstallOutcome,
    RegistryClient,
};

fn options(mods_dir: &Path, game_dir: Option<&Path>) -> BatchOptions {
    BatchOptions {
        mods_dir: mods_dir.to_path_buf(),
        game_dir: game_dir.map(Path::to_path_buf),
        community: Some("webfishing".to_string()),
        cooldown: Duration::ZERO,
    }
}

/// Serve `archive` for `author/name` through the experimental API
fn publish(server: &mut ServerGuard, author: &str, name: &str, archive: Vec<u8>) -> Mock {
    let download_path = format!("/package/download/{}/{}/1.0.0/", author, name);
    let record = package_record(author, name, &format!("{}{}", server.url(), download_path), &[]);

    server
        .mock(
            "GET",
            format!("/api/experimental/package/{}/{}/", author, name).as_str(),
        )
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(record.to_string())
        .create();

    server
        .mock("GET", download_path.as_str())
        .with_status(200)
        .with_header("content-type", "application/zip")
        .with_body(archive)
        .create()
}

#[test]
fn test_install_then_skip() {
    let mut server = Server::new();
    let origin = server.url();
    let download = publish(&mut server, "TeamLure", "LureRefreshed", mod_archive("LureRefreshed"));

    let temp = tempfile::TempDir::new().unwrap();
    let mods = temp.path().join("mods");
    let urls = vec![page_url(&origin, "TeamLure", "LureRefreshed")];

    let batch = BatchOrchestrator::new(
        RegistryClient::new(&origin).unwrap(),
        Cascade::standard(),
        options(&mods, None),
    );

    let first = batch.run(&urls);
    assert_eq!(first.successful, 1);
    assert_eq!(first.failed, 0);
    assert!(first.installed_folders.contains("LureRefreshed"));
    assert!(mods.join("LureRefreshed/LureRefreshed.dll").is_file());
    assert!(!mods.join("icon.png").exists());

    let second = batch.run(&urls);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.successful, 0);
    download.assert();

    let summary: Value =
        serde_json::from_str(&fs::read_to_string(mods.join("download_summary.json")).unwrap())
            .unwrap();
    assert_eq!(summary["skipped_downloads"], 1);
    assert_eq!(summary["download_folder"], mods.display().to_string());
}

#[test]
fn test_summary_and_auto_preset() {
    let mut server = Server::new();
    let origin = server.url();
    publish(&mut server, "TeamLure", "LureRefreshed", mod_archive("LureRefreshed"));
    publish(&mut server, "Zea", "Tackle", mod_archive("Tackle"));

    let temp = tempfile::TempDir::new().unwrap();
    let mods = temp.path().join("mods");

    let summary = BatchOrchestrator::new(
        RegistryClient::new(&origin).unwrap(),
        Cascade::standard(),
        options(&mods, None),
    )
    .run(&[
        page_url(&origin, "Zea", "Tackle"),
        "https://thunderstore.io/".to_string(),
        page_url(&origin, "TeamLure", "LureRefreshed"),
    ]);

    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);

    let preset: Value =
        serde_json::from_str(&fs::read_to_string(mods.join("mod_preset.json")).unwrap()).unwrap();
    assert_eq!(preset["name"], "Auto Preset");
    assert_eq!(
        preset["downloaded_mods"],
        serde_json::json!(["LureRefreshed", "Tackle"])
    );
}

#[test]
fn test_corrupt_archive_fails_and_is_cleaned() {
    let mut server = Server::new();
    let origin = server.url();
    publish(&mut server, "Broken", "Mod", b"<html>not a zip</html>".to_vec());
    publish(&mut server, "Zea", "Tackle", mod_archive("Tackle"));

    let temp = tempfile::TempDir::new().unwrap();
    let mods = temp.path().join("mods");

    let summary = BatchOrchestrator::new(
        RegistryClient::new(&origin).unwrap(),
        Cascade::standard(),
        options(&mods, None),
    )
    .run(&[
        page_url(&origin, "Broken", "Mod"),
        page_url(&origin, "Zea", "Tackle"),
    ]);

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.successful, 1);
    assert!(!mods.join("Broken-Mod").exists());
    assert!(mods.join("Tackle/Tackle.dll").is_file());
}

#[test]
fn test_root_level_payload_installs_as_full_name() {
    let mut server = Server::new();
    let origin = server.url();
    publish(
        &mut server,
        "Flat",
        "Mod",
        build_zip(&[("Flat.dll", "MZ"), ("manifest.json", "{}")]),
    );

    let temp = tempfile::TempDir::new().unwrap();
    let mods = temp.path().join("mods");

    let summary = BatchOrchestrator::new(
        RegistryClient::new(&origin).unwrap(),
        Cascade::standard(),
        options(&mods, None),
    )
    .run(&[page_url(&origin, "Flat", "Mod")]);

    assert!(summary.installed_folders.contains("Flat-Mod"));
    assert!(mods.join("Flat-Mod/Flat.dll").is_file());
}

#[test]
fn test_loader_runs_first_and_lands_in_game_dir() {
    let mut server = Server::new();
    let origin = server.url();
    publish(
        &mut server,
        "NotNet",
        "GDWeave",
        build_zip(&[
            ("winmm.dll", "loader"),
            ("GDWeave/core/GDWeave.dll", "core"),
        ]),
    );
    publish(&mut server, "Zea", "Tackle", mod_archive("Tackle"));

    let temp = tempfile::TempDir::new().unwrap();
    let mods = temp.path().join("mods");
    let game = temp.path().join("WEBFISHING");
    fs::create_dir_all(&game).unwrap();
    fs::write(game.join("winmm.dll"), "previous").unwrap();

    let handle = spawn_batch(
        RegistryClient::new(&origin).unwrap(),
        Cascade::standard(),
        options(&mods, Some(&game)),
        vec![
            page_url(&origin, "Zea", "Tackle"),
            page_url(&origin, "NotNet", "GDWeave"),
        ],
    );

    let outcomes: Vec<(String, InstallOutcome)> = handle
        .events
        .iter()
        .filter_map(|event| match event {
            BatchEvent::Item { package, outcome } => Some((package, outcome)),
            _ => None,
        })
        .collect();
    let summary = handle.wait().unwrap();

    assert_eq!(
        outcomes,
        vec![
            (
                "NotNet-GDWeave".to_string(),
                InstallOutcome::Installed("GDWeave".to_string())
            ),
            (
                "Zea-Tackle".to_string(),
                InstallOutcome::Installed("Tackle".to_string())
            ),
        ]
    );
    assert_eq!(summary.successful, 2);
    assert!(!summary.installed_folders.contains("GDWeave"));
    assert_eq!(fs::read_to_string(game.join("winmm.dll")).unwrap(), "loader");
    assert_eq!(
        fs::read_to_string(game.join("winmm.dll.backup")).unwrap(),
        "previous"
    );
    assert!(game.join("GDWeave/core/GDWeave.dll").is_file());
    assert!(!mods.join("GDWeave").exists());
}

#[test]
fn test_progress_events_reach_full_size() {
    let mut server = Server::new();
    let origin = server.url();
    publish(&mut server, "TeamLure", "LureRefreshed", mod_archive("LureRefreshed"));

    let temp = tempfile::TempDir::new().unwrap();
    let handle = spawn_batch(
        RegistryClient::new(&origin).unwrap(),
        Cascade::standard(),
        options(&temp.path().join("mods"), None),
        vec![page_url(&origin, "TeamLure", "LureRefreshed")],
    );

    let progress: Vec<(u64, u64)> = handle
        .events
        .iter()
        .filter_map(|event| match event {
            BatchEvent::Progress { current, total, .. } => Some((current, total)),
            _ => None,
        })
        .collect();
    handle.wait().unwrap();

    let (current, total) = *progress.last().unwrap();
    assert_eq!(current, total);
    assert!(progress.len() <= 4);
}
