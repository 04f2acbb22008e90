use chrono::{Duration, TimeZone, Utc};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use wordsmaker::api::Workspace;
use wordsmaker::backup::MAX_BACKUPS;
use wordsmaker::clock::ManualClock;
use wordsmaker::model::{NodeKind, ProjectType, ROOT_ID};
use wordsmaker::store::fs_backend::FsBackend;

fn setup() -> (TempDir, TempDir, ManualClock, Workspace<FsBackend, ManualClock>) {
    let app_dir = TempDir::new().unwrap();
    let backup_dir = TempDir::new().unwrap();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 7, 1, 9, 30, 0).unwrap());
    let ws = Workspace::new(
        FsBackend::new(app_dir.path(), backup_dir.path()),
        clock.clone(),
    );
    (app_dir, backup_dir, clock, ws)
}

fn seed_backup(root: &Path, name: &str) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("metadata.json"), "{}").unwrap();
}

fn dir_names(root: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn test_five_existing_entries_rotate() {
    let (_app, backups, _clock, ws) = setup();
    ws.create_project("Book", ProjectType::Novel).unwrap();
    for day in 1..=5 {
        seed_backup(backups.path(), &format!("Book_202406{:02}T000000", day));
    }

    let entry = ws.backup_project("Book").unwrap();

    let names = dir_names(backups.path());
    assert_eq!(names.len(), MAX_BACKUPS);
    assert!(!names.contains(&"Book_20240601T000000".to_string()));
    assert!(names.contains(&entry.name));
    assert_eq!(entry.name, "Book_20240701T093000");
}

#[test]
fn test_three_existing_entries_grow_to_four() {
    let (_app, backups, _clock, ws) = setup();
    ws.create_project("Book", ProjectType::Novel).unwrap();
    for day in 1..=3 {
        seed_backup(backups.path(), &format!("Book_202406{:02}T000000", day));
    }

    ws.backup_project("Book").unwrap();
    assert_eq!(dir_names(backups.path()).len(), 4);
}

#[test]
fn test_backup_copies_nested_directories() {
    let (app, backups, _clock, ws) = setup();
    ws.create_project("Book", ProjectType::Novel).unwrap();
    let assets = app.path().join("Projects/Book/assets/covers");
    fs::create_dir_all(&assets).unwrap();
    fs::write(assets.join("front.txt"), "cover art").unwrap();

    let entry = ws.backup_project("Book").unwrap();
    let copied = backups
        .path()
        .join(&entry.name)
        .join("assets/covers/front.txt");
    assert_eq!(fs::read_to_string(copied).unwrap(), "cover art");
}

#[test]
fn test_restore_returns_captured_snapshot_and_blobs() {
    let (app, _backups, clock, ws) = setup();
    ws.create_project("Book", ProjectType::Novel).unwrap();
    let mut session = ws.open_project("Book").unwrap();
    let part = session.create_node(ROOT_ID, NodeKind::Folder, "Part").unwrap();
    let doc = session.create_node(part.id, NodeKind::File, "Chapter").unwrap();
    session.save_content(doc.id, "The original chapter.", 3).unwrap();
    session.flush().unwrap();

    let entry = ws.backup_project("Book").unwrap();
    let key = session
        .tree()
        .get(doc.id)
        .unwrap()
        .content_key()
        .unwrap()
        .clone();
    let blob_path = app.path().join(format!("Projects/Book/{}.json", key));
    let captured_blob = fs::read(&blob_path).unwrap();
    let captured_tree = session.snapshot().tree_data;

    clock.advance(Duration::minutes(5));
    session.save_content(doc.id, "A rewritten, longer chapter.", 4).unwrap();
    session.create_node(ROOT_ID, NodeKind::File, "Epilogue").unwrap();
    session.flush().unwrap();

    ws.restore_backup("Book", &entry.name).unwrap();
    session.reload().unwrap();

    assert_eq!(session.snapshot().tree_data, captured_tree);
    assert_eq!(fs::read(&blob_path).unwrap(), captured_blob);
    assert_eq!(session.load_content(doc.id).unwrap(), "The original chapter.");
    assert!(!app.path().join("Projects/.restore-Book").exists());
}

#[test]
fn test_backups_survive_project_deletion() {
    let (app, backups, _clock, ws) = setup();
    ws.create_project("Book", ProjectType::Novel).unwrap();
    let entry = ws.backup_project("Book").unwrap();
    ws.delete_project("Book").unwrap();

    assert!(!app.path().join("Projects/Book").exists());
    assert!(backups.path().join(&entry.name).exists());

    ws.restore_backup("Book", &entry.name).unwrap();
    assert_eq!(ws.list_projects().unwrap().len(), 1);
}

#[test]
fn test_restore_unknown_entry_fails_without_touching_project() {
    let (app, _backups, _clock, ws) = setup();
    ws.create_project("Book", ProjectType::Novel).unwrap();
    assert!(ws.restore_backup("Book", "Book_20200101T000000").is_err());
    assert!(app.path().join("Projects/Book/metadata.json").exists());
}
