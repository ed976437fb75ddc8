use std::path::Path;
use std::time::Duration;
use telemetry_relay::storage::{FileBlobStore, StorageConfig};
use tempfile::TempDir;

fn config(dir: &TempDir) -> StorageConfig {
    StorageConfig {
        directory: dir.path().to_path_buf(),
        max_size_bytes: 100 * 1024 * 1024,
        // Long enough that the background sweep never interferes; tests call
        // sweep() explicitly.
        maintenance_interval: Duration::from_secs(3600),
        retention_period: Duration::from_secs(3600),
        write_timeout: Duration::from_secs(60),
    }
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn disk_total(dir: &Path) -> u64 {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().metadata().unwrap().len())
        .sum()
}

/// A committed blob name with an encoded timestamp far in the past.
fn ancient_blob_name() -> String {
    format!("2000-01-01T000000.000000Z-{}.blob", "0".repeat(32))
}

fn recent_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H%M%S%.6fZ")
        .to_string()
}

#[tokio::test]
async fn blob_round_trips_bytes_exactly() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(config(&dir)).await.unwrap();

    let payload = b"span batch payload \x00\xff\x7f";
    let blob = store.try_create(payload, Duration::ZERO).await.unwrap();
    assert!(blob.path().to_string_lossy().ends_with(".blob"));

    let read_back = blob.try_read().await.unwrap();
    assert_eq!(read_back, payload);

    store.shutdown().await;
}

#[tokio::test]
async fn create_leaves_no_temporary_files_behind() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(config(&dir)).await.unwrap();

    store.try_create(b"payload", Duration::ZERO).await.unwrap();
    let names = file_names(dir.path());
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with(".blob"));

    store.shutdown().await;
}

#[tokio::test]
async fn blob_born_leased_is_hidden_until_released() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(config(&dir)).await.unwrap();

    let blob = store
        .try_create(b"reserved", Duration::from_secs(60))
        .await
        .unwrap();
    assert!(blob.path().to_string_lossy().ends_with(".lock"));
    assert!(store.get_blobs().await.is_empty());

    store.shutdown().await;
}

#[tokio::test]
async fn concurrent_leases_have_exactly_one_winner() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(config(&dir)).await.unwrap();

    store.try_create(b"contested", Duration::ZERO).await.unwrap();
    let mut first = store.try_get().await.unwrap();
    let mut second = store.try_get().await.unwrap();

    let (a, b) = tokio::join!(
        first.try_lease(Duration::from_secs(60)),
        second.try_lease(Duration::from_secs(60)),
    );
    assert!(a ^ b, "exactly one lease attempt must win, got {a} and {b}");

    store.shutdown().await;
}

#[tokio::test]
async fn expired_lease_is_reclaimed_by_the_sweep() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(config(&dir)).await.unwrap();

    store.try_create(b"abandoned", Duration::ZERO).await.unwrap();
    let mut blob = store.try_get().await.unwrap();
    assert!(blob.try_lease(Duration::from_millis(10)).await);
    assert!(store.get_blobs().await.is_empty());

    tokio::time::sleep(Duration::from_millis(50)).await;
    store.sweep().await;

    let reclaimed = store.get_blobs().await;
    assert_eq!(reclaimed.len(), 1);
    assert!(reclaimed[0].path().to_string_lossy().ends_with(".blob"));
    assert_eq!(reclaimed[0].try_read().await.unwrap(), b"abandoned");

    store.shutdown().await;
}

#[tokio::test]
async fn unexpired_lease_survives_the_sweep() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(config(&dir)).await.unwrap();

    store.try_create(b"held", Duration::ZERO).await.unwrap();
    let mut blob = store.try_get().await.unwrap();
    assert!(blob.try_lease(Duration::from_secs(600)).await);

    store.sweep().await;
    assert!(store.get_blobs().await.is_empty());
    assert!(file_names(dir.path())[0].ends_with(".lock"));

    store.shutdown().await;
}

#[tokio::test]
async fn lease_renewal_does_not_accumulate_suffixes() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(config(&dir)).await.unwrap();

    store.try_create(b"renewed", Duration::ZERO).await.unwrap();
    let mut blob = store.try_get().await.unwrap();
    assert!(blob.try_lease(Duration::from_secs(60)).await);
    assert!(blob.try_lease(Duration::from_secs(120)).await);

    let names = file_names(dir.path());
    assert_eq!(names.len(), 1);
    assert_eq!(names[0].matches('@').count(), 1);
    assert_eq!(names[0].matches(".lock").count(), 1);

    store.shutdown().await;
}

#[tokio::test]
async fn retention_expired_blob_is_invisible_and_swept() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(config(&dir)).await.unwrap();

    std::fs::write(dir.path().join(ancient_blob_name()), b"stale").unwrap();
    store.try_create(b"fresh", Duration::ZERO).await.unwrap();

    // The expired blob never shows up in enumeration.
    let visible = store.get_blobs().await;
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].try_read().await.unwrap(), b"fresh");

    // And the sweep deletes it for good.
    store.sweep().await;
    let names = file_names(dir.path());
    assert_eq!(names.len(), 1);
    assert!(!names[0].starts_with("2000-"));

    store.shutdown().await;
}

#[tokio::test]
async fn abandoned_tmp_file_is_swept_fresh_one_kept() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(config(&dir)).await.unwrap();

    let stale_tmp = format!("2000-01-01T000000.000000Z-{}.blob.tmp", "1".repeat(32));
    let fresh_tmp = format!("{}-{}.blob.tmp", recent_timestamp(), "2".repeat(32));
    std::fs::write(dir.path().join(&stale_tmp), b"half a write").unwrap();
    std::fs::write(dir.path().join(&fresh_tmp), b"write in progress").unwrap();

    store.sweep().await;

    let names = file_names(dir.path());
    assert_eq!(names, vec![fresh_tmp]);

    store.shutdown().await;
}

#[tokio::test]
async fn quota_refuses_writes_without_creating_files() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(StorageConfig {
        max_size_bytes: 10,
        ..config(&dir)
    })
    .await
    .unwrap();

    // A payload that cannot fit is refused outright.
    assert!(store.try_create(&[0u8; 100], Duration::ZERO).await.is_none());
    assert!(file_names(dir.path()).is_empty());

    // A payload within the quota is accepted, the next overflowing one is not.
    assert!(store.try_create(&[0u8; 5], Duration::ZERO).await.is_some());
    assert!(store.try_create(&[0u8; 6], Duration::ZERO).await.is_none());
    assert_eq!(file_names(dir.path()).len(), 1);

    store.shutdown().await;
}

#[tokio::test]
async fn recount_converges_after_out_of_band_changes() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(config(&dir)).await.unwrap();

    let first = store.try_create(&[1u8; 10], Duration::ZERO).await.unwrap();
    store.try_create(&[2u8; 20], Duration::ZERO).await.unwrap();
    assert_eq!(store.size_bytes(), 30);

    // Simulate a crashed sibling process: one file appears and one vanishes
    // without the tracker hearing about either.
    std::fs::write(dir.path().join(ancient_blob_name()), [3u8; 7]).unwrap();
    std::fs::remove_file(first.path()).unwrap();

    let expected = disk_total(dir.path());
    assert_eq!(store.recount().await, expected);
    assert_eq!(store.size_bytes(), expected);
    assert_eq!(expected, 27);

    store.shutdown().await;
}

#[tokio::test]
async fn get_blobs_returns_newest_first() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(config(&dir)).await.unwrap();

    let mut created = Vec::new();
    for i in 0..3u8 {
        let blob = store.try_create(&[i], Duration::ZERO).await.unwrap();
        created.push(blob.path().to_path_buf());
        // Keep encoded timestamps distinct at microsecond resolution.
        tokio::time::sleep(Duration::from_millis(3)).await;
    }

    let listed: Vec<_> = store
        .get_blobs()
        .await
        .iter()
        .map(|blob| blob.path().to_path_buf())
        .collect();
    created.reverse();
    assert_eq!(listed, created);

    // try_get hands out the newest one.
    let newest = store.try_get().await.unwrap();
    assert_eq!(newest.path(), created[0]);

    store.shutdown().await;
}

#[tokio::test]
async fn delete_updates_the_size_tracker() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(config(&dir)).await.unwrap();

    let blob = store.try_create(&[0u8; 40], Duration::ZERO).await.unwrap();
    assert_eq!(store.size_bytes(), 40);
    assert!(blob.try_delete().await);
    assert_eq!(store.size_bytes(), 0);
    assert!(file_names(dir.path()).is_empty());

    store.shutdown().await;
}

#[tokio::test]
async fn sweep_skips_foreign_files() {
    let dir = TempDir::new().unwrap();
    let store = FileBlobStore::new(config(&dir)).await.unwrap();

    std::fs::write(dir.path().join("README.txt"), b"not ours").unwrap();
    store.try_create(b"ours", Duration::ZERO).await.unwrap();

    store.sweep().await;

    let names = file_names(dir.path());
    assert_eq!(names.len(), 2);
    assert!(names.contains(&"README.txt".to_string()));
    // The foreign file still counts toward the directory size.
    assert_eq!(store.size_bytes(), disk_total(dir.path()));

    store.shutdown().await;
}
