//! Encrypted photo vault tests

use kidcheck_common::Error;
use kidcheck_cs::{EncryptedPhotoVault, PhotoRef, PhotoStore};
use tempfile::TempDir;

const PHOTO: &[u8] = b"jpeg-bytes-of-a-guardian";

#[tokio::test]
async fn store_and_load_roundtrip() {
    let dir = TempDir::new().unwrap();
    let vault = EncryptedPhotoVault::new(dir.path().join("vault"));

    let photo_ref = vault.store(PHOTO, "guardian").await.unwrap();
    assert!(photo_ref.as_str().starts_with("guardian_"));
    assert!(photo_ref.as_str().ends_with(".enc"));

    let loaded = vault.load(&photo_ref).await.unwrap();
    assert_eq!(loaded, PHOTO);
}

#[tokio::test]
async fn stored_file_does_not_contain_plaintext() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("vault");
    let vault = EncryptedPhotoVault::new(&root);

    let photo_ref = vault.store(PHOTO, "child").await.unwrap();
    let on_disk = std::fs::read(root.join(photo_ref.as_str())).unwrap();

    let haystack = String::from_utf8_lossy(&on_disk);
    assert!(!haystack.contains("jpeg-bytes-of-a-guardian"));
}

#[tokio::test]
async fn empty_blob_is_rejected() {
    let dir = TempDir::new().unwrap();
    let vault = EncryptedPhotoVault::new(dir.path().join("vault"));

    let err = vault.store(b"", "child").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn delete_is_a_noop_when_already_deleted() {
    let dir = TempDir::new().unwrap();
    let vault = EncryptedPhotoVault::new(dir.path().join("vault"));

    let photo_ref = vault.store(PHOTO, "guardian").await.unwrap();
    vault.delete(&photo_ref).await.unwrap();

    // Second delete does not error
    vault.delete(&photo_ref).await.unwrap();

    let err = vault.load(&photo_ref).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn master_key_persists_across_instances() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("vault");

    let photo_ref = {
        let vault = EncryptedPhotoVault::new(&root);
        vault.store(PHOTO, "guardian").await.unwrap()
    };

    // A fresh instance over the same directory must decrypt what the
    // first one stored
    let vault = EncryptedPhotoVault::new(&root);
    let loaded = vault.load(&photo_ref).await.unwrap();
    assert_eq!(loaded, PHOTO);
}

#[tokio::test]
async fn distinct_stores_get_distinct_references() {
    let dir = TempDir::new().unwrap();
    let vault = EncryptedPhotoVault::new(dir.path().join("vault"));

    let first = vault.store(PHOTO, "child").await.unwrap();
    let second = vault.store(PHOTO, "child").await.unwrap();
    assert_ne!(first, second);
}

#[tokio::test]
async fn path_traversal_references_are_rejected() {
    let dir = TempDir::new().unwrap();
    let vault = EncryptedPhotoVault::new(dir.path().join("vault"));

    for bad in ["../master.key", "a/b.enc", "", "..\\x.enc"] {
        let err = vault.load(&PhotoRef::new(bad)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "accepted: {:?}", bad);
    }
}

#[cfg(unix)]
#[tokio::test]
async fn master_key_is_created_with_restricted_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let root = dir.path().join("vault");
    let vault = EncryptedPhotoVault::new(&root);
    vault.store(PHOTO, "guardian").await.unwrap();

    let mode = std::fs::metadata(root.join("master.key"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}
