//! WorkspaceManager setup and idempotent cleanup.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::CountingSandbox;
use parity_core::{UseCase, WorkspaceManager};

#[tokio::test]
async fn test_cleanup_twice_closes_once() {
    let dir = tempfile::tempdir().unwrap();
    let (sandbox, closes) = CountingSandbox::new(dir.path());
    let uc = Arc::new(
        UseCase::builder("counting", "p")
            .setup_file("nested/dir/file.txt", "content")
            .build()
            .unwrap(),
    );

    let manager = WorkspaceManager::new();
    let mut ctx = manager.setup_in(uc, Box::new(sandbox), false).await.unwrap();
    assert_eq!(ctx.created_paths().to_vec(), vec![dir.path().join("nested/dir/file.txt")]);
    assert!(ctx.sandbox().is_running());

    manager.cleanup(Some(&mut ctx)).await;
    manager.cleanup(Some(&mut ctx)).await;
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(ctx.is_closed());
}

#[tokio::test]
async fn test_failed_setup_closes_partial_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let (sandbox, closes) = CountingSandbox::new(dir.path());
    let uc = Arc::new(
        UseCase::builder("partial", "p")
            .setup_file("ok.txt", "fine")
            .setup_file("/abs/path.txt", "rejected")
            .build()
            .unwrap(),
    );

    let result = WorkspaceManager::new().setup_in(uc, Box::new(sandbox), false).await;
    assert!(result.is_err());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    // The first file was written before the failure; fixed paths are kept.
    assert!(dir.path().join("ok.txt").exists());
}

#[tokio::test]
async fn test_each_setup_gets_its_own_temp_dir() {
    let uc = Arc::new(UseCase::builder("fresh", "p").build().unwrap());
    let manager = WorkspaceManager::new();

    let mut a = manager.setup(Arc::clone(&uc)).await.unwrap();
    let mut b = manager.setup(uc).await.unwrap();
    assert_ne!(a.workspace(), b.workspace());

    manager.cleanup(Some(&mut a)).await;
    manager.cleanup(Some(&mut b)).await;
}
