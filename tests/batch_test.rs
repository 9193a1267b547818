//! Batch conversion of real files with the local image codec.

mod common;

use common::png_bytes;
use heicforge::batch::{BatchConverter, BatchEvent, ItemStatus};
use heicforge::codec::{ImageCodec, SourceRef};
use heicforge::output::write_artifact;
use tempfile::tempdir;

#[tokio::test]
async fn convert_directory_of_pngs() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out");

    let batch = BatchConverter::default();
    for i in 0..5 {
        let path = dir.path().join(format!("IMG_{:04}.png", i));
        std::fs::write(&path, png_bytes(12, 8)).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        batch.enqueue(name, SourceRef::Path(path)).unwrap();
    }

    let codec = ImageCodec::new(85, 1024 * 1024);
    let summary = batch.convert_all(&codec, 2).await.unwrap();
    assert_eq!(summary.queued, 5);
    assert_eq!(summary.succeeded, 5);

    for item in batch.items() {
        let result = item.result.as_ref().unwrap();
        let written = write_artifact(&out, result).await.unwrap();
        let decoded = image::open(&written).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (12, 8));
    }

    let mut names: Vec<String> = std::fs::read_dir(&out)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["IMG_0000.jpg", "IMG_0001.jpg", "IMG_0002.jpg", "IMG_0003.jpg", "IMG_0004.jpg"]
    );

    assert_eq!(batch.reset(), 5);
    assert!(batch.is_empty());
}

#[tokio::test]
async fn missing_file_fails_only_its_item() {
    let dir = tempdir().unwrap();
    let good = dir.path().join("good.png");
    std::fs::write(&good, png_bytes(2, 2)).unwrap();

    let batch = BatchConverter::default();
    batch.enqueue("good.png", SourceRef::Path(good)).unwrap();
    let missing = batch
        .enqueue("gone.heic", SourceRef::Path(dir.path().join("gone.heic")))
        .unwrap();

    let summary = batch.convert_all(&ImageCodec::new(90, u64::MAX), 3).await.unwrap();
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);

    let missing = batch.get(missing.id).unwrap();
    assert_eq!(missing.status, ItemStatus::Error);
    assert!(missing.error.unwrap().contains("Failed to read source file"));
}

#[tokio::test]
async fn events_follow_item_lifecycle() {
    let batch = BatchConverter::default();
    let mut events = batch.subscribe();

    let item = batch
        .enqueue("a.png", SourceRef::Memory(png_bytes(3, 3).into()))
        .unwrap();
    batch
        .convert_one(item.id, &ImageCodec::new(90, u64::MAX))
        .await
        .unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        assert_eq!(event.item_id(), Some(item.id));
        kinds.push(match event {
            BatchEvent::ItemQueued { .. } => "queued",
            BatchEvent::ItemStarted { .. } => "started",
            BatchEvent::ItemProgress { .. } => "progress",
            BatchEvent::ItemConverted { .. } => "converted",
            BatchEvent::ItemFailed { .. } => "failed",
            BatchEvent::ItemRemoved { .. } => "removed",
            BatchEvent::BatchReset { .. } => "reset",
        });
    }

    assert_eq!(kinds, vec!["queued", "started", "progress", "progress", "converted"]);
}
