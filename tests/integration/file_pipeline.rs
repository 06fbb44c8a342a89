//! Config file to capture to job result, with a file-backed frame source.

use sidequest::capture::FrameSource;
use sidequest::config::{CaptureBackend, OverlayConfig};
use sidequest::jobs::{JobTicket, QuestContext};
use sidequest::test_utils::ScriptedModel;
use sidequest::{JobKind, JobRunner, StatusKey, StatusStore};
use std::sync::Arc;

fn write_frame(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("frame.png");
    image::RgbImage::from_pixel(320, 180, image::Rgb([40, 120, 40]))
        .save(&path)
        .unwrap();
    path
}

#[tokio::test]
async fn file_backend_feeds_quest_check() {
    let dir = tempfile::tempdir().unwrap();
    let frame_path = write_frame(dir.path());

    let mut config = OverlayConfig::default();
    config.capture.backend = CaptureBackend::File;
    config.capture.image_path = Some(frame_path);
    config.capture.width = 96;
    config.capture.height = 54;

    let config_path = dir.path().join("config.toml");
    config.save_to_file(&config_path).unwrap();
    let loaded = OverlayConfig::from_file(&config_path).unwrap();
    loaded.validate().unwrap();

    let frames = sidequest::capture::from_config(&loaded.capture).unwrap();
    let frame = frames.capture().unwrap();
    assert_eq!((frame.width(), frame.height()), (96, 54));

    let model = Arc::new(ScriptedModel::new("YES - the flag is planted"));
    let runner = JobRunner::new(
        frames,
        model.clone(),
        loaded.prompts.clone(),
        loaded.inference.timeout(),
    );
    let ticket = JobTicket::new(JobKind::QuestCheck).with_quest(QuestContext {
        quest_id: 1,
        text: "Plant the flag".into(),
    });
    let result = runner.run(ticket).await;

    assert!(result.is_success());
    assert_eq!(result.quest_id, Some(1));
    assert_eq!(
        model.prompts(),
        ["Quest: 'Plant the flag'. Is it completed? Answer 'YES - reason' or 'NO - reason'."]
    );

    let store = StatusStore::new();
    store.set(result.kind.status_key(), result.text);
    assert_eq!(
        store.get(StatusKey::QuestCheck),
        "YES - the flag is planted"
    );
}

#[tokio::test]
async fn file_backend_missing_image_fails_job() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = OverlayConfig::default();
    config.capture.backend = CaptureBackend::File;
    config.capture.image_path = Some(dir.path().join("absent.png"));

    let frames = sidequest::capture::from_config(&config.capture).unwrap();
    let model = Arc::new(ScriptedModel::new("unused"));
    let runner = JobRunner::new(
        frames,
        model.clone(),
        config.prompts.clone(),
        config.inference.timeout(),
    );
    let result = runner.run(JobTicket::new(JobKind::Narration)).await;

    assert!(result.text.starts_with("Error: capture failed: cannot read"));
    assert_eq!(model.calls(), 0);
}
