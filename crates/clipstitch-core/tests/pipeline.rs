use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clipstitch_core::{
    ClipstitchError, CompilationRequest, DateWindow, Pipeline, TwitchConfig, TwitchService,
    workdir,
};

fn request() -> CompilationRequest {
    CompilationRequest {
        login: "streamer".to_string(),
        window: DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
        ),
        max_clips: 10,
    }
}

/// Stand-in transcoder: exits 0 and creates its final argument.
fn fake_ffmpeg(dir: &Path) -> PathBuf {
    let path = dir.join("fake-ffmpeg");
    std::fs::write(
        &path,
        "#!/bin/sh\nfor arg in \"$@\"; do last=\"$arg\"; done\n: > \"$last\"\n",
    )
    .unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Mounts the auth and metadata endpoints: a token, the broadcaster
/// lookup, and a clip listing whose thumbnails point back at the mock
/// server.
async fn mount_metadata(server: &MockServer, clip_names: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "abc123",
            "expires_in": 3600,
            "token_type": "bearer",
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"id": "42"}]})))
        .mount(server)
        .await;

    let records: Vec<_> = clip_names
        .iter()
        .map(|name| {
            json!({
                "thumbnail_url": format!("{}/{}-preview-480x272.jpg", server.uri(), name)
            })
        })
        .collect();
    Mock::given(method("GET"))
        .and(path("/clips"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": records })))
        .mount(server)
        .await;
}

fn test_config(server: &MockServer) -> TwitchConfig {
    let mut config = TwitchConfig::new("client-id", "client-secret");
    config.auth_base_url = server.uri();
    config.api_base_url = server.uri();
    config
}

#[tokio::test]
async fn compiles_everything_and_leaves_no_intermediates() {
    let server = MockServer::start().await;
    mount_metadata(&server, &["clip1", "clip2"]).await;
    for clip in ["/clip1.mp4", "/clip2.mp4"] {
        Mock::given(method("GET"))
            .and(path(clip))
            .respond_with(ResponseTemplate::new(200).set_body_string("clip data"))
            .mount(&server)
            .await;
    }

    let scratch = tempdir().unwrap();
    let work_dir = scratch.path().join("run");
    let twitch = TwitchService::connect(test_config(&server)).await.unwrap();
    let pipeline = Pipeline::new(twitch, &work_dir)
        .with_ffmpeg_path(fake_ffmpeg(scratch.path()))
        .with_output_name("compilation.mp4");

    let summary = pipeline.run(&request()).await.unwrap();

    assert_eq!(summary.clips_found, 2);
    assert_eq!(summary.clips_downloaded, 2);
    assert_eq!(summary.clips_compiled, 2);
    assert!(summary.warnings.is_empty());
    assert_eq!(summary.output, work_dir.join("compilation.mp4"));
    assert!(summary.output.exists());

    // Nothing but the compilation survives the run.
    let leftovers: Vec<_> = std::fs::read_dir(&work_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .filter(|name| name != "compilation.mp4")
        .collect();
    assert!(leftovers.is_empty(), "unexpected leftovers: {leftovers:?}");
    assert!(!workdir::manifest_path(&work_dir).exists());
}

#[tokio::test]
async fn partial_download_failure_still_compiles() {
    let server = MockServer::start().await;
    mount_metadata(&server, &["clip1", "clip2"]).await;
    Mock::given(method("GET"))
        .and(path("/clip1.mp4"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/clip2.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_string("clip data"))
        .mount(&server)
        .await;

    let scratch = tempdir().unwrap();
    let work_dir = scratch.path().join("run");
    let twitch = TwitchService::connect(test_config(&server)).await.unwrap();
    let pipeline = Pipeline::new(twitch, &work_dir)
        .with_ffmpeg_path(fake_ffmpeg(scratch.path()))
        .with_output_name("compilation.mp4");

    let summary = pipeline.run(&request()).await.unwrap();

    assert_eq!(summary.clips_found, 2);
    assert_eq!(summary.clips_downloaded, 1);
    assert_eq!(summary.clips_compiled, 1);
    assert_eq!(summary.warnings.len(), 1);
    assert!(summary.warnings[0].contains("clip1.mp4"));
    assert!(summary.output.exists());
}

#[tokio::test]
async fn fully_failed_fetch_aborts_before_the_transcoder() {
    let server = MockServer::start().await;
    mount_metadata(&server, &["clip1", "clip2"]).await;
    for clip in ["/clip1.mp4", "/clip2.mp4"] {
        Mock::given(method("GET"))
            .and(path(clip))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
    }

    let scratch = tempdir().unwrap();
    let work_dir = scratch.path().join("run");
    let twitch = TwitchService::connect(test_config(&server)).await.unwrap();
    // Deliberately no transcoder on this pipeline: reaching it would
    // fail loudly with a missing binary instead of the joined error.
    let pipeline = Pipeline::new(twitch, &work_dir).with_ffmpeg_path("/nonexistent/ffmpeg");

    let err = pipeline.run(&request()).await.unwrap_err();
    match err {
        ClipstitchError::Joined(joined) => assert_eq!(joined.len(), 2),
        other => panic!("expected joined download failures, got {other:?}"),
    }

    // No compilation output, no intermediates.
    let produced: Vec<_> = std::fs::read_dir(&work_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    assert!(produced.is_empty(), "unexpected files: {produced:?}");
}

#[tokio::test]
async fn empty_clip_window_reports_no_clips() {
    let server = MockServer::start().await;
    mount_metadata(&server, &[]).await;

    let scratch = tempdir().unwrap();
    let work_dir = scratch.path().join("run");
    let twitch = TwitchService::connect(test_config(&server)).await.unwrap();
    let pipeline = Pipeline::new(twitch, &work_dir);

    let err = pipeline.run(&request()).await.unwrap_err();
    assert!(matches!(err, ClipstitchError::NoClips));

    // No download or compile work happened.
    assert!(!work_dir.exists());
}

#[tokio::test]
async fn keep_downloads_leaves_the_originals() {
    let server = MockServer::start().await;
    mount_metadata(&server, &["clip1"]).await;
    Mock::given(method("GET"))
        .and(path("/clip1.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_string("clip data"))
        .mount(&server)
        .await;

    let scratch = tempdir().unwrap();
    let work_dir = scratch.path().join("run");
    let twitch = TwitchService::connect(test_config(&server)).await.unwrap();
    let pipeline = Pipeline::new(twitch, &work_dir)
        .with_ffmpeg_path(fake_ffmpeg(scratch.path()))
        .with_output_name("compilation.mp4")
        .with_keep_downloads(true);

    let summary = pipeline.run(&request()).await.unwrap();

    assert!(summary.output.exists());
    assert!(work_dir.join("clip1.mp4").exists());
    assert!(!work_dir.join("clip1_modified.mp4").exists());
}
