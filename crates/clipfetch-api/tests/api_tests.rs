//! API integration tests.
//!
//! The external tool is replaced by a shell script that answers `-J` with a
//! fixed catalog and otherwise writes a small file at the `-o` template.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use clipfetch_api::{create_router, ApiConfig, AppState};
use clipfetch_media::ToolConfig;

const CATALOG: &str = r#"{"title":"Sample Clip","duration":120,"formats":[{"format_id":"18","vcodec":"avc1","acodec":"mp4a","resolution":"640x360","ext":"mp4","format_note":"360p","filesize":1048576},{"format_id":"137","vcodec":"avc1","acodec":"none","resolution":"1920x1080","ext":"mp4","format_note":"1080p","filesize":9999999}]}"#;

struct TestApp {
    _dir: TempDir,
    state: AppState,
    router: Router,
    calls: PathBuf,
    marker: PathBuf,
    output_dir: PathBuf,
}

impl TestApp {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let calls = dir.path().join("calls.log");
        let marker = dir.path().join("finished.marker");
        let output_dir = dir.path().join("downloads");
        std::fs::create_dir_all(&output_dir).unwrap();

        let script = dir.path().join("fake-yt-dlp.sh");
        std::fs::write(&script, fake_tool_script(&calls, &marker)).unwrap();

        let config = ApiConfig {
            tool: ToolConfig::new(&output_dir)
                .with_program("sh")
                .with_extra_args([script.to_string_lossy().to_string()]),
            artifact_cleanup_delay: Duration::from_secs(60),
            ..Default::default()
        };

        let state = AppState::new(config);
        let router = create_router(state.clone(), None);

        Self {
            _dir: dir,
            state,
            router,
            calls,
            marker,
            output_dir,
        }
    }

    /// Modes the fake tool was invoked with, in order.
    fn tool_calls(&self) -> Vec<String> {
        std::fs::read_to_string(&self.calls)
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn get(&self, uri: &str) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }
}

fn fake_tool_script(calls: &Path, marker: &Path) -> String {
    format!(
        r#"mode=download
out=""
url=""
while [ $# -gt 0 ]; do
  case "$1" in
    -J) mode=json ;;
    -o) shift; out="$1" ;;
    --) shift; url="$1" ;;
  esac
  shift
done
echo "$mode" >> '{calls}'
case "$url" in
  *fail*) echo "ERROR: [generic] Unable to download webpage" >&2; exit 1 ;;
  *slow*) sleep 1 >/dev/null 2>&1; touch '{marker}'; exit 0 ;;
esac
if [ "$mode" = json ]; then
  echo '{catalog}'
  exit 0
fi
file=$(printf '%s' "$out" | sed 's/%(ext)s/mp4/')
echo "[download] Destination: $file"
echo "[download]  50.0% of 1.00MiB at 1.00MiB/s ETA 00:01"
printf 'clipdata' > "$file"
echo "[download] 100% of 1.00MiB in 00:00:01 at 1.00MiB/s"
"#,
        calls = calls.display(),
        marker = marker.display(),
        catalog = CATALOG,
    )
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new();
    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
}

#[tokio::test]
async fn test_ready_endpoint() {
    let app = TestApp::new();
    let response = app.get("/ready").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_route_absent_when_disabled() {
    let app = TestApp::new();
    let response = app.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_formats_catalog() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json("/api/formats", json!({"url": "https://example.com/watch?v=1"}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Sample Clip");
    assert_eq!(body["durationSeconds"], 120);
    assert_eq!(body["durationLabel"], "02:00");

    let options = body["options"].as_array().unwrap();
    assert_eq!(options.len(), 2);
    assert_eq!(options[0]["id"], "best");
    assert_eq!(options[0]["display"], "Best Quality (Default)");
    assert_eq!(options[1]["id"], "18");
    assert_eq!(options[1]["display"], "640x360 (mp4) - 360p [1.00 MB]");
}

#[tokio::test]
async fn test_formats_requires_url() {
    let app = TestApp::new();
    let (status, body) = app.post_json("/api/formats", json!({})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "URL is required");
    assert!(app.tool_calls().is_empty());
}

#[tokio::test]
async fn test_formats_rejects_internal_url() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json("/api/formats", json!({"url": "http://127.0.0.1/video"}))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("internal"));
    assert!(app.tool_calls().is_empty());
}

#[tokio::test]
async fn test_formats_surfaces_tool_stderr() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json("/api/formats", json!({"url": "https://example.com/fail"}))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["error"].as_str().unwrap().trim(),
        "ERROR: [generic] Unable to download webpage"
    );
}

#[tokio::test]
async fn test_reversed_range_rejected_before_tool_runs() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(
            "/api/download",
            json!({"url": "https://example.com/watch?v=1", "startTime": "00:10", "endTime": "00:05"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("End time must be greater than start time"));
    assert!(app.tool_calls().is_empty());
}

#[tokio::test]
async fn test_invalid_time_format() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(
            "/api/download",
            json!({"url": "https://example.com/watch?v=1", "startTime": "1:xx"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert!(app.tool_calls().is_empty());
}

#[tokio::test]
async fn test_end_beyond_duration_rejected() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(
            "/api/download",
            json!({"url": "https://example.com/watch?v=1", "startTime": "0:10", "endTime": "3:00"}),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "End time exceeds video duration (120 seconds)");
    assert_eq!(app.tool_calls(), vec!["json"]);
}

#[tokio::test]
async fn test_end_within_grace_accepted() {
    let app = TestApp::new();
    let (status, _) = app
        .post_json(
            "/api/download",
            json!({"url": "https://example.com/watch?v=1", "end_time": "2:01"}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.tool_calls(), vec!["json", "download"]);
}

#[tokio::test]
async fn test_end_only_zero_range_accepted() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(
            "/api/download",
            json!({"url": "https://example.com/watch?v=1", "endTime": "0"}),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    assert_eq!(app.tool_calls(), vec!["json", "download"]);
}

#[tokio::test]
async fn test_download_then_fetch_artifact() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json(
            "/api/download",
            json!({
                "url": "https://example.com/watch?v=1",
                "formatId": "18",
                "startTime": "00:10",
                "endTime": "00:20"
            }),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "unexpected body: {}", body);
    let job_id = body["jobId"].as_str().unwrap().to_string();
    let url = body["downloadUrl"].as_str().unwrap().to_string();
    assert_eq!(url, format!("/api/artifacts/{}.mp4", job_id));
    assert!(app.output_dir.join(format!("{}.mp4", job_id)).exists());

    let response = app.get(&url).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .starts_with("attachment"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"clipdata");
    assert_eq!(app.state.artifacts.pending_count().await, 1);
}

#[tokio::test]
async fn test_full_download_skips_metadata_query() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json("/api/download", json!({"url": "https://example.com/watch?v=1"}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["downloadUrl"].as_str().unwrap().ends_with(".mp4"));
    assert_eq!(app.tool_calls(), vec!["download"]);
}

#[tokio::test]
async fn test_download_failure_surfaces_stderr() {
    let app = TestApp::new();
    let (status, body) = app
        .post_json("/api/download", json!({"url": "https://example.com/fail"}))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Unable to download webpage"));
}

#[tokio::test]
async fn test_missing_artifact_is_not_found() {
    let app = TestApp::new();

    let response = app.get("/api/artifacts/nope.mp4").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "File not found");

    let response = app.get("/api/artifacts/..%2Fcalls.log").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_json_body() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/download")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_abandoned_download_kills_tool() {
    let app = TestApp::new();
    let request = app.post_json("/api/download", json!({"url": "https://example.com/slow"}));

    let result = tokio::time::timeout(Duration::from_millis(300), request).await;
    assert!(result.is_err());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(app.tool_calls(), vec!["download"]);
    assert!(!app.marker.exists());
}

#[test]
fn test_clip_download_does_not_count_as_format_query() {
    let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    metrics::with_local_recorder(&recorder, || {
        runtime.block_on(async {
            let app = TestApp::new();
            let (status, _) = app
                .post_json(
                    "/api/download",
                    json!({"url": "https://example.com/watch?v=1", "startTime": "0:10", "endTime": "0:20"}),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(app.tool_calls(), vec!["json", "download"]);
        })
    });

    let rendered = handle.render();
    assert!(!rendered.contains("clipfetch_format_queries_total"));
    assert!(rendered.contains(r#"clipfetch_downloads_completed_total{kind="clip"} 1"#));
}
