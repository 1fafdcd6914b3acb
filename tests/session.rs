//! Integration tests for the conversion session against a local mock service.
//!
//! The mock stands in for the remote converter: it accepts a multipart POST
//! on `/convert`, checks the `file` part, and answers according to the
//! uploaded file name:
//!
//! | file name      | response                                   |
//! |----------------|--------------------------------------------|
//! | `bad.docx`     | 500 `{"detail": "bad format"}`             |
//! | `legacy.docx`  | 422 `{"error": "unsupported document"}`    |
//! | `html.docx`    | 502 with a non-JSON body                   |
//! | `slow.docx`    | 200 after a short delay                    |
//! | anything else  | 200, body `ZIP:` + uploaded bytes          |

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use edgequake_docx2png::{
    convert_file, convert_to_file, ArtifactStore, ClientConfig, Docx2PngError, InputFile,
    MemoryArtifactStore, Session, SessionSnapshot, SessionState, TempFileArtifactStore,
};
use parking_lot::Mutex;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};

// ── Mock conversion service ──────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Mock {
    hits: Arc<AtomicUsize>,
    content_types: Arc<Mutex<Vec<String>>>,
}

async fn convert(State(mock): State<Mock>, mut multipart: Multipart) -> Response {
    mock.hits.fetch_add(1, Ordering::SeqCst);

    let mut upload = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let Ok(bytes) = field.bytes().await else {
            break;
        };
        mock.content_types.lock().push(content_type);
        upload = Some((name, bytes));
    }

    let Some((name, bytes)) = upload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "missing file field" })),
        )
            .into_response();
    };

    match name.as_str() {
        "bad.docx" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "bad format" })),
        )
            .into_response(),
        "legacy.docx" => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": "unsupported document" })),
        )
            .into_response(),
        "html.docx" => (StatusCode::BAD_GATEWAY, "<html>upstream down</html>").into_response(),
        other => {
            if other == "slow.docx" {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            let mut body = b"ZIP:".to_vec();
            body.extend_from_slice(&bytes);
            (StatusCode::OK, body).into_response()
        }
    }
}

async fn start_server() -> (SocketAddr, Mock) {
    let mock = Mock::default();
    let app = Router::new()
        .route("/convert", post(convert))
        .with_state(mock.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, mock)
}

// ── Test helpers ─────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config_for(addr: SocketAddr, store: Arc<MemoryArtifactStore>) -> ClientConfig {
    ClientConfig::builder()
        .base_url(format!("http://{addr}"))
        .artifact_store(store)
        .build()
        .unwrap()
}

fn docx(name: &str) -> Option<InputFile> {
    Some(InputFile::new(name, b"PK\x03\x04word/document.xml".to_vec()))
}

/// An address nothing listens on.
async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_successful_conversion() {
    init_tracing();
    let (addr, mock) = start_server().await;
    let store = Arc::new(MemoryArtifactStore::new());
    let session = assert_ok!(Session::new(config_for(addr, store.clone())));

    let selected = assert_ok!(session.select_file(docx("report.docx")));
    assert_eq!(selected.state, SessionState::FileSelected);
    assert!(selected.can_submit());

    let done = assert_ok!(session.submit().await);
    assert_eq!(done.state, SessionState::Succeeded);
    assert!(done.error.is_none());
    assert!(done.can_download());
    assert_eq!(done.artifact.as_ref().unwrap().file_name, "report_images.zip");
    assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
    assert_eq!(
        mock.content_types.lock().as_slice(),
        [edgequake_docx2png::pipeline::input::DOCX_MIME]
    );

    let (info, bytes) = assert_ok!(session.artifact_bytes().await);
    assert!(bytes.starts_with(b"ZIP:PK"));
    assert_eq!(info.size, bytes.len() as u64);
    assert_eq!(store.live_count(), 1);

    let cleared = assert_ok!(session.clear_selection());
    assert_eq!(cleared.state, SessionState::Idle);
    assert_eq!(store.live_count(), 0);
}

#[tokio::test]
async fn test_service_failure_uses_detail() {
    init_tracing();
    let (addr, _) = start_server().await;
    let store = Arc::new(MemoryArtifactStore::new());
    let session = Session::new(config_for(addr, store.clone())).unwrap();

    session.select_file(docx("bad.docx")).unwrap();
    let s = assert_ok!(session.submit().await);
    assert_eq!(s.state, SessionState::Failed);
    assert_eq!(s.error.as_deref(), Some("bad format"));
    assert!(s.artifact.is_none());
    assert_eq!(store.live_count(), 0);
}

#[tokio::test]
async fn test_service_failure_uses_error_field() {
    let (addr, _) = start_server().await;
    let session = Session::new(config_for(addr, Arc::new(MemoryArtifactStore::new()))).unwrap();

    session.select_file(docx("legacy.docx")).unwrap();
    let s = session.submit().await.unwrap();
    assert_eq!(s.state, SessionState::Failed);
    assert_eq!(s.error.as_deref(), Some("unsupported document"));
}

#[tokio::test]
async fn test_unreadable_error_body_falls_back() {
    let (addr, _) = start_server().await;
    let session = Session::new(config_for(addr, Arc::new(MemoryArtifactStore::new()))).unwrap();

    session.select_file(docx("html.docx")).unwrap();
    let s = session.submit().await.unwrap();
    assert_eq!(s.state, SessionState::Failed);
    assert_eq!(s.error.as_deref(), Some("Conversion failed"));
}

#[tokio::test]
async fn test_unreachable_service_then_retry() {
    init_tracing();
    let addr = closed_addr().await;
    let session = Session::new(config_for(addr, Arc::new(MemoryArtifactStore::new()))).unwrap();

    session.select_file(docx("report.docx")).unwrap();
    let s = session.submit().await.unwrap();
    assert_eq!(s.state, SessionState::Failed);
    assert_eq!(s.error.as_deref(), Some("Conversion failed"));
    assert!(s.can_retry());

    // Still unreachable: retry fails the same way and keeps the selection.
    let again = session.retry().await.unwrap();
    assert_eq!(again.state, SessionState::Failed);
    assert_eq!(again.file.unwrap().name, "report.docx");
}

#[tokio::test]
async fn test_reselect_after_failure_then_succeed() {
    let (addr, mock) = start_server().await;
    let session = Session::new(config_for(addr, Arc::new(MemoryArtifactStore::new()))).unwrap();

    session.select_file(docx("bad.docx")).unwrap();
    assert_eq!(session.submit().await.unwrap().state, SessionState::Failed);

    let s = session.select_file(docx("good.docx")).unwrap();
    assert_eq!(s.state, SessionState::FileSelected);
    assert!(s.error.is_none());

    let s = session.submit().await.unwrap();
    assert_eq!(s.state, SessionState::Succeeded);
    assert_eq!(s.artifact.unwrap().file_name, "good_images.zip");
    assert_eq!(mock.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_submit_is_rejected() {
    init_tracing();
    let (addr, mock) = start_server().await;
    let session = Session::new(config_for(addr, Arc::new(MemoryArtifactStore::new()))).unwrap();
    session.select_file(docx("slow.docx")).unwrap();

    let mut updates = session.subscribe();
    let first = tokio::spawn({
        let session = session.clone();
        async move { session.submit().await }
    });
    updates
        .wait_for(|s| s.state == SessionState::Converting)
        .await
        .unwrap();

    let err = assert_err!(session.submit().await);
    assert!(matches!(err, Docx2PngError::Busy));
    assert!(matches!(
        session.select_file(docx("other.docx")),
        Err(Docx2PngError::Busy)
    ));

    let s = first.await.unwrap().unwrap();
    assert_eq!(s.state, SessionState::Succeeded);
    assert_eq!(s.file.unwrap().name, "slow.docx");
    assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_only_latest_artifact_is_live() {
    let (addr, _) = start_server().await;
    let store = Arc::new(MemoryArtifactStore::new());
    let session = Session::new(config_for(addr, store.clone())).unwrap();

    for name in ["a.docx", "b.docx", "c.docx"] {
        session.select_file(docx(name)).unwrap();
        session.submit().await.unwrap();
        assert_eq!(store.live_count(), 1, "after {name}");
    }

    drop(session);
    assert_eq!(store.live_count(), 0);
}

#[tokio::test]
async fn test_observer_sees_full_lifecycle() {
    let (addr, _) = start_server().await;
    let seen: Arc<Mutex<Vec<SessionState>>> = Arc::default();
    let config = ClientConfig::builder()
        .base_url(format!("http://{addr}"))
        .observer(Arc::new({
            let seen = Arc::clone(&seen);
            move |s: &SessionSnapshot| seen.lock().push(s.state)
        }))
        .build()
        .unwrap();
    let session = Session::new(config).unwrap();

    session.select_file(docx("bad.docx")).unwrap();
    session.submit().await.unwrap();
    session.select_file(docx("good.docx")).unwrap();
    session.submit().await.unwrap();
    session.clear_selection().unwrap();

    use SessionState::*;
    assert_eq!(
        *seen.lock(),
        vec![
            FileSelected,
            Converting,
            Failed,
            FileSelected,
            Converting,
            Succeeded,
            Idle
        ]
    );
}

#[tokio::test]
async fn test_download_to_directory_and_file() {
    let (addr, _) = start_server().await;
    let session = Session::new(config_for(addr, Arc::new(MemoryArtifactStore::new()))).unwrap();
    let out = tempfile::tempdir().unwrap();

    assert!(matches!(
        session.download_to(out.path()).await,
        Err(Docx2PngError::NoArtifact {
            state: SessionState::Idle
        })
    ));

    session.select_file(docx("Quarterly Report.docx")).unwrap();
    session.submit().await.unwrap();

    let in_dir = assert_ok!(session.download_to(out.path()).await);
    assert_eq!(in_dir, out.path().join("Quarterly Report_images.zip"));

    let named = assert_ok!(session.download_to(out.path().join("nested/pages.zip")).await);
    assert_eq!(std::fs::read(&in_dir).unwrap(), std::fs::read(&named).unwrap());
    assert!(!out.path().join("nested/pages.zip.tmp").exists());
}

#[tokio::test]
async fn test_temp_file_store_cleans_up() {
    let (addr, _) = start_server().await;
    let store = Arc::new(TempFileArtifactStore::new().unwrap());
    let dir = store.dir().to_path_buf();
    let config = ClientConfig::builder()
        .base_url(format!("http://{addr}"))
        .artifact_store(store.clone())
        .build()
        .unwrap();
    let session = Session::new(config).unwrap();

    session.select_file(docx("a.docx")).unwrap();
    session.submit().await.unwrap();
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);

    session.select_file(docx("b.docx")).unwrap();
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
}

// ── One-shot API ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_convert_to_file_one_shot() {
    init_tracing();
    let (addr, _) = start_server().await;
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("memo.docx");
    std::fs::write(&input, b"PK\x03\x04memo").unwrap();

    let config = ClientConfig::builder()
        .base_url(format!("http://{addr}"))
        .build()
        .unwrap();
    let report = assert_ok!(convert_to_file(&input, Some(work.path()), &config).await);
    assert_eq!(report.input, "memo.docx");
    assert_eq!(report.output, work.path().join("memo_images.zip"));
    assert_eq!(std::fs::read(&report.output).unwrap(), b"ZIP:PK\x03\x04memo");
}

#[tokio::test]
async fn test_convert_file_reports_failure() {
    let (addr, _) = start_server().await;
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("bad.docx");
    std::fs::write(&input, b"not really a docx").unwrap();

    let config = ClientConfig::builder()
        .base_url(format!("http://{addr}"))
        .build()
        .unwrap();
    let err = assert_err!(convert_file(&input, &config).await);
    match err {
        Docx2PngError::ConversionFailed { file, message } => {
            assert_eq!(file, "bad.docx");
            assert_eq!(message, "bad format");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_input_file() {
    let config = ClientConfig::default();
    let err = assert_err!(convert_file("/definitely/not/here.docx", &config).await);
    assert!(matches!(err, Docx2PngError::FileNotFound { .. }));
}
