//! `RestBackend` against a mock backend-as-a-service served by axum on an
//! ephemeral port.

use std::sync::{Arc, Mutex};

use airwave_proto::backend::{AuthEvent, Backend, ChangeKind, RestBackend, Table};
use airwave_proto::config::BackendConfig;
use airwave_proto::error::BackendError;
use airwave_proto::model::{NewComment, StationDraft};
use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::json;

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: String,
    bearer: Option<String>,
    apikey: Option<String>,
    prefer: Option<String>,
    body: Vec<u8>,
}

type Log = Arc<Mutex<Vec<Recorded>>>;

fn header(req: &Request, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn handle(State(log): State<Log>, req: Request) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or_default().to_string();
    let bearer = header(&req, "authorization").map(|v| v.trim_start_matches("Bearer ").to_string());
    let apikey = header(&req, "apikey");
    let prefer = header(&req, "prefer");
    let body = to_bytes(req.into_body(), usize::MAX)
        .await
        .map(|b| b.to_vec())
        .unwrap_or_default();
    log.lock().unwrap().push(Recorded {
        method: method.clone(),
        path: path.clone(),
        query: query.clone(),
        bearer,
        apikey,
        prefer,
        body: body.clone(),
    });

    let token = json!({
        "access_token": "user-token",
        "refresh_token": "refresh-1",
        "expires_in": 3600,
        "user": { "id": "user-1", "email": "dj@example.com" }
    });

    match (method.as_str(), path.as_str()) {
        ("GET", "/rest/v1/radio_stations") => axum::Json(json!([
            { "id": "s1", "name": "alpha", "stream_url": "http://a", "category": "Jazz",
              "is_featured": null, "listeners": null },
            { "id": "s2", "name": "Beta", "stream_url": "http://b", "category": ["Rock", "Pop"],
              "is_featured": true, "listeners": 12 }
        ]))
        .into_response(),
        ("PATCH", "/rest/v1/radio_stations") => {
            let mut row: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
            row["id"] = json!("s1");
            axum::Json(json!([row])).into_response()
        }
        ("POST", "/rest/v1/user_favorites") => {
            (StatusCode::CONFLICT, axum::Json(json!({ "message": "duplicate key value" })))
                .into_response()
        }
        ("POST", "/rest/v1/station_comments") => {
            let row: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
            axum::Json(json!([{
                "id": "c1",
                "station_id": row["station_id"],
                "user_id": row["user_id"],
                "content": row["content"],
                "created_at": "2024-05-01T12:00:00Z"
            }]))
            .into_response()
        }
        ("DELETE", "/rest/v1/station_comments") => axum::Json(json!([{
            "id": query.trim_start_matches("id=eq."),
            "station_id": "s1",
            "user_id": "user-1",
            "content": "gone",
            "created_at": "2024-05-01T12:00:00Z"
        }]))
        .into_response(),
        ("DELETE", _) => StatusCode::NO_CONTENT.into_response(),
        ("GET", "/rest/v1/profiles") => (
            StatusCode::UNAUTHORIZED,
            axum::Json(json!({ "message": "JWT expired" })),
        )
            .into_response(),
        ("POST", "/auth/v1/token") => axum::Json(token).into_response(),
        ("POST", "/auth/v1/signup") => {
            axum::Json(json!({ "id": "user-2", "email": "new@example.com" })).into_response()
        }
        ("POST", "/auth/v1/logout") => StatusCode::NO_CONTENT.into_response(),
        ("POST", p) if p.starts_with("/storage/v1/object/") => {
            axum::Json(json!({ "Key": p })).into_response()
        }
        _ => (StatusCode::NOT_FOUND, Body::empty()).into_response(),
    }
}

async fn start_mock() -> (String, Log) {
    let log: Log = Arc::default();
    let app = Router::new().fallback(handle).with_state(log.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), log)
}

fn backend(url: &str, auth_file: Option<std::path::PathBuf>) -> RestBackend {
    RestBackend::new(
        &BackendConfig {
            url: url.to_string(),
            anon_key: "anon-key".into(),
            ..BackendConfig::default()
        },
        auth_file,
    )
    .unwrap()
}

fn last(log: &Log) -> Recorded {
    log.lock().unwrap().last().cloned().unwrap()
}

#[tokio::test]
async fn lists_stations_with_anon_key() {
    let (url, log) = start_mock().await;
    let b = backend(&url, None);
    let stations = b.list_stations().await.unwrap();

    assert_eq!(stations.len(), 2);
    assert_eq!(stations[0].name, "alpha");
    assert_eq!(stations[0].category, vec!["Jazz"]);
    assert!(!stations[0].is_featured);
    assert_eq!(stations[1].listeners, 12);

    let req = last(&log);
    assert_eq!(req.query, "select=*&order=name.asc");
    assert_eq!(req.apikey.as_deref(), Some("anon-key"));
    assert_eq!(req.bearer.as_deref(), Some("anon-key"));
}

#[tokio::test]
async fn sign_in_switches_bearer_and_persists_session() {
    let (url, log) = start_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let auth_file = dir.path().join("auth.json");
    let b = backend(&url, Some(auth_file.clone()));
    let mut events = b.auth_events();

    let session = b.sign_in_with_password("dj@example.com", "secret1").await.unwrap();
    assert_eq!(session.user_id, "user-1");
    assert!(matches!(events.try_recv(), Ok(AuthEvent::SignedIn(_))));

    let req = last(&log);
    assert_eq!(req.path, "/auth/v1/token");
    assert_eq!(req.query, "grant_type=password");
    assert!(auth_file.exists());

    let mut changes = b.subscribe();
    b.delete_comment("c9").await.unwrap();
    let req = last(&log);
    assert_eq!(req.method, Method::DELETE);
    assert_eq!(req.path, "/rest/v1/station_comments");
    assert_eq!(req.query, "id=eq.c9");
    assert_eq!(req.bearer.as_deref(), Some("user-token"));
    assert_eq!(req.prefer.as_deref(), Some("return=representation"));
    let event = changes.try_recv().unwrap();
    assert_eq!(event.table, Table::Comments);
    assert_eq!(event.kind, ChangeKind::Delete);
    // the thread, not the comment
    assert_eq!(event.id.as_deref(), Some("s1"));

    let restored = backend(&url, Some(auth_file.clone()));
    assert_eq!(
        restored.restore_session().await.unwrap().map(|s| s.user_id),
        Some("user-1".to_string())
    );

    b.sign_out().await.unwrap();
    assert!(b.current_session().await.is_none());
    assert!(!auth_file.exists());
    assert_eq!(last(&log).path, "/auth/v1/logout");
}

#[tokio::test]
async fn error_statuses_map_to_variants() {
    let (url, _log) = start_mock().await;
    let b = backend(&url, None);

    let err = b.add_favorite("u", "s1").await.unwrap_err();
    assert!(matches!(err, BackendError::Conflict(ref m) if m == "duplicate key value"));

    let err = b.list_profiles().await.unwrap_err();
    assert!(err.is_unauthenticated());
}

#[tokio::test]
async fn writes_ask_for_representation() {
    let (url, log) = start_mock().await;
    let b = backend(&url, None);

    let comment = b
        .insert_comment(&NewComment {
            station_id: "s1".into(),
            user_id: "u1".into(),
            content: "great set".into(),
        })
        .await
        .unwrap();
    assert_eq!(comment.id, "c1");
    assert_eq!(last(&log).prefer.as_deref(), Some("return=representation"));

    let draft = StationDraft {
        name: "Renamed".into(),
        stream_url: "http://a".into(),
        category: vec!["Jazz".into()],
        ..StationDraft::default()
    };
    let updated = b.update_station("s1", &draft).await.unwrap();
    assert_eq!(updated.name, "Renamed");
    assert!(updated.updated_at.is_some());
    let req = last(&log);
    assert_eq!(req.query, "id=eq.s1");
    let sent: serde_json::Value = serde_json::from_slice(&req.body).unwrap();
    assert!(sent.get("updated_at").is_some());
}

#[tokio::test]
async fn upload_returns_public_url() {
    let (url, log) = start_mock().await;
    let b = backend(&url, None);
    let public = b
        .upload("station_images", "1700000000000.png", vec![9, 9], "image/png")
        .await
        .unwrap();
    assert_eq!(
        public,
        format!("{url}/storage/v1/object/public/station_images/1700000000000.png")
    );
    let req = last(&log);
    assert_eq!(req.path, "/storage/v1/object/station_images/1700000000000.png");
    assert_eq!(req.body, vec![9, 9]);
}

#[tokio::test]
async fn sign_up_pending_confirmation_has_no_session() {
    let (url, _log) = start_mock().await;
    let b = backend(&url, None);
    let outcome = b
        .sign_up("new@example.com", "secret1", Some("New"))
        .await
        .unwrap();
    assert!(outcome.is_none());
    assert!(b.current_session().await.is_none());
}
