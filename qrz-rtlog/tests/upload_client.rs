use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Form, Router};
use qrz_rtlog::upload::QrzClient;
use qrz_rtlog_core::contract::LogbookClient;
use qrz_rtlog_core::error::UploadError;

#[derive(Clone, Default)]
struct Seen {
    forms: Arc<Mutex<Vec<HashMap<String, String>>>>,
    agents: Arc<Mutex<Vec<String>>>,
}

/// Stand-in for the logbook API: rejects records mentioning "dupe" the way
/// the real service rejects duplicates.
async fn logbook(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> String {
    let agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    seen.agents.lock().unwrap().push(agent);
    let adif = form.get("ADIF").cloned().unwrap_or_default();
    seen.forms.lock().unwrap().push(form);

    if adif.contains("dupe") {
        "RESULT=FAIL&REASON=Unable to add QSO to database: duplicate&COUNT=0".to_string()
    } else {
        "RESULT=OK&LOGID=130877825&COUNT=1".to_string()
    }
}

async fn unavailable() -> (StatusCode, &'static str) {
    (StatusCode::SERVICE_UNAVAILABLE, "down for maintenance")
}

async fn stub_server() -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route("/api", post(logbook))
        .route("/broken", post(unavailable))
        .with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), seen)
}

#[tokio::test]
async fn insert_posts_key_action_and_record() {
    let (base, seen) = stub_server().await;
    let client = QrzClient::new("AB3GY", "TEST-KEY", false, Some(&format!("{base}/api"))).unwrap();

    let result = client
        .upload("<call:4>W1AW <band:3>20m <eor>")
        .await
        .unwrap();

    assert_eq!(result.count, 1);
    assert!(result.status);
    assert_eq!(result.info, "LOGID=130877825");

    let forms = seen.forms.lock().unwrap();
    assert_eq!(forms.len(), 1);
    assert_eq!(forms[0]["KEY"], "TEST-KEY");
    assert_eq!(forms[0]["ACTION"], "INSERT");
    assert_eq!(forms[0]["ADIF"], "<call:4>W1AW <band:3>20m <eor>");

    let agents = seen.agents.lock().unwrap();
    assert!(agents[0].contains("qrz-rtlog"), "user agent was {}", agents[0]);
    assert!(agents[0].contains("AB3GY"), "user agent was {}", agents[0]);
}

#[tokio::test]
async fn duplicate_is_reported_with_reason() {
    let (base, _seen) = stub_server().await;
    let client = QrzClient::new("AB3GY", "TEST-KEY", true, Some(&format!("{base}/api"))).unwrap();

    let result = client.upload("<call:4>dupe <eor>").await.unwrap();

    assert_eq!(result.count, 0);
    assert!(!result.status);
    assert_eq!(result.info, "Unable to add QSO to database: duplicate");
    assert!(!result.outcome().is_delivered());
}

#[tokio::test]
async fn http_error_status_is_a_response_error() {
    let (base, _seen) = stub_server().await;
    let client =
        QrzClient::new("AB3GY", "TEST-KEY", false, Some(&format!("{base}/broken"))).unwrap();

    let err = client.upload("<call:4>W1AW <eor>").await.unwrap_err();
    assert!(matches!(err, UploadError::Response(_)), "got {err:?}");
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    let port = {
        let vacated = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        vacated.local_addr().unwrap().port()
    };
    let url = format!("http://127.0.0.1:{port}/api");
    let client = QrzClient::new("AB3GY", "TEST-KEY", false, Some(&url)).unwrap();

    let err = client.upload("<call:4>W1AW <eor>").await.unwrap_err();
    assert!(matches!(err, UploadError::Transport(_)), "got {err:?}");
}
