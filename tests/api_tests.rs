use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use binroute::navigation::{GeoPosition, GeoPositionSource};
use binroute::shift::{current_shift, Shift};
use binroute::{create_router, start_session, Config};
use chrono::{FixedOffset, Utc};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::*;

fn test_config(server: &MockServer) -> Config {
    Config {
        backend_url: server.uri(),
        directions_api_url: server.uri(),
        directions_api_key: None,
        server_address: "127.0.0.1:0".to_string(),
        depot: Some(DEPOT),
        shift_utc_offset_hours: 8,
        schedule_poll_secs: 60,
        eta_poll_secs: 60,
        volume_recheck_secs: 5,
        http_timeout_secs: 5,
        fallback_speed_kmh: 30.0,
    }
}

async fn app(server: &MockServer) -> axum::Router {
    let state = start_session(test_config(server)).expect("session starts");
    create_router(state)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .method("POST")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).method("GET").body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// A working shift other than the one the depot is in right now.
fn inactive_shift() -> Shift {
    let now = Utc::now().with_timezone(&FixedOffset::east_opt(8 * 3600).unwrap());
    match current_shift(now) {
        Shift::First => Shift::Second,
        _ => Shift::First,
    }
}

#[tokio::test]
async fn test_root_banner() {
    let server = MockServer::start().await;
    let router = app(&server).await;

    let response = router.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&body).starts_with("binroute"));
}

#[tokio::test]
async fn test_stop_requires_confirmation() {
    let server = MockServer::start().await;
    let router = app(&server).await;

    let response = router
        .clone()
        .oneshot(post_json("/navigation/stop", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .oneshot(post_json("/navigation/stop", json!({"confirm": true})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_position_needs_permission() {
    let server = MockServer::start().await;
    let router = app(&server).await;
    let position = json!({"latitude": 8.2, "longitude": 124.24, "heading": 90.0});

    let response = router
        .clone()
        .oneshot(post_json("/position", position.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(json_body(response).await["error"]
        .as_str()
        .unwrap()
        .starts_with("position unavailable"));

    let response = router
        .clone()
        .oneshot(post_json("/position/permission", json!({"granted": true})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(post_json("/position", position))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_start_without_route_is_bad_request() {
    let server = MockServer::start().await;
    let router = app(&server).await;

    let response = router
        .oneshot(post_json("/navigation/start", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_on_inactive_shift_conflicts() {
    let server = MockServer::start().await;
    let shift = inactive_shift();
    mount_shift(&server, shift.as_str(), alpha_and_bravo()).await;
    let router = app(&server).await;

    let response = router
        .clone()
        .oneshot(post_json("/shift", json!({"shift": shift})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(post_json("/route/generate", json!({"origin": {"latitude": 8.19, "longitude": 124.23}})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = router.oneshot(get("/status")).await.unwrap();
    let status = json_body(response).await;
    assert_eq!(status["selectedShift"], json!(shift));
    assert_eq!(status["phase"], json!("Idle"));
    assert_eq!(status["waypoints"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_backlog_route_and_toggle() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/backlogs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alpha_and_bravo()))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/schedules/b/collect"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let router = app(&server).await;

    let response = router
        .clone()
        .oneshot(post_json("/shift", json!({"shift": "Backlog"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .clone()
        .oneshot(post_json("/route/generate", json!({"origin": {"latitude": 8.19, "longitude": 124.23}})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let summary = json_body(response).await;
    assert_eq!(summary["order"], json!(["a", "b"]));
    assert_eq!(summary["segments"], json!(3));

    let response = router
        .clone()
        .oneshot(post_json("/bins/b/toggle", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["collection"], json!("Collected"));

    let response = router
        .clone()
        .oneshot(post_json("/bins/nope/toggle", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = router.oneshot(get("/status")).await.unwrap();
    let status = json_body(response).await;
    assert_eq!(status["phase"], json!("Built"));
    assert_eq!(status["segments"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_navigation_socket_streams_updates_and_reads_fixes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/backlogs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alpha_and_bravo()))
        .mount(&server)
        .await;

    let state = start_session(test_config(&server)).expect("session starts");
    state.positions.set_permission(true).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let router = create_router(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{address}/ws/navigation"))
        .await
        .expect("socket connects");

    // unreadable frames are ignored and the socket stays usable
    socket.send(WsMessage::Text("not a position".into())).await.unwrap();
    let fix = json!({"latitude": 8.21, "longitude": 124.25, "heading": 45.0});
    socket.send(WsMessage::Text(fix.to_string().into())).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while state.positions.last_known().await.map(|p| p.coordinate)
            != Some(GeoPosition::new(8.21, 124.25).coordinate)
        {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("fix from socket reached the position source");
    assert_eq!(state.positions.last_known().await.unwrap().heading, Some(45.0));

    state.session.select_shift(Shift::Backlog).await.unwrap();

    let update = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let frame = socket.next().await.expect("socket open").expect("readable frame");
            if let WsMessage::Text(text) = frame {
                let update: Value = serde_json::from_str(text.as_str()).unwrap();
                if update["type"] == "waypointsRefreshed" && update["shift"] == "Backlog" {
                    return update;
                }
            }
        }
    })
    .await
    .expect("backlog refresh streamed");
    assert_eq!(update["count"], json!(2));
}
