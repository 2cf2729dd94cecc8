#![allow(dead_code)]

use async_trait::async_trait;
use binroute::error::Error;
use binroute::feed::HttpScheduleFeed;
use binroute::models::Coordinate;
use binroute::navigation::{GeoPosition, NavigationSession, PushedPositionSource, SessionHandle, SessionSettings};
use binroute::routing::{NavigationStep, OptimizedRoute, RouteOptimizer, RouteRequest};
use binroute::shift::FixedClock;
use chrono::{DateTime, FixedOffset, TimeZone};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const ORIGIN: Coordinate = Coordinate {
    latitude: 8.190,
    longitude: 124.230,
};
pub const DEPOT: Coordinate = Coordinate {
    latitude: 8.250,
    longitude: 124.280,
};
pub const ALPHA: Coordinate = Coordinate {
    latitude: 8.20,
    longitude: 124.24,
};
pub const BRAVO: Coordinate = Coordinate {
    latitude: 8.23,
    longitude: 124.26,
};

/// Local time at the depot (UTC+8) on a fixed day.
pub fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(8 * 3600)
        .unwrap()
        .with_ymd_and_hms(2024, 3, 4, hour, minute, 0)
        .unwrap()
}

/// A point `meters` north of `c`.
pub fn north_of(c: Coordinate, meters: f64) -> GeoPosition {
    let degrees = meters / (binroute::navigation::geo::EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0);
    GeoPosition::new(c.latitude + degrees, c.longitude)
}

pub fn schedule_entry(id: &str, name: &str, at: Coordinate, volume: f64, iot: bool) -> Value {
    json!({
        "_id": id,
        "locationId": {
            "_id": format!("loc-{id}"),
            "name": name,
            "latitude": at.latitude,
            "longitude": at.longitude,
            "volume": volume,
            "status": "Active",
            "type": if iot { "IoT" } else { "Non-IoT" }
        },
        "collection": "Pending"
    })
}

pub fn alpha_and_bravo() -> Value {
    json!([
        schedule_entry("a", "Alpha", ALPHA, 85.0, true),
        schedule_entry("b", "Bravo", BRAVO, 90.0, true),
    ])
}

pub async fn mount_shift(server: &MockServer, shift: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/schedules/today/{shift}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_location(server: &MockServer, name: &str, volume: f64) {
    Mock::given(method("GET"))
        .and(path(format!("/locations/name/{name}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": name,
            "latitude": 0.0,
            "longitude": 0.0,
            "volume": volume,
            "status": "Active",
            "type": "IoT"
        })))
        .mount(server)
        .await;
}

/// Optimizer that returns a fixed visiting order and records requests.
pub struct ScriptedOptimizer {
    pub order: Vec<usize>,
    pub leg_seconds: u64,
    pub calls: AtomicUsize,
    pub requests: Mutex<Vec<RouteRequest>>,
}

impl ScriptedOptimizer {
    pub fn new(order: Vec<usize>) -> Self {
        Self {
            order,
            leg_seconds: 120,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouteOptimizer for ScriptedOptimizer {
    async fn plan(&self, request: &RouteRequest) -> Result<OptimizedRoute, Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let waypoint_order = if request.optimize {
            self.order.clone()
        } else {
            (0..request.stops.len()).collect()
        };
        let legs = request.stops.len() + 1;

        Ok(OptimizedRoute {
            waypoint_order,
            steps: vec![NavigationStep {
                instruction: "Head <b>north</b>".to_string(),
                start_location: request.origin,
                distance_meters: 400.0,
                distance_text: Some("0.4 km".to_string()),
            }],
            leg_durations: vec![self.leg_seconds; legs],
        })
    }
}

pub struct TestSession {
    pub session: NavigationSession,
    pub handle: SessionHandle,
    pub receiver: mpsc::Receiver<binroute::navigation::state::SessionCommand>,
    pub clock: Arc<FixedClock>,
    pub positions: Arc<PushedPositionSource>,
}

pub fn build_session(server: &MockServer, clock_at: DateTime<FixedOffset>, optimizer: Arc<dyn RouteOptimizer>) -> TestSession {
    let feed = HttpScheduleFeed::new(reqwest::Client::new(), &server.uri()).expect("valid mock url");
    let clock = Arc::new(FixedClock::new(clock_at));
    let positions = Arc::new(PushedPositionSource::new());

    let settings = SessionSettings {
        depot: Some(DEPOT),
        schedule_poll: Duration::from_secs(3),
        eta_poll: Duration::from_secs(30),
        volume_recheck: Duration::from_secs(5),
    };

    let (session, handle, receiver) = NavigationSession::new(
        clock.clone(),
        Arc::new(feed),
        optimizer,
        positions.clone(),
        settings,
    );

    TestSession {
        session,
        handle,
        receiver,
        clock,
        positions,
    }
}
