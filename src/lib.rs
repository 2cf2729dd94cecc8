pub mod collection;
pub mod config;
pub mod error;
pub mod feed;
pub mod logging;
pub mod models;
pub mod navigation;
pub mod routing;
pub mod shift;

pub use config::Config;
pub use error::Error;
pub use navigation::{NavigationSession, PushedPositionSource, SessionHandle, SessionSettings};
use axum::{Router, routing::{get, post}};
use feed::{HttpScheduleFeed, ScheduleFeed};
use routing::{DirectionsClient, LocalOptimizer, RouteOptimizer};
use shift::SystemClock;
use std::{sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub session: SessionHandle,
    pub positions: Arc<PushedPositionSource>,
}

/// Wires the backend feed, the route optimizer and the position source into
/// a running navigation session. Must be called inside a tokio runtime.
pub fn start_session(config: Config) -> Result<Arc<AppState>, Error> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()
        .map_err(|e| Error::Backend(format!("failed to build HTTP client: {e}")))?;

    let feed: Arc<dyn ScheduleFeed> = Arc::new(HttpScheduleFeed::new(http.clone(), &config.backend_url)?);

    let optimizer: Arc<dyn RouteOptimizer> = match &config.directions_api_key {
        Some(key) => Arc::new(DirectionsClient::new(http, config.directions_api_url.clone(), key.clone())),
        None => {
            tracing::warn!("DIRECTIONS_API_KEY not set, using straight-line route planning");
            Arc::new(LocalOptimizer::new(config.fallback_speed_kmh))
        }
    };

    let clock = SystemClock::with_offset_hours(config.shift_utc_offset_hours).ok_or_else(|| {
        Error::Backend(format!(
            "invalid shift UTC offset {}",
            config.shift_utc_offset_hours
        ))
    })?;

    let positions = Arc::new(PushedPositionSource::new());

    let settings = SessionSettings {
        depot: config.depot,
        schedule_poll: Duration::from_secs(config.schedule_poll_secs.max(1)),
        eta_poll: Duration::from_secs(config.eta_poll_secs.max(1)),
        volume_recheck: Duration::from_secs(config.volume_recheck_secs),
    };

    let (session, handle, receiver) =
        NavigationSession::new(Arc::new(clock), feed, optimizer, positions.clone(), settings);
    session.spawn(receiver);

    Ok(Arc::new(AppState {
        config,
        session: handle,
        positions,
    }))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    // driver commands
    let driver_routes = Router::new()
        .route("/status", get(navigation::routes::get_status))
        .route("/shift", post(navigation::routes::select_shift))
        .route("/route/generate", post(navigation::routes::generate_route))
        .route("/navigation/start", post(navigation::routes::start_navigation))
        .route("/navigation/stop", post(navigation::routes::stop_navigation))
        .route("/navigation/skip", post(navigation::routes::skip_segment))
        .route("/bins/{id}/toggle", post(navigation::routes::toggle_bin));

    // device feeds
    let device_routes = Router::new()
        .route("/position", post(navigation::routes::push_position))
        .route("/position/permission", post(navigation::routes::set_permission))
        .route("/ws/navigation", get(navigation::routes::navigation_ws));

    Router::new()
        .route("/", get(root))
        .merge(driver_routes)
        .merge(device_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn root() -> &'static str {
    "binroute driver bridge - v0.1.0"
}
