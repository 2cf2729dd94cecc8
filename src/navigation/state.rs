use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

use super::instructions::InstructionView;
use super::position::GeoPosition;
use super::segments::{RouteSegment, TrackerPhase};
use crate::error::Error;
use crate::models::{CollectionStatus, Coordinate, Waypoint};
use crate::shift::Shift;

/// Capacity of the session's command queue.
pub const COMMAND_QUEUE_SIZE: usize = 64;
/// Capacity of the update broadcast; slow subscribers lose the oldest.
pub const UPDATE_CHANNEL_SIZE: usize = 100;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverState {
    pub position: Option<Coordinate>,
    pub heading: Option<f64>,
    pub driving: bool,
    pub current_segment_index: usize,
}

impl DriverState {
    /// Keeps the last known position so a new route can start from it.
    pub fn reset(&mut self) {
        self.driving = false;
        self.current_segment_index = 0;
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub route_id: Uuid,
    pub order: Vec<String>,
    pub segments: usize,
    pub eta_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkipOutcome {
    pub skipped: Option<String>,
    pub current_segment_index: usize,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NavigationUpdate {
    #[serde(rename_all = "camelCase")]
    WaypointsRefreshed { shift: Shift, count: usize },
    #[serde(rename_all = "camelCase")]
    RouteGenerated { route_id: Uuid, segments: usize, eta_seconds: u64 },
    NavigationStarted,
    SegmentAdvanced { completed: usize, current: usize },
    WaypointSkipped { id: String },
    CollectionChanged {
        id: String,
        collection: CollectionStatus,
        automatic: bool,
    },
    InstructionChanged(InstructionView),
    #[serde(rename_all = "camelCase")]
    EtaUpdated { eta_seconds: u64 },
    RouteCompleted,
    RouteCleared { reason: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub selected_shift: Shift,
    pub current_shift: Shift,
    pub phase: TrackerPhase,
    pub route_id: Option<Uuid>,
    pub driver: DriverState,
    pub waypoints: Vec<Waypoint>,
    pub segments: Vec<RouteSegment>,
    pub instruction: Option<InstructionView>,
    pub eta_seconds: Option<u64>,
}

type Reply<T> = oneshot::Sender<Result<T, Error>>;

#[derive(Debug)]
pub enum SessionCommand {
    Position(GeoPosition),
    RefreshWaypoints,
    RefreshEta,
    SelectShift(Shift, Reply<()>),
    GenerateRoute {
        origin: Option<Coordinate>,
        destination: Option<Coordinate>,
        reply: Reply<RouteSummary>,
    },
    StartNavigation(Reply<()>),
    StopNavigation(Reply<()>),
    SkipSegment(Reply<SkipOutcome>),
    ToggleCollection(String, Reply<CollectionStatus>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Cloneable front of the navigation session. Every call is queued on the
/// session's single command channel.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    updates: broadcast::Sender<NavigationUpdate>,
}

impl SessionHandle {
    pub fn new(commands: mpsc::Sender<SessionCommand>, updates: broadcast::Sender<NavigationUpdate>) -> Self {
        Self { commands, updates }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NavigationUpdate> {
        self.updates.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> SessionCommand) -> Result<T, Error> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| Error::SessionClosed)?;
        rx.await.map_err(|_| Error::SessionClosed)?
    }

    pub async fn select_shift(&self, shift: Shift) -> Result<(), Error> {
        self.request(|reply| SessionCommand::SelectShift(shift, reply)).await
    }

    pub async fn generate_route(
        &self,
        origin: Option<Coordinate>,
        destination: Option<Coordinate>,
    ) -> Result<RouteSummary, Error> {
        self.request(|reply| SessionCommand::GenerateRoute {
            origin,
            destination,
            reply,
        })
        .await
    }

    pub async fn start_navigation(&self) -> Result<(), Error> {
        self.request(SessionCommand::StartNavigation).await
    }

    pub async fn stop_navigation(&self) -> Result<(), Error> {
        self.request(SessionCommand::StopNavigation).await
    }

    pub async fn skip_segment(&self) -> Result<SkipOutcome, Error> {
        self.request(SessionCommand::SkipSegment).await
    }

    pub async fn toggle_collection(&self, id: String) -> Result<CollectionStatus, Error> {
        self.request(|reply| SessionCommand::ToggleCollection(id, reply)).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, Error> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(SessionCommand::Snapshot(tx))
            .await
            .map_err(|_| Error::SessionClosed)?;
        rx.await.map_err(|_| Error::SessionClosed)
    }
}
