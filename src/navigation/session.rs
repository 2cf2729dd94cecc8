use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use super::instructions::{select_current_step, InstructionView};
use super::position::{GeoPosition, GeoPositionSource};
use super::segments::{Advance, RouteSegmentTracker, SegmentTarget, TrackerPhase};
use super::state::{
    DriverState, NavigationUpdate, RouteSummary, SessionCommand, SessionHandle, SessionSnapshot, SkipOutcome,
    COMMAND_QUEUE_SIZE, UPDATE_CHANNEL_SIZE,
};
use crate::collection::{AutoCollect, CollectionStateManager};
use crate::error::Error;
use crate::feed::ScheduleFeed;
use crate::models::{CollectionStatus, Coordinate, Waypoint};
use crate::routing::{NavigationStep, RouteOptimizer, RouteRequest, RouteStop};
use crate::shift::{Clock, Shift, ShiftSelector};

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Final stop of every route unless the driver names another one.
    pub depot: Option<Coordinate>,
    pub schedule_poll: Duration,
    pub eta_poll: Duration,
    pub volume_recheck: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            depot: None,
            schedule_poll: Duration::from_secs(3),
            eta_poll: Duration::from_secs(30),
            volume_recheck: crate::collection::DEFAULT_VOLUME_RECHECK,
        }
    }
}

struct ActiveRoute {
    id: Uuid,
    steps: Vec<NavigationStep>,
    /// Seconds per segment, same indexing as the tracker's segments.
    leg_durations: Vec<u64>,
    eta_updated_at: DateTime<Utc>,
}

impl ActiveRoute {
    fn remaining_seconds(&self, from_segment: usize) -> u64 {
        self.leg_durations.iter().skip(from_segment).sum()
    }
}

/// Single owner of all route, driver and waypoint state. Everything that
/// changes it arrives as a [`SessionCommand`] and is handled one at a time.
pub struct NavigationSession {
    shifts: ShiftSelector,
    collection: CollectionStateManager,
    tracker: RouteSegmentTracker,
    feed: Arc<dyn ScheduleFeed>,
    optimizer: Arc<dyn RouteOptimizer>,
    positions: Arc<dyn GeoPositionSource>,
    settings: SessionSettings,
    driver: DriverState,
    route: Option<ActiveRoute>,
    instruction: Option<InstructionView>,
    updates: broadcast::Sender<NavigationUpdate>,
    /// Only handles keep the queue open; the session itself never does.
    commands: mpsc::WeakSender<SessionCommand>,
    position_task: Option<JoinHandle<()>>,
}

impl NavigationSession {
    /// Builds a session, its first handle and the receiving end of its
    /// command queue. Use [`NavigationSession::spawn`] to run it; it stops
    /// once every [`SessionHandle`] is dropped.
    pub fn new(
        clock: Arc<dyn Clock>,
        feed: Arc<dyn ScheduleFeed>,
        optimizer: Arc<dyn RouteOptimizer>,
        positions: Arc<dyn GeoPositionSource>,
        settings: SessionSettings,
    ) -> (Self, SessionHandle, mpsc::Receiver<SessionCommand>) {
        let (commands, receiver) = mpsc::channel(COMMAND_QUEUE_SIZE);
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);
        let handle = SessionHandle::new(commands.clone(), updates.clone());

        let session = Self {
            shifts: ShiftSelector::new(clock),
            collection: CollectionStateManager::new(feed.clone(), settings.volume_recheck),
            tracker: RouteSegmentTracker::new(),
            feed,
            optimizer,
            positions,
            settings,
            driver: DriverState::default(),
            route: None,
            instruction: None,
            updates,
            commands: commands.downgrade(),
            position_task: None,
        };
        (session, handle, receiver)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NavigationUpdate> {
        self.updates.subscribe()
    }

    /// Runs the session and its pollers in the background.
    pub fn spawn(self, receiver: mpsc::Receiver<SessionCommand>) -> JoinHandle<()> {
        spawn_poller(
            self.commands.clone(),
            self.settings.schedule_poll,
            || SessionCommand::RefreshWaypoints,
        );
        spawn_poller(self.commands.clone(), self.settings.eta_poll, || SessionCommand::RefreshEta);
        tokio::spawn(self.run(receiver))
    }

    pub async fn run(mut self, mut receiver: mpsc::Receiver<SessionCommand>) {
        tracing::info!(shift = %self.shifts.selected(), "Navigation session started");

        while let Some(command) = receiver.recv().await {
            self.dispatch(command).await;
        }

        self.stop_position_updates();
        tracing::info!("Navigation session closed");
    }

    async fn dispatch(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Position(position) => self.handle_position(position).await,
            SessionCommand::RefreshWaypoints => self.refresh_waypoints().await,
            SessionCommand::RefreshEta => self.refresh_eta().await,
            SessionCommand::SelectShift(shift, reply) => {
                let _ = reply.send(self.select_shift(shift).await);
            }
            SessionCommand::GenerateRoute {
                origin,
                destination,
                reply,
            } => {
                let _ = reply.send(self.generate_route(origin, destination).await);
            }
            SessionCommand::StartNavigation(reply) => {
                let _ = reply.send(self.start_navigation().await);
            }
            SessionCommand::StopNavigation(reply) => {
                let _ = reply.send(self.stop_navigation().await);
            }
            SessionCommand::SkipSegment(reply) => {
                let _ = reply.send(self.skip_segment().await);
            }
            SessionCommand::ToggleCollection(id, reply) => {
                let _ = reply.send(self.toggle_collection(&id).await);
            }
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn publish(&self, update: NavigationUpdate) {
        // no receivers is fine
        let _ = self.updates.send(update);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            selected_shift: self.shifts.selected(),
            current_shift: self.shifts.current(),
            phase: self.tracker.phase(),
            route_id: self.route.as_ref().map(|r| r.id),
            driver: self.driver.clone(),
            waypoints: self.collection.waypoints().to_vec(),
            segments: self.tracker.segments().to_vec(),
            instruction: self.instruction.clone(),
            eta_seconds: self
                .route
                .as_ref()
                .map(|r| r.remaining_seconds(self.tracker.current_index())),
        }
    }

    pub async fn select_shift(&mut self, shift: Shift) -> Result<(), Error> {
        let previous = self.shifts.selected();
        self.shifts.select_shift(shift);
        tracing::info!(from = %previous, to = %shift, "Shift selected");

        if self.tracker.phase() != TrackerPhase::Idle || self.driver.driving {
            self.clear_route("shift changed");
        }
        self.refresh_waypoints().await;
        Ok(())
    }

    pub async fn refresh_waypoints(&mut self) {
        let shift = self.shifts.selected();
        let entries = match self.feed.fetch_shift(shift).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(shift = %shift, error = %e, "Schedule refresh failed");
                return;
            }
        };

        let waypoints: Vec<Waypoint> = entries.into_iter().map(Waypoint::from).collect();
        let count = waypoints.len();

        if self.tracker.phase() == TrackerPhase::Idle {
            self.collection.replace_all(waypoints);
        } else {
            self.collection.merge_refresh(waypoints);
        }

        tracing::debug!(shift = %shift, count, "Waypoints refreshed");
        self.publish(NavigationUpdate::WaypointsRefreshed { shift, count });
    }

    pub async fn generate_route(
        &mut self,
        origin: Option<Coordinate>,
        destination: Option<Coordinate>,
    ) -> Result<RouteSummary, Error> {
        self.shifts.guard()?;

        // every fix the session saw came through the source, so its last
        // one is never older than ours
        let last_fix = match self.positions.last_known().await {
            Some(position) => Some(position.coordinate),
            None => self.driver.position,
        };
        let origin = origin
            .or(last_fix)
            .ok_or_else(|| Error::RoutingFailure("current position is unknown".to_string()))?;
        let destination = destination
            .or(self.settings.depot)
            .ok_or_else(|| Error::RoutingFailure("no destination configured".to_string()))?;

        let candidates = self.collection.routable();
        if candidates.is_empty() {
            return Err(Error::RoutingFailure("no pending bins for this shift".to_string()));
        }

        let request = RouteRequest {
            origin,
            destination,
            stops: candidates
                .iter()
                .map(|w| RouteStop {
                    label: w.name.clone(),
                    coordinate: w.coordinate,
                })
                .collect(),
            optimize: true,
        };

        let planned = self.optimizer.plan(&request).await.map_err(|e| {
            tracing::error!(error = %e, stops = candidates.len(), "Route optimization failed");
            e
        })?;
        let ordered = planned.reorder(&candidates)?;

        let mut tracker = RouteSegmentTracker::new();
        if !tracker.build(Some(origin), &ordered, Some(destination)) {
            return Err(Error::RoutingFailure("route has no segments".to_string()));
        }

        let segments = tracker.segments().len();
        let mut leg_durations = planned.leg_durations;
        leg_durations.resize(segments, 0);

        // the new route is complete, replace whatever was there
        if self.tracker.phase() != TrackerPhase::Idle || self.driver.driving {
            self.clear_route("route regenerated");
        }

        let order: Vec<String> = ordered.iter().map(|w| w.id.clone()).collect();
        self.collection.reorder(&order);
        self.tracker = tracker;
        self.driver.reset();

        let route = ActiveRoute {
            id: Uuid::new_v4(),
            steps: planned.steps,
            leg_durations,
            eta_updated_at: Utc::now(),
        };
        let summary = RouteSummary {
            route_id: route.id,
            order,
            segments,
            eta_seconds: route.remaining_seconds(0),
        };
        self.route = Some(route);

        tracing::info!(
            route_id = %summary.route_id,
            segments,
            eta_seconds = summary.eta_seconds,
            "Route generated"
        );
        self.publish(NavigationUpdate::RouteGenerated {
            route_id: summary.route_id,
            segments,
            eta_seconds: summary.eta_seconds,
        });
        Ok(summary)
    }

    pub async fn start_navigation(&mut self) -> Result<(), Error> {
        if self.route.is_none() || self.tracker.phase() != TrackerPhase::Built {
            return Err(Error::NoRoute);
        }
        if self.driver.driving {
            return Ok(());
        }

        let mut subscription = self.positions.subscribe().await.map_err(|e| {
            tracing::error!(error = %e, "Cannot start navigation without location");
            e
        })?;

        let commands = self.commands.clone();
        self.position_task = Some(tokio::spawn(async move {
            while let Some(position) = subscription.next().await {
                let Some(commands) = commands.upgrade() else {
                    break;
                };
                match commands.try_send(SessionCommand::Position(position)) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        tracing::debug!("Session busy, dropping position update");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        }));

        self.driver.driving = true;
        self.driver.current_segment_index = self.tracker.current_index();
        tracing::info!("Navigation started");
        self.publish(NavigationUpdate::NavigationStarted);
        Ok(())
    }

    pub async fn stop_navigation(&mut self) -> Result<(), Error> {
        self.clear_route("stopped by driver");
        self.refresh_waypoints().await;
        Ok(())
    }

    pub async fn skip_segment(&mut self) -> Result<SkipOutcome, Error> {
        if self.tracker.phase() != TrackerPhase::Built {
            return Err(Error::NoRoute);
        }

        let (advance, skipped) = self.tracker.skip_segment();
        if let Some(id) = &skipped {
            self.collection.mark_skipped(id)?;
            tracing::info!(schedule_id = %id, "Bin skipped");
            self.publish(NavigationUpdate::WaypointSkipped { id: id.clone() });
        }

        let completed = self.apply_advance(advance).await;
        Ok(SkipOutcome {
            skipped,
            current_segment_index: self.driver.current_segment_index,
            completed,
        })
    }

    pub async fn toggle_collection(&mut self, id: &str) -> Result<CollectionStatus, Error> {
        let collection = self.collection.toggle_manual(&self.shifts, id).await?;
        self.publish(NavigationUpdate::CollectionChanged {
            id: id.to_string(),
            collection,
            automatic: false,
        });
        Ok(collection)
    }

    pub async fn handle_position(&mut self, position: GeoPosition) {
        self.driver.position = Some(position.coordinate);
        self.driver.heading = position.heading;

        if !self.driver.driving || self.tracker.phase() != TrackerPhase::Built {
            return;
        }

        self.auto_collect_nearby(&position.coordinate).await;

        if self.tracker.has_arrived(&position.coordinate) {
            let index = self.tracker.current_index();
            let advance = self.tracker.advance_from(index);
            if self.apply_advance(advance).await {
                return;
            }
        }

        self.update_instruction(&position.coordinate);
    }

    async fn auto_collect_nearby(&mut self, position: &Coordinate) {
        let route_bins: Vec<String> = self
            .tracker
            .segments()
            .iter()
            .filter_map(|s| match &s.target {
                SegmentTarget::Waypoint(id) => Some(id.clone()),
                SegmentTarget::Destination => None,
            })
            .collect();

        for id in route_bins {
            match self
                .collection
                .check_proximity_auto_collect(&self.shifts, &id, position)
                .await
            {
                Ok(AutoCollect::Collected { volume }) => {
                    tracing::info!(schedule_id = %id, volume, "Bin emptied on arrival");
                    self.publish(NavigationUpdate::CollectionChanged {
                        id,
                        collection: CollectionStatus::Collected,
                        automatic: true,
                    });
                }
                Ok(_) => {}
                Err(e @ Error::InvalidShift { .. }) => {
                    tracing::debug!(schedule_id = %id, error = %e, "Auto-collect not allowed");
                }
                Err(e) => {
                    tracing::warn!(schedule_id = %id, error = %e, "Auto-collect check failed");
                }
            }
        }
    }

    /// Publishes an advance. Returns true when it finished the route.
    async fn apply_advance(&mut self, advance: Advance) -> bool {
        match advance {
            Advance::Moved { completed, current } => {
                self.driver.current_segment_index = current;
                tracing::info!(completed, current, "Segment completed");
                self.publish(NavigationUpdate::SegmentAdvanced { completed, current });
                false
            }
            Advance::Finished { completed } => {
                tracing::info!(completed, "Final segment completed");
                self.publish(NavigationUpdate::SegmentAdvanced {
                    completed,
                    current: completed + 1,
                });
                self.publish(NavigationUpdate::RouteCompleted);
                self.clear_route("route completed");
                self.refresh_waypoints().await;
                true
            }
            Advance::Ignored => false,
        }
    }

    fn update_instruction(&mut self, position: &Coordinate) {
        let Some(route) = &self.route else {
            return;
        };
        let view = select_current_step(&route.steps, position);
        if view != self.instruction {
            if let Some(view) = &view {
                self.publish(NavigationUpdate::InstructionChanged(view.clone()));
            }
            self.instruction = view;
        }
    }

    pub async fn refresh_eta(&mut self) {
        if !self.driver.driving || self.tracker.phase() != TrackerPhase::Built {
            return;
        }
        let (Some(origin), Some(destination)) = (
            self.driver.position,
            self.tracker.segments().last().map(|s| s.destination),
        ) else {
            return;
        };

        let stops: Vec<RouteStop> = self
            .tracker
            .remaining_waypoint_ids()
            .into_iter()
            .filter_map(|id| self.collection.get(id))
            .map(|w| RouteStop {
                label: w.name.clone(),
                coordinate: w.coordinate,
            })
            .collect();

        let request = RouteRequest {
            origin,
            destination,
            stops,
            optimize: false,
        };

        let planned = match self.optimizer.plan(&request).await {
            Ok(planned) => planned,
            Err(e) => {
                tracing::warn!(error = %e, "ETA refresh failed");
                return;
            }
        };

        let current = self.tracker.current_index();
        let Some(route) = self.route.as_mut() else {
            return;
        };
        let remaining = route.leg_durations.len().saturating_sub(current);
        if planned.leg_durations.len() != remaining {
            tracing::warn!(
                expected = remaining,
                received = planned.leg_durations.len(),
                "ETA refresh returned a different number of legs"
            );
            return;
        }

        route.leg_durations.truncate(current);
        route.leg_durations.extend(planned.leg_durations);
        if !planned.steps.is_empty() {
            route.steps = planned.steps;
        }
        route.eta_updated_at = Utc::now();

        let eta_seconds = route.remaining_seconds(current);
        tracing::debug!(eta_seconds, updated_at = %route.eta_updated_at, "ETA refreshed");
        self.publish(NavigationUpdate::EtaUpdated { eta_seconds });
    }

    fn stop_position_updates(&mut self) {
        if let Some(task) = self.position_task.take() {
            task.abort();
        }
    }

    fn clear_route(&mut self, reason: &str) {
        self.stop_position_updates();
        self.tracker.reset();
        self.route = None;
        self.instruction = None;
        self.driver.reset();
        self.collection.clear_skips();

        tracing::info!(reason, "Route cleared");
        self.publish(NavigationUpdate::RouteCleared {
            reason: reason.to_string(),
        });
    }
}

fn spawn_poller<F>(commands: mpsc::WeakSender<SessionCommand>, period: Duration, make: F)
where
    F: Fn() -> SessionCommand + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(commands) = commands.upgrade() else {
                break;
            };
            match commands.try_send(make()) {
                Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
        }
    });
}
