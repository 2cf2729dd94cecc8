use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::error::Error;
use crate::feed::ScheduleFeed;
use crate::models::{CollectionStatus, Coordinate, Waypoint, FULL_VOLUME_PERCENT};
use crate::navigation::geo::distance_meters;
use crate::navigation::segments::WAYPOINT_ARRIVAL_METERS;
use crate::shift::ShiftSelector;

pub const DEFAULT_VOLUME_RECHECK: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum AutoCollect {
    /// Already collected, skipped, or the bin has no telemetry.
    NotEligible,
    OutOfRange,
    /// A volume read for this bin happened too recently.
    Throttled,
    StillFull { volume: f64 },
    Collected { volume: f64 },
}

/// Owns the waypoint set and keeps each bin's collection status in line with
/// the backend. Local state only changes after the backend accepted a write.
pub struct CollectionStateManager {
    feed: Arc<dyn ScheduleFeed>,
    waypoints: Vec<Waypoint>,
    last_volume_check: HashMap<String, Instant>,
    recheck_interval: Duration,
}

impl CollectionStateManager {
    pub fn new(feed: Arc<dyn ScheduleFeed>, recheck_interval: Duration) -> Self {
        Self {
            feed,
            waypoints: Vec::new(),
            last_volume_check: HashMap::new(),
            recheck_interval,
        }
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn get(&self, id: &str) -> Option<&Waypoint> {
        self.waypoints.iter().find(|w| w.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Waypoint> {
        self.waypoints.iter_mut().find(|w| w.id == id)
    }

    /// Replaces the whole set; used between routes.
    pub fn replace_all(&mut self, waypoints: Vec<Waypoint>) {
        self.last_volume_check.retain(|id, _| waypoints.iter().any(|w| &w.id == id));
        self.waypoints = waypoints;
    }

    /// Folds a refresh into the current set without touching order, skip
    /// flags, or membership. Used while a route is active.
    pub fn merge_refresh(&mut self, fresh: Vec<Waypoint>) {
        for update in fresh {
            if let Some(existing) = self.get_mut(&update.id) {
                existing.collection = update.collection;
                existing.set_volume(update.volume);
                existing.active = update.active;
            }
        }
    }

    /// Puts the waypoints listed in `ids` first, in that order.
    pub fn reorder(&mut self, ids: &[String]) {
        let mut ordered = Vec::with_capacity(self.waypoints.len());
        for id in ids {
            if let Some(pos) = self.waypoints.iter().position(|w| &w.id == id) {
                ordered.push(self.waypoints.remove(pos));
            }
        }
        ordered.append(&mut self.waypoints);
        self.waypoints = ordered;
    }

    /// Bins a new route should visit.
    pub fn routable(&self) -> Vec<Waypoint> {
        self.waypoints
            .iter()
            .filter(|w| !w.is_collected() && !w.skipped)
            .cloned()
            .collect()
    }

    pub fn mark_skipped(&mut self, id: &str) -> Result<(), Error> {
        let waypoint = self
            .get_mut(id)
            .ok_or_else(|| Error::UnknownWaypoint(id.to_string()))?;
        waypoint.skipped = true;
        Ok(())
    }

    pub fn clear_skips(&mut self) {
        for w in &mut self.waypoints {
            w.skipped = false;
        }
    }

    /// Flips Pending and Collected for one bin.
    pub async fn toggle_manual(&mut self, shifts: &ShiftSelector, id: &str) -> Result<CollectionStatus, Error> {
        shifts.guard()?;

        let target = self
            .get(id)
            .ok_or_else(|| Error::UnknownWaypoint(id.to_string()))?
            .collection
            .toggled();

        if let Err(e) = self.feed.set_collection(id, target).await {
            tracing::error!(schedule_id = id, error = %e, "Manual collection toggle failed");
            return Err(e);
        }

        if let Some(waypoint) = self.get_mut(id) {
            waypoint.collection = target;
        }
        tracing::info!(schedule_id = id, collection = ?target, "Collection toggled");
        Ok(target)
    }

    /// Marks a bin collected when the driver is next to it and a fresh volume
    /// read shows it was emptied. Proximity alone never collects.
    pub async fn check_proximity_auto_collect(
        &mut self,
        shifts: &ShiftSelector,
        id: &str,
        position: &Coordinate,
    ) -> Result<AutoCollect, Error> {
        let waypoint = self
            .get(id)
            .ok_or_else(|| Error::UnknownWaypoint(id.to_string()))?;

        if waypoint.is_collected() || waypoint.skipped || !waypoint.has_live_volume_telemetry {
            return Ok(AutoCollect::NotEligible);
        }
        if distance_meters(position, &waypoint.coordinate) >= WAYPOINT_ARRIVAL_METERS {
            return Ok(AutoCollect::OutOfRange);
        }
        if let Some(last) = self.last_volume_check.get(id) {
            if last.elapsed() < self.recheck_interval {
                return Ok(AutoCollect::Throttled);
            }
        }

        shifts.guard()?;

        let name = waypoint.name.clone();
        self.last_volume_check.insert(id.to_string(), Instant::now());

        let location = self.feed.location_by_name(&name).await?;
        let volume = location.volume;

        if volume >= FULL_VOLUME_PERCENT {
            tracing::debug!(schedule_id = id, volume, "Bin still full, not collecting");
            if let Some(waypoint) = self.get_mut(id) {
                waypoint.set_volume(volume);
            }
            return Ok(AutoCollect::StillFull { volume });
        }

        self.feed.set_collection(id, CollectionStatus::Collected).await?;

        if let Some(waypoint) = self.get_mut(id) {
            waypoint.set_volume(volume);
            waypoint.collection = CollectionStatus::Collected;
        }
        tracing::info!(schedule_id = id, bin = %name, volume, "Bin collected automatically");
        Ok(AutoCollect::Collected { volume })
    }
}
