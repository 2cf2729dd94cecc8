use serde::Serialize;

use super::geo::distance_meters;
use crate::models::{Coordinate, Waypoint};

/// Arrival radius around a bin.
pub const WAYPOINT_ARRIVAL_METERS: f64 = 70.0;
/// Arrival radius around the final destination; wider to absorb GPS noise.
pub const DESTINATION_ARRIVAL_METERS: f64 = 150.0;

const SEGMENT_COLORS: [&str; 6] = ["#4B7BE5", "#E67E22", "#27AE60", "#8E44AD", "#E74C3C", "#16A085"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum SegmentTarget {
    Waypoint(String),
    Destination,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSegment {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub target: SegmentTarget,
    pub completed: bool,
    pub color: &'static str,
}

impl RouteSegment {
    pub fn arrival_threshold(&self) -> f64 {
        match self.target {
            SegmentTarget::Waypoint(_) => WAYPOINT_ARRIVAL_METERS,
            SegmentTarget::Destination => DESTINATION_ARRIVAL_METERS,
        }
    }
}

/// Builds `origin -> wp0 -> ... -> wpN -> destination`. Empty when there is
/// nothing to visit or either endpoint is unknown.
pub fn build_segments(
    origin: Option<Coordinate>,
    ordered_waypoints: &[Waypoint],
    destination: Option<Coordinate>,
) -> Vec<RouteSegment> {
    let (Some(origin), Some(destination)) = (origin, destination) else {
        return Vec::new();
    };
    if ordered_waypoints.is_empty() {
        return Vec::new();
    }

    let mut segments = Vec::with_capacity(ordered_waypoints.len() + 1);
    let mut from = origin;

    for (i, waypoint) in ordered_waypoints.iter().enumerate() {
        segments.push(RouteSegment {
            origin: from,
            destination: waypoint.coordinate,
            target: SegmentTarget::Waypoint(waypoint.id.clone()),
            completed: false,
            color: SEGMENT_COLORS[i % SEGMENT_COLORS.len()],
        });
        from = waypoint.coordinate;
    }

    segments.push(RouteSegment {
        origin: from,
        destination,
        target: SegmentTarget::Destination,
        completed: false,
        color: SEGMENT_COLORS[ordered_waypoints.len() % SEGMENT_COLORS.len()],
    });

    segments
}

pub fn check_arrival(position: &Coordinate, segment: &RouteSegment, threshold_meters: f64) -> bool {
    distance_meters(position, &segment.destination) < threshold_meters
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackerPhase {
    Idle,
    Built,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// Segment `completed` is done, `current` is now active.
    Moved { completed: usize, current: usize },
    /// The last segment is done.
    Finished { completed: usize },
    /// Stale or redundant request.
    Ignored,
}

#[derive(Debug, Default)]
pub struct RouteSegmentTracker {
    segments: Vec<RouteSegment>,
    current: usize,
}

impl RouteSegmentTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any previous route. Returns false (and stays idle) when no
    /// segments could be built.
    pub fn build(
        &mut self,
        origin: Option<Coordinate>,
        ordered_waypoints: &[Waypoint],
        destination: Option<Coordinate>,
    ) -> bool {
        self.segments = build_segments(origin, ordered_waypoints, destination);
        self.current = 0;
        !self.segments.is_empty()
    }

    pub fn reset(&mut self) {
        self.segments.clear();
        self.current = 0;
    }

    pub fn phase(&self) -> TrackerPhase {
        if self.segments.is_empty() {
            TrackerPhase::Idle
        } else if self.current >= self.segments.len() {
            TrackerPhase::Completed
        } else {
            TrackerPhase::Built
        }
    }

    pub fn segments(&self) -> &[RouteSegment] {
        &self.segments
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_segment(&self) -> Option<&RouteSegment> {
        self.segments.get(self.current)
    }

    /// Waypoint ids of segments not yet completed, in route order.
    pub fn remaining_waypoint_ids(&self) -> Vec<&str> {
        self.segments
            .iter()
            .skip(self.current)
            .filter_map(|s| match &s.target {
                SegmentTarget::Waypoint(id) => Some(id.as_str()),
                SegmentTarget::Destination => None,
            })
            .collect()
    }

    pub fn has_arrived(&self, position: &Coordinate) -> bool {
        self.current_segment()
            .map(|s| check_arrival(position, s, s.arrival_threshold()))
            .unwrap_or(false)
    }

    pub fn advance_segment(&mut self) -> Advance {
        let index = self.current;
        let Some(segment) = self.segments.get_mut(index) else {
            return Advance::Ignored;
        };
        segment.completed = true;
        self.current += 1;

        if self.current >= self.segments.len() {
            Advance::Finished { completed: index }
        } else {
            Advance::Moved {
                completed: index,
                current: self.current,
            }
        }
    }

    /// Advance on behalf of an observer that saw arrival on `index`. Only the
    /// first observer of a segment moves the pointer.
    pub fn advance_from(&mut self, index: usize) -> Advance {
        if index != self.current {
            return Advance::Ignored;
        }
        self.advance_segment()
    }

    /// Completes the current segment without proximity. Returns the bin that
    /// was passed over, if the segment targeted one.
    pub fn skip_segment(&mut self) -> (Advance, Option<String>) {
        let skipped = match self.current_segment().map(|s| &s.target) {
            Some(SegmentTarget::Waypoint(id)) => Some(id.clone()),
            _ => None,
        };
        (self.advance_segment(), skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CollectionStatus;

    fn waypoint(id: &str, lat: f64, lon: f64) -> Waypoint {
        Waypoint {
            id: id.to_string(),
            name: format!("Bin {id}"),
            coordinate: Coordinate::new(lat, lon),
            volume: 0.0,
            fill_level: None,
            active: true,
            collection: CollectionStatus::Pending,
            skipped: false,
            has_live_volume_telemetry: false,
        }
    }

    fn route(n: usize) -> Vec<Waypoint> {
        (0..n)
            .map(|i| waypoint(&i.to_string(), 8.20 + i as f64 * 0.01, 124.24))
            .collect()
    }

    const ORIGIN: Coordinate = Coordinate {
        latitude: 8.19,
        longitude: 124.23,
    };
    const DEPOT: Coordinate = Coordinate {
        latitude: 8.30,
        longitude: 124.30,
    };

    #[test]
    fn test_segment_count() {
        for n in 0..6 {
            let segments = build_segments(Some(ORIGIN), &route(n), Some(DEPOT));
            let expected = if n == 0 { 0 } else { n + 1 };
            assert_eq!(segments.len(), expected, "n = {n}");
        }
    }

    #[test]
    fn test_missing_endpoints_build_nothing() {
        assert!(build_segments(None, &route(2), Some(DEPOT)).is_empty());
        assert!(build_segments(Some(ORIGIN), &route(2), None).is_empty());
    }

    #[test]
    fn test_segments_chain() {
        let waypoints = route(2);
        let segments = build_segments(Some(ORIGIN), &waypoints, Some(DEPOT));

        assert_eq!(segments[0].origin, ORIGIN);
        assert_eq!(segments[0].destination, waypoints[0].coordinate);
        assert_eq!(segments[1].origin, waypoints[0].coordinate);
        assert_eq!(segments[1].destination, waypoints[1].coordinate);
        assert_eq!(segments[2].origin, waypoints[1].coordinate);
        assert_eq!(segments[2].destination, DEPOT);
        assert_eq!(segments[2].target, SegmentTarget::Destination);
        assert!(segments.iter().all(|s| !s.completed));
    }

    #[test]
    fn test_check_arrival_is_strict() {
        let segments = build_segments(Some(ORIGIN), &route(1), Some(DEPOT));
        let target = segments[0].destination;
        let exact = distance_meters(&ORIGIN, &target);

        assert!(!check_arrival(&ORIGIN, &segments[0], exact));
        assert!(check_arrival(&ORIGIN, &segments[0], exact + 0.001));
        assert!(check_arrival(&target, &segments[0], WAYPOINT_ARRIVAL_METERS));
    }

    #[test]
    fn test_thresholds_depend_on_target() {
        let segments = build_segments(Some(ORIGIN), &route(1), Some(DEPOT));
        assert_eq!(segments[0].arrival_threshold(), WAYPOINT_ARRIVAL_METERS);
        assert_eq!(segments[1].arrival_threshold(), DESTINATION_ARRIVAL_METERS);
    }

    #[test]
    fn test_index_is_monotonic_until_terminal() {
        let n = 3;
        let mut tracker = RouteSegmentTracker::new();
        assert_eq!(tracker.phase(), TrackerPhase::Idle);
        assert!(tracker.build(Some(ORIGIN), &route(n), Some(DEPOT)));
        assert_eq!(tracker.phase(), TrackerPhase::Built);

        let mut last = tracker.current_index();
        for step in 0..=n {
            let outcome = if step % 2 == 0 {
                tracker.advance_segment()
            } else {
                tracker.skip_segment().0
            };
            assert!(tracker.current_index() > last);
            last = tracker.current_index();
            if step == n {
                assert_eq!(outcome, Advance::Finished { completed: n });
            }
        }

        assert_eq!(tracker.current_index(), n + 1);
        assert_eq!(tracker.phase(), TrackerPhase::Completed);
        assert!(tracker.segments().iter().all(|s| s.completed));
        assert_eq!(tracker.advance_segment(), Advance::Ignored);
        assert_eq!(tracker.current_index(), n + 1);
    }

    #[test]
    fn test_redundant_arrival_is_ignored() {
        let mut tracker = RouteSegmentTracker::new();
        tracker.build(Some(ORIGIN), &route(2), Some(DEPOT));

        assert_eq!(
            tracker.advance_from(0),
            Advance::Moved {
                completed: 0,
                current: 1
            }
        );
        assert_eq!(tracker.advance_from(0), Advance::Ignored);
        assert_eq!(tracker.current_index(), 1);
    }

    #[test]
    fn test_skip_reports_target() {
        let mut tracker = RouteSegmentTracker::new();
        tracker.build(Some(ORIGIN), &route(1), Some(DEPOT));

        let (_, skipped) = tracker.skip_segment();
        assert_eq!(skipped.as_deref(), Some("0"));
        assert!(tracker.segments()[0].completed);

        let (outcome, skipped) = tracker.skip_segment();
        assert_eq!(skipped, None);
        assert_eq!(outcome, Advance::Finished { completed: 1 });
    }

    #[test]
    fn test_remaining_waypoints() {
        let mut tracker = RouteSegmentTracker::new();
        tracker.build(Some(ORIGIN), &route(3), Some(DEPOT));
        tracker.advance_segment();
        assert_eq!(tracker.remaining_waypoint_ids(), vec!["1", "2"]);
    }
}
