use async_trait::async_trait;

use super::optimization_helper::solve_fixed_endpoint_path;
use super::{NavigationStep, OptimizedRoute, RouteOptimizer, RouteRequest};
use crate::error::Error;
use crate::navigation::geo::{distance_meters, format_distance};

/// Offline planner used when no directions provider is configured. Orders
/// stops by straight-line distance and emits one step per leg.
#[derive(Debug, Clone)]
pub struct LocalOptimizer {
    speed_meters_per_sec: f64,
}

impl LocalOptimizer {
    pub fn new(speed_kmh: f64) -> Self {
        Self {
            speed_meters_per_sec: (speed_kmh.max(1.0)) / 3.6,
        }
    }
}

#[async_trait]
impl RouteOptimizer for LocalOptimizer {
    async fn plan(&self, request: &RouteRequest) -> Result<OptimizedRoute, Error> {
        let n = request.stops.len();
        let point = |node: usize| {
            if node == 0 {
                request.origin
            } else if node == n + 1 {
                request.destination
            } else {
                request.stops[node - 1].coordinate
            }
        };

        let waypoint_order = if request.optimize {
            solve_fixed_endpoint_path(n, |a, b| distance_meters(&point(a), &point(b)))
        } else {
            (0..n).collect()
        };

        let mut legs = Vec::with_capacity(n + 1);
        let mut from = request.origin;
        for &i in &waypoint_order {
            let stop = &request.stops[i];
            legs.push((from, stop.coordinate, format!("Drive to {}", stop.label)));
            from = stop.coordinate;
        }
        legs.push((from, request.destination, "Drive to destination".to_string()));

        let mut steps = Vec::with_capacity(legs.len());
        let mut leg_durations = Vec::with_capacity(legs.len());
        for (start, end, instruction) in legs {
            let meters = distance_meters(&start, &end);
            leg_durations.push((meters / self.speed_meters_per_sec).round() as u64);
            steps.push(NavigationStep {
                instruction,
                start_location: start,
                distance_meters: meters,
                distance_text: Some(format_distance(meters)),
            });
        }

        Ok(OptimizedRoute {
            waypoint_order,
            steps,
            leg_durations,
        })
    }
}
