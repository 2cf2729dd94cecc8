pub mod directions;
pub mod local;
mod optimization_helper;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::Coordinate;

pub use directions::DirectionsClient;
pub use local::LocalOptimizer;

/// One turn-by-turn maneuver as delivered by the routing provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationStep {
    pub instruction: String,
    pub start_location: Coordinate,
    pub distance_meters: f64,
    pub distance_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RouteStop {
    pub label: String,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub stops: Vec<RouteStop>,
    /// When false the provider must keep `stops` in the given order.
    pub optimize: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OptimizedRoute {
    /// Visiting order as indices into the request's stops.
    pub waypoint_order: Vec<usize>,
    pub steps: Vec<NavigationStep>,
    /// Seconds per leg, `stops.len() + 1` entries.
    pub leg_durations: Vec<u64>,
}

impl OptimizedRoute {
    /// Applies `waypoint_order` to `items`, rejecting anything that is not a
    /// permutation of their indices.
    pub fn reorder<T: Clone>(&self, items: &[T]) -> Result<Vec<T>, Error> {
        if self.waypoint_order.len() != items.len() {
            return Err(Error::RoutingFailure(format!(
                "provider ordered {} of {} stops",
                self.waypoint_order.len(),
                items.len()
            )));
        }

        let mut seen = vec![false; items.len()];
        let mut ordered = Vec::with_capacity(items.len());
        for &i in &self.waypoint_order {
            match seen.get_mut(i) {
                Some(flag) if !*flag => {
                    *flag = true;
                    ordered.push(items[i].clone());
                }
                _ => {
                    return Err(Error::RoutingFailure(format!(
                        "invalid waypoint order {:?}",
                        self.waypoint_order
                    )))
                }
            }
        }
        Ok(ordered)
    }
}

#[async_trait]
pub trait RouteOptimizer: Send + Sync {
    async fn plan(&self, request: &RouteRequest) -> Result<OptimizedRoute, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reorder_applies_permutation() {
        let route = OptimizedRoute {
            waypoint_order: vec![2, 0, 1],
            ..Default::default()
        };
        assert_eq!(route.reorder(&["a", "b", "c"]).unwrap(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_reorder_rejects_bad_orders() {
        let duplicate = OptimizedRoute {
            waypoint_order: vec![0, 0],
            ..Default::default()
        };
        assert!(duplicate.reorder(&["a", "b"]).is_err());

        let out_of_range = OptimizedRoute {
            waypoint_order: vec![0, 5],
            ..Default::default()
        };
        assert!(out_of_range.reorder(&["a", "b"]).is_err());

        let short = OptimizedRoute {
            waypoint_order: vec![0],
            ..Default::default()
        };
        assert!(short.reorder(&["a", "b"]).is_err());
    }
}
