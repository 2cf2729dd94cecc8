use async_trait::async_trait;
use serde::Deserialize;

use super::{NavigationStep, OptimizedRoute, RouteOptimizer, RouteRequest};
use crate::error::Error;
use crate::models::Coordinate;

/// Client for a Google-Directions-compatible routing provider.
#[derive(Debug, Clone)]
pub struct DirectionsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    #[serde(default)]
    waypoint_order: Vec<usize>,
    #[serde(default)]
    legs: Vec<DirectionsLeg>,
}

#[derive(Debug, Deserialize)]
struct DirectionsLeg {
    duration: TextValue,
    #[serde(default)]
    steps: Vec<DirectionsStep>,
}

#[derive(Debug, Deserialize)]
struct DirectionsStep {
    html_instructions: String,
    distance: TextValue,
    start_location: LatLng,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: f64,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

fn format_point(c: &Coordinate) -> String {
    format!("{},{}", c.latitude, c.longitude)
}

impl DirectionsClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn waypoints_param(request: &RouteRequest) -> Option<String> {
        if request.stops.is_empty() {
            return None;
        }
        let mut parts = Vec::with_capacity(request.stops.len() + 1);
        if request.optimize {
            parts.push("optimize:true".to_string());
        }
        parts.extend(request.stops.iter().map(|s| format_point(&s.coordinate)));
        Some(parts.join("|"))
    }

    fn into_route(response: DirectionsResponse, request: &RouteRequest) -> Result<OptimizedRoute, Error> {
        if response.status != "OK" {
            let detail = response
                .error_message
                .map(|m| format!("{}: {}", response.status, m))
                .unwrap_or(response.status);
            return Err(Error::RoutingFailure(detail));
        }

        let route = response
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| Error::RoutingFailure("provider returned no routes".to_string()))?;

        let waypoint_order = if route.waypoint_order.is_empty() && !request.optimize {
            (0..request.stops.len()).collect()
        } else {
            route.waypoint_order
        };

        let mut steps = Vec::new();
        let mut leg_durations = Vec::with_capacity(route.legs.len());
        for leg in route.legs {
            leg_durations.push(leg.duration.value.max(0.0).round() as u64);
            steps.extend(leg.steps.into_iter().map(|s| NavigationStep {
                instruction: s.html_instructions,
                start_location: Coordinate::new(s.start_location.lat, s.start_location.lng),
                distance_meters: s.distance.value,
                distance_text: s.distance.text,
            }));
        }

        Ok(OptimizedRoute {
            waypoint_order,
            steps,
            leg_durations,
        })
    }
}

#[async_trait]
impl RouteOptimizer for DirectionsClient {
    async fn plan(&self, request: &RouteRequest) -> Result<OptimizedRoute, Error> {
        let url = format!("{}/maps/api/directions/json", self.base_url);

        let mut query = vec![
            ("origin", format_point(&request.origin)),
            ("destination", format_point(&request.destination)),
            ("key", self.api_key.clone()),
        ];
        if let Some(waypoints) = Self::waypoints_param(request) {
            query.push(("waypoints", waypoints));
        }

        tracing::debug!(stops = request.stops.len(), optimize = request.optimize, "Requesting directions");

        let response = self
            .http
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::RoutingFailure(format!("directions request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::RoutingFailure(format!(
                "directions provider answered {}",
                response.status()
            )));
        }

        let body: DirectionsResponse = response
            .json()
            .await
            .map_err(|e| Error::RoutingFailure(format!("unreadable directions response: {e}")))?;

        Self::into_route(body, request)
    }
}
