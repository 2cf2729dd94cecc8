use thiserror::Error;

use crate::shift::Shift;

#[derive(Debug, Error)]
pub enum Error {
    #[error("route could not be generated: {0}")]
    RoutingFailure(String),
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
    #[error("backend request failed: {0}")]
    Backend(String),
    #[error("backend update failed: {0}")]
    Persistence(String),
    #[error("{selected} shift is not active (current shift is {current})")]
    InvalidShift { selected: Shift, current: Shift },
    #[error("unexpected response from {0}")]
    UnexpectedResponseShape(String),
    #[error("no route has been generated")]
    NoRoute,
    #[error("unknown bin {0}")]
    UnknownWaypoint(String),
    #[error("navigation session is not running")]
    SessionClosed,
}
