use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::error::Error;
use crate::models::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    #[serde(flatten)]
    pub coordinate: Coordinate,
    /// Degrees clockwise from north.
    #[serde(default)]
    pub heading: Option<f64>,
}

impl GeoPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            coordinate: Coordinate::new(latitude, longitude),
            heading: None,
        }
    }
}

/// Live location updates. Dropping the subscription ends it.
pub struct PositionSubscription {
    receiver: broadcast::Receiver<GeoPosition>,
}

impl PositionSubscription {
    pub fn new(receiver: broadcast::Receiver<GeoPosition>) -> Self {
        Self { receiver }
    }

    /// Next position; positions missed while lagging are dropped, only the
    /// newest ones matter. `None` once the source is gone.
    pub async fn next(&mut self) -> Option<GeoPosition> {
        loop {
            match self.receiver.recv().await {
                Ok(position) => return Some(position),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "Position subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
pub trait GeoPositionSource: Send + Sync {
    async fn subscribe(&self) -> Result<PositionSubscription, Error>;

    /// Most recent fix, if the source keeps one.
    async fn last_known(&self) -> Option<GeoPosition> {
        None
    }
}

/// Position source fed by the app: the UI forwards device fixes and the
/// result of the location permission prompt.
#[derive(Debug)]
pub struct PushedPositionSource {
    sender: broadcast::Sender<GeoPosition>,
    permission_granted: RwLock<bool>,
    last: RwLock<Option<GeoPosition>>,
}

impl PushedPositionSource {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(32);
        Self {
            sender,
            permission_granted: RwLock::new(false),
            last: RwLock::new(None),
        }
    }

    pub async fn set_permission(&self, granted: bool) {
        *self.permission_granted.write().await = granted;
        if !granted {
            tracing::warn!("Location permission revoked");
        }
    }

    pub async fn push(&self, position: GeoPosition) -> Result<(), Error> {
        if !*self.permission_granted.read().await {
            return Err(Error::PositionUnavailable(
                "location permission has not been granted".to_string(),
            ));
        }
        *self.last.write().await = Some(position);
        // no subscribers simply means nobody is navigating
        let _ = self.sender.send(position);
        Ok(())
    }

}

impl Default for PushedPositionSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GeoPositionSource for PushedPositionSource {
    async fn subscribe(&self) -> Result<PositionSubscription, Error> {
        if !*self.permission_granted.read().await {
            return Err(Error::PositionUnavailable(
                "location permission has not been granted".to_string(),
            ));
        }
        Ok(PositionSubscription::new(self.sender.subscribe()))
    }

    async fn last_known(&self) -> Option<GeoPosition> {
        *self.last.read().await
    }
}
