mod http;

use async_trait::async_trait;

use crate::error::Error;
use crate::models::{CollectionStatus, LocationRecord, ScheduleEntry};
use crate::shift::Shift;

pub use http::HttpScheduleFeed;

/// Backend view of the collection schedule.
#[async_trait]
pub trait ScheduleFeed: Send + Sync {
    /// Today's entries for `shift`; `Shift::Backlog` reads the backlog.
    /// "Nothing scheduled" is an empty list, not an error.
    async fn fetch_shift(&self, shift: Shift) -> Result<Vec<ScheduleEntry>, Error>;

    async fn set_collection(&self, schedule_id: &str, status: CollectionStatus) -> Result<(), Error>;

    /// Live record for a location, used to re-read its fill volume.
    async fn location_by_name(&self, name: &str) -> Result<LocationRecord, Error>;
}
