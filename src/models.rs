use serde::{Deserialize, Deserializer, Serialize};

/// Volume (percent) at or above which a bin is considered full. A fresh
/// reading below this mark after a visit means the bin was emptied.
pub const FULL_VOLUME_PERCENT: f64 = 80.0;
pub const HALF_VOLUME_PERCENT: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CollectionStatus {
    #[default]
    Pending,
    Collected,
}

impl CollectionStatus {
    pub fn toggled(self) -> Self {
        match self {
            CollectionStatus::Pending => CollectionStatus::Collected,
            CollectionStatus::Collected => CollectionStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FillLevel {
    Full,
    Half,
    Low,
}

impl FillLevel {
    pub fn from_volume(volume: f64) -> Self {
        if volume >= FULL_VOLUME_PERCENT {
            FillLevel::Full
        } else if volume >= HALF_VOLUME_PERCENT {
            FillLevel::Half
        } else {
            FillLevel::Low
        }
    }
}

/// A bin to be visited on the active route.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    /// Schedule entry id; this is what the collect endpoint addresses.
    pub id: String,
    pub name: String,
    pub coordinate: Coordinate,
    pub volume: f64,
    /// Bucketed volume for the bin marker; `None` without telemetry.
    pub fill_level: Option<FillLevel>,
    pub active: bool,
    pub collection: CollectionStatus,
    pub skipped: bool,
    pub has_live_volume_telemetry: bool,
}

impl Waypoint {
    /// Records a volume reading, keeping `fill_level` in step.
    pub fn set_volume(&mut self, volume: f64) {
        self.volume = volume.clamp(0.0, 100.0);
        self.fill_level = self
            .has_live_volume_telemetry
            .then(|| FillLevel::from_volume(self.volume));
    }

    pub fn is_collected(&self) -> bool {
        self.collection == CollectionStatus::Collected
    }
}

impl From<ScheduleEntry> for Waypoint {
    fn from(entry: ScheduleEntry) -> Self {
        let location = entry.location;
        let has_live_volume_telemetry = location.kind == LocationKind::IoT;
        let mut waypoint = Waypoint {
            id: entry.id,
            name: location.name,
            coordinate: Coordinate::new(location.latitude, location.longitude),
            volume: 0.0,
            fill_level: None,
            // only IoT locations report a sensor status
            active: !has_live_volume_telemetry || location.status != "Inactive",
            collection: entry.collection,
            skipped: false,
            has_live_volume_telemetry,
        };
        waypoint.set_volume(location.volume);
        waypoint
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LocationKind {
    IoT,
    #[default]
    #[serde(rename = "Non-IoT")]
    NonIoT,
}

/// Location document as served by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationRecord {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(deserialize_with = "number_or_string")]
    pub latitude: f64,
    #[serde(deserialize_with = "number_or_string")]
    pub longitude: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default = "default_location_status")]
    pub status: String,
    #[serde(rename = "type", default)]
    pub kind: LocationKind,
}

fn default_location_status() -> String {
    "Inactive".to_string()
}

/// Schedule entry with its location populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleEntry {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "locationId")]
    pub location: LocationRecord,
    #[serde(default)]
    pub collection: CollectionStatus,
    #[serde(default)]
    pub day: Option<String>,
    #[serde(default)]
    pub shift: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CollectRequest {
    pub collection: CollectionStatus,
}

/// The backend stores edited coordinates as strings, so accept both.
fn number_or_string<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::String(s) => s.trim().parse().map_err(D::Error::custom),
    }
}
