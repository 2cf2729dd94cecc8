pub mod geo;
pub mod instructions;
pub mod position;
pub mod routes;
pub mod segments;
pub mod session;
pub mod state;

pub use position::{GeoPosition, GeoPositionSource, PushedPositionSource};
pub use session::{NavigationSession, SessionSettings};
pub use state::{NavigationUpdate, SessionHandle, SessionSnapshot};
