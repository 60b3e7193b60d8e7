pub mod client;
pub mod doctor;
pub mod error;
pub mod nav;
pub mod plan;
pub mod runner;
pub mod tracker;
pub mod waypoint;

pub use client::{AutopilotClient, CommandKind, CommandOutcome};
pub use error::MissionError;
pub use nav::{abort_pair, AbortHandle, AbortToken, NavPolicy, WaypointResult};
pub use plan::MissionPlan;
pub use runner::{MissionReport, MissionRunner};
pub use tracker::{position_channel, PositionSender, PositionTracker, VehicleState};
pub use waypoint::{build_waypoint, Waypoint, WaypointKind, WaypointRecord};
