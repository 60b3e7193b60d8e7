use lark_geo::GeoError;

#[derive(Debug, thiserror::Error)]
pub enum MissionError {
    #[error("autopilot rejected {command} after {attempts} attempt(s)")]
    CommandRejected { command: String, attempts: u32 },

    #[error("no position telemetry received yet")]
    TelemetryUnavailable,

    #[error(transparent)]
    Projection(#[from] GeoError),

    #[error("invalid waypoint data: {0}")]
    InvalidWaypointData(String),

    #[error("mission file has no leg named {0:?}")]
    UnknownLeg(String),

    #[error("mission aborted")]
    Aborted,
}
