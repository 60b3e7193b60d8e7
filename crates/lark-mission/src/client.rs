//! The command boundary to the autopilot.
//!
//! One closed set of command variants: the compiler, not the middleware,
//! decides what can be sent.

use anyhow::Result;

use crate::waypoint::Waypoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Arm,
    Launch,
    Land,
    ClearWaypoints,
    TriggerAuto,
}

impl CommandKind {
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Arm => "arm",
            CommandKind::Launch => "launch",
            CommandKind::Land => "land",
            CommandKind::ClearWaypoints => "clear_waypoints",
            CommandKind::TriggerAuto => "trigger_auto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Ack,
    Nack,
}

impl CommandOutcome {
    pub fn accepted(self) -> bool {
        matches!(self, CommandOutcome::Ack)
    }
}

/// Everything the mission logic is allowed to ask of the autopilot.
///
/// Calls are synchronous: they return once the autopilot has answered (or
/// the link-level ack wait ran out). An `Err` means the transport failed;
/// an explicit rejection comes back as `Ok(Nack)` / `Ok(false)`.
pub trait AutopilotClient: Send {
    fn send_command(&mut self, kind: CommandKind) -> Result<CommandOutcome>;

    /// Returns whether the autopilot accepted the waypoint.
    fn send_waypoint(&mut self, wp: &Waypoint) -> Result<bool>;
}
