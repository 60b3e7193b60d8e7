//! Mission sequencing: arm, launch, waypoints, land.
//!
//! Orchestration only; the actual navigation decisions live in [`crate::nav`].

use std::time::Duration;

use tracing::{info, warn};

use crate::client::{AutopilotClient, CommandKind};
use crate::error::MissionError;
use crate::nav::{navigate_to, sleep_unless_aborted, AbortToken, NavPolicy, WaypointResult};
use crate::tracker::PositionTracker;
use crate::waypoint::{build_waypoint, WaypointRecord};

const FIRST_FIX_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-waypoint outcome, in mission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointStatus {
    Reached,
    SkippedDispatch,
    TimedOut,
    /// The record itself was malformed; never dispatched.
    Invalid,
}

#[derive(Debug, Default)]
pub struct MissionReport {
    pub waypoints: Vec<WaypointStatus>,
    pub landed: bool,
}

impl MissionReport {
    pub fn reached(&self) -> usize {
        self.waypoints
            .iter()
            .filter(|s| **s == WaypointStatus::Reached)
            .count()
    }
}

pub struct MissionRunner<C> {
    client: C,
    tracker: PositionTracker,
    policy: NavPolicy,
}

impl<C: AutopilotClient> MissionRunner<C> {
    pub fn new(client: C, tracker: PositionTracker, policy: NavPolicy) -> Self {
        Self {
            client,
            tracker,
            policy,
        }
    }

    /// Fly the mission: arm, launch, traverse every waypoint, land.
    ///
    /// Land is unconditional cleanup: it is attempted whether the waypoint
    /// sequence finished, failed, or was aborted mid-wait.
    pub async fn fly(
        &mut self,
        records: &[WaypointRecord],
        abort: &mut AbortToken,
    ) -> Result<MissionReport, MissionError> {
        // A rejected clear is logged, not fatal; a stale onboard mission is
        // survivable, an unarmed vehicle is not.
        self.command_logged(CommandKind::ClearWaypoints);

        self.command_required(CommandKind::Arm)?;
        info!("mission: armed");

        let mut flight = self.flight(records, abort).await;

        match self.client.send_command(CommandKind::Land) {
            Ok(out) if out.accepted() => {
                info!("mission: landing");
                if let Ok(report) = &mut flight {
                    report.landed = true;
                }
            }
            Ok(_) => warn!("mission: land command rejected"),
            Err(e) => warn!("mission: land command failed: {:#}", e),
        }

        flight
    }

    async fn flight(
        &mut self,
        records: &[WaypointRecord],
        abort: &mut AbortToken,
    ) -> Result<MissionReport, MissionError> {
        self.command_required(CommandKind::Launch)?;
        info!("mission: launched, settling for {} s", self.policy.settle_s);
        sleep_unless_aborted(abort, self.policy.settle()).await?;

        self.command_logged(CommandKind::TriggerAuto);
        self.tracker.wait_for_first_fix(FIRST_FIX_TIMEOUT).await;

        let mut report = MissionReport::default();
        for (idx, rec) in records.iter().enumerate() {
            let wp = match build_waypoint(rec) {
                Ok(wp) => wp,
                Err(e) => {
                    warn!("waypoint {}: {}", idx, e);
                    report.waypoints.push(WaypointStatus::Invalid);
                    continue;
                }
            };

            info!("waypoint {}/{}: navigating", idx + 1, records.len());
            let status = match navigate_to(
                &mut self.client,
                &self.tracker,
                &wp,
                &self.policy,
                abort,
            )
            .await?
            {
                WaypointResult::Reached => WaypointStatus::Reached,
                WaypointResult::SkippedDispatch => WaypointStatus::SkippedDispatch,
                WaypointResult::TimedOut => WaypointStatus::TimedOut,
            };
            report.waypoints.push(status);
        }

        info!(
            "mission: {}/{} waypoints reached",
            report.reached(),
            records.len()
        );
        Ok(report)
    }

    /// Commands with no retry in the base design; a rejection ends the
    /// mission before takeoff rather than flying a half-configured vehicle.
    fn command_required(&mut self, kind: CommandKind) -> Result<(), MissionError> {
        match self.client.send_command(kind) {
            Ok(out) if out.accepted() => Ok(()),
            Ok(_) => Err(MissionError::CommandRejected {
                command: kind.name().into(),
                attempts: 1,
            }),
            Err(e) => {
                warn!("{}: transport error: {:#}", kind.name(), e);
                Err(MissionError::CommandRejected {
                    command: kind.name().into(),
                    attempts: 1,
                })
            }
        }
    }

    fn command_logged(&mut self, kind: CommandKind) {
        match self.client.send_command(kind) {
            Ok(out) if out.accepted() => {}
            Ok(_) => warn!("{}: rejected, continuing", kind.name()),
            Err(e) => warn!("{}: failed: {:#}, continuing", kind.name(), e),
        }
    }
}
