//! Waypoint navigation: dispatch-with-retry, then reach detection.
//!
//! The two phases encode two different failure modes. A rejected or lost
//! waypoint command is retryable on a 100 ms timescale; a vehicle that is
//! not converging on an accepted target is not something this layer can
//! fix, so travel gets one bounded wait and no retry.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use lark_geo::{planar_distance, project};

use crate::client::AutopilotClient;
use crate::error::MissionError;
use crate::tracker::PositionTracker;
use crate::waypoint::Waypoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchFailurePolicy {
    /// Log and move on to the next waypoint (keeps the mission moving
    /// through transient command-link failures).
    SkipWaypoint,
    /// Escalate: stop the waypoint sequence, land.
    AbortMission,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NavPolicy {
    pub dispatch_attempts: u32,
    pub dispatch_backoff_ms: u64,
    pub poll_period_s: u64,
    pub travel_timeout_s: u64,
    pub reach_radius_m: f64,
    pub settle_s: u64,
    pub on_dispatch_failure: DispatchFailurePolicy,
}

impl Default for NavPolicy {
    fn default() -> Self {
        Self {
            dispatch_attempts: 5,
            dispatch_backoff_ms: 100,
            poll_period_s: 5,
            travel_timeout_s: 50,
            reach_radius_m: 3.0,
            settle_s: 5,
            on_dispatch_failure: DispatchFailurePolicy::SkipWaypoint,
        }
    }
}

impl NavPolicy {
    pub fn dispatch_backoff(&self) -> Duration {
        Duration::from_millis(self.dispatch_backoff_ms)
    }
    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(self.poll_period_s)
    }
    pub fn settle(&self) -> Duration {
        Duration::from_secs(self.settle_s)
    }
}

/// Operator-side abort switch. Flips once, never resets.
pub fn abort_pair() -> (AbortHandle, AbortToken) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx }, AbortToken { rx })
}

#[derive(Debug, Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct AbortToken {
    rx: watch::Receiver<bool>,
}

impl AbortToken {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Sleep that an abort can interrupt. Every wait in the mission path
/// (backoff, poll, settle) goes through here so an operator abort never
/// has to wait out a 5 s poll.
pub async fn sleep_unless_aborted(
    token: &mut AbortToken,
    dur: Duration,
) -> Result<(), MissionError> {
    if token.is_aborted() {
        return Err(MissionError::Aborted);
    }
    let sleep = tokio::time::sleep(dur);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return Ok(()),
            changed = token.rx.changed() => match changed {
                Ok(()) if token.is_aborted() => return Err(MissionError::Aborted),
                Ok(()) => continue,
                Err(_) => {
                    // Abort handle dropped; nothing can interrupt us now.
                    sleep.as_mut().await;
                    return Ok(());
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Acknowledged { attempts: u32 },
    Failed { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReachOutcome {
    Reached,
    TimedOut,
}

/// What happened to one waypoint, end to end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaypointResult {
    Reached,
    /// Dispatch never got an ack; waypoint skipped.
    SkippedDispatch,
    /// Dispatch was acknowledged but the vehicle never got within the
    /// reach radius.
    TimedOut,
}

/// Send one waypoint command with bounded retry.
pub async fn dispatch_waypoint(
    client: &mut dyn AutopilotClient,
    wp: &Waypoint,
    policy: &NavPolicy,
    abort: &mut AbortToken,
) -> Result<DispatchOutcome, MissionError> {
    let target = wp.target();
    let mut attempts = 0;
    while attempts < policy.dispatch_attempts {
        attempts += 1;
        match client.send_waypoint(wp) {
            Ok(true) => {
                info!(
                    "waypoint {:.7}, {:.7}: sent on attempt {}",
                    target.lat, target.lon, attempts
                );
                return Ok(DispatchOutcome::Acknowledged { attempts });
            }
            Ok(false) => warn!(
                "waypoint {:.7}, {:.7}: rejected (attempt {}/{})",
                target.lat, target.lon, attempts, policy.dispatch_attempts
            ),
            Err(e) => warn!(
                "waypoint {:.7}, {:.7}: send failed (attempt {}/{}): {:#}",
                target.lat, target.lon, attempts, policy.dispatch_attempts, e
            ),
        }
        if attempts < policy.dispatch_attempts {
            sleep_unless_aborted(abort, policy.dispatch_backoff()).await?;
        }
    }
    warn!(
        "waypoint {:.7}, {:.7}: giving up after {} attempts",
        target.lat, target.lon, attempts
    );
    Ok(DispatchOutcome::Failed { attempts })
}

/// Poll the position tracker until the vehicle is within the reach radius
/// of the waypoint, or the travel timeout runs out.
///
/// A missing snapshot and an incompatible projection zone both count as
/// "not reached yet": neither is fatal, both are the autopilot's problem
/// to converge out of.
pub async fn await_reach(
    tracker: &PositionTracker,
    wp: &Waypoint,
    policy: &NavPolicy,
    abort: &mut AbortToken,
) -> Result<ReachOutcome, MissionError> {
    let target = project(wp.target())?;

    let mut waited_s = 0;
    while waited_s < policy.travel_timeout_s {
        let reached = match distance_to(tracker, &target) {
            Ok(dist) => {
                debug!("reach check: {:.1} m from target", dist);
                dist < policy.reach_radius_m
            }
            Err(e @ MissionError::TelemetryUnavailable) => {
                debug!("reach check: {}", e);
                false
            }
            Err(e) => {
                warn!("reach check: {}", e);
                false
            }
        };

        if reached {
            info!("waypoint reached, settling for {} s", policy.settle_s);
            sleep_unless_aborted(abort, policy.settle()).await?;
            return Ok(ReachOutcome::Reached);
        }

        sleep_unless_aborted(abort, policy.poll_period()).await?;
        waited_s += policy.poll_period_s;
        debug!("traveling to waypoint for {} s", waited_s);
    }

    warn!(
        "failed to reach waypoint within {} s",
        policy.travel_timeout_s
    );
    Ok(ReachOutcome::TimedOut)
}

/// Planar distance from the latest snapshot to the target, or why it
/// cannot be computed right now. Both error causes are recoverable for the
/// caller: keep polling.
fn distance_to(
    tracker: &PositionTracker,
    target: &lark_geo::ProjectedPoint,
) -> Result<f64, MissionError> {
    let state = tracker
        .current()
        .ok_or(MissionError::TelemetryUnavailable)?;
    let cur = project(state.position())?;
    Ok(planar_distance(&cur, target)?)
}

/// Drive one waypoint: dispatch with retry, then (if acknowledged) wait
/// for the vehicle to arrive.
pub async fn navigate_to(
    client: &mut dyn AutopilotClient,
    tracker: &PositionTracker,
    wp: &Waypoint,
    policy: &NavPolicy,
    abort: &mut AbortToken,
) -> Result<WaypointResult, MissionError> {
    match dispatch_waypoint(client, wp, policy, abort).await? {
        DispatchOutcome::Failed { attempts } => match policy.on_dispatch_failure {
            DispatchFailurePolicy::SkipWaypoint => Ok(WaypointResult::SkippedDispatch),
            DispatchFailurePolicy::AbortMission => Err(MissionError::CommandRejected {
                command: "waypoint".into(),
                attempts,
            }),
        },
        DispatchOutcome::Acknowledged { .. } => {
            match await_reach(tracker, wp, policy, abort).await? {
                ReachOutcome::Reached => Ok(WaypointResult::Reached),
                ReachOutcome::TimedOut => Ok(WaypointResult::TimedOut),
            }
        }
    }
}
