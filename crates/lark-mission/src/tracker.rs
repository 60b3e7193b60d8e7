//! Latest-position snapshot shared between the telemetry feed and the
//! navigation loop.
//!
//! A watch channel is exactly the single-slot cell this needs: the feed
//! replaces the snapshot atomically, the mission task reads whatever is
//! most recent, nothing is buffered, and "no telemetry yet" is an explicit
//! `None` rather than a sentinel coordinate.

use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{info, warn};

use lark_geo::GeoPoint;

/// Latest known vehicle position. Decimal degrees, meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleState {
    pub lat: f64,
    pub lon: f64,
    pub rel_alt_m: f64,
    pub alt_m: f64,
    pub ts: OffsetDateTime,
}

impl VehicleState {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.lat, self.lon)
    }
}

pub fn position_channel() -> (PositionSender, PositionTracker) {
    let (tx, rx) = watch::channel(None);
    (PositionSender { tx }, PositionTracker { rx })
}

/// Write half, owned by the telemetry feed. One update per inbound message,
/// last write wins.
#[derive(Debug, Clone)]
pub struct PositionSender {
    tx: watch::Sender<Option<VehicleState>>,
}

impl PositionSender {
    pub fn update(&self, state: VehicleState) {
        self.tx.send_replace(Some(state));
    }
}

/// Read half. Read-only by construction; the mission task can only observe
/// snapshots, never mutate them.
#[derive(Debug, Clone)]
pub struct PositionTracker {
    rx: watch::Receiver<Option<VehicleState>>,
}

impl PositionTracker {
    /// Most recent snapshot, or `None` until the first telemetry message.
    pub fn current(&self) -> Option<VehicleState> {
        *self.rx.borrow()
    }

    /// Bounded wait for the telemetry feed to come alive. A timeout is
    /// logged but not fatal; the navigation loop treats a missing snapshot
    /// as "not reached" anyway.
    pub async fn wait_for_first_fix(&mut self, timeout: Duration) -> bool {
        if self.current().is_some() {
            return true;
        }
        match tokio::time::timeout(timeout, self.rx.wait_for(|s| s.is_some())).await {
            Ok(Ok(_)) => {
                info!("telemetry: first position fix received");
                true
            }
            Ok(Err(_)) => {
                warn!("telemetry: position feed closed before first fix");
                false
            }
            Err(_) => {
                warn!(
                    "telemetry: no position fix within {:?}, continuing anyway",
                    timeout
                );
                false
            }
        }
    }
}
