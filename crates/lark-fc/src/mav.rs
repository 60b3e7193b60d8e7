//! MAVLink serial link implementing the autopilot client boundary.
//!
//! One background reader owns `recv`: it feeds position snapshots to the
//! tracker and routes acks back to the (sequential) command path. The
//! mission layer only ever has one command outstanding, so ack routing is
//! a single channel, no correlation ids.

use std::sync::{
    atomic::{AtomicBool, AtomicU8, Ordering},
    mpsc, Arc,
};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use mavlink::{
    common::{
        MavAutopilot, MavCmd, MavFrame, MavMessage, MavMissionResult, MavModeFlag, MavResult,
        MavState, MavType, COMMAND_LONG_DATA, HEARTBEAT_DATA, MISSION_CLEAR_ALL_DATA,
        MISSION_ITEM_INT_DATA,
    },
    MavConnection, MavHeader,
};
use time::OffsetDateTime;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

use lark_geo::DegE7;
use lark_mission::{
    AutopilotClient, CommandKind, CommandOutcome, PositionSender, VehicleState, Waypoint,
};

use crate::FcConfig;

enum AckEvent {
    Command(bool),
    Mission(bool),
}

pub struct FcLink {
    conn: Arc<dyn MavConnection<MavMessage> + Send + Sync>,
    sys_id: u8,
    comp_id: u8,
    target_sys: u8,
    target_comp: u8,
    seq: Arc<AtomicU8>,
    seen_heartbeat: Arc<AtomicBool>,
    require_heartbeat: bool,
    hb_interval: Duration,
    ack_timeout: Duration,
    launch_alt_m: f32,
    acks: Option<mpsc::Receiver<AckEvent>>,
}

impl FcLink {
    pub fn open(cfg: &FcConfig) -> Result<Self> {
        // quick validate device
        let _ = tokio_serial::new(&cfg.serial_dev, cfg.baud)
            .open_native_async()
            .with_context(|| format!("open fc serial device {}", cfg.serial_dev))?;

        let url = format!("serial:{}:{}", cfg.serial_dev, cfg.baud);
        let conn = mavlink::connect::<MavMessage>(&url)
            .with_context(|| format!("mavlink connect {}", url))?;
        info!("fc link: connected {}", url);

        let hb_hz = cfg.send_heartbeat_hz.unwrap_or(1.0).max(0.2);
        Ok(Self {
            conn: Arc::from(conn),
            sys_id: cfg.sys_id,
            comp_id: cfg.comp_id,
            target_sys: cfg.target_sys,
            target_comp: cfg.target_comp,
            seq: Arc::new(AtomicU8::new(0)),
            seen_heartbeat: Arc::new(AtomicBool::new(false)),
            require_heartbeat: cfg.require_heartbeat,
            hb_interval: Duration::from_secs_f32(1.0 / hb_hz),
            ack_timeout: Duration::from_millis(cfg.ack_timeout_ms.unwrap_or(2000)),
            launch_alt_m: cfg.launch_alt_m.unwrap_or(5.0),
            acks: None,
        })
    }

    /// Start the telemetry pump: a blocking reader task (mavlink serial
    /// recv blocks) that updates the position tracker and forwards acks.
    /// Must be called before any command is sent.
    pub fn start_io(&mut self, position: PositionSender) -> tokio::task::JoinHandle<()> {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.acks = Some(ack_rx);

        let conn = self.conn.clone();
        let seen = self.seen_heartbeat.clone();
        let seq = self.seq.clone();
        let (sys_id, comp_id) = (self.sys_id, self.comp_id);
        let hb_interval = self.hb_interval;

        tokio::task::spawn_blocking(move || {
            let mut last_hb = Instant::now();
            let hb = HEARTBEAT_DATA {
                custom_mode: 0,
                mavtype: MavType::MAV_TYPE_ONBOARD_CONTROLLER,
                autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
                base_mode: MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
                system_status: MavState::MAV_STATE_ACTIVE,
                mavlink_version: 3,
            };
            let _ = send_with(&*conn, &seq, sys_id, comp_id, MavMessage::HEARTBEAT(hb.clone()));

            loop {
                // Companion heartbeat rides between inbound messages; an
                // autopilot streams constantly, so cadence holds in practice.
                if last_hb.elapsed() >= hb_interval {
                    let _ = send_with(
                        &*conn,
                        &seq,
                        sys_id,
                        comp_id,
                        MavMessage::HEARTBEAT(hb.clone()),
                    );
                    last_hb = Instant::now();
                }

                match conn.recv() {
                    Ok((_hdr, msg)) => match msg {
                        MavMessage::HEARTBEAT(_) => {
                            if !seen.swap(true, Ordering::Relaxed) {
                                info!("fc link: autopilot heartbeat seen");
                            }
                        }
                        MavMessage::GLOBAL_POSITION_INT(p) => {
                            position.update(VehicleState {
                                lat: DegE7(p.lat).decode(),
                                lon: DegE7(p.lon).decode(),
                                rel_alt_m: p.relative_alt as f64 / 1000.0,
                                alt_m: p.alt as f64 / 1000.0,
                                ts: OffsetDateTime::now_utc(),
                            });
                        }
                        MavMessage::COMMAND_ACK(ack) => {
                            let ok = matches!(ack.result, MavResult::MAV_RESULT_ACCEPTED);
                            if ack_tx.send(AckEvent::Command(ok)).is_err() {
                                break;
                            }
                        }
                        MavMessage::MISSION_ACK(ack) => {
                            let ok =
                                matches!(ack.mavtype, MavMissionResult::MAV_MISSION_ACCEPTED);
                            if ack_tx.send(AckEvent::Mission(ok)).is_err() {
                                break;
                            }
                        }
                        _ => {}
                    },
                    Err(e) => {
                        debug!("fc link: recv error: {}", e);
                        std::thread::sleep(Duration::from_millis(10));
                    }
                }
            }
            warn!("fc link: telemetry pump stopped");
        })
    }

    fn guard(&self) -> Result<()> {
        if self.require_heartbeat && !self.seen_heartbeat.load(Ordering::Relaxed) {
            anyhow::bail!("refusing command: no heartbeat seen yet");
        }
        Ok(())
    }

    fn send(&self, msg: MavMessage) -> Result<()> {
        send_with(&*self.conn, &self.seq, self.sys_id, self.comp_id, msg)
    }

    /// Discard acks from earlier traffic so the next wait only sees the
    /// answer to the command about to go out.
    fn drain_acks(&self) -> Result<()> {
        let rx = self.acks.as_ref().context("fc io not started")?;
        while rx.try_recv().is_ok() {}
        Ok(())
    }

    fn wait_ack(&self, want_mission: bool) -> Result<bool> {
        let rx = self.acks.as_ref().context("fc io not started")?;
        let deadline = Instant::now() + self.ack_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("fc link: ack wait timed out");
                return Ok(false);
            }
            match rx.recv_timeout(remaining) {
                Ok(AckEvent::Command(ok)) if !want_mission => return Ok(ok),
                Ok(AckEvent::Mission(ok)) if want_mission => return Ok(ok),
                Ok(_) => continue,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    warn!("fc link: ack wait timed out");
                    return Ok(false);
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    anyhow::bail!("fc io task stopped")
                }
            }
        }
    }

    fn command_long(&self, cmd: MavCmd, param1: f32, param7: f32) -> Result<CommandOutcome> {
        self.guard()?;
        self.drain_acks()?;
        let msg = COMMAND_LONG_DATA {
            target_system: self.target_sys,
            target_component: self.target_comp,
            command: cmd.into(),
            confirmation: 0,
            param1,
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            param5: 0.0,
            param6: 0.0,
            param7,
        };
        self.send(MavMessage::COMMAND_LONG(msg))?;
        Ok(if self.wait_ack(false)? {
            CommandOutcome::Ack
        } else {
            CommandOutcome::Nack
        })
    }

    fn clear_waypoints(&self) -> Result<CommandOutcome> {
        self.guard()?;
        self.drain_acks()?;
        let msg = MISSION_CLEAR_ALL_DATA {
            target_system: self.target_sys,
            target_component: self.target_comp,
            ..Default::default()
        };
        self.send(MavMessage::MISSION_CLEAR_ALL(msg))?;
        Ok(if self.wait_ack(true)? {
            CommandOutcome::Ack
        } else {
            CommandOutcome::Nack
        })
    }
}

impl AutopilotClient for FcLink {
    fn send_command(&mut self, kind: CommandKind) -> Result<CommandOutcome> {
        debug!("fc link: sending {}", kind.name());
        match kind {
            CommandKind::Arm => {
                self.command_long(MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, 1.0, 0.0)
            }
            CommandKind::Launch => {
                self.command_long(MavCmd::MAV_CMD_NAV_TAKEOFF, 0.0, self.launch_alt_m)
            }
            CommandKind::Land => self.command_long(MavCmd::MAV_CMD_NAV_LAND, 0.0, 0.0),
            CommandKind::TriggerAuto => {
                self.command_long(MavCmd::MAV_CMD_MISSION_START, 0.0, 0.0)
            }
            CommandKind::ClearWaypoints => self.clear_waypoints(),
        }
    }

    fn send_waypoint(&mut self, wp: &Waypoint) -> Result<bool> {
        self.guard()?;
        self.drain_acks()?;
        let item = MISSION_ITEM_INT_DATA {
            target_system: self.target_sys,
            target_component: self.target_comp,
            seq: 0,
            frame: MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT,
            command: MavCmd::MAV_CMD_NAV_WAYPOINT.into(),
            // current=2 marks a guided "go to" item rather than a mission
            // upload.
            current: 2,
            autocontinue: 1,
            param1: wp.hold_ms as f32 / 1000.0,
            param2: 0.0,
            param3: 0.0,
            param4: 0.0,
            x: wp.lat.0,
            y: wp.lon.0,
            z: wp.alt_mm as f32 / 1000.0,
            ..Default::default()
        };
        self.send(MavMessage::MISSION_ITEM_INT(item))?;
        self.wait_ack(true)
    }
}

fn send_with(
    conn: &(dyn MavConnection<MavMessage> + Send + Sync),
    seq: &AtomicU8,
    sys_id: u8,
    comp_id: u8,
    msg: MavMessage,
) -> Result<()> {
    let hdr = MavHeader {
        system_id: sys_id,
        component_id: comp_id,
        sequence: seq.fetch_add(1, Ordering::Relaxed),
    };
    conn.send(&hdr, &msg).context("mavlink send")?;
    Ok(())
}
