pub mod mav;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct FcConfig {
    /// Serial device, e.g. "/dev/ttyACM0".
    pub serial_dev: String,
    pub baud: u32,

    /// MAVLink ids we use (companion side).
    pub sys_id: u8,
    pub comp_id: u8,

    /// Target system/component (autopilot side). 1/1 is common for ArduPilot.
    pub target_sys: u8,
    pub target_comp: u8,

    /// Require seeing an autopilot heartbeat before sending commands.
    pub require_heartbeat: bool,

    /// Companion heartbeat rate. Default 1 Hz.
    pub send_heartbeat_hz: Option<f32>,

    /// How long a command waits for its ack before counting as rejected.
    /// Default 2000 ms.
    pub ack_timeout_ms: Option<u64>,

    /// Takeoff altitude in meters. Default 5.
    pub launch_alt_m: Option<f32>,
}
