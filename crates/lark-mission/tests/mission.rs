//! End-to-end mission scenarios against a scripted autopilot.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use time::OffsetDateTime;

use lark_mission::runner::WaypointStatus;
use lark_mission::{
    abort_pair, position_channel, AutopilotClient, CommandKind, CommandOutcome, MissionRunner,
    NavPolicy, PositionSender, Waypoint, WaypointRecord,
};

#[derive(Default)]
struct ApState {
    commands: Vec<CommandKind>,
    waypoint_calls: u32,
}

/// Scripted autopilot: optionally rejects waypoints, mirrors accepted
/// waypoint targets straight into the telemetry feed.
struct FakeAutopilot {
    state: Arc<Mutex<ApState>>,
    accept_waypoints: bool,
    position: PositionSender,
    echo_position: bool,
}

impl AutopilotClient for FakeAutopilot {
    fn send_command(&mut self, kind: CommandKind) -> Result<CommandOutcome> {
        self.state.lock().unwrap().commands.push(kind);
        Ok(CommandOutcome::Ack)
    }

    fn send_waypoint(&mut self, wp: &Waypoint) -> Result<bool> {
        let mut st = self.state.lock().unwrap();
        st.waypoint_calls += 1;
        if !self.accept_waypoints {
            return Ok(false);
        }
        if self.echo_position {
            // Vehicle teleports to the target: reach check passes on the
            // first poll.
            let t = wp.target();
            self.position.update(lark_mission::VehicleState {
                lat: t.lat,
                lon: t.lon,
                rel_alt_m: wp.alt_mm as f64 / 1000.0,
                alt_m: 40.0,
                ts: OffsetDateTime::UNIX_EPOCH,
            });
        }
        Ok(true)
    }
}

fn single_waypoint() -> Vec<WaypointRecord> {
    vec![WaypointRecord {
        latitude: 42.2935566,
        longitude: -71.2652217,
        altitude: Some(5.0),
        hold_time: None,
    }]
}

#[tokio::test(start_paused = true)]
async fn happy_path_single_waypoint() {
    let (tx, tracker) = position_channel();
    // Telemetry is already flowing before launch, ~100 m from the target.
    tx.update(lark_mission::VehicleState {
        lat: 42.2944566,
        lon: -71.2652217,
        rel_alt_m: 0.0,
        alt_m: 35.0,
        ts: OffsetDateTime::UNIX_EPOCH,
    });
    let state = Arc::new(Mutex::new(ApState::default()));
    let client = FakeAutopilot {
        state: state.clone(),
        accept_waypoints: true,
        position: tx.clone(),
        echo_position: true,
    };

    let mut runner = MissionRunner::new(client, tracker, NavPolicy::default());
    let (_h, mut abort) = abort_pair();

    let before = tokio::time::Instant::now();
    let report = runner.fly(&single_waypoint(), &mut abort).await.unwrap();

    assert_eq!(report.waypoints, vec![WaypointStatus::Reached]);
    assert!(report.landed);

    let st = state.lock().unwrap();
    assert_eq!(st.waypoint_calls, 1);
    assert_eq!(
        st.commands,
        vec![
            CommandKind::ClearWaypoints,
            CommandKind::Arm,
            CommandKind::Launch,
            CommandKind::TriggerAuto,
            CommandKind::Land,
        ]
    );

    // Launch settle (5 s) + waypoint settle (5 s), no travel polls.
    assert_eq!(before.elapsed(), Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn rejected_waypoint_is_skipped_and_land_still_runs() {
    let (tx, tracker) = position_channel();
    let state = Arc::new(Mutex::new(ApState::default()));
    let client = FakeAutopilot {
        state: state.clone(),
        accept_waypoints: false,
        position: tx,
        echo_position: false,
    };

    let mut runner = MissionRunner::new(client, tracker, NavPolicy::default());
    let (_h, mut abort) = abort_pair();

    let report = runner.fly(&single_waypoint(), &mut abort).await.unwrap();
    assert_eq!(report.waypoints, vec![WaypointStatus::SkippedDispatch]);

    let st = state.lock().unwrap();
    assert_eq!(st.waypoint_calls, 5);
    assert_eq!(st.commands.last(), Some(&CommandKind::Land));
}

#[tokio::test(start_paused = true)]
async fn invalid_record_skipped_without_dispatch() {
    let (tx, tracker) = position_channel();
    let state = Arc::new(Mutex::new(ApState::default()));
    let client = FakeAutopilot {
        state: state.clone(),
        accept_waypoints: true,
        position: tx,
        echo_position: true,
    };

    let mut records = single_waypoint();
    records.insert(
        0,
        WaypointRecord {
            latitude: 123.0,
            longitude: 0.0,
            altitude: None,
            hold_time: None,
        },
    );

    let mut runner = MissionRunner::new(client, tracker, NavPolicy::default());
    let (_h, mut abort) = abort_pair();

    let report = runner.fly(&records, &mut abort).await.unwrap();
    assert_eq!(
        report.waypoints,
        vec![WaypointStatus::Invalid, WaypointStatus::Reached]
    );
    // Only the valid waypoint was ever dispatched.
    assert_eq!(state.lock().unwrap().waypoint_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn abort_during_launch_settle_still_lands() {
    let (tx, tracker) = position_channel();
    let state = Arc::new(Mutex::new(ApState::default()));
    let client = FakeAutopilot {
        state: state.clone(),
        accept_waypoints: true,
        position: tx,
        echo_position: true,
    };

    let mut runner = MissionRunner::new(client, tracker, NavPolicy::default());
    let (handle, mut abort) = abort_pair();

    let task = tokio::spawn(async move {
        let records = single_waypoint();
        runner.fly(&records, &mut abort).await
    });
    tokio::task::yield_now().await;
    handle.abort();

    let res = task.await.unwrap();
    assert!(matches!(res, Err(lark_mission::MissionError::Aborted)));

    let st = state.lock().unwrap();
    assert_eq!(st.waypoint_calls, 0);
    assert_eq!(st.commands.last(), Some(&CommandKind::Land));
}
