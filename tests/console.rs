extern crate offboard_console;

use std::collections::VecDeque;

use offboard_console::sim::SimMode;
use offboard_console::{
    run_manual_control, run_menu, ConsoleOptions, LineSource, MotionParams, OffboardError,
    ScriptedInput, SimVehicle, VelocitySetpoint, VehicleLink,
};
use tokio::time::{timeout, Duration};

fn options() -> ConsoleOptions {
    ConsoleOptions::default().with_address("sim")
}

fn assert_about(actual: Duration, expected: Duration) {
    let slack = Duration::from_millis(5);
    assert!(
        actual + slack >= expected && actual <= expected + slack,
        "expected about {expected:?}, got {actual:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn forward_three_metres() {
    let sim = SimVehicle::connect().await.unwrap();
    sim.arm().await.unwrap();
    let mut input = ScriptedInput::new(["f 3", "exit"]);

    run_manual_control(&sim, &options(), &mut input).await.unwrap();

    let sent = sim.sent_setpoints();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].setpoint, VelocitySetpoint::hold(0.0));
    assert_eq!(sent[1].setpoint, VelocitySetpoint::new(2.0, 0.0, 0.0, 0.0));
    assert_eq!(sent[2].setpoint, VelocitySetpoint::hold(0.0));
    assert_about(sent[2].at - sent[1].at, Duration::from_millis(1500));

    // exit stops offboard and nothing else is sent
    assert_eq!(sim.mode(), SimMode::Hold);
    let north = sim.position_ned()[0];
    assert!((north - 3.0).abs() < 0.15, "north {north}");
}

#[tokio::test(start_paused = true)]
async fn tiny_move_is_clamped() {
    let sim = SimVehicle::connect().await.unwrap();
    let mut input = ScriptedInput::new(["f 0.05", "exit"]);

    run_manual_control(&sim, &options(), &mut input).await.unwrap();

    let sent = sim.sent_setpoints();
    assert_eq!(sent[1].setpoint, VelocitySetpoint::new(0.2, 0.0, 0.0, 0.0));
    assert_about(sent[2].at - sent[1].at, Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn turn_then_move_keeps_new_heading() {
    let sim = SimVehicle::connect().await.unwrap();
    let mut input = ScriptedInput::new(["turn_r 90", "l 1.5", "turn_l 30", "exit"]);

    run_manual_control(&sim, &options(), &mut input).await.unwrap();

    let sent = sim.sent_setpoints();
    assert_eq!(sent[1].setpoint, VelocitySetpoint::hold(90.0));
    // the move only starts once the turn has had its 3 s
    assert_about(sent[2].at - sent[1].at, Duration::from_secs(3));
    assert_eq!(sent[2].setpoint, VelocitySetpoint::new(0.0, -1.0, 0.0, 90.0));
    assert_eq!(sent[3].setpoint, VelocitySetpoint::hold(90.0));
    assert_eq!(sent[4].setpoint, VelocitySetpoint::hold(60.0));
    assert_eq!(sent.len(), 5);
}

#[tokio::test(start_paused = true)]
async fn enormous_turn_keeps_holding() {
    let sim = SimVehicle::connect().await.unwrap();
    let mut input = ScriptedInput::new(["turn_r 1e21", "exit"]);

    // the turn takes longer than any clock can count, so it is still running
    let session = timeout(Duration::from_secs(60), run_manual_control(&sim, &options(), &mut input)).await;
    assert!(session.is_err());

    let sent = sim.sent_setpoints();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].setpoint, VelocitySetpoint::hold(1e21));
    assert_eq!(sim.mode(), SimMode::Offboard);
    assert_eq!(input.remaining(), 1);
}

#[tokio::test(start_paused = true)]
async fn garbage_is_ignored() {
    let sim = SimVehicle::connect().await.unwrap();
    let mut input = ScriptedInput::new(["xyz", "f", "turn_r left", "q 2", "exit"]);

    run_manual_control(&sim, &options(), &mut input).await.unwrap();

    // only the neutral setpoint from entering offboard
    assert_eq!(sim.sent_setpoints().len(), 1);
    assert_eq!(input.remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn end_of_input_leaves_offboard() {
    let sim = SimVehicle::connect().await.unwrap();
    let mut input = ScriptedInput::new(["u 1"]);

    run_manual_control(&sim, &options(), &mut input).await.unwrap();

    assert_eq!(sim.mode(), SimMode::Hold);
    assert_eq!(sim.sent_setpoints().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn offboard_refused_aborts_session() {
    let sim = SimVehicle::connect().await.unwrap();
    sim.reject_offboard(true);
    let mut input = ScriptedInput::new(["f 1", "exit"]);

    let result = run_manual_control(&sim, &options(), &mut input).await;

    assert!(matches!(result, Err(OffboardError::Rejected { .. })));
    assert_eq!(sim.sent_setpoints().len(), 1);
    // no command was read
    assert_eq!(input.remaining(), 2);
}

/// Scripted input that can also cut and restore the link between commands.
struct FlakyLink<'a> {
    sim: &'a SimVehicle,
    lines: VecDeque<&'static str>
}

impl LineSource for FlakyLink<'_> {
    async fn next_line(&mut self, _prompt: &str) -> Option<String> {
        loop {
            match self.lines.pop_front()? {
                "<drop>" => self.sim.reject_setpoints(true),
                "<restore>" => self.sim.reject_setpoints(false),
                line => return Some(line.to_string())
            }
        }
    }
}

#[tokio::test(start_paused = true)]
async fn failed_commands_are_skipped() {
    let sim = SimVehicle::connect().await.unwrap();
    let mut input = FlakyLink {
        sim: &sim,
        lines: VecDeque::from(["<drop>", "f 1", "turn_r 45", "<restore>", "f 1", "exit"])
    };

    run_manual_control(&sim, &options(), &mut input).await.unwrap();

    let sent = sim.sent_setpoints();
    assert_eq!(sent.len(), 3);
    // rejected commands do not hold
    assert_eq!(sent[1].at, sent[0].at);
    // but the heading of the rejected turn is kept
    assert_eq!(sent[1].setpoint.yaw_deg, 45.0);
    assert_eq!(sent[2].setpoint, VelocitySetpoint::hold(45.0));
    assert_eq!(sim.mode(), SimMode::Hold);
}

#[tokio::test(start_paused = true)]
async fn invalid_limits_refuse_to_start() {
    let sim = SimVehicle::connect().await.unwrap();
    let options = options().with_motion(MotionParams { min_speed: 5.0, ..MotionParams::default() });
    let mut input = ScriptedInput::new(["exit"]);

    let result = run_manual_control(&sim, &options, &mut input).await;
    assert!(matches!(result, Err(OffboardError::InvalidParams { .. })));
    assert!(sim.sent_setpoints().is_empty());
}

#[tokio::test(start_paused = true)]
async fn full_flight_through_the_menu() {
    let sim = SimVehicle::connect().await.unwrap();
    let options = options();
    let mut input = ScriptedInput::new([
        "9",                    // invalid option
        "1",                    // arm
        "2",                    // take off to 2 m
        "3", "u 1", "turn_b", "f 2", "debug", "land",
        "6"
    ]);

    run_menu(&sim, &options, &mut input).await;

    assert_eq!(input.remaining(), 0);
    assert!(!sim.is_armed());
    let [north, east, down] = sim.position_ned();
    assert!((north - 2.0).abs() < 0.2, "north {north}");
    assert!(east.abs() < 1e-9);
    assert_eq!(down, 0.0);

    // the move after turning about kept the 180° heading
    let moves: Vec<_> = sim.sent_setpoints()
        .into_iter()
        .map(|s| s.setpoint)
        .filter(|sp| sp.north_m_s != 0.0)
        .collect();
    assert_eq!(moves.len(), 1);
    assert_eq!(moves[0].yaw_deg, 180.0);
}

#[tokio::test(start_paused = true)]
async fn return_to_launch_from_manual_control() {
    let sim = SimVehicle::connect().await.unwrap();
    let options = options().with_settle(Duration::from_secs(10));
    let mut input = ScriptedInput::new(["1", "2", "3", "r 4", "rth", "6"]);

    run_menu(&sim, &options, &mut input).await;

    let [north, east, down] = sim.position_ned();
    assert!(north.abs() < 1e-6 && east.abs() < 1e-6);
    assert_eq!(down, 0.0);
    assert!(!sim.is_armed());
}

#[tokio::test(start_paused = true)]
async fn menu_exit_leaves_offboard_after_take_off() {
    let sim = SimVehicle::connect().await.unwrap();
    let mut input = ScriptedInput::new(["1", "2", "6"]);

    run_menu(&sim, &options(), &mut input).await;

    assert_eq!(sim.mode(), SimMode::Hold);
    assert!(sim.is_armed());
    let altitude = -sim.position_ned()[2];
    assert!((altitude - 2.0).abs() < 0.15, "altitude {altitude}");
}

#[tokio::test(start_paused = true)]
async fn end_of_input_after_take_off_leaves_offboard() {
    let sim = SimVehicle::connect().await.unwrap();
    let mut input = ScriptedInput::new(["1", "2"]);

    run_menu(&sim, &options(), &mut input).await;

    assert_eq!(sim.mode(), SimMode::Hold);
}

#[tokio::test(start_paused = true)]
async fn end_of_input_ends_the_menu() {
    let sim = SimVehicle::connect().await.unwrap();
    let mut input = ScriptedInput::new(["1"]);

    run_menu(&sim, &options(), &mut input).await;

    assert!(sim.is_armed());
    assert_eq!(sim.mode(), SimMode::Hold);
}
