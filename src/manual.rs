//! Manual control: short text commands flown as timed velocity setpoints at a
//! tracked heading.

use log::{debug, info};
use tokio::time::sleep;

use crate::actions;
use crate::command::{Direction, ManualCommand};
use crate::errors::Result;
use crate::input::LineSource;
use crate::link::VehicleLink;
use crate::motion::{MovePlan, VelocitySetpoint};
use crate::options::ConsoleOptions;

const PROMPT: &str = "> ";

/// What the command loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Leave
}

/// One manual control session, from entering offboard mode to leaving it.
///
/// The yaw heading starts at 0 and is only changed by turns. It is never
/// wrapped, so it keeps the history of turns in both directions. When the
/// link rejects a setpoint the heading is not rolled back, so it may no
/// longer match the vehicle.
pub struct ManualControl<'a, L: VehicleLink> {
    link: &'a L,
    options: &'a ConsoleOptions,
    yaw_heading: f64
}

impl<'a, L: VehicleLink> ManualControl<'a, L> {
    /// Primes the link with a neutral setpoint and starts offboard mode.
    pub async fn enter(link: &'a L, options: &'a ConsoleOptions) -> Result<Self> {
        options.motion.validate()?;

        let session = Self { link, options, yaw_heading: 0.0 };

        link.set_velocity_ned(VelocitySetpoint::hold(session.yaw_heading)).await?;
        link.start_offboard().await?;

        info!("manual control started");
        Ok(session)
    }

    /// Degrees, absolute and unwrapped.
    pub fn yaw_heading(&self) -> f64 {
        self.yaw_heading
    }

    pub async fn turn_right(&mut self, deg: f64) -> Result<()> {
        self.yaw_heading += deg;
        println!("↻ Turning right {deg}°, new heading: {}°", self.yaw_heading);
        self.turn(deg).await
    }

    pub async fn turn_left(&mut self, deg: f64) -> Result<()> {
        self.yaw_heading -= deg;
        println!("↺ Turning left {deg}°, new heading: {}°", self.yaw_heading);
        self.turn(deg).await
    }

    pub async fn turn_about(&mut self) -> Result<()> {
        self.yaw_heading += 180.0;
        println!("↻ Turning back (180°), new heading: {}°", self.yaw_heading);
        self.turn(180.0).await
    }

    // zero translation at the new heading, held for as long as the turn takes
    async fn turn(&mut self, deg: f64) -> Result<()> {
        self.link.set_velocity_ned(VelocitySetpoint::hold(self.yaw_heading)).await?;
        sleep(self.options.motion.turn_duration(deg)).await;
        Ok(())
    }

    /// Moves `raw_distance` metres (clamped) along `direction`, then stops.
    pub async fn move_by(&mut self, direction: Direction, raw_distance: f64) -> Result<MovePlan> {
        let plan = MovePlan::new(raw_distance, &self.options.motion);

        println!(
            "[→] Moving {direction} {}m at {:.2} m/s for {:.2}s | Yaw: {}°",
            plan.distance, plan.speed, plan.duration, self.yaw_heading
        );

        let velocity = VelocitySetpoint::toward(direction, plan.speed, self.yaw_heading);
        self.link.set_velocity_ned(velocity).await?;
        sleep(plan.hold()).await;

        // stop on arrival, no coasting
        self.link.set_velocity_ned(VelocitySetpoint::hold(self.yaw_heading)).await?;

        Ok(plan)
    }

    /// Runs one command to completion, including its hold time.
    pub async fn handle(&mut self, command: &ManualCommand) -> Result<Flow> {
        debug!("manual command {command:?}");

        match command {
            ManualCommand::Move { direction, distance } => {
                self.move_by(*direction, *distance).await?;
            }
            ManualCommand::TurnRight(deg) => self.turn_right(*deg).await?,
            ManualCommand::TurnLeft(deg) => self.turn_left(*deg).await?,
            ManualCommand::TurnAbout => self.turn_about().await?,
            ManualCommand::DebugTelemetry => {
                actions::debug_telemetry(self.link, self.options).await?;
            }
            ManualCommand::Land => {
                self.link.stop_offboard().await?;
                actions::land(self.link, self.options).await?;
                return Ok(Flow::Leave);
            }
            ManualCommand::ReturnToLaunch => {
                self.link.stop_offboard().await?;
                actions::return_to_launch(self.link, self.options).await?;
                return Ok(Flow::Leave);
            }
            ManualCommand::Exit => {
                self.link.stop_offboard().await?;
                return Ok(Flow::Leave);
            }
            ManualCommand::Invalid(err) => {
                println!("[x] {err}. {}", err.usage());
            }
        }

        Ok(Flow::Continue)
    }

    /// Stops offboard mode and ends the session.
    pub async fn exit(self) -> Result<()> {
        self.link.stop_offboard().await?;
        info!("manual control finished");
        Ok(())
    }
}

impl ManualCommand {
    /// Whether the session is over once this command has been attempted,
    /// even if it failed.
    pub fn ends_session(&self) -> bool {
        matches!(self, ManualCommand::Exit | ManualCommand::Land | ManualCommand::ReturnToLaunch)
    }
}

/// The manual control loop: enter offboard mode, then read and fly commands
/// until the operator leaves.
///
/// Failures of single commands are reported and the loop carries on. End of
/// input leaves like `exit`.
pub async fn run_manual_control<L, I>(link: &L, options: &ConsoleOptions, input: &mut I) -> Result<()>
where
    L: VehicleLink,
    I: LineSource
{
    println!("Manual control:");
    println!("→ Movement: 'f 1', 'r 1', 'u 1', 'd 1'");
    println!("→ Turning: 'turn_r 90', 'turn_l 45', 'turn_b'");
    println!("→ Commands: land, rth, debug, exit");

    let mut session = ManualControl::enter(link, options).await?;

    loop {
        let Some(line) = input.next_line(PROMPT).await else {
            println!("End of input, leaving manual control.");
            return session.exit().await;
        };

        let command = ManualCommand::parse(&line);
        match session.handle(&command).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Leave) => break,
            Err(err) => {
                println!("[x] Error: {err}");
                if command.ends_session() {
                    break;
                }
            }
        }
    }

    info!("manual control finished");
    Ok(())
}
