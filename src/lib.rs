mod errors;
mod telemetry;

pub mod actions;
pub mod command;
pub mod input;
pub mod link;
pub mod logger;
pub mod manual;
pub mod mavlink_link;
pub mod menu;
pub mod motion;
pub mod options;
pub mod sim;
pub mod vehicle;

pub use errors::{OffboardError, Result};
pub use command::{Direction, ManualCommand, ParseError};
pub use input::{LineSource, ScriptedInput, Terminal};
pub use link::VehicleLink;
pub use manual::{run_manual_control, Flow, ManualControl};
pub use menu::{run_menu, MenuChoice};
pub use motion::{MotionParams, MovePlan, VelocitySetpoint};
pub use options::ConsoleOptions;
pub use sim::SimVehicle;
pub use telemetry::{Position, TelemetryStream};
pub use vehicle::Vehicle;
