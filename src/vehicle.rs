use log::info;

use crate::errors::Result;
use crate::link::VehicleLink;
use crate::mavlink_link::MavlinkVehicle;
use crate::motion::VelocitySetpoint;
use crate::options::ConsoleOptions;
use crate::sim::{SimVehicle, SIM_ADDRESS};
use crate::telemetry::{Position, TelemetryStream};

/// Whichever link the console was pointed at.
pub enum Vehicle {
    Sim(SimVehicle),
    Mavlink(MavlinkVehicle)
}

impl Vehicle {
    /// Connects to `options.address` and waits until the vehicle is there.
    pub async fn connect(options: &ConsoleOptions) -> Result<Self> {
        println!("Connecting...");

        let vehicle = if options.address == SIM_ADDRESS {
            Vehicle::Sim(SimVehicle::connect().await?)
        }
        else {
            Vehicle::Mavlink(MavlinkVehicle::connect(&options.address, options.ack_timeout).await?)
        };

        info!("connected to {}", options.address);
        println!("[✔] Connected to drone.");

        Ok(vehicle)
    }
}

macro_rules! delegate {
    ($self:ident, $link:ident => $call:expr) => {
        match $self {
            Vehicle::Sim($link) => $call,
            Vehicle::Mavlink($link) => $call
        }
    };
}

impl VehicleLink for Vehicle {
    async fn arm(&self) -> Result<()> {
        delegate!(self, link => link.arm().await)
    }

    async fn land(&self) -> Result<()> {
        delegate!(self, link => link.land().await)
    }

    async fn return_to_launch(&self) -> Result<()> {
        delegate!(self, link => link.return_to_launch().await)
    }

    async fn set_velocity_ned(&self, setpoint: VelocitySetpoint) -> Result<()> {
        delegate!(self, link => link.set_velocity_ned(setpoint).await)
    }

    async fn start_offboard(&self) -> Result<()> {
        delegate!(self, link => link.start_offboard().await)
    }

    async fn stop_offboard(&self) -> Result<()> {
        delegate!(self, link => link.stop_offboard().await)
    }

    fn position(&self) -> TelemetryStream<Position> {
        delegate!(self, link => link.position())
    }

    fn in_air(&self) -> TelemetryStream<bool> {
        delegate!(self, link => link.in_air())
    }

    fn armed(&self) -> TelemetryStream<bool> {
        delegate!(self, link => link.armed())
    }
}
