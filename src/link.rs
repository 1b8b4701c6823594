use crate::errors::Result;
use crate::motion::VelocitySetpoint;
use crate::telemetry::{Position, TelemetryStream};

/// A connection to a flight-control service.
///
/// Action commands are fire-and-forget: callers add their own settle delay
/// afterwards. Velocity setpoints sent before offboard mode is started are
/// kept as the priming setpoint; `start_offboard` fails without one.
#[allow(async_fn_in_trait)]
pub trait VehicleLink {
    async fn arm(&self) -> Result<()>;

    async fn land(&self) -> Result<()>;

    async fn return_to_launch(&self) -> Result<()>;

    async fn set_velocity_ned(&self, setpoint: VelocitySetpoint) -> Result<()>;

    async fn start_offboard(&self) -> Result<()>;

    async fn stop_offboard(&self) -> Result<()>;

    fn position(&self) -> TelemetryStream<Position>;

    fn in_air(&self) -> TelemetryStream<bool>;

    fn armed(&self) -> TelemetryStream<bool>;
}
