use log::{info, warn};
use tokio::time::{sleep, timeout, Duration};

use crate::errors::{OffboardError, Result};
use crate::link::VehicleLink;
use crate::motion::{hold_duration, VelocitySetpoint};
use crate::options::ConsoleOptions;
use crate::telemetry::TelemetryStream;

pub async fn arm<L: VehicleLink>(link: &L, options: &ConsoleOptions) -> Result<()> {
    println!("Arming...");
    link.arm().await?;
    sleep(options.arm_settle).await;
    Ok(())
}

/// Climbs to the take off altitude at the ascent speed under offboard
/// control, then holds.
///
/// Offboard mode stays active afterwards.
pub async fn takeoff<L: VehicleLink>(link: &L, options: &ConsoleOptions) -> Result<()> {
    println!("[↑] Taking off to {} meters using offboard control...", options.takeoff_altitude);

    link.set_velocity_ned(VelocitySetpoint::hold(0.0)).await?;
    link.start_offboard().await?;

    let ascent = VelocitySetpoint::new(0.0, 0.0, -options.ascent_speed.abs(), 0.0);
    link.set_velocity_ned(ascent).await?;
    sleep(hold_duration(options.ascent_duration())).await;
    link.set_velocity_ned(VelocitySetpoint::hold(0.0)).await?;

    info!("take off climb finished");
    Ok(())
}

pub async fn land<L: VehicleLink>(link: &L, options: &ConsoleOptions) -> Result<()> {
    println!("Landing...");
    link.land().await?;
    sleep(options.land_settle).await;
    Ok(())
}

pub async fn return_to_launch<L: VehicleLink>(link: &L, options: &ConsoleOptions) -> Result<()> {
    println!("Returning to launch...");
    link.return_to_launch().await?;
    sleep(options.return_settle).await;
    Ok(())
}

/// One snapshot of what the autopilot reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySnapshot {
    pub relative_altitude_m: f64,
    pub in_air: bool,
    pub armed: bool
}

/// Reads exactly one value from each telemetry stream and prints it.
pub async fn debug_telemetry<L: VehicleLink>(link: &L, options: &ConsoleOptions) -> Result<TelemetrySnapshot> {
    let position = first(link.position(), "position", options.telemetry_timeout).await?;
    println!("[DEBUG] Vehicle says: ALT = {:.3} m", position.relative_altitude_m);

    let in_air = first(link.in_air(), "in-air state", options.telemetry_timeout).await?;
    println!("[DEBUG] Vehicle in_air = {in_air}");

    let armed = first(link.armed(), "armed state", options.telemetry_timeout).await?;
    println!("[DEBUG] Vehicle armed = {armed}");

    Ok(TelemetrySnapshot { relative_altitude_m: position.relative_altitude_m, in_air, armed })
}

async fn first<T: Clone>(mut stream: TelemetryStream<T>, what: &str, limit: Duration) -> Result<T> {
    match timeout(limit, stream.next()).await {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(OffboardError::Disconnected),
        Err(_) => Err(OffboardError::timeout(what))
    }
}

/// Best effort stop on the way out: leave offboard mode so the autopilot
/// holds position. Failures are only logged.
pub async fn halt<L: VehicleLink>(link: &L) {
    if let Err(err) = link.stop_offboard().await {
        warn!("halt: stopping offboard failed - {err}");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::{SimMode, SimVehicle};
    use crate::telemetry::TelemetryChannels;

    fn options() -> ConsoleOptions {
        ConsoleOptions::default().with_address("sim")
    }

    #[tokio::test(start_paused = true)]
    async fn test_debug_after_take_off() {
        let sim = SimVehicle::connect().await.unwrap();
        let options = options();

        let on_ground = debug_telemetry(&sim, &options).await.unwrap();
        assert_eq!(on_ground, TelemetrySnapshot { relative_altitude_m: 0.0, in_air: false, armed: false });

        arm(&sim, &options).await.unwrap();
        takeoff(&sim, &options).await.unwrap();
        assert_eq!(sim.mode(), SimMode::Offboard);

        let flying = debug_telemetry(&sim, &options).await.unwrap();
        assert!(flying.in_air);
        assert!(flying.armed);
        assert!((flying.relative_altitude_m - 2.0).abs() < 0.15, "altitude {}", flying.relative_altitude_m);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_stream_times_out() {
        let channels = TelemetryChannels::new();

        let started = tokio::time::Instant::now();
        let result = first(channels.position(), "position", Duration::from_secs(5)).await;

        assert!(matches!(result, Err(OffboardError::Timeout { ref what }) if what == "position"));
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_stream_is_disconnected() {
        let channels = TelemetryChannels::new();
        let armed = channels.armed();
        drop(channels);

        let result = first(armed, "armed state", Duration::from_secs(5)).await;
        assert!(matches!(result, Err(OffboardError::Disconnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_halt_leaves_offboard() {
        let sim = SimVehicle::connect().await.unwrap();
        sim.set_velocity_ned(VelocitySetpoint::hold(0.0)).await.unwrap();
        sim.start_offboard().await.unwrap();

        halt(&sim).await;
        assert_eq!(sim.mode(), SimMode::Hold);

        // nothing to stop is not an error
        halt(&sim).await;
        assert_eq!(sim.mode(), SimMode::Hold);
    }
}
