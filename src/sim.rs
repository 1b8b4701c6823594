use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use tokio::{spawn, task};
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

use crate::errors::{OffboardError, Result};
use crate::link::VehicleLink;
use crate::motion::VelocitySetpoint;
use crate::telemetry::{Position, TelemetryChannels, TelemetryStream};

/// Address that selects the simulated vehicle.
pub const SIM_ADDRESS: &str = "sim";

const TICK: Duration = Duration::from_millis(50);

// PX4 SITL default home
const HOME_LATITUDE_DEG: f64 = 47.397742;
const HOME_LONGITUDE_DEG: f64 = 8.545594;
const HOME_ALTITUDE_M: f64 = 488.0;
const EARTH_RADIUS_M: f64 = 6_371_000.0;

const LAND_SPEED: f64 = 0.7;
const RETURN_SPEED: f64 = 2.0;
const IN_AIR_ALTITUDE: f64 = 0.05;

/// Flight mode of the simulated vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMode {
    Hold,
    Offboard,
    Land,
    Return
}

/// A setpoint accepted by the simulated vehicle and when it arrived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentSetpoint {
    pub at: Instant,
    pub setpoint: VelocitySetpoint
}

#[derive(Debug)]
struct SimState {
    armed: bool,
    mode: SimMode,
    setpoint: Option<VelocitySetpoint>,
    /// north, east, down relative to home
    ned: [f64; 3],
    yaw_deg: f64,
    reject_setpoints: bool,
    reject_offboard: bool,
    log: Vec<SentSetpoint>
}

impl SimState {
    fn new() -> Self {
        Self {
            armed: false,
            mode: SimMode::Hold,
            setpoint: None,
            ned: [0.0; 3],
            yaw_deg: 0.0,
            reject_setpoints: false,
            reject_offboard: false,
            log: vec![]
        }
    }

    fn step(&mut self, dt: f64) {
        match self.mode {
            SimMode::Hold => {}
            SimMode::Offboard => {
                if let (true, Some(sp)) = (self.armed, self.setpoint) {
                    self.ned[0] += sp.north_m_s * dt;
                    self.ned[1] += sp.east_m_s * dt;
                    self.ned[2] += sp.down_m_s * dt;
                    self.yaw_deg = sp.yaw_deg;
                }
            }
            SimMode::Land => {
                self.ned[2] += LAND_SPEED * dt;
                if self.ned[2] >= 0.0 {
                    info!("[Sim] touched down, disarming");
                    self.ned[2] = 0.0;
                    self.armed = false;
                    self.mode = SimMode::Hold;
                }
            }
            SimMode::Return => {
                let [n, e, _] = self.ned;
                let remaining = n.hypot(e);
                let step = RETURN_SPEED * dt;
                if remaining <= step {
                    self.ned[0] = 0.0;
                    self.ned[1] = 0.0;
                    self.mode = SimMode::Land;
                }
                else {
                    self.ned[0] -= n / remaining * step;
                    self.ned[1] -= e / remaining * step;
                }
            }
        }

        // the ground
        if self.ned[2] > 0.0 {
            self.ned[2] = 0.0;
        }
    }

    fn position(&self) -> Position {
        let [n, e, d] = self.ned;
        let lat_rad = HOME_LATITUDE_DEG.to_radians();
        Position {
            latitude_deg: HOME_LATITUDE_DEG + (n / EARTH_RADIUS_M).to_degrees(),
            longitude_deg: HOME_LONGITUDE_DEG + (e / (EARTH_RADIUS_M * lat_rad.cos())).to_degrees(),
            absolute_altitude_m: HOME_ALTITUDE_M - d,
            relative_altitude_m: -d
        }
    }

    fn in_air(&self) -> bool {
        -self.ned[2] > IN_AIR_ALTITUDE
    }

    fn publish(&self, telemetry: &TelemetryChannels) {
        telemetry.position.send_replace(Some(self.position()));
        telemetry.in_air.send_replace(Some(self.in_air()));
        telemetry.armed.send_replace(Some(self.armed));
    }
}

/// An in-process kinematic vehicle that follows the same offboard rules as a
/// real autopilot.
#[derive(Debug)]
pub struct SimVehicle {
    state: Arc<Mutex<SimState>>,
    telemetry: Arc<TelemetryChannels>,
    task: task::JoinHandle<()>
}

impl SimVehicle {
    /// Starts the simulation. Must be called from within a tokio runtime.
    pub async fn connect() -> Result<Self> {
        info!("[Sim] CONNECT");

        let state = Arc::new(Mutex::new(SimState::new()));
        let telemetry = Arc::new(TelemetryChannels::new());

        lock(&state).publish(&telemetry);
        telemetry.connected.send_replace(true);

        let task = {
            let state = state.clone();
            let telemetry = telemetry.clone();
            spawn(async move {
                let mut ticker = interval(TICK);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    let mut s = lock(&state);
                    s.step(TICK.as_secs_f64());
                    s.publish(&telemetry);
                }
            })
        };

        telemetry.wait_connected().await;
        info!("[Sim] CONNECTED");

        Ok(Self { state, telemetry, task })
    }

    /// Every setpoint accepted so far, oldest first.
    pub fn sent_setpoints(&self) -> Vec<SentSetpoint> {
        lock(&self.state).log.clone()
    }

    pub fn mode(&self) -> SimMode {
        lock(&self.state).mode
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.state).armed
    }

    /// North, east, down offset from home in metres.
    pub fn position_ned(&self) -> [f64; 3] {
        lock(&self.state).ned
    }

    /// Makes every following setpoint fail, as a lossy link would.
    pub fn reject_setpoints(&self, reject: bool) {
        lock(&self.state).reject_setpoints = reject;
    }

    /// Makes the autopilot refuse to enter offboard mode.
    pub fn reject_offboard(&self, reject: bool) {
        lock(&self.state).reject_offboard = reject;
    }
}

impl Drop for SimVehicle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl VehicleLink for SimVehicle {
    async fn arm(&self) -> Result<()> {
        info!("[Sim] ARM");
        lock(&self.state).armed = true;
        Ok(())
    }

    async fn land(&self) -> Result<()> {
        info!("[Sim] LAND");
        let mut s = lock(&self.state);
        s.mode = SimMode::Land;
        s.setpoint = None;
        Ok(())
    }

    async fn return_to_launch(&self) -> Result<()> {
        info!("[Sim] RETURN TO LAUNCH");
        let mut s = lock(&self.state);
        if !s.armed {
            return Err(OffboardError::rejected("return to launch", "vehicle is not armed"));
        }
        s.mode = SimMode::Return;
        s.setpoint = None;
        Ok(())
    }

    async fn set_velocity_ned(&self, setpoint: VelocitySetpoint) -> Result<()> {
        debug!("[Sim] SETPOINT {setpoint:?}");
        let mut s = lock(&self.state);
        if s.reject_setpoints {
            return Err(OffboardError::rejected("velocity setpoint", "link dropped the setpoint"));
        }
        s.setpoint = Some(setpoint);
        s.log.push(SentSetpoint { at: Instant::now(), setpoint });
        Ok(())
    }

    async fn start_offboard(&self) -> Result<()> {
        info!("[Sim] START OFFBOARD");
        let mut s = lock(&self.state);
        if s.setpoint.is_none() {
            return Err(OffboardError::NoSetpoint);
        }
        if s.reject_offboard {
            return Err(OffboardError::rejected("offboard start", "mode change denied"));
        }
        s.mode = SimMode::Offboard;
        Ok(())
    }

    async fn stop_offboard(&self) -> Result<()> {
        info!("[Sim] STOP OFFBOARD");
        let mut s = lock(&self.state);
        if s.mode == SimMode::Offboard {
            s.mode = SimMode::Hold;
        }
        s.setpoint = None;
        Ok(())
    }

    fn position(&self) -> TelemetryStream<Position> {
        self.telemetry.position()
    }

    fn in_air(&self) -> TelemetryStream<bool> {
        self.telemetry.in_air()
    }

    fn armed(&self) -> TelemetryStream<bool> {
        self.telemetry.armed()
    }
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test(start_paused = true)]
    async fn test_offboard_needs_setpoint() {
        let sim = SimVehicle::connect().await.unwrap();
        assert!(matches!(sim.start_offboard().await, Err(OffboardError::NoSetpoint)));

        sim.set_velocity_ned(VelocitySetpoint::hold(0.0)).await.unwrap();
        sim.start_offboard().await.unwrap();
        assert_eq!(sim.mode(), SimMode::Offboard);

        sim.stop_offboard().await.unwrap();
        assert_eq!(sim.mode(), SimMode::Hold);
        assert!(matches!(sim.start_offboard().await, Err(OffboardError::NoSetpoint)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_follows_setpoint_only_when_armed() {
        let sim = SimVehicle::connect().await.unwrap();
        sim.set_velocity_ned(VelocitySetpoint::new(0.0, 0.0, -1.0, 0.0)).await.unwrap();
        sim.start_offboard().await.unwrap();

        sleep(Duration::from_secs(1)).await;
        assert_eq!(sim.position_ned(), [0.0; 3]);

        sim.arm().await.unwrap();
        sleep(Duration::from_secs(2)).await;
        let altitude = -sim.position_ned()[2];
        assert!((altitude - 2.0).abs() < 0.11, "altitude {altitude}");

        let mut in_air = sim.in_air();
        assert_eq!(in_air.next().await, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_return_and_land() {
        let sim = SimVehicle::connect().await.unwrap();
        assert!(sim.return_to_launch().await.is_err());

        sim.arm().await.unwrap();
        sim.set_velocity_ned(VelocitySetpoint::new(2.0, 0.0, -1.0, 0.0)).await.unwrap();
        sim.start_offboard().await.unwrap();
        sleep(Duration::from_secs(2)).await;

        sim.return_to_launch().await.unwrap();
        sleep(Duration::from_secs(10)).await;

        let [n, e, d] = sim.position_ned();
        assert!(n.abs() < 1e-6 && e.abs() < 1e-6);
        assert_eq!(d, 0.0);
        assert!(!sim.is_armed());
        assert_eq!(sim.mode(), SimMode::Hold);

        let mut armed = sim.armed();
        assert_eq!(armed.next().await, Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_injected_rejection() {
        let sim = SimVehicle::connect().await.unwrap();
        sim.reject_setpoints(true);
        assert!(matches!(
            sim.set_velocity_ned(VelocitySetpoint::hold(0.0)).await,
            Err(OffboardError::Rejected { .. })
        ));
        assert!(sim.sent_setpoints().is_empty());
    }
}
