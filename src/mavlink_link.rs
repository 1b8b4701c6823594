use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant as WallInstant;

use log::{debug, info, warn};
use mavlink::common::{
    MavAutopilot, MavCmd, MavFrame, MavLandedState, MavMessage, MavModeFlag, MavResult,
    MavState, MavType, PositionTargetTypemask, COMMAND_LONG_DATA, HEARTBEAT_DATA,
    SET_POSITION_TARGET_LOCAL_NED_DATA,
};
use mavlink::error::MessageReadError;
use mavlink::{MavConnection, MavHeader};
use tokio::sync::{broadcast, watch};
use tokio::time::{interval, sleep, timeout, Duration, Instant, MissedTickBehavior};
use tokio::{spawn, task};

use crate::errors::{OffboardError, Result};
use crate::link::VehicleLink;
use crate::motion::VelocitySetpoint;
use crate::telemetry::{Position, TelemetryChannels, TelemetryStream};

/// Where PX4 SITL talks to an offboard API.
pub const DEFAULT_MAVLINK_ADDRESS: &str = "udpin:0.0.0.0:14540";

// we identify as an onboard computer / ground station pair
const OWN_SYSTEM_ID: u8 = 245;
const OWN_COMPONENT_ID: u8 = 190;

const SETPOINT_PERIOD: Duration = Duration::from_millis(50);
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(1);
const PRIMING_DELAY: Duration = Duration::from_millis(200);
// three missed autopilot heartbeats
const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(3);

// px4_custom_mode.h
const PX4_MAIN_MODE_AUTO: f32 = 4.0;
const PX4_MAIN_MODE_OFFBOARD: f32 = 6.0;
const PX4_AUTO_SUB_MODE_LOITER: f32 = 3.0;

// velocity and yaw only: ignore position, acceleration and yaw rate
const VELOCITY_YAW_TYPE_MASK: u16 = 0b0000_1001_1100_0111;

type Connection = Box<dyn MavConnection<MavMessage> + Sync + Send>;

#[derive(Debug, Clone, Copy)]
struct CommandAck {
    command: MavCmd,
    result: MavResult
}

/// State shared by the receive thread, the streaming task and the link.
struct Shared {
    conn: Connection,
    address: String,
    /// (system, component) of the autopilot
    target: Mutex<(u8, u8)>,
    /// When the autopilot last sent a heartbeat
    last_heartbeat: Mutex<Option<WallInstant>>,
    sequence: AtomicU8,
    running: AtomicBool,
    started: Instant
}

impl Shared {
    fn send(&self, msg: &MavMessage) -> Result<()> {
        let header = MavHeader {
            system_id: OWN_SYSTEM_ID,
            component_id: OWN_COMPONENT_ID,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed)
        };
        self.conn
            .send(&header, msg)
            .map(|_| ())
            .map_err(|e| link_error(&self.address, e))
    }

    fn target(&self) -> (u8, u8) {
        *self.target.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn time_boot_ms(&self) -> u32 {
        self.started.elapsed().as_millis() as u32
    }
}

/// A vehicle reached over MAVLink, flown with PX4 offboard mode.
pub struct MavlinkVehicle {
    shared: Arc<Shared>,
    telemetry: Arc<TelemetryChannels>,
    acks: broadcast::Sender<CommandAck>,
    setpoint: watch::Sender<Option<VelocitySetpoint>>,
    streamer: task::JoinHandle<()>,
    ack_timeout: Duration
}

impl MavlinkVehicle {
    /// Opens `address` (`udpin:`, `udpout:`, `tcpout:`, `serial:`) and waits
    /// for the autopilot's heartbeat.
    pub async fn connect(address: &str, ack_timeout: Duration) -> Result<Self> {
        info!("[MAVLink] CONNECT {address}");

        let owned_address = address.to_string();
        let conn = task::spawn_blocking(move || mavlink::connect::<MavMessage>(&owned_address))
            .await
            .map_err(|e| link_error(address, e))?
            .map_err(|e| link_error(address, e))?;

        let shared = Arc::new(Shared {
            conn,
            address: address.to_string(),
            target: Mutex::new((1, 1)),
            last_heartbeat: Mutex::new(None),
            sequence: AtomicU8::new(0),
            running: AtomicBool::new(true),
            started: Instant::now()
        });
        let telemetry = Arc::new(TelemetryChannels::new());
        let (acks, _) = broadcast::channel(16);

        {
            let shared = shared.clone();
            let telemetry = telemetry.clone();
            let acks = acks.clone();
            thread::spawn(move || receive_loop(&shared, &telemetry, &acks));
        }

        let (setpoint, setpoint_rx) = watch::channel(None);
        let streamer = spawn(stream_loop(shared.clone(), telemetry.clone(), setpoint_rx));

        info!("[MAVLink] waiting for autopilot heartbeat...");
        telemetry.wait_connected().await;

        let (system, component) = shared.target();
        info!("[MAVLink] CONNECTED to system {system} component {component}");

        Ok(Self { shared, telemetry, acks, setpoint, streamer, ack_timeout })
    }

    /// Sends a `COMMAND_LONG` and waits for its acknowledgement.
    async fn command(&self, action: &str, command: MavCmd, params: [f32; 7]) -> Result<()> {
        debug!("[MAVLink] COMMAND {command:?} {params:?}");

        let mut acks = self.acks.subscribe();
        let (target_system, target_component) = self.shared.target();

        self.shared.send(&MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
            param1: params[0],
            param2: params[1],
            param3: params[2],
            param4: params[3],
            param5: params[4],
            param6: params[5],
            param7: params[6],
            command,
            target_system,
            target_component,
            confirmation: 0
        }))?;

        let wait_for_ack = async {
            loop {
                match acks.recv().await {
                    Ok(ack) if ack.command == command => return Ok(ack.result),
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return Err(OffboardError::Disconnected)
                }
            }
        };

        let result = timeout(self.ack_timeout, wait_for_ack)
            .await
            .map_err(|_| OffboardError::timeout(format!("{action} acknowledgement")))??;

        debug!("[MAVLink] ACK {command:?} {result:?}");

        match result {
            MavResult::MAV_RESULT_ACCEPTED => Ok(()),
            other => Err(OffboardError::rejected(action, format!("{other:?}")))
        }
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.telemetry.is_connected() { Ok(()) } else { Err(OffboardError::Disconnected) }
    }
}

impl Drop for MavlinkVehicle {
    fn drop(&mut self) {
        self.shared.running.store(false, Ordering::Relaxed);
        self.streamer.abort();
    }
}

impl VehicleLink for MavlinkVehicle {
    async fn arm(&self) -> Result<()> {
        self.command("arm", MavCmd::MAV_CMD_COMPONENT_ARM_DISARM, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]).await
    }

    async fn land(&self) -> Result<()> {
        // NaN keeps the current yaw and position
        let nan = f32::NAN;
        self.command("land", MavCmd::MAV_CMD_NAV_LAND, [0.0, 0.0, 0.0, nan, nan, nan, nan]).await
    }

    async fn return_to_launch(&self) -> Result<()> {
        self.command("return to launch", MavCmd::MAV_CMD_NAV_RETURN_TO_LAUNCH, [0.0; 7]).await
    }

    async fn set_velocity_ned(&self, setpoint: VelocitySetpoint) -> Result<()> {
        self.ensure_connected()?;
        debug!("[MAVLink] SETPOINT {setpoint:?}");

        let (target_system, target_component) = self.shared.target();
        self.shared.send(&setpoint_message(&self.shared, target_system, target_component, &setpoint))?;

        // keep it alive until the next one
        self.setpoint.send_replace(Some(setpoint));
        Ok(())
    }

    async fn start_offboard(&self) -> Result<()> {
        if self.setpoint.borrow().is_none() {
            return Err(OffboardError::NoSetpoint);
        }

        sleep(PRIMING_DELAY).await;

        let custom = MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED.bits() as f32;
        self.command(
            "offboard start",
            MavCmd::MAV_CMD_DO_SET_MODE,
            [custom, PX4_MAIN_MODE_OFFBOARD, 0.0, 0.0, 0.0, 0.0, 0.0]
        ).await?;

        info!("[MAVLink] OFFBOARD started");
        Ok(())
    }

    async fn stop_offboard(&self) -> Result<()> {
        let custom = MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED.bits() as f32;
        let result = self.command(
            "offboard stop",
            MavCmd::MAV_CMD_DO_SET_MODE,
            [custom, PX4_MAIN_MODE_AUTO, PX4_AUTO_SUB_MODE_LOITER, 0.0, 0.0, 0.0, 0.0]
        ).await;

        self.setpoint.send_replace(None);
        info!("[MAVLink] OFFBOARD stopped");
        result
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

fn setpoint_message(shared: &Shared, target_system: u8, target_component: u8, sp: &VelocitySetpoint) -> MavMessage {
    MavMessage::SET_POSITION_TARGET_LOCAL_NED(SET_POSITION_TARGET_LOCAL_NED_DATA {
        time_boot_ms: shared.time_boot_ms(),
        x: 0.0,
        y: 0.0,
        z: 0.0,
        vx: sp.north_m_s as f32,
        vy: sp.east_m_s as f32,
        vz: sp.down_m_s as f32,
        afx: 0.0,
        afy: 0.0,
        afz: 0.0,
        yaw: sp.yaw_deg.to_radians() as f32,
        yaw_rate: 0.0,
        type_mask: PositionTargetTypemask::from_bits_truncate(VELOCITY_YAW_TYPE_MASK),
        target_system,
        target_component,
        coordinate_frame: MavFrame::MAV_FRAME_LOCAL_NED
    })
}

fn gcs_heartbeat() -> MavMessage {
    MavMessage::HEARTBEAT(HEARTBEAT_DATA {
        custom_mode: 0,
        mavtype: MavType::MAV_TYPE_GCS,
        autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
        base_mode: MavModeFlag::empty(),
        system_status: MavState::MAV_STATE_ACTIVE,
        mavlink_version: 3
    })
}

fn link_error(address: &str, err: impl std::fmt::Debug) -> OffboardError {
    OffboardError::Connection { address: address.to_string(), msg: format!("{err:?}") }
}

/// Drops the connected flag once the autopilot has been silent for too long.
/// The next heartbeat raises it again.
fn check_heartbeat(last: Option<WallInstant>, now: WallInstant, telemetry: &TelemetryChannels) {
    let silent = last.map_or(false, |t| now.saturating_duration_since(t) > HEARTBEAT_TIMEOUT);
    if silent && telemetry.is_connected() {
        warn!("[MAVLink] no autopilot heartbeat for {HEARTBEAT_TIMEOUT:?}, link lost");
        telemetry.connected.send_replace(false);
    }
}

/// Heartbeat at 1 Hz, and the latest setpoint at 20 Hz while there is one.
async fn stream_loop(
    shared: Arc<Shared>,
    telemetry: Arc<TelemetryChannels>,
    setpoint: watch::Receiver<Option<VelocitySetpoint>>
) {
    let mut ticker = interval(SETPOINT_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_heartbeat: Option<Instant> = None;

    loop {
        ticker.tick().await;

        if last_heartbeat.map_or(true, |t| t.elapsed() >= HEARTBEAT_PERIOD) {
            if let Err(err) = shared.send(&gcs_heartbeat()) {
                warn!("[MAVLink] heartbeat not sent - {err}");
            }
            last_heartbeat = Some(Instant::now());
        }

        let heard = *shared.last_heartbeat.lock().unwrap_or_else(PoisonError::into_inner);
        check_heartbeat(heard, WallInstant::now(), &telemetry);

        let current = *setpoint.borrow();
        if let Some(sp) = current {
            let (system, component) = shared.target();
            if let Err(err) = shared.send(&setpoint_message(&shared, system, component, &sp)) {
                warn!("[MAVLink] setpoint refresh not sent - {err}");
            }
        }
    }
}

fn receive_loop(shared: &Shared, telemetry: &TelemetryChannels, acks: &broadcast::Sender<CommandAck>) {
    while shared.running.load(Ordering::Relaxed) {
        match shared.conn.recv() {
            Ok((header, msg)) => handle_message(shared, telemetry, acks, &header, msg),
            Err(MessageReadError::Io(err)) => {
                warn!("[MAVLink] receive failed ({err}), retrying...");
                thread::sleep(std::time::Duration::from_millis(100));
            }
            Err(err) => debug!("[MAVLink] dropped message - {err:?}")
        }
    }
    debug!("[MAVLink] receive loop finished");
}

fn handle_message(
    shared: &Shared,
    telemetry: &TelemetryChannels,
    acks: &broadcast::Sender<CommandAck>,
    header: &MavHeader,
    msg: MavMessage
) {
    match msg {
        MavMessage::HEARTBEAT(hb) => {
            // only autopilots, not other ground stations
            if hb.mavtype == MavType::MAV_TYPE_GCS || hb.autopilot == MavAutopilot::MAV_AUTOPILOT_INVALID {
                return;
            }

            *shared.target.lock().unwrap_or_else(PoisonError::into_inner) = (header.system_id, header.component_id);
            *shared.last_heartbeat.lock().unwrap_or_else(PoisonError::into_inner) = Some(WallInstant::now());

            let armed = hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED);
            telemetry.armed.send_replace(Some(armed));

            if !telemetry.is_connected() {
                info!("[MAVLink] autopilot heartbeat received");
                telemetry.connected.send_replace(true);
            }
        }
        MavMessage::GLOBAL_POSITION_INT(pos) => {
            telemetry.position.send_replace(Some(Position {
                latitude_deg: pos.lat as f64 / 1e7,
                longitude_deg: pos.lon as f64 / 1e7,
                absolute_altitude_m: pos.alt as f64 / 1000.0,
                relative_altitude_m: pos.relative_alt as f64 / 1000.0
            }));
        }
        MavMessage::EXTENDED_SYS_STATE(state) => {
            let in_air = match state.landed_state {
                MavLandedState::MAV_LANDED_STATE_ON_GROUND => Some(false),
                MavLandedState::MAV_LANDED_STATE_IN_AIR
                | MavLandedState::MAV_LANDED_STATE_TAKEOFF
                | MavLandedState::MAV_LANDED_STATE_LANDING => Some(true),
                _ => None
            };
            if in_air.is_some() {
                telemetry.in_air.send_replace(in_air);
            }
        }
        MavMessage::COMMAND_ACK(ack) => {
            // nobody waiting is fine
            let _ = acks.send(CommandAck { command: ack.command, result: ack.result });
        }
        _ => {}
    }
}
