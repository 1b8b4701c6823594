use std::env;
use std::time::Duration;

use log::LevelFilter;

use crate::mavlink_link::DEFAULT_MAVLINK_ADDRESS;
use crate::motion::MotionParams;

/// Environment variable overriding the vehicle address.
pub const ADDRESS_ENV: &str = "OFFBOARD_CONSOLE_ADDRESS";

/// Environment variable overriding the log level.
pub const LOG_ENV: &str = "OFFBOARD_CONSOLE_LOG";

/// Console connection and flight options.
#[derive(Debug, Clone)]
pub struct ConsoleOptions {
    /// `sim` for the built-in simulator, otherwise a MAVLink address.
    pub address: String,
    pub log_level: LevelFilter,
    pub motion: MotionParams,
    pub arm_settle: Duration,
    pub land_settle: Duration,
    pub return_settle: Duration,
    /// m
    pub takeoff_altitude: f64,
    /// m/s, upwards
    pub ascent_speed: f64,
    pub telemetry_timeout: Duration,
    pub ack_timeout: Duration
}

impl Default for ConsoleOptions {
    fn default() -> Self {
        Self {
            address: DEFAULT_MAVLINK_ADDRESS.to_string(),
            log_level: LevelFilter::Info,
            motion: MotionParams::default(),
            arm_settle: Duration::from_secs(2),
            land_settle: Duration::from_secs(5),
            return_settle: Duration::from_secs(5),
            takeoff_altitude: 2.0,
            ascent_speed: 1.0,
            telemetry_timeout: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(3)
        }
    }
}

impl ConsoleOptions {
    /// Defaults, with the address and log level taken from the environment
    /// when set.
    ///
    /// An unrecognised log level is ignored.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(address) = env::var(ADDRESS_ENV) {
            options = options.with_address(address.trim());
        }

        if let Some(level) = env::var(LOG_ENV).ok().and_then(|l| l.trim().parse::<LevelFilter>().ok()) {
            options.log_level = level;
        }

        options
    }

    /// Connect to the vehicle at `address` instead.
    pub fn with_address(mut self, address: &str) -> Self {
        self.address = address.to_string();
        self
    }

    /// Use different motion limits.
    pub fn with_motion(mut self, motion: MotionParams) -> Self {
        self.motion = motion;
        self
    }

    /// Shorten every settle delay, eg for simulated vehicles.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.arm_settle = settle;
        self.land_settle = settle;
        self.return_settle = settle;
        self
    }

    /// Seconds the take off ascent lasts.
    pub fn ascent_duration(&self) -> f64 {
        self.takeoff_altitude / self.ascent_speed.abs()
    }
}
