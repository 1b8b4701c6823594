use std::time::Duration;

use crate::command::Direction;
use crate::errors::{OffboardError, Result};

/// A velocity and absolute heading setpoint in the local NED frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VelocitySetpoint {
    pub north_m_s: f64,
    pub east_m_s: f64,
    /// Positive is down.
    pub down_m_s: f64,
    /// Absolute heading, not a rate.
    pub yaw_deg: f64
}

impl VelocitySetpoint {
    pub fn new(north_m_s: f64, east_m_s: f64, down_m_s: f64, yaw_deg: f64) -> Self {
        Self { north_m_s, east_m_s, down_m_s, yaw_deg }
    }

    /// Zero velocity, holding the given heading.
    pub fn hold(yaw_deg: f64) -> Self {
        Self { yaw_deg, ..Self::default() }
    }

    /// Velocity of `speed` along `direction`, holding the given heading.
    pub fn toward(direction: Direction, speed: f64, yaw_deg: f64) -> Self {
        let (n, e, d) = direction.unit_ned();
        Self::new(n * speed, e * speed, d * speed, yaw_deg)
    }

    pub fn is_stationary(&self) -> bool {
        self.north_m_s == 0.0 && self.east_m_s == 0.0 && self.down_m_s == 0.0
    }
}

/// Limits applied to manual moves and turns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionParams {
    /// m/s
    pub max_speed: f64,
    /// m/s
    pub min_speed: f64,
    /// Seconds a move should take when speed limits allow it.
    pub time_goal: f64,
    /// deg/s
    pub turn_speed: f64,
    /// m
    pub min_distance: f64,
    /// m
    pub max_distance: f64
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            max_speed: 2.0,
            min_speed: 0.2,
            time_goal: 1.5,
            turn_speed: 30.0,
            min_distance: 0.1,
            max_distance: 5.0
        }
    }
}

impl MotionParams {
    /// Checks the limits keep every derived duration positive and finite.
    pub fn validate(&self) -> Result<()> {
        let all = [
            self.max_speed, self.min_speed, self.time_goal,
            self.turn_speed, self.min_distance, self.max_distance
        ];
        if all.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(OffboardError::InvalidParams { msg: "all limits must be positive and finite".to_string() });
        }
        if self.min_speed > self.max_speed {
            return Err(OffboardError::InvalidParams { msg: format!("min speed {} above max speed {}", self.min_speed, self.max_speed) });
        }
        if self.min_distance > self.max_distance {
            return Err(OffboardError::InvalidParams { msg: format!("min distance {} above max distance {}", self.min_distance, self.max_distance) });
        }
        Ok(())
    }

    pub fn clamp_distance(&self, distance: f64) -> f64 {
        distance.clamp(self.min_distance, self.max_distance)
    }

    pub fn clamp_speed(&self, speed: f64) -> f64 {
        speed.clamp(self.min_speed, self.max_speed)
    }

    /// Time to turn through `deg` degrees at the turn rate.
    pub fn turn_duration(&self, deg: f64) -> Duration {
        hold_duration(deg / self.turn_speed)
    }
}

/// Distance, speed and duration of one manual move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovePlan {
    pub distance: f64,
    pub speed: f64,
    /// Seconds.
    pub duration: f64
}

impl MovePlan {
    pub fn new(raw_distance: f64, params: &MotionParams) -> Self {
        let distance = params.clamp_distance(raw_distance);
        let speed = params.clamp_speed(distance / params.time_goal);
        let duration = distance / speed;
        Self { distance, speed, duration }
    }

    pub fn hold(&self) -> Duration {
        hold_duration(self.duration)
    }
}

/// Seconds to a `Duration`, zero for anything not positive and saturating at
/// `Duration::MAX` for holds too long to represent.
pub(crate) fn hold_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
