//! Location sample and device liveness models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A GPS sample, opportunistically linked to the identity's active alert.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LocationSample {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub device_id: String,
    pub alert_id: Option<Uuid>,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

/// Per-device liveness record updated by heartbeats.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeviceStatus {
    pub device_id: String,
    pub identity_id: Uuid,
    pub battery_percent: Option<i32>,
    pub connectivity: Option<String>,
    pub monitoring: bool,
    pub recording: bool,
    pub updated_at: DateTime<Utc>,
}

/// Mode of travel derived from sample speeds. The voice-dispatch context
/// builder only asserts a mode when the speed supports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementClass {
    Stationary,
    OnFoot,
    Vehicle,
}

impl MovementClass {
    /// Speed thresholds in m/s: walking and running stay below vehicle range.
    pub fn from_speed(speed_mps: f64) -> Self {
        if speed_mps <= 1.0 {
            MovementClass::Stationary
        } else if speed_mps <= 7.0 {
            MovementClass::OnFoot
        } else {
            MovementClass::Vehicle
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementClass::Stationary => "stationary",
            MovementClass::OnFoot => "on_foot",
            MovementClass::Vehicle => "vehicle",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_speed_is_stationary() {
        assert_eq!(MovementClass::from_speed(0.0), MovementClass::Stationary);
    }

    #[test]
    fn walking_speed_is_on_foot() {
        assert_eq!(MovementClass::from_speed(1.4), MovementClass::OnFoot);
    }

    #[test]
    fn running_speed_stays_on_foot() {
        assert_eq!(MovementClass::from_speed(5.5), MovementClass::OnFoot);
    }

    #[test]
    fn highway_speed_is_vehicle() {
        assert_eq!(MovementClass::from_speed(25.0), MovementClass::Vehicle);
    }

    #[test]
    fn boundary_speeds() {
        assert_eq!(MovementClass::from_speed(1.0), MovementClass::Stationary);
        assert_eq!(MovementClass::from_speed(7.0), MovementClass::OnFoot);
        assert_eq!(MovementClass::from_speed(7.01), MovementClass::Vehicle);
    }
}
