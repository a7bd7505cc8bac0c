//! Location tracking and device liveness

use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{DeviceStatus, LocationSample};
use crate::repositories::{AlertRepository, DeviceRepository, LocationRepository};
use crate::validation::validate_coordinates;

/// A raw location report from a device
#[derive(Debug, Clone)]
pub struct LocationReport {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
}

/// Heartbeat payload: liveness fields plus an optional piggybacked location
#[derive(Debug, Clone)]
pub struct HeartbeatReport {
    pub battery_percent: Option<i32>,
    pub connectivity: Option<String>,
    pub monitoring: bool,
    pub recording: bool,
    pub location: Option<LocationReport>,
}

/// Location tracker service
#[derive(Clone)]
pub struct LocationTracker {
    locations: LocationRepository,
    alerts: AlertRepository,
    devices: DeviceRepository,
}

impl LocationTracker {
    /// Create a new location tracker
    pub fn new(
        locations: LocationRepository,
        alerts: AlertRepository,
        devices: DeviceRepository,
    ) -> Self {
        Self {
            locations,
            alerts,
            devices,
        }
    }

    /// Store one GPS sample, linking it to the identity's active alert when
    /// one exists.
    pub async fn ingest(
        &self,
        identity_id: Uuid,
        device_id: &str,
        report: LocationReport,
    ) -> ApiResult<LocationSample> {
        validate_coordinates(report.latitude, report.longitude).map_err(ApiError::Validation)?;

        let alert_id = self
            .alerts
            .find_active(identity_id)
            .await?
            .map(|alert| alert.id);

        let sample = self
            .locations
            .insert(
                identity_id,
                device_id,
                alert_id,
                report.latitude,
                report.longitude,
                report.accuracy,
                report.speed,
                report.heading,
            )
            .await?;

        if let Some(alert_id) = alert_id {
            info!("Location sample {} linked to alert {}", sample.id, alert_id);
        }

        Ok(sample)
    }

    /// Handle a device heartbeat: update liveness, and store the piggybacked
    /// location sample when present.
    pub async fn heartbeat(
        &self,
        identity_id: Uuid,
        device_id: &str,
        report: HeartbeatReport,
    ) -> ApiResult<DeviceStatus> {
        let status = self
            .devices
            .upsert_status(
                device_id,
                identity_id,
                report.battery_percent,
                report.connectivity.as_deref(),
                report.monitoring,
                report.recording,
            )
            .await?;

        if let Some(location) = report.location {
            self.ingest(identity_id, device_id, location).await?;
        }

        Ok(status)
    }
}
