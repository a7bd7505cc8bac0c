//! Panic alert coordination
//!
//! State machine: none → ativo → cancelado (terminal). At most one active
//! alert per identity; cancellation is one-shot. Cancelling more than sixty
//! seconds after the trigger marks the alert escalated; exactly sixty is
//! still inside the grace window.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::PanicAlert;
use crate::notify::{Outbox, OutboundTask, build_dispatch_context};
use crate::repositories::{
    AlertRepository, IdentityRepository, LocationRepository, MonitoringRepository,
};

/// Grace period after a trigger during which cancellation is not escalated
const ESCALATION_WINDOW_SECONDS: i64 = 60;

/// Seal reason recorded on monitoring sessions closed by a panic cancel
pub const SEAL_REASON_PANIC_CANCELLED: &str = "panico_cancelado";

/// Whether a cancellation at `cancelled_at` escalates an alert created at
/// `created_at`. Strictly greater: the sixtieth second itself does not.
pub fn is_escalated(created_at: DateTime<Utc>, cancelled_at: DateTime<Utc>) -> bool {
    (cancelled_at - created_at).num_seconds() > ESCALATION_WINDOW_SECONDS
}

/// Human-readable protocol code: AMP-YYYYMMDD-<random>
pub fn generate_protocol_code(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("AMP-{}-{:06}", now.format("%Y%m%d"), suffix)
}

/// Short public code for the live tracking link
pub fn generate_tracking_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_uppercase()
}

/// Alert coordinator service
#[derive(Clone)]
pub struct AlertCoordinator {
    identities: IdentityRepository,
    alerts: AlertRepository,
    locations: LocationRepository,
    monitoring: MonitoringRepository,
    outbox: Outbox,
}

impl AlertCoordinator {
    /// Create a new alert coordinator
    pub fn new(
        identities: IdentityRepository,
        alerts: AlertRepository,
        locations: LocationRepository,
        monitoring: MonitoringRepository,
        outbox: Outbox,
    ) -> Self {
        Self {
            identities,
            alerts,
            locations,
            monitoring,
            outbox,
        }
    }

    /// Trigger a panic alert. If one is already active for the identity the
    /// existing alert is returned and no new notifications fire.
    pub async fn trigger(
        &self,
        identity_id: Uuid,
        device_id: &str,
        trigger_type: &str,
        coordinates: Option<(f64, f64)>,
    ) -> ApiResult<PanicAlert> {
        let identity = self
            .identities
            .find_by_id(identity_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Conta desconhecida".to_string()))?;

        let now = Utc::now();
        let protocol_code = generate_protocol_code(now);
        let tracking_code = generate_tracking_code();
        let (latitude, longitude) = match coordinates {
            Some((lat, lon)) => (Some(lat), Some(lon)),
            None => (None, None),
        };

        let inserted = self
            .alerts
            .insert_active(
                identity_id,
                device_id,
                &protocol_code,
                trigger_type,
                &tracking_code,
                latitude,
                longitude,
            )
            .await?;

        let mut alert = match inserted {
            Some(alert) => alert,
            None => {
                // Constraint said one is already active: return it unchanged.
                return self
                    .alerts
                    .find_active(identity_id)
                    .await?
                    .ok_or_else(|| ApiError::NotFound("Alerta ativo nao encontrado".to_string()));
            }
        };

        info!(
            "Panic alert {} triggered for identity {} ({})",
            alert.protocol_code, identity_id, trigger_type
        );

        self.alerts
            .insert_tracking_link(identity_id, alert.id, &alert.tracking_code)
            .await?;

        if let Some((lat, lon)) = coordinates {
            self.locations
                .insert(identity_id, device_id, Some(alert.id), lat, lon, None, None, None)
                .await?;
        }

        let last_sample = self.locations.latest_for_identity(identity_id).await?;
        let context = build_dispatch_context(&identity, &alert, last_sample.as_ref());

        // Both notifications are handed to the queue without waiting on the
        // outcome; their failure never affects the alert itself.
        self.outbox.enqueue(OutboundTask::GuardianAlert {
            alert_id: alert.id,
            protocol_code: alert.protocol_code.clone(),
            tracking_code: alert.tracking_code.clone(),
            latitude: alert.latitude,
            longitude: alert.longitude,
        });
        self.outbox.enqueue(OutboundTask::VoiceDispatch { context });

        self.alerts.set_guardians_notified(alert.id).await?;
        alert.guardians_notified = true;

        Ok(alert)
    }

    /// Cancel the identity's active alert. Fails NotFound when none is
    /// active, which also makes a second cancel of the same alert fail.
    pub async fn cancel(
        &self,
        identity_id: Uuid,
        reason: Option<&str>,
    ) -> ApiResult<PanicAlert> {
        let active = self
            .alerts
            .find_active(identity_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Nenhum alerta ativo".to_string()))?;

        let now = Utc::now();
        let elapsed = (now - active.created_at).num_seconds();
        let escalated = is_escalated(active.created_at, now);

        let mut alert = self
            .alerts
            .cancel(active.id, now, reason, elapsed, escalated, false)
            .await?
            .ok_or_else(|| ApiError::NotFound("Nenhum alerta ativo".to_string()))?;

        let sealed = self
            .monitoring
            .seal_active_for_identity(identity_id, SEAL_REASON_PANIC_CANCELLED)
            .await?;

        if sealed > 0 {
            self.alerts.set_window_sealed(alert.id).await?;
            alert.window_sealed = true;
        }

        let links = self.alerts.deactivate_tracking_links(identity_id).await?;
        if links > 0 {
            info!("Deactivated {} tracking link(s) for {}", links, identity_id);
        }

        if escalated {
            warn!(
                "Alert {} cancelled after the grace window ({}s)",
                alert.protocol_code, elapsed
            );
        }

        self.outbox.enqueue(OutboundTask::AlertResolved {
            alert_id: alert.id,
            protocol_code: alert.protocol_code.clone(),
            escalated,
        });

        Ok(alert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn cancel_inside_window_is_not_escalated() {
        let t0 = Utc::now();
        assert!(!is_escalated(t0, t0 + Duration::seconds(45)));
    }

    #[test]
    fn cancel_after_window_is_escalated() {
        let t0 = Utc::now();
        assert!(is_escalated(t0, t0 + Duration::seconds(61)));
    }

    #[test]
    fn exactly_sixty_seconds_is_not_escalated() {
        let t0 = Utc::now();
        assert!(!is_escalated(t0, t0 + Duration::seconds(60)));
    }

    #[test]
    fn protocol_code_carries_the_date() {
        let now = Utc.with_ymd_and_hms(2026, 8, 29, 12, 0, 0).unwrap();
        let code = generate_protocol_code(now);
        assert!(code.starts_with("AMP-20260829-"));
        assert_eq!(code.len(), "AMP-20260829-".len() + 6);
    }

    #[test]
    fn tracking_codes_are_short_and_distinct() {
        let a = generate_tracking_code();
        let b = generate_tracking_code();
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
    }
}
