//! Monitoring session lifecycle
//!
//! Sessions are created by schedule check-ins or explicit starts, with
//! idempotent reuse of the active session per (identity, device). Sealing
//! moves a session to `aguardando_finalizacao` for the external batch sweep;
//! a finalize reporting zero segments deletes the session and its objects
//! outright instead of handing it off.

use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{MonitoringSession, SessionOrigin};
use crate::repositories::{MonitoringRepository, ScheduleRepository, SegmentRepository};
use crate::schedule;
use crate::storage::SegmentStore;
use crate::validation::validate_utc_offset;

/// Client-reported statuses that seal the session on arrival
const TERMINATING_STATUSES: &[&str] = &["finalizada", "encerrada"];

/// Stop reasons that seal immediately; anything else leaves the session
/// active for the batch sweep.
const IMMEDIATE_SEAL_REASONS: &[&str] = &["parada_manual", "panico"];

/// Decide the seal reason for a status report, if it should seal at all
pub fn seal_reason_for_report(status: &str, stop_reason: Option<&str>) -> Option<String> {
    if TERMINATING_STATUSES.contains(&status) {
        return Some(stop_reason.unwrap_or(status).to_string());
    }

    if let Some(reason) = stop_reason {
        if IMMEDIATE_SEAL_REASONS.contains(&reason) {
            return Some(reason.to_string());
        }
    }

    None
}

/// Outcome of finalizing a session
#[derive(Debug)]
pub enum FinalizeOutcome {
    /// Zero segments reported: session and objects were purged
    Deleted,
    /// Session sealed and handed to the external finalization sweep
    HandedOff(MonitoringSession),
}

/// Monitoring scheduler service
#[derive(Clone)]
pub struct MonitoringScheduler {
    sessions: MonitoringRepository,
    schedules: ScheduleRepository,
    segments: SegmentRepository,
    store: SegmentStore,
    /// Window length for explicit starts, when the client gives none
    default_window_minutes: i64,
}

impl MonitoringScheduler {
    /// Create a new monitoring scheduler
    pub fn new(
        sessions: MonitoringRepository,
        schedules: ScheduleRepository,
        segments: SegmentRepository,
        store: SegmentStore,
    ) -> Self {
        Self {
            sessions,
            schedules,
            segments,
            store,
            default_window_minutes: 60,
        }
    }

    /// Periodic client check-in. Computes device-local time from the
    /// reported UTC offset, and starts (or reuses) a session when the local
    /// time falls inside a scheduled window. None means nothing is due.
    pub async fn check_in(
        &self,
        identity_id: Uuid,
        device_id: &str,
        utc_offset_minutes: i32,
    ) -> ApiResult<Option<MonitoringSession>> {
        validate_utc_offset(utc_offset_minutes).map_err(ApiError::Validation)?;

        let now = Utc::now();
        let weekday =
            schedule::local_weekday(now, utc_offset_minutes).map_err(ApiError::Validation)?;
        let entries = self.schedules.list_for_day(identity_id, weekday).await?;

        let window = schedule::resolve_window(&entries, now, utc_offset_minutes)
            .map_err(ApiError::Validation)?;

        let Some((window_start, window_end)) = window else {
            return Ok(None);
        };

        if let Some(existing) = self.sessions.find_active(identity_id, device_id).await? {
            return Ok(Some(existing));
        }

        let session = self
            .start_session(
                identity_id,
                device_id,
                window_start,
                window_end,
                SessionOrigin::Agendada,
            )
            .await?;

        Ok(Some(session))
    }

    /// Explicit session start. Reuses the active session for the same
    /// (identity, device) when one exists.
    pub async fn start_explicit(
        &self,
        identity_id: Uuid,
        device_id: &str,
        origin: SessionOrigin,
        duration_minutes: Option<i64>,
    ) -> ApiResult<MonitoringSession> {
        if let Some(existing) = self.sessions.find_active(identity_id, device_id).await? {
            return Ok(existing);
        }

        let now = Utc::now();
        let minutes = duration_minutes.unwrap_or(self.default_window_minutes);
        if minutes <= 0 || minutes > 8 * 60 {
            return Err(ApiError::Validation(
                "Duracao de monitoramento invalida".to_string(),
            ));
        }

        self.start_session(
            identity_id,
            device_id,
            now,
            now + Duration::minutes(minutes),
            origin,
        )
        .await
    }

    async fn start_session(
        &self,
        identity_id: Uuid,
        device_id: &str,
        window_start: chrono::DateTime<Utc>,
        window_end: chrono::DateTime<Utc>,
        origin: SessionOrigin,
    ) -> ApiResult<MonitoringSession> {
        let inserted = self
            .sessions
            .insert_active(identity_id, device_id, window_start, window_end, origin.as_str())
            .await?;

        match inserted {
            Some(session) => {
                info!(
                    "Monitoring session {} started for identity {} on {} ({})",
                    session.id,
                    identity_id,
                    device_id,
                    origin.as_str()
                );
                Ok(session)
            }
            None => {
                // Lost the race to a concurrent start: reuse the winner.
                self.sessions
                    .find_active(identity_id, device_id)
                    .await?
                    .ok_or_else(|| {
                        ApiError::NotFound("Sessao de monitoramento nao encontrada".to_string())
                    })
            }
        }
    }

    /// Handle a client status report for the device's active session
    pub async fn report_status(
        &self,
        identity_id: Uuid,
        device_id: &str,
        status: &str,
        stop_reason: Option<&str>,
    ) -> ApiResult<MonitoringSession> {
        let session = self
            .sessions
            .find_active(identity_id, device_id)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound("Nenhuma sessao de monitoramento ativa".to_string())
            })?;

        match seal_reason_for_report(status, stop_reason) {
            Some(reason) => {
                let sealed = self.sessions.seal(session.id, &reason).await?;
                // A concurrent seal already moved it; fetch the final row.
                match sealed {
                    Some(s) => Ok(s),
                    None => self
                        .sessions
                        .find_by_id(session.id)
                        .await?
                        .ok_or_else(|| {
                            ApiError::NotFound("Sessao de monitoramento nao encontrada".to_string())
                        }),
                }
            }
            None => Ok(session),
        }
    }

    /// Finalize a session after the client reports its total segment count.
    /// Zero segments means nothing worth keeping: the session, its segment
    /// rows, and their stored objects are removed outright.
    pub async fn finalize(
        &self,
        identity_id: Uuid,
        session_id: Uuid,
        total_segments: i64,
    ) -> ApiResult<FinalizeOutcome> {
        let session = self
            .sessions
            .find_by_id(session_id)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound("Sessao de monitoramento nao encontrada".to_string())
            })?;

        if session.identity_id != identity_id {
            return Err(ApiError::Conflict(
                "Sessao pertence a outra conta".to_string(),
            ));
        }

        let stored = self.segments.count_for_session(session_id).await?;
        if stored != total_segments {
            warn!(
                "Session {} client reports {} segment(s), {} stored",
                session_id, total_segments, stored
            );
        }

        if total_segments == 0 {
            let keys = self.segments.list_keys_for_session(session_id).await?;
            for key in &keys {
                if let Err(e) = self.store.delete(key).await {
                    warn!("Failed to delete orphan object {}: {:#}", key, e);
                }
            }

            self.sessions.delete(session_id).await?;
            info!(
                "Monitoring session {} purged (zero segments, {} orphan object(s))",
                session_id,
                keys.len()
            );

            return Ok(FinalizeOutcome::Deleted);
        }

        let sealed = self.sessions.seal(session_id, "finalizada").await?;
        let session = match sealed {
            Some(s) => s,
            None => session, // already sealed earlier; hand off as-is
        };

        Ok(FinalizeOutcome::HandedOff(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminating_status_seals() {
        assert_eq!(
            seal_reason_for_report("finalizada", None).as_deref(),
            Some("finalizada")
        );
    }

    #[test]
    fn manual_stop_seals_immediately() {
        assert_eq!(
            seal_reason_for_report("parando", Some("parada_manual")).as_deref(),
            Some("parada_manual")
        );
    }

    #[test]
    fn panic_stop_seals_immediately() {
        assert_eq!(
            seal_reason_for_report("parando", Some("panico")).as_deref(),
            Some("panico")
        );
    }

    #[test]
    fn other_stop_reasons_leave_session_active() {
        assert_eq!(seal_reason_for_report("parando", Some("bateria_baixa")), None);
        assert_eq!(seal_reason_for_report("gravando", None), None);
    }

    #[test]
    fn terminating_status_keeps_reported_reason() {
        assert_eq!(
            seal_reason_for_report("encerrada", Some("fim_de_janela")).as_deref(),
            Some("fim_de_janela")
        );
    }
}
