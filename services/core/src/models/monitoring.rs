//! Monitoring session model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Session lifecycle: `ativa` while recording, `aguardando_finalizacao` once
/// sealed for the external finalization sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitoringStatus {
    Ativa,
    AguardandoFinalizacao,
}

impl MonitoringStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitoringStatus::Ativa => "ativa",
            MonitoringStatus::AguardandoFinalizacao => "aguardando_finalizacao",
        }
    }
}

/// How a monitoring session came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOrigin {
    Automatica,
    Panico,
    Agendada,
    ComandoVoz,
    Manual,
}

impl SessionOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionOrigin::Automatica => "automatica",
            SessionOrigin::Panico => "panico",
            SessionOrigin::Agendada => "agendada",
            SessionOrigin::ComandoVoz => "comando_voz",
            SessionOrigin::Manual => "manual",
        }
    }
}

/// A bounded recording period tied to a device.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MonitoringSession {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub device_id: String,
    pub status: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub origin: String,
    pub sealed_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MonitoringSession {
    pub fn is_active(&self) -> bool {
        self.status == MonitoringStatus::Ativa.as_str()
    }
}
