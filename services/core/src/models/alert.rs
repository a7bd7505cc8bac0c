//! Panic alert model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Alert lifecycle: `ativo` until cancelled, then terminally `cancelado`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertStatus {
    Ativo,
    Cancelado,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Ativo => "ativo",
            AlertStatus::Cancelado => "cancelado",
        }
    }
}

/// An active-emergency record with a human-readable protocol code.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PanicAlert {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub device_id: String,
    pub status: String,
    pub protocol_code: String,
    pub trigger_type: String,
    pub tracking_code: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub cancel_elapsed_seconds: Option<i64>,
    pub escalated: bool,
    pub guardians_notified: bool,
    pub window_sealed: bool,
}

impl PanicAlert {
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Ativo.as_str()
    }
}
