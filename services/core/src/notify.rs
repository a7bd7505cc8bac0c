//! Outbound notification queue
//!
//! External side effects (guardian messaging, emergency-voice dispatch,
//! transcription triggers) go through an explicit in-process queue with
//! at-most-once semantics: tasks are dispatched once, never retried, and a
//! failure is logged without ever rolling back the state transition that
//! produced it.

use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{Identity, LocationSample, MovementClass, PanicAlert};

/// Notification dispatcher configuration
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    /// Guardian messaging webhook
    pub guardian_url: Option<String>,
    /// Emergency-voice dispatch endpoint
    pub voice_url: Option<String>,
    /// Transcription/analysis pipeline trigger endpoint
    pub transcription_url: Option<String>,
}

impl NotifyConfig {
    /// Create a NotifyConfig from environment variables. Unset URLs disable
    /// the corresponding dispatcher.
    pub fn from_env() -> Self {
        Self {
            guardian_url: std::env::var("GUARDIAN_WEBHOOK_URL").ok(),
            voice_url: std::env::var("VOICE_DISPATCH_URL").ok(),
            transcription_url: std::env::var("TRANSCRIPTION_TRIGGER_URL").ok(),
        }
    }
}

/// Structured context handed to the emergency-voice dispatcher. Only
/// confirmed facts go in: the movement class is omitted when no recent
/// speed supports one.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchContext {
    pub protocol_code: String,
    pub tracking_code: String,
    pub masked_account: String,
    pub masked_phone: Option<String>,
    pub aggressor_description: Option<String>,
    pub last_latitude: Option<f64>,
    pub last_longitude: Option<f64>,
    pub movement_class: Option<String>,
}

/// Build the voice-dispatch context from what is actually known
pub fn build_dispatch_context(
    identity: &Identity,
    alert: &PanicAlert,
    last_sample: Option<&LocationSample>,
) -> DispatchContext {
    let (last_latitude, last_longitude) = match last_sample {
        Some(sample) => (Some(sample.latitude), Some(sample.longitude)),
        None => (alert.latitude, alert.longitude),
    };

    let movement_class = last_sample
        .and_then(|s| s.speed)
        .map(|speed| MovementClass::from_speed(speed).as_str().to_string());

    DispatchContext {
        protocol_code: alert.protocol_code.clone(),
        tracking_code: alert.tracking_code.clone(),
        masked_account: mask_account(&identity.account_code),
        masked_phone: identity.masked_phone(),
        aggressor_description: None,
        last_latitude,
        last_longitude,
        movement_class,
    }
}

fn mask_account(account_code: &str) -> String {
    // Count and slice by characters; account codes are not guaranteed ASCII.
    let chars = account_code.chars().count();
    if chars <= 3 {
        "*".repeat(chars)
    } else {
        let prefix: String = account_code.chars().take(3).collect();
        format!("{}***", prefix)
    }
}

/// A queued outbound task
#[derive(Debug, Clone)]
pub enum OutboundTask {
    /// Message the account's guardians about a new alert
    GuardianAlert {
        alert_id: Uuid,
        protocol_code: String,
        tracking_code: String,
        latitude: Option<f64>,
        longitude: Option<f64>,
    },
    /// Place the automated emergency-voice call
    VoiceDispatch { context: DispatchContext },
    /// Tell guardians an alert was resolved
    AlertResolved {
        alert_id: Uuid,
        protocol_code: String,
        escalated: bool,
    },
    /// Hand a stored segment to the transcription pipeline
    TranscriptionRequested { segment_id: Uuid, storage_key: String },
}

/// Handle for enqueueing outbound tasks. Enqueueing never blocks and never
/// fails the caller.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<OutboundTask>,
}

impl Outbox {
    /// Queue a task for dispatch
    pub fn enqueue(&self, task: OutboundTask) {
        if self.tx.send(task).is_err() {
            error!("Outbound dispatcher is gone; notification dropped");
        }
    }
}

/// Spawn the dispatcher worker and return its enqueue handle
pub fn spawn_dispatcher(config: NotifyConfig) -> Outbox {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundTask>();
    let client = reqwest::Client::new();

    tokio::spawn(async move {
        while let Some(task) = rx.recv().await {
            if let Err(e) = dispatch(&client, &config, &task).await {
                // At-most-once: log and move on, no retry.
                error!("Outbound dispatch failed: {:#}", e);
            }
        }
    });

    Outbox { tx }
}

async fn dispatch(
    client: &reqwest::Client,
    config: &NotifyConfig,
    task: &OutboundTask,
) -> anyhow::Result<()> {
    match task {
        OutboundTask::GuardianAlert {
            alert_id,
            protocol_code,
            tracking_code,
            latitude,
            longitude,
        } => {
            let Some(url) = &config.guardian_url else {
                info!("Guardian dispatcher disabled; skipping alert {}", alert_id);
                return Ok(());
            };
            client
                .post(url)
                .json(&json!({
                    "tipo": "panico",
                    "protocolo": protocol_code,
                    "rastreamento": tracking_code,
                    "latitude": latitude,
                    "longitude": longitude,
                }))
                .send()
                .await?
                .error_for_status()?;
            info!("Guardian alert dispatched for {}", protocol_code);
        }
        OutboundTask::VoiceDispatch { context } => {
            let Some(url) = &config.voice_url else {
                info!(
                    "Voice dispatcher disabled; skipping {}",
                    context.protocol_code
                );
                return Ok(());
            };
            client.post(url).json(context).send().await?.error_for_status()?;
            info!("Voice dispatch placed for {}", context.protocol_code);
        }
        OutboundTask::AlertResolved {
            alert_id,
            protocol_code,
            escalated,
        } => {
            let Some(url) = &config.guardian_url else {
                info!("Guardian dispatcher disabled; skipping resolve {}", alert_id);
                return Ok(());
            };
            client
                .post(url)
                .json(&json!({
                    "tipo": "resolvido",
                    "protocolo": protocol_code,
                    "escalado": escalated,
                }))
                .send()
                .await?
                .error_for_status()?;
            info!("Resolution notice dispatched for {}", protocol_code);
        }
        OutboundTask::TranscriptionRequested {
            segment_id,
            storage_key,
        } => {
            let Some(url) = &config.transcription_url else {
                return Ok(());
            };
            client
                .post(url)
                .json(&json!({
                    "segmento": segment_id,
                    "chave": storage_key,
                }))
                .send()
                .await?
                .error_for_status()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            account_code: "AC-20931".to_string(),
            phone: Some("+5511912345678".to_string()),
            password_hash: "x".to_string(),
            duress_password_hash: None,
            status: "ativo".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn alert() -> PanicAlert {
        PanicAlert {
            id: Uuid::new_v4(),
            identity_id: Uuid::new_v4(),
            device_id: "dev-1".to_string(),
            status: "ativo".to_string(),
            protocol_code: "AMP-20260829-001234".to_string(),
            trigger_type: "botao".to_string(),
            tracking_code: "TRK12345".to_string(),
            latitude: Some(-23.55),
            longitude: Some(-46.63),
            created_at: Utc::now(),
            cancelled_at: None,
            cancel_reason: None,
            cancel_elapsed_seconds: None,
            escalated: false,
            guardians_notified: false,
            window_sealed: false,
        }
    }

    fn sample(speed: Option<f64>) -> LocationSample {
        LocationSample {
            id: Uuid::new_v4(),
            identity_id: Uuid::new_v4(),
            device_id: "dev-1".to_string(),
            alert_id: None,
            latitude: -23.56,
            longitude: -46.64,
            accuracy: Some(5.0),
            speed,
            heading: None,
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn context_masks_identity_fields() {
        let ctx = build_dispatch_context(&identity(), &alert(), None);
        assert_eq!(ctx.masked_account, "AC-***");
        assert_eq!(ctx.masked_phone.as_deref(), Some("*********5678"));
    }

    #[test]
    fn context_masks_multibyte_account_codes() {
        let mut id = identity();
        id.account_code = "éé-20931".to_string();
        let ctx = build_dispatch_context(&id, &alert(), None);
        assert_eq!(ctx.masked_account, "éé-***");
    }

    #[test]
    fn short_account_codes_mask_entirely() {
        let mut id = identity();
        id.account_code = "éé".to_string();
        let ctx = build_dispatch_context(&id, &alert(), None);
        assert_eq!(ctx.masked_account, "**");
    }

    #[test]
    fn context_without_speed_asserts_no_movement_class() {
        let s = sample(None);
        let ctx = build_dispatch_context(&identity(), &alert(), Some(&s));
        assert!(ctx.movement_class.is_none());
    }

    #[test]
    fn context_with_vehicle_speed_says_vehicle() {
        let s = sample(Some(20.0));
        let ctx = build_dispatch_context(&identity(), &alert(), Some(&s));
        assert_eq!(ctx.movement_class.as_deref(), Some("vehicle"));
    }

    #[test]
    fn context_prefers_latest_sample_coordinates() {
        let s = sample(Some(0.0));
        let ctx = build_dispatch_context(&identity(), &alert(), Some(&s));
        assert_eq!(ctx.last_latitude, Some(-23.56));
    }

    #[test]
    fn context_falls_back_to_alert_coordinates() {
        let ctx = build_dispatch_context(&identity(), &alert(), None);
        assert_eq!(ctx.last_latitude, Some(-23.55));
    }
}
