//! Action endpoint routing
//!
//! The device protocol is a single POST endpoint: one JSON body per call
//! carrying an `acao` discriminator, or a multipart body for binary audio.
//! Every response is a JSON envelope with a boolean `sucesso` field.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::auth::classify_credential;
use crate::error::ApiError;
use crate::locations::{HeartbeatReport, LocationReport};
use crate::middleware::Credential;
use crate::models::SessionOrigin;
use crate::monitoring::FinalizeOutcome;
use crate::rate_limiter::LimitedAction;
use crate::repositories::schedule::ScheduleEntry;
use crate::segments::SegmentUpload;
use crate::validation::{validate_coordinates, validate_device_id};

/// One schedule interval on the wire
#[derive(Debug, Deserialize)]
pub struct ScheduleEntryRequest {
    pub dia_semana: i16,
    pub inicio: String,
    pub fim: String,
}

/// The action discriminator and its parameters
#[derive(Debug, Deserialize)]
#[serde(tag = "acao")]
pub enum ActionRequest {
    #[serde(rename = "login")]
    Login {
        conta: String,
        senha: String,
    },
    #[serde(rename = "refresh")]
    Refresh { token_refresh: String },
    #[serde(rename = "logout")]
    Logout { token_sessao: String },
    #[serde(rename = "trocar_senha")]
    ChangePassword {
        token_sessao: String,
        senha_atual: String,
        senha_nova: String,
    },
    #[serde(rename = "definir_senha_coacao")]
    SetDuressPassword {
        token_sessao: String,
        senha_atual: String,
        senha_coacao: String,
    },
    #[serde(rename = "definir_agenda")]
    SetSchedule {
        token_sessao: String,
        agenda: Vec<ScheduleEntryRequest>,
    },
    #[serde(rename = "disparar_panico")]
    TriggerPanic {
        token_sessao: Option<String>,
        conta_id: Option<Uuid>,
        dispositivo: String,
        tipo_disparo: Option<String>,
        latitude: Option<f64>,
        longitude: Option<f64>,
    },
    #[serde(rename = "cancelar_panico")]
    CancelPanic {
        token_sessao: String,
        motivo: Option<String>,
    },
    #[serde(rename = "checkin_agenda")]
    ScheduleCheckin {
        token_sessao: Option<String>,
        conta_id: Option<Uuid>,
        dispositivo: String,
        fuso_minutos: i32,
    },
    #[serde(rename = "iniciar_monitoramento")]
    StartMonitoring {
        token_sessao: Option<String>,
        conta_id: Option<Uuid>,
        dispositivo: String,
        origem: SessionOrigin,
        duracao_minutos: Option<i64>,
    },
    #[serde(rename = "reportar_status_monitoramento")]
    ReportMonitoringStatus {
        token_sessao: Option<String>,
        conta_id: Option<Uuid>,
        dispositivo: String,
        status: String,
        motivo_parada: Option<String>,
    },
    #[serde(rename = "finalizar_monitoramento")]
    FinalizeMonitoring {
        token_sessao: String,
        sessao_id: Uuid,
        total_segmentos: i64,
    },
    #[serde(rename = "enviar_localizacao")]
    IngestLocation {
        token_sessao: Option<String>,
        conta_id: Option<Uuid>,
        dispositivo: String,
        latitude: f64,
        longitude: f64,
        precisao: Option<f64>,
        velocidade: Option<f64>,
        direcao: Option<f64>,
    },
    #[serde(rename = "heartbeat")]
    Heartbeat {
        token_sessao: Option<String>,
        conta_id: Option<Uuid>,
        dispositivo: String,
        bateria: Option<i32>,
        conectividade: Option<String>,
        monitorando: Option<bool>,
        gravando: Option<bool>,
        latitude: Option<f64>,
        longitude: Option<f64>,
        velocidade: Option<f64>,
    },
}

/// Create the router for the coordination core
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/v1/acao", post(action_endpoint))
        // Audio uploads run well past the default body limit.
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "amparo-core"
    }))
}

/// Success envelope
fn ok(dados: serde_json::Value) -> Response {
    (StatusCode::OK, Json(json!({ "sucesso": true, "dados": dados }))).into_response()
}

/// The single action endpoint. JSON bodies carry the discriminator
/// directly; multipart bodies are the binary audio path.
pub async fn action_endpoint(
    State(state): State<AppState>,
    req: Request,
) -> Result<Response, ApiError> {
    let is_multipart = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/form-data"))
        .unwrap_or(false);

    if is_multipart {
        let multipart = Multipart::from_request(req, &state)
            .await
            .map_err(|e| ApiError::Validation(e.to_string()))?;
        return upload_segment(state, multipart).await;
    }

    let Json(action) = Json::<ActionRequest>::from_request(req, &state)
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    dispatch(state, action).await
}

async fn dispatch(state: AppState, action: ActionRequest) -> Result<Response, ApiError> {
    match action {
        ActionRequest::Login { conta, senha } => login(state, conta, senha).await,
        ActionRequest::Refresh { token_refresh } => refresh(state, token_refresh).await,
        ActionRequest::Logout { token_sessao } => logout(state, token_sessao).await,
        ActionRequest::ChangePassword {
            token_sessao,
            senha_atual,
            senha_nova,
        } => change_password(state, token_sessao, senha_atual, senha_nova).await,
        ActionRequest::SetDuressPassword {
            token_sessao,
            senha_atual,
            senha_coacao,
        } => set_duress_password(state, token_sessao, senha_atual, senha_coacao).await,
        ActionRequest::SetSchedule {
            token_sessao,
            agenda,
        } => set_schedule(state, token_sessao, agenda).await,
        ActionRequest::TriggerPanic {
            token_sessao,
            conta_id,
            dispositivo,
            tipo_disparo,
            latitude,
            longitude,
        } => {
            trigger_panic(
                state,
                token_sessao,
                conta_id,
                dispositivo,
                tipo_disparo,
                latitude,
                longitude,
            )
            .await
        }
        ActionRequest::CancelPanic {
            token_sessao,
            motivo,
        } => cancel_panic(state, token_sessao, motivo).await,
        ActionRequest::ScheduleCheckin {
            token_sessao,
            conta_id,
            dispositivo,
            fuso_minutos,
        } => schedule_checkin(state, token_sessao, conta_id, dispositivo, fuso_minutos).await,
        ActionRequest::StartMonitoring {
            token_sessao,
            conta_id,
            dispositivo,
            origem,
            duracao_minutos,
        } => {
            start_monitoring(
                state,
                token_sessao,
                conta_id,
                dispositivo,
                origem,
                duracao_minutos,
            )
            .await
        }
        ActionRequest::ReportMonitoringStatus {
            token_sessao,
            conta_id,
            dispositivo,
            status,
            motivo_parada,
        } => {
            report_monitoring_status(
                state,
                token_sessao,
                conta_id,
                dispositivo,
                status,
                motivo_parada,
            )
            .await
        }
        ActionRequest::FinalizeMonitoring {
            token_sessao,
            sessao_id,
            total_segmentos,
        } => finalize_monitoring(state, token_sessao, sessao_id, total_segmentos).await,
        ActionRequest::IngestLocation {
            token_sessao,
            conta_id,
            dispositivo,
            latitude,
            longitude,
            precisao,
            velocidade,
            direcao,
        } => {
            ingest_location(
                state,
                token_sessao,
                conta_id,
                dispositivo,
                LocationReport {
                    latitude,
                    longitude,
                    accuracy: precisao,
                    speed: velocidade,
                    heading: direcao,
                },
            )
            .await
        }
        ActionRequest::Heartbeat {
            token_sessao,
            conta_id,
            dispositivo,
            bateria,
            conectividade,
            monitorando,
            gravando,
            latitude,
            longitude,
            velocidade,
        } => {
            let location = match (latitude, longitude) {
                (Some(lat), Some(lon)) => Some(LocationReport {
                    latitude: lat,
                    longitude: lon,
                    accuracy: None,
                    speed: velocidade,
                    heading: None,
                }),
                _ => None,
            };
            heartbeat(
                state,
                token_sessao,
                conta_id,
                dispositivo,
                HeartbeatReport {
                    battery_percent: bateria,
                    connectivity: conectividade,
                    monitoring: monitorando.unwrap_or(false),
                    recording: gravando.unwrap_or(false),
                    location,
                },
            )
            .await
        }
    }
}

async fn login(state: AppState, conta: String, senha: String) -> Result<Response, ApiError> {
    // The limiter runs before any credential comparison.
    state.rate_limiter.check(&conta, LimitedAction::Login).await?;

    let (identity, _outcome) = state.authenticator.authenticate(&conta, &senha).await?;
    let tokens = state.vault.issue(identity.id).await?;

    info!("Login for identity {}", identity.id);

    Ok(ok(json!({
        "conta_id": identity.id,
        "token_sessao": tokens.access_token,
        "sessao_expira_em": tokens.access_expires_at,
        "token_refresh": tokens.refresh_token,
        "refresh_expira_em": tokens.refresh_expires_at,
    })))
}

async fn refresh(state: AppState, token_refresh: String) -> Result<Response, ApiError> {
    let tokens = state.vault.rotate(&token_refresh).await?;

    Ok(ok(json!({
        "token_sessao": tokens.access_token,
        "sessao_expira_em": tokens.access_expires_at,
        "token_refresh": tokens.refresh_token,
        "refresh_expira_em": tokens.refresh_expires_at,
    })))
}

async fn logout(state: AppState, token_sessao: String) -> Result<Response, ApiError> {
    let identity_id = state.vault.validate(&token_sessao).await?;

    // Logging out while a panic is active would silently drop the alert's
    // session context; the client must cancel first.
    if state.alerts_repo.find_active(identity_id).await?.is_some() {
        return Err(ApiError::Conflict(
            "Logout bloqueado durante alerta de panico ativo".to_string(),
        ));
    }

    state.vault.revoke(&token_sessao).await?;

    Ok(ok(json!({})))
}

async fn change_password(
    state: AppState,
    token_sessao: String,
    senha_atual: String,
    senha_nova: String,
) -> Result<Response, ApiError> {
    let cred = Credential::Session(token_sessao);
    let identity = cred.resolve(&state.vault, &state.identities, false).await?;

    state
        .rate_limiter
        .check(&identity.id.to_string(), LimitedAction::ChangePassword)
        .await?;

    let outcome = classify_credential(&identity, &senha_atual)?.ok_or(ApiError::AuthFailed)?;

    state
        .authenticator
        .change_password(&identity, outcome, &senha_nova)
        .await?;

    // Identical response whether the change was real or faked under duress.
    Ok(ok(json!({})))
}

async fn set_duress_password(
    state: AppState,
    token_sessao: String,
    senha_atual: String,
    senha_coacao: String,
) -> Result<Response, ApiError> {
    let cred = Credential::Session(token_sessao);
    let identity = cred.resolve(&state.vault, &state.identities, false).await?;

    state
        .rate_limiter
        .check(&identity.id.to_string(), LimitedAction::SetDuressPassword)
        .await?;

    let outcome = classify_credential(&identity, &senha_atual)?.ok_or(ApiError::AuthFailed)?;

    state
        .authenticator
        .set_duress_password(&identity, outcome, &senha_coacao)
        .await?;

    Ok(ok(json!({})))
}

async fn set_schedule(
    state: AppState,
    token_sessao: String,
    agenda: Vec<ScheduleEntryRequest>,
) -> Result<Response, ApiError> {
    let cred = Credential::Session(token_sessao);
    let identity = cred.resolve(&state.vault, &state.identities, false).await?;

    let entries: Vec<ScheduleEntry> = agenda
        .into_iter()
        .map(|e| ScheduleEntry {
            weekday: e.dia_semana,
            start_time: e.inicio,
            end_time: e.fim,
        })
        .collect();

    crate::schedule::validate_entries(&entries).map_err(ApiError::Validation)?;

    state
        .schedules
        .replace_for_identity(identity.id, &entries)
        .await
        .map_err(ApiError::Internal)?;

    Ok(ok(json!({ "intervalos": entries.len() })))
}

async fn trigger_panic(
    state: AppState,
    token_sessao: Option<String>,
    conta_id: Option<Uuid>,
    dispositivo: String,
    tipo_disparo: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Result<Response, ApiError> {
    validate_device_id(&dispositivo).map_err(ApiError::Validation)?;

    let coordinates = match (latitude, longitude) {
        (Some(lat), Some(lon)) => {
            validate_coordinates(lat, lon).map_err(ApiError::Validation)?;
            Some((lat, lon))
        }
        (None, None) => None,
        _ => {
            return Err(ApiError::Validation(
                "Latitude e longitude devem vir juntas".to_string(),
            ));
        }
    };

    let cred = Credential::from_parts(token_sessao, conta_id)?;
    let identity = cred.resolve(&state.vault, &state.identities, true).await?;

    let alert = state
        .alerts
        .trigger(
            identity.id,
            &dispositivo,
            tipo_disparo.as_deref().unwrap_or("botao"),
            coordinates,
        )
        .await?;

    Ok(ok(json!({
        "alerta_id": alert.id,
        "protocolo": alert.protocol_code,
        "rastreamento": alert.tracking_code,
        "criado_em": alert.created_at,
    })))
}

async fn cancel_panic(
    state: AppState,
    token_sessao: String,
    motivo: Option<String>,
) -> Result<Response, ApiError> {
    let cred = Credential::Session(token_sessao);
    let identity = cred.resolve(&state.vault, &state.identities, false).await?;

    let alert = state.alerts.cancel(identity.id, motivo.as_deref()).await?;

    Ok(ok(json!({
        "alerta_id": alert.id,
        "protocolo": alert.protocol_code,
        "escalado": alert.escalated,
        "segundos_decorridos": alert.cancel_elapsed_seconds,
        "janela_selada": alert.window_sealed,
    })))
}

async fn schedule_checkin(
    state: AppState,
    token_sessao: Option<String>,
    conta_id: Option<Uuid>,
    dispositivo: String,
    fuso_minutos: i32,
) -> Result<Response, ApiError> {
    validate_device_id(&dispositivo).map_err(ApiError::Validation)?;

    let cred = Credential::from_parts(token_sessao, conta_id)?;
    let identity = cred.resolve(&state.vault, &state.identities, true).await?;

    let session = state
        .monitoring
        .check_in(identity.id, &dispositivo, fuso_minutos)
        .await?;

    match session {
        Some(session) => Ok(ok(json!({
            "sessao_id": session.id,
            "janela_inicio": session.window_start,
            "janela_fim": session.window_end,
        }))),
        None => Ok(ok(json!({ "sessao_id": null }))),
    }
}

async fn start_monitoring(
    state: AppState,
    token_sessao: Option<String>,
    conta_id: Option<Uuid>,
    dispositivo: String,
    origem: SessionOrigin,
    duracao_minutos: Option<i64>,
) -> Result<Response, ApiError> {
    validate_device_id(&dispositivo).map_err(ApiError::Validation)?;

    let cred = Credential::from_parts(token_sessao, conta_id)?;
    let identity = cred.resolve(&state.vault, &state.identities, true).await?;

    let session = state
        .monitoring
        .start_explicit(identity.id, &dispositivo, origem, duracao_minutos)
        .await?;

    Ok(ok(json!({
        "sessao_id": session.id,
        "janela_inicio": session.window_start,
        "janela_fim": session.window_end,
        "origem": session.origin,
    })))
}

async fn report_monitoring_status(
    state: AppState,
    token_sessao: Option<String>,
    conta_id: Option<Uuid>,
    dispositivo: String,
    status: String,
    motivo_parada: Option<String>,
) -> Result<Response, ApiError> {
    validate_device_id(&dispositivo).map_err(ApiError::Validation)?;

    let cred = Credential::from_parts(token_sessao, conta_id)?;
    let identity = cred.resolve(&state.vault, &state.identities, true).await?;

    let session = state
        .monitoring
        .report_status(identity.id, &dispositivo, &status, motivo_parada.as_deref())
        .await?;

    Ok(ok(json!({
        "sessao_id": session.id,
        "status": session.status,
        "motivo_selagem": session.sealed_reason,
    })))
}

async fn finalize_monitoring(
    state: AppState,
    token_sessao: String,
    sessao_id: Uuid,
    total_segmentos: i64,
) -> Result<Response, ApiError> {
    if total_segmentos < 0 {
        return Err(ApiError::Validation(
            "Total de segmentos invalido".to_string(),
        ));
    }

    let cred = Credential::Session(token_sessao);
    let identity = cred.resolve(&state.vault, &state.identities, false).await?;

    let outcome = state
        .monitoring
        .finalize(identity.id, sessao_id, total_segmentos)
        .await?;

    match outcome {
        FinalizeOutcome::Deleted => Ok(ok(json!({
            "sessao_id": sessao_id,
            "removida": true,
        }))),
        FinalizeOutcome::HandedOff(session) => Ok(ok(json!({
            "sessao_id": session.id,
            "removida": false,
            "status": session.status,
        }))),
    }
}

async fn ingest_location(
    state: AppState,
    token_sessao: Option<String>,
    conta_id: Option<Uuid>,
    dispositivo: String,
    report: LocationReport,
) -> Result<Response, ApiError> {
    validate_device_id(&dispositivo).map_err(ApiError::Validation)?;

    let cred = Credential::from_parts(token_sessao, conta_id)?;
    let identity = cred.resolve(&state.vault, &state.identities, true).await?;

    let sample = state
        .locations
        .ingest(identity.id, &dispositivo, report)
        .await?;

    Ok(ok(json!({
        "amostra_id": sample.id,
        "alerta_id": sample.alert_id,
    })))
}

async fn heartbeat(
    state: AppState,
    token_sessao: Option<String>,
    conta_id: Option<Uuid>,
    dispositivo: String,
    report: HeartbeatReport,
) -> Result<Response, ApiError> {
    validate_device_id(&dispositivo).map_err(ApiError::Validation)?;

    let cred = Credential::from_parts(token_sessao, conta_id)?;
    let identity = cred.resolve(&state.vault, &state.identities, true).await?;

    let status = state
        .locations
        .heartbeat(identity.id, &dispositivo, report)
        .await?;

    Ok(ok(json!({
        "dispositivo": status.device_id,
        "atualizado_em": status.updated_at,
    })))
}

/// Multipart segment upload: text fields carry the same parameters as the
/// JSON actions, `audio` carries the payload.
async fn upload_segment(state: AppState, mut multipart: Multipart) -> Result<Response, ApiError> {
    let mut token_sessao: Option<String> = None;
    let mut conta_id: Option<Uuid> = None;
    let mut upload = SegmentUpload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "acao" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                if value != "upload_segmento" {
                    return Err(ApiError::Validation(format!("Acao invalida: {}", value)));
                }
            }
            "token_sessao" => {
                token_sessao = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::Validation(e.to_string()))?,
                );
            }
            "conta_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                conta_id = Some(
                    value
                        .parse()
                        .map_err(|_| ApiError::Validation("conta_id invalido".to_string()))?,
                );
            }
            "dispositivo" => {
                upload.device_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::Validation(e.to_string()))?,
                );
            }
            "indice" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                upload.ordinal = Some(
                    value
                        .parse()
                        .map_err(|_| ApiError::Validation("indice invalido".to_string()))?,
                );
            }
            "duracao_segundos" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                upload.duration_seconds = Some(
                    value
                        .parse()
                        .map_err(|_| ApiError::Validation("duracao invalida".to_string()))?,
                );
            }
            "tamanho_bytes" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                upload.size_bytes = Some(
                    value
                        .parse()
                        .map_err(|_| ApiError::Validation("tamanho invalido".to_string()))?,
                );
            }
            "extensao" => {
                upload.extension = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::Validation(e.to_string()))?,
                );
            }
            "audio" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(e.to_string()))?;
                upload.payload = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    if let Some(device_id) = &upload.device_id {
        validate_device_id(device_id).map_err(ApiError::Validation)?;
    }

    let cred = Credential::from_parts(token_sessao, conta_id)?;
    let identity = cred.resolve(&state.vault, &state.identities, true).await?;

    let segment = state.segments.ingest(identity.id, upload).await?;

    Ok(ok(json!({
        "segmento_id": segment.id,
        "chave": segment.storage_key,
        "indice": segment.ordinal,
    })))
}
