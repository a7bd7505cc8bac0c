//! Idempotent audio segment ingestion
//!
//! Uploads require an active monitoring session. When an ordinal index is
//! supplied, a prior segment at the same (session, index) short-circuits to
//! the existing record, so blind end-to-end retries are safe. The payload is
//! written to object storage before the metadata row; a storage failure
//! aborts the call with no row created.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::AudioSegment;
use crate::notify::{Outbox, OutboundTask};
use crate::repositories::{MonitoringRepository, SegmentRepository};
use crate::storage::{SegmentStore, object_key};

/// File extension used when the client does not report one
const DEFAULT_EXTENSION: &str = "m4a";

/// Segment upload parameters
#[derive(Debug, Clone, Default)]
pub struct SegmentUpload {
    pub device_id: Option<String>,
    pub ordinal: Option<i32>,
    pub duration_seconds: Option<f64>,
    pub size_bytes: Option<i64>,
    pub extension: Option<String>,
    pub payload: Option<Vec<u8>>,
}

/// Segment ingestor service
#[derive(Clone)]
pub struct SegmentIngestor {
    segments: SegmentRepository,
    monitoring: MonitoringRepository,
    store: SegmentStore,
    outbox: Outbox,
}

impl SegmentIngestor {
    /// Create a new segment ingestor
    pub fn new(
        segments: SegmentRepository,
        monitoring: MonitoringRepository,
        store: SegmentStore,
        outbox: Outbox,
    ) -> Self {
        Self {
            segments,
            monitoring,
            store,
            outbox,
        }
    }

    /// Ingest one segment for the caller's active monitoring session
    pub async fn ingest(&self, identity_id: Uuid, upload: SegmentUpload) -> ApiResult<AudioSegment> {
        let session = match &upload.device_id {
            Some(device_id) => self.monitoring.find_active(identity_id, device_id).await?,
            None => self.monitoring.find_active_any_device(identity_id).await?,
        }
        .ok_or(ApiError::SessionRequired)?;

        // Idempotency check first: a retried upload must not touch storage.
        if let Some(ordinal) = upload.ordinal {
            if let Some(existing) = self
                .segments
                .find_by_session_ordinal(session.id, ordinal)
                .await?
            {
                info!(
                    "Segment (session {}, ordinal {}) already stored; reusing {}",
                    session.id, ordinal, existing.id
                );
                return Ok(existing);
            }
        }

        let object_id = Uuid::new_v4();
        let extension = upload.extension.as_deref().unwrap_or(DEFAULT_EXTENSION);
        let storage_key = object_key(identity_id, Utc::now().date_naive(), object_id, extension);

        let size_bytes = upload
            .size_bytes
            .or_else(|| upload.payload.as_ref().map(|p| p.len() as i64));

        // The object must be durable before any metadata exists.
        if let Some(payload) = upload.payload {
            self.store.put(&storage_key, payload).await?;
        }

        let device_id = upload.device_id.as_deref().unwrap_or(&session.device_id);

        let inserted = self
            .segments
            .insert(
                session.id,
                device_id,
                upload.ordinal,
                &storage_key,
                upload.duration_seconds,
                size_bytes,
            )
            .await?;

        let segment = match inserted {
            Some(segment) => segment,
            None => {
                // Concurrent retry won the insert; its row is the record.
                let ordinal = upload
                    .ordinal
                    .ok_or_else(|| ApiError::Conflict("Segmento duplicado".to_string()))?;
                warn!(
                    "Duplicate upload raced on (session {}, ordinal {}); object {} orphaned",
                    session.id, ordinal, storage_key
                );
                self.segments
                    .find_by_session_ordinal(session.id, ordinal)
                    .await?
                    .ok_or_else(|| ApiError::NotFound("Segmento nao encontrado".to_string()))?
            }
        };

        self.outbox.enqueue(OutboundTask::TranscriptionRequested {
            segment_id: segment.id,
            storage_key: segment.storage_key.clone(),
        });

        Ok(segment)
    }
}
