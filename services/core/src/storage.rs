//! Durable object storage for audio segments

use anyhow::Result;
use aws_sdk_s3::{Client, primitives::ByteStream};
use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Bucket holding audio segment objects
    pub bucket: String,
}

impl StorageConfig {
    /// Create a StorageConfig from environment variables
    pub fn from_env() -> Self {
        Self {
            bucket: std::env::var("SEGMENT_BUCKET").unwrap_or_else(|_| "amparo-segments".to_string()),
        }
    }
}

/// Deterministic object key: `identity/date/object-id.ext`. Retried uploads
/// of the same logical segment always address the same object.
pub fn object_key(identity_id: Uuid, date: NaiveDate, object_id: Uuid, extension: &str) -> String {
    format!(
        "{}/{}/{}.{}",
        identity_id,
        date.format("%Y-%m-%d"),
        object_id,
        extension
    )
}

/// S3-backed segment store
#[derive(Clone)]
pub struct SegmentStore {
    client: Client,
    bucket: String,
}

impl SegmentStore {
    /// Create a segment store from the ambient AWS configuration
    pub async fn new(config: &StorageConfig) -> Self {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            client: Client::new(&aws_config),
            bucket: config.bucket.clone(),
        }
    }

    /// Write an object. Callers persist metadata only after this returns.
    pub async fn put(&self, key: &str, payload: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(payload))
            .send()
            .await?;

        info!("Stored segment object {}", key);
        Ok(())
    }

    /// Best-effort object delete, used when a zero-segment session is purged
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_is_identity_date_object() {
        let identity = Uuid::nil();
        let object = Uuid::nil();
        let date = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();

        let key = object_key(identity, date, object, "m4a");
        assert_eq!(
            key,
            format!("{}/2026-08-29/{}.m4a", Uuid::nil(), Uuid::nil())
        );
    }

    #[test]
    fn key_is_deterministic() {
        let identity = Uuid::new_v4();
        let object = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();

        assert_eq!(
            object_key(identity, date, object, "ogg"),
            object_key(identity, date, object, "ogg")
        );
    }
}
