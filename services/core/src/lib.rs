//! Coordination core for the personal-protection backend: credentials and
//! sessions, panic alerts, scheduled audio monitoring, segment ingestion,
//! and location tracking behind a single action endpoint.

use sqlx::PgPool;

pub mod alerts;
pub mod auth;
pub mod error;
pub mod locations;
pub mod middleware;
pub mod models;
pub mod monitoring;
pub mod notify;
pub mod rate_limiter;
pub mod repositories;
pub mod routes;
pub mod schedule;
pub mod segments;
pub mod storage;
pub mod tokens;
pub mod validation;

use crate::alerts::AlertCoordinator;
use crate::auth::Authenticator;
use crate::locations::LocationTracker;
use crate::monitoring::MonitoringScheduler;
use crate::notify::Outbox;
use crate::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::repositories::{
    AlertRepository, AuditRepository, DeviceRepository, IdentityRepository, LocationRepository,
    MonitoringRepository, RateLimitRepository, ScheduleRepository, SegmentRepository,
    SessionRepository,
};
use crate::segments::SegmentIngestor;
use crate::storage::SegmentStore;
use crate::tokens::{TokenConfig, TokenVault};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub identities: IdentityRepository,
    pub alerts_repo: AlertRepository,
    pub schedules: ScheduleRepository,
    pub vault: TokenVault,
    pub authenticator: Authenticator,
    pub rate_limiter: RateLimiter,
    pub alerts: AlertCoordinator,
    pub monitoring: MonitoringScheduler,
    pub segments: SegmentIngestor,
    pub locations: LocationTracker,
}

impl AppState {
    /// Wire every repository and service on top of one pool, a segment
    /// store, and a running outbound dispatcher.
    pub fn new(pool: PgPool, store: SegmentStore, outbox: Outbox) -> Self {
        let identities = IdentityRepository::new(pool.clone());
        let sessions = SessionRepository::new(pool.clone());
        let attempts = RateLimitRepository::new(pool.clone());
        let audit = AuditRepository::new(pool.clone());
        let alert_repo = AlertRepository::new(pool.clone());
        let monitoring_repo = MonitoringRepository::new(pool.clone());
        let segment_repo = SegmentRepository::new(pool.clone());
        let location_repo = LocationRepository::new(pool.clone());
        let device_repo = DeviceRepository::new(pool.clone());
        let schedule_repo = ScheduleRepository::new(pool.clone());

        let vault = TokenVault::new(sessions, TokenConfig::from_env());
        let authenticator = Authenticator::new(identities.clone(), audit);
        let rate_limiter = RateLimiter::new(attempts, RateLimiterConfig::from_env());

        let alerts = AlertCoordinator::new(
            identities.clone(),
            alert_repo.clone(),
            location_repo.clone(),
            monitoring_repo.clone(),
            outbox.clone(),
        );
        let monitoring = MonitoringScheduler::new(
            monitoring_repo.clone(),
            schedule_repo.clone(),
            segment_repo.clone(),
            store.clone(),
        );
        let segments = SegmentIngestor::new(segment_repo, monitoring_repo, store, outbox);
        let locations = LocationTracker::new(location_repo, alert_repo.clone(), device_repo);

        Self {
            db_pool: pool,
            identities,
            alerts_repo: alert_repo,
            schedules: schedule_repo,
            vault,
            authenticator,
            rate_limiter,
            alerts,
            monitoring,
            segments,
            locations,
        }
    }
}
