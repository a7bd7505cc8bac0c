//! Repositories for database operations

pub mod alert;
pub mod audit;
pub mod device;
pub mod identity;
pub mod location;
pub mod monitoring;
pub mod rate_limit;
pub mod schedule;
pub mod segment;
pub mod session;

pub use alert::AlertRepository;
pub use audit::AuditRepository;
pub use device::DeviceRepository;
pub use identity::IdentityRepository;
pub use location::LocationRepository;
pub use monitoring::MonitoringRepository;
pub use rate_limit::RateLimitRepository;
pub use schedule::ScheduleRepository;
pub use segment::SegmentRepository;
pub use session::SessionRepository;
