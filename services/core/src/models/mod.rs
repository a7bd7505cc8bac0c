//! Data models for the coordination core

pub mod alert;
pub mod identity;
pub mod location;
pub mod monitoring;
pub mod segment;
pub mod session;

pub use alert::{AlertStatus, PanicAlert};
pub use identity::Identity;
pub use location::{DeviceStatus, LocationSample, MovementClass};
pub use monitoring::{MonitoringSession, MonitoringStatus, SessionOrigin};
pub use segment::AudioSegment;
pub use session::{IssuedTokens, RefreshCredential, Session};
