//! fieldgate Cache - Permission Resolution
//!
//! `PermissionService` loads the flat permission map, answers hierarchical
//! codename queries against it, and keeps a session-store copy to fall back
//! on while the backend is unreachable.

pub mod freshness;
pub mod guard;
pub mod service;
pub mod store;

pub use freshness::CacheStatus;
pub use guard::{Access, Requirement};
pub use service::{PermissionService, PermissionServiceBuilder, DEFAULT_TTL};
pub use store::{
    FileSessionStore, MemorySessionStore, PersistedSnapshot, SessionStore, StoreError,
    SNAPSHOT_KEY, TIMESTAMP_KEY,
};
