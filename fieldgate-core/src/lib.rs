//! fieldgate Core - Permission Types and Contracts
//!
//! Data types shared by every fieldgate crate: the flat permission map, the
//! snapshot returned by the backend, admin DTOs, the hierarchical codename
//! walk, and the traits the cache is built against.

pub mod api;
pub mod clock;
pub mod codename;
pub mod error;
pub mod types;

pub use api::PermissionApi;
pub use clock::{Clock, SystemClock};
pub use codename::{proper_prefixes, resolve, ProperPrefixes};
pub use error::{ApiError, ApiResult};
pub use types::{
    BulkCheckRequest, BulkCheckResult, BulkUpdateRequest, CopyPermissionsRequest, DependencyEntry,
    PermissionDependencies, PermissionGrant, PermissionMap, PermissionNode, PermissionSnapshot,
};
