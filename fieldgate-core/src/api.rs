//! Backend contract consumed by the permission cache.

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::types::{
    BulkCheckRequest, BulkCheckResult, BulkUpdateRequest, CopyPermissionsRequest,
    PermissionDependencies, PermissionNode, PermissionSnapshot,
};

/// UI-permission endpoints of the dashboard backend.
///
/// Each method is exactly one network round-trip. Implementations do no
/// caching of their own; that is the cache layer's job.
#[async_trait]
pub trait PermissionApi: Send + Sync {
    /// `GET /users/ui-permissions/my-permissions/`
    async fn my_permissions(&self) -> ApiResult<PermissionSnapshot>;

    /// `POST /users/ui-permissions/check-bulk/`
    async fn check_bulk(&self, request: &BulkCheckRequest) -> ApiResult<BulkCheckResult>;

    /// `GET /users/ui-permissions/tree/`, optionally scoped to one group.
    async fn permission_tree(&self, group_id: Option<i64>) -> ApiResult<Vec<PermissionNode>>;

    /// `GET /users/ui-permissions/<codename>/dependencies/`
    async fn permission_dependencies(&self, codename: &str) -> ApiResult<PermissionDependencies>;

    /// `POST /users/group-ui-permissions/bulk-update/`
    async fn bulk_update_group_permissions(&self, request: &BulkUpdateRequest) -> ApiResult<()>;

    /// `POST /users/group-ui-permissions/copy-permissions/`
    async fn copy_permissions(&self, request: &CopyPermissionsRequest) -> ApiResult<()>;
}
