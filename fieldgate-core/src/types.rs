//! Wire and domain types for UI permissions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flat codename → grant map as computed by the server.
pub type PermissionMap = BTreeMap<String, bool>;

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Payload of `GET /users/ui-permissions/my-permissions/`.
///
/// Also the value persisted to the session store as the load fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSnapshot {
    #[serde(default)]
    pub permissions: PermissionMap,
    /// Groups the current user belongs to. Informational only.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Server-side timestamp, kept verbatim.
    #[serde(default)]
    pub cached_at: String,
}

impl PermissionSnapshot {
    pub fn new(permissions: PermissionMap, groups: Vec<String>, cached_at: impl Into<String>) -> Self {
        Self {
            permissions,
            groups,
            cached_at: cached_at.into(),
        }
    }
}

// ============================================================================
// ADMIN TREE
// ============================================================================

/// Node of the hierarchical permission definition used by admin editors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionNode {
    pub id: i64,
    pub codename: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_granted: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PermissionNode>,
}

impl PermissionNode {
    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(PermissionNode::subtree_len).sum::<usize>()
    }
}

/// One side of a dependency relation between permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub codename: String,
    pub name: String,
    #[serde(default)]
    pub is_granted: bool,
}

/// Payload of `GET /users/ui-permissions/<codename>/dependencies/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDependencies {
    #[serde(default)]
    pub depends_on: Vec<DependencyEntry>,
    #[serde(default)]
    pub required_by: Vec<DependencyEntry>,
}

// ============================================================================
// REQUESTS / RESPONSES
// ============================================================================

/// Body of `POST /users/ui-permissions/check-bulk/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCheckRequest {
    pub codenames: Vec<String>,
    pub check_all: bool,
}

/// Result of a bulk check, from the server or evaluated locally.
///
/// Exactly one of `has_all` / `has_any` is set when evaluated locally,
/// depending on the requested mode. The server may set either or both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkCheckResult {
    #[serde(default)]
    pub permissions: PermissionMap,
    #[serde(rename = "hasAll", default, skip_serializing_if = "Option::is_none")]
    pub has_all: Option<bool>,
    #[serde(rename = "hasAny", default, skip_serializing_if = "Option::is_none")]
    pub has_any: Option<bool>,
}

/// Single grant change submitted by a bulk update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub codename: String,
    pub is_granted: bool,
}

impl PermissionGrant {
    pub fn new(codename: impl Into<String>, is_granted: bool) -> Self {
        Self {
            codename: codename.into(),
            is_granted,
        }
    }
}

/// Body of `POST /users/group-ui-permissions/bulk-update/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUpdateRequest {
    pub group_id: i64,
    pub permissions: Vec<PermissionGrant>,
}

/// Body of `POST /users/group-ui-permissions/copy-permissions/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyPermissionsRequest {
    pub from_group_id: i64,
    pub to_group_id: i64,
}
