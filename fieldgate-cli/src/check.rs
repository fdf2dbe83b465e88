//! The `check` subcommand's decision.

use fieldgate_cache::PermissionService;
use fieldgate_core::PermissionMap;

/// How several codenames combine into one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    Any,
    All,
}

/// Per-codename answers plus the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub results: PermissionMap,
    pub granted: bool,
}

impl CheckOutcome {
    /// Process exit status: 0 when granted, 1 when denied.
    pub fn exit_status(&self) -> u8 {
        if self.granted {
            0
        } else {
            1
        }
    }
}

/// Load (best effort) and evaluate `codenames`.
///
/// Locally the cached map decides. With `remote` the bulk-check endpoint
/// decides; when its answer lacks the aggregate for `mode`, the returned
/// per-codename results are folded instead.
pub async fn run_check(
    service: &PermissionService,
    codenames: Vec<String>,
    mode: CheckMode,
    remote: bool,
) -> CheckOutcome {
    service.preload().await;
    if remote {
        check_remote(service, codenames, mode).await
    } else {
        check_local(service, &codenames, mode)
    }
}

fn check_local(service: &PermissionService, codenames: &[String], mode: CheckMode) -> CheckOutcome {
    let results: PermissionMap = codenames
        .iter()
        .map(|c| (c.clone(), service.has_permission(c)))
        .collect();
    let granted = match mode {
        CheckMode::All => service.has_all_permissions(codenames),
        CheckMode::Any => service.has_any_permission(codenames),
    };
    CheckOutcome { results, granted }
}

async fn check_remote(
    service: &PermissionService,
    codenames: Vec<String>,
    mode: CheckMode,
) -> CheckOutcome {
    let result = service.check_bulk(codenames, mode == CheckMode::All).await;
    let granted = match mode {
        CheckMode::All => result
            .has_all
            .unwrap_or_else(|| result.permissions.values().all(|g| *g)),
        CheckMode::Any => result
            .has_any
            .unwrap_or_else(|| result.permissions.values().any(|g| *g)),
    };
    CheckOutcome {
        results: result.permissions,
        granted,
    }
}
