//! fieldgate Test Utilities
//!
//! Shared test infrastructure for the fieldgate workspace:
//! - `ScriptedApi`: an in-process `PermissionApi` with scripted responses
//! - `ManualClock`: a clock tests move by hand
//! - Fixtures for the common permission maps
//! - Proptest generators for codenames and maps

pub use fieldgate_core::{
    ApiError, ApiResult, BulkCheckRequest, BulkCheckResult, BulkUpdateRequest, Clock,
    CopyPermissionsRequest, PermissionApi, PermissionDependencies, PermissionGrant, PermissionMap,
    PermissionNode, PermissionSnapshot,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

// ============================================================================
// SCRIPTED API
// ============================================================================

/// A gated `my_permissions` call waiting to be let through.
struct ParkedLoad {
    released: AtomicBool,
    gate: Semaphore,
}

impl ParkedLoad {
    fn new() -> Self {
        Self {
            released: AtomicBool::new(false),
            gate: Semaphore::new(0),
        }
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.gate.add_permits(1);
        }
    }
}

/// `PermissionApi` double with settable responses and call counters.
///
/// When gated, every `my_permissions` call parks until a test releases it,
/// either in call order ([`ScriptedApi::release_loads`]) or by call index
/// ([`ScriptedApi::release_load`]). A load's response is fixed when the call
/// is made: the next queued response if any, else the current load response.
pub struct ScriptedApi {
    load_response: Mutex<ApiResult<PermissionSnapshot>>,
    queued_loads: Mutex<VecDeque<ApiResult<PermissionSnapshot>>>,
    bulk_response: Mutex<ApiResult<BulkCheckResult>>,
    tree_response: Mutex<ApiResult<Vec<PermissionNode>>>,
    dependencies_response: Mutex<ApiResult<PermissionDependencies>>,
    write_response: Mutex<ApiResult<()>>,
    gated: bool,
    parked: Mutex<Vec<Arc<ParkedLoad>>>,
    load_calls: AtomicUsize,
    tree_calls: AtomicUsize,
    bulk_checks: Mutex<Vec<BulkCheckRequest>>,
    bulk_updates: Mutex<Vec<BulkUpdateRequest>>,
    copies: Mutex<Vec<CopyPermissionsRequest>>,
    tree_groups: Mutex<Vec<Option<i64>>>,
}

impl ScriptedApi {
    /// Every endpoint succeeds; loads return `snapshot`.
    pub fn new(snapshot: PermissionSnapshot) -> Self {
        Self {
            load_response: Mutex::new(Ok(snapshot)),
            queued_loads: Mutex::new(VecDeque::new()),
            bulk_response: Mutex::new(Ok(BulkCheckResult::default())),
            tree_response: Mutex::new(Ok(Vec::new())),
            dependencies_response: Mutex::new(Ok(PermissionDependencies::default())),
            write_response: Mutex::new(Ok(())),
            gated: false,
            parked: Mutex::new(Vec::new()),
            load_calls: AtomicUsize::new(0),
            tree_calls: AtomicUsize::new(0),
            bulk_checks: Mutex::new(Vec::new()),
            bulk_updates: Mutex::new(Vec::new()),
            copies: Mutex::new(Vec::new()),
            tree_groups: Mutex::new(Vec::new()),
        }
    }

    /// Every endpoint fails with a transport error.
    pub fn unreachable() -> Self {
        let api = Self::new(PermissionSnapshot::default());
        api.fail_everything(transport_error());
        api
    }

    /// Hold every `my_permissions` call until released.
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    /// Let the `count` oldest still-parked loads complete.
    pub fn release_loads(&self, count: usize) {
        let parked = self.parked.lock().unwrap();
        parked
            .iter()
            .filter(|load| !load.released.load(Ordering::SeqCst))
            .take(count)
            .for_each(|load| load.release());
    }

    /// Let the load made as call number `call` (zero-based) complete.
    pub fn release_load(&self, call: usize) {
        if let Some(load) = self.parked.lock().unwrap().get(call) {
            load.release();
        }
    }

    /// Response for the next `my_permissions` call only.
    pub fn queue_load_response(&self, response: ApiResult<PermissionSnapshot>) {
        self.queued_loads.lock().unwrap().push_back(response);
    }

    pub fn set_load_response(&self, response: ApiResult<PermissionSnapshot>) {
        *self.load_response.lock().unwrap() = response;
    }

    pub fn set_bulk_response(&self, response: ApiResult<BulkCheckResult>) {
        *self.bulk_response.lock().unwrap() = response;
    }

    pub fn set_tree_response(&self, response: ApiResult<Vec<PermissionNode>>) {
        *self.tree_response.lock().unwrap() = response;
    }

    pub fn set_dependencies_response(&self, response: ApiResult<PermissionDependencies>) {
        *self.dependencies_response.lock().unwrap() = response;
    }

    pub fn set_write_response(&self, response: ApiResult<()>) {
        *self.write_response.lock().unwrap() = response;
    }

    /// Make every endpoint return `err`.
    pub fn fail_everything(&self, err: ApiError) {
        self.set_load_response(Err(err.clone()));
        self.set_bulk_response(Err(err.clone()));
        self.set_tree_response(Err(err.clone()));
        self.set_dependencies_response(Err(err.clone()));
        self.set_write_response(Err(err));
    }

    pub fn load_calls(&self) -> usize {
        self.load_calls.load(Ordering::SeqCst)
    }

    pub fn bulk_checks(&self) -> Vec<BulkCheckRequest> {
        self.bulk_checks.lock().unwrap().clone()
    }

    pub fn tree_calls(&self) -> usize {
        self.tree_calls.load(Ordering::SeqCst)
    }

    pub fn bulk_updates(&self) -> Vec<BulkUpdateRequest> {
        self.bulk_updates.lock().unwrap().clone()
    }

    pub fn copies(&self) -> Vec<CopyPermissionsRequest> {
        self.copies.lock().unwrap().clone()
    }

    pub fn tree_groups(&self) -> Vec<Option<i64>> {
        self.tree_groups.lock().unwrap().clone()
    }
}

#[async_trait]
impl PermissionApi for ScriptedApi {
    async fn my_permissions(&self) -> ApiResult<PermissionSnapshot> {
        let queued = self.queued_loads.lock().unwrap().pop_front();
        let response = queued.unwrap_or_else(|| self.load_response.lock().unwrap().clone());

        let parked = self.gated.then(|| {
            let load = Arc::new(ParkedLoad::new());
            self.parked.lock().unwrap().push(Arc::clone(&load));
            load
        });
        self.load_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(load) = parked {
            load.gate
                .acquire()
                .await
                .map_err(|e| ApiError::Transport(e.to_string()))?
                .forget();
        }
        response
    }

    async fn check_bulk(&self, request: &BulkCheckRequest) -> ApiResult<BulkCheckResult> {
        self.bulk_checks.lock().unwrap().push(request.clone());
        self.bulk_response.lock().unwrap().clone()
    }

    async fn permission_tree(&self, group_id: Option<i64>) -> ApiResult<Vec<PermissionNode>> {
        self.tree_calls.fetch_add(1, Ordering::SeqCst);
        self.tree_groups.lock().unwrap().push(group_id);
        self.tree_response.lock().unwrap().clone()
    }

    async fn permission_dependencies(&self, _codename: &str) -> ApiResult<PermissionDependencies> {
        self.dependencies_response.lock().unwrap().clone()
    }

    async fn bulk_update_group_permissions(&self, request: &BulkUpdateRequest) -> ApiResult<()> {
        self.bulk_updates.lock().unwrap().push(request.clone());
        self.write_response.lock().unwrap().clone()
    }

    async fn copy_permissions(&self, request: &CopyPermissionsRequest) -> ApiResult<()> {
        self.copies.lock().unwrap().push(*request);
        self.write_response.lock().unwrap().clone()
    }
}

/// The error `ScriptedApi::unreachable` uses.
pub fn transport_error() -> ApiError {
    ApiError::Transport("connection refused".to_string())
}

// ============================================================================
// CLOCK
// ============================================================================

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Starts at 2024-01-01T00:00:00Z.
    pub fn at_epoch() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    pub fn advance(&self, by: Duration) {
        let delta = chrono::Duration::from_std(by).unwrap();
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Build a map from `(codename, granted)` pairs.
pub fn permission_map(entries: &[(&str, bool)]) -> PermissionMap {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Snapshot with the given grants, a `staff` group and a fixed timestamp.
pub fn snapshot_of(entries: &[(&str, bool)]) -> PermissionSnapshot {
    PermissionSnapshot::new(
        permission_map(entries),
        vec!["staff".to_string()],
        "2024-01-01T00:00:00Z",
    )
}

/// The jobs-module payload used throughout the resolver tests.
pub fn jobs_snapshot() -> PermissionSnapshot {
    snapshot_of(&[("jobs.module.root", true), ("jobs.detail.edit", false)])
}

/// A settings-console payload with a denied subtree and a leaf override.
pub fn settings_snapshot() -> PermissionSnapshot {
    snapshot_of(&[
        ("settings", true),
        ("sites.detail.actions", false),
        ("sites.detail.actions.view_history", true),
        ("holidays.approve", true),
    ])
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    use super::PermissionMap;
    use proptest::prelude::*;

    /// Dot-delimited codename of one to four short segments drawn from a tiny
    /// alphabet, so generated maps and queries overlap often.
    pub fn arb_codename() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-c]{1,2}", 1..5).prop_map(|segments| segments.join("."))
    }

    pub fn arb_permission_map() -> impl Strategy<Value = PermissionMap> {
        prop::collection::btree_map(arb_codename(), any::<bool>(), 0..16)
    }

    pub fn arb_codenames() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_codename(), 0..6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_epoch();
        let start = clock.now();
        clock.advance(Duration::from_secs(90));
        assert_eq!((clock.now() - start).num_seconds(), 90);
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::at_epoch();
        let later = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        clock.set(later);
        assert_eq!(clock.now(), later);
    }

    #[tokio::test]
    async fn test_queued_responses_are_used_in_order() {
        let api = ScriptedApi::new(snapshot_of(&[("default", true)]));
        api.queue_load_response(Ok(snapshot_of(&[("first", true)])));
        api.queue_load_response(Err(transport_error()));

        let first = api.my_permissions().await.unwrap();
        assert!(first.permissions.contains_key("first"));
        assert_eq!(api.my_permissions().await.unwrap_err(), transport_error());
        let fallback = api.my_permissions().await.unwrap();
        assert!(fallback.permissions.contains_key("default"));
        assert_eq!(api.load_calls(), 3);
    }

    #[tokio::test]
    async fn test_bulk_checks_are_recorded() {
        let api = ScriptedApi::new(snapshot_of(&[]));
        let request = BulkCheckRequest {
            codenames: vec!["a.b".to_string()],
            check_all: true,
        };
        api.check_bulk(&request).await.unwrap();
        assert_eq!(api.bulk_checks(), vec![request]);
    }

    #[test]
    fn test_fixtures() {
        let snapshot = jobs_snapshot();
        assert_eq!(snapshot.permissions.len(), 2);
        assert_eq!(snapshot.groups, vec!["staff".to_string()]);
    }
}
