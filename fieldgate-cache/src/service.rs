//! Permission resolver and cache.
//!
//! `PermissionService` is the single source of truth for "may the current user
//! do X". It loads the server-computed flat map, answers hierarchical queries
//! synchronously, and keeps a session-store copy to fall back on when the
//! backend is unreachable.
//!
//! # Example
//!
//! ```ignore
//! let service = PermissionService::builder(Arc::new(api))
//!     .with_store(Arc::new(FileSessionStore::new(dir)))
//!     .build();
//!
//! service.preload().await;
//! if service.has_permission("sites.detail.actions.test_meter") {
//!     // show the action
//! }
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use fieldgate_core::{
    resolve, ApiResult, BulkCheckRequest, BulkCheckResult, BulkUpdateRequest, Clock,
    CopyPermissionsRequest, PermissionApi, PermissionDependencies, PermissionGrant, PermissionMap,
    PermissionNode, PermissionSnapshot, SystemClock,
};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, error, info, warn};

use crate::freshness::{self, CacheStatus};
use crate::store::{self, MemorySessionStore, SessionStore};

/// Default time after which a network load is considered stale.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

type LoadFuture = Shared<BoxFuture<'static, ApiResult<PermissionSnapshot>>>;

/// A load that has been issued and not yet settled.
struct InFlight {
    generation: u64,
    future: LoadFuture,
}

struct CacheState {
    /// Replaced wholesale; readers clone the `Arc`.
    permissions: Arc<PermissionMap>,
    groups: Vec<String>,
    loaded: bool,
    /// Last successful network load. Fallback adoption leaves it alone.
    last_fetch: Option<DateTime<Utc>>,
    last_snapshot: Option<PermissionSnapshot>,
    in_flight: Option<InFlight>,
    /// Bumped by every issued load and by `clear_cache`. A load only applies
    /// its result while its generation is still current.
    generation: u64,
}

impl CacheState {
    fn empty() -> Self {
        Self {
            permissions: Arc::new(PermissionMap::new()),
            groups: Vec::new(),
            loaded: false,
            last_fetch: None,
            last_snapshot: None,
            in_flight: None,
            generation: 0,
        }
    }

    fn adopt(&mut self, snapshot: &PermissionSnapshot) {
        self.permissions = Arc::new(snapshot.permissions.clone());
        self.groups = snapshot.groups.clone();
        self.last_snapshot = Some(snapshot.clone());
        self.loaded = true;
    }

    /// Clear the in-flight slot if it still belongs to `generation`.
    fn settle(&mut self, generation: u64) {
        if self
            .in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.generation == generation)
        {
            self.in_flight = None;
        }
    }
}

struct Inner {
    api: Arc<dyn PermissionApi>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_fresh(&self, state: &CacheState, now: DateTime<Utc>) -> bool {
        state
            .last_fetch
            .is_some_and(|fetched| freshness::within_ttl(fetched, now, self.ttl))
    }

    /// Body of a single load. Runs once no matter how many callers share it.
    async fn fetch(self: Arc<Self>, generation: u64) -> ApiResult<PermissionSnapshot> {
        let result = self.api.my_permissions().await;
        let now = self.clock.now();

        match result {
            Ok(snapshot) => {
                if self.apply_network(generation, &snapshot, now) {
                    if let Err(e) = store::persist_snapshot(&*self.store, &snapshot, now) {
                        warn!(error = %e, "Failed to persist permissions to session store");
                    }
                    info!(
                        permissions = snapshot.permissions.len(),
                        groups = snapshot.groups.len(),
                        "UI permissions loaded"
                    );
                } else {
                    debug!(generation, "Discarding superseded permission load");
                }
                Ok(snapshot)
            }
            Err(err) => {
                warn!(error = %err, "Permission load failed, trying session fallback");
                match self.read_fallback(now) {
                    Some(snapshot) => {
                        self.apply_fallback(generation, &snapshot);
                        Ok(snapshot)
                    }
                    None => {
                        self.state().settle(generation);
                        Err(err)
                    }
                }
            }
        }
    }

    fn apply_network(
        &self,
        generation: u64,
        snapshot: &PermissionSnapshot,
        now: DateTime<Utc>,
    ) -> bool {
        let mut state = self.state();
        state.settle(generation);
        if state.generation != generation {
            return false;
        }
        state.adopt(snapshot);
        state.last_fetch = Some(now);
        true
    }

    fn apply_fallback(&self, generation: u64, snapshot: &PermissionSnapshot) {
        let mut state = self.state();
        state.settle(generation);
        if state.generation == generation {
            state.adopt(snapshot);
        }
    }

    fn read_fallback(&self, now: DateTime<Utc>) -> Option<PermissionSnapshot> {
        let persisted = match store::load_snapshot(&*self.store) {
            Ok(Some(persisted)) => persisted,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read cached permissions");
                return None;
            }
        };

        if freshness::within_ttl(persisted.written_at, now, self.ttl) {
            warn!(
                age_ms = freshness::age(persisted.written_at, now).as_millis() as u64,
                "Serving UI permissions from session fallback"
            );
            Some(persisted.snapshot)
        } else {
            debug!(written_at = %persisted.written_at, "Session fallback expired");
            None
        }
    }
}

/// Point-in-time view used to answer a batch of queries consistently.
struct Resolver {
    loaded: bool,
    permissions: Arc<PermissionMap>,
}

impl Resolver {
    fn check(&self, codename: &str) -> bool {
        if !self.loaded {
            warn!(codename, "Permissions not loaded; call load_permissions first");
            return false;
        }
        resolve(&self.permissions, codename).unwrap_or(false)
    }
}

/// Builder for [`PermissionService`].
pub struct PermissionServiceBuilder {
    api: Arc<dyn PermissionApi>,
    store: Option<Arc<dyn SessionStore>>,
    clock: Option<Arc<dyn Clock>>,
    ttl: Duration,
}

impl PermissionServiceBuilder {
    /// Session store for the load fallback. In-memory by default.
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn build(self) -> PermissionService {
        PermissionService {
            inner: Arc::new(Inner {
                api: self.api,
                store: self
                    .store
                    .unwrap_or_else(|| Arc::new(MemorySessionStore::new())),
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                ttl: self.ttl,
                state: Mutex::new(CacheState::empty()),
            }),
        }
    }
}

/// Hierarchical UI-permission resolver with a TTL cache.
///
/// Cheap to clone; clones share one cache. Build one per application and
/// hand it to whatever needs to gate UI.
#[derive(Clone)]
pub struct PermissionService {
    inner: Arc<Inner>,
}

impl PermissionService {
    /// Service with an in-memory session store, the system clock, and the
    /// default TTL.
    pub fn new(api: Arc<dyn PermissionApi>) -> Self {
        Self::builder(api).build()
    }

    pub fn builder(api: Arc<dyn PermissionApi>) -> PermissionServiceBuilder {
        PermissionServiceBuilder {
            api,
            store: None,
            clock: None,
            ttl: DEFAULT_TTL,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    // ------------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------------

    /// Load the permission snapshot.
    ///
    /// Without `force`, joins a load already in flight, or returns the last
    /// snapshot if the cache is still within its TTL. Otherwise issues one
    /// request. On failure a session-store copy younger than the TTL is
    /// adopted; if there is none the error is returned and the cache keeps
    /// whatever it had.
    pub async fn load_permissions(&self, force: bool) -> ApiResult<PermissionSnapshot> {
        let future = {
            let mut state = self.inner.state();
            let joined = match &state.in_flight {
                Some(in_flight) if !force => Some(in_flight.future.clone()),
                _ => None,
            };

            match joined {
                Some(future) => {
                    debug!("Joining in-flight permission load");
                    future
                }
                None => {
                    if !force && state.loaded && self.inner.is_fresh(&state, self.inner.clock.now())
                    {
                        if let Some(snapshot) = state.last_snapshot.clone() {
                            return Ok(snapshot);
                        }
                    }
                    self.issue_load(&mut state)
                }
            }
        };
        future.await
    }

    fn issue_load(&self, state: &mut CacheState) -> LoadFuture {
        state.generation += 1;
        let generation = state.generation;
        debug!(generation, "Fetching UI permissions");
        let future = Arc::clone(&self.inner).fetch(generation).boxed().shared();
        state.in_flight = Some(InFlight {
            generation,
            future: future.clone(),
        });
        future
    }

    /// Best-effort warm-up: load and log any failure.
    pub async fn preload(&self) {
        if let Err(e) = self.load_permissions(false).await {
            error!(error = %e, "Failed to preload UI permissions");
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.state().loaded
    }

    /// Current cache state. `Loading` means a load was issued and has not
    /// settled, not that a request is making progress.
    pub fn status(&self) -> CacheStatus {
        let state = self.inner.state();
        if state.in_flight.is_some() {
            CacheStatus::Loading
        } else if !state.loaded {
            CacheStatus::Empty
        } else if self.inner.is_fresh(&state, self.inner.clock.now()) {
            CacheStatus::Fresh
        } else {
            CacheStatus::Stale
        }
    }

    /// Time of the last successful network load.
    pub fn last_fetch(&self) -> Option<DateTime<Utc>> {
        self.inner.state().last_fetch
    }

    /// Groups reported by the last adopted snapshot.
    pub fn groups(&self) -> Vec<String> {
        self.inner.state().groups.clone()
    }

    /// Drop everything: map, loaded flag, in-flight load, and the session copy.
    pub fn clear_cache(&self) {
        {
            let mut state = self.inner.state();
            let generation = state.generation + 1;
            *state = CacheState::empty();
            state.generation = generation;
        }
        if let Err(e) = store::remove_snapshot(&*self.inner.store) {
            warn!(error = %e, "Failed to clear session store");
        }
        debug!("UI permission cache cleared");
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    fn resolver(&self) -> Resolver {
        let state = self.inner.state();
        Resolver {
            loaded: state.loaded,
            permissions: Arc::clone(&state.permissions),
        }
    }

    /// Exact key first, then the nearest proper prefix, else deny.
    pub fn has_permission(&self, codename: &str) -> bool {
        self.resolver().check(codename)
    }

    /// True if any codename is granted. Empty input denies.
    pub fn has_any_permission<I>(&self, codenames: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let resolver = self.resolver();
        codenames.into_iter().any(|c| resolver.check(c.as_ref()))
    }

    /// True if every codename is granted. Empty input grants.
    pub fn has_all_permissions<I>(&self, codenames: I) -> bool
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let resolver = self.resolver();
        codenames.into_iter().all(|c| resolver.check(c.as_ref()))
    }

    /// Owned copy of the current map.
    pub fn get_all_permissions(&self) -> PermissionMap {
        self.inner.state().permissions.as_ref().clone()
    }

    // ------------------------------------------------------------------------
    // Remote operations
    // ------------------------------------------------------------------------

    /// Ask the server to evaluate `codenames`, falling back to local
    /// resolution when the endpoint is unreachable.
    ///
    /// The server may apply rules the flat map does not know about, so the two
    /// paths can disagree.
    pub async fn check_bulk(&self, codenames: Vec<String>, check_all: bool) -> BulkCheckResult {
        let request = BulkCheckRequest {
            codenames,
            check_all,
        };
        match self.inner.api.check_bulk(&request).await {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Bulk permission check failed, evaluating locally");
                self.check_locally(&request)
            }
        }
    }

    fn check_locally(&self, request: &BulkCheckRequest) -> BulkCheckResult {
        let resolver = self.resolver();
        let permissions: PermissionMap = request
            .codenames
            .iter()
            .map(|c| (c.clone(), resolver.check(c)))
            .collect();

        if request.check_all {
            let has_all = permissions.values().all(|granted| *granted);
            BulkCheckResult {
                permissions,
                has_all: Some(has_all),
                has_any: None,
            }
        } else {
            let has_any = permissions.values().any(|granted| *granted);
            BulkCheckResult {
                permissions,
                has_all: None,
                has_any: Some(has_any),
            }
        }
    }

    pub async fn get_permission_tree(&self, group_id: Option<i64>) -> ApiResult<Vec<PermissionNode>> {
        self.inner.api.permission_tree(group_id).await
    }

    pub async fn get_permission_dependencies(
        &self,
        codename: &str,
    ) -> ApiResult<PermissionDependencies> {
        self.inner.api.permission_dependencies(codename).await
    }

    /// Submit grant changes for a group, then clear the cache so the next
    /// query reflects them. A failed write leaves the cache alone.
    pub async fn bulk_update_group_permissions(
        &self,
        group_id: i64,
        permissions: Vec<PermissionGrant>,
    ) -> ApiResult<()> {
        let request = BulkUpdateRequest {
            group_id,
            permissions,
        };
        self.inner.api.bulk_update_group_permissions(&request).await?;
        info!(
            group_id,
            changes = request.permissions.len(),
            "Group permissions updated"
        );
        self.clear_cache();
        Ok(())
    }

    /// Copy one group's grants onto another, then clear the cache.
    pub async fn copy_permissions(&self, from_group_id: i64, to_group_id: i64) -> ApiResult<()> {
        let request = CopyPermissionsRequest {
            from_group_id,
            to_group_id,
        };
        self.inner.api.copy_permissions(&request).await?;
        info!(from_group_id, to_group_id, "Group permissions copied");
        self.clear_cache();
        Ok(())
    }
}

impl std::fmt::Debug for PermissionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("PermissionService")
            .field("ttl", &self.inner.ttl)
            .field("loaded", &state.loaded)
            .field("permissions", &state.permissions.len())
            .field("last_fetch", &state.last_fetch)
            .field("in_flight", &state.in_flight.is_some())
            .finish()
    }
}
