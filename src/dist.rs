//! Distributed rank coordination
//!
//! One process per accelerator device, coordinated through a collective
//! barrier. Export and import are guarded by rank-zero-first regions: the
//! designated rank performs the side effect while its peers wait at the
//! barrier before the region, and rank zero waits at the barrier after it.
//! Without an initialized backend both regions reduce to direct execution.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("RANK is set but the distributed backend is not initialized")]
    RankWithoutBackend,
}

/// Rank assignment for the current process, taken from the launcher
/// environment. `-1` means "no distributed context".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankEnv {
    pub local_rank: i32,
    pub global_rank: i32,
    /// Whether the global rank variable was explicitly set. An explicitly
    /// assigned rank without an initialized backend is a launcher
    /// misconfiguration and must fail immediately.
    pub rank_var_set: bool,
}

impl RankEnv {
    pub fn from_env() -> Self {
        let local_rank = read_rank("LOCAL_RANK").unwrap_or(-1);
        let global = read_rank("RANK");
        Self {
            local_rank,
            global_rank: global.unwrap_or(local_rank),
            rank_var_set: global.is_some(),
        }
    }

    /// Single-process environment, no distributed context.
    pub fn standalone() -> Self {
        Self {
            local_rank: -1,
            global_rank: -1,
            rank_var_set: false,
        }
    }

    /// Explicit ranks, as assigned by a launcher.
    pub fn with_ranks(local_rank: i32, global_rank: i32) -> Self {
        Self {
            local_rank,
            global_rank,
            rank_var_set: true,
        }
    }

    /// Is this process the designated one across the whole job?
    pub fn is_global_zero(&self) -> bool {
        matches!(self.global_rank, -1 | 0)
    }

    /// Is this process the designated one on its machine?
    pub fn is_local_zero(&self) -> bool {
        matches!(self.local_rank, -1 | 0)
    }
}

fn read_rank(var: &str) -> Option<i32> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

/// Collective barrier over all processes of the job. Implementations must
/// release only once every participating rank has arrived.
pub trait DistBackend: Send + Sync {
    fn is_initialized(&self) -> bool;
    fn barrier(&self);
}

/// The single-process fallback: never initialized, barriers are no-ops.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDist;

impl DistBackend for NoDist {
    fn is_initialized(&self) -> bool {
        false
    }

    fn barrier(&self) {}
}

/// Shared-memory backend for same-machine tests: wraps `std::sync::Barrier`
/// across the participating threads.
pub struct ThreadBackend {
    barrier: std::sync::Arc<std::sync::Barrier>,
}

impl ThreadBackend {
    pub fn new(barrier: std::sync::Arc<std::sync::Barrier>) -> Self {
        Self { barrier }
    }
}

impl DistBackend for ThreadBackend {
    fn is_initialized(&self) -> bool {
        true
    }

    fn barrier(&self) {
        self.barrier.wait();
    }
}

/// Run `body` inside a global-rank-zero-first region. Every rank executes
/// the body; the body itself gates its side effect on `env.is_global_zero()`.
pub fn global_rank_zero_first<T>(
    env: &RankEnv,
    backend: &dyn DistBackend,
    body: impl FnOnce() -> T,
) -> Result<T, CoordinationError> {
    rank_zero_first(env, backend, env.global_rank, body)
}

/// Run `body` inside a local-rank-zero-first region, scoped to the ranks
/// sharing this machine's filesystem.
pub fn local_rank_zero_first<T>(
    env: &RankEnv,
    backend: &dyn DistBackend,
    body: impl FnOnce() -> T,
) -> Result<T, CoordinationError> {
    rank_zero_first(env, backend, env.local_rank, body)
}

fn rank_zero_first<T>(
    env: &RankEnv,
    backend: &dyn DistBackend,
    rank: i32,
    body: impl FnOnce() -> T,
) -> Result<T, CoordinationError> {
    if !backend.is_initialized() {
        if env.rank_var_set {
            return Err(CoordinationError::RankWithoutBackend);
        }
        return Ok(body());
    }

    if !matches!(rank, -1 | 0) {
        backend.barrier();
    }
    let result = body();
    if rank == 0 {
        backend.barrier();
    }
    Ok(result)
}
