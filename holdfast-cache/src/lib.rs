//! Holdfast Cache - Two-Tier Caching
//!
//! A fast in-memory tier in front of a durable persistent tier, with an
//! orchestrator that coordinates both around a slow upstream provider.
//! The persistent tier is backend-agnostic; JSON-file and LMDB backends
//! are included.

pub mod backend;
pub mod fs;
pub mod lmdb;
pub mod memory;
pub mod orchestrator;
pub mod persistent;

pub use backend::{BackendError, StorageBackend};
pub use fs::FsBackend;
pub use lmdb::{LmdbBackend, DEFAULT_MAP_SIZE_MB};
pub use memory::{MemoryCache, MemoryCacheStats};
pub use orchestrator::{
    spawn_cleanup_task, CacheOrchestrator, CacheStatus, CleanupReport, OrchestratorConfig,
};
pub use persistent::{CacheInfo, PersistentCache};
