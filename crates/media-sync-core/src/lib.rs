pub mod acquisition;
pub mod id_cache;
pub mod id_cache_storage;
pub mod id_resolver;
pub mod media_index;
pub mod progress;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use acquisition::{AcquisitionForwarder, AcquisitionSettings};
pub use id_cache::IdCache;
pub use id_cache_storage::IdCacheStorage;
pub use id_resolver::{IdResolver, IdResolverConfig, ResolveStats};
pub use media_index::MediaIndex;
pub use progress::{PassReport, PassTracker};
pub use sync::{PhaseCallback, Reconciler, SyncKind, SyncOptions, SyncOrchestrator, SyncPhase, SyncResult};
