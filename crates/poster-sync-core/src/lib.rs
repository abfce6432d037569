pub mod error;
pub mod filename;
pub mod id_store;
pub mod id_registry;
pub mod context;
pub mod import;
pub mod orphan;
pub mod sweep;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ImportError;
pub use filename::{CodecError, FilenameCodec, ORPHAN_TAG};
pub use id_store::IdStore;
pub use id_registry::{IdRegistry, SessionIdCache};
pub use context::{ImportSettings, PosterDirs, RunContext};
pub use import::{
    BatchResult, BatchStep, ImportCursor, ImportObserver, ImportPipeline, ItemError, ItemOutcome, NoopObserver,
    RunReport, RunSpec, RunState, RunTotals, SkipReason,
};
pub use orphan::{
    OrphanReconciler, OrphanRename, OrphanResult, ReconcileKey, ReconcilePhase, ReconcileScope, ReconcileTracker,
};
pub use sweep::{plan_sweep, RunFailure, SweepDriver, SweepReport};
pub use scheduler::{parse_interval, AutoImportScheduler, ImportLock, TickOutcome};
