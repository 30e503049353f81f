//! Soft-delete lifecycle core.
//! Records are marked removed through a nullable timestamp marker, queried
//! through visibility views, and restored, with guard/observer hooks around
//! every transition.

pub mod db;
pub mod hooks;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod registry;
pub mod scope;
pub mod store;

pub use hooks::{GuardDecision, HookChain, HookPoint, LifecycleHooks, SaveHooks};
pub use lifecycle::{BulkReport, LifecycleError, LifecycleResult, SoftDelete};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::record_type::{
    ConfigError, ConfigResult, RecordType, RecordTypeConfig, RecordTypeOptions, Visibility,
    DEFAULT_MARKER_COLUMN,
};
pub use model::state::{is_kept, is_removed, Marker, Timestamp, Transition, WriteMode};
pub use registry::{RecordTypeRegistry, RegistryError};
pub use scope::{eligible_for, BaseView, QueryScope};
pub use store::sqlite::{ScopePredicate, SqlScope, SqliteMarkerStore, SqliteRecord};
pub use store::{MarkerStore, RecordId, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
