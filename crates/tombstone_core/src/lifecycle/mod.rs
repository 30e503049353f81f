//! Soft-delete transition engine.
//!
//! # Responsibility
//! - Decide whether a transition is legal for one record.
//! - Run type-level guards and observers around the marker write.
//! - Expose the visibility views for the bound record type.
//!
//! # Invariants
//! - A record already in the target state is a no-op: no hooks, no write.
//! - Guards run before the write in registration order; the first abort
//!   cancels the write and skips every observer.
//! - With `hooked_writes`, ordering is type guard -> store before-save ->
//!   write -> store after-save -> type observer.
//! - `WriteMode::Direct` never runs hooks of any kind.
//! - Non-strict operations report transition failure as `Ok(false)`; only
//!   store failures surface as `Err`.

use crate::model::record_type::RecordType;
use crate::model::state::{is_removed, now_epoch_ms, Timestamp, Transition, WriteMode};
use crate::scope::BaseView;
use crate::store::{MarkerStore, StoreResult};
use log::{debug, info, warn};

mod bulk;
mod error;

pub use bulk::BulkReport;
pub use error::{LifecycleError, LifecycleResult};

/// Result of one transition attempt. Kept private so callers only see the
/// boolean contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransitionOutcome {
    Applied,
    AlreadyInTargetState,
    GuardAborted,
    StoreAborted,
}

impl TransitionOutcome {
    pub(crate) fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Lifecycle operations for one record type over one store.
pub struct SoftDelete<'a, S: MarkerStore> {
    record_type: &'a RecordType<S::Record>,
    store: &'a S,
    clock: fn() -> Timestamp,
}

impl<'a, S: MarkerStore> SoftDelete<'a, S> {
    pub fn new(record_type: &'a RecordType<S::Record>, store: &'a S) -> Self {
        Self {
            record_type,
            store,
            clock: now_epoch_ms,
        }
    }

    /// Replaces the wall clock used for removal markers.
    pub fn with_clock(mut self, clock: fn() -> Timestamp) -> Self {
        self.clock = clock;
        self
    }

    pub fn record_type(&self) -> &RecordType<S::Record> {
        self.record_type
    }

    pub fn store(&self) -> &S {
        self.store
    }

    pub fn is_removed(&self, record: &S::Record) -> bool {
        is_removed(self.store.get_marker(record))
    }

    pub fn is_kept(&self, record: &S::Record) -> bool {
        !self.is_removed(record)
    }

    /// Hooked removal. `Ok(false)` when already removed or aborted.
    pub fn remove(&self, record: &mut S::Record) -> StoreResult<bool> {
        self.remove_with(record, WriteMode::Hooked)
    }

    pub fn remove_with(&self, record: &mut S::Record, mode: WriteMode) -> StoreResult<bool> {
        Ok(self.apply(record, Transition::Remove, mode)?.is_applied())
    }

    /// Hooked restore. `Ok(false)` when not removed or aborted.
    pub fn restore(&self, record: &mut S::Record) -> StoreResult<bool> {
        self.restore_with(record, WriteMode::Hooked)
    }

    pub fn restore_with(&self, record: &mut S::Record, mode: WriteMode) -> StoreResult<bool> {
        Ok(self.apply(record, Transition::Restore, mode)?.is_applied())
    }

    /// Hooked removal that fails with `TransitionNotApplied` instead of
    /// returning `false`.
    pub fn remove_strict(&self, record: &mut S::Record) -> LifecycleResult<(), S::Record>
    where
        S::Record: Clone,
    {
        self.strict(record, Transition::Remove)
    }

    /// Hooked restore that fails with `TransitionNotReversed` instead of
    /// returning `false`.
    pub fn restore_strict(&self, record: &mut S::Record) -> LifecycleResult<(), S::Record>
    where
        S::Record: Clone,
    {
        self.strict(record, Transition::Restore)
    }

    /// Base view computed from the type's default visibility.
    pub fn base_view(&self) -> BaseView {
        BaseView::from(self.record_type.config().default_visibility())
    }

    /// The implicit collection view.
    pub fn default_view(&self) -> S::Scope {
        self.base_view().default_view(self.store.unscoped())
    }

    pub fn kept(&self) -> S::Scope {
        self.base_view().kept(self.store.unscoped())
    }

    pub fn removed(&self) -> S::Scope {
        self.base_view().removed(self.store.unscoped())
    }

    /// Every record, removed or not.
    pub fn with_removed(&self) -> S::Scope {
        self.base_view().with_removed(self.store.unscoped())
    }

    fn strict(
        &self,
        record: &mut S::Record,
        transition: Transition,
    ) -> LifecycleResult<(), S::Record>
    where
        S::Record: Clone,
    {
        if self.apply(record, transition, WriteMode::Hooked)?.is_applied() {
            Ok(())
        } else {
            Err(LifecycleError::not_completed(transition, record.clone()))
        }
    }

    pub(crate) fn apply(
        &self,
        record: &mut S::Record,
        transition: Transition,
        mode: WriteMode,
    ) -> StoreResult<TransitionOutcome> {
        let type_name = self.record_type.name();
        if !transition.is_eligible(self.is_removed(record)) {
            debug!(
                "event=transition module=lifecycle status=skipped transition={transition} mode={} record_type={type_name} reason=already_in_target_state",
                mode.as_str()
            );
            return Ok(TransitionOutcome::AlreadyInTargetState);
        }

        let hooks = self.record_type.hooks().chain(transition);
        if mode == WriteMode::Hooked && hooks.run_guards(record).is_abort() {
            warn!(
                "event=transition module=lifecycle status=aborted transition={transition} mode=hooked record_type={type_name} reason=guard"
            );
            return Ok(TransitionOutcome::GuardAborted);
        }

        let value = transition.target_marker((self.clock)());
        let through_save_hooks =
            mode == WriteMode::Hooked && self.record_type.config().hooked_writes();
        let written = if through_save_hooks {
            self.store.set_marker_hooked(record, value)?
        } else {
            self.store.set_marker_direct(record, value)?
        };
        if !written {
            warn!(
                "event=transition module=lifecycle status=aborted transition={transition} mode={} record_type={type_name} reason=store_guard",
                mode.as_str()
            );
            return Ok(TransitionOutcome::StoreAborted);
        }

        if mode == WriteMode::Hooked {
            hooks.run_observers(record);
        }

        info!(
            "event=transition module=lifecycle status=ok transition={transition} mode={} record_type={type_name} write_path={}",
            mode.as_str(),
            if through_save_hooks { "save_hooks" } else { "single_field" }
        );
        Ok(TransitionOutcome::Applied)
    }
}
