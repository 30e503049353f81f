//! Bulk transitions.
//!
//! Hooked bulk runs the single-record hooked transition per element: every
//! record gets full hook semantics, and neither an aborted record nor a
//! store failure on one record stops the rest. There is no cross-record
//! atomicity; a failure partway leaves the collection partially transitioned.
//!
//! Direct bulk issues one set-based write over the eligible part of a scope
//! and skips type-level and store-level hooks entirely. Records already in
//! the target state keep their marker.

use super::{LifecycleError, LifecycleResult, SoftDelete};
use crate::model::state::{Transition, WriteMode};
use crate::scope::eligible_for;
use crate::store::{MarkerStore, StoreError, StoreResult};
use log::{info, warn};

/// Records acted upon by a hooked bulk call, with one outcome each.
///
/// `Ok(true)` means the transition was applied, `Ok(false)` that it was a
/// no-op or aborted, and `Err` that the store failed for that record.
#[derive(Debug)]
pub struct BulkReport<R> {
    records: Vec<R>,
    outcomes: Vec<StoreResult<bool>>,
}

impl<R> BulkReport<R> {
    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }

    /// Per-record outcome, in input order.
    pub fn outcomes(&self) -> &[StoreResult<bool>] {
        &self.outcomes
    }

    /// Success flag per record, in input order. Store failures count as
    /// `false`.
    pub fn applied(&self) -> Vec<bool> {
        self.outcomes.iter().map(is_applied).collect()
    }

    pub fn applied_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| is_applied(outcome)).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.applied_count()
    }

    pub fn error_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_err()).count()
    }

    /// Records whose write failed in the store, with the error.
    pub fn errors(&self) -> impl Iterator<Item = (&R, &StoreError)> {
        self.records
            .iter()
            .zip(self.outcomes.iter())
            .filter_map(|(record, outcome)| outcome.as_ref().err().map(|err| (record, err)))
    }

    /// Whether every record took the transition.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(is_applied)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&R, bool)> {
        self.records
            .iter()
            .zip(self.outcomes.iter().map(is_applied))
    }
}

fn is_applied(outcome: &StoreResult<bool>) -> bool {
    matches!(outcome, Ok(true))
}

impl<S: MarkerStore> SoftDelete<'_, S> {
    /// Hooked removal of every record.
    pub fn remove_all(&self, records: Vec<S::Record>) -> BulkReport<S::Record> {
        self.apply_each(records, Transition::Remove)
    }

    /// Hooked restore of every record.
    pub fn restore_all(&self, records: Vec<S::Record>) -> BulkReport<S::Record> {
        self.apply_each(records, Transition::Restore)
    }

    /// Hooked removal of every record, then the first failure in input
    /// order: `TransitionNotApplied` for a record that was not removed, or
    /// `Store` for a store error. Earlier and later successes are kept.
    pub fn remove_all_strict(
        &self,
        records: Vec<S::Record>,
    ) -> LifecycleResult<Vec<S::Record>, S::Record> {
        self.apply_each_strict(records, Transition::Remove)
    }

    /// Mirror of [`remove_all_strict`](Self::remove_all_strict) for restore.
    pub fn restore_all_strict(
        &self,
        records: Vec<S::Record>,
    ) -> LifecycleResult<Vec<S::Record>, S::Record> {
        self.apply_each_strict(records, Transition::Restore)
    }

    /// Marks every kept record in `scope` removed with one write. No hooks
    /// run; removed records in `scope` keep their marker.
    pub fn update_all_removed(&self, scope: &S::Scope) -> StoreResult<usize> {
        self.apply_set_based(scope, Transition::Remove)
    }

    /// Clears the marker of every removed record in `scope` with one write.
    /// No hooks run.
    pub fn update_all_restored(&self, scope: &S::Scope) -> StoreResult<usize> {
        self.apply_set_based(scope, Transition::Restore)
    }

    fn apply_each(
        &self,
        mut records: Vec<S::Record>,
        transition: Transition,
    ) -> BulkReport<S::Record> {
        let type_name = self.record_type.name();
        let mut outcomes = Vec::with_capacity(records.len());
        for (index, record) in records.iter_mut().enumerate() {
            let outcome = self
                .apply(record, transition, WriteMode::Hooked)
                .map(|outcome| outcome.is_applied());
            if let Err(err) = &outcome {
                warn!(
                    "event=bulk_transition module=lifecycle status=error transition={transition} mode=hooked record_type={type_name} index={index} error={err}"
                );
            }
            outcomes.push(outcome);
        }

        let report = BulkReport { records, outcomes };
        info!(
            "event=bulk_transition module=lifecycle status=ok transition={transition} mode=hooked record_type={type_name} total={} applied={} errors={}",
            report.records.len(),
            report.applied_count(),
            report.error_count()
        );
        report
    }

    fn apply_each_strict(
        &self,
        records: Vec<S::Record>,
        transition: Transition,
    ) -> LifecycleResult<Vec<S::Record>, S::Record> {
        let BulkReport {
            mut records,
            outcomes,
        } = self.apply_each(records, transition);
        let first_failure = outcomes
            .into_iter()
            .enumerate()
            .find(|(_, outcome)| !is_applied(outcome));
        match first_failure {
            None => Ok(records),
            Some((_, Err(err))) => Err(LifecycleError::Store(err)),
            Some((index, Ok(_))) => Err(LifecycleError::not_completed(
                transition,
                records.swap_remove(index),
            )),
        }
    }

    fn apply_set_based(&self, scope: &S::Scope, transition: Transition) -> StoreResult<usize> {
        let eligible = eligible_for(scope.clone(), transition);
        let value = transition.target_marker((self.clock)());
        let changed = self.store.bulk_set_marker(&eligible, value)?;
        info!(
            "event=bulk_transition module=lifecycle status=ok transition={transition} mode=direct record_type={} applied={changed}",
            self.record_type.name()
        );
        Ok(changed)
    }
}
