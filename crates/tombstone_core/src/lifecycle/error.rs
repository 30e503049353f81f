//! Lifecycle error taxonomy.

use crate::model::state::Transition;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

pub type LifecycleResult<T, R> = Result<T, LifecycleError<R>>;

/// Failure raised by the strict (`*_strict`) operations.
///
/// The two transition variants carry the offending record. They do not say
/// whether the record was already in the target state or a guard aborted;
/// check state before calling when that matters.
#[derive(Debug)]
pub enum LifecycleError<R> {
    /// `remove_strict` did not remove the record.
    TransitionNotApplied(R),
    /// `restore_strict` did not restore the record.
    TransitionNotReversed(R),
    /// Persistence adapter failure.
    Store(StoreError),
}

impl<R> LifecycleError<R> {
    pub(crate) fn not_completed(transition: Transition, record: R) -> Self {
        match transition {
            Transition::Remove => Self::TransitionNotApplied(record),
            Transition::Restore => Self::TransitionNotReversed(record),
        }
    }

    /// The offending record, for transition failures.
    pub fn record(&self) -> Option<&R> {
        match self {
            Self::TransitionNotApplied(record) | Self::TransitionNotReversed(record) => {
                Some(record)
            }
            Self::Store(_) => None,
        }
    }

    pub fn into_record(self) -> Option<R> {
        match self {
            Self::TransitionNotApplied(record) | Self::TransitionNotReversed(record) => {
                Some(record)
            }
            Self::Store(_) => None,
        }
    }
}

impl<R> Display for LifecycleError<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TransitionNotApplied(_) => write!(f, "Failed to soft delete the record."),
            Self::TransitionNotReversed(_) => write!(f, "Failed to restore the record."),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl<R: Debug> Error for LifecycleError<R> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl<R> From<StoreError> for LifecycleError<R> {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
