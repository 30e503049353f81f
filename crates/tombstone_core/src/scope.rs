//! Visibility policy over record collections.
//!
//! # Responsibility
//! - Define the query scope capability the store must provide.
//! - Derive the default, `kept`, `removed` and `with_removed` views from one
//!   base view computed from configuration.
//!
//! # Invariants
//! - A view never carries two marker filters at once.
//! - `Hidden` types lift the implicit filter before widening or inverting it.
//! - `Visible` types add at most one explicit filter on top of the base view.

use crate::model::record_type::Visibility;
use crate::model::state::Transition;

/// Scope primitives supplied by the persistence adapter.
///
/// Each call returns a new, narrower or wider view. Filters compose by
/// conjunction, so `filter_kept().filter_removed()` is always empty.
pub trait QueryScope: Sized + Clone {
    /// Restricts to records without a marker.
    fn filter_kept(self) -> Self;
    /// Restricts to records with a marker.
    fn filter_removed(self) -> Self;
    /// Drops every marker filter, keeping all other constraints.
    fn lift_marker_filter(self) -> Self;
}

/// The collection a type exposes with no explicit scope applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseView {
    /// Implicit kept-only filter.
    KeptOnly,
    /// No implicit filter.
    Everything,
}

impl From<Visibility> for BaseView {
    fn from(value: Visibility) -> Self {
        match value {
            Visibility::Hidden => Self::KeptOnly,
            Visibility::Visible => Self::Everything,
        }
    }
}

impl BaseView {
    /// Applies the implicit filter to an unscoped collection.
    pub fn default_view<Q: QueryScope>(self, unscoped: Q) -> Q {
        match self {
            Self::KeptOnly => unscoped.filter_kept(),
            Self::Everything => unscoped,
        }
    }

    pub fn kept<Q: QueryScope>(self, unscoped: Q) -> Q {
        let base = self.default_view(unscoped);
        match self {
            Self::KeptOnly => base,
            Self::Everything => base.filter_kept(),
        }
    }

    pub fn removed<Q: QueryScope>(self, unscoped: Q) -> Q {
        let base = self.default_view(unscoped);
        match self {
            Self::KeptOnly => base.lift_marker_filter().filter_removed(),
            Self::Everything => base.filter_removed(),
        }
    }

    /// All records regardless of marker.
    pub fn with_removed<Q: QueryScope>(self, unscoped: Q) -> Q {
        let base = self.default_view(unscoped);
        match self {
            Self::KeptOnly => base.lift_marker_filter(),
            Self::Everything => base,
        }
    }
}

/// Narrows `scope` to the records `transition` would change: kept records
/// for removal, removed records for restore.
///
/// Marker filters already on `scope` are lifted first, so the result carries
/// exactly one.
pub fn eligible_for<Q: QueryScope>(scope: Q, transition: Transition) -> Q {
    let lifted = scope.lift_marker_filter();
    match transition {
        Transition::Remove => lifted.filter_kept(),
        Transition::Restore => lifted.filter_removed(),
    }
}
