//! Guard/observer hook chains.
//!
//! # Responsibility
//! - Hold ordered guard (may abort) and observer (may not abort) callbacks.
//! - Freeze per-transition chains into an immutable `LifecycleHooks` value at
//!   registration time.
//!
//! # Invariants
//! - Callbacks run in registration order.
//! - A guard chain stops at the first `GuardDecision::Abort`.
//! - Each callback runs at most once per `run_*` call.
//! - An empty guard chain always allows.

use crate::model::state::Transition;
use std::fmt::{Debug, Formatter};

/// Decision returned by a guard callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Abort,
}

impl GuardDecision {
    pub fn is_abort(self) -> bool {
        matches!(self, Self::Abort)
    }
}

impl From<bool> for GuardDecision {
    /// `true` allows, `false` aborts.
    fn from(value: bool) -> Self {
        if value {
            Self::Allow
        } else {
            Self::Abort
        }
    }
}

/// Named registration point for type-level hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforeRemove,
    AfterRemove,
    BeforeRestore,
    AfterRestore,
}

impl HookPoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeRemove => "before_remove",
            Self::AfterRemove => "after_remove",
            Self::BeforeRestore => "before_restore",
            Self::AfterRestore => "after_restore",
        }
    }

    pub fn before(transition: Transition) -> Self {
        match transition {
            Transition::Remove => Self::BeforeRemove,
            Transition::Restore => Self::BeforeRestore,
        }
    }

    pub fn after(transition: Transition) -> Self {
        match transition {
            Transition::Remove => Self::AfterRemove,
            Transition::Restore => Self::AfterRestore,
        }
    }
}

/// Guard callback. Returning `Abort` stops the chain and cancels the write.
pub type Guard<R> = Box<dyn Fn(&R) -> GuardDecision + Send + Sync>;

/// Observer callback. Runs after a committed write.
pub type Observer<R> = Box<dyn Fn(&R) + Send + Sync>;

/// Ordered guards followed by ordered observers around one write.
pub struct HookChain<R> {
    guards: Vec<Guard<R>>,
    observers: Vec<Observer<R>>,
}

/// Store-level before/after-save chain used by hooked writes.
pub type SaveHooks<R> = HookChain<R>;

impl<R> Default for HookChain<R> {
    fn default() -> Self {
        Self {
            guards: Vec::new(),
            observers: Vec::new(),
        }
    }
}

impl<R> HookChain<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one guard.
    pub fn guard(mut self, guard: impl Fn(&R) -> GuardDecision + Send + Sync + 'static) -> Self {
        self.guards.push(Box::new(guard));
        self
    }

    /// Appends one observer.
    pub fn observe(mut self, observer: impl Fn(&R) + Send + Sync + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    /// Runs guards in order, stopping at the first abort.
    pub fn run_guards(&self, record: &R) -> GuardDecision {
        for guard in &self.guards {
            if guard(record).is_abort() {
                return GuardDecision::Abort;
            }
        }
        GuardDecision::Allow
    }

    /// Runs every observer in order.
    pub fn run_observers(&self, record: &R) {
        for observer in &self.observers {
            observer(record);
        }
    }

    pub fn guard_count(&self) -> usize {
        self.guards.len()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty() && self.observers.is_empty()
    }
}

impl<R> Debug for HookChain<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookChain")
            .field("guards", &self.guards.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Frozen type-level hooks for both transitions.
///
/// Built once through [`LifecycleHooksBuilder`]; there is no way to add hooks
/// afterwards.
pub struct LifecycleHooks<R> {
    remove: HookChain<R>,
    restore: HookChain<R>,
}

impl<R> LifecycleHooks<R> {
    pub fn builder() -> LifecycleHooksBuilder<R> {
        LifecycleHooksBuilder::default()
    }

    /// Hooks with every chain empty.
    pub fn none() -> Self {
        Self::builder().build()
    }

    /// Returns the chain that wraps `transition`.
    pub fn chain(&self, transition: Transition) -> &HookChain<R> {
        match transition {
            Transition::Remove => &self.remove,
            Transition::Restore => &self.restore,
        }
    }
}

impl<R> Default for LifecycleHooks<R> {
    fn default() -> Self {
        Self::none()
    }
}

impl<R> Debug for LifecycleHooks<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("remove", &self.remove)
            .field("restore", &self.restore)
            .finish()
    }
}

/// Registration-time builder for [`LifecycleHooks`].
pub struct LifecycleHooksBuilder<R> {
    remove: HookChain<R>,
    restore: HookChain<R>,
}

impl<R> Default for LifecycleHooksBuilder<R> {
    fn default() -> Self {
        Self {
            remove: HookChain::new(),
            restore: HookChain::new(),
        }
    }
}

impl<R> LifecycleHooksBuilder<R> {
    pub fn before_remove(
        mut self,
        guard: impl Fn(&R) -> GuardDecision + Send + Sync + 'static,
    ) -> Self {
        self.remove = self.remove.guard(guard);
        self
    }

    pub fn after_remove(mut self, observer: impl Fn(&R) + Send + Sync + 'static) -> Self {
        self.remove = self.remove.observe(observer);
        self
    }

    pub fn before_restore(
        mut self,
        guard: impl Fn(&R) -> GuardDecision + Send + Sync + 'static,
    ) -> Self {
        self.restore = self.restore.guard(guard);
        self
    }

    pub fn after_restore(mut self, observer: impl Fn(&R) + Send + Sync + 'static) -> Self {
        self.restore = self.restore.observe(observer);
        self
    }

    pub fn build(self) -> LifecycleHooks<R> {
        LifecycleHooks {
            remove: self.remove,
            restore: self.restore,
        }
    }
}
