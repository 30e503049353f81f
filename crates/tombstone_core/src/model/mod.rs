//! Soft-delete domain model.
//!
//! # Responsibility
//! - Define the removal marker and how it maps onto kept/removed state.
//! - Define per-type configuration resolved once at registration.
//!
//! # Invariants
//! - Removal is represented by a nullable timestamp marker, never hard delete.
//! - Record type configuration is immutable after construction.

pub mod record_type;
pub mod state;
