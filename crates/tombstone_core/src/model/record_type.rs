//! Per-type soft-delete configuration.
//!
//! # Responsibility
//! - Accept the registration option set (`column`, `without_default_scope`,
//!   `skip_ar_callbacks`) and resolve it into an immutable config.
//! - Bundle config and frozen hooks into one `RecordType` descriptor.
//!
//! # Invariants
//! - `RecordTypeConfig` has no mutators; it is fixed once resolved.
//! - Marker column and type name are plain SQL identifiers.

use crate::hooks::LifecycleHooks;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// Marker column used when registration does not name one.
pub const DEFAULT_MARKER_COLUMN: &str = "deleted_at";

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Returns whether `value` is safe to splice into SQL as an identifier.
pub fn is_valid_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Registration-time configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    EmptyMarkerColumn,
    InvalidMarkerColumn(String),
    EmptyTypeName,
    InvalidTypeName(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMarkerColumn => write!(f, "marker column must not be empty"),
            Self::InvalidMarkerColumn(value) => {
                write!(f, "marker column is not a plain identifier: `{value}`")
            }
            Self::EmptyTypeName => write!(f, "record type name must not be empty"),
            Self::InvalidTypeName(value) => {
                write!(f, "record type name is not a plain identifier: `{value}`")
            }
        }
    }
}

impl Error for ConfigError {}

/// Which records the implicit collection view exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Default view shows kept and removed records.
    Visible,
    /// Default view hides removed records.
    Hidden,
}

/// Registration option set as declared by embedders.
///
/// Every field has a default, so `{}` deserializes to the stock behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordTypeOptions {
    /// Marker column name.
    pub column: String,
    /// `true` keeps removed records in the default view.
    pub without_default_scope: bool,
    /// `true` writes the marker without the store's save hooks.
    pub skip_ar_callbacks: bool,
}

impl Default for RecordTypeOptions {
    fn default() -> Self {
        Self {
            column: DEFAULT_MARKER_COLUMN.to_string(),
            without_default_scope: false,
            skip_ar_callbacks: true,
        }
    }
}

impl RecordTypeOptions {
    /// Validates options and resolves them into an immutable config.
    pub fn resolve(&self) -> ConfigResult<RecordTypeConfig> {
        let column = self.column.trim();
        if column.is_empty() {
            return Err(ConfigError::EmptyMarkerColumn);
        }
        if !is_valid_identifier(column) {
            return Err(ConfigError::InvalidMarkerColumn(column.to_string()));
        }

        Ok(RecordTypeConfig {
            marker_column: column.to_string(),
            default_visibility: if self.without_default_scope {
                Visibility::Visible
            } else {
                Visibility::Hidden
            },
            hooked_writes: !self.skip_ar_callbacks,
        })
    }
}

/// Resolved, immutable per-type configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordTypeConfig {
    marker_column: String,
    default_visibility: Visibility,
    hooked_writes: bool,
}

impl RecordTypeConfig {
    pub fn marker_column(&self) -> &str {
        &self.marker_column
    }

    pub fn default_visibility(&self) -> Visibility {
        self.default_visibility
    }

    /// Whether marker writes go through the store's save hooks.
    pub fn hooked_writes(&self) -> bool {
        self.hooked_writes
    }
}

impl Default for RecordTypeConfig {
    fn default() -> Self {
        Self {
            marker_column: DEFAULT_MARKER_COLUMN.to_string(),
            default_visibility: Visibility::Hidden,
            hooked_writes: false,
        }
    }
}

/// Registered record type: name, config and frozen type-level hooks.
pub struct RecordType<R> {
    name: String,
    config: RecordTypeConfig,
    hooks: LifecycleHooks<R>,
}

impl<R> RecordType<R> {
    pub fn new(
        name: impl Into<String>,
        config: RecordTypeConfig,
        hooks: LifecycleHooks<R>,
    ) -> ConfigResult<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::EmptyTypeName);
        }
        if !is_valid_identifier(trimmed) {
            return Err(ConfigError::InvalidTypeName(trimmed.to_string()));
        }

        Ok(Self {
            name: trimmed.to_string(),
            config,
            hooks,
        })
    }

    /// Resolves `options` and builds the descriptor in one step.
    pub fn from_options(
        name: impl Into<String>,
        options: &RecordTypeOptions,
        hooks: LifecycleHooks<R>,
    ) -> ConfigResult<Self> {
        Self::new(name, options.resolve()?, hooks)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &RecordTypeConfig {
        &self.config
    }

    pub fn hooks(&self) -> &LifecycleHooks<R> {
        &self.hooks
    }
}

impl<R> Debug for RecordType<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .finish()
    }
}
