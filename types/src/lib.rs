//! Core domain types for pledge.
//!
//! Pure data with no IO and no scheduling: the settlement state of a future,
//! the tagged outcome it settles with, identifiers, and the error kinds the
//! core raises on its own behalf.

mod ids;

pub use ids::{FutureId, TimerId};

use serde::Serialize;
use std::fmt;
use thiserror::Error;

// ============================================================================
// State
// ============================================================================

/// Settlement state of a future.
///
/// Monotonic: a future leaves `Pending` at most once and never returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
}

impl State {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fulfilled => "fulfilled",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Settlement
// ============================================================================

/// The final result of a settled future.
///
/// Serializes as the tagged outcome used by settle-all aggregation:
/// `{"state": "fulfilled", "value": ...}` or
/// `{"state": "rejected", "reason": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Settlement<V> {
    Fulfilled { value: V },
    Rejected { reason: V },
}

impl<V> Settlement<V> {
    #[must_use]
    pub fn fulfilled(value: V) -> Self {
        Self::Fulfilled { value }
    }

    #[must_use]
    pub fn rejected(reason: V) -> Self {
        Self::Rejected { reason }
    }

    #[must_use]
    pub const fn state(&self) -> State {
        match self {
            Self::Fulfilled { .. } => State::Fulfilled,
            Self::Rejected { .. } => State::Rejected,
        }
    }

    /// The value or reason, whichever this settlement carries.
    #[must_use]
    pub fn payload(&self) -> &V {
        match self {
            Self::Fulfilled { value } => value,
            Self::Rejected { reason } => reason,
        }
    }

    #[must_use]
    pub fn into_payload(self) -> V {
        match self {
            Self::Fulfilled { value } => value,
            Self::Rejected { reason } => reason,
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&V> {
        match self {
            Self::Fulfilled { value } => Some(value),
            Self::Rejected { .. } => None,
        }
    }

    #[must_use]
    pub fn reason(&self) -> Option<&V> {
        match self {
            Self::Fulfilled { .. } => None,
            Self::Rejected { reason } => Some(reason),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failures the core produces itself, as opposed to reasons supplied by
/// user code.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FutureError {
    /// A future was resolved with itself.
    #[error("TypeError: a future cannot be resolved with itself")]
    SelfResolution,
    /// User code panicked inside an initializer, callback, or `then` member.
    #[error("panicked: {message}")]
    Panicked { message: String },
}

impl FutureError {
    pub fn panicked(message: impl Into<String>) -> Self {
        Self::Panicked {
            message: message.into(),
        }
    }
}
