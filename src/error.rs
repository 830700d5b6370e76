// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error types.
//!
//! Tree construction errors are fatal: a malformed tree must never reach the
//! [`CacheManager`](crate::CacheManager). Runtime errors only come from a faulted
//! background resize and are operational (logged, counted, retried next tick).

use thiserror::Error;

use crate::allotment::Unit;

/// Errors raised while building or validating an allotment tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllotmentError {
    #[error("composite '{composite}' mixes units: expected {expected}, child '{child}' uses {found}")]
    MixedUnits {
        composite: String,
        child: String,
        expected: Unit,
        found: Unit,
    },
    #[error("'{name}' must have a weight greater than zero")]
    ZeroWeight { name: String },
    #[error("'{name}' has minimum capacity {min} above its maximum {max}")]
    InvalidRange { name: String, min: u64, max: u64 },
    #[error("composite '{name}' has no children")]
    EmptyComposite { name: String },
    #[error("composite '{composite}' has more than one child named '{child}'")]
    DuplicateChild { composite: String, child: String },
    #[error("no cache registered under '{name}'")]
    MissingCache { name: String },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised by the [`CacheManager`](crate::CacheManager) at runtime.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("resize pass for tick {tick} faulted: {reason}")]
    ResizeFaulted { tick: u64, reason: String },
    #[error("cache manager already started")]
    AlreadyStarted,
    #[error(transparent)]
    Config(#[from] AllotmentError),
}
