// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error kinds returned by clock operations and topology loading.

use crate::node::ClockId;

/// Failure of a clock operation.
///
/// Operations never panic and never retry; a failed operation leaves cached
/// and hardware state as it was, except where a single-register write is the
/// operation itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    /// Clock id is out of range or names the reserved dummy slot.
    #[error("clock id out of range or reserved")]
    InvalidId,
    /// No clock registered at this id, or the operation is forbidden for
    /// this node kind or its permission flags.
    #[error("clock not registered or operation not permitted")]
    Unsupported,
    /// The node-level algorithm could not complete: divider out of range,
    /// candidate parent not in the list, parent rate unknown, or an
    /// unsupported hardware mode.
    #[error("clock operation could not be completed")]
    OperationFailed,
    /// A hardware status bit (PLL lock, divider acknowledge) did not assert
    /// within the configured poll budget.
    #[error("timed out waiting on hardware status")]
    HardwareTimeout,
}

/// Rejection of a declarative topology at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Two declarations claim the same clock id.
    #[error("clock id {0} declared twice")]
    DuplicateId(ClockId),
    /// A declared id does not fit below the configured maximum.
    #[error("clock id {0} is outside the id space")]
    IdOutOfRange(ClockId),
    /// A parent reference points outside the id space.
    #[error("clock id {id} references parent {parent} outside the id space")]
    ParentOutOfRange { id: ClockId, parent: ClockId },
    /// A mux declaration carries more candidates than the hardware field
    /// can select.
    #[error("clock id {0} declares too many parent candidates")]
    TooManyParents(ClockId),
    /// A declared register field or gate pattern does not fit inside a
    /// 32-bit register.
    #[error("clock id {0} declares a register field outside 32 bits")]
    InvalidField(ClockId),
    /// Following parent links from this id reaches the id again.
    #[error("parent graph cycle through clock id {0}")]
    CycleDetected(ClockId),
}
