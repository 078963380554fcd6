// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Clock node types: ids, permission flags, and the per-variant payloads.

use core::cell::Cell;
use core::ops::BitOr;

use tock_registers::fields::Field;

/// Dense, chip-assigned clock identifier. Doubles as the registry arena
/// index.
pub type ClockId = u32;

/// Upper bound on mux/root parent candidate sets.
pub const MAX_PARENTS: usize = 8;

/// Permission bits controlling which mutations a node accepts and whether a
/// mutation may recurse into the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClockFlags(u16);

impl ClockFlags {
    /// No modification permitted.
    pub const FIXED: ClockFlags = ClockFlags(1 << 0);
    /// Change of parent permitted.
    pub const CHANGE_PARENT: ClockFlags = ClockFlags(1 << 1);
    /// Change of parent rate permitted.
    pub const CHANGE_PARENT_RATE: ClockFlags = ClockFlags(1 << 2);
    /// Enabling may recurse into the parent.
    pub const ENABLE_PARENT: ClockFlags = ClockFlags(1 << 3);
    /// Disabling may recurse into the parent.
    pub const DISABLE_PARENT: ClockFlags = ClockFlags(1 << 4);
    /// Change of own rate permitted.
    pub const CHANGE_RATE: ClockFlags = ClockFlags(1 << 5);
    /// Rate change by switching parent permitted.
    pub const CHANGE_RATE_BY_PARENT: ClockFlags = ClockFlags(1 << 6);

    pub const fn empty() -> ClockFlags {
        ClockFlags(0)
    }

    pub const fn contains(self, other: ClockFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ClockFlags {
    type Output = ClockFlags;

    fn bitor(self, rhs: ClockFlags) -> ClockFlags {
        ClockFlags(self.0 | rhs.0)
    }
}

/// A register field located at runtime: bit shift plus width. Topology data
/// carries these for mux selects, divider fields, and gate bit patterns,
/// where the geometry is per-node configuration rather than a fixed layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegField {
    pub shift: u32,
    pub width: u32,
}

impl RegField {
    pub const fn new(shift: u32, width: u32) -> RegField {
        RegField { shift, width }
    }

    /// Largest raw value the field can hold.
    pub const fn max(self) -> u32 {
        (1 << self.width) - 1
    }

    pub(crate) fn field(self) -> Field<u32, ()> {
        Field::new(self.max(), self.shift as usize)
    }
}

/// Rate description returned by `DescribeRate`: either one fixed value or a
/// `[min, max]` range. Every current node kind reports a single value; the
/// range form is kept for the caller-facing wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDesc {
    pub is_range: bool,
    pub min: u64,
    pub max: Option<u64>,
}

impl RateDesc {
    pub(crate) fn single(rate: u64) -> RateDesc {
        RateDesc {
            is_range: false,
            min: rate,
            max: None,
        }
    }
}

/// Variant payload of a clock node. A closed set: every operation in the
/// tree dispatches over these exhaustively.
pub(crate) enum ClockKind {
    /// Free-running oscillator with a compile-time rate. No register, no
    /// parent, cannot be gated at this layer.
    Fixed { rate: u32 },
    /// Fixed integer division of the parent. Purely derived; no register.
    FixedDiv { parent: ClockId, div: u32 },
    /// Selectable parent via a register field holding the candidate index.
    Mux {
        reg: usize,
        sel: RegField,
        parents: heapless::Vec<ClockId, MAX_PARENTS>,
        current: Cell<Option<ClockId>>,
    },
    /// Integer divider `field + 1` programmed in a register field.
    Div {
        parent: ClockId,
        reg: usize,
        field: RegField,
    },
    /// On/off gate. `enable_value` is the full bit pattern at `bit` that
    /// means "running": 1 for a plain gate, 3 for a CCM target-root enable
    /// pair.
    Gate {
        parent: ClockId,
        reg: usize,
        bit: u32,
        enable_value: u32,
    },
    /// Fractional-N PLL (GPU/VPU/audio/video class).
    FracPll { parent: ClockId, reg: usize },
    /// Multi-stage SCCG PLL (ARM/DRAM/video2 class), spread-spectrum
    /// capable in hardware but unsupported for rate queries.
    SccgPll {
        parent: ClockId,
        reg: usize,
        critical: bool,
    },
    /// CCM target-root composite: 8-way mux, pre/post dividers, and gate in
    /// one register.
    TargetRoot {
        reg: usize,
        parents: [ClockId; MAX_PARENTS],
        current: Cell<Option<ClockId>>,
        critical: bool,
    },
}

/// One node of the clock graph.
///
/// `rate` and `enabled` are the last values observed or programmed; they are
/// valid after `init()` and after rate-affecting operations, but make no
/// claim about hardware mutated behind the driver's back.
pub(crate) struct ClockNode {
    pub(crate) id: ClockId,
    pub(crate) rate: Cell<u32>,
    pub(crate) enabled: Cell<bool>,
    pub(crate) flags: ClockFlags,
    pub(crate) kind: ClockKind,
}

impl ClockNode {
    pub(crate) fn new(id: ClockId, flags: ClockFlags, kind: ClockKind) -> ClockNode {
        ClockNode {
            id,
            rate: Cell::new(0),
            enabled: Cell::new(false),
            flags,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ClockFlags, RegField};

    #[test]
    fn flag_combination() {
        let flags = ClockFlags::ENABLE_PARENT | ClockFlags::DISABLE_PARENT;
        assert!(flags.contains(ClockFlags::ENABLE_PARENT));
        assert!(flags.contains(ClockFlags::DISABLE_PARENT));
        assert!(!flags.contains(ClockFlags::FIXED));
        assert!(!ClockFlags::empty().contains(ClockFlags::CHANGE_RATE));
    }

    #[test]
    fn field_geometry() {
        let f = RegField::new(16, 3);
        assert_eq!(f.max(), 7);
        let field = f.field();
        assert_eq!(field.mask, 7);
        assert_eq!(field.shift, 16);
    }
}
