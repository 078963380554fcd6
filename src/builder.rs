// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Declarative topology description and the validating builder.
//!
//! A chip's wiring is a table of [`ClockDecl`] entries: pure data naming
//! ids, register addresses, field geometry, and parent ids. [`build`] checks
//! the table (id space, candidate counts, parent cycles), installs the
//! nodes, runs the one-time init pass against live registers, and hands
//! back the caller-facing [`ClockController`].

use core::cell::Cell;

use alloc::vec::Vec;

use log::{debug, warn};

use crate::bus::RegisterBus;
use crate::controller::ClockController;
use crate::error::ConfigError;
use crate::node::{ClockFlags, ClockId, ClockKind, ClockNode, RegField, MAX_PARENTS};
use crate::tree::ClockTree;

/// Default budget for lock/acknowledge polling, in register reads.
pub const DEFAULT_POLL_RETRIES: u32 = 100_000;

/// Id-space parameters of a chip's clock table.
#[derive(Debug, Clone, Copy)]
pub struct TreeConfig {
    /// One past the largest usable clock id; sizes the registry.
    pub max_id: u32,
    /// Reserved sentinel id, rejected by every caller-facing operation even
    /// when a placeholder node occupies its slot.
    pub dummy_id: ClockId,
    /// Poll budget for hardware handshakes.
    pub poll_retries: u32,
}

impl TreeConfig {
    pub const fn new(max_id: u32, dummy_id: ClockId) -> TreeConfig {
        TreeConfig {
            max_id,
            dummy_id,
            poll_retries: DEFAULT_POLL_RETRIES,
        }
    }
}

/// One clock of the chip's wiring table.
///
/// Register addresses are whatever the platform's [`RegisterBus`] expects;
/// shifts/widths/bits describe the controlling field inside that register.
#[derive(Debug, Clone, Copy)]
pub enum ClockDecl<'a> {
    /// Free-running source with a constant rate.
    Fixed { id: ClockId, rate: u32 },
    /// Fixed integer division of `parent`.
    FixedDiv {
        id: ClockId,
        parent: ClockId,
        div: u32,
    },
    /// Parent select field of `width` bits at `shift` in `reg`, indexing
    /// into `parents`.
    Mux {
        id: ClockId,
        reg: usize,
        shift: u32,
        width: u32,
        parents: &'a [ClockId],
        flags: ClockFlags,
    },
    /// Divide-by-`field + 1` divider.
    Div {
        id: ClockId,
        parent: ClockId,
        reg: usize,
        shift: u32,
        width: u32,
        flags: ClockFlags,
    },
    /// Gate asserting `enable_value` at `bit` (1 for plain gates, 3 for
    /// CCM target-root enables).
    Gate {
        id: ClockId,
        parent: ClockId,
        reg: usize,
        bit: u32,
        enable_value: u32,
        flags: ClockFlags,
    },
    /// Fractional-N PLL; `reg` is its CFG0 register.
    FracPll {
        id: ClockId,
        parent: ClockId,
        reg: usize,
    },
    /// SCCG multi-stage PLL; `reg` is its CFG0 register.
    SccgPll {
        id: ClockId,
        parent: ClockId,
        reg: usize,
        critical: bool,
    },
    /// CCM target-root composite with its fixed 8-slot candidate list.
    TargetRoot {
        id: ClockId,
        reg: usize,
        parents: [ClockId; MAX_PARENTS],
        critical: bool,
    },
}

impl ClockDecl<'_> {
    fn id(&self) -> ClockId {
        match *self {
            ClockDecl::Fixed { id, .. }
            | ClockDecl::FixedDiv { id, .. }
            | ClockDecl::Mux { id, .. }
            | ClockDecl::Div { id, .. }
            | ClockDecl::Gate { id, .. }
            | ClockDecl::FracPll { id, .. }
            | ClockDecl::SccgPll { id, .. }
            | ClockDecl::TargetRoot { id, .. } => id,
        }
    }

    /// Every parent id this declaration can ever reference.
    fn parent_ids(&self) -> &[ClockId] {
        match self {
            ClockDecl::Fixed { .. } => &[],
            ClockDecl::FixedDiv { parent, .. }
            | ClockDecl::Div { parent, .. }
            | ClockDecl::Gate { parent, .. }
            | ClockDecl::FracPll { parent, .. }
            | ClockDecl::SccgPll { parent, .. } => core::slice::from_ref(parent),
            ClockDecl::Mux { parents, .. } => parents,
            ClockDecl::TargetRoot { parents, .. } => parents,
        }
    }
}

/// Load a wiring table: validate, install nodes, initialize against live
/// hardware state, and return the controller.
pub fn build<B: RegisterBus>(
    config: TreeConfig,
    decls: &[ClockDecl<'_>],
    bus: B,
) -> Result<ClockController<B>, ConfigError> {
    let mut slots: Vec<Option<ClockNode>> = (0..config.max_id).map(|_| None).collect();

    for decl in decls {
        let id = decl.id();
        if id >= config.max_id {
            return Err(ConfigError::IdOutOfRange(id));
        }
        if slots[id as usize].is_some() {
            return Err(ConfigError::DuplicateId(id));
        }
        for &parent in decl.parent_ids() {
            if parent >= config.max_id {
                return Err(ConfigError::ParentOutOfRange { id, parent });
            }
            if parent > id {
                // Init visits ids in ascending order, so this parent is
                // seeded after its child. Rates recompute on demand, but
                // the topology author should know.
                warn!("clk {}: parent {} initializes later", id, parent);
            }
        }
        slots[id as usize] = Some(node_from_decl(decl)?);
    }

    check_acyclic(&slots)?;

    let tree = ClockTree::new(slots, bus, config.poll_retries);
    tree.init_all();
    debug!(
        "clock tree up: {} ids, dummy id {}",
        config.max_id, config.dummy_id
    );
    Ok(ClockController::new(tree, config.dummy_id))
}

/// Field geometry must describe a non-empty bit range strictly inside a
/// 32-bit register.
fn check_field(id: ClockId, shift: u32, width: u32) -> Result<(), ConfigError> {
    if width == 0 || width >= 32 || shift > 32 - width {
        return Err(ConfigError::InvalidField(id));
    }
    Ok(())
}

fn node_from_decl(decl: &ClockDecl<'_>) -> Result<ClockNode, ConfigError> {
    Ok(match *decl {
        ClockDecl::Fixed { id, rate } => {
            ClockNode::new(id, ClockFlags::FIXED, ClockKind::Fixed { rate })
        }
        ClockDecl::FixedDiv { id, parent, div } => ClockNode::new(
            id,
            ClockFlags::empty(),
            ClockKind::FixedDiv { parent, div },
        ),
        ClockDecl::Mux {
            id,
            reg,
            shift,
            width,
            parents,
            flags,
        } => {
            check_field(id, shift, width)?;
            // The field mask would silently truncate an index beyond the
            // select field's reach, de-syncing the cached parent from
            // hardware.
            if parents.len() > 1 << width {
                return Err(ConfigError::TooManyParents(id));
            }
            let candidates = heapless::Vec::from_slice(parents)
                .map_err(|_| ConfigError::TooManyParents(id))?;
            ClockNode::new(
                id,
                flags,
                ClockKind::Mux {
                    reg,
                    sel: RegField::new(shift, width),
                    parents: candidates,
                    current: Cell::new(None),
                },
            )
        }
        ClockDecl::Div {
            id,
            parent,
            reg,
            shift,
            width,
            flags,
        } => {
            check_field(id, shift, width)?;
            ClockNode::new(
                id,
                flags,
                ClockKind::Div {
                    parent,
                    reg,
                    field: RegField::new(shift, width),
                },
            )
        }
        ClockDecl::Gate {
            id,
            parent,
            reg,
            bit,
            enable_value,
            flags,
        } => {
            if bit >= 32 || enable_value == 0 || enable_value > u32::MAX >> bit {
                return Err(ConfigError::InvalidField(id));
            }
            ClockNode::new(
                id,
                flags,
                ClockKind::Gate {
                    parent,
                    reg,
                    bit,
                    enable_value,
                },
            )
        }
        ClockDecl::FracPll { id, parent, reg } => ClockNode::new(
            id,
            ClockFlags::empty(),
            ClockKind::FracPll { parent, reg },
        ),
        ClockDecl::SccgPll {
            id,
            parent,
            reg,
            critical,
        } => ClockNode::new(
            id,
            ClockFlags::empty(),
            ClockKind::SccgPll {
                parent,
                reg,
                critical,
            },
        ),
        ClockDecl::TargetRoot {
            id,
            reg,
            parents,
            critical,
        } => ClockNode::new(
            id,
            ClockFlags::empty(),
            ClockKind::TargetRoot {
                reg,
                parents,
                current: Cell::new(None),
                critical,
            },
        ),
    })
}

fn candidate_parents(node: &ClockNode) -> &[ClockId] {
    match &node.kind {
        ClockKind::Fixed { .. } => &[],
        ClockKind::FixedDiv { parent, .. }
        | ClockKind::Div { parent, .. }
        | ClockKind::Gate { parent, .. }
        | ClockKind::FracPll { parent, .. }
        | ClockKind::SccgPll { parent, .. } => core::slice::from_ref(parent),
        ClockKind::Mux { parents, .. } => parents,
        ClockKind::TargetRoot { parents, .. } => parents,
    }
}

/// Reject any cycle reachable over the candidate-parent relation. The graph
/// is acyclic by hardware construction; a table that says otherwise is a
/// transcription error, caught here instead of as runaway recursion later.
fn check_acyclic(slots: &[Option<ClockNode>]) -> Result<(), ConfigError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn visit(
        slots: &[Option<ClockNode>],
        marks: &mut [Mark],
        id: ClockId,
    ) -> Result<(), ConfigError> {
        let Some(node) = slots[id as usize].as_ref() else {
            return Ok(());
        };
        match marks[id as usize] {
            Mark::Done => return Ok(()),
            Mark::InProgress => return Err(ConfigError::CycleDetected(id)),
            Mark::Unvisited => {}
        }
        marks[id as usize] = Mark::InProgress;
        for &parent in candidate_parents(node) {
            visit(slots, marks, parent)?;
        }
        marks[id as usize] = Mark::Done;
        Ok(())
    }

    let mut marks = alloc::vec![Mark::Unvisited; slots.len()];
    for id in 0..slots.len() as u32 {
        visit(slots, &mut marks, id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{build, ClockDecl, TreeConfig};
    use crate::error::ConfigError;
    use crate::node::ClockFlags;
    use crate::test_bus::RamBus;

    fn cfg(max_id: u32) -> TreeConfig {
        TreeConfig::new(max_id, 0)
    }

    #[test]
    fn duplicate_id_rejected() {
        let decls = [
            ClockDecl::Fixed { id: 1, rate: 100 },
            ClockDecl::Fixed { id: 1, rate: 200 },
        ];
        assert!(matches!(
            build(cfg(4), &decls, RamBus::new()),
            Err(ConfigError::DuplicateId(1))
        ));
    }

    #[test]
    fn id_space_enforced() {
        let decls = [ClockDecl::Fixed { id: 9, rate: 100 }];
        assert!(matches!(
            build(cfg(4), &decls, RamBus::new()),
            Err(ConfigError::IdOutOfRange(9))
        ));

        let decls = [ClockDecl::FixedDiv {
            id: 1,
            parent: 9,
            div: 2,
        }];
        assert!(matches!(
            build(cfg(4), &decls, RamBus::new()),
            Err(ConfigError::ParentOutOfRange { id: 1, parent: 9 })
        ));
    }

    #[test]
    fn parent_cycle_rejected() {
        let decls = [
            ClockDecl::FixedDiv {
                id: 1,
                parent: 2,
                div: 2,
            },
            ClockDecl::FixedDiv {
                id: 2,
                parent: 1,
                div: 2,
            },
        ];
        assert!(matches!(
            build(cfg(4), &decls, RamBus::new()),
            Err(ConfigError::CycleDetected(_))
        ));
    }

    #[test]
    fn mux_candidate_cycle_rejected() {
        let decls = [
            ClockDecl::Fixed { id: 1, rate: 100 },
            ClockDecl::Mux {
                id: 2,
                reg: 0x10,
                shift: 0,
                width: 1,
                parents: &[1, 3],
                flags: ClockFlags::empty(),
            },
            ClockDecl::FixedDiv {
                id: 3,
                parent: 2,
                div: 2,
            },
        ];
        assert!(matches!(
            build(cfg(4), &decls, RamBus::new()),
            Err(ConfigError::CycleDetected(_))
        ));
    }

    #[test]
    fn mux_candidates_must_fit_select_field() {
        // Five candidates on a 2-bit select field: indices 4+ can never be
        // programmed.
        let decls = [
            ClockDecl::Fixed { id: 1, rate: 100 },
            ClockDecl::Mux {
                id: 2,
                reg: 0x10,
                shift: 0,
                width: 2,
                parents: &[1, 1, 1, 1, 1],
                flags: ClockFlags::empty(),
            },
        ];
        assert!(matches!(
            build(cfg(8), &decls, RamBus::new()),
            Err(ConfigError::TooManyParents(2))
        ));
    }

    #[test]
    fn field_geometry_must_fit_register() {
        let decls = [ClockDecl::Div {
            id: 1,
            parent: 0,
            reg: 0x10,
            shift: 28,
            width: 8,
            flags: ClockFlags::empty(),
        }];
        assert!(matches!(
            build(cfg(8), &decls, RamBus::new()),
            Err(ConfigError::InvalidField(1))
        ));

        let decls = [ClockDecl::Mux {
            id: 1,
            reg: 0x10,
            shift: 0,
            width: 0,
            parents: &[0],
            flags: ClockFlags::empty(),
        }];
        assert!(matches!(
            build(cfg(8), &decls, RamBus::new()),
            Err(ConfigError::InvalidField(1))
        ));

        // A two-bit enable pattern at the top bit spills past the register.
        let decls = [ClockDecl::Gate {
            id: 1,
            parent: 0,
            reg: 0x10,
            bit: 31,
            enable_value: 3,
            flags: ClockFlags::empty(),
        }];
        assert!(matches!(
            build(cfg(8), &decls, RamBus::new()),
            Err(ConfigError::InvalidField(1))
        ));
    }

    #[test]
    fn valid_table_builds_and_initializes() {
        let decls = [
            ClockDecl::Fixed { id: 0, rate: 0 }, // dummy slot
            ClockDecl::Fixed {
                id: 1,
                rate: 25_000_000,
            },
            ClockDecl::FixedDiv {
                id: 2,
                parent: 1,
                div: 5,
            },
        ];
        let ctrl = build(cfg(4), &decls, RamBus::new()).unwrap();
        assert_eq!(ctrl.max_id(), 4);
        assert_eq!(ctrl.rate(2), Ok(5_000_000));
    }
}
