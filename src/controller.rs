// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Caller-facing registry operations.
//!
//! The controller fronts the [`ClockTree`] with id-space policing: out of
//! range ids and the reserved dummy id are rejected up front with
//! [`ClockError::InvalidId`], before any node is consulted. Rates cross
//! this boundary as `u64`; the tree works in `u32` internally, which covers
//! every rate this hardware can produce.

use log::debug;

use crate::bus::RegisterBus;
use crate::error::ClockError;
use crate::node::{ClockId, RateDesc};
use crate::tree::ClockTree;

pub struct ClockController<B: RegisterBus> {
    tree: ClockTree<B>,
    dummy_id: ClockId,
}

impl<B: RegisterBus> ClockController<B> {
    pub(crate) fn new(tree: ClockTree<B>, dummy_id: ClockId) -> Self {
        ClockController { tree, dummy_id }
    }

    /// One past the largest addressable clock id.
    pub fn max_id(&self) -> u32 {
        self.tree.max_id()
    }

    fn check_id(&self, id: ClockId) -> Result<(), ClockError> {
        if id >= self.tree.max_id() || id == self.dummy_id {
            return Err(ClockError::InvalidId);
        }
        Ok(())
    }

    /// Cached gate state of `id`.
    pub fn is_enabled(&self, id: ClockId) -> Result<bool, ClockError> {
        self.check_id(id)?;
        self.tree.is_enabled(id)
    }

    /// Ungate `id`, recursing into parents where the node's flags allow.
    pub fn enable(&self, id: ClockId) -> Result<(), ClockError> {
        self.check_id(id)?;
        debug!("clk {}: enable", id);
        self.tree.enable(id)
    }

    /// Gate `id`. Critical clocks and sources refuse.
    pub fn disable(&self, id: ClockId) -> Result<(), ClockError> {
        self.check_id(id)?;
        debug!("clk {}: disable", id);
        self.tree.disable(id)
    }

    /// Current output rate of `id` in Hz.
    pub fn rate(&self, id: ClockId) -> Result<u64, ClockError> {
        self.check_id(id)?;
        self.tree.get_rate(id).map(u64::from)
    }

    /// Program `id` to the closest achievable rate at or around `target` Hz.
    pub fn set_rate(&self, id: ClockId, target: u64) -> Result<(), ClockError> {
        self.check_id(id)?;
        let target = u32::try_from(target).map_err(|_| ClockError::OperationFailed)?;
        debug!("clk {}: set_rate {}", id, target);
        self.tree.set_rate(id, target)
    }

    /// Switch `id`'s input to candidate `parent`.
    pub fn set_parent(&self, id: ClockId, parent: ClockId) -> Result<(), ClockError> {
        self.check_id(id)?;
        self.check_id(parent)?;
        debug!("clk {}: set_parent {}", id, parent);
        self.tree.set_parent(id, parent)
    }

    /// Clock id currently feeding `id`.
    pub fn parent(&self, id: ClockId) -> Result<ClockId, ClockError> {
        self.check_id(id)?;
        self.tree.get_parent(id)
    }

    /// Achievable-rate description of `id`.
    pub fn describe_rate(&self, id: ClockId) -> Result<RateDesc, ClockError> {
        self.check_id(id)?;
        self.tree.describe_rate(id)
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::{build, ClockDecl, TreeConfig};
    use crate::error::ClockError;
    use crate::test_bus::RamBus;

    fn controller() -> crate::ClockController<RamBus> {
        let decls = [
            ClockDecl::Fixed { id: 0, rate: 0 },
            ClockDecl::Fixed {
                id: 1,
                rate: 24_000_000,
            },
        ];
        build(TreeConfig::new(8, 0), &decls, RamBus::new()).unwrap()
    }

    #[test]
    fn dummy_id_rejected_before_lookup() {
        let ctrl = controller();
        // Slot 0 holds a node, but the reserved id wins.
        assert_eq!(ctrl.rate(0), Err(ClockError::InvalidId));
        assert_eq!(ctrl.enable(0), Err(ClockError::InvalidId));
        assert_eq!(ctrl.is_enabled(0), Err(ClockError::InvalidId));
    }

    #[test]
    fn out_of_range_id_rejected() {
        let ctrl = controller();
        assert_eq!(ctrl.rate(8), Err(ClockError::InvalidId));
        assert_eq!(ctrl.rate(u32::MAX), Err(ClockError::InvalidId));
    }

    #[test]
    fn empty_slot_is_unsupported_not_invalid() {
        let ctrl = controller();
        assert_eq!(ctrl.rate(5), Err(ClockError::Unsupported));
    }

    #[test]
    fn oversized_rate_request_fails_cleanly() {
        let ctrl = controller();
        assert_eq!(
            ctrl.set_rate(1, u64::from(u32::MAX) + 1),
            Err(ClockError::OperationFailed)
        );
    }

    #[test]
    fn fixed_source_reports_rate() {
        let ctrl = controller();
        assert_eq!(ctrl.rate(1), Ok(24_000_000));
        assert!(ctrl.is_enabled(1).unwrap());
    }
}
