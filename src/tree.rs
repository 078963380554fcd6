// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The clock graph arena and the per-variant rate/enable/parent algorithms.
//!
//! Nodes are owned by an id-indexed slot array; parent links are clock ids
//! resolved through the same array, so traversal is always bounds-checked
//! and the graph carries no raw references. Operations take `&self` and
//! update cached state through `Cell`s, which lets a node recurse into its
//! parents without aliasing trouble. Acyclicity is enforced when the
//! topology loads, not here.

use alloc::vec::Vec;

use log::trace;
use tock_registers::fields::Field;
use tock_registers::LocalRegisterCopy;

use crate::bus::{poll_until_set, RegisterBus};
use crate::error::ClockError;
use crate::frac_pll;
use crate::node::{ClockFlags, ClockId, ClockKind, ClockNode, RateDesc};
use crate::sccg_pll;
use crate::target_root::{self, TARGET_ROOT};

/// Registry-owned clock graph: every node of the chip, indexed by clock id.
pub struct ClockTree<B: RegisterBus> {
    slots: Vec<Option<ClockNode>>,
    bus: B,
    poll_retries: u32,
}

/// Field covering a gate's enable pattern (`enable_value` bits at `bit`).
fn gate_field(bit: u32, enable_value: u32) -> Field<u32, ()> {
    Field::new(enable_value, bit as usize)
}

impl<B: RegisterBus> ClockTree<B> {
    pub(crate) fn new(slots: Vec<Option<ClockNode>>, bus: B, poll_retries: u32) -> Self {
        ClockTree {
            slots,
            bus,
            poll_retries,
        }
    }

    /// Number of id slots, registered or not.
    pub fn max_id(&self) -> u32 {
        self.slots.len() as u32
    }

    fn node(&self, id: ClockId) -> Result<&ClockNode, ClockError> {
        self.slots
            .get(id as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or(ClockError::Unsupported)
    }

    /// Cached gate state. Never touches hardware.
    pub fn is_enabled(&self, id: ClockId) -> Result<bool, ClockError> {
        Ok(self.node(id)?.enabled.get())
    }

    /// Output frequency in Hz. Derived variants recompute through their
    /// parents; PLLs and composite roots report their cached value.
    pub fn get_rate(&self, id: ClockId) -> Result<u32, ClockError> {
        let node = self.node(id)?;
        match &node.kind {
            ClockKind::Fixed { rate } => Ok(*rate),
            ClockKind::FixedDiv { parent, div } => {
                let rate = self.get_rate(*parent)? / div;
                node.rate.set(rate);
                Ok(rate)
            }
            ClockKind::Mux { current, .. } => {
                let parent = current.get().ok_or(ClockError::OperationFailed)?;
                self.get_rate(parent)
            }
            ClockKind::Div { parent, reg, field } => match self.get_rate(*parent) {
                Ok(prate) => {
                    let raw = LocalRegisterCopy::<u32, ()>::new(self.bus.read32(*reg));
                    let rate = prate / (raw.read(field.field()) + 1);
                    node.rate.set(rate);
                    Ok(rate)
                }
                // Parent rate unknown right now; report the last observed
                // rate rather than failing a pure query.
                Err(_) => Ok(node.rate.get()),
            },
            ClockKind::Gate { parent, .. } => self.get_rate(*parent),
            ClockKind::FracPll { .. } => Ok(node.rate.get()),
            ClockKind::SccgPll { parent, reg, .. } => {
                let prate = self.get_rate(*parent)?;
                let rate = sccg_pll::rate_from_regs(
                    prate,
                    self.bus.read32(*reg),
                    self.bus.read32(*reg + sccg_pll::CFG1_OFFSET),
                    self.bus.read32(*reg + sccg_pll::CFG2_OFFSET),
                )
                .ok_or(ClockError::OperationFailed)?;
                node.rate.set(rate);
                Ok(rate)
            }
            ClockKind::TargetRoot { .. } => Ok(node.rate.get()),
        }
    }

    /// Retune a clock to `target` Hz, recursing into the parent where the
    /// variant derives its rate.
    pub fn set_rate(&self, id: ClockId, target: u32) -> Result<(), ClockError> {
        let node = self.node(id)?;
        match &node.kind {
            ClockKind::Fixed { .. } | ClockKind::Gate { .. } => Err(ClockError::Unsupported),
            ClockKind::FixedDiv { parent, div } => {
                let wanted = target.checked_mul(*div).ok_or(ClockError::OperationFailed)?;
                self.set_rate(*parent, wanted)?;
                // The parent may have rounded; derive from what it actually
                // runs at, never from the request.
                let actual = self.get_rate(*parent)?;
                node.rate.set(actual / div);
                Ok(())
            }
            ClockKind::Mux { current, .. } => {
                let parent = current.get().ok_or(ClockError::OperationFailed)?;
                self.set_rate(parent, target)
            }
            ClockKind::Div { parent, reg, field } => {
                if target == 0 {
                    return Err(ClockError::OperationFailed);
                }
                let prate = self.get_rate(*parent)?;
                let div = prate.div_ceil(target);
                if div == 0 || div - 1 > field.max() {
                    return Err(ClockError::OperationFailed);
                }
                let raw = self.bus.read32(*reg);
                self.bus.write32(*reg, field.field().val(div - 1).modify(raw));
                node.rate.set(prate / div);
                Ok(())
            }
            ClockKind::FracPll { parent, reg } => self.frac_pll_set_rate(node, *parent, *reg, target),
            // Rate programming is not implemented for the SCCG PLLs; the
            // request is accepted and ignored.
            ClockKind::SccgPll { .. } => Ok(()),
            ClockKind::TargetRoot { reg, current, .. } => {
                let parent = current.get().ok_or(ClockError::OperationFailed)?;
                let prate = self.get_rate(parent)?;
                let (pre, post) = target_root::best_dividers(prate, target);
                let raw = self.bus.read32(*reg);
                let podfs = TARGET_ROOT::PRE_PODF.val(pre - 1) + TARGET_ROOT::POST_PODF.val(post - 1);
                self.bus.write32(*reg, podfs.modify(raw));
                node.rate.set(target_root::divided_rate(prate, pre, post));
                Ok(())
            }
        }
    }

    fn frac_pll_set_rate(
        &self,
        node: &ClockNode,
        parent: ClockId,
        reg: usize,
        target: u32,
    ) -> Result<(), ClockError> {
        let prate = self.get_rate(parent)?;
        let divs = frac_pll::compute_dividers(prate, target).ok_or(ClockError::OperationFailed)?;

        let cfg1_addr = reg + frac_pll::CFG1_OFFSET;
        let cfg1 = self.bus.read32(cfg1_addr);
        let dividers = frac_pll::CFG1::INT_DIV.val(divs.int_div - 1)
            + frac_pll::CFG1::FRAC_DIV.val(divs.frac_div);
        self.bus.write32(cfg1_addr, dividers.modify(cfg1));

        // Output divider back to its minimum of 2.
        let cfg0 = self.bus.read32(reg);
        self.bus
            .write32(reg, frac_pll::CFG0::OUTPUT_DIV.val(0).modify(cfg0));

        // Strobe the new-divider handshake. The hardware only acknowledges
        // while running, so a bypassed or powered-down PLL is not waited on.
        let cfg0 = self.bus.read32(reg);
        self.bus
            .write32(reg, frac_pll::CFG0::NEWDIV_VAL::SET.modify(cfg0));
        let state = LocalRegisterCopy::<u32, frac_pll::CFG0::Register>::new(cfg0);
        if !state.is_set(frac_pll::CFG0::BYPASS) && !state.is_set(frac_pll::CFG0::PD) {
            poll_until_set(
                &self.bus,
                reg,
                frac_pll::CFG0::NEWDIV_ACK,
                self.poll_retries,
            )?;
        }
        let cfg0 = self.bus.read32(reg);
        self.bus
            .write32(reg, frac_pll::CFG0::NEWDIV_VAL::CLEAR.modify(cfg0));

        node.rate.set(target);
        Ok(())
    }

    /// Reparent a mux or composite root onto `new_parent`, which must be in
    /// the node's candidate list. Fails without side effects otherwise.
    pub fn set_parent(&self, id: ClockId, new_parent: ClockId) -> Result<(), ClockError> {
        let node = self.node(id)?;
        match &node.kind {
            ClockKind::Mux {
                reg,
                sel,
                parents,
                current,
            } => {
                let idx = parents
                    .iter()
                    .position(|&candidate| candidate == new_parent)
                    .ok_or(ClockError::OperationFailed)?;
                let raw = self.bus.read32(*reg);
                self.bus
                    .write32(*reg, sel.field().val(idx as u32).modify(raw));
                current.set(Some(new_parent));
                if node.flags.contains(ClockFlags::ENABLE_PARENT) {
                    node.enabled.set(self.enable(new_parent).is_ok());
                }
                if let Ok(rate) = self.get_rate(new_parent) {
                    node.rate.set(rate);
                }
                Ok(())
            }
            ClockKind::TargetRoot {
                reg,
                parents,
                current,
                ..
            } => {
                let idx = parents
                    .iter()
                    .position(|&candidate| candidate == new_parent)
                    .ok_or(ClockError::OperationFailed)?;
                let raw = self.bus.read32(*reg);
                let raw = TARGET_ROOT::MUX.val(idx as u32).modify(raw);
                self.bus.write32(*reg, raw);
                current.set(Some(new_parent));
                if let Ok(prate) = self.get_rate(new_parent) {
                    let regval = LocalRegisterCopy::<u32, TARGET_ROOT::Register>::new(raw);
                    let pre = regval.read(TARGET_ROOT::PRE_PODF) + 1;
                    let post = regval.read(TARGET_ROOT::POST_PODF) + 1;
                    node.rate.set(target_root::divided_rate(prate, pre, post));
                }
                Ok(())
            }
            _ => Err(ClockError::Unsupported),
        }
    }

    /// Current parent id. For a mux this is only defined while the mux
    /// itself is enabled.
    pub fn get_parent(&self, id: ClockId) -> Result<ClockId, ClockError> {
        let node = self.node(id)?;
        match &node.kind {
            ClockKind::Fixed { .. } => Err(ClockError::Unsupported),
            ClockKind::FixedDiv { parent, .. }
            | ClockKind::Div { parent, .. }
            | ClockKind::Gate { parent, .. }
            | ClockKind::FracPll { parent, .. }
            | ClockKind::SccgPll { parent, .. } => Ok(*parent),
            ClockKind::Mux { current, .. } => {
                if node.enabled.get() {
                    current.get().ok_or(ClockError::OperationFailed)
                } else {
                    Err(ClockError::OperationFailed)
                }
            }
            ClockKind::TargetRoot { current, .. } => {
                current.get().ok_or(ClockError::OperationFailed)
            }
        }
    }

    /// Ungate a clock, recursing into the parent where the node's flags
    /// permit it.
    pub fn enable(&self, id: ClockId) -> Result<(), ClockError> {
        let node = self.node(id)?;
        match &node.kind {
            ClockKind::Fixed { .. } => {
                node.enabled.set(true);
                Ok(())
            }
            ClockKind::FixedDiv { parent, .. } => {
                if self.is_enabled(*parent)? {
                    node.enabled.set(true);
                    Ok(())
                } else {
                    Err(ClockError::OperationFailed)
                }
            }
            // Muxes and register dividers hold no gate of their own; a
            // re-probe of the register state decides whether they count as
            // running.
            ClockKind::Mux { .. } | ClockKind::Div { .. } => {
                if node.enabled.get() {
                    return Ok(());
                }
                self.init_node(node);
                if node.enabled.get() {
                    Ok(())
                } else {
                    Err(ClockError::OperationFailed)
                }
            }
            ClockKind::Gate {
                parent,
                reg,
                bit,
                enable_value,
            } => {
                if node.flags.contains(ClockFlags::ENABLE_PARENT) {
                    self.enable(*parent)?;
                }
                let raw = self.bus.read32(*reg);
                let pattern = gate_field(*bit, *enable_value).val(*enable_value);
                self.bus.write32(*reg, pattern.modify(raw));
                node.enabled.set(true);
                Ok(())
            }
            ClockKind::FracPll { reg, .. } => {
                if node.enabled.get() {
                    return Ok(());
                }
                let raw = self.bus.read32(*reg);
                self.bus.write32(*reg, frac_pll::CFG0::PD::CLEAR.modify(raw));
                poll_until_set(&self.bus, *reg, frac_pll::CFG0::LOCK, self.poll_retries)?;
                node.enabled.set(true);
                Ok(())
            }
            ClockKind::SccgPll { reg, .. } => {
                if node.enabled.get() {
                    return Ok(());
                }
                let raw = self.bus.read32(*reg);
                self.bus.write32(*reg, sccg_pll::CFG0::PD::CLEAR.modify(raw));
                // Fully bypassed to the reference there is nothing to lock.
                let state = LocalRegisterCopy::<u32, sccg_pll::CFG0::Register>::new(raw);
                if !state.is_set(sccg_pll::CFG0::BYPASS2) {
                    poll_until_set(&self.bus, *reg, sccg_pll::CFG0::LOCK, self.poll_retries)?;
                }
                node.enabled.set(true);
                Ok(())
            }
            ClockKind::TargetRoot { reg, current, .. } => {
                let parent = current.get().ok_or(ClockError::OperationFailed)?;
                if !self.is_enabled(parent)? {
                    return Err(ClockError::OperationFailed);
                }
                let raw = self.bus.read32(*reg);
                self.bus.write32(*reg, TARGET_ROOT::ENABLE::SET.modify(raw));
                node.enabled.set(true);
                Ok(())
            }
        }
    }

    /// Gate a clock off. Critical nodes refuse; pure sources and fixed
    /// dividers cannot be gated at this layer.
    pub fn disable(&self, id: ClockId) -> Result<(), ClockError> {
        let node = self.node(id)?;
        match &node.kind {
            ClockKind::Fixed { .. } | ClockKind::FixedDiv { .. } => Err(ClockError::Unsupported),
            ClockKind::Mux { current, .. } => {
                if !node.flags.contains(ClockFlags::DISABLE_PARENT) {
                    return Err(ClockError::Unsupported);
                }
                let parent = current.get().ok_or(ClockError::OperationFailed)?;
                self.disable(parent)?;
                node.enabled.set(false);
                Ok(())
            }
            ClockKind::Div { parent, .. } => {
                if !node.enabled.get() {
                    return Err(ClockError::OperationFailed);
                }
                if !node.flags.contains(ClockFlags::DISABLE_PARENT) {
                    return Err(ClockError::Unsupported);
                }
                self.disable(*parent)?;
                node.enabled.set(false);
                Ok(())
            }
            // Gating off is always reachable.
            ClockKind::Gate {
                reg,
                bit,
                enable_value,
                ..
            } => {
                let raw = self.bus.read32(*reg);
                let cleared = gate_field(*bit, *enable_value).val(0);
                self.bus.write32(*reg, cleared.modify(raw));
                node.enabled.set(false);
                Ok(())
            }
            ClockKind::FracPll { reg, .. } => {
                if node.enabled.get() {
                    let raw = self.bus.read32(*reg);
                    self.bus.write32(*reg, frac_pll::CFG0::PD::SET.modify(raw));
                    node.enabled.set(false);
                }
                Ok(())
            }
            ClockKind::SccgPll { reg, critical, .. } => {
                if *critical {
                    return Err(ClockError::Unsupported);
                }
                if node.enabled.get() {
                    let raw = self.bus.read32(*reg);
                    self.bus.write32(*reg, sccg_pll::CFG0::PD::SET.modify(raw));
                    node.enabled.set(false);
                }
                Ok(())
            }
            ClockKind::TargetRoot { reg, critical, .. } => {
                if *critical {
                    return Err(ClockError::Unsupported);
                }
                let raw = self.bus.read32(*reg);
                self.bus.write32(*reg, TARGET_ROOT::ENABLE::CLEAR.modify(raw));
                node.enabled.set(false);
                Ok(())
            }
        }
    }

    /// Rate description for `DescribeRate`: every variant currently reports
    /// its single present rate; fixed sources report their constant without
    /// touching the graph.
    pub fn describe_rate(&self, id: ClockId) -> Result<RateDesc, ClockError> {
        let node = self.node(id)?;
        if let ClockKind::Fixed { rate } = &node.kind {
            return Ok(RateDesc::single(u64::from(*rate)));
        }
        let rate = self.get_rate(id)?;
        Ok(RateDesc::single(u64::from(rate)))
    }

    /// One-time initialization pass: ascending id order, seeding cached
    /// rate/enable state from live registers. This is registration order,
    /// not topological order; derived nodes recompute through their parents
    /// on demand, which keeps forward references benign for rate queries.
    pub(crate) fn init_all(&self) {
        for slot in self.slots.iter() {
            if let Some(node) = slot {
                self.init_node(node);
                trace!(
                    "clk {}: init rate={} enabled={}",
                    node.id,
                    node.rate.get(),
                    node.enabled.get()
                );
            }
        }
    }

    fn init_node(&self, node: &ClockNode) {
        match &node.kind {
            ClockKind::Fixed { rate } => {
                node.rate.set(*rate);
                node.enabled.set(true);
            }
            ClockKind::FixedDiv { parent, div } => {
                if let Ok(prate) = self.get_rate(*parent) {
                    node.rate.set(prate / div);
                }
                node.enabled
                    .set(self.is_enabled(*parent).unwrap_or(false));
            }
            ClockKind::Mux {
                reg,
                sel,
                parents,
                current,
            } => {
                let raw = LocalRegisterCopy::<u32, ()>::new(self.bus.read32(*reg));
                let idx = raw.read(sel.field()) as usize;
                match parents.get(idx).copied() {
                    Some(parent) => {
                        current.set(Some(parent));
                        if node.flags.contains(ClockFlags::ENABLE_PARENT) {
                            node.enabled.set(self.enable(parent).is_ok());
                        } else {
                            node.enabled.set(self.is_enabled(parent).unwrap_or(false));
                        }
                        if let Ok(rate) = self.get_rate(parent) {
                            node.rate.set(rate);
                        }
                    }
                    None => {
                        current.set(None);
                        node.enabled.set(false);
                    }
                }
            }
            ClockKind::Div { parent, reg, field } => match self.get_rate(*parent) {
                Ok(prate) => {
                    let raw = LocalRegisterCopy::<u32, ()>::new(self.bus.read32(*reg));
                    node.rate.set(prate / (raw.read(field.field()) + 1));
                    if node.flags.contains(ClockFlags::ENABLE_PARENT) {
                        node.enabled.set(self.enable(*parent).is_ok());
                    } else {
                        node.enabled.set(self.is_enabled(*parent).unwrap_or(false));
                    }
                }
                Err(_) => node.enabled.set(false),
            },
            ClockKind::Gate {
                parent,
                reg,
                bit,
                enable_value,
            } => {
                if node.flags.contains(ClockFlags::ENABLE_PARENT)
                    && self.enable(*parent).is_err()
                {
                    node.enabled.set(false);
                    return;
                }
                let pattern = enable_value << bit;
                node.enabled
                    .set(self.bus.read32(*reg) & pattern == pattern);
                if let Ok(rate) = self.get_rate(*parent) {
                    node.rate.set(rate);
                }
            }
            ClockKind::FracPll { parent, reg } => {
                let Ok(prate) = self.get_rate(*parent) else {
                    return;
                };
                let cfg0_raw = self.bus.read32(*reg);
                let cfg1_raw = self.bus.read32(*reg + frac_pll::CFG1_OFFSET);
                let cfg0 = LocalRegisterCopy::<u32, frac_pll::CFG0::Register>::new(cfg0_raw);
                node.enabled.set(!cfg0.is_set(frac_pll::CFG0::PD));
                if cfg0.is_set(frac_pll::CFG0::BYPASS) {
                    // Bypass routes the raw reference around the pre-divider;
                    // read through to the grandparent.
                    if let Ok(grandparent) = self.get_parent(*parent) {
                        if let Ok(rate) = self.get_rate(grandparent) {
                            node.rate.set(rate);
                        }
                    }
                } else {
                    node.rate
                        .set(frac_pll::rate_from_regs(prate, cfg0_raw, cfg1_raw));
                }
            }
            ClockKind::SccgPll { parent, reg, .. } => {
                let Ok(prate) = self.get_rate(*parent) else {
                    return;
                };
                let cfg0_raw = self.bus.read32(*reg);
                let rate = sccg_pll::rate_from_regs(
                    prate,
                    cfg0_raw,
                    self.bus.read32(*reg + sccg_pll::CFG1_OFFSET),
                    self.bus.read32(*reg + sccg_pll::CFG2_OFFSET),
                );
                // Spread-spectrum state is left untouched: no rate can be
                // reported for it.
                if let Some(rate) = rate {
                    node.rate.set(rate);
                    let cfg0 = LocalRegisterCopy::<u32, sccg_pll::CFG0::Register>::new(cfg0_raw);
                    node.enabled.set(!cfg0.is_set(sccg_pll::CFG0::PD));
                }
            }
            ClockKind::TargetRoot {
                reg,
                parents,
                current,
                ..
            } => {
                let raw = LocalRegisterCopy::<u32, TARGET_ROOT::Register>::new(self.bus.read32(*reg));
                node.enabled.set(raw.is_set(TARGET_ROOT::ENABLE));
                let idx = raw.read(TARGET_ROOT::MUX) as usize;
                let parent = parents[idx];
                current.set(Some(parent));
                if let Ok(prate) = self.get_rate(parent) {
                    let pre = raw.read(TARGET_ROOT::PRE_PODF) + 1;
                    let post = raw.read(TARGET_ROOT::POST_PODF) + 1;
                    node.rate.set(target_root::divided_rate(prate, pre, post));
                }
            }
        }
    }
}
