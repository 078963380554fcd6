// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory register bank for unit tests.

use core::cell::RefCell;

use alloc::collections::BTreeMap;

use crate::bus::RegisterBus;

/// Sparse RAM-backed register bank. Unwritten registers read as zero.
pub(crate) struct RamBus {
    regs: RefCell<BTreeMap<usize, u32>>,
}

impl RamBus {
    pub(crate) fn new() -> Self {
        RamBus {
            regs: RefCell::new(BTreeMap::new()),
        }
    }

    /// Seed a register without going through the trait, for readability at
    /// test setup sites.
    pub(crate) fn seed(&self, addr: usize, value: u32) {
        self.regs.borrow_mut().insert(addr, value);
    }
}

impl RegisterBus for RamBus {
    fn read32(&self, addr: usize) -> u32 {
        self.regs.borrow().get(&addr).copied().unwrap_or(0)
    }

    fn write32(&self, addr: usize, value: u32) {
        self.regs.borrow_mut().insert(addr, value);
    }
}
