// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Register-bank accessor boundary.

use log::warn;
use tock_registers::fields::Field;
use tock_registers::{LocalRegisterCopy, RegisterLongName};

use crate::error::ClockError;

/// 32-bit access to the mapped clock register banks.
///
/// Implementors own the mapping of the CCM and ANATOP banks and the
/// volatility of the accesses; addresses are whatever the topology
/// declarations carry. Reads and writes must not have side effects beyond
/// the addressed register.
pub trait RegisterBus {
    fn read32(&self, addr: usize) -> u32;
    fn write32(&self, addr: usize, value: u32);
}

impl<T: RegisterBus + ?Sized> RegisterBus for &T {
    fn read32(&self, addr: usize) -> u32 {
        (**self).read32(addr)
    }

    fn write32(&self, addr: usize, value: u32) {
        (**self).write32(addr, value)
    }
}

/// Re-read `addr` until `field` is set, giving up after `retries` reads.
///
/// Status bits with no handshake deadline (PLL lock, new-divider ack) are
/// waited on with a bounded loop; expiry surfaces as
/// [`ClockError::HardwareTimeout`] instead of hanging the whole service on a
/// wedged PLL.
pub(crate) fn poll_until_set<B: RegisterBus, R: RegisterLongName>(
    bus: &B,
    addr: usize,
    field: Field<u32, R>,
    retries: u32,
) -> Result<(), ClockError> {
    for _ in 0..retries {
        let status = LocalRegisterCopy::<u32, R>::new(bus.read32(addr));
        if status.is_set(field) {
            return Ok(());
        }
    }
    warn!("status bit at {:#x} never asserted", addr);
    Err(ClockError::HardwareTimeout)
}

#[cfg(test)]
mod tests {
    use super::{poll_until_set, RegisterBus};
    use crate::error::ClockError;
    use crate::test_bus::RamBus;
    use tock_registers::fields::Field;

    const READY: Field<u32, ()> = Field::new(1, 31);

    #[test]
    fn poll_sees_asserted_bit() {
        let bus = RamBus::new();
        bus.write32(0x10, 1 << 31);
        assert_eq!(poll_until_set(&bus, 0x10, READY, 4), Ok(()));
    }

    #[test]
    fn poll_expires_on_dead_bit() {
        let bus = RamBus::new();
        bus.write32(0x10, 0);
        assert_eq!(
            poll_until_set(&bus, 0x10, READY, 4),
            Err(ClockError::HardwareTimeout)
        );
    }
}
