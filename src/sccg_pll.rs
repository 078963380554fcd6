// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! SCCG (spread-spectrum capable) multi-stage PLL register layout and rate
//! formulas.
//!
//! The ARM/DRAM/video2 PLLs run the reference through a divider pair
//! (DIVR1/DIVR2), a feedback pair (DIVF1/DIVF2), and an output divider,
//! with two bypass bits short-circuiting stages:
//!
//! - no bypass: `ref / (divr1+1) * 2 * (divf1+1) * (divf2+1) / (divr2+1) / (divout+1)`
//! - BYPASS1:   `ref * divf2 / (divr2+1) / (divout+1)`
//! - BYPASS2:   `ref` (straight through)
//!
//! Spread-spectrum mode dithers the feedback divider; a rate computed while
//! SSE is set would be a fiction, so rate queries refuse instead.

use tock_registers::register_bitfields;
use tock_registers::LocalRegisterCopy;

register_bitfields![u32,
    pub CFG0 [
        REFCLK_SEL OFFSET(0) NUMBITS(2) [
            Ref25M = 0,
            Ref27M = 1,
            HdmiPhy27M = 2,
            ClkPN = 3
        ],
        COUNTCLK_SEL OFFSET(2) NUMBITS(1) [],
        LOCK_SEL OFFSET(3) NUMBITS(1) [],
        /// Bypass the whole PLL to the reference
        BYPASS2 OFFSET(4) NUMBITS(1) [],
        /// Bypass the first divider/feedback stage
        BYPASS1 OFFSET(5) NUMBITS(1) [],
        PD_OVERRIDE OFFSET(6) NUMBITS(1) [],
        /// Power down
        PD OFFSET(7) NUMBITS(1) [],
        OVERRIDE OFFSET(8) NUMBITS(1) [],
        CLKE OFFSET(9) NUMBITS(1) [],
        /// Lock status
        LOCK OFFSET(31) NUMBITS(1) []
    ],
    pub CFG1 [
        /// Spread-spectrum enable
        SSE OFFSET(0) NUMBITS(1) [],
        /// Spread-spectrum modulation frequency
        SSMF OFFSET(1) NUMBITS(4) [],
        /// Spread-spectrum modulation depth
        SSMD OFFSET(5) NUMBITS(3) [],
        SSDS OFFSET(8) NUMBITS(1) []
    ],
    pub CFG2 [
        FILTER_RANGE OFFSET(0) NUMBITS(1) [],
        OUTPUT_DIV OFFSET(1) NUMBITS(6) [],
        FEEDBACK_DIVF2 OFFSET(7) NUMBITS(6) [],
        FEEDBACK_DIVF1 OFFSET(13) NUMBITS(6) [],
        REF_DIVR2 OFFSET(19) NUMBITS(6) [],
        REF_DIVR1 OFFSET(25) NUMBITS(3) []
    ],
];

/// Byte offsets of CFG1/CFG2 from the PLL's CFG0 register.
pub(crate) const CFG1_OFFSET: usize = 0x4;
pub(crate) const CFG2_OFFSET: usize = 0x8;

/// Compute the output rate from the three configuration registers and the
/// parent rate. `None` while spread-spectrum mode is enabled.
pub(crate) fn rate_from_regs(parent: u32, cfg0: u32, cfg1: u32, cfg2: u32) -> Option<u32> {
    let cfg0 = LocalRegisterCopy::<u32, CFG0::Register>::new(cfg0);
    let cfg1 = LocalRegisterCopy::<u32, CFG1::Register>::new(cfg1);
    let cfg2 = LocalRegisterCopy::<u32, CFG2::Register>::new(cfg2);

    if cfg1.is_set(CFG1::SSE) {
        return None;
    }

    let divr1 = u64::from(cfg2.read(CFG2::REF_DIVR1));
    let divr2 = u64::from(cfg2.read(CFG2::REF_DIVR2));
    let divf1 = u64::from(cfg2.read(CFG2::FEEDBACK_DIVF1));
    let divf2 = u64::from(cfg2.read(CFG2::FEEDBACK_DIVF2));
    let divout = u64::from(cfg2.read(CFG2::OUTPUT_DIV));
    let parent = u64::from(parent);

    let rate = if cfg0.is_set(CFG0::BYPASS2) {
        parent
    } else if cfg0.is_set(CFG0::BYPASS1) {
        parent * divf2 / ((divr2 + 1) * (divout + 1))
    } else {
        parent * 2 * (divf1 + 1) * (divf2 + 1) / ((divr1 + 1) * (divr2 + 1) * (divout + 1))
    };

    Some(u32::try_from(rate).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::{rate_from_regs, CFG0, CFG2};

    const REF_25M: u32 = 25_000_000;

    fn cfg2(divr1: u32, divr2: u32, divf1: u32, divf2: u32, divout: u32) -> u32 {
        u32::from(
            CFG2::REF_DIVR1.val(divr1)
                + CFG2::REF_DIVR2.val(divr2)
                + CFG2::FEEDBACK_DIVF1.val(divf1)
                + CFG2::FEEDBACK_DIVF2.val(divf2)
                + CFG2::OUTPUT_DIV.val(divout),
        )
    }

    #[test]
    fn full_divide_mode() {
        // 25 MHz * 2 * 30 * 2 / (1 * 3 * 2) = 500 MHz
        let regs = cfg2(0, 2, 29, 1, 1);
        assert_eq!(rate_from_regs(REF_25M, 0, 0, regs), Some(500_000_000));
    }

    #[test]
    fn bypass1_skips_first_stage() {
        let cfg0 = u32::from(CFG0::BYPASS1::SET);
        // 25 MHz * 8 / (1 * 2) = 100 MHz; DIVF1/DIVR1 ignored.
        let regs = cfg2(5, 0, 63, 8, 1);
        assert_eq!(rate_from_regs(REF_25M, cfg0, 0, regs), Some(100_000_000));
    }

    #[test]
    fn bypass2_passes_reference_through() {
        let cfg0 = u32::from(CFG0::BYPASS2::SET);
        let regs = cfg2(7, 63, 63, 63, 63);
        assert_eq!(rate_from_regs(REF_25M, cfg0, 0, regs), Some(REF_25M));
    }

    #[test]
    fn spread_spectrum_refuses_rate() {
        assert_eq!(rate_from_regs(REF_25M, 0, 1, cfg2(0, 0, 0, 0, 0)), None);
    }
}
