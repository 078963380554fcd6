// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fractional-N PLL register layout and frequency-synthesis math.
//!
//! The GPU/VPU/audio/video PLLs synthesize `parent * 8 * (divint +
//! divfrac / 2^24) / divout` with a 7-bit integer divider, a 24-bit binary
//! fractional divider, and an output divider programmed as `(field + 1) * 2`.
//! The scale factors (8 on the reference, 2 on the target) keep the
//! intermediate products inside 64 bits without losing fractional
//! precision.

use tock_registers::register_bitfields;

register_bitfields![u32,
    pub CFG0 [
        /// Output divider, programmed as (value + 1) * 2
        OUTPUT_DIV OFFSET(0) NUMBITS(5) [],
        /// Reference clock pre-divider
        REFCLK_DIV OFFSET(5) NUMBITS(6) [],
        /// Hardware acknowledge for a divider update
        NEWDIV_ACK OFFSET(11) NUMBITS(1) [],
        /// Strobe requesting the hardware latch new divider values
        NEWDIV_VAL OFFSET(12) NUMBITS(1) [],
        COUNTCLK_SEL OFFSET(13) NUMBITS(1) [
            Ref25M = 0,
            Ref27M = 1
        ],
        /// Bypass the PLL, passing the reference straight through
        BYPASS OFFSET(14) NUMBITS(1) [],
        LOCK_SEL OFFSET(15) NUMBITS(1) [],
        REFCLK_SEL OFFSET(16) NUMBITS(2) [
            Ref25M = 0,
            Ref27M = 1,
            HdmiPhy27M = 2,
            ClkPN = 3
        ],
        PD_OVERRIDE OFFSET(18) NUMBITS(1) [],
        /// Power down
        PD OFFSET(19) NUMBITS(1) [],
        OVERRIDE OFFSET(20) NUMBITS(1) [],
        CLKE OFFSET(21) NUMBITS(1) [],
        /// Lock status
        LOCK OFFSET(31) NUMBITS(1) []
    ],
    pub CFG1 [
        /// Integer divider, programmed as value + 1
        INT_DIV OFFSET(0) NUMBITS(7) [],
        /// Binary fractional divider, 2^24 denominator
        FRAC_DIV OFFSET(7) NUMBITS(24) []
    ],
];

/// Byte offset of CFG1 from the PLL's CFG0 register.
pub(crate) const CFG1_OFFSET: usize = 0x4;

/// Denominator of the fractional divider.
const FRAC_DENOM: u64 = 1 << 24;

/// Divider pair realizing a target rate. `int_div` is the actual integer
/// divider (the register stores `int_div - 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FracDividers {
    pub(crate) int_div: u32,
    pub(crate) frac_div: u32,
}

/// Compute the integer/fractional divider pair for `target` Hz from a
/// `parent` Hz reference, assuming the output divider is left at its
/// minimum of 2. `None` when the ratio is out of the 7-bit integer
/// divider's reach or the parent rate is unusable.
pub(crate) fn compute_dividers(parent: u32, target: u32) -> Option<FracDividers> {
    let parent8 = u64::from(parent) * 8;
    let target2 = u64::from(target) * 2;
    if parent8 == 0 {
        return None;
    }

    let int_div = target2 / parent8;
    if int_div == 0 || int_div > u64::from(CFG1::INT_DIV.mask) + 1 {
        return None;
    }

    let remainder = target2 - int_div * parent8;
    let frac_div = remainder * FRAC_DENOM / parent8;

    Some(FracDividers {
        int_div: int_div as u32,
        frac_div: frac_div as u32,
    })
}

/// Reconstruct the output rate from programmed CFG0/CFG1 values and the
/// parent rate: `parent * 8 * (int + 1 + frac / 2^24) / divout`.
pub(crate) fn rate_from_regs(parent: u32, cfg0: u32, cfg1: u32) -> u32 {
    let cfg0 = tock_registers::LocalRegisterCopy::<u32, CFG0::Register>::new(cfg0);
    let cfg1 = tock_registers::LocalRegisterCopy::<u32, CFG1::Register>::new(cfg1);

    let int_div = u64::from(cfg1.read(CFG1::INT_DIV));
    let frac_div = u64::from(cfg1.read(CFG1::FRAC_DIV));
    let divout = u64::from(cfg0.read(CFG0::OUTPUT_DIV) + 1) * 2;

    let parent8 = u64::from(parent) * 8;
    let vco = parent8 * (int_div + 1) + parent8 * frac_div / FRAC_DENOM;
    u32::try_from(vco / divout).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::{compute_dividers, rate_from_regs, FracDividers, CFG1};

    const REF_25M: u32 = 25_000_000;

    #[test]
    fn integer_ratio() {
        // 800 MHz from 25 MHz: target * 2 / (parent * 8) = 8, no remainder.
        let divs = compute_dividers(REF_25M, 800_000_000).unwrap();
        assert_eq!(
            divs,
            FracDividers {
                int_div: 8,
                frac_div: 0
            }
        );
    }

    #[test]
    fn fractional_ratio_read_back() {
        // Audio-style rate with a large fractional part.
        let target = 786_432_000;
        let divs = compute_dividers(REF_25M, target).unwrap();
        assert_eq!(divs.int_div, 7);
        assert!(divs.frac_div > 0);

        let cfg1 = (divs.int_div - 1) | (divs.frac_div << 7);
        let rate = rate_from_regs(REF_25M, 0, cfg1);
        assert!(rate.abs_diff(target) <= 2, "read back {rate}");
    }

    #[test]
    fn out_of_range_ratios() {
        // Below the minimum integer divider.
        assert_eq!(compute_dividers(REF_25M, 50_000_000), None);
        // Dead parent.
        assert_eq!(compute_dividers(0, 800_000_000), None);
        // Beyond the 7-bit integer divider.
        let too_fast = (u64::from(CFG1::INT_DIV.mask) + 2) * u64::from(REF_25M) * 4;
        assert!(too_fast > u64::from(u32::MAX) || compute_dividers(REF_25M, too_fast as u32).is_none());
    }

    #[test]
    fn output_divider_scales_rate() {
        let cfg1 = 7; // int_div = 8, no fraction
        let full = rate_from_regs(REF_25M, 0, cfg1);
        let halved = rate_from_regs(REF_25M, 1, cfg1); // divout 4 instead of 2
        assert_eq!(full, 800_000_000);
        assert_eq!(halved, 400_000_000);
    }
}
