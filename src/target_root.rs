// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CCM target-root composite register layout and the pre/post divider
//! search.
//!
//! A target-root register packs an 8-way parent mux, a 3-bit pre-divider, a
//! 6-bit post-divider, and the root gate into one 32-bit register. Realizing
//! an arbitrary target rate means picking the cascaded divider pair whose
//! output lands closest to the request.

use tock_registers::register_bitfields;

register_bitfields![u32,
    pub TARGET_ROOT [
        /// Post divider, divides by value + 1
        POST_PODF OFFSET(0) NUMBITS(6) [],
        /// Pre divider, divides by value + 1
        PRE_PODF OFFSET(16) NUMBITS(3) [],
        /// Parent select
        MUX OFFSET(24) NUMBITS(3) [],
        /// Root gate
        ENABLE OFFSET(28) NUMBITS(1) []
    ],
];

/// Largest pre/post divider values (as divisors, not field encodings).
pub(crate) const PRE_DIV_MAX: u32 = TARGET_ROOT::PRE_PODF.mask + 1;
pub(crate) const POST_DIV_MAX: u32 = TARGET_ROOT::POST_PODF.mask + 1;

/// Search all pre (1..=8) x post (1..=64) divider pairs, in ascending
/// order, for the pair whose truncated output rate is nearest `target`.
///
/// Only a strictly smaller error replaces the best candidate, so the first
/// pair reaching a given error wins and an exact match found early is never
/// displaced.
pub(crate) fn best_dividers(parent: u32, target: u32) -> (u32, u32) {
    let mut best = (1, 1);
    let mut best_err = u32::MAX;

    for pre in 1..=PRE_DIV_MAX {
        for post in 1..=POST_DIV_MAX {
            let err = (parent / pre / post).abs_diff(target);
            if err < best_err {
                best = (pre, post);
                best_err = err;
            }
        }
    }

    best
}

/// Rate through a chosen divider pair, rounding up at each stage the way the
/// hardware init path reports it.
pub(crate) fn divided_rate(parent: u32, pre: u32, post: u32) -> u32 {
    parent.div_ceil(pre).div_ceil(post)
}

#[cfg(test)]
mod tests {
    use super::{best_dividers, divided_rate, POST_DIV_MAX, PRE_DIV_MAX};

    #[test]
    fn divider_ranges() {
        assert_eq!(PRE_DIV_MAX, 8);
        assert_eq!(POST_DIV_MAX, 64);
    }

    #[test]
    fn exact_pair_wins() {
        // 800 MHz / 4 = 200 MHz is reachable as 1x4, 2x2, 4x1.
        let (pre, post) = best_dividers(800_000_000, 200_000_000);
        assert_eq!(800_000_000 / pre / post, 200_000_000);
        // Ascending order with strict improvement keeps the first exact hit.
        assert_eq!((pre, post), (1, 4));
    }

    #[test]
    fn closest_pair_otherwise() {
        // 100 MHz from 800 MHz with a 7 Hz offset request still divides by 8.
        let (pre, post) = best_dividers(800_000_000, 100_000_007);
        assert_eq!(800_000_000 / pre / post, 100_000_000);
    }

    #[test]
    fn deep_division() {
        // 25 MHz target from 800 MHz needs the full 1/32.
        let (pre, post) = best_dividers(800_000_000, 25_000_000);
        assert_eq!(800_000_000 / pre / post, 25_000_000);
        assert!(pre <= PRE_DIV_MAX && post <= POST_DIV_MAX);
    }

    #[test]
    fn reported_rate_rounds_up() {
        assert_eq!(divided_rate(100, 3, 1), 34);
        assert_eq!(divided_rate(800_000_000, 1, 3), 266_666_667);
    }
}
