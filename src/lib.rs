// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Clock-tree controller for i.MX8M-class clock-generation hardware.
//!
//! The clock network of the CCM/ANATOP blocks is modeled as a directed graph
//! of typed nodes (oscillators, PLLs, dividers, gates, muxes) owned by a
//! registry and addressed by dense numeric clock ids. Operations recurse
//! through parent links so the hardware dependency rules hold automatically:
//! a clock is never reported faster than its source can run, and a clock is
//! not enabled while its source is gated off (unless its permission flags say
//! it may enable the source itself).
//!
//! The per-chip wiring (register offsets, field geometry, parent lists) is
//! *data*, not code: it is described with [`ClockDecl`] entries and consumed
//! once at start-up by [`build`], which validates the topology, seeds every
//! node's cached state from live register values, and returns a
//! [`ClockController`].
//!
//! Register access goes through the [`RegisterBus`] trait. Mapping the CCM
//! and ANATOP banks into memory (and the volatility of those accesses) is the
//! implementor's concern; this crate only issues 32-bit reads and writes at
//! the addresses the topology declares.
//!
//! The graph is single-threaded by design. Nothing here locks; a caller that
//! shares a [`ClockController`] across execution contexts must serialize
//! access around the whole controller, because most operations traverse
//! parent nodes.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod builder;
pub mod bus;
pub mod controller;
pub mod error;
pub mod frac_pll;
pub mod node;
pub mod sccg_pll;
pub mod target_root;
pub mod tree;

pub use builder::{build, ClockDecl, TreeConfig};
pub use bus::RegisterBus;
pub use controller::ClockController;
pub use error::{ClockError, ConfigError};
pub use node::{ClockFlags, ClockId, RateDesc, MAX_PARENTS};
pub use tree::ClockTree;

#[cfg(test)]
pub(crate) mod test_bus;
